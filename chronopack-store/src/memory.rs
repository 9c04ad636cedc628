//! In-memory reference implementations of every repository trait. These
//! exist for tests and the CLI demonstrator — not a product storage layer
//! (see SPEC_FULL.md §4, Non-goals).

use crate::error::{Result, StoreError};
use crate::plan::{DailySchedulePlan, TaskPlanSnapshot};
use crate::repository::{
    DailySchedulePlanRepository, PlanWindow, ProjectInfo, ProjectRepository, ScheduleSettingsRepository,
    ScheduleSnapshotRepository, TaskAssignmentRepository, TaskRepository, UserRepository,
};
use async_trait::async_trait;
use chronopack_core::{PlanGroupId, ProjectId, ScheduleSettings, ScheduleTimeBlock, Task, TaskId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<TaskId, Task>>,
    owners: RwLock<HashMap<TaskId, UserId>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, user_id: UserId, task: Task) {
        let id = task.id;
        self.tasks.write().await.insert(id, task);
        self.owners.write().await.insert(id, user_id);
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Task>> {
        let owners = self.owners.read().await;
        let tasks = self.tasks.read().await;
        Ok(owners
            .iter()
            .filter(|(_, owner)| **owner == user_id)
            .filter_map(|(id, _)| tasks.get(id).cloned())
            .collect())
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(&task_id).cloned())
    }

    async fn write_back_schedule_fields(
        &self,
        task_id: TaskId,
        estimated_minutes: Option<i64>,
        fixed_start: Option<DateTime<Utc>>,
        fixed_end: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&task_id).ok_or(StoreError::TaskWriteFailure(task_id))?;
        if let Some(minutes) = estimated_minutes {
            task.estimated_minutes = Some(minutes);
        }
        if let (Some(start), Some(end)) = (fixed_start, fixed_end) {
            task.fixed_start = Some(start);
            task.fixed_end = Some(end);
        }
        task.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProjectRepository {
    projects: RwLock<HashMap<ProjectId, ProjectInfo>>,
}

impl InMemoryProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, info: ProjectInfo) {
        self.projects.write().await.insert(info.id, info);
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn get(&self, project_id: ProjectId) -> Result<Option<ProjectInfo>> {
        Ok(self.projects.read().await.get(&project_id).copied())
    }

    async fn priorities_for_user(&self, _user_id: UserId) -> Result<HashMap<ProjectId, i32>> {
        Ok(self.projects.read().await.values().map(|p| (p.id, p.priority)).collect())
    }
}

#[derive(Default)]
pub struct InMemoryTaskAssignmentRepository {
    assignments: RwLock<HashSet<(TaskId, UserId)>>,
}

impl InMemoryTaskAssignmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn assign(&self, task_id: TaskId, user_id: UserId) {
        self.assignments.write().await.insert((task_id, user_id));
    }
}

#[async_trait]
impl TaskAssignmentRepository for InMemoryTaskAssignmentRepository {
    async fn is_assigned(&self, task_id: TaskId, user_id: UserId) -> Result<bool> {
        Ok(self.assignments.read().await.contains(&(task_id, user_id)))
    }
}

#[derive(Default)]
pub struct InMemoryScheduleSnapshotRepository {
    windows: RwLock<HashMap<(UserId, NaiveDate), PlanWindow>>,
}

impl InMemoryScheduleSnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, user_id: UserId, date: NaiveDate, window: PlanWindow) {
        self.windows.write().await.insert((user_id, date), window);
    }
}

#[async_trait]
impl ScheduleSnapshotRepository for InMemoryScheduleSnapshotRepository {
    async fn plan_window(&self, user_id: UserId, date: NaiveDate) -> Result<Option<PlanWindow>> {
        Ok(self.windows.read().await.get(&(user_id, date)).copied())
    }
}

pub struct InMemoryScheduleSettingsRepository {
    settings: RwLock<HashMap<UserId, ScheduleSettings>>,
}

impl Default for InMemoryScheduleSettingsRepository {
    fn default() -> Self {
        Self { settings: RwLock::new(HashMap::new()) }
    }
}

impl InMemoryScheduleSettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, user_id: UserId, settings: ScheduleSettings) {
        self.settings.write().await.insert(user_id, settings);
    }
}

#[async_trait]
impl ScheduleSettingsRepository for InMemoryScheduleSettingsRepository {
    async fn get(&self, user_id: UserId) -> Result<ScheduleSettings> {
        Ok(self.settings.read().await.get(&user_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryDailySchedulePlanRepository {
    plans: RwLock<HashMap<(UserId, NaiveDate), DailySchedulePlan>>,
}

impl InMemoryDailySchedulePlanRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DailySchedulePlanRepository for InMemoryDailySchedulePlanRepository {
    async fn get_by_date(&self, user_id: UserId, date: NaiveDate) -> Result<Option<DailySchedulePlan>> {
        Ok(self.plans.read().await.get(&(user_id, date)).cloned())
    }

    async fn get_range(&self, user_id: UserId, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailySchedulePlan>> {
        let plans = self.plans.read().await;
        let mut out: Vec<DailySchedulePlan> = plans
            .iter()
            .filter(|((uid, date), _)| *uid == user_id && *date >= start && *date <= end)
            .map(|(_, plan)| plan.clone())
            .collect();
        out.sort_by_key(|p| p.plan_date);
        Ok(out)
    }

    async fn upsert_many(&self, new_plans: Vec<DailySchedulePlan>) -> Result<()> {
        let mut plans = self.plans.write().await;
        for plan in new_plans {
            plans.insert((plan.user_id, plan.plan_date), plan);
        }
        Ok(())
    }

    async fn move_time_block(
        &self,
        user_id: UserId,
        date: NaiveDate,
        block_index: usize,
        target_date: NaiveDate,
        new_block: ScheduleTimeBlock,
    ) -> Result<()> {
        let mut plans = self.plans.write().await;

        let source = plans.get_mut(&(user_id, date)).ok_or(StoreError::BlockNotFound)?;
        let Some(schedule_day) = source.schedule_day.as_mut() else { return Err(StoreError::BlockNotFound) };
        if block_index >= schedule_day.time_blocks.len() {
            return Err(StoreError::BlockNotFound);
        }
        schedule_day.time_blocks.remove(block_index);

        if target_date == date {
            let source = plans.get_mut(&(user_id, date)).unwrap();
            if let Some(day) = source.schedule_day.as_mut() {
                day.time_blocks.push(new_block);
                day.time_blocks.sort_by_key(|b| b.start);
            }
        } else {
            let target = plans.get_mut(&(user_id, target_date)).ok_or(StoreError::BlockNotFound)?;
            if let Some(day) = target.schedule_day.as_mut() {
                day.time_blocks.push(new_block);
                day.time_blocks.sort_by_key(|b| b.start);
            }
        }
        Ok(())
    }

    async fn update_task_snapshot_for_group(&self, plan_group_id: PlanGroupId, snapshot: TaskPlanSnapshot) -> Result<()> {
        let mut plans = self.plans.write().await;
        for plan in plans.values_mut().filter(|p| p.plan_group_id == plan_group_id) {
            match plan.task_snapshots.iter_mut().find(|s| s.task_id == snapshot.task_id) {
                Some(existing) => *existing = snapshot.clone(),
                None => plan.task_snapshots.push(snapshot.clone()),
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    timezones: RwLock<HashMap<UserId, String>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, user_id: UserId, timezone: impl Into<String>) {
        self.timezones.write().await.insert(user_id, timezone.into());
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn list_all(&self) -> Result<Vec<UserId>> {
        Ok(self.timezones.read().await.keys().copied().collect())
    }

    async fn timezone_of(&self, user_id: UserId) -> Result<String> {
        Ok(self.timezones.read().await.get(&user_id).cloned().unwrap_or_else(|| "UTC".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronopack_core::Task;

    #[tokio::test]
    async fn task_repo_scopes_by_user() {
        let repo = InMemoryTaskRepository::new();
        let user_a = UserId::new();
        let user_b = UserId::new();
        repo.seed(user_a, Task::new(TaskId::new(), "a", Utc::now())).await;
        repo.seed(user_b, Task::new(TaskId::new(), "b", Utc::now())).await;

        assert_eq!(repo.list_for_user(user_a).await.unwrap().len(), 1);
        assert_eq!(repo.list_for_user(user_b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn write_back_updates_estimate() {
        let repo = InMemoryTaskRepository::new();
        let user = UserId::new();
        let task = Task::new(TaskId::new(), "t", Utc::now());
        let id = task.id;
        repo.seed(user, task).await;

        repo.write_back_schedule_fields(id, Some(90), None, None).await.unwrap();
        assert_eq!(repo.get(id).await.unwrap().unwrap().estimated_minutes, Some(90));
    }
}
