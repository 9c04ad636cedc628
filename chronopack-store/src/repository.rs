//! External collaborator interfaces (spec.md §6). The scheduling core is
//! defined against these traits; concrete storage backends, auth, and CRUD
//! surfaces are out of scope (see SPEC_FULL.md §4). `async-trait` is used
//! for the `dyn`-safe async methods, grounded in
//! `examples/other_examples/d20e72db_LegacyLands-...-task-scheduler-rust-crates.rs`.

use crate::error::Result;
use crate::plan::{DailySchedulePlan, TaskPlanSnapshot};
use async_trait::async_trait;
use chronopack_core::{PlanGroupId, ProjectId, ScheduleSettings, ScheduleTimeBlock, Task, TaskId, UserId};
use chrono::{DateTime, NaiveDate, Utc};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Task>>;
    async fn get(&self, task_id: TaskId) -> Result<Option<Task>>;

    /// Write-back path for C7 block moves: update the fixed-time window
    /// and/or estimate of a task after a block is moved/resized.
    async fn write_back_schedule_fields(
        &self,
        task_id: TaskId,
        estimated_minutes: Option<i64>,
        fixed_start: Option<DateTime<Utc>>,
        fixed_end: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectVisibility {
    Team,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectInfo {
    pub id: ProjectId,
    pub visibility: ProjectVisibility,
    pub priority: i32,
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn get(&self, project_id: ProjectId) -> Result<Option<ProjectInfo>>;
    async fn priorities_for_user(&self, user_id: UserId) -> Result<std::collections::HashMap<ProjectId, i32>>;
}

#[async_trait]
pub trait TaskAssignmentRepository: Send + Sync {
    async fn is_assigned(&self, task_id: TaskId, user_id: UserId) -> Result<bool>;
}

#[derive(Debug, Clone, Copy)]
pub struct PlanWindow {
    pub planned_start: Option<DateTime<Utc>>,
    pub planned_end: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ScheduleSnapshotRepository: Send + Sync {
    async fn plan_window(&self, user_id: UserId, date: NaiveDate) -> Result<Option<PlanWindow>>;
}

#[async_trait]
pub trait ScheduleSettingsRepository: Send + Sync {
    async fn get(&self, user_id: UserId) -> Result<ScheduleSettings>;
}

#[async_trait]
pub trait DailySchedulePlanRepository: Send + Sync {
    async fn get_by_date(&self, user_id: UserId, date: NaiveDate) -> Result<Option<DailySchedulePlan>>;
    async fn get_range(&self, user_id: UserId, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailySchedulePlan>>;
    async fn upsert_many(&self, plans: Vec<DailySchedulePlan>) -> Result<()>;

    /// Move or resize a single time block within `date`'s plan, or across
    /// two plan rows when `target_date != date` (cross-day move).
    async fn move_time_block(
        &self,
        user_id: UserId,
        date: NaiveDate,
        block_index: usize,
        target_date: NaiveDate,
        new_block: ScheduleTimeBlock,
    ) -> Result<()>;

    /// Replace (or insert) `snapshot` in every plan row sharing
    /// `plan_group_id`, not just the row for a single date. A move's
    /// write-back must resync the whole generation, or every other day in
    /// the horizon still carries the task's pre-move fingerprint and flips
    /// to `stale` on the next read.
    async fn update_task_snapshot_for_group(&self, plan_group_id: PlanGroupId, snapshot: TaskPlanSnapshot) -> Result<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<UserId>>;
    async fn timezone_of(&self, user_id: UserId) -> Result<String>;
}
