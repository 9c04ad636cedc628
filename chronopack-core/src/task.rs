//! The core `Task` type and its scheduling-relevant attributes.
//!
//! Port target: `daily_schedule_plan_service.py` / `scheduler_service.py`
//! (`origin/original_source`), generalized from the builder style of the
//! donor `rewind-core::task::Task`.

use crate::ids::{ProjectId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Waiting,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Low,
    Medium,
    High,
}

pub type Importance = Level;
pub type Urgency = Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnergyLevel {
    Low,
    High,
}

/// Optional touchpoint/recurrence plan. Carried for fingerprint parity with
/// the original plan snapshot (`_task_fingerprint`); the touchpoint
/// scheduling algorithm itself is not specified and is out of scope here
/// (see DESIGN.md).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchpointPlan {
    pub count: u32,
    pub minutes: i64,
    pub gap_days: u32,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub importance: Importance,
    pub urgency: Urgency,
    pub energy_level: EnergyLevel,

    pub estimated_minutes: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
    pub start_not_before: Option<DateTime<Utc>>,
    pub pinned_date: Option<DateTime<Utc>>,

    pub is_fixed_time: bool,
    pub is_all_day: bool,
    pub fixed_start: Option<DateTime<Utc>>,
    pub fixed_end: Option<DateTime<Utc>>,

    pub parent_id: Option<TaskId>,
    pub dependency_ids: Vec<TaskId>,
    pub project_id: Option<ProjectId>,

    pub progress_percent: u8,
    pub touchpoint: Option<TouchpointPlan>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Default estimate (minutes) assumed for a leaf task with no estimate set.
pub const DEFAULT_TASK_MINUTES: i64 = 60;

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            status: TaskStatus::Todo,
            importance: Level::Medium,
            urgency: Level::Medium,
            energy_level: EnergyLevel::High,
            estimated_minutes: None,
            due_date: None,
            start_not_before: None,
            pinned_date: None,
            is_fixed_time: false,
            is_all_day: false,
            fixed_start: None,
            fixed_end: None,
            parent_id: None,
            dependency_ids: Vec::new(),
            project_id: None,
            progress_percent: 0,
            touchpoint: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn with_energy(mut self, energy: EnergyLevel) -> Self {
        self.energy_level = energy;
        self
    }

    pub fn with_estimated_minutes(mut self, minutes: i64) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }

    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_start_not_before(mut self, start: DateTime<Utc>) -> Self {
        self.start_not_before = Some(start);
        self
    }

    pub fn with_pinned_date(mut self, date: DateTime<Utc>) -> Self {
        self.pinned_date = Some(date);
        self
    }

    pub fn with_fixed_time(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.is_fixed_time = true;
        self.fixed_start = Some(start);
        self.fixed_end = Some(end);
        self
    }

    pub fn with_all_day(mut self, on: DateTime<Utc>) -> Self {
        self.is_fixed_time = true;
        self.is_all_day = true;
        self.fixed_start = Some(on);
        self.fixed_end = Some(on);
        self
    }

    pub fn with_parent(mut self, parent: TaskId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<TaskId>) -> Self {
        self.dependency_ids = deps;
        self
    }

    pub fn with_project(mut self, project: ProjectId) -> Self {
        self.project_id = Some(project);
        self
    }

    pub fn is_parent(&self, all_tasks: &[Task]) -> bool {
        all_tasks.iter().any(|t| t.parent_id == Some(self.id))
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

/// Effective estimate: a parent's estimate is the sum of its leaf children's
/// estimates; a leaf's estimate is its own, defaulting to
/// [`DEFAULT_TASK_MINUTES`] when unset. Mirrors
/// `daily_schedule_plan_service.py`'s recursive estimate rollup.
pub fn effective_estimate_minutes(task: &Task, all_tasks: &[Task]) -> i64 {
    let children: Vec<&Task> = all_tasks
        .iter()
        .filter(|t| t.parent_id == Some(task.id))
        .collect();

    if children.is_empty() {
        return task.estimated_minutes.unwrap_or(DEFAULT_TASK_MINUTES);
    }

    children
        .into_iter()
        .map(|child| effective_estimate_minutes(child, all_tasks))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-07-28T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn leaf_estimate_defaults_when_unset() {
        let t = Task::new(TaskId::new(), "leaf", now());
        assert_eq!(effective_estimate_minutes(&t, &[t.clone()]), DEFAULT_TASK_MINUTES);
    }

    #[test]
    fn parent_estimate_sums_children() {
        let parent_id = TaskId::new();
        let parent = Task::new(parent_id, "parent", now());
        let child_a = Task::new(TaskId::new(), "a", now())
            .with_parent(parent_id)
            .with_estimated_minutes(30);
        let child_b = Task::new(TaskId::new(), "b", now())
            .with_parent(parent_id)
            .with_estimated_minutes(45);

        let all = vec![parent.clone(), child_a, child_b];
        assert_eq!(effective_estimate_minutes(&parent, &all), 75);
    }

    #[test]
    fn is_parent_detects_children() {
        let parent_id = TaskId::new();
        let parent = Task::new(parent_id, "parent", now());
        let child = Task::new(TaskId::new(), "child", now()).with_parent(parent_id);
        let all = vec![parent.clone(), child];
        assert!(parent.is_parent(&all));
        assert!(!all[1].is_parent(&all));
    }
}
