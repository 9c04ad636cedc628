//! C6 data model — the persisted daily plan row and its drift-detection
//! companions.
//!
//! Port target: `daily_schedule_plan_service.py`'s `DailySchedulePlan`
//! ORM row, `TaskPlanSnapshot`, and the planned/stale/forecast state
//! machine in `_get_plan_or_forecast_from_date`.

use chronopack_core::{PlanGroupId, ScheduleDay, TaskId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPlanSnapshot {
    pub task_id: TaskId,
    pub title: String,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingChangeKind {
    New,
    Updated,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub task_id: TaskId,
    pub kind: PendingChangeKind,
}

/// Parameters a plan was generated with, fingerprinted alongside tasks so
/// that a settings change (not just a task change) also triggers `stale`.
/// Mirrors `_plan_params_fingerprint`'s input dict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanParams {
    pub max_days: u32,
    pub filter_by_assignee: bool,
    pub apply_plan_constraints: bool,
    pub buffer_hours: f64,
    pub break_after_task_minutes: i32,
    pub energy_high_ratio: f64,
    pub energy_low_ratio: f64,
}

/// Whether a plan read came straight from storage, is stale relative to
/// live task/setting state, or was computed fresh without persisting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanState {
    Planned,
    Stale,
    Forecast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySchedulePlan {
    pub user_id: UserId,
    pub plan_date: NaiveDate,
    pub plan_group_id: PlanGroupId,
    pub timezone: String,
    #[serde(skip)]
    pub schedule_day: Option<ScheduleDay>,
    pub task_snapshots: Vec<TaskPlanSnapshot>,
    pub unscheduled_task_ids: Vec<TaskId>,
    pub excluded_task_ids: Vec<TaskId>,
    pub pinned_overflow_task_ids: Vec<TaskId>,
    pub plan_params: PlanParams,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PlanLookup {
    pub state: PlanState,
    pub plans: Vec<DailySchedulePlan>,
    pub pending_changes: Vec<PendingChange>,
}
