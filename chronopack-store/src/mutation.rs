//! C7 — plan mutation: move or resize a single scheduled time block,
//! writing the change back to the owning task and resyncing the plan's
//! fingerprint so a subsequent read doesn't see it as drift.
//!
//! Port target: `daily_schedule_plan_service.py::move_time_block`.

use crate::error::{Result, StoreError};
use crate::fingerprint::snapshot_for;
use crate::repository::{DailySchedulePlanRepository, TaskRepository};
use chronopack_core::{BlockKind, BlockStatus, PlanGroupId, ScheduleTimeBlock, TaskId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

pub struct PlanMutator {
    pub task_repo: Arc<dyn TaskRepository>,
    pub plan_repo: Arc<dyn DailySchedulePlanRepository>,
}

/// A requested move or resize of an existing block. `target_date` equal to
/// `date` is a same-day reorder; otherwise it's a cross-day move.
#[derive(Debug, Clone, Copy)]
pub struct MoveBlockRequest {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub block_index: usize,
    pub target_date: NaiveDate,
    pub new_start: DateTime<Utc>,
    pub new_end: DateTime<Utc>,
}

impl PlanMutator {
    /// Move/resize a block, write the new window back onto its task, and
    /// refresh the affected plan's fingerprint snapshot for that task so the
    /// move itself doesn't register as a pending change on the next read.
    pub async fn move_time_block(&self, request: MoveBlockRequest) -> Result<()> {
        let current = self
            .plan_repo
            .get_by_date(request.user_id, request.date)
            .await?
            .ok_or(StoreError::BlockNotFound)?;
        let schedule_day = current.schedule_day.as_ref().ok_or(StoreError::BlockNotFound)?;
        let existing = schedule_day.time_blocks.get(request.block_index).ok_or(StoreError::BlockNotFound)?;

        if existing.kind == BlockKind::Meeting {
            return Err(StoreError::InvalidWindow("meeting blocks are not user-movable".into()));
        }
        if request.new_end <= request.new_start {
            return Err(StoreError::InvalidWindow("block end must be after start".into()));
        }

        let task_id = existing.task_id;
        let source_group = current.plan_group_id;
        let task = self.task_repo.get(task_id).await?.ok_or(StoreError::TaskWriteFailure(task_id))?;

        let new_block = ScheduleTimeBlock {
            task_id,
            start: request.new_start,
            end: request.new_end,
            kind: BlockKind::Auto,
            status: BlockStatus::Scheduled,
            pinned_date: (request.target_date != request.date).then_some(request.target_date),
        };

        // Only a fixed-time task's window is a property of the task itself;
        // a plain task's block start/end are a function of capacity
        // packing, not a task field, so only its estimate is written back.
        let estimated_minutes = (request.new_end - request.new_start).num_minutes();
        let (fixed_start, fixed_end) =
            if task.is_fixed_time { (Some(request.new_start), Some(request.new_end)) } else { (None, None) };
        self.task_repo
            .write_back_schedule_fields(task_id, Some(estimated_minutes), fixed_start, fixed_end)
            .await?;

        self.plan_repo
            .move_time_block(request.user_id, request.date, request.block_index, request.target_date, new_block)
            .await?;

        self.resync_fingerprint_group(source_group, task_id).await?;
        if request.target_date != request.date {
            if let Some(target_plan) = self.plan_repo.get_by_date(request.user_id, request.target_date).await? {
                if target_plan.plan_group_id != source_group {
                    self.resync_fingerprint_group(target_plan.plan_group_id, task_id).await?;
                }
            }
        }

        info!(%request.user_id, %task_id, from = %request.date, to = %request.target_date, "moved time block");
        Ok(())
    }

    /// Update (or insert) `task_id`'s fingerprint snapshot on every plan row
    /// sharing `plan_group_id` — not just the moved-to/moved-from dates — so
    /// the rest of the horizon doesn't flip to `stale` on the next read.
    async fn resync_fingerprint_group(&self, plan_group_id: PlanGroupId, task_id: TaskId) -> Result<()> {
        let Some(task) = self.task_repo.get(task_id).await? else { return Ok(()) };
        let snapshot = snapshot_for(&task);
        self.plan_repo.update_task_snapshot_for_group(plan_group_id, snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryDailySchedulePlanRepository, InMemoryTaskRepository};
    use crate::plan::{DailySchedulePlan, PlanParams};
    use chronopack_core::{PlanGroupId, ScheduleDay, Task, TaskId};

    fn test_plan(user_id: UserId, date: NaiveDate, task_id: TaskId, start: DateTime<Utc>, end: DateTime<Utc>) -> DailySchedulePlan {
        DailySchedulePlan {
            user_id,
            plan_date: date,
            plan_group_id: PlanGroupId::new(),
            timezone: "UTC".into(),
            schedule_day: Some(ScheduleDay {
                date,
                capacity_minutes: 480,
                allocated_minutes: 60,
                overflow_minutes: 0,
                meeting_minutes: 0,
                available_minutes: 420,
                time_blocks: vec![ScheduleTimeBlock {
                    task_id,
                    start,
                    end,
                    kind: BlockKind::Auto,
                    status: BlockStatus::Scheduled,
                    pinned_date: None,
                }],
                pinned_overflow_task_ids: Vec::new(),
            }),
            task_snapshots: Vec::new(),
            unscheduled_task_ids: Vec::new(),
            excluded_task_ids: Vec::new(),
            pinned_overflow_task_ids: Vec::new(),
            plan_params: PlanParams {
                max_days: 1,
                filter_by_assignee: false,
                apply_plan_constraints: false,
                buffer_hours: 1.0,
                break_after_task_minutes: 5,
                energy_high_ratio: 0.4,
                energy_low_ratio: 0.6,
            },
            generated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn same_day_move_of_fixed_time_task_writes_back_window_and_fingerprint() {
        let user_id = UserId::new();
        let task_id = TaskId::new();
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let start = date.and_hms_opt(9, 0, 0).unwrap().and_utc();
        let end = date.and_hms_opt(10, 0, 0).unwrap().and_utc();

        let task_repo = Arc::new(InMemoryTaskRepository::new());
        task_repo.seed(user_id, Task::new(task_id, "t", Utc::now()).with_fixed_time(start, end)).await;

        let plan_repo = Arc::new(InMemoryDailySchedulePlanRepository::new());
        plan_repo.upsert_many(vec![test_plan(user_id, date, task_id, start, end)]).await.unwrap();

        let mutator = PlanMutator { task_repo: task_repo.clone(), plan_repo: plan_repo.clone() };
        let new_start = date.and_hms_opt(11, 0, 0).unwrap().and_utc();
        let new_end = date.and_hms_opt(11, 45, 0).unwrap().and_utc();

        mutator
            .move_time_block(MoveBlockRequest { user_id, date, block_index: 0, target_date: date, new_start, new_end })
            .await
            .unwrap();

        let updated_task = task_repo.get(task_id).await.unwrap().unwrap();
        assert_eq!(updated_task.fixed_start, Some(new_start));
        assert_eq!(updated_task.fixed_end, Some(new_end));
        assert_eq!(updated_task.estimated_minutes, Some(45));

        let plan = plan_repo.get_by_date(user_id, date).await.unwrap().unwrap();
        let day = plan.schedule_day.unwrap();
        assert_eq!(day.time_blocks.len(), 1);
        assert_eq!(day.time_blocks[0].start, new_start);
        assert!(plan.task_snapshots.iter().any(|s| s.task_id == task_id));
    }

    #[tokio::test]
    async fn same_day_move_of_plain_task_leaves_fixed_window_untouched() {
        let user_id = UserId::new();
        let task_id = TaskId::new();
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let start = date.and_hms_opt(9, 0, 0).unwrap().and_utc();
        let end = date.and_hms_opt(10, 0, 0).unwrap().and_utc();

        let task_repo = Arc::new(InMemoryTaskRepository::new());
        task_repo.seed(user_id, Task::new(task_id, "t", Utc::now())).await;

        let plan_repo = Arc::new(InMemoryDailySchedulePlanRepository::new());
        plan_repo.upsert_many(vec![test_plan(user_id, date, task_id, start, end)]).await.unwrap();

        let mutator = PlanMutator { task_repo: task_repo.clone(), plan_repo: plan_repo.clone() };
        let new_start = date.and_hms_opt(11, 0, 0).unwrap().and_utc();
        let new_end = date.and_hms_opt(11, 45, 0).unwrap().and_utc();

        mutator
            .move_time_block(MoveBlockRequest { user_id, date, block_index: 0, target_date: date, new_start, new_end })
            .await
            .unwrap();

        let updated_task = task_repo.get(task_id).await.unwrap().unwrap();
        assert_eq!(updated_task.fixed_start, None);
        assert_eq!(updated_task.fixed_end, None);
        assert_eq!(updated_task.estimated_minutes, Some(45));
    }

    #[tokio::test]
    async fn move_resyncs_fingerprint_across_every_row_in_the_plan_group() {
        let user_id = UserId::new();
        let task_id = TaskId::new();
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let later_date = NaiveDate::from_ymd_opt(2026, 1, 8).unwrap();
        let start = date.and_hms_opt(9, 0, 0).unwrap().and_utc();
        let end = date.and_hms_opt(10, 0, 0).unwrap().and_utc();

        let task_repo = Arc::new(InMemoryTaskRepository::new());
        task_repo.seed(user_id, Task::new(task_id, "t", Utc::now())).await;

        let mut day1 = test_plan(user_id, date, task_id, start, end);
        let group_id = day1.plan_group_id;
        let mut later = test_plan(user_id, later_date, TaskId::new(), start, end);
        later.plan_group_id = group_id;
        day1.task_snapshots.push(crate::plan::TaskPlanSnapshot { task_id, title: "t".into(), fingerprint: "stale".into() });
        later.task_snapshots.push(crate::plan::TaskPlanSnapshot { task_id, title: "t".into(), fingerprint: "stale".into() });

        let plan_repo = Arc::new(InMemoryDailySchedulePlanRepository::new());
        plan_repo.upsert_many(vec![day1, later]).await.unwrap();

        let mutator = PlanMutator { task_repo, plan_repo: plan_repo.clone() };
        let new_start = date.and_hms_opt(11, 0, 0).unwrap().and_utc();
        let new_end = date.and_hms_opt(11, 45, 0).unwrap().and_utc();

        mutator
            .move_time_block(MoveBlockRequest { user_id, date, block_index: 0, target_date: date, new_start, new_end })
            .await
            .unwrap();

        let later_plan = plan_repo.get_by_date(user_id, later_date).await.unwrap().unwrap();
        let later_snapshot = later_plan.task_snapshots.iter().find(|s| s.task_id == task_id).unwrap();
        assert_ne!(later_snapshot.fingerprint, "stale");
    }

    #[tokio::test]
    async fn cross_day_move_relocates_block() {
        let user_id = UserId::new();
        let task_id = TaskId::new();
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let target_date = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        let start = date.and_hms_opt(9, 0, 0).unwrap().and_utc();
        let end = date.and_hms_opt(10, 0, 0).unwrap().and_utc();

        let task_repo = Arc::new(InMemoryTaskRepository::new());
        task_repo.seed(user_id, Task::new(task_id, "t", Utc::now())).await;

        let plan_repo = Arc::new(InMemoryDailySchedulePlanRepository::new());
        plan_repo
            .upsert_many(vec![test_plan(user_id, date, task_id, start, end), test_plan(user_id, target_date, TaskId::new(), start, end)])
            .await
            .unwrap();

        let mutator = PlanMutator { task_repo, plan_repo: plan_repo.clone() };
        let new_start = target_date.and_hms_opt(9, 0, 0).unwrap().and_utc();
        let new_end = target_date.and_hms_opt(9, 30, 0).unwrap().and_utc();

        mutator
            .move_time_block(MoveBlockRequest { user_id, date, block_index: 0, target_date, new_start, new_end })
            .await
            .unwrap();

        let source = plan_repo.get_by_date(user_id, date).await.unwrap().unwrap();
        assert!(source.schedule_day.unwrap().time_blocks.is_empty());

        let target = plan_repo.get_by_date(user_id, target_date).await.unwrap().unwrap();
        assert!(target.schedule_day.unwrap().time_blocks.iter().any(|b| b.task_id == task_id));
    }
}
