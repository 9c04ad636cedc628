//! C6 orchestration — `PlanGenerator`: wires the pure `chronopack-core`
//! algorithm (C2–C5) to the repository interfaces and drives the
//! planned/stale/forecast state machine.
//!
//! Port target: `daily_schedule_plan_service.py::DailySchedulePlanService`
//! (`build_plan`, `get_plan_or_forecast`, `_filter_tasks_for_plan`,
//! `_get_past_days_from_plans`).

use crate::error::{Result, StoreError};
use crate::fingerprint::{compute_pending_changes, plan_params_fingerprint, snapshot_for};
use crate::plan::{DailySchedulePlan, PlanLookup, PlanParams, PlanState};
use crate::repository::{
    DailySchedulePlanRepository, ProjectRepository, ProjectVisibility, ScheduleSettingsRepository,
    ScheduleSnapshotRepository, TaskAssignmentRepository, TaskRepository, UserRepository,
};
use chronopack_core::{build_time_blocks, DayPacker, PlanGroupId, Task, UserId};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PlanGenerator {
    pub task_repo: Arc<dyn TaskRepository>,
    pub project_repo: Arc<dyn ProjectRepository>,
    pub assignment_repo: Arc<dyn TaskAssignmentRepository>,
    pub snapshot_repo: Arc<dyn ScheduleSnapshotRepository>,
    pub settings_repo: Arc<dyn ScheduleSettingsRepository>,
    pub plan_repo: Arc<dyn DailySchedulePlanRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub packer: DayPacker,
}

impl PlanGenerator {
    /// `filter_by_assignee`: restrict to personal tasks, PRIVATE-project
    /// tasks, and TEAM-project tasks the user is assigned to — with pinned
    /// future tasks carved back in regardless of assignment. Mirrors
    /// `_filter_tasks_for_plan`.
    async fn filter_tasks_for_plan(&self, user_id: UserId, tasks: Vec<Task>, today: NaiveDate) -> Result<Vec<Task>> {
        let mut kept = Vec::with_capacity(tasks.len());
        for task in tasks {
            let Some(project_id) = task.project_id else {
                kept.push(task);
                continue;
            };
            let is_pinned_future = task.pinned_date.map(|d| d.date_naive() > today).unwrap_or(false);
            if is_pinned_future {
                kept.push(task);
                continue;
            }
            match self.project_repo.get(project_id).await? {
                Some(info) if info.visibility == ProjectVisibility::Private => kept.push(task),
                Some(info) if info.visibility == ProjectVisibility::Team => {
                    if self.assignment_repo.is_assigned(task.id, user_id).await? {
                        kept.push(task);
                    }
                }
                _ => kept.push(task),
            }
        }
        Ok(kept)
    }

    fn plan_params(&self, max_days: u32, filter_by_assignee: bool, apply_plan_constraints: bool, buffer_hours: f64, break_after_task_minutes: i32) -> PlanParams {
        PlanParams {
            max_days,
            filter_by_assignee,
            apply_plan_constraints,
            buffer_hours,
            break_after_task_minutes,
            energy_high_ratio: self.packer.energy_high_ratio,
            energy_low_ratio: self.packer.energy_low_ratio,
        }
    }

    /// Generate (and persist) a fresh plan for `user_id` starting at
    /// `start_date` over `max_days` days. `from_now` truncates today's
    /// capacity to what's left of the day and enables ghost blocks for
    /// tasks already completed earlier today. Mirrors `build_plan`.
    pub async fn build_plan(
        &self,
        user_id: UserId,
        start_date: NaiveDate,
        max_days: u32,
        from_now: bool,
        filter_by_assignee: bool,
        apply_plan_constraints: bool,
    ) -> Result<Vec<DailySchedulePlan>> {
        let now = Utc::now();
        let settings = self.settings_repo.get(user_id).await?;
        let tz: chrono_tz::Tz = settings
            .timezone
            .parse()
            .map_err(|_| StoreError::InvalidWindow(format!("invalid timezone {}", settings.timezone)))?;

        let mut tasks = self.task_repo.list_for_user(user_id).await?;
        if filter_by_assignee {
            tasks = self.filter_tasks_for_plan(user_id, tasks, start_date).await?;
        }

        let project_priorities = self.project_repo.priorities_for_user(user_id).await?;

        let plan_window = if apply_plan_constraints {
            self.snapshot_repo.plan_window(user_id, start_date).await?
        } else {
            None
        };
        if let Some(window) = plan_window {
            debug!(?window.planned_start, ?window.planned_end, "applying plan window constraint");
        }

        info!(%user_id, %start_date, max_days, "building schedule");
        let build = self.packer.build_schedule(&tasks, &project_priorities, &settings, start_date, max_days);
        if build.ended_due_to_cycle {
            warn!(%user_id, "dependency cycle detected while packing schedule");
        }

        let schedule_days = build_time_blocks(&build.days, &tasks, &settings, tz, from_now.then_some(now));

        let plan_group_id = PlanGroupId::new();
        let params = self.plan_params(max_days, filter_by_assignee, apply_plan_constraints, settings.buffer_hours, settings.break_after_task_minutes);

        let snapshots: Vec<_> = tasks.iter().map(snapshot_for).collect();

        let plans: Vec<DailySchedulePlan> = build
            .days
            .iter()
            .zip(schedule_days.into_iter())
            .map(|(packed, schedule_day)| {
                let pinned_overflow_task_ids = schedule_day.pinned_overflow_task_ids.clone();
                DailySchedulePlan {
                    user_id,
                    plan_date: packed.date,
                    plan_group_id,
                    timezone: settings.timezone.clone(),
                    schedule_day: Some(schedule_day),
                    task_snapshots: snapshots.clone(),
                    unscheduled_task_ids: build.unscheduled.iter().map(|(id, _)| *id).collect(),
                    excluded_task_ids: build.excluded.iter().map(|(id, _)| *id).collect(),
                    pinned_overflow_task_ids,
                    plan_params: params.clone(),
                    generated_at: now,
                }
            })
            .collect();

        self.plan_repo.upsert_many(plans.clone()).await?;
        Ok(plans)
    }

    /// Read a horizon that may straddle past and future: past days come
    /// from storage (or a meeting-only synthetic day when no row exists)
    /// without re-running the scheduler; today-forward is classified
    /// planned/stale/forecast. Mirrors `get_plan_or_forecast`.
    pub async fn get_plan_or_forecast(
        &self,
        user_id: UserId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        filter_by_assignee: bool,
        apply_plan_constraints: bool,
    ) -> Result<PlanLookup> {
        let settings = self.settings_repo.get(user_id).await?;
        let today = Utc::now()
            .with_timezone(&settings.timezone.parse::<chrono_tz::Tz>().unwrap_or(chrono_tz::UTC))
            .date_naive();

        let mut plans = Vec::new();
        let mut pending_changes = Vec::new();
        let mut state = PlanState::Forecast;

        if start_date < today {
            let past_end = end_date.min(today - chrono::Duration::days(1));
            plans.extend(self.get_past_days(user_id, start_date, past_end).await?);
        }

        if end_date >= today {
            let future_start = start_date.max(today);
            let max_days = (end_date - future_start).num_days() as u32 + 1;
            let (future_plans, future_state, future_changes) = self
                .get_plan_or_forecast_from_date(user_id, future_start, max_days, filter_by_assignee, apply_plan_constraints)
                .await?;
            state = future_state;
            pending_changes = future_changes;
            plans.extend(future_plans);
        }

        Ok(PlanLookup { state, plans, pending_changes })
    }

    async fn get_past_days(&self, user_id: UserId, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailySchedulePlan>> {
        if start > end {
            return Ok(Vec::new());
        }
        let stored = self.plan_repo.get_range(user_id, start, end).await?;
        let mut by_date: std::collections::HashMap<NaiveDate, DailySchedulePlan> =
            stored.into_iter().map(|p| (p.plan_date, p)).collect();

        let mut days = Vec::new();
        let mut cursor = start;
        while cursor <= end {
            match by_date.remove(&cursor) {
                Some(plan) => days.push(plan),
                None => days.push(self.synthesize_meeting_only_day(user_id, cursor).await?),
            }
            cursor += chrono::Duration::days(1);
        }
        Ok(days)
    }

    async fn synthesize_meeting_only_day(&self, user_id: UserId, date: NaiveDate) -> Result<DailySchedulePlan> {
        let settings = self.settings_repo.get(user_id).await?;
        let tz: chrono_tz::Tz = settings.timezone.parse().unwrap_or(chrono_tz::UTC);
        let tasks = self.task_repo.list_for_user(user_id).await?;

        let packed = chronopack_core::PackedDay {
            date,
            capacity_minutes: chronopack_core::capacity_minutes_for_weekday(&settings, chrono::Datelike::weekday(&date)),
            allocated_minutes: 0,
            overflow_minutes: 0,
            available_minutes: 0,
            task_allocations: Vec::new(),
        };
        let schedule_day = build_time_blocks(std::slice::from_ref(&packed), &tasks, &settings, tz, None)
            .into_iter()
            .next()
            .expect("build_time_blocks returns one day per input day");

        Ok(DailySchedulePlan {
            user_id,
            plan_date: date,
            plan_group_id: PlanGroupId::new(),
            timezone: settings.timezone.clone(),
            schedule_day: Some(schedule_day),
            task_snapshots: Vec::new(),
            unscheduled_task_ids: Vec::new(),
            excluded_task_ids: Vec::new(),
            pinned_overflow_task_ids: Vec::new(),
            plan_params: self.plan_params(0, false, false, settings.buffer_hours, settings.break_after_task_minutes),
            generated_at: Utc::now(),
        })
    }

    async fn get_plan_or_forecast_from_date(
        &self,
        user_id: UserId,
        start_date: NaiveDate,
        max_days: u32,
        filter_by_assignee: bool,
        apply_plan_constraints: bool,
    ) -> Result<(Vec<DailySchedulePlan>, PlanState, Vec<crate::plan::PendingChange>)> {
        let end_date = start_date + chrono::Duration::days(max_days as i64 - 1);
        let stored = self.plan_repo.get_range(user_id, start_date, end_date).await?;

        if stored.len() as u32 == max_days {
            let tasks = self.task_repo.list_for_user(user_id).await?;
            let reference_snapshots = &stored[0].task_snapshots;
            let pending_changes = compute_pending_changes(&tasks, reference_snapshots);

            let settings = self.settings_repo.get(user_id).await?;
            let current_params = self.plan_params(max_days, filter_by_assignee, apply_plan_constraints, settings.buffer_hours, settings.break_after_task_minutes);
            let params_match = plan_params_fingerprint(&current_params) == plan_params_fingerprint(&stored[0].plan_params);

            let state = if pending_changes.is_empty() && params_match { PlanState::Planned } else { PlanState::Stale };
            return Ok((stored, state, pending_changes));
        }

        // Horizon isn't fully persisted yet: compute fresh without
        // persisting (a "forecast").
        let settings = self.settings_repo.get(user_id).await?;
        let tz: chrono_tz::Tz = settings.timezone.parse().unwrap_or(chrono_tz::UTC);
        let mut tasks = self.task_repo.list_for_user(user_id).await?;
        if filter_by_assignee {
            tasks = self.filter_tasks_for_plan(user_id, tasks, start_date).await?;
        }
        let project_priorities = self.project_repo.priorities_for_user(user_id).await?;
        let build = self.packer.build_schedule(&tasks, &project_priorities, &settings, start_date, max_days);
        let schedule_days = build_time_blocks(&build.days, &tasks, &settings, tz, None);

        let plan_group_id = PlanGroupId::new();
        let params = self.plan_params(max_days, filter_by_assignee, apply_plan_constraints, settings.buffer_hours, settings.break_after_task_minutes);
        let snapshots: Vec<_> = tasks.iter().map(snapshot_for).collect();
        let now = Utc::now();

        let plans: Vec<DailySchedulePlan> = build
            .days
            .iter()
            .zip(schedule_days.into_iter())
            .map(|(packed, schedule_day)| {
                let pinned_overflow_task_ids = schedule_day.pinned_overflow_task_ids.clone();
                DailySchedulePlan {
                    user_id,
                    plan_date: packed.date,
                    plan_group_id,
                    timezone: settings.timezone.clone(),
                    schedule_day: Some(schedule_day),
                    task_snapshots: snapshots.clone(),
                    unscheduled_task_ids: build.unscheduled.iter().map(|(id, _)| *id).collect(),
                    excluded_task_ids: build.excluded.iter().map(|(id, _)| *id).collect(),
                    pinned_overflow_task_ids,
                    plan_params: params.clone(),
                    generated_at: now,
                }
            })
            .collect();

        Ok((plans, PlanState::Forecast, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{
        InMemoryDailySchedulePlanRepository, InMemoryProjectRepository, InMemoryScheduleSettingsRepository,
        InMemoryScheduleSnapshotRepository, InMemoryTaskAssignmentRepository, InMemoryTaskRepository, InMemoryUserRepository,
    };
    use chronopack_core::{ScheduleSettings, Task, TaskId};

    fn test_generator(task_repo: Arc<InMemoryTaskRepository>, settings_repo: Arc<InMemoryScheduleSettingsRepository>, plan_repo: Arc<InMemoryDailySchedulePlanRepository>) -> PlanGenerator {
        PlanGenerator {
            task_repo,
            project_repo: Arc::new(InMemoryProjectRepository::new()),
            assignment_repo: Arc::new(InMemoryTaskAssignmentRepository::new()),
            snapshot_repo: Arc::new(InMemoryScheduleSnapshotRepository::new()),
            settings_repo,
            plan_repo,
            user_repo: Arc::new(InMemoryUserRepository::new()),
            packer: DayPacker::default(),
        }
    }

    /// S1: A(60, HIGH) -> B(60, MEDIUM, depends on A) -> C(120, LOW);
    /// 120 min/day capacity; expect day 1 = [A, B], day 2 = [C].
    #[tokio::test]
    async fn s1_dependency_respecting_two_day_pack() {
        let user_id = UserId::new();
        let now = Utc::now();
        let a = Task::new(TaskId::new(), "A", now).with_importance(chronopack_core::Importance::High).with_estimated_minutes(60);
        let b = Task::new(TaskId::new(), "B", now)
            .with_importance(chronopack_core::Importance::Medium)
            .with_estimated_minutes(60)
            .with_dependencies(vec![a.id]);
        let c = Task::new(TaskId::new(), "C", now).with_importance(chronopack_core::Importance::Low).with_estimated_minutes(120);

        let task_repo = Arc::new(InMemoryTaskRepository::new());
        task_repo.seed(user_id, a.clone()).await;
        task_repo.seed(user_id, b.clone()).await;
        task_repo.seed(user_id, c.clone()).await;

        let settings_repo = Arc::new(InMemoryScheduleSettingsRepository::new());
        let mut settings = ScheduleSettings::default();
        for day in settings.weekly_work_hours.iter_mut() {
            *day = chronopack_core::WorkdayHours::new("09:00", "11:00");
        }
        settings.buffer_hours = 0.0;
        settings_repo.seed(user_id, settings).await;

        let plan_repo = Arc::new(InMemoryDailySchedulePlanRepository::new());
        let generator = test_generator(task_repo, settings_repo, plan_repo.clone());

        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let plans = generator.build_plan(user_id, start, 2, false, false, false).await.unwrap();

        assert_eq!(plans.len(), 2);
        let day1 = plans[0].schedule_day.as_ref().unwrap();
        assert_eq!(day1.allocated_minutes, 120);
        assert_eq!(day1.overflow_minutes, 0);
        let day1_tasks: std::collections::HashSet<_> = day1.time_blocks.iter().map(|b| b.task_id).collect();
        assert_eq!(day1_tasks, [a.id, b.id].into_iter().collect());

        let day2 = plans[1].schedule_day.as_ref().unwrap();
        assert_eq!(day2.allocated_minutes, 120);
        assert!(day2.time_blocks.iter().any(|b| b.task_id == c.id));

        let stored = plan_repo.get_by_date(user_id, start).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn round_trip_read_back_is_planned_with_no_pending_changes() {
        let user_id = UserId::new();
        let now = Utc::now();
        let task = Task::new(TaskId::new(), "solo", now).with_estimated_minutes(30);

        let task_repo = Arc::new(InMemoryTaskRepository::new());
        task_repo.seed(user_id, task).await;
        let settings_repo = Arc::new(InMemoryScheduleSettingsRepository::new());
        settings_repo.seed(user_id, ScheduleSettings::default()).await;
        let plan_repo = Arc::new(InMemoryDailySchedulePlanRepository::new());

        let generator = test_generator(task_repo, settings_repo, plan_repo);
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        generator.build_plan(user_id, start, 1, false, false, false).await.unwrap();

        let lookup = generator
            .get_plan_or_forecast_from_date(user_id, start, 1, false, false)
            .await
            .unwrap();
        assert_eq!(lookup.1, PlanState::Planned);
        assert!(lookup.2.is_empty());
    }

    #[tokio::test]
    async fn mutating_task_field_flips_plan_to_stale() {
        let user_id = UserId::new();
        let now = Utc::now();
        let task = Task::new(TaskId::new(), "solo", now).with_estimated_minutes(30);
        let task_id = task.id;

        let task_repo = Arc::new(InMemoryTaskRepository::new());
        task_repo.seed(user_id, task).await;
        let settings_repo = Arc::new(InMemoryScheduleSettingsRepository::new());
        settings_repo.seed(user_id, ScheduleSettings::default()).await;
        let plan_repo = Arc::new(InMemoryDailySchedulePlanRepository::new());

        let generator = test_generator(task_repo.clone(), settings_repo, plan_repo);
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        generator.build_plan(user_id, start, 1, false, false, false).await.unwrap();

        task_repo.write_back_schedule_fields(task_id, Some(90), None, None).await.unwrap();

        let lookup = generator
            .get_plan_or_forecast_from_date(user_id, start, 1, false, false)
            .await
            .unwrap();
        assert_eq!(lookup.1, PlanState::Stale);
        assert_eq!(lookup.2.len(), 1);
        assert_eq!(lookup.2[0].task_id, task_id);
    }

    #[tokio::test]
    async fn horizon_not_fully_stored_is_a_forecast() {
        let user_id = UserId::new();
        let task = Task::new(TaskId::new(), "solo", Utc::now()).with_estimated_minutes(30);

        let task_repo = Arc::new(InMemoryTaskRepository::new());
        task_repo.seed(user_id, task).await;
        let settings_repo = Arc::new(InMemoryScheduleSettingsRepository::new());
        settings_repo.seed(user_id, ScheduleSettings::default()).await;
        let plan_repo = Arc::new(InMemoryDailySchedulePlanRepository::new());

        let generator = test_generator(task_repo, settings_repo, plan_repo);
        let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();

        let lookup = generator.get_plan_or_forecast_from_date(user_id, start, 3, false, false).await.unwrap();
        assert_eq!(lookup.1, PlanState::Forecast);
    }
}
