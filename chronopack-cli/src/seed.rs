//! Demo fixture data and repository wiring for the CLI. There is no
//! persistent backend (concrete non-memory storage is out of scope — see
//! SPEC_FULL.md §4), so every invocation seeds a fresh in-memory dataset
//! before acting on it.

use chronopack_core::{DayPacker, EnergyLevel, Level, ScheduleSettings, Task, TaskId, TaskStatus, UserId};
use chronopack_store::{
    InMemoryDailySchedulePlanRepository, InMemoryProjectRepository, InMemoryScheduleSettingsRepository,
    InMemoryScheduleSnapshotRepository, InMemoryTaskAssignmentRepository, InMemoryTaskRepository, InMemoryUserRepository,
    PlanGenerator,
};
use chrono::{Duration, Utc};
use std::sync::Arc;

pub struct Demo {
    pub user_id: UserId,
    pub generator: Arc<PlanGenerator>,
    pub task_repo: Arc<InMemoryTaskRepository>,
    pub plan_repo: Arc<InMemoryDailySchedulePlanRepository>,
    pub settings_repo: Arc<InMemoryScheduleSettingsRepository>,
    pub user_repo: Arc<InMemoryUserRepository>,
}

pub async fn build(timezone: &str, buffer_hours: f64, break_after_task_minutes: i32) -> Demo {
    let user_id = UserId::new();
    let now = Utc::now();

    let task_repo = Arc::new(InMemoryTaskRepository::new());
    let project_repo = Arc::new(InMemoryProjectRepository::new());
    let assignment_repo = Arc::new(InMemoryTaskAssignmentRepository::new());
    let snapshot_repo = Arc::new(InMemoryScheduleSnapshotRepository::new());
    let settings_repo = Arc::new(InMemoryScheduleSettingsRepository::new());
    let plan_repo = Arc::new(InMemoryDailySchedulePlanRepository::new());
    let user_repo = Arc::new(InMemoryUserRepository::new());

    user_repo.seed(user_id, timezone).await;
    let mut settings = ScheduleSettings::default();
    settings.timezone = timezone.to_string();
    settings.buffer_hours = buffer_hours;
    settings.break_after_task_minutes = break_after_task_minutes;
    settings_repo.seed(user_id, settings).await;

    for task in demo_tasks(now) {
        task_repo.seed(user_id, task).await;
    }

    let generator = Arc::new(PlanGenerator {
        task_repo: task_repo.clone(),
        project_repo,
        assignment_repo,
        snapshot_repo,
        settings_repo: settings_repo.clone(),
        plan_repo: plan_repo.clone(),
        user_repo: user_repo.clone(),
        packer: DayPacker::default(),
    });

    Demo { user_id, generator, task_repo, plan_repo, settings_repo, user_repo }
}

fn demo_tasks(now: chrono::DateTime<Utc>) -> Vec<Task> {
    vec![
        Task::new(TaskId::new(), "Write quarterly report", now)
            .with_importance(Level::High)
            .with_urgency(Level::High)
            .with_due_date(now + Duration::days(2))
            .with_estimated_minutes(180),
        Task::new(TaskId::new(), "Review pull requests", now)
            .with_importance(Level::Medium)
            .with_urgency(Level::High)
            .with_status(TaskStatus::InProgress)
            .with_estimated_minutes(60),
        Task::new(TaskId::new(), "Plan next sprint", now)
            .with_importance(Level::High)
            .with_urgency(Level::Medium)
            .with_due_date(now + Duration::days(5))
            .with_estimated_minutes(90),
        Task::new(TaskId::new(), "Read design doc", now)
            .with_importance(Level::Low)
            .with_urgency(Level::Low)
            .with_energy(EnergyLevel::Low)
            .with_estimated_minutes(30),
        Task::new(TaskId::new(), "Team standup", now)
            .with_fixed_time(now + Duration::hours(1), now + Duration::hours(1) + Duration::minutes(15)),
    ]
}
