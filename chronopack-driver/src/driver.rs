//! The periodic control loop: daily plan regeneration, heartbeat risk
//! evaluation, and weekly retrospectives, each on its own timer.
//!
//! Port target: `background_scheduler.py`. Per the crate's redesign
//! decision, this is an explicit, owned value with `start`/`stop` rather
//! than the original's module-level `_scheduler` singleton — nothing here
//! is process-global.

use crate::heartbeat::{assess_task, build_message, select_for_notification, NotificationWindow};
use crate::notifications::{NotificationEvent, NotificationSink};
use crate::retrospective::missed_retrospectives;
use chronopack_store::{DailySchedulePlanRepository, PlanGenerator, ScheduleSettingsRepository, TaskRepository, UserRepository};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const DAILY_PLAN_MAX_DAYS: u32 = 30;
const HEARTBEAT_INTERVAL: StdDuration = StdDuration::from_secs(30 * 60);
const DAILY_PLAN_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);
const RETROSPECTIVE_INTERVAL: StdDuration = StdDuration::from_secs(24 * 60 * 60);
const NOTIFICATION_COOLDOWN_HOURS: i64 = 24;
const NOTIFICATION_LIMIT_PER_DAY: usize = 5;

pub struct PeriodicDriver {
    generator: Arc<PlanGenerator>,
    settings_repo: Arc<dyn ScheduleSettingsRepository>,
    task_repo: Arc<dyn TaskRepository>,
    user_repo: Arc<dyn UserRepository>,
    notifications: Arc<dyn NotificationSink>,
    test_mode: bool,
    shutdown: Arc<AtomicBool>,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl PeriodicDriver {
    pub fn new(
        generator: Arc<PlanGenerator>,
        settings_repo: Arc<dyn ScheduleSettingsRepository>,
        task_repo: Arc<dyn TaskRepository>,
        user_repo: Arc<dyn UserRepository>,
        notifications: Arc<dyn NotificationSink>,
        test_mode: bool,
    ) -> Self {
        Self {
            generator,
            settings_repo,
            task_repo,
            user_repo,
            notifications,
            test_mode,
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Spawn the three timers. A no-op under `test_mode` — callers drive the
    /// per-job bodies directly in tests instead.
    pub fn start(self: &Arc<Self>) {
        if self.test_mode {
            info!("driver started in test mode: periodic jobs disabled");
            return;
        }
        self.shutdown.store(false, Ordering::SeqCst);

        let daily = Arc::clone(self);
        let heartbeat = Arc::clone(self);
        let retro = Arc::clone(self);

        let mut handles = self.handles.lock().unwrap();
        handles.push(tokio::spawn(async move {
            daily.run_loop(DAILY_PLAN_INTERVAL, |d| Self::boxed(d.run_daily_plan_generation())).await
        }));
        handles.push(tokio::spawn(async move {
            heartbeat.run_loop(HEARTBEAT_INTERVAL, |d| Self::boxed(d.run_heartbeat_checks())).await
        }));
        handles.push(tokio::spawn(async move {
            retro.run_loop(RETROSPECTIVE_INTERVAL, |d| Self::boxed(d.run_weekly_retrospective())).await
        }));
    }

    /// Signal the cooperative shutdown flag and await every spawned job.
    pub async fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
    }

    fn boxed(fut: impl std::future::Future<Output = ()> + Send + 'static) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(fut)
    }

    async fn run_loop<F>(self: Arc<Self>, period: StdDuration, job: F)
    where
        F: Fn(Arc<Self>) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>,
    {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            job(Arc::clone(&self)).await;
        }
    }

    /// For each user with no plan row covering their local today, generate
    /// one. Iterates sequentially with a randomised inter-user sleep to
    /// smooth repository load, as the original does between users.
    pub async fn run_daily_plan_generation(self: Arc<Self>) {
        let users = match self.user_repo.list_all().await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "failed to list users for daily plan generation");
                return;
            }
        };

        for user_id in users {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            if let Err(e) = self.run_daily_plan_generation_for_user(user_id).await {
                warn!(%user_id, error = %e, "daily plan generation failed for user");
            }
            sleep_between_users().await;
        }
    }

    /// Generate today's plan for `user_id` unless a row already covers
    /// their local today. Mirrors `background_scheduler.py`'s
    /// per-user "skip if a plan row already exists" guard.
    async fn run_daily_plan_generation_for_user(&self, user_id: chronopack_core::UserId) -> chronopack_store::Result<()> {
        let settings = self.settings_repo.get(user_id).await?;
        let tz: chrono_tz::Tz = settings.timezone.parse().unwrap_or(chrono_tz::UTC);
        let today = chrono::Utc::now().with_timezone(&tz).date_naive();

        if self.generator.plan_repo.get_by_date(user_id, today).await?.is_some() {
            return Ok(());
        }

        self.generator.build_plan(user_id, today, DAILY_PLAN_MAX_DAYS, false, true, true).await?;
        Ok(())
    }

    /// Per user, risk-score every candidate task, gate by severity/cooldown/
    /// daily cap/local-time window, and enqueue a notification for each
    /// selected task.
    pub async fn run_heartbeat_checks(self: Arc<Self>) {
        let users = match self.user_repo.list_all().await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "failed to list users for heartbeat checks");
                return;
            }
        };

        for user_id in users {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            if let Err(e) = self.run_heartbeat_for_user(user_id).await {
                warn!(%user_id, error = %e, "heartbeat check failed for user");
            }
            sleep_between_users().await;
        }
    }

    async fn run_heartbeat_for_user(&self, user_id: chronopack_core::UserId) -> chronopack_store::Result<()> {
        let settings = self.settings_repo.get(user_id).await?;
        let tz: chrono_tz::Tz = settings.timezone.parse().unwrap_or(chrono_tz::UTC);
        let now = chrono::Utc::now();
        if !NotificationWindow::default().contains(now.with_timezone(&tz)) {
            return Ok(());
        }

        let tasks = self.task_repo.list_for_user(user_id).await?;
        let assessments: Vec<_> = tasks.iter().filter_map(|t| assess_task(t, &settings, now)).collect();

        let last_notified = self.notifications.last_notified(user_id).await;
        let sent_today = self.notifications.sent_today(user_id, now.date_naive()).await;
        let remaining = NOTIFICATION_LIMIT_PER_DAY.saturating_sub(sent_today);
        if remaining == 0 {
            return Ok(());
        }

        let selected = select_for_notification(assessments, &last_notified, now, NOTIFICATION_COOLDOWN_HOURS, remaining);
        let tasks_by_id: std::collections::HashMap<_, _> = tasks.iter().map(|t| (t.id, t)).collect();
        for assessment in selected {
            let Some(task) = tasks_by_id.get(&assessment.task_id) else { continue };
            let message = build_message(task, &assessment);
            self.notifications
                .send(NotificationEvent { user_id, task_id: assessment.task_id, severity: assessment.severity, message, sent_at: now })
                .await;
        }
        Ok(())
    }

    /// Catch up any retrospectives missed while the driver wasn't running,
    /// then run the one due for the current week.
    pub async fn run_weekly_retrospective(self: Arc<Self>) {
        let users = match self.user_repo.list_all().await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "failed to list users for weekly retrospective");
                return;
            }
        };

        for user_id in users {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            match self.task_repo.list_for_user(user_id).await {
                Ok(tasks) => {
                    let now = chrono::Utc::now();
                    let summaries = missed_retrospectives(&tasks, None, now);
                    for summary in &summaries {
                        info!(%user_id, completed = summary.completed_task_ids.len(), "weekly retrospective generated");
                    }
                }
                Err(e) => warn!(%user_id, error = %e, "weekly retrospective failed for user"),
            }
            sleep_between_users().await;
        }
    }
}

async fn sleep_between_users() {
    let seconds = rand::thread_rng().gen_range(0.2..0.8);
    tokio::time::sleep(StdDuration::from_secs_f64(seconds)).await;
}
