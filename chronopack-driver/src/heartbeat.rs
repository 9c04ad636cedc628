//! Task "at-risk" heartbeat: risk-score every non-same-day candidate task,
//! classify severity, and draft a notification for the ones that clear the
//! cooldown/rate-limit gates.
//!
//! Port target: `task_heartbeat_service.py`. The LLM-authored chat message
//! is out of scope; `build_message` produces a deterministic fallback
//! template instead (`_build_fallback_message`'s non-LLM branch).

use chronopack_core::{capacity_minutes_for_weekday, Level, ScheduleSettings, Task, TaskStatus};
use chrono::{DateTime, Timelike, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub task_id: chronopack_core::TaskId,
    pub score: f64,
    pub severity: Severity,
    pub slack_days: i64,
}

const IMPORTANCE_WEIGHTS: [(Level, f64); 3] = [(Level::High, 16.0), (Level::Medium, 8.0), (Level::Low, 4.0)];

fn importance_weight(level: Level) -> f64 {
    IMPORTANCE_WEIGHTS.iter().find(|(l, _)| *l == level).map(|(_, w)| *w).unwrap_or(8.0)
}

fn time_pressure_score(slack_days: i64) -> f64 {
    match slack_days {
        s if s <= -1 => 40.0,
        0 => 35.0,
        1 => 28.0,
        2 => 20.0,
        3 => 12.0,
        _ => 6.0,
    }
}

fn staleness_score(days_since_update: i64) -> f64 {
    match days_since_update {
        d if d >= 14 => 20.0,
        d if d >= 7 => 12.0,
        d if d >= 3 => 6.0,
        _ => 0.0,
    }
}

fn severity_from_slack(slack_days: i64) -> Severity {
    if slack_days < 0 {
        Severity::Critical
    } else if slack_days <= 1 {
        Severity::High
    } else if slack_days <= 3 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// A representative per-task daily capacity in minutes, used only to convert
/// an estimate into a required-days figure. Averages the week's enabled
/// workdays; falls back to a full 8-hour day when every day is disabled.
fn daily_capacity_per_task_minutes(settings: &ScheduleSettings) -> f64 {
    use chrono::Weekday::*;
    let minutes: Vec<i64> = [Mon, Tue, Wed, Thu, Fri, Sat, Sun]
        .into_iter()
        .map(|weekday| capacity_minutes_for_weekday(settings, weekday))
        .filter(|m| *m > 0)
        .collect();
    if minutes.is_empty() {
        480.0
    } else {
        minutes.iter().sum::<i64>() as f64 / minutes.len() as f64
    }
}

/// Evaluate the risk score for one task. Returns `None` for tasks excluded
/// from risk evaluation entirely: DONE tasks, tasks with no due date, and
/// same-day tasks (`start_not_before.date() == due_date.date()`).
pub fn assess_task(task: &Task, settings: &ScheduleSettings, now: DateTime<Utc>) -> Option<RiskAssessment> {
    if task.status == TaskStatus::Done {
        return None;
    }
    let due_date = task.due_date?;
    if let Some(start) = task.start_not_before {
        if start.date_naive() == due_date.date_naive() {
            return None;
        }
    }

    let days_remaining = (due_date.date_naive() - now.date_naive()).num_days();
    let estimate = task.estimated_minutes.unwrap_or(chronopack_core::DEFAULT_TASK_MINUTES);

    let daily_capacity = daily_capacity_per_task_minutes(settings);
    let required_days = (estimate as f64 / daily_capacity).ceil() as i64;
    let slack_days = (days_remaining + 1) - required_days;

    let mut score = importance_weight(task.importance);
    score += time_pressure_score(slack_days);
    score += staleness_score((now - task.updated_at).num_days());
    if task.estimated_minutes.is_none() {
        score += 12.0;
    }
    if days_remaining < 0 {
        score += 10.0;
    }

    Some(RiskAssessment { task_id: task.id, score, severity: severity_from_slack(slack_days), slack_days })
}

/// Deterministic fallback notification body — no LLM drafting.
pub fn build_message(task: &Task, assessment: &RiskAssessment) -> String {
    match assessment.severity {
        Severity::Critical => format!("\"{}\" is overdue or out of slack — it needs attention today.", task.title),
        Severity::High => format!("\"{}\" has little slack left before its due date.", task.title),
        Severity::Medium => format!("\"{}\" is on track but slipping; consider making progress soon.", task.title),
        Severity::Low => format!("\"{}\" is still comfortably on schedule.", task.title),
    }
}

pub struct NotificationWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for NotificationWindow {
    fn default() -> Self {
        Self { start_hour: 9, end_hour: 21 }
    }
}

impl NotificationWindow {
    pub fn contains(&self, local_now: DateTime<chrono_tz::Tz>) -> bool {
        let hour = local_now.hour();
        hour >= self.start_hour && hour < self.end_hour
    }
}

/// Filter+rank candidates notified outside their cooldown window, then cap
/// at `notification_limit_per_day`, highest severity/score first. Mirrors
/// the cooldown + daily-cap gating in `task_heartbeat_service.py`.
pub fn select_for_notification(
    assessments: Vec<RiskAssessment>,
    last_notified: &HashMap<chronopack_core::TaskId, DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown_hours: i64,
    notification_limit_per_day: usize,
) -> Vec<RiskAssessment> {
    let cooldown_since = now - chrono::Duration::hours(cooldown_hours);

    let mut eligible: Vec<RiskAssessment> = assessments
        .into_iter()
        .filter(|a| a.severity >= Severity::Medium)
        .filter(|a| last_notified.get(&a.task_id).map(|t| *t < cooldown_since).unwrap_or(true))
        .collect();

    eligible.sort_by(|a, b| b.severity.cmp(&a.severity).then(b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)));
    eligible.truncate(notification_limit_per_day);
    eligible
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronopack_core::{ScheduleSettings, Task, TaskId};

    fn days_from_now(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        now + chrono::Duration::days(days)
    }

    #[test]
    fn done_tasks_are_never_assessed() {
        let now = Utc::now();
        let settings = ScheduleSettings::default();
        let task = Task::new(TaskId::new(), "t", now).with_status(TaskStatus::Done).with_due_date(days_from_now(now, 1));
        assert!(assess_task(&task, &settings, now).is_none());
    }

    #[test]
    fn same_day_tasks_are_excluded() {
        let now = Utc::now();
        let settings = ScheduleSettings::default();
        let due = days_from_now(now, 2);
        let task = Task::new(TaskId::new(), "t", now).with_due_date(due).with_start_not_before(due);
        assert!(assess_task(&task, &settings, now).is_none());
    }

    #[test]
    fn overdue_task_is_critical() {
        let now = Utc::now();
        let settings = ScheduleSettings::default();
        let task = Task::new(TaskId::new(), "t", now).with_due_date(days_from_now(now, -1)).with_estimated_minutes(60);
        let assessment = assess_task(&task, &settings, now).unwrap();
        assert_eq!(assessment.severity, Severity::Critical);
    }

    #[test]
    fn ample_slack_is_low_severity() {
        let now = Utc::now();
        let settings = ScheduleSettings::default();
        let task = Task::new(TaskId::new(), "t", now).with_due_date(days_from_now(now, 30)).with_estimated_minutes(30);
        let assessment = assess_task(&task, &settings, now).unwrap();
        assert_eq!(assessment.severity, Severity::Low);
    }

    #[test]
    fn selection_respects_cooldown_and_cap() {
        let now = Utc::now();
        let a = RiskAssessment { task_id: TaskId::new(), score: 50.0, severity: Severity::Critical, slack_days: -2 };
        let b = RiskAssessment { task_id: TaskId::new(), score: 40.0, severity: Severity::High, slack_days: 1 };
        let mut last_notified = HashMap::new();
        last_notified.insert(a.task_id, now - chrono::Duration::hours(1));

        let selected = select_for_notification(vec![a.clone(), b.clone()], &last_notified, now, 24, 5);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].task_id, b.task_id);
    }
}
