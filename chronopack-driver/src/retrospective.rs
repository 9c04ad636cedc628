//! Weekly retrospective with missed-run catch-up.
//!
//! Port target: `background_scheduler.py::_calculate_last_friday` /
//! `_check_and_run_missed_personal`. Scoped to "has the user completed DONE
//! tasks since their last retrospective" — the LLM-authored achievement
//! prose is out of scope (chat/LLM orchestration is an explicit
//! collaborator Non-goal).

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use chronopack_core::Task;

/// The most recent Friday 00:00 boundary at or before `now`, rolled back an
/// extra week if it's currently before 01:00 on a Friday — avoids racing the
/// cron tick that fires at the same boundary.
pub fn calculate_last_friday(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_since_friday = (now.weekday().num_days_from_monday() as i64 + 7 - Weekday::Fri.num_days_from_monday() as i64) % 7;
    let mut boundary = (now - Duration::days(days_since_friday))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    if days_since_friday == 0 && now.hour() < 1 {
        boundary -= Duration::days(7);
    }
    boundary
}

#[derive(Debug, Clone)]
pub struct RetrospectiveSummary {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub completed_task_ids: Vec<chronopack_core::TaskId>,
}

/// Tasks completed strictly within `(period_start, period_end]`, keyed off
/// `updated_at` as the completion timestamp proxy (the core task model
/// carries no dedicated `completed_at` field).
fn completed_within(tasks: &[Task], period_start: DateTime<Utc>, period_end: DateTime<Utc>) -> Vec<chronopack_core::TaskId> {
    tasks
        .iter()
        .filter(|t| t.is_done() && t.updated_at > period_start && t.updated_at <= period_end)
        .map(|t| t.id)
        .collect()
}

/// Build one retrospective per missed boundary between `last_period_end`
/// (exclusive) and `now`'s most recent Friday boundary (inclusive),
/// skipping weeks where nothing completed. `last_period_end` is `None` for
/// a user with no prior retrospective — in that case a single period
/// ending at the most recent boundary is considered.
pub fn missed_retrospectives(tasks: &[Task], last_period_end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Vec<RetrospectiveSummary> {
    let latest_boundary = calculate_last_friday(now);
    let mut cursor = last_period_end.unwrap_or(latest_boundary - Duration::weeks(1));
    let mut summaries = Vec::new();

    while cursor < latest_boundary {
        let period_start = cursor;
        let period_end = (period_start + Duration::weeks(1)).min(latest_boundary);
        let completed = completed_within(tasks, period_start, period_end);
        if !completed.is_empty() {
            summaries.push(RetrospectiveSummary { period_start, period_end, completed_task_ids: completed });
        }
        cursor = period_end;
    }

    summaries
}
