//! C3 — Scoring Function.
//!
//! Port target: `scheduler_service.py::_calculate_base_score`,
//! `_calculate_due_bonus`, `_sort_task_ids`.

use crate::ids::ProjectId;
use crate::task::{Level, Task, TaskStatus};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

const IMPORTANCE_WEIGHTS: [(Level, f64); 3] = [(Level::High, 3.0), (Level::Medium, 2.0), (Level::Low, 1.0)];
const URGENCY_WEIGHTS: [(Level, f64); 3] = [(Level::High, 3.0), (Level::Medium, 2.0), (Level::Low, 1.0)];
const DEFAULT_PROJECT_PRIORITY: i32 = 5;
const PROJECT_PRIORITY_WEIGHT: f64 = 0.05;

const DUE_MAX_BONUS: f64 = 30.0;
const DUE_HORIZON_DAYS: f64 = 14.0;

fn weight_of(level: Level, table: &[(Level, f64); 3]) -> f64 {
    table.iter().find(|(l, _)| *l == level).map(|(_, w)| *w).unwrap_or(1.0)
}

/// The portion of the score that does not depend on the day being packed:
/// importance, urgency, in-progress bonus, low-energy bonus, project
/// priority multiplier. Mirrors `_calculate_base_score`.
pub fn base_score(task: &Task, project_priorities: &HashMap<ProjectId, i32>) -> f64 {
    let importance = weight_of(task.importance, &IMPORTANCE_WEIGHTS);
    let urgency = weight_of(task.urgency, &URGENCY_WEIGHTS);

    let mut score = importance * 10.0 + urgency * 8.0;
    if task.status == TaskStatus::InProgress {
        score += 2.0;
    }
    if task.energy_level == crate::task::EnergyLevel::Low {
        score += 1.0;
    }

    let project_priority = task
        .project_id
        .and_then(|p| project_priorities.get(&p).copied())
        .unwrap_or(DEFAULT_PROJECT_PRIORITY);
    score * (1.0 + project_priority as f64 * PROJECT_PRIORITY_WEIGHT)
}

/// Due-date proximity bonus, recomputed against whichever day is currently
/// being packed: overdue or due today scores the max bonus, due 14+ days
/// out scores zero, linear in between. Mirrors `_calculate_due_bonus`.
pub fn due_bonus(due_date: Option<DateTime<Utc>>, day_cursor: NaiveDate) -> f64 {
    let Some(due) = due_date else { return 0.0 };
    let days_until = (due.date_naive() - day_cursor).num_days() as f64;

    if days_until <= 0.0 {
        return DUE_MAX_BONUS;
    }
    if days_until >= DUE_HORIZON_DAYS {
        return 0.0;
    }
    let step = DUE_MAX_BONUS / DUE_HORIZON_DAYS;
    (DUE_MAX_BONUS - days_until * step).max(0.0)
}

/// Full score for `task` against the day currently being packed.
pub fn score_for_day(task: &Task, project_priorities: &HashMap<ProjectId, i32>, day_cursor: NaiveDate) -> f64 {
    base_score(task, project_priorities) + due_bonus(task.due_date, day_cursor)
}

/// Deterministic ordering: highest score first, then earliest due date
/// (tasks with no due date sort last), then earliest created. Mirrors
/// `_sort_task_ids`.
pub fn sort_key(task: &Task, score: f64) -> (i64, DateTime<Utc>, DateTime<Utc>) {
    // Negate and scale the score into an integer sort key so that NaN-free
    // floats compare reliably; six decimal digits of precision is far more
    // than the scoring formula ever produces.
    let neg_score = (-score * 1_000_000.0).round() as i64;
    let due = task.due_date.unwrap_or(DateTime::<Utc>::MAX_UTC);
    (neg_score, due, task.created_at)
}
