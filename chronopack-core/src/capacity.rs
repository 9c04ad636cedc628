//! C1 — Capacity Model: turn a weekly work-hour schedule into per-day
//! available minute-intervals.
//!
//! Port target: `daily_schedule_plan_service.py::_build_work_intervals`,
//! `_build_capacity_by_weekday`, `_apply_capacity_buffer`.

use crate::time::{parse_time_to_minutes, subtract_intervals, TimeInterval};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakInterval {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkdayHours {
    pub enabled: bool,
    pub start: String,
    pub end: String,
    pub breaks: Vec<BreakInterval>,
}

impl WorkdayHours {
    pub fn disabled() -> Self {
        Self { enabled: false, start: String::new(), end: String::new(), breaks: Vec::new() }
    }

    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self { enabled: true, start: start.into(), end: end.into(), breaks: Vec::new() }
    }

    pub fn with_break(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.breaks.push(BreakInterval { start: start.into(), end: end.into() });
        self
    }
}

/// Per-user capacity settings. Index 0 of `weekly_work_hours` is Sunday,
/// matching the donor convention `(weekday + 1) % 7` used to translate
/// `chrono::Weekday` (Monday = 0) into the settings array index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    pub weekly_work_hours: [WorkdayHours; 7],
    pub buffer_hours: f64,
    pub break_after_task_minutes: i32,
    pub timezone: String,
}

fn default_weekday() -> WorkdayHours {
    WorkdayHours::new("09:00", "18:00")
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            weekly_work_hours: [
                WorkdayHours::disabled(),
                default_weekday(),
                default_weekday(),
                default_weekday(),
                default_weekday(),
                default_weekday(),
                WorkdayHours::disabled(),
            ],
            buffer_hours: 1.0,
            break_after_task_minutes: 5,
            timezone: "UTC".to_string(),
        }
    }
}

/// capacity-array index for a `chrono::Weekday` (Monday = 0 → index 1, ...,
/// Sunday = 6 → index 0), matching `(weekday + 1) % 7` in the original.
pub fn capacity_index(weekday: chrono::Weekday) -> usize {
    (weekday.num_days_from_monday() as usize + 1) % 7
}

/// Build the free-work-time intervals for a single workday, with breaks
/// subtracted. Returns an empty vec for a disabled, malformed, or
/// zero/negative-length workday — never an error; a broken settings row
/// degrades to "no capacity" rather than failing the whole plan.
pub fn build_work_intervals(workday: &WorkdayHours) -> Vec<TimeInterval> {
    if !workday.enabled {
        return Vec::new();
    }
    let (Some(start), Some(end)) = (parse_time_to_minutes(&workday.start), parse_time_to_minutes(&workday.end)) else {
        return Vec::new();
    };
    let Some(base) = TimeInterval::new(start, end) else {
        return Vec::new();
    };

    let breaks: Vec<TimeInterval> = workday
        .breaks
        .iter()
        .filter_map(|b| {
            let bs = parse_time_to_minutes(&b.start)?;
            let be = parse_time_to_minutes(&b.end)?;
            TimeInterval::new(bs.max(start), be.min(end))
        })
        .collect();

    subtract_intervals(base, &breaks)
}

/// Available minutes for a given weekday after buffer_hours is applied.
/// `buffer_hours` represents a daily reserve (admin overhead, etc.) that is
/// never allocated to tasks. Mirrors `_apply_capacity_buffer`.
pub fn capacity_minutes_for_weekday(settings: &ScheduleSettings, weekday: chrono::Weekday) -> i64 {
    let workday = &settings.weekly_work_hours[capacity_index(weekday)];
    let raw_minutes: i64 = build_work_intervals(workday).iter().map(|iv| iv.len() as i64).sum();
    let buffer_minutes = (settings.buffer_hours * 60.0).round() as i64;
    (raw_minutes - buffer_minutes).max(0)
}
