//! C5 — Time-Block Builder: turn per-day minute allocations into concrete,
//! non-overlapping wall-clock blocks.
//!
//! Port target: `daily_schedule_plan_service.py::_build_time_blocks`,
//! `_build_meeting_intervals`, `_meeting_minutes_before_now`. This module is
//! authoritative for `meeting_minutes` / `allocated_minutes` /
//! `overflow_minutes` / `available_minutes` — the day packer's own figures
//! are provisional because it does not know about meetings.

use crate::capacity::{build_work_intervals, capacity_index, ScheduleSettings};
use crate::ids::TaskId;
use crate::packer::PackedDay;
use crate::task::Task;
use crate::time::{clip_intervals_end, clip_intervals_start, merge_intervals, subtract_intervals, sum_minutes, TimeInterval};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Meeting,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    /// A live block that consumes the day's available capacity.
    Scheduled,
    /// A placeholder for a task already completed before `now` in a
    /// from-now regeneration; rendered for continuity but does not consume
    /// capacity and is excluded from `allocated_minutes`.
    Ghost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTimeBlock {
    pub task_id: TaskId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: BlockKind,
    pub status: BlockStatus,
    pub pinned_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct ScheduleDay {
    pub date: NaiveDate,
    pub capacity_minutes: i64,
    pub allocated_minutes: i64,
    pub overflow_minutes: i64,
    pub meeting_minutes: i64,
    pub available_minutes: i64,
    pub time_blocks: Vec<ScheduleTimeBlock>,
    /// Tasks pinned to this day whose full allocation didn't fit into the
    /// day's real slots (meetings ate into nominal capacity). A UI hint,
    /// not a second capacity budget — see DESIGN.md open-question decision.
    pub pinned_overflow_task_ids: Vec<TaskId>,
}

fn local_minutes_to_utc(date: NaiveDate, minutes: i32, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::new(date, chrono::NaiveTime::from_num_seconds_from_midnight_opt((minutes as u32) * 60, 0)?);
    tz.from_local_datetime(&naive).single().map(|dt| dt.with_timezone(&Utc))
}

fn local_date_and_minutes(instant: DateTime<Utc>, tz: Tz) -> (NaiveDate, i32) {
    let local = instant.with_timezone(&tz);
    (local.date_naive(), local.time().num_seconds_from_midnight() as i32 / 60)
}

use chrono::Timelike;

/// Merged, capacity-subtracting view of every fixed-time task landing on
/// `date` in `tz`. All-day tasks occupy the whole day. Mirrors
/// `_build_meeting_intervals`.
fn build_meeting_intervals(tasks: &[Task], date: NaiveDate, tz: Tz) -> Vec<TimeInterval> {
    let mut intervals = Vec::new();
    for task in tasks {
        if !task.is_fixed_time {
            continue;
        }
        if task.is_all_day {
            if let Some(start) = task.fixed_start {
                if local_date_and_minutes(start, tz).0 == date {
                    intervals.push(TimeInterval::new(0, 1440).unwrap());
                }
            }
            continue;
        }
        let (Some(start), Some(end)) = (task.fixed_start, task.fixed_end) else { continue };
        let (start_date, start_minutes) = local_date_and_minutes(start, tz);
        if start_date != date {
            continue;
        }
        let (end_date, end_minutes) = local_date_and_minutes(end, tz);
        let end_minutes = if end_date == date { end_minutes } else { 1440 };
        if let Some(iv) = TimeInterval::new(start_minutes, end_minutes) {
            intervals.push(iv);
        }
    }
    let mut intervals = intervals;
    merge_intervals(&mut intervals)
}

/// Per-task meeting blocks landing on `date`, emitted directly (not merged)
/// so each keeps its originating task id.
fn meeting_blocks_for(tasks: &[Task], date: NaiveDate, tz: Tz) -> Vec<ScheduleTimeBlock> {
    let mut blocks = Vec::new();
    for task in tasks {
        if !task.is_fixed_time {
            continue;
        }
        let Some(start) = task.fixed_start else { continue };
        if local_date_and_minutes(start, tz).0 != date {
            continue;
        }
        let (block_start, block_end) = if task.is_all_day {
            (
                local_minutes_to_utc(date, 0, tz).unwrap_or(start),
                local_minutes_to_utc(date, 1439, tz).unwrap_or(start),
            )
        } else {
            (start, task.fixed_end.unwrap_or(start))
        };
        blocks.push(ScheduleTimeBlock {
            task_id: task.id,
            start: block_start,
            end: block_end,
            kind: BlockKind::Meeting,
            status: BlockStatus::Scheduled,
            pinned_date: Some(date),
        });
    }
    blocks
}

/// Build wall-clock blocks for every packed day. `from_now`, when set,
/// truncates *today's* available intervals to start at `now` and exposes
/// the already-elapsed portion of the day for ghost placeholders of DONE
/// tasks pinned to today.
pub fn build_time_blocks(
    packed_days: &[PackedDay],
    tasks: &[Task],
    settings: &ScheduleSettings,
    tz: Tz,
    from_now: Option<DateTime<Utc>>,
) -> Vec<ScheduleDay> {
    let tasks_by_id: HashMap<TaskId, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
    let now_local = from_now.map(|n| local_date_and_minutes(n, tz));

    packed_days
        .iter()
        .map(|day| build_single_day(day, tasks, &tasks_by_id, settings, tz, now_local))
        .collect()
}

fn build_single_day(
    day: &PackedDay,
    tasks: &[Task],
    tasks_by_id: &HashMap<TaskId, &Task>,
    settings: &ScheduleSettings,
    tz: Tz,
    now_local: Option<(NaiveDate, i32)>,
) -> ScheduleDay {
    let workday = &settings.weekly_work_hours[capacity_index(day.date.weekday())];
    let free_intervals = build_work_intervals(workday);
    let meeting_intervals = build_meeting_intervals(tasks, day.date, tz);

    let available_base: Vec<TimeInterval> = free_intervals
        .iter()
        .flat_map(|iv| subtract_intervals(*iv, &meeting_intervals))
        .collect();

    let is_today_from_now = now_local.map(|(d, _)| d == day.date).unwrap_or(false);
    let now_minutes = now_local.map(|(_, m)| m);

    let mut available_future = available_base.clone();
    if is_today_from_now {
        if let Some(m) = now_minutes {
            available_future = clip_intervals_start(&available_base, m);
        }
    }

    let mut slots = available_future.clone();
    let mut blocks: Vec<ScheduleTimeBlock> = meeting_blocks_for(tasks, day.date, tz);
    let mut allocated_minutes: i64 = 0;
    let mut pinned_overflow_task_ids: Vec<TaskId> = Vec::new();
    let gap = settings.break_after_task_minutes.max(0);

    for alloc in &day.task_allocations {
        let mut remaining = alloc.minutes;
        while remaining > 0 {
            let Some(idx) = slots.iter().position(|s| s.len() > 0) else { break };
            let slot = slots[idx];
            let take = remaining.min(slot.len() as i64);
            let Some(start) = local_minutes_to_utc(day.date, slot.start_minutes, tz) else { break };
            let Some(end) = local_minutes_to_utc(day.date, slot.start_minutes + take as i32, tz) else { break };

            blocks.push(ScheduleTimeBlock {
                task_id: alloc.task_id,
                start,
                end,
                kind: BlockKind::Auto,
                status: BlockStatus::Scheduled,
                pinned_date: None,
            });
            allocated_minutes += take;
            remaining -= take;

            let new_start = (slot.start_minutes + take as i32 + gap).min(slot.end_minutes);
            if new_start < slot.end_minutes {
                slots[idx] = TimeInterval { start_minutes: new_start, end_minutes: slot.end_minutes };
            } else {
                slots.remove(idx);
            }
        }
        // `remaining > 0` here means the task's minutes didn't fit into
        // today's real slots (meetings ate into nominal capacity, or the
        // task was force-placed past capacity). Carryover across days is
        // the caller's responsibility (`PlanGenerator`); we only track the
        // pinned-to-today case, where the overflow is a UI hint rather than
        // a day-to-day defer.
        if remaining > 0 {
            if let Some(task) = tasks_by_id.get(&alloc.task_id) {
                if task.pinned_date.map(|d| d.date_naive()) == Some(day.date) {
                    pinned_overflow_task_ids.push(alloc.task_id);
                }
            }
        }
    }

    // Ghost blocks: DONE tasks pinned to today, rendered against the
    // already-elapsed portion of the day. They never touch `slots` / the
    // live `allocated_minutes` total.
    if is_today_from_now {
        if let Some(m) = now_minutes {
            let mut ghost_slots = clip_intervals_end(&available_base, m);
            for task in tasks {
                if !task.is_done() || task.pinned_date.map(|d| d.date_naive()) != Some(day.date) {
                    continue;
                }
                let mut remaining = task.estimated_minutes.unwrap_or(crate::task::DEFAULT_TASK_MINUTES);
                while remaining > 0 {
                    let Some(idx) = ghost_slots.iter().position(|s| s.len() > 0) else { break };
                    let slot = ghost_slots[idx];
                    let take = remaining.min(slot.len() as i64);
                    let Some(start) = local_minutes_to_utc(day.date, slot.start_minutes, tz) else { break };
                    let Some(end) = local_minutes_to_utc(day.date, slot.start_minutes + take as i32, tz) else { break };
                    blocks.push(ScheduleTimeBlock {
                        task_id: task.id,
                        start,
                        end,
                        kind: BlockKind::Auto,
                        status: BlockStatus::Ghost,
                        pinned_date: Some(day.date),
                    });
                    remaining -= take;
                    let new_start = slot.start_minutes + take as i32;
                    if new_start < slot.end_minutes {
                        ghost_slots[idx] = TimeInterval { start_minutes: new_start, end_minutes: slot.end_minutes };
                    } else {
                        ghost_slots.remove(idx);
                    }
                }
            }
        }
    }

    blocks.sort_by_key(|b| b.start);

    // Meetings already elapsed before `now` (from-now mode, today only) are
    // excluded from the minutes charged against capacity: they already
    // happened and didn't compete with any live allocation, so they
    // shouldn't make today look more over-booked than it actually is.
    let effective_meeting_intervals = if is_today_from_now {
        match now_minutes {
            Some(m) => clip_intervals_start(&meeting_intervals, m),
            None => meeting_intervals.clone(),
        }
    } else {
        meeting_intervals.clone()
    };
    let meeting_minutes = sum_minutes(&effective_meeting_intervals);
    let capacity_minutes = day.capacity_minutes;
    let overflow_minutes = (allocated_minutes - (capacity_minutes - meeting_minutes)).max(0);
    let available_minutes = (capacity_minutes - meeting_minutes - allocated_minutes).max(0);

    ScheduleDay {
        date: day.date,
        capacity_minutes,
        allocated_minutes,
        overflow_minutes,
        meeting_minutes,
        available_minutes,
        time_blocks: blocks,
        pinned_overflow_task_ids,
    }
}
