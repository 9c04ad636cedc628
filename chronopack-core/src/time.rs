//! Time utilities: timezone-aware deadlines and minute-interval arithmetic.
//!
//! The interval helpers port `daily_schedule_plan_service.py`'s
//! `TimeInterval` / `_subtract_intervals` / `_clip_intervals` family; the
//! deadline parser is the donor `rewind-core::time` module, kept as-is.

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Parse a deadline like "2026-02-20 23:59" in an IANA tz like "America/Chicago",
/// returning UTC.
pub fn parse_local_deadline_to_utc(local: &str, tz: &str) -> Result<DateTime<Utc>> {
    let tz: Tz = tz
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))?;

    let ndt = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M")
        .map_err(|e| anyhow::anyhow!("invalid local datetime '{local}': {e}"))?;

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}

/// Helper: format a UTC time into RFC3339.
pub fn to_rfc3339_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// A half-open interval of minutes-since-midnight, local to whatever day it
/// is anchored against. `start < end` is an invariant of every interval this
/// module hands back; callers never see an empty or inverted interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start_minutes: i32,
    pub end_minutes: i32,
}

impl TimeInterval {
    pub fn new(start_minutes: i32, end_minutes: i32) -> Option<Self> {
        if start_minutes < end_minutes {
            Some(Self { start_minutes, end_minutes })
        } else {
            None
        }
    }

    pub fn len(&self) -> i32 {
        self.end_minutes - self.start_minutes
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }

    fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start_minutes < other.end_minutes && other.start_minutes < self.end_minutes
    }
}

/// Parse "HH:MM" into minutes-since-midnight. Returns `None` on any
/// malformed input (wrong shape, out-of-range hour/minute) rather than an
/// error — callers degrade to "no capacity that day" on malformed settings,
/// mirroring `_parse_time_to_minutes`'s silent-`None` behavior.
pub fn parse_time_to_minutes(value: &str) -> Option<i32> {
    let (h, m) = value.split_once(':')?;
    let hour: i32 = h.trim().parse().ok()?;
    let minute: i32 = m.trim().parse().ok()?;
    if !(0..24).contains(&hour) || !(0..60).contains(&minute) {
        return None;
    }
    Some(hour * 60 + minute)
}

/// Subtract every interval in `subtrahends` from `base`, returning the
/// remaining pieces in ascending order. Mirrors `_subtract_intervals`.
pub fn subtract_intervals(base: TimeInterval, subtrahends: &[TimeInterval]) -> Vec<TimeInterval> {
    let mut remaining = vec![base];
    for cut in subtrahends {
        let mut next = Vec::with_capacity(remaining.len());
        for piece in remaining {
            if !piece.overlaps(cut) {
                next.push(piece);
                continue;
            }
            if cut.start_minutes > piece.start_minutes {
                if let Some(left) = TimeInterval::new(piece.start_minutes, cut.start_minutes.min(piece.end_minutes)) {
                    next.push(left);
                }
            }
            if cut.end_minutes < piece.end_minutes {
                if let Some(right) = TimeInterval::new(cut.end_minutes.max(piece.start_minutes), piece.end_minutes) {
                    next.push(right);
                }
            }
        }
        remaining = next;
    }
    remaining
}

/// Clip every interval to start no earlier than `from_minutes`, dropping
/// pieces that end before it. Used for "from now" truncation of today's
/// remaining capacity. Mirrors `_clip_intervals`.
pub fn clip_intervals_start(intervals: &[TimeInterval], from_minutes: i32) -> Vec<TimeInterval> {
    intervals
        .iter()
        .filter_map(|iv| TimeInterval::new(iv.start_minutes.max(from_minutes), iv.end_minutes))
        .collect()
}

/// Clip every interval to end no later than `until_minutes`. Mirrors
/// `_clip_intervals_end`, used to compute meeting minutes elapsed so far.
pub fn clip_intervals_end(intervals: &[TimeInterval], until_minutes: i32) -> Vec<TimeInterval> {
    intervals
        .iter()
        .filter_map(|iv| TimeInterval::new(iv.start_minutes, iv.end_minutes.min(until_minutes)))
        .collect()
}

/// Merge overlapping/adjacent intervals into their minimal covering set.
pub fn merge_intervals(intervals: &mut [TimeInterval]) -> Vec<TimeInterval> {
    let mut sorted: Vec<TimeInterval> = intervals.to_vec();
    sorted.sort_by_key(|iv| iv.start_minutes);

    let mut merged: Vec<TimeInterval> = Vec::new();
    for iv in sorted {
        match merged.last_mut() {
            Some(last) if iv.start_minutes <= last.end_minutes => {
                last.end_minutes = last.end_minutes.max(iv.end_minutes);
            }
            _ => merged.push(iv),
        }
    }
    merged
}

pub fn sum_minutes(intervals: &[TimeInterval]) -> i64 {
    intervals.iter().map(|iv| iv.len() as i64).sum()
}
