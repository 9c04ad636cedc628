//! chronopack-core: the pure, synchronous scheduling algorithm.
//!
//! Capacity model (C1) → task filter & graph (C2) → scoring (C3) → day
//! packer (C4) → time-block builder (C5). No I/O, no async, no repository
//! knowledge — those live in `chronopack-store`.

pub mod blocks;
pub mod capacity;
pub mod graph;
pub mod ids;
pub mod packer;
pub mod scoring;
pub mod task;
pub mod time;

pub use blocks::{build_time_blocks, BlockKind, BlockStatus, ScheduleDay, ScheduleTimeBlock};
pub use capacity::{build_work_intervals, capacity_index, capacity_minutes_for_weekday, BreakInterval, ScheduleSettings, WorkdayHours};
pub use graph::{build_graph, classify_tasks, BlockedReason, Classification, DependencyGraph, ExclusionReason};
pub use ids::{PlanGroupId, ProjectId, TaskId, UserId};
pub use packer::{BuildScheduleResult, DayPacker, PackedDay, TaskAllocation, UnscheduledReason};
pub use scoring::{base_score, due_bonus, score_for_day};
pub use task::{effective_estimate_minutes, EnergyLevel, Importance, Level, Task, TaskStatus, TouchpointPlan, Urgency, DEFAULT_TASK_MINUTES};
pub use time::{
    clip_intervals_end, clip_intervals_start, merge_intervals, parse_local_deadline_to_utc, parse_time_to_minutes,
    subtract_intervals, sum_minutes, to_rfc3339_utc, TimeInterval,
};
