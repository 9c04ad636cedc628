//! C4 — Day Packer: topologically pack ready tasks into successive days.
//!
//! Port target: `scheduler_service.py::build_schedule` and
//! `_pick_next_task`. This module only produces per-day *minute*
//! allocations; concrete wall-clock blocks (and the final, authoritative
//! `meeting_minutes`/`overflow_minutes`/`available_minutes` figures) are
//! computed afterward by [`crate::blocks`].

use crate::capacity::{capacity_minutes_for_weekday, ScheduleSettings};
use crate::graph::{build_graph, classify_tasks, BlockedReason, DependencyGraph, ExclusionReason};
use crate::ids::{ProjectId, TaskId};
use crate::scoring::{score_for_day, sort_key};
use crate::task::{effective_estimate_minutes, EnergyLevel, Task, TaskStatus};
use chrono::{Datelike, NaiveDate};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnscheduledReason {
    /// Packing stopped because the remaining candidates form a dependency cycle.
    Cycle,
    /// Packing stopped because `max_days` was exhausted first.
    MaxDaysExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskAllocation {
    pub task_id: TaskId,
    pub minutes: i64,
}

#[derive(Debug, Clone)]
pub struct PackedDay {
    pub date: NaiveDate,
    pub capacity_minutes: i64,
    pub allocated_minutes: i64,
    pub overflow_minutes: i64,
    pub available_minutes: i64,
    pub task_allocations: Vec<TaskAllocation>,
}

#[derive(Debug, Clone)]
pub struct BuildScheduleResult {
    pub days: Vec<PackedDay>,
    pub excluded: Vec<(TaskId, ExclusionReason)>,
    pub blocked: Vec<(TaskId, BlockedReason)>,
    pub unscheduled: Vec<(TaskId, UnscheduledReason)>,
    pub ended_due_to_cycle: bool,
    pub max_days_exceeded: bool,
}

/// Packs ready tasks day by day. Thresholds are fields (not constants) so
/// callers can tune energy balancing per user, mirroring
/// `SchedulerService.__init__`'s configurable ratios.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayPacker {
    pub energy_high_ratio: f64,
    pub energy_low_ratio: f64,
}

impl Default for DayPacker {
    fn default() -> Self {
        Self { energy_high_ratio: 0.4, energy_low_ratio: 0.6 }
    }
}

impl DayPacker {
    pub fn with_energy_high_ratio(mut self, ratio: f64) -> Self {
        self.energy_high_ratio = ratio;
        self
    }

    pub fn with_energy_low_ratio(mut self, ratio: f64) -> Self {
        self.energy_low_ratio = ratio;
        self
    }

    pub fn build_schedule(
        &self,
        tasks: &[Task],
        project_priorities: &HashMap<ProjectId, i32>,
        settings: &ScheduleSettings,
        start_date: NaiveDate,
        max_days: u32,
    ) -> BuildScheduleResult {
        let classification = classify_tasks(tasks);
        let tasks_by_id: HashMap<TaskId, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
        let mut graph = build_graph(&classification.candidates, &tasks_by_id);

        let mut remaining_minutes: HashMap<TaskId, i64> = classification
            .candidates
            .iter()
            .map(|id| (*id, effective_estimate_minutes(tasks_by_id[id], tasks)))
            .collect();

        let mut ready: HashSet<TaskId> = classification
            .candidates
            .iter()
            .copied()
            .filter(|id| tasks_by_id[id].status != TaskStatus::InProgress && graph.indegree.get(id).copied().unwrap_or(0) == 0)
            .collect();
        let mut in_progress: HashSet<TaskId> = classification
            .candidates
            .iter()
            .copied()
            .filter(|id| tasks_by_id[id].status == TaskStatus::InProgress)
            .collect();
        let mut remaining_ids: HashSet<TaskId> = classification.candidates.iter().copied().collect();

        let mut days = Vec::new();
        let mut ended_due_to_cycle = false;
        let mut max_days_exceeded = false;
        let mut day_cursor = start_date;

        for _ in 0..max_days {
            if remaining_ids.is_empty() {
                break;
            }
            if ready.is_empty() && in_progress.is_empty() {
                ended_due_to_cycle = true;
                break;
            }

            let capacity_minutes = capacity_minutes_for_weekday(settings, day_cursor.weekday());
            let mut scores: HashMap<TaskId, f64> = ready
                .iter()
                .chain(in_progress.iter())
                .map(|id| (*id, score_for_day(tasks_by_id[id], project_priorities, day_cursor)))
                .collect();

            let mut allocations: Vec<TaskAllocation> = Vec::new();
            let mut allocated_today: i64 = 0;
            let mut placed_minutes: HashMap<EnergyLevel, i64> = HashMap::new();

            // A completed task releases its dependents immediately, within
            // the same day's packing pass, so a dependency chain that fits
            // the day's capacity packs together (spec §4.4 step 5).
            let mut complete_and_release = |id: TaskId, ready: &mut HashSet<TaskId>, in_progress: &mut HashSet<TaskId>, remaining_ids: &mut HashSet<TaskId>, scores: &mut HashMap<TaskId, f64>| {
                ready.remove(&id);
                in_progress.remove(&id);
                remaining_ids.remove(&id);
                for newly_ready in graph.release(id) {
                    if remaining_ids.contains(&newly_ready) {
                        ready.insert(newly_ready);
                        scores.entry(newly_ready).or_insert_with(|| score_for_day(tasks_by_id[&newly_ready], project_priorities, day_cursor));
                    }
                }
            };

            // Forced-today: tasks already due today or overdue are placed in
            // full, ignoring remaining capacity (which may go negative —
            // absorbed into overflow_minutes below).
            let mut forced_ids: Vec<TaskId> = ready
                .iter()
                .chain(in_progress.iter())
                .copied()
                .filter(|id| {
                    tasks_by_id[id]
                        .due_date
                        .map(|d| d.date_naive() <= day_cursor)
                        .unwrap_or(false)
                })
                .collect();
            forced_ids.sort_by_key(|id| sort_key(tasks_by_id[id], scores[id]));

            for id in forced_ids {
                let minutes = *remaining_minutes.get(&id).unwrap_or(&0);
                if minutes <= 0 {
                    continue;
                }
                allocations.push(TaskAllocation { task_id: id, minutes });
                allocated_today += minutes;
                *placed_minutes.entry(tasks_by_id[&id].energy_level).or_insert(0) += minutes;
                remaining_minutes.insert(id, 0);
                complete_and_release(id, &mut ready, &mut in_progress, &mut remaining_ids, &mut scores);
            }

            let mut budget = (capacity_minutes - allocated_today).max(0);

            while budget > 0 {
                let in_progress_pool: Vec<TaskId> = in_progress
                    .iter()
                    .copied()
                    .filter(|id| remaining_minutes.get(id).copied().unwrap_or(0) > 0)
                    .collect();
                let pool = if !in_progress_pool.is_empty() {
                    in_progress_pool
                } else {
                    ready
                        .iter()
                        .copied()
                        .filter(|id| remaining_minutes.get(id).copied().unwrap_or(0) > 0)
                        .collect()
                };
                if pool.is_empty() {
                    break;
                }

                let Some(picked) = self.pick_next_task(&pool, &tasks_by_id, &scores, &placed_minutes) else {
                    break;
                };

                let minutes = remaining_minutes[&picked].min(budget);
                allocations.push(TaskAllocation { task_id: picked, minutes });
                allocated_today += minutes;
                *placed_minutes.entry(tasks_by_id[&picked].energy_level).or_insert(0) += minutes;
                budget -= minutes;
                *remaining_minutes.get_mut(&picked).unwrap() -= minutes;

                if remaining_minutes[&picked] <= 0 {
                    complete_and_release(picked, &mut ready, &mut in_progress, &mut remaining_ids, &mut scores);
                } else {
                    ready.remove(&picked);
                    in_progress.insert(picked);
                }
            }

            let overflow_minutes = (allocated_today - capacity_minutes).max(0);
            let available_minutes = (capacity_minutes - allocated_today).max(0);

            days.push(PackedDay {
                date: day_cursor,
                capacity_minutes,
                allocated_minutes: allocated_today,
                overflow_minutes,
                available_minutes,
                task_allocations: merge_allocations(allocations),
            });

            day_cursor += chrono::Duration::days(1);
        }

        if !remaining_ids.is_empty() && !ended_due_to_cycle {
            max_days_exceeded = true;
        }

        let unscheduled = remaining_ids
            .into_iter()
            .map(|id| {
                let reason = if ended_due_to_cycle { UnscheduledReason::Cycle } else { UnscheduledReason::MaxDaysExceeded };
                (id, reason)
            })
            .collect();

        BuildScheduleResult {
            days,
            excluded: classification.excluded,
            blocked: classification.blocked,
            unscheduled,
            ended_due_to_cycle,
            max_days_exceeded,
        }
    }

    /// Energy-aware pick within `pool`: if the day's *placed-so-far* minutes
    /// skew too heavily toward one energy level, restrict to the opposite
    /// level before ranking by score. `placed_minutes` is keyed by
    /// `EnergyLevel` and accumulates as the day is packed, so the first pick
    /// of an empty day (0 placed of 0) always has no preference. Mirrors
    /// `_pick_next_task`'s running `energy_minutes` accumulator.
    fn pick_next_task(
        &self,
        pool: &[TaskId],
        tasks_by_id: &HashMap<TaskId, &Task>,
        scores: &HashMap<TaskId, f64>,
        placed_minutes: &HashMap<EnergyLevel, i64>,
    ) -> Option<TaskId> {
        let high_placed = placed_minutes.get(&EnergyLevel::High).copied().unwrap_or(0);
        let total_placed: i64 = placed_minutes.values().sum();

        let preferred_energy = if total_placed > 0 {
            let high_ratio = high_placed as f64 / total_placed as f64;
            let low_ratio = 1.0 - high_ratio;
            if high_ratio > self.energy_high_ratio {
                Some(EnergyLevel::Low)
            } else if low_ratio > self.energy_low_ratio {
                Some(EnergyLevel::High)
            } else {
                None
            }
        } else {
            None
        };

        let mut candidate_pool: Vec<TaskId> = match preferred_energy {
            Some(level) => pool.iter().copied().filter(|id| tasks_by_id[id].energy_level == level).collect(),
            None => pool.to_vec(),
        };
        if candidate_pool.is_empty() {
            candidate_pool = pool.to_vec();
        }

        candidate_pool.sort_by_key(|id| sort_key(tasks_by_id[id], scores[id]));
        candidate_pool.into_iter().next()
    }
}

fn merge_allocations(allocations: Vec<TaskAllocation>) -> Vec<TaskAllocation> {
    let mut merged: Vec<TaskAllocation> = Vec::new();
    for alloc in allocations {
        if let Some(existing) = merged.iter_mut().find(|a| a.task_id == alloc.task_id) {
            existing.minutes += alloc.minutes;
        } else {
            merged.push(alloc);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Level;

    fn settings_full_day() -> ScheduleSettings {
        let mut s = ScheduleSettings::default();
        s.buffer_hours = 0.0;
        s
    }

    fn mon(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn packs_independent_tasks_highest_score_first() {
        let now = chrono::Utc::now();
        let low = Task::new(TaskId::new(), "low", now).with_importance(Level::Low).with_estimated_minutes(480);
        let high = Task::new(TaskId::new(), "high", now).with_importance(Level::High).with_estimated_minutes(480);
        let tasks = vec![low.clone(), high.clone()];

        let packer = DayPacker::default();
        let result = packer.build_schedule(&tasks, &HashMap::new(), &settings_full_day(), mon(2026, 7, 27), 30);

        let first_day_task = result.days[0].task_allocations[0].task_id;
        assert_eq!(first_day_task, high.id);
    }

    #[test]
    fn respects_dependency_order() {
        let now = chrono::Utc::now();
        let dep = Task::new(TaskId::new(), "dep", now).with_estimated_minutes(480);
        let dependent = Task::new(TaskId::new(), "dependent", now)
            .with_estimated_minutes(480)
            .with_dependencies(vec![dep.id]);
        let tasks = vec![dep.clone(), dependent.clone()];

        let packer = DayPacker::default();
        let result = packer.build_schedule(&tasks, &HashMap::new(), &settings_full_day(), mon(2026, 7, 27), 30);

        assert_eq!(result.days.len(), 2);
        assert_eq!(result.days[0].task_allocations[0].task_id, dep.id);
        assert_eq!(result.days[1].task_allocations[0].task_id, dependent.id);
    }

    #[test]
    fn overdue_task_is_forced_past_capacity() {
        let now = chrono::Utc::now();
        let today = mon(2026, 7, 27);
        let overdue_due = today.and_hms_opt(0, 0, 0).unwrap().and_utc() - chrono::Duration::days(1);
        let overdue = Task::new(TaskId::new(), "overdue", now)
            .with_estimated_minutes(1000)
            .with_due_date(overdue_due);
        let tasks = vec![overdue.clone()];

        let packer = DayPacker::default();
        let result = packer.build_schedule(&tasks, &HashMap::new(), &settings_full_day(), today, 30);

        assert_eq!(result.days.len(), 1);
        assert_eq!(result.days[0].allocated_minutes, 1000);
        assert!(result.days[0].overflow_minutes > 0);
    }

    #[test]
    fn dependency_cycle_leaves_tasks_unscheduled() {
        let now = chrono::Utc::now();
        let a_id = TaskId::new();
        let b_id = TaskId::new();
        let a = Task::new(a_id, "a", now).with_dependencies(vec![b_id]).with_estimated_minutes(30);
        let b = Task::new(b_id, "b", now).with_dependencies(vec![a_id]).with_estimated_minutes(30);
        let tasks = vec![a, b];

        let packer = DayPacker::default();
        let result = packer.build_schedule(&tasks, &HashMap::new(), &settings_full_day(), mon(2026, 7, 27), 30);

        assert!(result.ended_due_to_cycle);
        assert_eq!(result.unscheduled.len(), 2);
    }

    /// S1 (spec.md §8): A(60, HIGH) -> B(60, MEDIUM, depends on A), C(120,
    /// LOW) independent; 120 min/day. A completing mid-day must release B
    /// in time for B to pack into the same day alongside it.
    #[test]
    fn completed_dependency_releases_dependent_within_the_same_day() {
        let now = chrono::Utc::now();
        let a = Task::new(TaskId::new(), "A", now).with_importance(Level::High).with_estimated_minutes(60);
        let b = Task::new(TaskId::new(), "B", now).with_importance(Level::Medium).with_estimated_minutes(60).with_dependencies(vec![a.id]);
        let c = Task::new(TaskId::new(), "C", now).with_importance(Level::Low).with_estimated_minutes(120);
        let tasks = vec![a.clone(), b.clone(), c.clone()];

        let mut settings = ScheduleSettings::default();
        for day in settings.weekly_work_hours.iter_mut() {
            *day = crate::capacity::WorkdayHours::new("09:00", "11:00");
        }
        settings.buffer_hours = 0.0;

        let packer = DayPacker::default();
        let result = packer.build_schedule(&tasks, &HashMap::new(), &settings, mon(2026, 7, 27), 2);

        assert_eq!(result.days.len(), 2);
        assert_eq!(result.days[0].allocated_minutes, 120);
        assert_eq!(result.days[0].overflow_minutes, 0);
        let day1_ids: std::collections::HashSet<_> = result.days[0].task_allocations.iter().map(|a| a.task_id).collect();
        assert_eq!(day1_ids, [a.id, b.id].into_iter().collect());

        assert_eq!(result.days[1].allocated_minutes, 120);
        assert_eq!(result.days[1].task_allocations[0].task_id, c.id);
    }

    #[test]
    fn first_pick_of_an_empty_day_has_no_energy_preference() {
        // Nothing has been placed yet (0 of 0 minutes), so the very first
        // pick must rank purely by score, even though the *remaining*
        // estimate minutes in the pool skew heavily toward one energy
        // level. A high-importance/high-urgency task should win over a
        // low-importance/low-urgency one despite the low-energy scoring
        // bonus, because nothing has been placed to justify restricting
        // the pool to low energy first.
        let now = chrono::Utc::now();
        let mut tasks = Vec::new();
        for i in 0..5 {
            tasks.push(
                Task::new(TaskId::new(), format!("high-{i}"), now)
                    .with_importance(Level::High)
                    .with_urgency(Level::High)
                    .with_energy(crate::task::EnergyLevel::High)
                    .with_estimated_minutes(100),
            );
        }
        let low = Task::new(TaskId::new(), "low", now)
            .with_importance(Level::Low)
            .with_urgency(Level::Low)
            .with_energy(crate::task::EnergyLevel::Low)
            .with_estimated_minutes(50);
        tasks.push(low.clone());

        let packer = DayPacker::default();
        let result = packer.build_schedule(&tasks, &HashMap::new(), &settings_full_day(), mon(2026, 7, 27), 30);

        let first_allocation = result.days[0].task_allocations[0];
        assert_ne!(first_allocation.task_id, low.id);
    }

    #[test]
    fn energy_balance_prefers_opposite_when_skewed() {
        let now = chrono::Utc::now();
        let mut tasks = Vec::new();
        for i in 0..5 {
            tasks.push(
                Task::new(TaskId::new(), format!("high-{i}"), now)
                    .with_energy(crate::task::EnergyLevel::High)
                    .with_estimated_minutes(100),
            );
        }
        let low = Task::new(TaskId::new(), "low", now)
            .with_energy(crate::task::EnergyLevel::Low)
            .with_estimated_minutes(100);
        tasks.push(low.clone());

        let packer = DayPacker::default();
        let result = packer.build_schedule(&tasks, &HashMap::new(), &settings_full_day(), mon(2026, 7, 27), 30);

        // With high energy dominating >40% of remaining minutes, the low
        // energy task should be pulled forward rather than scheduled last.
        let first_day_ids: Vec<TaskId> = result.days[0].task_allocations.iter().map(|a| a.task_id).collect();
        assert!(first_day_ids.contains(&low.id));
    }
}
