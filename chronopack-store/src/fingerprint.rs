//! C6 — fingerprinting: canonical-JSON hashes of every scheduling-relevant
//! task field, used to detect drift between a stored plan and live task
//! state.
//!
//! Port target: `daily_schedule_plan_service.py::_task_fingerprint` and
//! `_plan_params_fingerprint` (`json.dumps(payload, sort_keys=True)`).
//! `serde_json::Map` is a `BTreeMap` in this workspace (the
//! `preserve_order` feature is never enabled), so `to_string` already
//! yields sorted keys — the same guarantee `sort_keys=True` gives the
//! original.

use crate::plan::{PendingChange, PendingChangeKind, PlanParams, TaskPlanSnapshot};
use chronopack_core::Task;
use serde_json::json;
use std::collections::HashMap;

pub fn task_fingerprint(task: &Task) -> String {
    let mut dependency_ids: Vec<String> = task.dependency_ids.iter().map(|d| d.to_string()).collect();
    dependency_ids.sort();

    let touchpoint = task.touchpoint.as_ref().map(|t| {
        json!({
            "count": t.count,
            "minutes": t.minutes,
            "gap_days": t.gap_days,
            "steps": t.steps,
        })
    });

    let payload = json!({
        "estimated_minutes": task.estimated_minutes,
        "due_date": task.due_date.map(|d| d.to_rfc3339()),
        "start_not_before": task.start_not_before.map(|d| d.to_rfc3339()),
        "pinned_date": task.pinned_date.map(|d| d.to_rfc3339()),
        "parent_id": task.parent_id.map(|p| p.to_string()),
        "dependency_ids": dependency_ids,
        "same_day_allowed": task.is_fixed_time && task.is_all_day,
        "importance": format!("{:?}", task.importance),
        "urgency": format!("{:?}", task.urgency),
        "energy_level": format!("{:?}", task.energy_level),
        "is_fixed_time": task.is_fixed_time,
        "is_all_day": task.is_all_day,
        "fixed_start": task.fixed_start.map(|d| d.to_rfc3339()),
        "fixed_end": task.fixed_end.map(|d| d.to_rfc3339()),
        "touchpoint": touchpoint,
    });

    serde_json::to_string(&payload).unwrap_or_default()
}

pub fn plan_params_fingerprint(params: &PlanParams) -> String {
    serde_json::to_string(params).unwrap_or_default()
}

pub fn snapshot_for(task: &Task) -> TaskPlanSnapshot {
    TaskPlanSnapshot { task_id: task.id, title: task.title.clone(), fingerprint: task_fingerprint(task) }
}

/// Diff current tasks against a stored snapshot list: tasks present now but
/// not in the snapshot are `New`, tasks whose fingerprint changed are
/// `Updated`, tasks in the snapshot but no longer present are `Removed`.
/// Mirrors `_compute_pending_changes`.
pub fn compute_pending_changes(tasks: &[Task], snapshots: &[TaskPlanSnapshot]) -> Vec<PendingChange> {
    let snapshot_by_id: HashMap<_, _> = snapshots.iter().map(|s| (s.task_id, s)).collect();
    let mut changes = Vec::new();

    for task in tasks {
        match snapshot_by_id.get(&task.id) {
            None => changes.push(PendingChange { task_id: task.id, kind: PendingChangeKind::New }),
            Some(snapshot) if snapshot.fingerprint != task_fingerprint(task) => {
                changes.push(PendingChange { task_id: task.id, kind: PendingChangeKind::Updated })
            }
            Some(_) => {}
        }
    }

    let current_ids: std::collections::HashSet<_> = tasks.iter().map(|t| t.id).collect();
    for snapshot in snapshots {
        if !current_ids.contains(&snapshot.task_id) {
            changes.push(PendingChange { task_id: snapshot.task_id, kind: PendingChangeKind::Removed });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronopack_core::TaskId;
    use chrono::Utc;

    #[test]
    fn fingerprint_changes_when_estimate_changes() {
        let now = Utc::now();
        let task = Task::new(TaskId::new(), "t", now).with_estimated_minutes(30);
        let changed = task.clone().with_estimated_minutes(45);
        assert_ne!(task_fingerprint(&task), task_fingerprint(&changed));
    }

    #[test]
    fn fingerprint_is_stable_for_unchanged_task() {
        let now = Utc::now();
        let task = Task::new(TaskId::new(), "t", now).with_estimated_minutes(30);
        assert_eq!(task_fingerprint(&task), task_fingerprint(&task.clone()));
    }

    #[test]
    fn pending_changes_detects_new_updated_removed() {
        let now = Utc::now();
        let stays = Task::new(TaskId::new(), "stays", now).with_estimated_minutes(30);
        let updates = Task::new(TaskId::new(), "updates", now).with_estimated_minutes(30);
        let removed_id = TaskId::new();

        let snapshots = vec![
            snapshot_for(&stays),
            snapshot_for(&updates),
            TaskPlanSnapshot { task_id: removed_id, title: "gone".into(), fingerprint: "x".into() },
        ];

        let updated_task = updates.clone().with_estimated_minutes(90);
        let new_task = Task::new(TaskId::new(), "new", now);
        let current = vec![stays, updated_task, new_task.clone()];

        let changes = compute_pending_changes(&current, &snapshots);
        assert!(changes.iter().any(|c| c.task_id == new_task.id && c.kind == PendingChangeKind::New));
        assert!(changes.iter().any(|c| c.kind == PendingChangeKind::Updated));
        assert!(changes.iter().any(|c| c.task_id == removed_id && c.kind == PendingChangeKind::Removed));
    }
}
