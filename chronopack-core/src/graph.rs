//! C2 — Task Filter & Graph Builder.
//!
//! Port target: `scheduler_service.py::build_schedule`'s exclusion and
//! dependency-DAG setup (the part that runs before the day-by-day packing
//! loop).

use crate::ids::TaskId;
use crate::task::{Task, TaskStatus};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Status is WAITING.
    Waiting,
    /// Has at least one child task (parents are never scheduled directly).
    ParentTask,
    /// Already DONE; nothing to schedule.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedReason {
    /// A dependency id does not refer to any known task.
    DependencyMissing,
    /// A dependency exists but is neither DONE nor itself a schedulable candidate.
    DependencyUnresolved,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub excluded: Vec<(TaskId, ExclusionReason)>,
    pub blocked: Vec<(TaskId, BlockedReason)>,
    pub candidates: Vec<TaskId>,
}

/// Classify every task into excluded / blocked / schedulable-candidate,
/// mirroring the exclusion + dependency-blocking pass at the top of
/// `build_schedule`.
pub fn classify_tasks(tasks: &[Task]) -> Classification {
    let all_by_id: HashMap<TaskId, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
    let mut excluded = Vec::new();
    let mut provisional: Vec<&Task> = Vec::new();

    for task in tasks {
        if task.status == TaskStatus::Done {
            excluded.push((task.id, ExclusionReason::Done));
        } else if task.status == TaskStatus::Waiting {
            excluded.push((task.id, ExclusionReason::Waiting));
        } else if task.is_parent(tasks) {
            excluded.push((task.id, ExclusionReason::ParentTask));
        } else {
            provisional.push(task);
        }
    }

    let provisional_ids: HashSet<TaskId> = provisional.iter().map(|t| t.id).collect();

    let mut blocked = Vec::new();
    let mut candidates = Vec::new();
    for task in &provisional {
        let mut block_reason = None;
        for dep_id in &task.dependency_ids {
            match all_by_id.get(dep_id) {
                None => {
                    block_reason = Some(BlockedReason::DependencyMissing);
                    break;
                }
                Some(dep) if dep.status == TaskStatus::Done => continue,
                Some(_) if provisional_ids.contains(dep_id) => continue,
                Some(_) => {
                    block_reason = Some(BlockedReason::DependencyUnresolved);
                    break;
                }
            }
        }
        match block_reason {
            Some(reason) => blocked.push((task.id, reason)),
            None => candidates.push(task.id),
        }
    }

    Classification { excluded, blocked, candidates }
}

/// Dependency DAG restricted to the schedulable candidate set: `dependents`
/// maps a task to the candidates that depend on it; `indegree` counts
/// unresolved candidate dependencies remaining per task.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub dependents: HashMap<TaskId, Vec<TaskId>>,
    pub indegree: HashMap<TaskId, i32>,
}

impl DependencyGraph {
    /// Release a completed task's dependents, decrementing their indegree.
    /// Returns the ids that newly reached indegree zero (promoted to ready).
    pub fn release(&mut self, completed: TaskId) -> Vec<TaskId> {
        let mut newly_ready = Vec::new();
        if let Some(dependents) = self.dependents.get(&completed).cloned() {
            for dep in dependents {
                if let Some(count) = self.indegree.get_mut(&dep) {
                    *count -= 1;
                    if *count <= 0 {
                        newly_ready.push(dep);
                    }
                }
            }
        }
        newly_ready
    }
}

/// Build the dependency DAG over the candidate set only — dependencies on
/// tasks outside the candidate set were already resolved (DONE) or would
/// have been classified as blocked by [`classify_tasks`].
pub fn build_graph(candidates: &[TaskId], tasks_by_id: &HashMap<TaskId, &Task>) -> DependencyGraph {
    let candidate_set: HashSet<TaskId> = candidates.iter().copied().collect();
    let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
    let mut indegree: HashMap<TaskId, i32> = HashMap::new();

    for &id in candidates {
        indegree.entry(id).or_insert(0);
        if let Some(task) = tasks_by_id.get(&id) {
            for dep in &task.dependency_ids {
                if candidate_set.contains(dep) {
                    dependents.entry(*dep).or_default().push(id);
                    *indegree.entry(id).or_insert(0) += 1;
                }
            }
        }
    }

    DependencyGraph { dependents, indegree }
}

/// `true` if the candidate set still has unresolved ids but nothing has
/// zero indegree — i.e. a dependency cycle among candidates.
pub fn has_cycle(graph: &DependencyGraph, remaining: &HashSet<TaskId>, ready_or_active: &HashSet<TaskId>) -> bool {
    !remaining.is_empty() && ready_or_active.is_empty() && graph.indegree.values().all(|&d| d > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TaskId;
    use chrono::Utc;

    fn task(id: TaskId, now: chrono::DateTime<Utc>) -> Task {
        Task::new(id, "t", now)
    }

    #[test]
    fn done_and_waiting_and_parent_are_excluded() {
        let now = Utc::now();
        let done_id = TaskId::new();
        let waiting_id = TaskId::new();
        let parent_id = TaskId::new();
        let child_id = TaskId::new();

        let tasks = vec![
            task(done_id, now).with_status(TaskStatus::Done),
            task(waiting_id, now).with_status(TaskStatus::Waiting),
            task(parent_id, now),
            task(child_id, now).with_parent(parent_id),
        ];

        let classification = classify_tasks(&tasks);
        let excluded_ids: Vec<TaskId> = classification.excluded.iter().map(|(id, _)| *id).collect();
        assert!(excluded_ids.contains(&done_id));
        assert!(excluded_ids.contains(&waiting_id));
        assert!(excluded_ids.contains(&parent_id));
        assert!(classification.candidates.contains(&child_id));
    }

    #[test]
    fn missing_dependency_blocks_task() {
        let now = Utc::now();
        let ghost_dep = TaskId::new();
        let t = task(TaskId::new(), now).with_dependencies(vec![ghost_dep]);
        let classification = classify_tasks(&[t.clone()]);
        assert_eq!(classification.blocked.len(), 1);
        assert_eq!(classification.blocked[0].1, BlockedReason::DependencyMissing);
    }

    #[test]
    fn unresolved_dependency_blocks_until_done() {
        let now = Utc::now();
        let dep_id = TaskId::new();
        let dep = task(dep_id, now);
        let dependent = task(TaskId::new(), now).with_dependencies(vec![dep_id]);

        let classification = classify_tasks(&[dep, dependent]);
        assert_eq!(classification.blocked.len(), 1);
        assert_eq!(classification.blocked[0].1, BlockedReason::DependencyUnresolved);
    }

    #[test]
    fn release_promotes_dependents_at_zero_indegree() {
        let a = TaskId::new();
        let b = TaskId::new();
        let mut graph = DependencyGraph::default();
        graph.dependents.insert(a, vec![b]);
        graph.indegree.insert(b, 1);

        let ready = graph.release(a);
        assert_eq!(ready, vec![b]);
        assert_eq!(graph.indegree[&b], 0);
    }
}
