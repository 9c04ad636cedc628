//! chronopack-store: repository interfaces, in-memory reference
//! implementations, and the orchestration that turns `chronopack-core`'s
//! pure algorithm into persisted, drift-aware daily plans.

pub mod error;
pub mod fingerprint;
pub mod generation;
pub mod memory;
pub mod mutation;
pub mod plan;
pub mod repository;

pub use error::{Result, StoreError};
pub use fingerprint::{compute_pending_changes, plan_params_fingerprint, snapshot_for, task_fingerprint};
pub use generation::PlanGenerator;
pub use memory::{
    InMemoryDailySchedulePlanRepository, InMemoryProjectRepository, InMemoryScheduleSettingsRepository,
    InMemoryScheduleSnapshotRepository, InMemoryTaskAssignmentRepository, InMemoryTaskRepository, InMemoryUserRepository,
};
pub use mutation::{MoveBlockRequest, PlanMutator};
pub use plan::{
    DailySchedulePlan, PendingChange, PendingChangeKind, PlanLookup, PlanParams, PlanState, TaskPlanSnapshot,
};
pub use repository::{
    DailySchedulePlanRepository, PlanWindow, ProjectInfo, ProjectRepository, ProjectVisibility,
    ScheduleSettingsRepository, ScheduleSnapshotRepository, TaskAssignmentRepository, TaskRepository, UserRepository,
};
