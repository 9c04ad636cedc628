//! chronopack-driver: the in-process periodic control loop — daily plan
//! regeneration, task heartbeat risk scoring, and weekly retrospectives.
//!
//! An explicit, owned `PeriodicDriver` value with `start`/`stop`, not a
//! process-global singleton (see DESIGN.md).

pub mod driver;
pub mod heartbeat;
pub mod notifications;
pub mod retrospective;

pub use driver::PeriodicDriver;
pub use heartbeat::{assess_task, build_message, select_for_notification, NotificationWindow, RiskAssessment, Severity};
pub use notifications::{InMemoryNotificationSink, NotificationEvent, NotificationSink};
pub use retrospective::{calculate_last_friday, missed_retrospectives, RetrospectiveSummary};
