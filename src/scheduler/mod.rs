//! Timer jobs that deliver planned reminders and DND toggles.

pub mod jobs;
pub mod replan;
pub mod sinks;

pub use jobs::{JobAction, PendingJob, ReminderScheduler};
pub use replan::{
    plan_for_preferences, replan_loop, replan_once, DEFAULT_CHANGE_POLL_SECS,
    DEFAULT_REPLAN_INTERVAL_SECS,
};
pub use sinks::{DndController, DndState, LogNotificationSink, LoggingDndController, NotificationSink};
