//! Maintenance schedule mirror and due-task notifier.
//!
//! The foreground page owns the schedule and pushes it wholesale; the worker
//! keeps an in-memory copy and raises a notification when a task is about to
//! fall due, even with no page open.

pub mod notifier;
pub mod state;
pub mod tasks;

pub use notifier::{DueReport, InteractionOutcome, ScheduleNotifier, TriggerOutcome};
pub use state::ScheduleState;
pub use tasks::{ScheduledTask, TaskId};
