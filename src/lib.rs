//! Upkeep: offline asset cache and due-task notifier for a maintenance
//! reminder application.
//!
//! The crate models the application's background worker. It runs apart from
//! any visible page and does two things:
//!
//! - **Offline shell**: installs a versioned set of static assets through
//!   [`upkeep_cache`], removes stale generations on activation, and answers
//!   requests cache-first
//! - **Due reminders**: mirrors the maintenance schedule pushed by the page
//!   and raises a notification shortly before each task falls due
//!
//! # Architecture
//!
//! Events from the host flow through a single dispatcher loop:
//! - **Worker**: [`worker::WorkerDispatcher`] owns both components and the
//!   lifecycle state; [`worker::worker_channel`] serializes events
//! - **Scheduler**: [`scheduler::ScheduleNotifier`] evaluates the due window
//! - **Host**: [`worker::WorkerHost`] abstracts pages and notifications;
//!   [`host::stdio`] exposes the worker as a JSON-lines process

pub mod config;
pub mod error;
pub mod host;
pub mod protocol;
pub mod scheduler;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{Result, WorkerError};
pub use protocol::{Notification, WorkerMessage};
pub use scheduler::{ScheduleNotifier, ScheduledTask, TaskId};
pub use worker::{EventOutcome, WorkerDispatcher, WorkerEvent, WorkerHost};
