//! Due-task detection and notification.
//!
//! [`ScheduleNotifier`] owns the worker's [`ScheduleState`] and reacts to three
//! inputs: schedule syncs from the page, background triggers, and user
//! interaction with a shown notification.

use crate::config::{NotificationConfig, ScheduleConfig};
use crate::error::Result;
use crate::protocol::{Notification, WorkerMessage};
use crate::scheduler::state::ScheduleState;
use crate::scheduler::tasks::{ScheduledTask, TaskId};
use crate::worker::host::WorkerHost;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of one due-check pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DueReport {
    /// Tasks evaluated.
    pub checked: usize,
    /// Tasks that entered the notified state in this pass.
    pub notified: Vec<TaskId>,
    /// Notified tasks whose system notification could not be shown.
    pub failed_notifications: Vec<TaskId>,
    /// Tasks skipped because their date or time does not parse.
    pub unparseable: Vec<TaskId>,
}

/// What a background trigger did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The periodic tag ran a due check.
    Checked(DueReport),
    /// The on-demand sync tag; reserved, nothing to do yet.
    Deferred,
    /// Unknown tag.
    Ignored,
}

/// How a notification interaction was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "client_id", rename_all = "snake_case")]
pub enum InteractionOutcome {
    /// An open page was brought to the foreground.
    Focused(String),
    /// No page was open; a new one was opened at the app root.
    Opened(String),
}

/// Mirrors the page's schedule and raises due notifications.
pub struct ScheduleNotifier {
    state: ScheduleState,
    schedule: ScheduleConfig,
    notification: NotificationConfig,
    app_root: String,
}

impl ScheduleNotifier {
    pub fn new(
        schedule: ScheduleConfig,
        notification: NotificationConfig,
        app_root: impl Into<String>,
    ) -> Self {
        Self {
            state: ScheduleState::new(),
            schedule,
            notification,
            app_root: app_root.into(),
        }
    }

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    /// Replace the snapshot with `schedules`. Returns the task count.
    pub fn receive_sync(&mut self, schedules: Vec<ScheduledTask>) -> usize {
        let count = self.state.replace(schedules);
        info!(tasks = count, sync = self.state.sync_count(), "schedule synced");
        count
    }

    /// Run a due check against the current local wall-clock time.
    pub async fn check_due(&mut self, host: &dyn WorkerHost) -> DueReport {
        let now = Local::now().naive_local();
        self.check_due_at(now, host).await
    }

    /// Run a due check as of `now`.
    ///
    /// Each task whose scheduled time lies strictly inside the due window is
    /// announced to every open page, shown as a notification, and marked
    /// notified. A notification failure is logged and does not stop the task
    /// from being marked.
    pub async fn check_due_at(&mut self, now: NaiveDateTime, host: &dyn WorkerHost) -> DueReport {
        let window = self.schedule.due_window();
        let mut report = DueReport {
            checked: self.state.len(),
            ..DueReport::default()
        };

        let due: Vec<ScheduledTask> = self
            .state
            .tasks()
            .iter()
            .filter(|task| {
                if task.scheduled_at().is_none() {
                    report.unparseable.push(task.id.clone());
                    return false;
                }
                task.is_due_within(now, window)
            })
            .cloned()
            .collect();

        if !report.unparseable.is_empty() {
            debug!(tasks = ?report.unparseable, "skipping tasks with unparseable schedule");
        }
        if due.is_empty() {
            return report;
        }

        let clients = match host.match_clients().await {
            Ok(clients) => clients,
            Err(e) => {
                warn!(error = %e, "failed to list open pages; notifying without them");
                Vec::new()
            }
        };

        for task in due {
            let message = WorkerMessage::TaskDue {
                task_id: task.id.clone(),
            }
            .to_value();
            for client in &clients {
                if let Err(e) = host.post_message(&client.id, message.clone()).await {
                    warn!(task = %task.id, client = %client.id, error = %e, "failed to post TASK_DUE");
                }
            }

            let notification = Notification::for_task(&task, &self.notification);
            if let Err(e) = host.show_notification(&notification).await {
                warn!(task = %task.id, error = %e, "failed to show notification");
                report.failed_notifications.push(task.id.clone());
            }

            self.state.mark_notified(&task.id);
            info!(task = %task.id, machine = %task.machine, "task due");
            report.notified.push(task.id);
        }

        report
    }

    /// Handle a periodic background trigger. Only the periodic tag runs a
    /// due check.
    pub async fn periodic_trigger(&mut self, tag: &str, host: &dyn WorkerHost) -> TriggerOutcome {
        if tag == self.schedule.periodic_tag {
            TriggerOutcome::Checked(self.check_due(host).await)
        } else {
            debug!(tag, "ignoring unknown periodic trigger tag");
            TriggerOutcome::Ignored
        }
    }

    /// Handle a one-off background sync trigger.
    pub fn sync_trigger(&self, tag: &str) -> TriggerOutcome {
        if tag == self.schedule.sync_tag {
            debug!(tag, "background sync trigger received; nothing to sync");
            TriggerOutcome::Deferred
        } else {
            debug!(tag, "ignoring unknown sync trigger tag");
            TriggerOutcome::Ignored
        }
    }

    /// Handle a click on a shown notification.
    ///
    /// Closes the notification, then focuses the most recently focused page
    /// or opens a new one at the app root.
    ///
    /// # Errors
    ///
    /// Returns an error when no page could be focused or opened.
    pub async fn on_notification_click(
        &self,
        tag: &str,
        host: &dyn WorkerHost,
    ) -> Result<InteractionOutcome> {
        if let Err(e) = host.close_notification(tag).await {
            warn!(tag, error = %e, "failed to close notification");
        }

        let clients = match host.match_clients().await {
            Ok(clients) => clients,
            Err(e) => {
                warn!(error = %e, "failed to list open pages; opening a new one");
                Vec::new()
            }
        };

        if let Some(client) = clients.first() {
            host.focus_client(&client.id).await?;
            return Ok(InteractionOutcome::Focused(client.id.clone()));
        }

        let opened = host.open_window(&self.app_root).await?;
        Ok(InteractionOutcome::Opened(opened.id))
    }
}
