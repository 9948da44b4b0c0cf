//! Page ↔ worker message protocol and notification payloads.
//!
//! Messages are JSON objects discriminated by a `type` field:
//!
//! - `SYNC_SCHEDULES { schedules }`: foreground page → worker
//! - `TASK_DUE { taskId }`: worker → every open page

use crate::config::NotificationConfig;
use crate::error::{Result, WorkerError};
use crate::scheduler::{ScheduledTask, TaskId};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// A message exchanged between the foreground page and the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Full replacement of the worker's schedule snapshot.
    SyncSchedules {
        #[serde(deserialize_with = "deserialize_tasks")]
        schedules: Vec<ScheduledTask>,
    },
    /// A task has entered its due window.
    TaskDue {
        #[serde(rename = "taskId")]
        task_id: TaskId,
    },
}

impl WorkerMessage {
    /// Parse a raw message payload.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Protocol`] for payloads that are not an object
    /// with a known `type` and well-formed fields.
    pub fn parse(raw: &serde_json::Value) -> Result<Self> {
        Self::deserialize(raw)
            .map_err(|e| WorkerError::Protocol(format!("unrecognised message: {e}")))
    }

    /// Wire name of the message type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SyncSchedules { .. } => "SYNC_SCHEDULES",
            Self::TaskDue { .. } => "TASK_DUE",
        }
    }

    /// Serialize to a JSON value for posting to a page.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::SyncSchedules { schedules } => serde_json::json!({
                "type": self.kind(),
                "schedules": schedules,
            }),
            Self::TaskDue { task_id } => serde_json::json!({
                "type": self.kind(),
                "taskId": task_id,
            }),
        }
    }
}

/// Deserialize a schedule list record by record, dropping malformed ones.
fn deserialize_tasks<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<ScheduledTask>, D::Error> {
    let records = Vec::<serde_json::Value>::deserialize(deserializer)?;
    let total = records.len();
    let tasks: Vec<ScheduledTask> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match ScheduledTask::deserialize(record) {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(index, error = %e, "skipping malformed task record");
                None
            }
        })
        .collect();
    if tasks.len() < total {
        warn!(kept = tasks.len(), total, "schedule sync contained malformed records");
    }
    Ok(tasks)
}

/// Data attached to a notification and returned on interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(rename = "taskId")]
    pub task_id: TaskId,
}

/// A user-visible system notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Deduplication tag; a new notification with the same tag replaces the
    /// old one.
    pub tag: String,
    pub require_interaction: bool,
    pub vibrate: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    pub data: NotificationData,
}

impl Notification {
    /// Build the due-task notification for `task`.
    #[must_use]
    pub fn for_task(task: &ScheduledTask, config: &NotificationConfig) -> Self {
        Self {
            title: format!("{} - Maintenance Due!", task.machine),
            body: format!("{} at {}", task.task_type, task.time),
            tag: task.id.to_string(),
            require_interaction: config.require_interaction,
            vibrate: config.vibrate.clone(),
            icon: config.icon.clone(),
            badge: config.badge.clone(),
            data: NotificationData {
                task_id: task.id.clone(),
            },
        }
    }
}
