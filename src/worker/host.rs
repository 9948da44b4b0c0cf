//! Capabilities the worker runtime provides to event handlers.

use crate::error::{Result, WorkerError};
use crate::protocol::Notification;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An open page of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub focused: bool,
}

impl ClientInfo {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            focused: false,
        }
    }
}

/// Host-side effects available to the worker.
///
/// Implementations route these to whatever actually owns pages and the
/// notification tray: a browser shim, the stdio bridge, or a test double.
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// Open pages controlled by this worker, most recently focused first.
    async fn match_clients(&self) -> Result<Vec<ClientInfo>>;

    /// Post a JSON message to one page.
    async fn post_message(&self, client_id: &str, message: serde_json::Value) -> Result<()>;

    /// Show a system notification, replacing any with the same tag.
    async fn show_notification(&self, notification: &Notification) -> Result<()>;

    /// Close the notification with `tag`, if shown.
    async fn close_notification(&self, tag: &str) -> Result<()>;

    /// Bring an open page to the foreground.
    async fn focus_client(&self, client_id: &str) -> Result<()>;

    /// Open a new page at `url`.
    async fn open_window(&self, url: &str) -> Result<ClientInfo>;

    /// Activate a freshly installed worker without waiting for old pages to
    /// close.
    async fn skip_waiting(&self) -> Result<()> {
        Ok(())
    }

    /// Take control of every open page.
    async fn claim_clients(&self) -> Result<()> {
        Ok(())
    }

    /// Request a recurring background trigger.
    async fn register_periodic_sync(&self, tag: &str, _min_interval: Duration) -> Result<()> {
        Err(WorkerError::Lifecycle(format!(
            "periodic background sync not supported (tag {tag})"
        )))
    }
}
