//! Lifecycle and functional events delivered to the worker.

use crate::protocol::NotificationData;
use crate::scheduler::{DueReport, InteractionOutcome};
use serde::{Deserialize, Serialize};
use upkeep_cache::{AssetRequest, CachedResponse};

/// An event the host delivers to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// First-time or upgraded worker installation.
    Install,
    /// The installed worker is taking control.
    Activate,
    /// A page requested a resource.
    Fetch { request: AssetRequest },
    /// A page posted a message.
    Message {
        #[serde(default)]
        data: serde_json::Value,
    },
    /// A periodic background trigger fired.
    PeriodicSync { tag: String },
    /// An on-demand background sync fired.
    Sync { tag: String },
    /// The user activated a shown notification.
    NotificationClick {
        tag: String,
        #[serde(default)]
        data: Option<NotificationData>,
    },
}

impl WorkerEvent {
    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Fetch { .. } => "fetch",
            Self::Message { .. } => "message",
            Self::PeriodicSync { .. } => "periodic_sync",
            Self::Sync { .. } => "sync",
            Self::NotificationClick { .. } => "notification_click",
        }
    }
}

/// What handling an event produced, reported back to the host once the
/// handler has settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Installed {
        cache_name: String,
        stored: usize,
    },
    Activated {
        cache_name: String,
        deleted: Vec<String>,
        failed: Vec<(String, String)>,
    },
    /// Response for an intercepted fetch. `None` when neither cache nor
    /// network could answer.
    Response { response: Option<CachedResponse> },
    /// Fetch not intercepted; the host performs it normally.
    Passthrough,
    ScheduleSynced { tasks: usize },
    MessageIgnored { reason: String },
    DueChecked { report: DueReport },
    SyncDeferred,
    TriggerIgnored,
    NotificationHandled { interaction: InteractionOutcome },
}
