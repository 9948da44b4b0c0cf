//! [`WorkerHost`] implementation that records state and emits effects.
//!
//! [`ChannelHost`] keeps the list of open pages and shown notifications that
//! the bridge has been told about, and turns every host call into a
//! [`HostEffect`] on an unbounded channel for the bridge to forward.

use crate::error::{Result, WorkerError};
use crate::protocol::Notification;
use crate::worker::host::{ClientInfo, WorkerHost};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Something the embedding host must carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEffect {
    PostMessage {
        client_id: String,
        message: serde_json::Value,
    },
    ShowNotification(Notification),
    CloseNotification {
        tag: String,
    },
    FocusClient {
        client_id: String,
    },
    OpenWindow {
        client_id: String,
        url: String,
    },
    SkipWaiting,
    ClaimClients,
    RegisterPeriodicSync {
        tag: String,
        min_interval_secs: u64,
    },
}

impl HostEffect {
    /// Wire name of the effect.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PostMessage { .. } => "client.post_message",
            Self::ShowNotification(_) => "notification.show",
            Self::CloseNotification { .. } => "notification.close",
            Self::FocusClient { .. } => "client.focus",
            Self::OpenWindow { .. } => "client.open_window",
            Self::SkipWaiting => "lifecycle.skip_waiting",
            Self::ClaimClients => "lifecycle.claim_clients",
            Self::RegisterPeriodicSync { .. } => "sync.register_periodic",
        }
    }

    /// Effect arguments as JSON.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::PostMessage { client_id, message } => {
                serde_json::json!({"client_id": client_id, "message": message})
            }
            Self::ShowNotification(notification) => {
                serde_json::to_value(notification).unwrap_or(serde_json::Value::Null)
            }
            Self::CloseNotification { tag } => serde_json::json!({"tag": tag}),
            Self::FocusClient { client_id } => serde_json::json!({"client_id": client_id}),
            Self::OpenWindow { client_id, url } => {
                serde_json::json!({"client_id": client_id, "url": url})
            }
            Self::SkipWaiting | Self::ClaimClients => serde_json::json!({}),
            Self::RegisterPeriodicSync {
                tag,
                min_interval_secs,
            } => serde_json::json!({"tag": tag, "min_interval_secs": min_interval_secs}),
        }
    }
}

#[derive(Debug, Default)]
struct HostState {
    /// Most recently focused first.
    clients: Vec<ClientInfo>,
    notifications: Vec<Notification>,
    periodic: Vec<(String, u64)>,
}

pub struct ChannelHost {
    state: Mutex<HostState>,
    effect_tx: mpsc::UnboundedSender<HostEffect>,
    periodic_sync: bool,
}

impl ChannelHost {
    /// Create a host and the receiver its effects arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostEffect>) {
        let (effect_tx, effect_rx) = mpsc::unbounded_channel();
        (
            Self {
                state: Mutex::new(HostState::default()),
                effect_tx,
                periodic_sync: true,
            },
            effect_rx,
        )
    }

    /// A host that refuses periodic trigger registration.
    #[must_use]
    pub fn without_periodic_sync() -> (Self, mpsc::UnboundedReceiver<HostEffect>) {
        let (mut host, effect_rx) = Self::new();
        host.periodic_sync = false;
        (host, effect_rx)
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn emit(&self, effect: HostEffect) {
        if self.effect_tx.send(effect).is_err() {
            debug!("host effect receiver dropped");
        }
    }

    /// Record a page the host has opened. A focused page goes to the front.
    pub fn client_opened(&self, client: ClientInfo) -> usize {
        let mut state = self.lock();
        state.clients.retain(|c| c.id != client.id);
        if client.focused {
            for c in &mut state.clients {
                c.focused = false;
            }
            state.clients.insert(0, client);
        } else {
            state.clients.push(client);
        }
        state.clients.len()
    }

    /// Record that the host focused a page. Returns `false` if unknown.
    pub fn client_focused(&self, client_id: &str) -> bool {
        let mut state = self.lock();
        promote(&mut state.clients, client_id)
    }

    /// Forget a closed page. Returns `false` if unknown.
    pub fn client_closed(&self, client_id: &str) -> bool {
        let mut state = self.lock();
        let before = state.clients.len();
        state.clients.retain(|c| c.id != client_id);
        state.clients.len() != before
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        self.lock().clients.clone()
    }

    /// Notifications currently shown, oldest first.
    pub fn shown_notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    /// Registered periodic triggers as `(tag, min_interval_secs)`.
    pub fn periodic_registrations(&self) -> Vec<(String, u64)> {
        self.lock().periodic.clone()
    }
}

fn promote(clients: &mut Vec<ClientInfo>, client_id: &str) -> bool {
    let Some(index) = clients.iter().position(|c| c.id == client_id) else {
        return false;
    };
    let mut client = clients.remove(index);
    client.focused = true;
    for c in clients.iter_mut() {
        c.focused = false;
    }
    clients.insert(0, client);
    true
}

#[async_trait]
impl WorkerHost for ChannelHost {
    async fn match_clients(&self) -> Result<Vec<ClientInfo>> {
        Ok(self.clients())
    }

    async fn post_message(&self, client_id: &str, message: serde_json::Value) -> Result<()> {
        if !self.lock().clients.iter().any(|c| c.id == client_id) {
            return Err(WorkerError::Client(format!("unknown client {client_id}")));
        }
        self.emit(HostEffect::PostMessage {
            client_id: client_id.to_owned(),
            message,
        });
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<()> {
        {
            let mut state = self.lock();
            state.notifications.retain(|n| n.tag != notification.tag);
            state.notifications.push(notification.clone());
        }
        self.emit(HostEffect::ShowNotification(notification.clone()));
        Ok(())
    }

    async fn close_notification(&self, tag: &str) -> Result<()> {
        self.lock().notifications.retain(|n| n.tag != tag);
        self.emit(HostEffect::CloseNotification {
            tag: tag.to_owned(),
        });
        Ok(())
    }

    async fn focus_client(&self, client_id: &str) -> Result<()> {
        if !self.client_focused(client_id) {
            return Err(WorkerError::Client(format!("unknown client {client_id}")));
        }
        self.emit(HostEffect::FocusClient {
            client_id: client_id.to_owned(),
        });
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<ClientInfo> {
        let client = ClientInfo {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_owned(),
            focused: true,
        };
        self.client_opened(client.clone());
        self.emit(HostEffect::OpenWindow {
            client_id: client.id.clone(),
            url: client.url.clone(),
        });
        Ok(client)
    }

    async fn skip_waiting(&self) -> Result<()> {
        self.emit(HostEffect::SkipWaiting);
        Ok(())
    }

    async fn claim_clients(&self) -> Result<()> {
        self.emit(HostEffect::ClaimClients);
        Ok(())
    }

    async fn register_periodic_sync(&self, tag: &str, min_interval: Duration) -> Result<()> {
        if !self.periodic_sync {
            return Err(WorkerError::Lifecycle(format!(
                "periodic background sync not supported (tag {tag})"
            )));
        }
        let min_interval_secs = min_interval.as_secs();
        {
            let mut state = self.lock();
            state.periodic.retain(|(t, _)| t != tag);
            state.periodic.push((tag.to_owned(), min_interval_secs));
        }
        self.emit(HostEffect::RegisterPeriodicSync {
            tag: tag.to_owned(),
            min_interval_secs,
        });
        Ok(())
    }
}
