//! Routes worker events to the asset cache and the schedule notifier.

use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::protocol::WorkerMessage;
use crate::scheduler::{ScheduleNotifier, TriggerOutcome};
use crate::worker::events::{EventOutcome, WorkerEvent};
use crate::worker::host::WorkerHost;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use upkeep_cache::{AssetCacheManager, HttpNetwork, Network, storage_from_config};

/// Lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Loaded, no install attempted yet.
    Parsed,
    Installing,
    /// Installed, waiting for activation.
    Installed,
    Activating,
    /// Controlling pages; fetches are intercepted.
    Activated,
    /// The last install failed.
    Redundant,
}

impl WorkerState {
    /// Fetch interception is only enabled once activation has settled.
    #[must_use]
    pub fn can_intercept_fetch(self) -> bool {
        matches!(self, Self::Activated)
    }

    #[must_use]
    pub fn can_install(self) -> bool {
        matches!(self, Self::Parsed | Self::Installed | Self::Redundant)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Owns both worker components and routes each event to one of them.
///
/// Events are handled one at a time: [`WorkerDispatcher::dispatch`] takes
/// `&mut self` and returns only once the handler has settled.
pub struct WorkerDispatcher {
    cache: AssetCacheManager,
    notifier: ScheduleNotifier,
    host: Arc<dyn WorkerHost>,
    state: WorkerState,
}

impl WorkerDispatcher {
    pub fn new(cache: AssetCacheManager, notifier: ScheduleNotifier, host: Arc<dyn WorkerHost>) -> Self {
        Self {
            cache,
            notifier,
            host,
            state: WorkerState::Parsed,
        }
    }

    /// Build a dispatcher with storage and an HTTP network from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache section is invalid or its storage
    /// cannot be opened.
    pub async fn from_config(config: &WorkerConfig, host: Arc<dyn WorkerHost>) -> Result<Self> {
        let network: Arc<dyn Network> = Arc::new(HttpNetwork::from_config(&config.cache)?);
        Self::with_network(config, network, host).await
    }

    /// Build a dispatcher with storage from `config` and the given network.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache section is invalid or its storage
    /// cannot be opened.
    pub async fn with_network(
        config: &WorkerConfig,
        network: Arc<dyn Network>,
        host: Arc<dyn WorkerHost>,
    ) -> Result<Self> {
        let storage = storage_from_config(&config.cache).await?;
        let cache = AssetCacheManager::new(&config.cache, storage, network)?;
        let notifier = ScheduleNotifier::new(
            config.schedule.clone(),
            config.notification.clone(),
            config.app_root.clone(),
        );
        Ok(Self::new(cache, notifier, host))
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn cache(&self) -> &AssetCacheManager {
        &self.cache
    }

    pub fn notifier(&self) -> &ScheduleNotifier {
        &self.notifier
    }

    /// Handle one event to completion.
    ///
    /// # Errors
    ///
    /// Install failures and lifecycle violations are returned; every other
    /// failure is absorbed and reflected in the outcome.
    #[instrument(skip_all, fields(event = event.name(), state = %self.state))]
    pub async fn dispatch(&mut self, event: WorkerEvent) -> Result<EventOutcome> {
        match event {
            WorkerEvent::Install => self.install().await,
            WorkerEvent::Activate => self.activate().await,
            WorkerEvent::Fetch { request } => {
                if !self.state.can_intercept_fetch() {
                    debug!(url = %request.url, "fetch before activation; passing through");
                    return Ok(EventOutcome::Passthrough);
                }
                let response = self.cache.resolve(&request).await;
                Ok(EventOutcome::Response { response })
            }
            WorkerEvent::Message { data } => Ok(self.handle_message(&data)),
            WorkerEvent::PeriodicSync { tag } => {
                let outcome = self
                    .notifier
                    .periodic_trigger(&tag, self.host.as_ref())
                    .await;
                Ok(trigger_outcome(outcome))
            }
            WorkerEvent::Sync { tag } => Ok(trigger_outcome(self.notifier.sync_trigger(&tag))),
            WorkerEvent::NotificationClick { tag, .. } => {
                let interaction = self
                    .notifier
                    .on_notification_click(&tag, self.host.as_ref())
                    .await?;
                Ok(EventOutcome::NotificationHandled { interaction })
            }
        }
    }

    async fn install(&mut self) -> Result<EventOutcome> {
        if !self.state.can_install() {
            return Err(WorkerError::Lifecycle(format!(
                "cannot install while {}",
                self.state
            )));
        }

        self.state = WorkerState::Installing;
        let report = match self.cache.install().await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "install failed; worker is redundant");
                self.state = WorkerState::Redundant;
                return Err(e.into());
            }
        };
        self.state = WorkerState::Installed;
        info!(cache = %report.cache_name, stored = report.stored, "worker installed");

        if let Err(e) = self.host.skip_waiting().await {
            warn!(error = %e, "skip waiting failed");
        }

        Ok(EventOutcome::Installed {
            cache_name: report.cache_name,
            stored: report.stored,
        })
    }

    async fn activate(&mut self) -> Result<EventOutcome> {
        if self.state != WorkerState::Installed {
            return Err(WorkerError::Lifecycle(format!(
                "cannot activate while {}",
                self.state
            )));
        }

        self.state = WorkerState::Activating;
        let report = match self.cache.activate().await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "stale cache cleanup failed");
                upkeep_cache::ActivationReport {
                    cache_name: self.cache.cache_name().to_owned(),
                    ..Default::default()
                }
            }
        };

        if let Err(e) = self.host.claim_clients().await {
            warn!(error = %e, "failed to claim open pages");
        }
        self.state = WorkerState::Activated;
        info!(
            cache = %report.cache_name,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "worker activated"
        );

        Ok(EventOutcome::Activated {
            cache_name: report.cache_name,
            deleted: report.deleted,
            failed: report.failed,
        })
    }

    fn handle_message(&mut self, data: &serde_json::Value) -> EventOutcome {
        match WorkerMessage::parse(data) {
            Ok(WorkerMessage::SyncSchedules { schedules }) => {
                let tasks = self.notifier.receive_sync(schedules);
                EventOutcome::ScheduleSynced { tasks }
            }
            Ok(other) => {
                debug!(kind = other.kind(), "ignoring worker-bound message of this type");
                EventOutcome::MessageIgnored {
                    reason: format!("{} is not accepted by the worker", other.kind()),
                }
            }
            Err(e) => {
                debug!(error = %e, "ignoring malformed message");
                EventOutcome::MessageIgnored {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn trigger_outcome(outcome: TriggerOutcome) -> EventOutcome {
    match outcome {
        TriggerOutcome::Checked(report) => EventOutcome::DueChecked { report },
        TriggerOutcome::Deferred => EventOutcome::SyncDeferred,
        TriggerOutcome::Ignored => EventOutcome::TriggerIgnored,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::config::WorkerConfig;
    use crate::protocol::Notification;
    use crate::worker::host::ClientInfo;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use upkeep_cache::{AssetRequest, StaticNetwork};

    #[derive(Default)]
    struct CountingHost {
        skip_waiting: AtomicUsize,
        claims: AtomicUsize,
    }

    #[async_trait]
    impl WorkerHost for CountingHost {
        async fn match_clients(&self) -> Result<Vec<ClientInfo>> {
            Ok(Vec::new())
        }
        async fn post_message(&self, _client_id: &str, _message: serde_json::Value) -> Result<()> {
            Ok(())
        }
        async fn show_notification(&self, _notification: &Notification) -> Result<()> {
            Ok(())
        }
        async fn close_notification(&self, _tag: &str) -> Result<()> {
            Ok(())
        }
        async fn focus_client(&self, _client_id: &str) -> Result<()> {
            Ok(())
        }
        async fn open_window(&self, url: &str) -> Result<ClientInfo> {
            Ok(ClientInfo::new("opened", url))
        }
        async fn skip_waiting(&self) -> Result<()> {
            self.skip_waiting.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn claim_clients(&self) -> Result<()> {
            self.claims.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn network() -> Arc<StaticNetwork> {
        Arc::new(
            StaticNetwork::new()
                .with_asset("/", "root")
                .with_asset("/index.html", "index")
                .with_asset("/manifest.json", "{}"),
        )
    }

    async fn dispatcher(
        network: Arc<StaticNetwork>,
        host: Arc<CountingHost>,
    ) -> WorkerDispatcher {
        WorkerDispatcher::with_network(&WorkerConfig::default(), network, host)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn install_then_activate() {
        let host = Arc::new(CountingHost::default());
        let mut dispatcher = dispatcher(network(), Arc::clone(&host)).await;

        let installed = dispatcher.dispatch(WorkerEvent::Install).await.unwrap();
        assert_eq!(
            installed,
            EventOutcome::Installed {
                cache_name: "upkeep-v1".into(),
                stored: 3
            }
        );
        assert_eq!(dispatcher.state(), WorkerState::Installed);
        assert_eq!(host.skip_waiting.load(Ordering::SeqCst), 1);

        dispatcher.dispatch(WorkerEvent::Activate).await.unwrap();
        assert_eq!(dispatcher.state(), WorkerState::Activated);
        assert_eq!(host.claims.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_install_marks_redundant() {
        let network = network();
        network.remove("/manifest.json");
        let host = Arc::new(CountingHost::default());
        let mut dispatcher = dispatcher(network, Arc::clone(&host)).await;

        let err = dispatcher.dispatch(WorkerEvent::Install).await.unwrap_err();
        assert!(matches!(err, WorkerError::Cache(_)));
        assert_eq!(dispatcher.state(), WorkerState::Redundant);
        assert_eq!(host.skip_waiting.load(Ordering::SeqCst), 0);
        assert!(dispatcher.cache().storage().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn activate_before_install_is_rejected() {
        let mut dispatcher = dispatcher(network(), Arc::new(CountingHost::default())).await;
        let err = dispatcher.dispatch(WorkerEvent::Activate).await.unwrap_err();
        assert!(matches!(err, WorkerError::Lifecycle(_)));
        assert_eq!(dispatcher.state(), WorkerState::Parsed);
    }

    #[tokio::test]
    async fn fetch_passes_through_until_activated() {
        let mut dispatcher = dispatcher(network(), Arc::new(CountingHost::default())).await;
        let fetch = WorkerEvent::Fetch {
            request: AssetRequest::get("/index.html"),
        };

        assert_eq!(
            dispatcher.dispatch(fetch.clone()).await.unwrap(),
            EventOutcome::Passthrough
        );

        dispatcher.dispatch(WorkerEvent::Install).await.unwrap();
        assert_eq!(
            dispatcher.dispatch(fetch.clone()).await.unwrap(),
            EventOutcome::Passthrough
        );

        dispatcher.dispatch(WorkerEvent::Activate).await.unwrap();
        let EventOutcome::Response { response } = dispatcher.dispatch(fetch).await.unwrap() else {
            panic!("activated worker answers fetches");
        };
        assert_eq!(response.unwrap().body.as_ref(), b"index");
    }

    #[tokio::test]
    async fn sync_message_replaces_schedule() {
        let mut dispatcher = dispatcher(network(), Arc::new(CountingHost::default())).await;
        let outcome = dispatcher
            .dispatch(WorkerEvent::Message {
                data: json!({
                    "type": "SYNC_SCHEDULES",
                    "schedules": [
                        {"id": 1, "machine": "Lathe", "type": "Oil", "date": "2026-03-01", "time": "09:30"},
                        {"id": 2, "machine": "Mill", "type": "Belt", "date": "2026-03-02", "time": "10:00"}
                    ]
                }),
            })
            .await
            .unwrap();

        assert_eq!(outcome, EventOutcome::ScheduleSynced { tasks: 2 });
        assert_eq!(dispatcher.notifier().state().len(), 2);
    }

    #[tokio::test]
    async fn malformed_and_outbound_messages_are_ignored() {
        let mut dispatcher = dispatcher(network(), Arc::new(CountingHost::default())).await;

        for data in [
            json!("hello"),
            json!({"type": "UNKNOWN"}),
            json!({"type": "TASK_DUE", "taskId": 4}),
        ] {
            let outcome = dispatcher
                .dispatch(WorkerEvent::Message { data })
                .await
                .unwrap();
            assert!(matches!(outcome, EventOutcome::MessageIgnored { .. }));
        }
        assert!(!dispatcher.notifier().state().is_synced());
    }

    #[tokio::test]
    async fn triggers_map_to_outcomes() {
        let mut dispatcher = dispatcher(network(), Arc::new(CountingHost::default())).await;

        let checked = dispatcher
            .dispatch(WorkerEvent::PeriodicSync {
                tag: "check-tasks".into(),
            })
            .await
            .unwrap();
        assert!(matches!(checked, EventOutcome::DueChecked { .. }));

        let deferred = dispatcher
            .dispatch(WorkerEvent::Sync {
                tag: "sync-tasks".into(),
            })
            .await
            .unwrap();
        assert_eq!(deferred, EventOutcome::SyncDeferred);

        let ignored = dispatcher
            .dispatch(WorkerEvent::PeriodicSync {
                tag: "other".into(),
            })
            .await
            .unwrap();
        assert_eq!(ignored, EventOutcome::TriggerIgnored);
    }

    #[tokio::test]
    async fn trigger_tags_are_not_shared_between_event_kinds() {
        let host = Arc::new(CountingHost::default());
        let mut dispatcher = dispatcher(network(), host).await;

        let one_off = dispatcher
            .dispatch(WorkerEvent::Sync {
                tag: "check-tasks".into(),
            })
            .await
            .unwrap();
        assert_eq!(one_off, EventOutcome::TriggerIgnored);

        let periodic = dispatcher
            .dispatch(WorkerEvent::PeriodicSync {
                tag: "sync-tasks".into(),
            })
            .await
            .unwrap();
        assert_eq!(periodic, EventOutcome::TriggerIgnored);
    }
}
