//! Stdin/stdout JSON bridge for the background worker.
//!
//! Reads newline-delimited JSON [`InputEnvelope`] messages, delivers worker
//! events through the [`WorkerClient`], and writes [`EffectEnvelope`] and
//! [`ResponseEnvelope`] messages as newline-delimited JSON. Every effect an
//! input causes is written before that input's response, so the host knows
//! an event has settled once its response arrives.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::host::contract::{EffectEnvelope, InputEnvelope, InputKind, ResponseEnvelope};
use crate::host::effects::{ChannelHost, HostEffect};
use crate::worker::{
    ClientInfo, RegistrationReport, WorkerClient, WorkerDispatcher, WorkerEvent, WorkerHost,
    register_periodic_check, worker_channel,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use upkeep_cache::{HttpNetwork, Network};

/// Default request channel capacity for the stdio bridge.
const REQUEST_CAPACITY: usize = 64;

/// Payload of `client.focused` and `client.closed`.
#[derive(Debug, Deserialize)]
struct ClientRef {
    client_id: String,
}

struct Bridge<W> {
    client: WorkerClient,
    host: Arc<ChannelHost>,
    effects: mpsc::UnboundedReceiver<HostEffect>,
    writer: W,
    next_effect: u64,
    next_tick: u64,
}

enum Flow {
    Continue,
    Stop,
}

/// Run the stdin/stdout JSON bridge until stdin closes or a
/// `bridge.shutdown` input is received.
pub async fn run_stdio_bridge(config: WorkerConfig) -> Result<()> {
    let network: Arc<dyn Network> = Arc::new(HttpNetwork::from_config(&config.cache)?);
    let reader = BufReader::new(tokio::io::stdin());
    run_bridge(&config, network, reader, tokio::io::stdout()).await?;
    Ok(())
}

/// Run the bridge over arbitrary line reader and writer.
///
/// On start the periodic due check is registered; when registration succeeds
/// the bridge fires the periodic tag itself every `min_interval_secs`.
/// Returns the writer once the input stream ends.
pub async fn run_bridge<R, W>(
    config: &WorkerConfig,
    network: Arc<dyn Network>,
    reader: R,
    writer: W,
) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (host, effects) = ChannelHost::new();
    let host = Arc::new(host);
    let worker_host: Arc<dyn WorkerHost> = Arc::clone(&host) as Arc<dyn WorkerHost>;
    let dispatcher = WorkerDispatcher::with_network(config, network, worker_host).await?;
    let (client, server) = worker_channel(REQUEST_CAPACITY, dispatcher);
    let server_handle = tokio::spawn(server.run());

    let mut bridge = Bridge {
        client,
        host,
        effects,
        writer,
        next_effect: 0,
        next_tick: 0,
    };

    let registration = register_periodic_check(bridge.host.as_ref(), &config.schedule).await;
    bridge.flush_effects().await?;
    let mut ticker = match registration {
        RegistrationReport::Registered { .. } => {
            let period = config.schedule.min_interval();
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(ticker)
        }
        RegistrationReport::Unavailable { .. } => None,
    };

    let mut lines = reader.lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = line.map_err(|e| WorkerError::Channel(format!("failed to read input: {e}")))?;
                let Some(line) = line else {
                    tracing::info!("input closed (EOF); shutting down worker bridge");
                    break;
                };
                if let Flow::Stop = bridge.handle_line(&line).await? {
                    tracing::info!("bridge.shutdown received; shutting down worker bridge");
                    break;
                }
            }
            () = next_tick(&mut ticker) => {
                bridge.periodic_check(&config.schedule.periodic_tag).await?;
            }
        }
    }

    let Bridge { client, writer, .. } = bridge;
    drop(client);
    if let Err(e) = server_handle.await {
        tracing::warn!(error = %e, "worker server task failed");
    }
    Ok(writer)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl<W: AsyncWrite + Unpin> Bridge<W> {
    async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Flow::Continue);
        }

        let envelope: InputEnvelope = match serde_json::from_str(trimmed) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse input envelope");
                let response = ResponseEnvelope::error(
                    "parse-error",
                    format!("failed to parse input envelope: {e}"),
                );
                self.write_response(&response).await?;
                return Ok(Flow::Continue);
            }
        };

        if let Err(e) = envelope.validate() {
            let response = ResponseEnvelope::error(envelope.request_id.clone(), e.to_string());
            self.write_response(&response).await?;
            return Ok(Flow::Continue);
        }

        let request_id = envelope.request_id.clone();
        let flow = if envelope.kind == InputKind::BridgeShutdown {
            Flow::Stop
        } else {
            Flow::Continue
        };

        let response = match self.route(envelope).await {
            Ok(payload) => ResponseEnvelope::ok(request_id, payload),
            Err(e) => {
                tracing::debug!(error = %e, "input failed");
                ResponseEnvelope::error(request_id, e.to_string())
            }
        };

        self.flush_effects().await?;
        self.write_response(&response).await?;
        Ok(flow)
    }

    async fn route(&self, envelope: InputEnvelope) -> Result<serde_json::Value> {
        match envelope.kind {
            InputKind::HostPing => Ok(serde_json::json!({"pong": true})),
            InputKind::WorkerEvent => {
                let event: WorkerEvent = parse_payload(envelope.payload)?;
                let outcome = self.client.send(event).await?;
                to_payload(&outcome)
            }
            InputKind::ClientOpened => {
                let client: ClientInfo = parse_payload(envelope.payload)?;
                let clients = self.host.client_opened(client);
                Ok(serde_json::json!({"clients": clients}))
            }
            InputKind::ClientFocused => {
                let target: ClientRef = parse_payload(envelope.payload)?;
                let focused = self.host.client_focused(&target.client_id);
                Ok(serde_json::json!({"focused": focused}))
            }
            InputKind::ClientClosed => {
                let target: ClientRef = parse_payload(envelope.payload)?;
                let closed = self.host.client_closed(&target.client_id);
                Ok(serde_json::json!({"closed": closed}))
            }
            InputKind::BridgeShutdown => Ok(serde_json::json!({"accepted": true})),
        }
    }

    async fn periodic_check(&mut self, tag: &str) -> Result<()> {
        self.next_tick += 1;
        let event = WorkerEvent::PeriodicSync {
            tag: tag.to_owned(),
        };
        let payload = match self.client.send(event).await {
            Ok(outcome) => to_payload(&outcome)?,
            Err(e) => {
                tracing::warn!(error = %e, "periodic check failed");
                serde_json::json!({"error": e.to_string()})
            }
        };
        self.flush_effects().await?;
        let envelope = EffectEnvelope::new(
            format!("tick-{}", self.next_tick),
            "worker.periodic_check",
            payload,
        );
        self.write_json(&envelope).await
    }

    async fn flush_effects(&mut self) -> Result<()> {
        while let Ok(effect) = self.effects.try_recv() {
            self.next_effect += 1;
            let envelope = EffectEnvelope::new(
                format!("fx-{}", self.next_effect),
                effect.name(),
                effect.payload(),
            );
            self.write_json(&envelope).await?;
        }
        Ok(())
    }

    async fn write_response(&mut self, response: &ResponseEnvelope) -> Result<()> {
        self.write_json(response).await
    }

    async fn write_json<T: serde::Serialize>(&mut self, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| WorkerError::Protocol(format!("failed to serialize envelope: {e}")))?;
        write_line(&mut self.writer, &json).await
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(payload: serde_json::Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| WorkerError::Protocol(format!("invalid payload: {e}")))
}

fn to_payload<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| WorkerError::Protocol(format!("failed to serialize outcome: {e}")))
}

/// Write a single JSON line and flush.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| WorkerError::Channel(format!("failed to write output: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| WorkerError::Channel(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| WorkerError::Channel(format!("failed to flush output: {e}")))?;
    Ok(())
}
