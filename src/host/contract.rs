//! Versioned envelopes exchanged with the embedding host over the bridge.

use crate::error::{Result, WorkerError};
use serde::{Deserialize, Serialize};

/// Contract version for bridge envelopes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Inputs the host can send to the worker bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    #[serde(rename = "host.ping")]
    HostPing,
    /// Deliver a [`WorkerEvent`](crate::worker::WorkerEvent) in `payload`.
    #[serde(rename = "worker.event")]
    WorkerEvent,
    #[serde(rename = "client.opened")]
    ClientOpened,
    #[serde(rename = "client.focused")]
    ClientFocused,
    #[serde(rename = "client.closed")]
    ClientClosed,
    #[serde(rename = "bridge.shutdown")]
    BridgeShutdown,
}

impl InputKind {
    /// Render input kind to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::WorkerEvent => "worker.event",
            Self::ClientOpened => "client.opened",
            Self::ClientFocused => "client.focused",
            Self::ClientClosed => "client.closed",
            Self::BridgeShutdown => "bridge.shutdown",
        }
    }
}

/// A versioned input envelope from host -> worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEnvelope {
    pub v: u32,
    pub request_id: String,
    pub kind: InputKind,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl InputEnvelope {
    #[must_use]
    pub fn new(request_id: impl Into<String>, kind: InputKind, payload: serde_json::Value) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            request_id: request_id.into(),
            kind,
            payload,
        }
    }

    /// Validate envelope version and request id.
    pub fn validate(&self) -> Result<()> {
        if self.v != PROTOCOL_VERSION {
            return Err(WorkerError::Protocol(format!(
                "unsupported contract version {}; expected {}",
                self.v, PROTOCOL_VERSION
            )));
        }
        if self.request_id.trim().is_empty() {
            return Err(WorkerError::Protocol("request_id cannot be empty".to_owned()));
        }
        Ok(())
    }
}

/// A versioned response envelope from worker -> host.
///
/// Written once per input, after every effect the input caused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Build a successful response envelope.
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Build an error response envelope.
    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

/// A versioned effect envelope from worker -> host: something the host must
/// carry out (post a message, show a notification, open a window...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectEnvelope {
    pub v: u32,
    pub effect_id: String,
    pub effect: String,
    pub payload: serde_json::Value,
}

impl EffectEnvelope {
    #[must_use]
    pub fn new(
        effect_id: impl Into<String>,
        effect: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            effect_id: effect_id.into(),
            effect: effect.into(),
            payload,
        }
    }
}
