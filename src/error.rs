//! Error types for the upkeep worker.

/// Top-level error type for the background worker.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Asset cache install, activation or storage error.
    #[error("cache error: {0}")]
    Cache(#[from] upkeep_cache::CacheError),

    /// Malformed or unsupported message payload.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// System notification could not be shown or closed.
    #[error("notification error: {0}")]
    Notification(String),

    /// Page client lookup, messaging, focus or open failure.
    #[error("client error: {0}")]
    Client(String),

    /// Worker lifecycle violation or unsupported host capability.
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, WorkerError>;
