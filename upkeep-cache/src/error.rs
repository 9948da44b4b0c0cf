//! Error types for the upkeep-cache crate.

/// Errors raised while installing, activating or reading the asset cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The network request itself failed (DNS, connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The network answered, but not with a success status.
    #[error("fetch failed for {url}: status {status}")]
    Fetch {
        /// Locator that was requested.
        url: String,
        /// HTTP status returned by the network.
        status: u16,
    },

    /// A cache storage backend failed to read or write an entry.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid cache configuration.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error from the filesystem backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for upkeep-cache results.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_network() {
        let err = CacheError::Network("connection refused".into());
        assert_eq!(err.to_string(), "network error: connection refused");
    }

    #[test]
    fn display_fetch() {
        let err = CacheError::Fetch {
            url: "/index.html".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "fetch failed for /index.html: status 404");
    }

    #[test]
    fn display_storage() {
        let err = CacheError::Storage("entry corrupt".into());
        assert_eq!(err.to_string(), "storage error: entry corrupt");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CacheError>();
    }
}
