//! Network access for manifest fetches and cache misses.

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::types::{AssetRequest, CachedResponse, Method};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::trace;
use url::Url;

/// Fetches a request from the network.
///
/// Implementations return `Ok` for every response the network produced,
/// whatever its status; `Err` means no response was obtained at all.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &AssetRequest) -> Result<CachedResponse>;
}

/// [`Network`] backed by a `reqwest` HTTP client.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: Option<Url>,
}

impl HttpNetwork {
    /// Create a client resolving root-relative locators against `origin`.
    pub fn new(origin: Option<Url>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Network(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, origin })
    }

    /// Create a client from cache configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::new(
            config.origin_url()?,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn resolve_url(&self, raw: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(raw) {
            return Ok(url);
        }
        let Some(origin) = &self.origin else {
            return Err(CacheError::Network(format!(
                "cannot fetch relative locator '{raw}' without a configured origin"
            )));
        };
        origin
            .join(raw)
            .map_err(|e| CacheError::Network(format!("cannot resolve '{raw}': {e}")))
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &AssetRequest) -> Result<CachedResponse> {
        let url = self.resolve_url(&request.url)?;
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| CacheError::Network(format!("invalid method: {e}")))?;
        trace!(%url, method = request.method.as_str(), "network fetch");

        let response = self
            .client
            .request(method, url.clone())
            .send()
            .await
            .map_err(|e| CacheError::Network(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::Network(format!("{url}: cannot read body: {e}")))?;

        Ok(CachedResponse {
            url: request.url.clone(),
            status,
            headers,
            body,
        })
    }
}

/// [`Network`] serving canned `GET` responses from memory.
///
/// Unknown locators and non-`GET` requests fail as if the network were
/// unreachable. Every call is counted, hit or miss.
#[derive(Debug, Default)]
pub struct StaticNetwork {
    responses: Mutex<HashMap<String, CachedResponse>>,
    calls: AtomicUsize,
}

impl StaticNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 for `url`.
    #[must_use]
    pub fn with_asset(self, url: &str, body: &str) -> Self {
        self.insert(CachedResponse::new(url, 200, body.to_owned()));
        self
    }

    /// Serve an arbitrary response for its own `url`.
    pub fn insert(&self, response: CachedResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(response.url.clone(), response);
        }
    }

    /// Stop serving `url`.
    pub fn remove(&self, url: &str) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.remove(url);
        }
    }

    /// Number of fetches attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for StaticNetwork {
    async fn fetch(&self, request: &AssetRequest) -> Result<CachedResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.method != Method::Get {
            return Err(CacheError::Network(format!(
                "{} {} is not served offline",
                request.method.as_str(),
                request.url
            )));
        }
        let responses = self
            .responses
            .lock()
            .map_err(|_| CacheError::Network("static network poisoned".into()))?;
        responses
            .get(&request.url)
            .cloned()
            .ok_or_else(|| CacheError::Network(format!("{}: unreachable", request.url)))
    }
}
