//! Request and response types shared by the cache, storage backends and
//! the network client.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// HTTP method of an intercepted request.
///
/// Only [`Method::Get`] requests are ever answered from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// Wire name of the method.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

/// A resource request intercepted by the worker or issued during install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRequest {
    /// Absolute URL or root-relative path.
    pub url: String,
    /// Request method.
    #[serde(default)]
    pub method: Method,
}

impl AssetRequest {
    /// Build a request with an explicit method.
    pub fn new(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            method,
        }
    }

    /// Build a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url, Method::Get)
    }

    /// Key under which this request is stored in a cache.
    ///
    /// Absolute URLs on `origin` collapse to `path[?query]` so that a page
    /// request for `https://app.example/index.html` matches the manifest
    /// entry `/index.html`. Cross-origin URLs keep their full form. Relative
    /// locators are anchored at `/`. Fragments never take part in matching.
    #[must_use]
    pub fn cache_key(&self, origin: Option<&Url>) -> String {
        match Url::parse(&self.url) {
            Ok(mut parsed) => {
                parsed.set_fragment(None);
                let same_origin = origin.is_some_and(|o| o.origin() == parsed.origin());
                if same_origin {
                    path_and_query(&parsed)
                } else {
                    parsed.to_string()
                }
            }
            Err(_) => {
                let trimmed = self.url.split('#').next().unwrap_or_default();
                let anchored = if trimmed.starts_with('/') {
                    trimmed.to_owned()
                } else {
                    format!("/{trimmed}")
                };
                // Encode the same way absolute URLs are, so `/my file.html`
                // and `https://app.example/my%20file.html` share a key.
                match Url::parse(RELATIVE_BASE).and_then(|base| base.join(&anchored)) {
                    Ok(joined) => path_and_query(&joined),
                    Err(_) => anchored,
                }
            }
        }
    }
}

const RELATIVE_BASE: &str = "http://localhost/";

fn path_and_query(url: &Url) -> String {
    let mut key = url.path().to_owned();
    if let Some(query) = url.query() {
        key.push('?');
        key.push_str(query);
    }
    key
}

/// A stored or network-fetched response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// URL the response was produced for.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers in the order received.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Response body, base64-encoded on the wire.
    #[serde(with = "body_base64")]
    pub body: Bytes,
}

impl CachedResponse {
    /// Create a response with no headers.
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

mod body_base64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
