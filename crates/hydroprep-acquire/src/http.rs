//! HTTP client configuration and abstraction.
//!
//! Services talk to the network through the [`HttpClient`] trait so that
//! tests can substitute canned responses. [`ReqwestClient`] is the real
//! implementation; all of its behaviour (timeout, certificate checks, user
//! agent) comes from an explicit [`HttpConfig`].

use crate::{AcquireError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("hydroprep/", env!("CARGO_PKG_VERSION"));

/// Connection settings for one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
    /// User-Agent header.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            accept_invalid_certs: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpConfig {
    /// A config with the given timeout and defaults otherwise.
    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            ..Self::default()
        }
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Deserialize a possibly partial config, taking absent fields from `base`.
    ///
    /// Pipelines with their own timeout use this through
    /// `#[serde(deserialize_with)]` so that setting one field in a config
    /// file keeps the pipeline's timeout rather than the client default.
    pub fn deserialize_over<'de, D>(
        deserializer: D,
        base: HttpConfig,
    ) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let partial = PartialHttpConfig::deserialize(deserializer)?;
        Ok(Self {
            timeout_secs: partial.timeout_secs.unwrap_or(base.timeout_secs),
            accept_invalid_certs: partial
                .accept_invalid_certs
                .unwrap_or(base.accept_invalid_certs),
            user_agent: partial.user_agent.unwrap_or(base.user_agent),
        })
    }
}

#[derive(Deserialize)]
struct PartialHttpConfig {
    timeout_secs: Option<u64>,
    accept_invalid_certs: Option<bool>,
    user_agent: Option<String>,
}

/// Synchronous HTTP operations used by the services.
pub trait HttpClient: Send + Sync {
    /// GET `url`, returning the body. Non-success statuses are errors.
    fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// POST a JSON body to `url`, returning the response body.
    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<Vec<u8>>;
}

/// Transfer statistics for a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Requests that returned a success status.
    pub requests_ok: usize,
    /// Requests that failed (transport error or non-success status).
    pub requests_failed: usize,
    /// Total response bytes received.
    pub bytes_received: u64,
}

/// [`HttpClient`] backed by a blocking `reqwest` client.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
    requests_ok: AtomicUsize,
    requests_failed: AtomicUsize,
    bytes_received: AtomicU64,
}

impl std::fmt::Debug for ReqwestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestClient")
            .field("stats", &self.stats())
            .finish()
    }
}

impl ReqwestClient {
    /// Build a client from `config`.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        if config.accept_invalid_certs {
            info!("TLS certificate verification disabled for this client");
        }

        Ok(Self {
            client,
            requests_ok: AtomicUsize::new(0),
            requests_failed: AtomicUsize::new(0),
            bytes_received: AtomicU64::new(0),
        })
    }

    /// Statistics since creation (or the last reset).
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            requests_ok: self.requests_ok.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }

    /// Reset statistics.
    pub fn reset_stats(&self) {
        self.requests_ok.store(0, Ordering::Relaxed);
        self.requests_failed.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
    }

    fn finish(&self, url: &str, response: reqwest::Result<reqwest::blocking::Response>) -> Result<Vec<u8>> {
        let response = response.map_err(|e| {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
            e
        })?;

        if !response.status().is_success() {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
            return Err(AcquireError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|e| {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
            e
        })?;
        self.requests_ok.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        debug!("Received {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send();
        self.finish(url, response)
    }

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<Vec<u8>> {
        let response = self.client.post(url).json(body).send();
        self.finish(url, response)
    }
}

impl<C: HttpClient + ?Sized> HttpClient for std::sync::Arc<C> {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        (**self).get(url)
    }

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<Vec<u8>> {
        (**self).post_json(url, body)
    }
}
