//! Endpoint and timing configuration.
//!
//! The endpoint comes from `SUBSTRATE_URL` when set, otherwise the local
//! development node.
//!
//! # Example
//!
//! ```ignore
//! use subsocial_api::EndpointConfig;
//!
//! let endpoint = EndpointConfig::from_env()?;
//! println!("Using {}", endpoint.url());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable overriding the node endpoint.
pub const ENDPOINT_ENV: &str = "SUBSTRATE_URL";

/// Endpoint used when no override is set.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:9944/";

/// Default time allowed for opening the transport.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time allowed for the readiness handshake.
const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default idle time before the reaper releases the connection.
const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(10);

// ============================================================================
// EndpointConfig
// ============================================================================

/// Node RPC endpoint, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Websocket URL.
    url: Url,
}

impl EndpointConfig {
    /// Parses and validates an endpoint URL.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `url` does not parse
    /// - [`Error::Config`] if the scheme is not `ws` or `wss`
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url.trim())?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "Endpoint must be a ws:// or wss:// URL, got {url}"
            )));
        }
        if url.host_str().is_none() {
            return Err(Error::config(format!("Endpoint has no host: {url}")));
        }

        Ok(Self { url })
    }

    /// Resolves the endpoint from `SUBSTRATE_URL`, falling back to the
    /// local default.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable holds an invalid endpoint.
    pub fn from_env() -> Result<Self> {
        Self::from_override(env::var(ENDPOINT_ENV).ok().as_deref())
    }

    /// Resolves the endpoint from an optional override.
    ///
    /// Empty or blank overrides count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the override is an invalid endpoint.
    pub fn from_override(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(url) => Self::new(url),
            None => Self::new(DEFAULT_ENDPOINT),
        }
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.url, f)
    }
}

// ============================================================================
// ManagerOptions
// ============================================================================

/// Timeouts governing connection attempts and idle teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Maximum time to open the transport.
    pub connect_timeout: Duration,
    /// Maximum time for the readiness handshake.
    pub ready_timeout: Duration,
    /// Idle time after which the default reaper releases the connection.
    pub idle_threshold: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
        }
    }
}

impl ManagerOptions {
    /// Checks that every timeout is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be non-zero"));
        }
        if self.ready_timeout.is_zero() {
            return Err(Error::config("ready timeout must be non-zero"));
        }
        if self.idle_threshold.is_zero() {
            return Err(Error::config("idle threshold must be non-zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
