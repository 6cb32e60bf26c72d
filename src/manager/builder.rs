//! Builder pattern for manager configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use subsocial_api::ConnectionManager;
//!
//! # fn example() -> subsocial_api::Result<()> {
//! let manager = ConnectionManager::builder()
//!     .endpoint("wss://rpc.subsocial.network")
//!     .ready_timeout(Duration::from_secs(10))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::Result;
use crate::transport::{RpcClient, WsClient};

use super::config::{EndpointConfig, ManagerOptions};
use super::core::ConnectionManager;

// ============================================================================
// ConnectionManagerBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionManager`].
///
/// Use [`ConnectionManager::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct ConnectionManagerBuilder<C = WsClient> {
    /// Endpoint override. `None` resolves from the environment.
    endpoint: Option<String>,
    /// RPC client library.
    client: C,
    /// Timeouts.
    options: ManagerOptions,
}

impl Default for ConnectionManagerBuilder {
    fn default() -> Self {
        Self {
            endpoint: None,
            client: WsClient::new(),
            options: ManagerOptions::default(),
        }
    }
}

impl ConnectionManagerBuilder {
    /// Creates a builder for a websocket manager with default timeouts.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// ConnectionManagerBuilder Implementation
// ============================================================================

impl<C: RpcClient> ConnectionManagerBuilder<C> {
    /// Sets the endpoint, overriding `SUBSTRATE_URL`.
    ///
    /// # Arguments
    ///
    /// * `url` - Websocket URL (e.g., "ws://127.0.0.1:9944")
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Replaces the RPC client library.
    #[must_use]
    pub fn client<C2: RpcClient>(self, client: C2) -> ConnectionManagerBuilder<C2> {
        ConnectionManagerBuilder {
            endpoint: self.endpoint,
            client,
            options: self.options,
        }
    }

    /// Sets the time allowed for opening the transport.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets the time allowed for the readiness handshake.
    #[inline]
    #[must_use]
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.options.ready_timeout = timeout;
        self
    }

    /// Sets the idle threshold used by
    /// [`ConnectionManager::spawn_default_reaper`].
    #[inline]
    #[must_use]
    pub fn idle_threshold(mut self, threshold: Duration) -> Self {
        self.options.idle_threshold = threshold;
        self
    }

    /// Builds the manager with validation. Does not connect.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Url`] / [`crate::Error::Config`] if the endpoint
    ///   is invalid
    /// - [`crate::Error::Config`] if a timeout is zero
    pub fn build(self) -> Result<ConnectionManager<C>> {
        let endpoint = match self.endpoint.as_deref() {
            Some(url) => EndpointConfig::new(url)?,
            None => EndpointConfig::from_env()?,
        };
        self.options.validate()?;

        Ok(ConnectionManager::with_client(
            self.client,
            endpoint,
            self.options,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_test::{assert_err, assert_ok};

    use crate::error::Error;
    use crate::manager::ConnectionState;

    #[test]
    fn test_new_uses_defaults() {
        let builder = ConnectionManagerBuilder::new();
        assert!(builder.endpoint.is_none());
        assert_eq!(builder.options, ManagerOptions::default());
    }

    #[test]
    fn test_endpoint_sets_override() {
        let manager = assert_ok!(
            ConnectionManagerBuilder::new()
                .endpoint("ws://10.0.0.5:9944")
                .build()
        );
        assert_eq!(manager.endpoint().url().host_str(), Some("10.0.0.5"));
        assert_eq!(manager.state(), ConnectionState::Uninitialized);
    }

    #[test]
    fn test_timeouts_are_applied() {
        let manager = ConnectionManager::builder()
            .endpoint("ws://127.0.0.1:9944")
            .connect_timeout(Duration::from_secs(5))
            .ready_timeout(Duration::from_secs(6))
            .idle_threshold(Duration::from_secs(7))
            .build()
            .expect("build");

        let options = manager.options();
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
        assert_eq!(options.ready_timeout, Duration::from_secs(6));
        assert_eq!(options.idle_threshold, Duration::from_secs(7));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let err = assert_err!(
            ConnectionManager::builder()
                .endpoint("https://rpc.subsocial.network")
                .build()
        );
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = ConnectionManager::builder()
            .endpoint("ws://127.0.0.1:9944")
            .ready_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_client_swap_keeps_settings() {
        let builder = ConnectionManager::builder()
            .endpoint("ws://127.0.0.1:9944")
            .idle_threshold(Duration::from_secs(3))
            .client(WsClient::new().with_request_timeout(Duration::from_secs(1)));

        assert_eq!(builder.client.request_timeout(), Duration::from_secs(1));
        assert_eq!(builder.options.idle_threshold, Duration::from_secs(3));
    }
}
