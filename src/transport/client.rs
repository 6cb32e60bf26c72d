//! WebSocket RPC client.
//!
//! Opens JSON-RPC sessions to a node endpoint (`ws://` or `wss://`).
//!
//! # Connection Flow
//!
//! 1. `connect_async` - TCP connect and websocket upgrade
//! 2. [`Connection::new`] - Spawn the event loop
//! 3. [`Connection::handshake`] - Genesis hash + runtime version
//! 4. Requests and subscriptions until [`Connection::shutdown`]

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_tungstenite::connect_async;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::types::{TypeRegistry, register_subsocial_types};

use super::connection::DEFAULT_REQUEST_TIMEOUT;
use super::{Connection, RpcClient};

// ============================================================================
// WsClient
// ============================================================================

/// RPC client speaking JSON-RPC over websocket.
///
/// Registers the Subsocial types.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use subsocial_api::transport::{RpcClient, Transport, WsClient};
/// use subsocial_api::types::TypeRegistry;
///
/// let client = WsClient::new();
/// let url = "ws://127.0.0.1:9944/".parse()?;
/// let connection = client.connect(&url, Arc::new(TypeRegistry::new())).await?;
/// connection.wait_ready().await?;
/// ```
#[derive(Debug, Clone)]
pub struct WsClient {
    /// Per-request timeout for connections this client opens.
    request_timeout: Duration,
}

impl Default for WsClient {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl WsClient {
    /// Creates a client with the default request timeout (30s).
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-request timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Returns the per-request timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[async_trait]
impl RpcClient for WsClient {
    type Transport = Connection;

    fn register_types(&self, registry: &mut TypeRegistry) -> Result<()> {
        register_subsocial_types(registry)
    }

    async fn connect(&self, url: &Url, types: Arc<TypeRegistry>) -> Result<Connection> {
        let (ws_stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket handshake with {url} failed: {e}")))?;

        debug!(%url, status = %response.status(), "WebSocket connection established");

        Ok(Connection::new(ws_stream, types).with_request_timeout(self.request_timeout))
    }
}

// ============================================================================
// Tests
// ============================================================================
