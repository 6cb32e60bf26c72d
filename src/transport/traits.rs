//! Boundary between the connection manager and an RPC client library.
//!
//! The manager only needs a handful of operations from the client:
//! register custom types once, open a transport, wait until it is ready,
//! check liveness and disconnect. [`crate::transport::WsClient`] is the
//! websocket implementation; tests plug in their own.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join3;
use serde_json::{Value, from_value};
use url::Url;

use crate::error::Result;
use crate::protocol::{Method, SubscriptionMethod};
use crate::types::TypeRegistry;

use super::Subscription;

// ============================================================================
// SystemInfo
// ============================================================================

/// Node identity reported after connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    /// Chain name (`system_chain`).
    pub chain: String,
    /// Node implementation name (`system_name`).
    pub node_name: String,
    /// Node implementation version (`system_version`).
    pub node_version: String,
}

// ============================================================================
// RpcClient
// ============================================================================

/// Factory for transports to a node endpoint.
#[async_trait]
pub trait RpcClient: Send + Sync + 'static {
    /// Transport produced by [`RpcClient::connect`].
    type Transport: Transport;

    /// Adds the client's custom types to `registry`.
    ///
    /// Called at most once per manager, before the first `connect`.
    fn register_types(&self, registry: &mut TypeRegistry) -> Result<()>;

    /// Opens a transport to `url`.
    async fn connect(&self, url: &Url, types: Arc<TypeRegistry>) -> Result<Self::Transport>;
}

// ============================================================================
// Transport
// ============================================================================

/// An open session with a node.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Completes the readiness handshake.
    async fn wait_ready(&self) -> Result<()>;

    /// Calls a method and returns its raw result.
    async fn request(&self, method: Method) -> Result<Value>;

    /// Starts a subscription.
    async fn subscribe(&self, method: SubscriptionMethod) -> Result<Subscription>;

    /// Returns `true` while the session can serve requests.
    fn is_live(&self) -> bool;

    /// Closes the session. Calling it again is a no-op.
    fn disconnect(&self);

    /// Queries chain name, node name and node version concurrently.
    async fn system_info(&self) -> Result<SystemInfo> {
        let (chain, node_name, node_version) = try_join3(
            self.request(Method::SystemChain),
            self.request(Method::SystemName),
            self.request(Method::SystemVersion),
        )
        .await?;

        Ok(SystemInfo {
            chain: from_value(chain)?,
            node_name: from_value(node_name)?,
            node_version: from_value(node_version)?,
        })
    }
}
