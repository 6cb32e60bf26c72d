//! Subsocial API - Shared, lazily-connected Substrate node access.
//!
//! This library owns the lifecycle of a client's connection to a Subsocial
//! Substrate node: one session per process, opened on first use, shared by
//! every consumer and released once idle.
//!
//! # Architecture
//!
//! The manager sits between consumers and an RPC client library:
//!
//! - **Consumers**: call [`ConnectionManager::connection`], use the returned
//!   [`ConnectionHandle`]
//! - **Manager**: single-flight connect, type registration, idle teardown
//! - **Client library**: [`WsClient`] speaking JSON-RPC over websocket
//!
//! Key design principles:
//!
//! - At most one connection attempt in flight; late callers attach to it
//! - Custom types registered exactly once, before the first connect
//! - Failures reset the state and surface to every waiter; no silent retry
//! - Cancelling one waiter never aborts the attempt for the others
//!
//! # Quick Start
//!
//! ```no_run
//! use subsocial_api::{ConnectionManager, Method, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Endpoint from SUBSTRATE_URL, or ws://127.0.0.1:9944/
//!     let manager = ConnectionManager::from_env()?;
//!     let _reaper = manager.spawn_default_reaper();
//!
//!     let api = manager.connection().await?;
//!     let chain: String = api.request_as(Method::SystemChain).await?;
//!     println!("Connected to {chain}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`manager`] | [`ConnectionManager`] and its configuration |
//! | [`protocol`] | JSON-RPC message types |
//! | [`transport`] | WebSocket client and the client library boundary |
//! | [`types`] | Custom type registry and Subsocial definitions |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for requests, subscriptions and handles.
pub mod identifiers;

/// Connection lifecycle management.
///
/// Use [`ConnectionManager::builder()`] to create a configured manager.
pub mod manager;

/// JSON-RPC message types.
pub mod protocol;

/// WebSocket transport layer.
///
/// Defines the [`RpcClient`] / [`Transport`] boundary and its websocket
/// implementation.
pub mod transport;

/// Custom type registry.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{HandleId, RequestId, SubscriptionId};

// Manager types
pub use manager::{
    Api, ConnectionHandle, ConnectionManager, ConnectionManagerBuilder, ConnectionState,
    DEFAULT_ENDPOINT, ENDPOINT_ENV, EndpointConfig, IdleReaper, ManagerOptions,
};

// Protocol types
pub use protocol::{Method, SubscriptionMethod};

// Transport types
pub use transport::{RpcClient, Subscription, SystemInfo, Transport, WsClient};

// Type registry
pub use types::{TypeDef, TypeRegistry};
