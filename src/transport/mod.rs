//! WebSocket transport layer.
//!
//! This module handles communication between the client (Rust) and a
//! Substrate node via JSON-RPC over websocket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Client (Rust)  │                              │  Substrate node │
//! │                 │         WebSocket            │                 │
//! │  WsClient       │◄────────────────────────────►│  JSON-RPC       │
//! │  → Connection   │      ws://127.0.0.1:9944     │  server         │
//! │                 │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `RpcClient::register_types` - Extend the decoder with custom types
//! 2. `RpcClient::connect` - Open the websocket
//! 3. `Transport::wait_ready` - Readiness handshake
//! 4. `Transport::request` / `Transport::subscribe` - Serve callers
//! 5. `Transport::disconnect` - Close the socket
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | [`WsClient`], the websocket [`RpcClient`] |
//! | `connection` | WebSocket connection and event loop |
//! | `subscription` | Subscription stream |
//! | `traits` | [`RpcClient`] and [`Transport`] |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket RPC client.
pub mod client;

/// WebSocket connection and event loop.
pub mod connection;

/// Subscription stream.
pub mod subscription;

/// Client library boundary.
pub mod traits;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::WsClient;
pub use connection::{Connection, ReadyData};
pub use subscription::Subscription;
pub use traits::{RpcClient, SystemInfo, Transport};
