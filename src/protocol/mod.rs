//! JSON-RPC protocol message types.
//!
//! This module defines the message format for communication between
//! the client and a Substrate node's websocket endpoint.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Client → Node | Method call or subscribe/unsubscribe |
//! | `Response` | Node → Client | Result or error object for a request id |
//! | `Notification` | Node → Client | Subscription update |
//!
//! # Method Naming
//!
//! Methods follow the Substrate `module_methodName` format:
//!
//! - `system_chain`
//! - `chain_getBlockHash`
//! - `state_subscribeStorage`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `method` | Typed RPC and subscription methods |
//! | `notification` | Subscription notification type |
//! | `request` | Request, Response and error object types |

// ============================================================================
// Submodules
// ============================================================================

/// Typed RPC methods.
pub mod method;

/// Subscription notification messages.
pub mod notification;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use method::{Method, SubscriptionMethod};
pub use notification::{Notification, NotificationParams};
pub use request::{Request, Response, RpcError};
