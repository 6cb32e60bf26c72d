//! Subscription notification messages.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::identifiers::SubscriptionId;

// ============================================================================
// Notification
// ============================================================================

/// A subscription update pushed by the node.
///
/// # Format
///
/// ```json
/// {
///   "jsonrpc": "2.0",
///   "method": "chain_newHead",
///   "params": { "subscription": "0xab", "result": { ... } }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    /// Notification method, e.g. `state_storage`.
    pub method: String,

    /// Subscription id and payload.
    pub params: NotificationParams,
}

/// Parameters of a [`Notification`].
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationParams {
    /// Subscription the update belongs to.
    pub subscription: SubscriptionId,

    /// Update payload.
    #[serde(default)]
    pub result: Value,
}

// ============================================================================
// Tests
// ============================================================================
