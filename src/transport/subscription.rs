//! Subscription stream handed to callers of `Transport::subscribe`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Value, from_value};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::identifiers::SubscriptionId;

// ============================================================================
// Types
// ============================================================================

/// Callback run once when the subscription is dropped.
type UnsubscribeFn = Box<dyn FnOnce() + Send>;

// ============================================================================
// Subscription
// ============================================================================

/// A live subscription to node updates.
///
/// Dropping it unsubscribes on the node.
pub struct Subscription {
    /// Node-assigned id.
    id: SubscriptionId,
    /// Notification payloads.
    rx: mpsc::UnboundedReceiver<Value>,
    /// Unsubscribe hook.
    on_drop: Option<UnsubscribeFn>,
}

impl Subscription {
    /// Creates a subscription reading payloads from `rx`.
    #[must_use]
    pub fn new(id: SubscriptionId, rx: mpsc::UnboundedReceiver<Value>) -> Self {
        Self {
            id,
            rx,
            on_drop: None,
        }
    }

    /// Adds a callback run when the subscription is dropped.
    ///
    /// Callbacks run in the order they were added.
    #[must_use]
    pub fn on_drop(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_drop = Some(match self.on_drop.take() {
            Some(previous) => Box::new(move || {
                previous();
                f();
            }),
            None => Box::new(f),
        });
        self
    }

    /// Returns the node-assigned subscription id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Waits for the next update.
    ///
    /// Returns `None` once the connection is gone.
    pub async fn next(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Waits for the next update and decodes it.
    pub async fn next_as<T: DeserializeOwned>(&mut self) -> Option<Result<T>> {
        let value = self.rx.recv().await?;
        Some(from_value(value).map_err(Into::into))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
