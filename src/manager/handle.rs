//! Shared handle to the manager's live connection.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Value, from_value};
use url::Url;

use crate::error::Result;
use crate::identifiers::HandleId;
use crate::protocol::{Method, SubscriptionMethod};
use crate::transport::{RpcClient, Subscription, SystemInfo, Transport, WsClient};

// ============================================================================
// Types
// ============================================================================

/// Handle type produced by the default websocket client.
pub type Api = ConnectionHandle<<WsClient as RpcClient>::Transport>;

/// State shared by every clone of a handle.
struct HandleInner<T> {
    /// Generation of the attempt that produced this handle.
    id: HandleId,
    /// Endpoint the transport is connected to.
    endpoint: Url,
    /// Underlying session. Only the manager disconnects it.
    transport: T,
    /// Node identity, if the identity query succeeded.
    system_info: Option<SystemInfo>,
    /// Use tracking, shared with outstanding [`ActiveUse`] guards.
    activity: Arc<Activity>,
}

/// When the session was last used and how many uses are outstanding.
#[derive(Debug)]
struct Activity {
    /// Requests in flight plus open subscriptions.
    in_use: AtomicUsize,
    /// Last time a use started or ended.
    last_used: Mutex<Instant>,
}

impl Activity {
    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }
}

/// Marks the session busy until dropped.
struct ActiveUse {
    activity: Arc<Activity>,
}

impl ActiveUse {
    fn begin(activity: &Arc<Activity>) -> Self {
        activity.in_use.fetch_add(1, Ordering::SeqCst);
        activity.touch();
        Self {
            activity: Arc::clone(activity),
        }
    }
}

impl Drop for ActiveUse {
    fn drop(&mut self) {
        self.activity.touch();
        self.activity.in_use.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// ConnectionHandle
// ============================================================================

/// A shared reference to one live node session.
///
/// Cheap to clone. Handles can issue requests and subscriptions but cannot
/// close the session; the [`super::ConnectionManager`] owns its lifetime.
/// After the manager releases a session, requests through old clones fail
/// with [`crate::Error::ConnectionClosed`].
pub struct ConnectionHandle<T> {
    inner: Arc<HandleInner<T>>,
}

impl<T> Clone for ConnectionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> ConnectionHandle<T> {
    /// Wraps a ready transport.
    pub(crate) fn new(
        id: HandleId,
        endpoint: Url,
        transport: T,
        system_info: Option<SystemInfo>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                endpoint,
                transport,
                system_info,
                activity: Arc::new(Activity {
                    in_use: AtomicUsize::new(0),
                    last_used: Mutex::new(Instant::now()),
                }),
            }),
        }
    }

    /// Returns the handle's generation.
    #[inline]
    #[must_use]
    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Returns chain name, node name and version, when known.
    #[inline]
    #[must_use]
    pub fn system_info(&self) -> Option<&SystemInfo> {
        self.inner.system_info.as_ref()
    }

    /// Returns `true` while the session can serve requests.
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.transport.is_live()
    }

    /// Returns the time since a use of the handle last started or ended.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.inner.activity.last_used.lock().elapsed()
    }

    /// Returns the number of requests in flight plus open subscriptions.
    #[inline]
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.inner.activity.in_use.load(Ordering::SeqCst)
    }

    /// Returns `true` if both handles refer to the same session.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Calls a method and returns the raw result.
    ///
    /// # Errors
    ///
    /// Returns the transport's error, e.g. [`crate::Error::Rpc`] or
    /// [`crate::Error::ConnectionClosed`].
    pub async fn request(&self, method: Method) -> Result<Value> {
        let _active = ActiveUse::begin(&self.inner.activity);
        self.inner.transport.request(method).await
    }

    /// Calls a method and decodes the result.
    ///
    /// # Errors
    ///
    /// See [`ConnectionHandle::request`]; also [`crate::Error::Json`] if
    /// the result does not decode.
    pub async fn request_as<R: DeserializeOwned>(&self, method: Method) -> Result<R> {
        let value = self.request(method).await?;
        Ok(from_value(value)?)
    }

    /// Starts a subscription on this session.
    ///
    /// The session counts as in use until the subscription is dropped.
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn subscribe(&self, method: SubscriptionMethod) -> Result<Subscription> {
        let active = ActiveUse::begin(&self.inner.activity);
        let subscription = self.inner.transport.subscribe(method).await?;
        Ok(subscription.on_drop(move || drop(active)))
    }

    /// Records a use.
    pub(crate) fn touch(&self) {
        self.inner.activity.touch();
    }

    /// Returns the transport for lifecycle operations.
    pub(crate) fn transport(&self) -> &T {
        &self.inner.transport
    }
}

impl<T: Transport> fmt::Debug for ConnectionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("live", &self.is_live())
            .field("in_use", &self.in_use())
            .finish_non_exhaustive()
    }
}
