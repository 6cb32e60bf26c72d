//! Connection manager implementation.
//!
//! Owns at most one node session and hands out shared handles to it.
//! Concurrent callers attach to a single in-flight attempt instead of
//! opening their own.
//!
//! # Lifecycle
//!
//! ```ignore
//! use subsocial_api::ConnectionManager;
//!
//! let manager = ConnectionManager::from_env()?;
//! let api = manager.connection().await?;
//! // ... later, from a timer
//! manager.release_if_idle(std::time::Duration::from_secs(10));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result, duration_ms};
use crate::identifiers::HandleId;
use crate::transport::{RpcClient, Transport, WsClient};
use crate::types::TypeRegistry;

use super::builder::ConnectionManagerBuilder;
use super::config::{EndpointConfig, ManagerOptions};
use super::handle::ConnectionHandle;
use super::reaper::IdleReaper;
use super::state::ConnectionState;

// ============================================================================
// Types
// ============================================================================

/// Result of one connection attempt, shared by all of its waiters.
type Outcome<T> = StdResult<ConnectionHandle<T>, Arc<Error>>;

/// Receiving side of an in-flight attempt.
type AttemptRx<T> = watch::Receiver<Option<Outcome<T>>>;

/// Manager state. The only writer is the manager itself.
enum Slot<T> {
    Uninitialized,
    Connecting {
        /// Attempt generation; becomes the handle id on success.
        generation: u64,
        /// Resolves once the attempt finishes.
        outcome: AttemptRx<T>,
    },
    Ready(ConnectionHandle<T>),
    Disconnected,
}

/// Shared state behind every manager clone.
struct ManagerInner<C: RpcClient> {
    /// RPC client library.
    client: C,
    /// Node endpoint.
    endpoint: EndpointConfig,
    /// Timeouts.
    options: ManagerOptions,
    /// Current lifecycle slot. Never held across an await.
    slot: Mutex<Slot<C::Transport>>,
    /// Last attempt generation handed out.
    next_generation: AtomicU64,
    /// Registration result. Set once, failures included.
    types: OnceLock<StdResult<Arc<TypeRegistry>, String>>,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Lazily connects to a Substrate node and shares the session.
///
/// Construct one per process and pass clones to consumers. Cloning is cheap
/// and every clone drives the same state machine.
///
/// # Guarantees
///
/// - At most one connection attempt is in flight at a time.
/// - Every caller attached to an attempt observes the same outcome.
/// - Type registration runs once, before the first connect.
/// - At most one live session exists per manager.
pub struct ConnectionManager<C: RpcClient = WsClient> {
    inner: Arc<ManagerInner<C>>,
}

impl<C: RpcClient> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// ============================================================================
// ConnectionManager - Construction
// ============================================================================

impl ConnectionManager<WsClient> {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    /// Creates a websocket manager for the endpoint in `SUBSTRATE_URL`, or
    /// the local default.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds an invalid endpoint.
    pub fn from_env() -> Result<Self> {
        Ok(Self::with_client(
            WsClient::new(),
            EndpointConfig::from_env()?,
            ManagerOptions::default(),
        ))
    }
}

impl<C: RpcClient> ConnectionManager<C> {
    /// Creates a manager over a specific RPC client.
    ///
    /// No connection is made until [`ConnectionManager::connection`].
    #[must_use]
    pub fn with_client(client: C, endpoint: EndpointConfig, options: ManagerOptions) -> Self {
        debug!(endpoint = %endpoint, "Connection manager created");

        Self {
            inner: Arc::new(ManagerInner {
                client,
                endpoint,
                options,
                slot: Mutex::new(Slot::Uninitialized),
                next_generation: AtomicU64::new(0),
                types: OnceLock::new(),
            }),
        }
    }

    /// Returns the configured endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &EndpointConfig {
        &self.inner.endpoint
    }

    /// Returns the configured timeouts.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ManagerOptions {
        &self.inner.options
    }

    /// Returns the type registry, once registration has succeeded.
    #[must_use]
    pub fn registry(&self) -> Option<Arc<TypeRegistry>> {
        match self.inner.types.get() {
            Some(Ok(registry)) => Some(Arc::clone(registry)),
            _ => None,
        }
    }
}

// ============================================================================
// ConnectionManager - Connection
// ============================================================================

impl<C: RpcClient> ConnectionManager<C> {
    /// Returns the shared connection, connecting if needed.
    ///
    /// A live cached handle is returned without suspending. If an attempt
    /// is in flight the caller waits for it. Otherwise a new attempt starts.
    ///
    /// Dropping the returned future only detaches this caller; the attempt
    /// keeps running for everyone else.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeRegistration`] if type registration failed (fatal)
    /// - [`Error::Connection`] / [`Error::ConnectionTimeout`] if the
    ///   transport could not be opened
    /// - [`Error::ReadinessTimeout`] if the node never became ready
    ///
    /// Errors from a shared attempt arrive wrapped in [`Error::Attempt`];
    /// use [`Error::root`] or the predicates to inspect them.
    pub async fn connection(&self) -> Result<ConnectionHandle<C::Transport>> {
        let (generation, mut outcome) = {
            let mut slot = self.inner.slot.lock();

            if let Slot::Ready(handle) = &*slot {
                if handle.is_live() {
                    handle.touch();
                    return Ok(handle.clone());
                }
                warn!(id = %handle.id(), "Cached connection is no longer live, reconnecting");
                handle.transport().disconnect();
                *slot = Slot::Disconnected;
            }

            if let Slot::Connecting {
                generation,
                outcome,
            } = &*slot
            {
                (*generation, outcome.clone())
            } else {
                self.start_attempt(&mut slot)
            }
        };

        match outcome.wait_for(Option::is_some).await {
            Ok(resolved) => match &*resolved {
                Some(Ok(handle)) => {
                    handle.touch();
                    Ok(handle.clone())
                }
                Some(Err(e)) => Err(Error::Attempt(Arc::clone(e))),
                None => Err(Error::connection("connection attempt produced no outcome")),
            },
            Err(_) => {
                self.inner.abandon_attempt(generation);
                Err(Error::connection("connection attempt aborted"))
            }
        }
    }

    /// Like [`ConnectionManager::connection`], but gives up waiting after
    /// `wait`. The attempt itself is not cancelled.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if `wait` elapses first, otherwise as
    /// [`ConnectionManager::connection`].
    pub async fn connection_timeout(&self, wait: Duration) -> Result<ConnectionHandle<C::Transport>> {
        timeout(wait, self.connection())
            .await
            .map_err(|_| Error::timeout("waiting for node connection", duration_ms(wait)))?
    }

    /// Returns the cached handle if it is live, without connecting.
    #[must_use]
    pub fn cached(&self) -> Option<ConnectionHandle<C::Transport>> {
        match &*self.inner.slot.lock() {
            Slot::Ready(handle) if handle.is_live() => {
                handle.touch();
                Some(handle.clone())
            }
            _ => None,
        }
    }

    /// Moves the slot to `Connecting` and spawns the attempt.
    fn start_attempt(&self, slot: &mut Slot<C::Transport>) -> (u64, AttemptRx<C::Transport>) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = watch::channel(None);

        *slot = Slot::Connecting {
            generation,
            outcome: rx.clone(),
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = inner.establish(generation).await.map_err(Arc::new);
            inner.finish_attempt(generation, &outcome);
            let _ = tx.send(Some(outcome));
        });

        debug!(generation, "Connection attempt started");
        (generation, rx)
    }
}

// ============================================================================
// ConnectionManager - Teardown
// ============================================================================

impl<C: RpcClient> ConnectionManager<C> {
    /// Disconnects the cached session if it is no longer live, or if no
    /// request is in flight, no subscription is open and it has been idle
    /// for at least `threshold`.
    ///
    /// A no-op unless the state is `Ready`. Returns `true` if a session was
    /// released.
    pub fn release_if_idle(&self, threshold: Duration) -> bool {
        self.inner.release(Some(threshold))
    }

    /// Disconnects the cached session even if it is in use.
    ///
    /// An in-flight attempt is left alone. Returns `true` if a session was
    /// released.
    pub fn disconnect(&self) -> bool {
        self.inner.release(None)
    }

    /// Returns the current lifecycle state.
    ///
    /// A cached session that is no longer live reports
    /// [`ConnectionState::Disconnected`].
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match &*self.inner.slot.lock() {
            Slot::Uninitialized => ConnectionState::Uninitialized,
            Slot::Connecting { .. } => ConnectionState::Connecting,
            Slot::Ready(handle) if handle.is_live() => ConnectionState::Ready,
            Slot::Ready(_) | Slot::Disconnected => ConnectionState::Disconnected,
        }
    }

    /// Spawns an idle reaper using the configured
    /// [`ManagerOptions::idle_threshold`], checking twice per threshold.
    #[must_use = "dropping the reaper stops it"]
    pub fn spawn_default_reaper(&self) -> IdleReaper {
        let threshold = self.inner.options.idle_threshold;
        self.spawn_idle_reaper(threshold / 2, threshold)
    }

    /// Spawns a task calling [`ConnectionManager::release_if_idle`] every
    /// `period`.
    ///
    /// The task stops when the returned [`IdleReaper`] is dropped or the
    /// last manager clone goes away.
    #[must_use = "dropping the reaper stops it"]
    pub fn spawn_idle_reaper(&self, period: Duration, threshold: Duration) -> IdleReaper {
        let manager: Weak<ManagerInner<C>> = Arc::downgrade(&self.inner);
        let period = period.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = manager.upgrade() else {
                    break;
                };
                inner.release(Some(threshold));
            }

            debug!("Idle reaper stopped");
        });

        IdleReaper::new(task)
    }
}

impl<C: RpcClient> fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.endpoint.url().as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ManagerInner
// ============================================================================

impl<C: RpcClient> ManagerInner<C> {
    /// Runs one attempt: register, connect, wait for readiness, identify.
    async fn establish(&self, generation: u64) -> Result<ConnectionHandle<C::Transport>> {
        let types = self.registered_types()?;
        let url = self.endpoint.url();

        info!(endpoint = %url, "Connecting to Substrate node");

        let transport = timeout(self.options.connect_timeout, self.client.connect(url, types))
            .await
            .map_err(|_| Error::connection_timeout(duration_ms(self.options.connect_timeout)))??;

        match timeout(self.options.ready_timeout, transport.wait_ready()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                transport.disconnect();
                return Err(e);
            }
            Err(_) => {
                transport.disconnect();
                return Err(Error::readiness_timeout(duration_ms(self.options.ready_timeout)));
            }
        }

        let system_info = match timeout(self.options.ready_timeout, transport.system_info()).await
        {
            Ok(Ok(info)) => {
                info!(
                    endpoint = %url,
                    chain = %info.chain,
                    node = %info.node_name,
                    version = %info.node_version,
                    "Connected to Substrate node"
                );
                Some(info)
            }
            Ok(Err(e)) => {
                warn!(endpoint = %url, error = %e, "Connected, node identity unavailable");
                None
            }
            Err(_) => {
                warn!(endpoint = %url, "Connected, node identity query timed out");
                None
            }
        };

        Ok(ConnectionHandle::new(
            HandleId::new(generation),
            url.clone(),
            transport,
            system_info,
        ))
    }

    /// Returns the registry, registering types on first use.
    fn registered_types(&self) -> Result<Arc<TypeRegistry>> {
        let registered = self.types.get_or_init(|| {
            let mut registry = TypeRegistry::new();
            match self.client.register_types(&mut registry) {
                Ok(()) => {
                    debug!(types = registry.len(), "Registered custom types");
                    Ok(Arc::new(registry))
                }
                Err(e) => {
                    error!(error = %e, "Type registration failed");
                    Err(match e {
                        Error::TypeRegistration { message } => message,
                        other => other.to_string(),
                    })
                }
            }
        });

        match registered {
            Ok(registry) => Ok(Arc::clone(registry)),
            Err(message) => Err(Error::type_registration(message.clone())),
        }
    }

    /// Publishes an attempt's result into the slot.
    fn finish_attempt(&self, generation: u64, outcome: &Outcome<C::Transport>) {
        let mut slot = self.slot.lock();

        let current = matches!(
            &*slot,
            Slot::Connecting { generation: g, .. } if *g == generation
        );
        if !current {
            // Superseded; never keep a second session.
            if let Ok(handle) = outcome {
                handle.transport().disconnect();
            }
            return;
        }

        *slot = match outcome {
            Ok(handle) => Slot::Ready(handle.clone()),
            Err(e) => {
                warn!(generation, error = %e, "Connection attempt failed");
                Slot::Uninitialized
            }
        };
    }

    /// Resets a `Connecting` slot whose attempt task died without a result.
    fn abandon_attempt(&self, generation: u64) {
        let mut slot = self.slot.lock();
        if matches!(&*slot, Slot::Connecting { generation: g, .. } if *g == generation) {
            warn!(generation, "Connection attempt aborted");
            *slot = Slot::Uninitialized;
        }
    }

    /// Tears down a `Ready` session. `None` forces it; `Some(threshold)`
    /// spares a live session that is in use or was used within `threshold`.
    fn release(&self, idle_threshold: Option<Duration>) -> bool {
        let mut slot = self.slot.lock();

        let Slot::Ready(handle) = &*slot else {
            return false;
        };

        let idle = handle.idle_for();
        let live = handle.is_live();
        if let Some(threshold) = idle_threshold
            && live
            && (handle.in_use() > 0 || idle < threshold)
        {
            return false;
        }

        handle.transport().disconnect();
        info!(
            endpoint = %handle.endpoint(),
            id = %handle.id(),
            idle_ms = duration_ms(idle),
            live,
            "Disconnected from Substrate node"
        );

        *slot = Slot::Disconnected;
        true
    }
}

impl<C: RpcClient> Drop for ManagerInner<C> {
    fn drop(&mut self) {
        if let Slot::Ready(handle) = self.slot.get_mut() {
            handle.transport().disconnect();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tokio::time::sleep;
    use url::Url;

    use crate::identifiers::SubscriptionId;
    use crate::protocol::{Method, SubscriptionMethod};
    use crate::transport::Subscription;

    // ------------------------------------------------------------------------
    // Mock client
    // ------------------------------------------------------------------------

    /// Counters shared between a mock client and the test.
    #[derive(Default)]
    struct MockNode {
        registrations: AtomicUsize,
        connects: AtomicUsize,
        fail_connect: AtomicBool,
        sessions: Mutex<Vec<Arc<AtomicBool>>>,
    }

    impl MockNode {
        fn live_sessions(&self) -> usize {
            self.sessions
                .lock()
                .iter()
                .filter(|live| live.load(Ordering::SeqCst))
                .count()
        }
    }

    #[derive(Default)]
    struct MockClient {
        node: Arc<MockNode>,
        fail_registration: bool,
        never_ready: bool,
        connect_delay: Duration,
    }

    struct MockTransport {
        live: Arc<AtomicBool>,
        never_ready: bool,
    }

    #[async_trait]
    impl RpcClient for MockClient {
        type Transport = MockTransport;

        fn register_types(&self, registry: &mut TypeRegistry) -> Result<()> {
            self.node.registrations.fetch_add(1, Ordering::SeqCst);
            if self.fail_registration {
                return Err(Error::type_registration("duplicate type PostId"));
            }
            crate::types::register_subsocial_types(registry)
        }

        async fn connect(&self, _url: &Url, _types: Arc<TypeRegistry>) -> Result<MockTransport> {
            self.node.connects.fetch_add(1, Ordering::SeqCst);
            if !self.connect_delay.is_zero() {
                sleep(self.connect_delay).await;
            }
            if self.node.fail_connect.load(Ordering::SeqCst) {
                return Err(Error::connection("connection refused"));
            }

            let live = Arc::new(AtomicBool::new(true));
            self.node.sessions.lock().push(Arc::clone(&live));
            Ok(MockTransport {
                live,
                never_ready: self.never_ready,
            })
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn wait_ready(&self) -> Result<()> {
            if self.never_ready {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn request(&self, method: Method) -> Result<Value> {
            if !self.is_live() {
                return Err(Error::ConnectionClosed);
            }
            Ok(match method {
                Method::SystemChain => json!("Subsocial"),
                Method::SystemName => json!("mock-node"),
                Method::SystemVersion => json!("1.0.0"),
                Method::ChainGetBlockHash { .. } => json!("0xabc"),
                Method::Raw { name, .. } if name == "slow_call" => {
                    sleep(Duration::from_millis(100)).await;
                    json!("done")
                }
                _ => Value::Null,
            })
        }

        async fn subscribe(&self, _method: SubscriptionMethod) -> Result<Subscription> {
            let (tx, rx) = mpsc::unbounded_channel();
            let _ = tx.send(json!({"number": "0x1"}));
            Ok(Subscription::new(SubscriptionId::Number(1), rx))
        }

        fn is_live(&self) -> bool {
            self.live.load(Ordering::SeqCst)
        }

        fn disconnect(&self) {
            self.live.store(false, Ordering::SeqCst);
        }
    }

    fn manager(client: MockClient, options: ManagerOptions) -> ConnectionManager<MockClient> {
        let endpoint = EndpointConfig::from_override(None).expect("default endpoint");
        ConnectionManager::with_client(client, endpoint, options)
    }

    fn slow_client(node: &Arc<MockNode>, delay_ms: u64) -> MockClient {
        MockClient {
            node: Arc::clone(node),
            connect_delay: Duration::from_millis(delay_ms),
            ..MockClient::default()
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(5)).await;
        }
        false
    }

    // ------------------------------------------------------------------------
    // Single-flight
    // ------------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_attempt() {
        init_tracing();
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 50), ManagerOptions::default());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.connection().await })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.expect("join").expect("connection"));
        }

        assert_eq!(node.connects.load(Ordering::SeqCst), 1);
        assert_eq!(node.registrations.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));
        assert_eq!(manager.state(), ConnectionState::Ready);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_failure() {
        let node = Arc::new(MockNode::default());
        node.fail_connect.store(true, Ordering::SeqCst);
        let manager = manager(slow_client(&node, 30), ManagerOptions::default());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.connection().await })
            })
            .collect();

        for task in tasks {
            let err = task.await.expect("join").unwrap_err();
            assert!(err.is_connection_error());
            assert!(err.is_recoverable());
        }

        assert_eq!(node.connects.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ConnectionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_cached_handle_returned_without_reconnect() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        assert!(manager.cached().is_none());
        let first = manager.connection().await.expect("connect");
        let second = manager.connection().await.expect("cached");
        let third = manager.cached().expect("cached");

        assert!(first.ptr_eq(&second));
        assert!(first.ptr_eq(&third));
        assert_eq!(node.connects.load(Ordering::SeqCst), 1);
    }

    // ------------------------------------------------------------------------
    // Failures
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_failure_resets_and_next_call_retries() {
        let node = Arc::new(MockNode::default());
        node.fail_connect.store(true, Ordering::SeqCst);
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        let err = manager.connection().await.unwrap_err();
        assert!(matches!(err.root(), Error::Connection { .. }));
        assert_eq!(manager.state(), ConnectionState::Uninitialized);

        node.fail_connect.store(false, Ordering::SeqCst);
        manager.connection().await.expect("retry succeeds");

        assert_eq!(node.connects.load(Ordering::SeqCst), 2);
        assert_eq!(node.registrations.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_registration_failure_is_fatal_and_not_rerun() {
        let node = Arc::new(MockNode::default());
        let client = MockClient {
            node: Arc::clone(&node),
            fail_registration: true,
            ..MockClient::default()
        };
        let manager = manager(client, ManagerOptions::default());

        for _ in 0..3 {
            let err = manager.connection().await.unwrap_err();
            assert!(err.is_fatal());
            assert!(!err.is_recoverable());
            assert!(err.to_string().contains("duplicate type PostId"));
        }

        assert_eq!(node.registrations.load(Ordering::SeqCst), 1);
        assert_eq!(node.connects.load(Ordering::SeqCst), 0);
        assert!(manager.registry().is_none());
        assert_eq!(manager.state(), ConnectionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_readiness_timeout_resets_state() {
        let node = Arc::new(MockNode::default());
        let client = MockClient {
            node: Arc::clone(&node),
            never_ready: true,
            ..MockClient::default()
        };
        let options = ManagerOptions {
            ready_timeout: Duration::from_millis(50),
            ..ManagerOptions::default()
        };
        let manager = manager(client, options);

        let err = manager.connection().await.unwrap_err();
        assert!(matches!(err.root(), Error::ReadinessTimeout { timeout_ms: 50 }));
        assert!(err.is_timeout());
        assert_eq!(manager.state(), ConnectionState::Uninitialized);
        assert_eq!(node.live_sessions(), 0);
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let node = Arc::new(MockNode::default());
        let options = ManagerOptions {
            connect_timeout: Duration::from_millis(20),
            ..ManagerOptions::default()
        };
        let manager = manager(slow_client(&node, 500), options);

        let err = manager.connection().await.unwrap_err();
        assert!(matches!(err.root(), Error::ConnectionTimeout { timeout_ms: 20 }));
        assert_eq!(manager.state(), ConnectionState::Uninitialized);
    }

    // ------------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_abort_attempt() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 100), ManagerOptions::default());

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.connection().await })
        };
        sleep(Duration::from_millis(10)).await;
        waiter.abort();

        let err = manager
            .connection_timeout(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(manager.state(), ConnectionState::Connecting);

        manager.connection().await.expect("attempt completes");
        assert_eq!(node.connects.load(Ordering::SeqCst), 1);
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        assert!(!manager.release_if_idle(Duration::ZERO));
        assert_eq!(manager.state(), ConnectionState::Uninitialized);

        let handle = manager.connection().await.expect("connect");
        assert!(manager.release_if_idle(Duration::ZERO));
        assert!(!manager.release_if_idle(Duration::ZERO));

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!handle.is_live());
        assert_eq!(node.live_sessions(), 0);

        let err = handle.request(Method::SystemChain).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_release_keeps_connection_with_open_subscription() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        let api = manager.connection().await.expect("connect");
        let heads = api
            .subscribe(SubscriptionMethod::NewHeads)
            .await
            .expect("subscribe");
        assert_eq!(api.in_use(), 1);

        sleep(Duration::from_millis(40)).await;
        assert!(!manager.release_if_idle(Duration::from_millis(20)));
        assert_eq!(manager.state(), ConnectionState::Ready);
        assert!(api.is_live());

        drop(heads);
        assert_eq!(api.in_use(), 0);
        assert!(manager.release_if_idle(Duration::ZERO));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_release_keeps_connection_with_request_in_flight() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        let api = manager.connection().await.expect("connect");
        let pending = {
            let api = api.clone();
            tokio::spawn(async move { api.request(Method::raw("slow_call", vec![])).await })
        };

        sleep(Duration::from_millis(40)).await;
        assert_eq!(api.in_use(), 1);
        assert!(!manager.release_if_idle(Duration::from_millis(20)));

        let result = pending.await.expect("join").expect("request completes");
        assert_eq!(result, "done");
        assert_eq!(api.in_use(), 0);
        assert!(api.is_live());
    }

    #[tokio::test]
    async fn test_disconnect_ignores_active_use() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        let api = manager.connection().await.expect("connect");
        let _heads = api
            .subscribe(SubscriptionMethod::NewHeads)
            .await
            .expect("subscribe");

        assert!(manager.disconnect());
        assert!(!api.is_live());
        assert_eq!(node.live_sessions(), 0);
    }

    #[tokio::test]
    async fn test_release_keeps_recently_used_connection() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        let handle = manager.connection().await.expect("connect");
        assert!(!manager.release_if_idle(Duration::from_secs(60)));
        assert_eq!(manager.state(), ConnectionState::Ready);
        assert!(handle.is_live());
    }

    #[tokio::test]
    async fn test_release_during_connecting_is_noop() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 100), ManagerOptions::default());

        let pending = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.connection().await })
        };
        sleep(Duration::from_millis(10)).await;

        assert!(!manager.release_if_idle(Duration::ZERO));
        assert!(!manager.disconnect());
        assert_eq!(manager.state(), ConnectionState::Connecting);

        let handle = pending.await.expect("join").expect("connect");
        assert!(handle.is_live());
        assert_eq!(manager.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_reconnect_after_teardown() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        let first = manager.connection().await.expect("connect");
        assert!(manager.disconnect());
        let second = manager.connection().await.expect("reconnect");

        assert!(!first.ptr_eq(&second));
        assert_ne!(first.id(), second.id());
        assert!(!first.is_live());
        assert!(second.is_live());
        assert_eq!(node.connects.load(Ordering::SeqCst), 2);
        assert_eq!(node.registrations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dead_session_is_replaced() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        let first = manager.connection().await.expect("connect");
        node.sessions.lock()[0].store(false, Ordering::SeqCst);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.cached().is_none());

        let second = manager.connection().await.expect("reconnect");
        assert!(!first.ptr_eq(&second));
        assert_eq!(node.connects.load(Ordering::SeqCst), 2);
        assert_eq!(manager.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_never_two_live_sessions() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        for _ in 0..5 {
            manager.connection().await.expect("connect");
            assert_eq!(node.live_sessions(), 1);
            manager.release_if_idle(Duration::ZERO);
            assert_eq!(node.live_sessions(), 0);
        }
        assert_eq!(node.registrations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_disconnects_session() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        manager.connection().await.expect("connect");
        drop(manager);
        assert_eq!(node.live_sessions(), 0);
    }

    // ------------------------------------------------------------------------
    // Idle reaper
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_idle_reaper_releases_connection() {
        init_tracing();
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        let reaper = manager.spawn_idle_reaper(Duration::from_millis(10), Duration::from_millis(20));
        manager.connection().await.expect("connect");

        let released = wait_until(|| manager.state() == ConnectionState::Disconnected).await;
        assert!(released);
        assert!(reaper.is_running());
        reaper.stop();

        manager.connection().await.expect("reconnect");
        assert_eq!(node.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_default_reaper_uses_configured_threshold() {
        let node = Arc::new(MockNode::default());
        let options = ManagerOptions {
            idle_threshold: Duration::from_millis(20),
            ..ManagerOptions::default()
        };
        let manager = manager(slow_client(&node, 0), options);

        let _reaper = manager.spawn_default_reaper();
        manager.connection().await.expect("connect");

        assert!(wait_until(|| manager.state() == ConnectionState::Disconnected).await);
    }

    #[tokio::test]
    async fn test_idle_reaper_exits_with_manager() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        let reaper = manager.spawn_idle_reaper(Duration::from_millis(5), Duration::from_secs(60));
        drop(manager);

        assert!(wait_until(|| !reaper.is_running()).await);
    }

    // ------------------------------------------------------------------------
    // Handle
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_handle_requests_and_identity() {
        let node = Arc::new(MockNode::default());
        let manager = manager(slow_client(&node, 0), ManagerOptions::default());

        let api = manager.connection().await.expect("connect");
        let info = api.system_info().expect("identity");
        assert_eq!(info.chain, "Subsocial");
        assert_eq!(info.node_name, "mock-node");
        assert_eq!(info.node_version, "1.0.0");
        assert_eq!(api.endpoint().as_str(), "ws://127.0.0.1:9944/");

        let genesis: String = api
            .request_as(Method::ChainGetBlockHash { number: Some(0) })
            .await
            .expect("block hash");
        assert_eq!(genesis, "0xabc");

        let mut heads = api
            .subscribe(SubscriptionMethod::NewHeads)
            .await
            .expect("subscribe");
        let head = heads.next().await.expect("update");
        assert_eq!(head["number"], "0x1");

        let registry = manager.registry().expect("registered");
        assert!(registry.contains("Post"));
    }
}
