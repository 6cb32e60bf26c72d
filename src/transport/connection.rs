//! WebSocket connection and event loop.
//!
//! This module handles the JSON-RPC session with a Substrate node,
//! including request/response correlation and subscription routing.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming messages from the node (responses, notifications)
//! - Outgoing requests from the Rust API
//! - Request/response correlation by numeric id
//! - Subscription notifications routed by subscription id

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use serde_json::{Value, from_str, from_value, to_string};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result, duration_ms};
use crate::identifiers::{RequestId, SubscriptionId};
use crate::protocol::{Method, Notification, Request, Response, SubscriptionMethod};
use crate::types::TypeRegistry;

use super::{Subscription, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for a single request.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending requests before rejecting new ones.
const MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// Client side of a node websocket.
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Response>>>;

// ============================================================================
// ReadyData
// ============================================================================

/// Data gathered during the readiness handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyData {
    /// Hash of block 0.
    pub genesis_hash: String,
    /// Runtime spec name.
    pub spec_name: String,
    /// Runtime spec version.
    pub spec_version: u32,
}

/// Fields of `state_getRuntimeVersion` the handshake needs.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeVersion {
    spec_name: String,
    spec_version: u32,
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and wait for response.
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Send a subscribe request; on success route notifications to `sink`.
    Subscribe {
        request: Request,
        sink: mpsc::UnboundedSender<Value>,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Drop a subscription and tell the node.
    Unsubscribe {
        subscription: SubscriptionId,
        request: Request,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(RequestId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// LoopState
// ============================================================================

/// State owned by the event loop task.
#[derive(Default)]
struct LoopState {
    /// Subscribe requests waiting for their subscription id.
    pending_subscriptions: FxHashMap<RequestId, mpsc::UnboundedSender<Value>>,
    /// Active subscriptions.
    subscriptions: FxHashMap<SubscriptionId, mpsc::UnboundedSender<Value>>,
    /// Requests whose responses nobody waits for.
    detached: FxHashSet<RequestId>,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to a Substrate node.
///
/// Handles request/response correlation and subscription routing.
/// The connection spawns an internal event loop task.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and can be shared across tasks.
/// All operations are non-blocking.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Cleared when the event loop ends or on disconnect.
    live: Arc<AtomicBool>,
    /// Handshake result.
    ready: Arc<Mutex<Option<ReadyData>>>,
    /// Custom types registered for this session. Carried for decoders
    /// built on top of the connection; the JSON-RPC layer does not read it.
    types: Arc<TypeRegistry>,
    /// Per-request timeout.
    request_timeout: Duration,
}

impl Connection {
    /// Creates a new connection from a WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub(crate) fn new(ws_stream: WsStream, types: Arc<TypeRegistry>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let live = Arc::new(AtomicBool::new(true));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            Arc::clone(&live),
        ));

        Self {
            command_tx,
            correlation,
            live,
            ready: Arc::new(Mutex::new(None)),
            types,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub(crate) fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Runs the readiness handshake.
    ///
    /// Fetches the genesis hash and the runtime version; the node is
    /// considered ready once both answer.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection closes first
    /// - [`Error::Protocol`] if the answers have an unexpected shape
    pub async fn handshake(&self) -> Result<ReadyData> {
        let genesis = self
            .call(&Method::ChainGetBlockHash { number: Some(0) })
            .await?;
        let genesis_hash: String = from_value(genesis)
            .map_err(|e| Error::protocol(format!("genesis hash is not a string: {e}")))?;

        let version = self.call(&Method::StateGetRuntimeVersion).await?;
        let RuntimeVersion {
            spec_name,
            spec_version,
        } = from_value(version)
            .map_err(|e| Error::protocol(format!("invalid runtime version: {e}")))?;

        let data = ReadyData {
            genesis_hash,
            spec_name,
            spec_version,
        };

        debug!(
            genesis = %data.genesis_hash,
            spec = %data.spec_name,
            version = data.spec_version,
            "Readiness handshake completed"
        );

        *self.ready.lock() = Some(data.clone());
        Ok(data)
    }

    /// Returns the handshake result, if the handshake has run.
    #[inline]
    #[must_use]
    pub fn ready_data(&self) -> Option<ReadyData> {
        self.ready.lock().clone()
    }

    /// Returns the custom types registered for this session, for callers
    /// decoding SCALE payloads themselves.
    #[inline]
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Calls a method and returns the raw result.
    ///
    /// # Errors
    ///
    /// - [`Error::Rpc`] if the node returns an error object
    /// - see [`Connection::send`]
    pub async fn call(&self, method: &Method) -> Result<Value> {
        self.send(Request::new(method)).await?.into_result()
    }

    /// Sends a request and waits for response with the configured timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if connection is closed
    /// - [`Error::RequestTimeout`] if response not received within timeout
    /// - [`Error::Protocol`] if too many pending requests
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_with_timeout(request, self.request_timeout).await
    }

    /// Sends a request and waits for response with custom timeout.
    ///
    /// # Arguments
    ///
    /// * `request` - The request to send
    /// * `request_timeout` - Maximum time to wait for response
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if connection is closed
    /// - [`Error::RequestTimeout`] if response not received within timeout
    /// - [`Error::Protocol`] if too many pending requests
    pub async fn send_with_timeout(
        &self,
        request: Request,
        request_timeout: Duration,
    ) -> Result<Response> {
        let request_id = request.id;
        self.check_pending_limit()?;

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        self.await_response(request_id, response_rx, request_timeout)
            .await
    }

    /// Starts a subscription.
    ///
    /// # Errors
    ///
    /// - [`Error::Rpc`] if the node rejects the subscription
    /// - [`Error::Protocol`] if the node returns no usable subscription id
    /// - see [`Connection::send`]
    pub async fn subscribe(&self, method: SubscriptionMethod) -> Result<Subscription> {
        let request = Request::subscribe(&method);
        let request_id = request.id;
        self.check_pending_limit()?;

        let (sink, rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Subscribe {
                request,
                sink,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        let response = self
            .await_response(request_id, response_rx, self.request_timeout)
            .await?;
        let id: SubscriptionId = from_value(response.into_result()?)
            .map_err(|e| Error::protocol(format!("invalid subscription id: {e}")))?;

        debug!(subscription = %id, method = method.subscribe_name(), "Subscribed");

        let command_tx = self.command_tx.clone();
        let unsubscribe_id = id.clone();
        Ok(Subscription::new(id, rx).on_drop(move || {
            let request = Request::unsubscribe(&method, &unsubscribe_id);
            let _ = command_tx.send(ConnectionCommand::Unsubscribe {
                subscription: unsubscribe_id,
                request,
            });
        }))
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns `true` while the event loop runs and no shutdown was requested.
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Shuts down the connection gracefully.
    ///
    /// Liveness drops immediately; the socket closes on the event loop.
    pub fn shutdown(&self) {
        self.live.store(false, Ordering::SeqCst);
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Rejects new requests once too many are in flight.
    fn check_pending_limit(&self) -> Result<()> {
        let correlation = self.correlation.lock();
        if correlation.len() >= MAX_PENDING_REQUESTS {
            warn!(
                pending = correlation.len(),
                max = MAX_PENDING_REQUESTS,
                "Too many pending requests"
            );
            return Err(Error::protocol(format!(
                "Too many pending requests: {}/{}",
                correlation.len(),
                MAX_PENDING_REQUESTS
            )));
        }
        Ok(())
    }

    /// Waits for a correlated response, cleaning up on timeout.
    async fn await_response(
        &self,
        request_id: RequestId,
        response_rx: oneshot::Receiver<Result<Response>>,
        request_timeout: Duration,
    ) -> Result<Response> {
        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(ConnectionCommand::RemoveCorrelation(request_id));

                Err(Error::request_timeout(
                    request_id,
                    duration_ms(request_timeout),
                ))
            }
        }
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        live: Arc<AtomicBool>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();
        let mut state = LoopState::default();

        loop {
            tokio::select! {
                // Incoming messages from the node
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &correlation, &mut state);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by node");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from Rust API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::Subscribe { request, sink, response_tx }) => {
                            let request_id = request.id;
                            state.pending_subscriptions.insert(request_id, sink);
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::Unsubscribe { subscription, request }) => {
                            state.subscriptions.remove(&subscription);
                            state.detached.insert(request.id);
                            if let Ok(json) = to_string(&request)
                                && let Err(e) = ws_write.send(Message::Text(json.into())).await
                            {
                                warn!(error = %e, %subscription, "Failed to send unsubscribe");
                            }
                        }

                        Some(ConnectionCommand::RemoveCorrelation(request_id)) => {
                            correlation.lock().remove(&request_id);
                            state.pending_subscriptions.remove(&request_id);
                            debug!(%request_id, "Removed timed-out correlation");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        live.store(false, Ordering::SeqCst);

        // Fail all pending requests; dropping the sinks ends subscriptions
        Self::fail_pending_requests(&correlation);

        debug!(
            subscriptions = state.subscriptions.len(),
            "Event loop terminated"
        );
    }

    /// Handles an incoming text message from the node.
    fn handle_incoming_message(
        text: &str,
        correlation: &Arc<Mutex<CorrelationMap>>,
        state: &mut LoopState,
    ) {
        // Try to parse as Response first
        if let Ok(response) = from_str::<Response>(text) {
            if let Some(sink) = state.pending_subscriptions.remove(&response.id)
                && let Some(id) = response
                    .result
                    .clone()
                    .and_then(|v| from_value::<SubscriptionId>(v).ok())
            {
                state.subscriptions.insert(id, sink);
            }

            let tx = correlation.lock().remove(&response.id);

            if let Some(tx) = tx {
                let _ = tx.send(Ok(response));
            } else if !state.detached.remove(&response.id) {
                warn!(id = %response.id, "Response for unknown request");
            }

            return;
        }

        // Try to parse as subscription Notification
        if let Ok(notification) = from_str::<Notification>(text) {
            let subscription = notification.params.subscription;
            let delivered = state
                .subscriptions
                .get(&subscription)
                .map(|sink| sink.send(notification.params.result).is_ok());

            match delivered {
                Some(true) => trace!(%subscription, "Notification delivered"),
                Some(false) => {
                    state.subscriptions.remove(&subscription);
                    debug!(%subscription, "Subscriber gone, dropping subscription");
                }
                None => {
                    trace!(%subscription, method = %notification.method, "Notification for unknown subscription");
                }
            }
            return;
        }

        warn!(text = %text, "Failed to parse incoming message");
    }

    /// Handles a send command from the Rust API.
    async fn handle_send_command(
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
        ws_write: &mut SplitSink<WsStream, Message>,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let request_id = request.id;

        // Serialize request
        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Store correlation before sending
        correlation.lock().insert(request_id, response_tx);

        // Send over WebSocket
        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
            if let Some(tx) = correlation.lock().remove(&request_id) {
                let _ = tx.send(Err(Error::connection(e.to_string())));
            }
        }

        trace!(%request_id, method = %request.method, "Request sent");
    }

    /// Fails all pending requests with ConnectionClosed error.
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("live", &self.is_live())
            .field("pending", &self.pending_count())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Transport
// ============================================================================

#[async_trait]
impl Transport for Connection {
    async fn wait_ready(&self) -> Result<()> {
        self.handshake().await.map(|_| ())
    }

    async fn request(&self, method: Method) -> Result<Value> {
        self.call(&method).await
    }

    async fn subscribe(&self, method: SubscriptionMethod) -> Result<Subscription> {
        Connection::subscribe(self, method).await
    }

    fn is_live(&self) -> bool {
        Connection::is_live(self)
    }

    fn disconnect(&self) {
        self.shutdown();
    }
}

// ============================================================================
// Tests
// ============================================================================
