// ABOUTME: Correlation-driven dispatcher pairing broker replies with suspended requesters
// ABOUTME: Routes push commands to a handler and services heartbeat and tune internally

use crate::codec::Command;
use crate::commands::{
    self, CloseResponse, Heartbeat, Inbound, Push, Response, ResponseCode, Tune,
};
use crate::connection::{BoxFuture, CloseCallback, Connection, FrameCallback};
use crate::error::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Invoked for every broker-initiated command the dispatcher does not
/// service itself (deliveries, publish confirms/errors, metadata updates,
/// credit errors).
pub type PushCallback = Box<dyn Fn(Push) -> BoxFuture + Send + Sync>;

/// Knobs for the request/response layer.
#[derive(Clone, Debug)]
pub struct DispatcherOptions {
    /// Largest frame this client is willing to accept; offered during tune
    /// negotiation. 0 = unlimited.
    pub frame_max: u32,
    /// Desired heartbeat interval; the negotiated value may be shorter.
    pub heartbeat: Duration,
    /// How long `request` waits for a correlated response.
    pub request_timeout: Duration,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        DispatcherOptions {
            frame_max: 1024 * 1024,
            heartbeat: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Routes decoded inbound frames to pending waiters or the push handler.
///
/// The dispatcher registers itself as the connection's frame callback and
/// holds only a weak handle back to the connection, so dropping the
/// connection tears everything down without a reference cycle.
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Clone for Dispatcher {
    fn clone(&self) -> Self {
        Dispatcher {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner {
    /// Correlation table. Exclusive insert: a duplicate id is a programming
    /// error on the client side, since ids come from `next_correlation`.
    pending: Mutex<HashMap<u32, oneshot::Sender<Response>>>,
    next_correlation: AtomicU32,
    connection: OnceLock<Weak<Connection>>,
    push_handler: PushCallback,
    last_frame: Mutex<Instant>,
    /// Current heartbeat interval in milliseconds; 0 disables the timer.
    heartbeat_millis: AtomicU64,
    client_frame_max: u32,
    client_heartbeat_secs: u32,
    negotiated: Mutex<Option<Tune>>,
    request_timeout: Duration,
}

impl Dispatcher {
    pub fn new(options: DispatcherOptions, push_handler: PushCallback) -> Self {
        Dispatcher {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                next_correlation: AtomicU32::new(0),
                connection: OnceLock::new(),
                push_handler,
                last_frame: Mutex::new(Instant::now()),
                heartbeat_millis: AtomicU64::new(options.heartbeat.as_millis() as u64),
                client_frame_max: options.frame_max,
                client_heartbeat_secs: options.heartbeat.as_secs().min(u64::from(u32::MAX))
                    as u32,
                negotiated: Mutex::new(None),
                request_timeout: options.request_timeout,
            }),
        }
    }

    /// The callback to hand to [`Connection::create`] as `on_frame`.
    pub fn frame_callback(&self) -> FrameCallback {
        let inner = Arc::clone(&self.inner);
        Box::new(move |frame| {
            let inner = Arc::clone(&inner);
            Box::pin(async move { inner.handle_frame(frame).await })
        })
    }

    /// The callback to hand to [`Connection::create`] as `on_closed`.
    /// Fails every pending waiter so suspended requesters wake up.
    pub fn close_callback(&self) -> CloseCallback {
        let inner = Arc::clone(&self.inner);
        Box::new(move |reason| {
            Box::pin(async move {
                info!(%reason, "connection closed");
                inner.fail_pending().await;
            })
        })
    }

    /// Wire the dispatcher to its connection and start the heartbeat timer.
    pub fn attach(&self, connection: &Arc<Connection>) {
        if self.inner.connection.set(Arc::downgrade(connection)).is_err() {
            warn!("dispatcher already attached to a connection");
            return;
        }
        spawn_heartbeat_timer(&self.inner, connection);
    }

    /// Send a correlated request and suspend until its response arrives.
    ///
    /// The builder receives the freshly allocated correlation id. The waiter
    /// is removed again on fulfilment, timeout, write failure, or
    /// connection close.
    pub async fn request<C, F>(&self, build: F) -> Result<Response>
    where
        C: Command,
        F: FnOnce(u32) -> C,
    {
        let connection = self.inner.connection().ok_or(Error::ConnectionClosed)?;
        let correlation_id = self.inner.next_correlation.fetch_add(1, Ordering::Relaxed) + 1;
        let (waiter, response) = oneshot::channel();
        self.inner.register(correlation_id, waiter).await;

        let command = build(correlation_id);
        if let Err(e) = connection.write(&command).await {
            self.inner.remove_waiter(correlation_id).await;
            return Err(e);
        }

        match tokio::time::timeout(self.inner.request_timeout, response).await {
            Ok(Ok(response)) => Ok(response),
            // The sender vanished: either the close path drained the table
            // or the waiter was discarded some other way
            Ok(Err(_)) => {
                if connection.is_closed() {
                    Err(Error::ConnectionClosed)
                } else {
                    Err(Error::Cancelled)
                }
            }
            Err(_) => {
                self.inner.remove_waiter(correlation_id).await;
                Err(Error::RequestTimeout { correlation_id })
            }
        }
    }

    /// Fire-and-forget write for uncorrelated commands (credit,
    /// store_offset, heartbeat).
    pub async fn send<C: Command>(&self, command: &C) -> Result<()> {
        let connection = self.inner.connection().ok_or(Error::ConnectionClosed)?;
        connection.write(command).await
    }

    /// Values fixed by tune negotiation, once it has happened.
    pub async fn negotiated_tune(&self) -> Option<Tune> {
        *self.inner.negotiated.lock().await
    }
}

impl Inner {
    fn connection(&self) -> Option<Arc<Connection>> {
        self.connection.get().and_then(Weak::upgrade)
    }

    async fn register(&self, correlation_id: u32, waiter: oneshot::Sender<Response>) {
        let previous = self.pending.lock().await.insert(correlation_id, waiter);
        debug_assert!(
            previous.is_none(),
            "correlation id {correlation_id} already registered"
        );
        if previous.is_some() {
            error!(correlation_id, "duplicate correlation id registration");
        }
    }

    async fn remove_waiter(&self, correlation_id: u32) {
        self.pending.lock().await.remove(&correlation_id);
    }

    async fn fail_pending(&self) {
        let waiters = std::mem::take(&mut *self.pending.lock().await);
        if !waiters.is_empty() {
            debug!(
                count = waiters.len(),
                "dropping pending waiters for closed connection"
            );
        }
        // Dropping the senders wakes every suspended requester
    }

    async fn handle_frame(self: Arc<Self>, frame: Bytes) {
        *self.last_frame.lock().await = Instant::now();

        match commands::parse_inbound(frame) {
            Ok(Inbound::Response(response)) => {
                let correlation_id = response.correlation_id();
                match self.pending.lock().await.remove(&correlation_id) {
                    Some(waiter) => {
                        if waiter.send(response).is_err() {
                            debug!(correlation_id, "requester gave up before the response");
                        }
                    }
                    None => {
                        warn!(correlation_id, "no waiter for correlated response, dropping");
                    }
                }
            }
            Ok(Inbound::Push(push)) => self.handle_push(push).await,
            Err(Error::UnknownCommand(key)) => {
                warn!(key, "unknown inbound command, dropping frame");
            }
            Err(e) => {
                error!(error = %e, "failed to decode inbound frame, closing connection");
                self.close_connection("protocol decode failure");
            }
        }
    }

    async fn handle_push(&self, push: Push) {
        match push {
            Push::Heartbeat => debug!("heartbeat received"),
            Push::Tune(offer) => self.negotiate_tune(offer).await,
            Push::Close(close) => {
                info!(code = ?close.code, reason = %close.reason, "broker requested close");
                if let Some(connection) = self.connection() {
                    let response = CloseResponse {
                        correlation_id: close.correlation_id,
                        code: ResponseCode::Ok,
                    };
                    if let Err(e) = connection.write(&response).await {
                        debug!(error = %e, "could not answer close request");
                    }
                }
                self.close_connection("Close requested by server");
            }
            other => (self.push_handler)(other).await,
        }
    }

    /// Tear the connection down from frame-handling context.
    ///
    /// `handle_frame` runs on the frame-reader task, and `Connection::close`
    /// joins that task, so the teardown has to happen from a task of its
    /// own.
    fn close_connection(&self, reason: &'static str) {
        if let Some(connection) = self.connection() {
            tokio::spawn(async move { connection.close(reason).await });
        }
    }

    /// Intersect the broker's offer with the client's maxima and lock the
    /// result for the rest of the connection.
    async fn negotiate_tune(&self, offer: Tune) {
        let settled = Tune {
            frame_max: intersect(self.client_frame_max, offer.frame_max),
            heartbeat: intersect(self.client_heartbeat_secs, offer.heartbeat),
        };

        self.heartbeat_millis
            .store(u64::from(settled.heartbeat) * 1000, Ordering::Relaxed);
        if let Some(connection) = self.connection() {
            connection.set_frame_max(settled.frame_max);
            if let Err(e) = connection.write(&settled).await {
                warn!(error = %e, "could not answer tune");
            }
        }
        *self.negotiated.lock().await = Some(settled);
        debug!(
            frame_max = settled.frame_max,
            heartbeat = settled.heartbeat,
            "tune settled"
        );
    }
}

/// Minimum where 0 means unlimited (frame_max) or disabled (heartbeat).
fn intersect(ours: u32, theirs: u32) -> u32 {
    match (ours, theirs) {
        (0, theirs) => theirs,
        (ours, 0) => ours,
        (ours, theirs) => ours.min(theirs),
    }
}

/// Periodic heartbeat sender and liveness watchdog.
///
/// Holds only weak handles: the timer dies with the dispatcher or the
/// connection, whichever goes first.
fn spawn_heartbeat_timer(inner: &Arc<Inner>, connection: &Arc<Connection>) {
    let inner = Arc::downgrade(inner);
    let connection = Arc::downgrade(connection);
    tokio::spawn(async move {
        loop {
            let Some(state) = inner.upgrade() else { break };
            let interval = state.heartbeat_millis.load(Ordering::Relaxed);
            drop(state);
            if interval == 0 {
                // Disabled; a later tune may re-enable it
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
            tokio::time::sleep(Duration::from_millis(interval)).await;

            let Some(state) = inner.upgrade() else { break };
            let Some(connection) = connection.upgrade() else {
                break;
            };
            if connection.is_closed() {
                break;
            }

            let idle = state.last_frame.lock().await.elapsed();
            if idle > Duration::from_millis(interval * 2) {
                error!(
                    idle_ms = idle.as_millis() as u64,
                    "no inbound frame within twice the heartbeat interval, closing connection"
                );
                connection.close("heartbeat timeout").await;
                break;
            }

            if let Err(e) = connection.write(&Heartbeat).await {
                debug!(error = %e, "heartbeat write failed");
                break;
            }
        }
        debug!("heartbeat timer stopped");
    });
}
