// ABOUTME: Owns one broker socket: write gate, frame-reader task, and close lifecycle
// ABOUTME: Implements framed I/O with a non-blocking fast path for uncontended writers

use crate::codec::Command;
use crate::error::{Error, Result};
use crate::framing;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Future type produced by connection callbacks.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Invoked once per complete inbound frame with the frame body (the outer
/// length prefix already stripped). The frame buffer is a ref-counted slice
/// of the read buffer; its storage is recycled once the returned future has
/// completed and the slice is dropped, so callbacks must not stash it away.
pub type FrameCallback = Box<dyn Fn(Bytes) -> BoxFuture + Send + Sync>;

/// Invoked exactly once when the connection stops delivering frames, with a
/// human-readable reason.
pub type CloseCallback = Box<dyn FnOnce(String) -> BoxFuture + Send>;

/// How long `close` waits for the frame-reader task to wind down before
/// aborting it.
const SHORT_WAIT: Duration = Duration::from_secs(1);

// Default to a 64KB read buffer. Brokers routinely push chunks larger than
// this, in which case `BytesMut` grows on demand; the capacity only decides
// how often that happens.
const READ_BUFFER_CAPACITY: usize = 64 * 1024;

/// A broker address, kept alongside the socket so errors can say which
/// broker they came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new("localhost", 5552)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// TLS settings for a connection.
///
/// Certificate and verification policy live entirely in the caller-supplied
/// `rustls` client config; this crate only performs the handshake. With the
/// `tls` cargo feature disabled, enabling TLS fails at connect time.
#[derive(Clone, Debug, Default)]
pub struct TlsOptions {
    pub enabled: bool,
    /// Name presented for SNI and certificate validation. Defaults to the
    /// endpoint host.
    pub server_name: Option<String>,
    #[cfg(feature = "tls")]
    pub config: Option<Arc<tokio_rustls::rustls::ClientConfig>>,
}

pub(crate) trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// State shared between the connection handle and its frame-reader task.
struct Shared {
    endpoint: Endpoint,
    is_closed: AtomicBool,
    num_frames: AtomicU64,
    /// Largest accepted inbound payload; 0 until tune negotiation fixes it.
    frame_max: AtomicU32,
    shutdown: Notify,
    on_closed: Mutex<Option<CloseCallback>>,
    close_reason: Mutex<Option<String>>,
}

/// The write half plus its encode scratch buffer, guarded together by the
/// write gate so a frame is always encoded and flushed under one permit.
struct FrameWriter {
    sink: BufWriter<WriteHalf<Box<dyn AsyncStream>>>,
    scratch: BytesMut,
}

/// One TCP (optionally TLS) connection to a stream broker.
///
/// The connection knows nothing about correlation or command semantics; it
/// frames outbound commands, delivers inbound frame bodies to `on_frame` in
/// wire order, and reports the end of its life through `on_closed`. The
/// dispatcher layers request/response pairing on top of those callbacks.
pub struct Connection {
    shared: Arc<Shared>,
    writer: Mutex<FrameWriter>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Open a connection and start its frame-reader task.
    ///
    /// `on_frame` receives every inbound frame body in wire order, one at a
    /// time. `on_closed` fires exactly once, whether the peer disconnects,
    /// an error tears the connection down, or [`Connection::close`] is
    /// called.
    pub async fn create(
        endpoint: Endpoint,
        on_frame: FrameCallback,
        on_closed: CloseCallback,
        tls: &TlsOptions,
    ) -> Result<Arc<Connection>> {
        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|source| Error::Socket {
                endpoint: endpoint.to_string(),
                source,
            })?;
        tcp.set_nodelay(true).map_err(|source| Error::Socket {
            endpoint: endpoint.to_string(),
            source,
        })?;

        let stream: Box<dyn AsyncStream> = if tls.enabled {
            connect_tls(tcp, tls, &endpoint).await?
        } else {
            Box::new(tcp)
        };
        let (read_half, write_half) = tokio::io::split(stream);

        let shared = Arc::new(Shared {
            endpoint,
            is_closed: AtomicBool::new(false),
            num_frames: AtomicU64::new(0),
            frame_max: AtomicU32::new(0),
            shutdown: Notify::new(),
            on_closed: Mutex::new(Some(on_closed)),
            close_reason: Mutex::new(None),
        });

        let reader_task = tokio::spawn(process_incoming_frames(
            Arc::clone(&shared),
            read_half,
            on_frame,
        ));

        Ok(Arc::new(Connection {
            shared,
            writer: Mutex::new(FrameWriter {
                sink: BufWriter::new(write_half),
                scratch: BytesMut::with_capacity(1024),
            }),
            reader_task: Mutex::new(Some(reader_task)),
        }))
    }

    /// Encode `command` and hand it to the transport's flush pipeline.
    ///
    /// Safe to call from any number of tasks; writers are serialized by the
    /// write gate, so complete frames land on the wire in gate-acquisition
    /// order and never interleave. Fails with [`Error::ConnectionClosed`]
    /// once the connection has closed.
    pub async fn write<C: Command>(&self, command: &C) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        // Fast path: take the gate without awaiting when nobody holds it.
        let mut writer = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                let guard = self.writer.lock().await;
                // The connection may have closed while we waited
                if self.is_closed() {
                    return Err(Error::ConnectionClosed);
                }
                guard
            }
        };

        let FrameWriter { sink, scratch } = &mut *writer;
        scratch.clear();
        framing::encode_command(scratch, command).map_err(Error::from)?;
        sink.write_all(scratch)
            .await
            .map_err(|source| self.write_error(source))?;
        sink.flush()
            .await
            .map_err(|source| self.write_error(source))?;
        Ok(())
    }

    /// Tear the connection down. Idempotent.
    ///
    /// Stops the frame-reader task (waiting up to a short bound before
    /// aborting it), shuts the write half down, and guarantees the close
    /// callback has fired by the time this returns.
    pub async fn close(&self, reason: &str) {
        {
            let mut slot = self.shared.close_reason.lock().await;
            if slot.is_none() {
                *slot = Some(reason.to_string());
            }
        }
        if self.shared.is_closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.shutdown.notify_one();

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.sink.shutdown().await {
                debug!(endpoint = %self.shared.endpoint, error = %e, "error shutting down write half");
            }
        }

        let handle = self.reader_task.lock().await.take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(SHORT_WAIT, &mut handle).await.is_err() {
                error!(
                    endpoint = %self.shared.endpoint,
                    "frame reader did not stop within {:?}; aborting it", SHORT_WAIT
                );
                handle.abort();
            }
        }

        // The reader fires the close callback on its way out; cover the
        // abort path where it never got there.
        let reason = self
            .shared
            .close_reason
            .lock()
            .await
            .take()
            .unwrap_or_else(|| "TCP Connection Closed".to_string());
        if let Some(on_closed) = self.shared.on_closed.lock().await.take() {
            on_closed(reason).await;
        }
        debug!(endpoint = %self.shared.endpoint, "connection closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed.load(Ordering::Acquire)
    }

    /// Number of inbound frames delivered so far.
    pub fn frames_received(&self) -> u64 {
        self.shared.num_frames.load(Ordering::Relaxed)
    }

    /// Largest accepted inbound payload. 0 = not negotiated yet.
    pub fn frame_max(&self) -> u32 {
        self.shared.frame_max.load(Ordering::Relaxed)
    }

    /// Lock the inbound frame size limit, normally once tune negotiation
    /// settles.
    pub fn set_frame_max(&self, frame_max: u32) {
        self.shared.frame_max.store(frame_max, Ordering::Relaxed);
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    /// A write that loses the race against `close` may observe the shut
    /// sink as an I/O error; report that as the close it really is.
    fn write_error(&self, source: std::io::Error) -> Error {
        if self.is_closed() {
            Error::ConnectionClosed
        } else {
            Error::Socket {
                endpoint: self.shared.endpoint.to_string(),
                source,
            }
        }
    }
}

#[cfg(feature = "tls")]
async fn connect_tls(
    tcp: TcpStream,
    options: &TlsOptions,
    endpoint: &Endpoint,
) -> Result<Box<dyn AsyncStream>> {
    use tokio_rustls::TlsConnector;
    use tokio_rustls::rustls::pki_types::ServerName;

    let Some(config) = options.config.clone() else {
        return Err(Error::Tls(
            "TLS enabled but no client configuration supplied".to_string(),
        ));
    };
    let name = options
        .server_name
        .clone()
        .unwrap_or_else(|| endpoint.host.clone());
    let server_name = ServerName::try_from(name).map_err(|e| Error::Tls(e.to_string()))?;
    let stream = TlsConnector::from(config)
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::Tls(format!("handshake with {endpoint} failed: {e}")))?;
    Ok(Box::new(stream))
}

#[cfg(not(feature = "tls"))]
async fn connect_tls(
    _tcp: TcpStream,
    _options: &TlsOptions,
    endpoint: &Endpoint,
) -> Result<Box<dyn AsyncStream>> {
    Err(Error::Tls(format!(
        "TLS requested for {endpoint} but the crate was built without the `tls` feature"
    )))
}

/// Body of the frame-reader task.
///
/// Runs until EOF, an error, or shutdown, then performs the close
/// bookkeeping: marks the connection closed and fires the close callback.
async fn process_incoming_frames(
    shared: Arc<Shared>,
    mut reader: ReadHalf<Box<dyn AsyncStream>>,
    on_frame: FrameCallback,
) {
    let mut buffer = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
    let result = read_loop(&shared, &mut reader, &on_frame, &mut buffer).await;

    match &result {
        Ok(()) => debug!(endpoint = %shared.endpoint, "frame reader finished"),
        Err(e) if shared.is_closed.load(Ordering::Acquire) => {
            debug!(endpoint = %shared.endpoint, error = %e, "frame reader stopped during close");
        }
        Err(e) => {
            error!(endpoint = %shared.endpoint, error = %e, "frame reader failed");
        }
    }

    shared.is_closed.store(true, Ordering::Release);
    let reason = shared
        .close_reason
        .lock()
        .await
        .take()
        .unwrap_or_else(|| "TCP Connection Closed".to_string());
    if let Some(on_closed) = shared.on_closed.lock().await.take() {
        on_closed(reason).await;
    }
}

async fn read_loop(
    shared: &Shared,
    reader: &mut ReadHalf<Box<dyn AsyncStream>>,
    on_frame: &FrameCallback,
    buffer: &mut BytesMut,
) -> Result<()> {
    loop {
        if shared.is_closed.load(Ordering::Acquire) {
            return Ok(());
        }

        let read = tokio::select! {
            _ = shared.shutdown.notified() => return Ok(()),
            read = reader.read_buf(buffer) => read,
        };
        let n = read.map_err(|source| Error::Socket {
            endpoint: shared.endpoint.to_string(),
            source,
        })?;
        if n == 0 {
            // EOF: the peer went away
            return Ok(());
        }

        // Drain every complete frame the buffer holds; a partial tail
        // stays buffered for the next read.
        while let Some(frame) =
            framing::try_read_frame(buffer, shared.frame_max.load(Ordering::Relaxed))?
        {
            on_frame(frame).await;
            shared.num_frames.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Heartbeat;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn discard_frames() -> FrameCallback {
        Box::new(|_frame| Box::pin(async {}))
    }

    fn forward_frame_sizes(tx: mpsc::UnboundedSender<usize>) -> FrameCallback {
        Box::new(move |frame| {
            let tx = tx.clone();
            Box::pin(async move {
                tx.send(frame.len()).ok();
            })
        })
    }

    fn count_closes(counter: Arc<AtomicUsize>) -> CloseCallback {
        Box::new(move |_reason| {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    async fn bound_listener() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, Endpoint::new("127.0.0.1", port))
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn frames_arrive_regardless_of_chunking() {
        let (listener, endpoint) = bound_listener().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));

        let connection = Connection::create(
            endpoint,
            forward_frame_sizes(tx),
            count_closes(Arc::clone(&closes)),
            &TlsOptions::default(),
        )
        .await
        .unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        // A declare_publisher, a heartbeat, and a tune concatenated, fed
        // one byte at a time
        let wire: Vec<u8> = [
            &[
                0x00, 0x00, 0x00, 0x11, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x2A, 0x07,
                0x00, 0x02, 0x70, 0x31, 0x00, 0x02, 0x73, 0x31,
            ][..],
            &[0x00, 0x00, 0x00, 0x04, 0x00, 0x17, 0x00, 0x01][..],
            &[
                0x00, 0x00, 0x00, 0x0C, 0x00, 0x14, 0x00, 0x01, 0x00, 0x10, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x3C,
            ][..],
        ]
        .concat();
        for byte in wire {
            server.write_all(&[byte]).await.unwrap();
            server.flush().await.unwrap();
        }

        assert_eq!(rx.recv().await, Some(17));
        assert_eq!(rx.recv().await, Some(4));
        assert_eq!(rx.recv().await, Some(12));

        let conn = Arc::clone(&connection);
        wait_until(move || conn.frames_received() == 3).await;

        connection.close("test done").await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_interleave() {
        let (listener, endpoint) = bound_listener().await;
        let closes = Arc::new(AtomicUsize::new(0));
        let connection = Connection::create(
            endpoint,
            discard_frames(),
            count_closes(Arc::clone(&closes)),
            &TlsOptions::default(),
        )
        .await
        .unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        let mut writers = Vec::new();
        for _ in 0..100 {
            let connection = Arc::clone(&connection);
            writers.push(tokio::spawn(
                async move { connection.write(&Heartbeat).await },
            ));
        }
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let mut wire = vec![0u8; 100 * 8];
        server.read_exact(&mut wire).await.unwrap();
        for frame in wire.chunks(8) {
            assert_eq!(frame, &[0x00, 0x00, 0x00, 0x04, 0x00, 0x17, 0x00, 0x01]);
        }
        assert!(!connection.is_closed());

        connection.close("test done").await;
    }

    #[tokio::test]
    async fn write_after_close_fails() {
        let (listener, endpoint) = bound_listener().await;
        let connection = Connection::create(
            endpoint,
            discard_frames(),
            Box::new(|_| Box::pin(async {})),
            &TlsOptions::default(),
        )
        .await
        .unwrap();
        let _server = listener.accept().await.unwrap();

        connection.close("done").await;
        let result = connection.write(&Heartbeat).await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn close_callback_fires_once_on_peer_disconnect() {
        let (listener, endpoint) = bound_listener().await;
        let closes = Arc::new(AtomicUsize::new(0));
        let connection = Connection::create(
            endpoint,
            discard_frames(),
            count_closes(Arc::clone(&closes)),
            &TlsOptions::default(),
        )
        .await
        .unwrap();
        let (server, _) = listener.accept().await.unwrap();

        drop(server);
        let conn = Arc::clone(&connection);
        wait_until(move || conn.is_closed()).await;
        let counter = Arc::clone(&closes);
        wait_until(move || counter.load(Ordering::SeqCst) == 1).await;

        // A later explicit close must not fire the callback again
        connection.close("already gone").await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_races_with_pending_writes() {
        let (listener, endpoint) = bound_listener().await;
        let closes = Arc::new(AtomicUsize::new(0));
        let connection = Connection::create(
            endpoint,
            discard_frames(),
            count_closes(Arc::clone(&closes)),
            &TlsOptions::default(),
        )
        .await
        .unwrap();
        let _server = listener.accept().await.unwrap();

        let mut writers = Vec::new();
        for _ in 0..50 {
            let connection = Arc::clone(&connection);
            writers.push(tokio::spawn(
                async move { connection.write(&Heartbeat).await },
            ));
        }
        connection.close("racing close").await;

        // Every write either made it out whole or failed cleanly
        for writer in writers {
            match writer.await.unwrap() {
                Ok(()) => {}
                Err(Error::ConnectionClosed) => {}
                Err(other) => panic!("unexpected write error: {other}"),
            }
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn oversized_inbound_frame_closes_the_connection() {
        let (listener, endpoint) = bound_listener().await;
        let closes = Arc::new(AtomicUsize::new(0));
        let connection = Connection::create(
            endpoint,
            discard_frames(),
            count_closes(Arc::clone(&closes)),
            &TlsOptions::default(),
        )
        .await
        .unwrap();
        connection.set_frame_max(16);
        let (mut server, _) = listener.accept().await.unwrap();

        // Length prefix claims 1000 bytes, well past frame_max
        server.write_all(&[0x00, 0x00, 0x03, 0xE8]).await.unwrap();
        server.flush().await.unwrap();

        let conn = Arc::clone(&connection);
        wait_until(move || conn.is_closed()).await;
        let counter = Arc::clone(&closes);
        wait_until(move || counter.load(Ordering::SeqCst) == 1).await;
    }

    #[tokio::test]
    async fn connect_failure_names_the_endpoint() {
        // Port 1 is essentially never listening
        let endpoint = Endpoint::new("127.0.0.1", 1);
        let result = Connection::create(
            endpoint,
            discard_frames(),
            Box::new(|_| Box::pin(async {})),
            &TlsOptions::default(),
        )
        .await;

        let err = result.err().expect("connecting to a dead port must fail");
        match err {
            Error::Socket { endpoint, .. } => assert_eq!(endpoint, "127.0.0.1:1"),
            other => panic!("expected a socket error, got {other}"),
        }
    }
}
