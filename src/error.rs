// ABOUTME: Connection-level error taxonomy for all client operations
// ABOUTME: Provides structured error reporting with conversion from wire-layer failures

use crate::codec::CodecError;
use crate::commands::ResponseCode;
use crate::framing::FrameError;
use std::io;
use thiserror::Error;

/// Errors surfaced by the connection core.
///
/// Wire-layer failures ([`CodecError`]) convert automatically; socket
/// failures carry the endpoint they occurred against so multi-broker
/// callers can tell connections apart.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation attempted on a connection that is already closed
    #[error("connection closed")]
    ConnectionClosed,

    /// OS-level connect/read/write failure
    #[error("socket error on {endpoint}: {source}")]
    Socket {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// TLS handshake or configuration failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// Inbound frame exceeded the negotiated frame_max; fatal
    #[error("inbound frame of {size} bytes exceeds frame_max {max}")]
    FrameTooLarge { size: u32, max: u32 },

    /// Inbound opcode not in the dispatch table; logged and dropped
    #[error("unknown command key {0:#06x}")]
    UnknownCommand(u16),

    /// Wire bytes inconsistent with the expected layout; fatal
    #[error("decode error: {0}")]
    Decode(#[from] CodecError),

    /// No inbound frame within twice the heartbeat interval; fatal
    #[error("no frame received within twice the heartbeat interval")]
    HeartbeatTimeout,

    /// The dispatcher gave up waiting for a correlated response
    #[error("request {correlation_id} timed out")]
    RequestTimeout { correlation_id: u32 },

    /// A pending waiter was dropped without a response or a close event
    #[error("request cancelled")]
    Cancelled,

    /// The broker answered with a non-Ok response code
    #[error("server returned {0:?}")]
    Protocol(ResponseCode),

    /// The broker answered a request with the wrong response variant
    #[error("unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: String,
    },
}

impl From<FrameError> for Error {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::TooLarge { size, max } => Error::FrameTooLarge { size, max },
            FrameError::Codec(e) => Error::Decode(e),
        }
    }
}

/// A specialized `Result` for connection-core operations.
pub type Result<T> = std::result::Result<T, Error>;
