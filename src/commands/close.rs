// ABOUTME: Implements the close exchange used by either peer to shut a connection down
// ABOUTME: Close is a correlated request answered with a code-only response on key 0x8016

use crate::codec::{self, CodecError, Command};
use crate::commands::response_code::{read_response_code, ResponseCode};
use crate::commands::OpCode;
use bytes::{Buf, BytesMut};

/// Graceful shutdown request.
///
/// Both peers may send it: the client before disposing a connection, the
/// broker when it is shutting down or evicting the client. The receiver
/// answers with [`CloseResponse`] on the same correlation id and then stops
/// using the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Close {
    pub correlation_id: u32,
    pub code: ResponseCode,
    pub reason: String,
}

impl Close {
    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        Ok(Close {
            correlation_id: codec::read_u32(buf)?,
            code: read_response_code(buf)?,
            reason: codec::read_string(buf)?.unwrap_or_default(),
        })
    }
}

impl Command for Close {
    fn key(&self) -> u16 {
        OpCode::Close as u16
    }

    fn correlation_id(&self) -> Option<u32> {
        Some(self.correlation_id)
    }

    fn body_size(&self) -> usize {
        2 + codec::size_of_string(Some(&self.reason))
    }

    fn write_body(&self, buf: &mut BytesMut) -> Result<usize, CodecError> {
        let mut written = codec::write_u16(buf, self.code as u16);
        written += codec::write_string(buf, Some(&self.reason))?;
        Ok(written)
    }
}

/// Reply to an inbound [`Close`]; carries the response key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CloseResponse {
    pub correlation_id: u32,
    pub code: ResponseCode,
}

impl Command for CloseResponse {
    fn key(&self) -> u16 {
        OpCode::CloseResponse as u16
    }

    fn correlation_id(&self) -> Option<u32> {
        Some(self.correlation_id)
    }

    fn body_size(&self) -> usize {
        2
    }

    fn write_body(&self, buf: &mut BytesMut) -> Result<usize, CodecError> {
        Ok(codec::write_u16(buf, self.code as u16))
    }
}
