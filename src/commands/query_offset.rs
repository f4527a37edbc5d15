// ABOUTME: Implements query_offset looking up the stored offset for a consumer reference
// ABOUTME: The response carries a code and the offset value; NoOffset means nothing stored

use crate::codec::{self, CodecError, Command};
use crate::commands::response_code::{read_response_code, ResponseCode};
use crate::commands::OpCode;
use bytes::{Buf, BytesMut};

/// Look up the offset stored for `reference` on `stream`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryOffset {
    pub correlation_id: u32,
    pub reference: String,
    pub stream: String,
}

impl Command for QueryOffset {
    fn key(&self) -> u16 {
        OpCode::QueryOffset as u16
    }

    fn correlation_id(&self) -> Option<u32> {
        Some(self.correlation_id)
    }

    fn body_size(&self) -> usize {
        codec::size_of_string(Some(&self.reference)) + codec::size_of_string(Some(&self.stream))
    }

    fn write_body(&self, buf: &mut BytesMut) -> Result<usize, CodecError> {
        let mut written = codec::write_string(buf, Some(&self.reference))?;
        written += codec::write_string(buf, Some(&self.stream))?;
        Ok(written)
    }
}

/// Reply to [`QueryOffset`]. When the code is [`ResponseCode::NoOffset`] the
/// offset field is meaningless and must be ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryOffsetResponse {
    pub correlation_id: u32,
    pub response_code: ResponseCode,
    pub offset: u64,
}

impl QueryOffsetResponse {
    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        Ok(QueryOffsetResponse {
            correlation_id: codec::read_u32(buf)?,
            response_code: read_response_code(buf)?,
            offset: codec::read_u64(buf)?,
        })
    }
}
