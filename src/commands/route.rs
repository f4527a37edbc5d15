// ABOUTME: Implements the route query resolving a routing key against a super stream
// ABOUTME: The response lists the member streams the key routes to

use crate::codec::{self, CodecError, Command};
use crate::commands::response_code::{read_response_code, ResponseCode};
use crate::commands::OpCode;
use bytes::{Buf, BytesMut};

/// Resolve `routing_key` against `super_stream`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryRoute {
    pub correlation_id: u32,
    pub routing_key: String,
    pub super_stream: String,
}

impl Command for QueryRoute {
    fn key(&self) -> u16 {
        OpCode::QueryRoute as u16
    }

    fn correlation_id(&self) -> Option<u32> {
        Some(self.correlation_id)
    }

    fn body_size(&self) -> usize {
        codec::size_of_string(Some(&self.routing_key))
            + codec::size_of_string(Some(&self.super_stream))
    }

    fn write_body(&self, buf: &mut BytesMut) -> Result<usize, CodecError> {
        let mut written = codec::write_string(buf, Some(&self.routing_key))?;
        written += codec::write_string(buf, Some(&self.super_stream))?;
        Ok(written)
    }
}

/// Reply to [`QueryRoute`]: the partition streams the routing key maps to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteResponse {
    pub correlation_id: u32,
    pub response_code: ResponseCode,
    pub streams: Vec<String>,
}

impl RouteResponse {
    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        let correlation_id = codec::read_u32(buf)?;
        let response_code = read_response_code(buf)?;
        let count = codec::read_i32(buf)?.max(0) as usize;
        let mut streams = Vec::with_capacity(count);
        for _ in 0..count {
            streams.push(codec::read_string(buf)?.unwrap_or_default());
        }
        Ok(RouteResponse {
            correlation_id,
            response_code,
            streams,
        })
    }
}
