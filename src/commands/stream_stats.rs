// ABOUTME: Implements stream_stats returning broker-side counters for one stream
// ABOUTME: The response body is an i32-counted list of string keys and i64 values

use crate::codec::{self, CodecError, Command};
use crate::commands::response_code::{read_response_code, ResponseCode};
use crate::commands::OpCode;
use bytes::{Buf, BytesMut};
use std::collections::HashMap;

/// Ask the broker for the statistics of `stream` (first and committed
/// chunk ids, committed offset, and whatever else the broker exposes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamStats {
    pub correlation_id: u32,
    pub stream: String,
}

impl Command for StreamStats {
    fn key(&self) -> u16 {
        OpCode::StreamStats as u16
    }

    fn correlation_id(&self) -> Option<u32> {
        Some(self.correlation_id)
    }

    fn body_size(&self) -> usize {
        codec::size_of_string(Some(&self.stream))
    }

    fn write_body(&self, buf: &mut BytesMut) -> Result<usize, CodecError> {
        codec::write_string(buf, Some(&self.stream))
    }
}

/// Reply to [`StreamStats`]: named i64 counters keyed by broker-defined
/// stat names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamStatsResponse {
    pub correlation_id: u32,
    pub response_code: ResponseCode,
    pub stats: HashMap<String, i64>,
}

impl StreamStatsResponse {
    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        let correlation_id = codec::read_u32(buf)?;
        let response_code = read_response_code(buf)?;
        let count = codec::read_i32(buf)?.max(0) as usize;
        let mut stats = HashMap::with_capacity(count);
        for _ in 0..count {
            // A null stat name would be a broker bug; treat it as empty
            let key = codec::read_string(buf)?.unwrap_or_default();
            let value = codec::read_i64(buf)?;
            stats.insert(key, value);
        }
        Ok(StreamStatsResponse {
            correlation_id,
            response_code,
            stats,
        })
    }
}
