// ABOUTME: Implements the declare_publisher request registering a publisher id on a stream
// ABOUTME: The broker answers with a generic code-only response on key 0x8001

use crate::codec::{self, CodecError, Command};
use crate::commands::OpCode;
use bytes::BytesMut;

/// Register `publisher_id` for publishing to `stream`.
///
/// `publisher_ref` is the optional deduplication reference; publishers
/// declared with a reference can query their last publishing sequence and
/// resume without duplicates. A null reference declares a plain publisher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclarePublisher {
    pub correlation_id: u32,
    pub publisher_id: u8,
    pub publisher_ref: Option<String>,
    pub stream: String,
}

impl Command for DeclarePublisher {
    fn key(&self) -> u16 {
        OpCode::DeclarePublisher as u16
    }

    fn correlation_id(&self) -> Option<u32> {
        Some(self.correlation_id)
    }

    fn body_size(&self) -> usize {
        1 + codec::size_of_string(self.publisher_ref.as_deref())
            + codec::size_of_string(Some(&self.stream))
    }

    fn write_body(&self, buf: &mut BytesMut) -> Result<usize, CodecError> {
        let mut written = codec::write_u8(buf, self.publisher_id);
        written += codec::write_string(buf, self.publisher_ref.as_deref())?;
        written += codec::write_string(buf, Some(&self.stream))?;
        Ok(written)
    }
}
