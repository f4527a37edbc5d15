use crate::codec::{self, CodecError, Command};
use crate::commands::OpCode;
use bytes::BytesMut;

/// Persist `offset` for `reference` on `stream`.
///
/// Fire-and-forget: the command carries no correlation id and the broker
/// never answers it. Callers that need confirmation follow up with a
/// `query_offset`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOffset {
    pub reference: String,
    pub stream: String,
    pub offset: u64,
}

impl Command for StoreOffset {
    fn key(&self) -> u16 {
        OpCode::StoreOffset as u16
    }

    fn body_size(&self) -> usize {
        codec::size_of_string(Some(&self.reference))
            + codec::size_of_string(Some(&self.stream))
            + 8
    }

    fn write_body(&self, buf: &mut BytesMut) -> Result<usize, CodecError> {
        let mut written = codec::write_string(buf, Some(&self.reference))?;
        written += codec::write_string(buf, Some(&self.stream))?;
        written += codec::write_u64(buf, self.offset);
        Ok(written)
    }
}
