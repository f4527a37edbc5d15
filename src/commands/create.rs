// ABOUTME: Implements the create request provisioning a stream with its retention arguments
// ABOUTME: Arguments are an i32-counted list of key/value string pairs

use crate::codec::{self, CodecError, Command};
use crate::commands::OpCode;
use bytes::BytesMut;

/// Create `stream` with the given arguments.
///
/// Arguments are broker-interpreted retention settings such as
/// `max-length-bytes` or `max-age`; an empty list creates the stream with
/// broker defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateStream {
    pub correlation_id: u32,
    pub stream: String,
    pub arguments: Vec<(String, String)>,
}

impl Command for CreateStream {
    fn key(&self) -> u16 {
        OpCode::CreateStream as u16
    }

    fn correlation_id(&self) -> Option<u32> {
        Some(self.correlation_id)
    }

    fn body_size(&self) -> usize {
        let arguments: usize = self
            .arguments
            .iter()
            .map(|(k, v)| codec::size_of_string(Some(k)) + codec::size_of_string(Some(v)))
            .sum();
        codec::size_of_string(Some(&self.stream)) + 4 + arguments
    }

    fn write_body(&self, buf: &mut BytesMut) -> Result<usize, CodecError> {
        let mut written = codec::write_string(buf, Some(&self.stream))?;
        written += codec::write_i32(buf, self.arguments.len() as i32);
        for (key, value) in &self.arguments {
            written += codec::write_string(buf, Some(key))?;
            written += codec::write_string(buf, Some(value))?;
        }
        Ok(written)
    }
}
