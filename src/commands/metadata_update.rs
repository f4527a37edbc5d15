use crate::codec::{self, CodecError};
use crate::commands::response_code::{read_response_code, ResponseCode};
use bytes::Buf;

/// Topology change notification for one stream.
///
/// The broker pushes this when a stream a client uses becomes unavailable
/// or is deleted; clients re-resolve metadata and reconnect elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub code: ResponseCode,
    pub stream: String,
}

impl MetadataUpdate {
    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        Ok(MetadataUpdate {
            code: read_response_code(buf)?,
            stream: codec::read_string(buf)?.unwrap_or_default(),
        })
    }
}
