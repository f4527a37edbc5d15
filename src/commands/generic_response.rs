use crate::codec::{self, CodecError};
use crate::commands::response_code::{read_response_code, ResponseCode};
use bytes::Buf;

/// Code-only correlated response.
///
/// declare_publisher, create, delete, and close replies all share this
/// layout: `u32 correlation_id, u16 response_code`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenericResponse {
    pub correlation_id: u32,
    pub response_code: ResponseCode,
}

impl GenericResponse {
    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        Ok(GenericResponse {
            correlation_id: codec::read_u32(buf)?,
            response_code: read_response_code(buf)?,
        })
    }

    pub fn is_ok(&self) -> bool {
        self.response_code.is_ok()
    }
}
