use crate::codec::{self, CodecError, Command};
use crate::commands::response_code::{read_response_code, ResponseCode};
use crate::commands::OpCode;
use bytes::{Buf, BytesMut};

/// Grant the broker `credit` more chunks for `subscription_id`.
///
/// Fire-and-forget: the broker only answers with a [`CreditResponse`] push
/// when the subscription id is unknown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Credit {
    pub subscription_id: u8,
    pub credit: u16,
}

impl Command for Credit {
    fn key(&self) -> u16 {
        OpCode::Credit as u16
    }

    fn body_size(&self) -> usize {
        1 + 2
    }

    fn write_body(&self, buf: &mut BytesMut) -> Result<usize, CodecError> {
        let mut written = codec::write_u8(buf, self.subscription_id);
        written += codec::write_u16(buf, self.credit);
        Ok(written)
    }
}

/// Error push answering a bad [`Credit`] command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreditResponse {
    pub response_code: ResponseCode,
    pub subscription_id: u8,
}

impl CreditResponse {
    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        Ok(CreditResponse {
            response_code: read_response_code(buf)?,
            subscription_id: codec::read_u8(buf)?,
        })
    }
}
