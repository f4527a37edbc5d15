use crate::codec::{CodecError, Command};
use crate::commands::OpCode;
use bytes::BytesMut;

/// Liveness probe, sent by both peers. Carries no correlation id and no
/// body; the frame is the 4-byte header alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Heartbeat;

impl Command for Heartbeat {
    fn key(&self) -> u16 {
        OpCode::Heartbeat as u16
    }

    fn body_size(&self) -> usize {
        0
    }

    fn write_body(&self, _buf: &mut BytesMut) -> Result<usize, CodecError> {
        Ok(0)
    }
}
