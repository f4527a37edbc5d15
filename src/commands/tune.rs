use crate::codec::{self, CodecError, Command};
use crate::commands::OpCode;
use bytes::{Buf, BytesMut};

/// Connection-level maxima exchange.
///
/// The broker opens the negotiation by pushing a `Tune` with its maxima and
/// the client answers on the same key with the intersection. A value of 0
/// means unlimited (`frame_max`) or disabled (`heartbeat`). Neither
/// direction carries a correlation id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tune {
    /// Largest frame either peer may send, in bytes. 0 = unlimited.
    pub frame_max: u32,
    /// Heartbeat interval in seconds. 0 = disabled.
    pub heartbeat: u32,
}

impl Tune {
    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        Ok(Tune {
            frame_max: codec::read_u32(buf)?,
            heartbeat: codec::read_u32(buf)?,
        })
    }
}

impl Command for Tune {
    fn key(&self) -> u16 {
        OpCode::Tune as u16
    }

    fn body_size(&self) -> usize {
        4 + 4
    }

    fn write_body(&self, buf: &mut BytesMut) -> Result<usize, CodecError> {
        let mut written = codec::write_u32(buf, self.frame_max);
        written += codec::write_u32(buf, self.heartbeat);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::encode_command;

    #[test]
    fn tune_wire_bytes() {
        let tune = Tune {
            frame_max: 1_048_576,
            heartbeat: 60,
        };

        let mut buf = BytesMut::new();
        encode_command(&mut buf, &tune).unwrap();

        assert_eq!(
            buf.as_ref(),
            &[
                0x00, 0x00, 0x00, 0x0C, // length
                0x00, 0x14, // key
                0x00, 0x01, // version
                0x00, 0x10, 0x00, 0x00, // frame_max = 1 MiB
                0x00, 0x00, 0x00, 0x3C, // heartbeat = 60s
            ]
        );
    }

    #[test]
    fn tune_roundtrip() {
        let tune = Tune {
            frame_max: 131_072,
            heartbeat: 30,
        };

        let mut buf = BytesMut::new();
        tune.write_body(&mut buf).unwrap();

        let mut cursor = std::io::Cursor::new(buf.as_ref());
        assert_eq!(Tune::decode(&mut cursor).unwrap(), tune);
    }
}
