use crate::codec::{self, CodecError, Command};
use crate::commands::OpCode;
use bytes::BytesMut;

/// Delete `stream` and everything stored in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteStream {
    pub correlation_id: u32,
    pub stream: String,
}

impl Command for DeleteStream {
    fn key(&self) -> u16 {
        OpCode::DeleteStream as u16
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_layout() {
        let command = DeleteStream {
            correlation_id: 5,
            stream: "gone".to_string(),
        };

        let mut buf = BytesMut::new();
        let written = command.write_body(&mut buf).unwrap();
        assert_eq!(written, command.body_size());
        assert_eq!(buf.as_ref(), &[0x00, 0x04, b'g', b'o', b'n', b'e']);
        assert_eq!(command.size_needed(), 4 + 4 + 6);
    }
}
