//! Length-prefix framing: every frame on the wire is a 4-octet big-endian
//! byte count followed by that many payload bytes. Utilities here turn
//! commands into framed bytes and carve framed payloads back out of an
//! accumulating read buffer.

use crate::codec::{CodecError, Command};
use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    /// Inbound frame larger than the negotiated maximum. Fatal: the stream
    /// position can no longer be trusted.
    #[error("inbound frame of {size} bytes exceeds frame_max {max}")]
    TooLarge { size: u32, max: u32 },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Encode `command` as one complete frame: `u32` length prefix, key,
/// version, correlation id when the command carries one, then the body.
///
/// Returns the total number of bytes appended (prefix included). The
/// payload byte count is checked against `size_needed`; a mismatch means a
/// command's `body_size` disagrees with its `write_body` and is reported as
/// [`CodecError::SizeMismatch`].
pub fn encode_command<C: Command + ?Sized>(
    buf: &mut BytesMut,
    command: &C,
) -> Result<usize, FrameError> {
    let payload = command.size_needed();
    buf.reserve(4 + payload);
    buf.extend_from_slice(&(payload as u32).to_be_bytes());

    let start = buf.len();
    buf.extend_from_slice(&command.key().to_be_bytes());
    buf.extend_from_slice(&command.version().to_be_bytes());
    if let Some(correlation_id) = command.correlation_id() {
        buf.extend_from_slice(&correlation_id.to_be_bytes());
    }
    command.write_body(buf)?;

    let written = buf.len() - start;
    if written != payload {
        return Err(CodecError::SizeMismatch {
            declared: payload,
            written,
        }
        .into());
    }
    Ok(4 + written)
}

/// Try to extract one frame payload from `buf`.
///
/// Returns `Ok(None)` when the buffer does not yet hold a complete frame;
/// the partial bytes stay in place for the next attempt. On success the
/// length prefix and payload are consumed and the payload is returned as a
/// ref-counted slice of the buffer — its storage is reclaimed once the
/// caller drops it.
///
/// A zero-length payload yields an empty frame. A `frame_max` of 0 means
/// no limit has been negotiated yet.
pub fn try_read_frame(buf: &mut BytesMut, frame_max: u32) -> Result<Option<Bytes>, FrameError> {
    if buf.len() < 4 {
        return Ok(None);
    }

    let payload = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if frame_max != 0 && payload > frame_max {
        return Err(FrameError::TooLarge {
            size: payload,
            max: frame_max,
        });
    }

    let total = 4 + payload as usize;
    if buf.len() < total {
        return Ok(None);
    }

    buf.advance(4);
    Ok(Some(buf.split_to(payload as usize).freeze()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{DeclarePublisher, Heartbeat, Tune};

    fn encoded(command: &impl Command) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_command(&mut buf, command).unwrap();
        buf.to_vec()
    }

    #[test]
    fn length_prefix_equals_size_needed() {
        let command = DeclarePublisher {
            correlation_id: 42,
            publisher_id: 7,
            publisher_ref: Some("p1".to_string()),
            stream: "s1".to_string(),
        };

        let bytes = encoded(&command);
        let prefix = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(prefix as usize, command.size_needed());
        assert_eq!(bytes.len(), 4 + command.size_needed());
    }

    #[test]
    fn extract_single_frame() {
        let mut buf = BytesMut::new();
        encode_command(&mut buf, &Heartbeat).unwrap();

        let frame = try_read_frame(&mut buf, 0).unwrap().unwrap();
        assert_eq!(frame.as_ref(), &[0x00, 0x17, 0x00, 0x01]);
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_frames_wait_for_more() {
        let mut full = BytesMut::new();
        encode_command(
            &mut full,
            &Tune {
                frame_max: 1024,
                heartbeat: 60,
            },
        )
        .unwrap();
        let full = full.to_vec();

        let mut buf = BytesMut::new();
        for (i, byte) in full.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            let result = try_read_frame(&mut buf, 0).unwrap();
            if i + 1 < full.len() {
                assert!(result.is_none(), "yielded a frame after {} bytes", i + 1);
            } else {
                assert_eq!(result.unwrap().len(), 12);
            }
        }
    }

    #[test]
    fn frame_sequence_is_split_invariant() {
        let mut wire = BytesMut::new();
        encode_command(
            &mut wire,
            &DeclarePublisher {
                correlation_id: 42,
                publisher_id: 7,
                publisher_ref: Some("p1".to_string()),
                stream: "s1".to_string(),
            },
        )
        .unwrap();
        encode_command(&mut wire, &Heartbeat).unwrap();
        encode_command(
            &mut wire,
            &Tune {
                frame_max: 1_048_576,
                heartbeat: 60,
            },
        )
        .unwrap();
        let wire = wire.to_vec();

        // Feed the same byte stream with every chunk size from 1 to the
        // whole buffer; the frame sequence must be identical each time.
        let mut reference: Option<Vec<Bytes>> = None;
        for chunk_size in 1..=wire.len() {
            let mut buf = BytesMut::new();
            let mut frames = Vec::new();
            for chunk in wire.chunks(chunk_size) {
                buf.extend_from_slice(chunk);
                while let Some(frame) = try_read_frame(&mut buf, 0).unwrap() {
                    frames.push(frame);
                }
            }
            assert!(buf.is_empty());
            match &reference {
                None => {
                    assert_eq!(
                        frames.iter().map(Bytes::len).collect::<Vec<_>>(),
                        vec![17, 4, 12]
                    );
                    reference = Some(frames);
                }
                Some(expected) => assert_eq!(&frames, expected),
            }
        }
    }

    #[test]
    fn zero_payload_frame_is_forwarded_empty() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let frame = try_read_frame(&mut buf, 0).unwrap().unwrap();
        assert!(frame.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_frame_is_fatal() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x00, 0x10, 0x00, 0x01]); // 1 MiB + 1

        let err = try_read_frame(&mut buf, 1_048_576).unwrap_err();
        assert!(matches!(
            err,
            FrameError::TooLarge {
                size: 1_048_577,
                max: 1_048_576
            }
        ));
    }

    #[test]
    fn frame_max_zero_means_unlimited() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        // Huge length, no limit negotiated: just not enough data yet
        assert!(try_read_frame(&mut buf, 0).unwrap().is_none());
    }
}
