// ABOUTME: Wire-level codec for the RabbitMQ Stream binary protocol
// ABOUTME: Provides big-endian primitive encoding/decoding and the Command capability trait

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Protocol version carried in every frame header.
///
/// Version 1 is the only version this client speaks; the field exists on the
/// wire so that brokers can evolve individual commands independently.
pub const PROTOCOL_VERSION: u16 = 1;

/// Codec errors with enough context to pinpoint the failing field
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unexpected end of input: {needed} more byte(s) required")]
    Underflow { needed: usize },

    #[error("string length {length} exceeds the {remaining} byte(s) remaining")]
    OversizeString { length: usize, remaining: usize },

    #[error("byte array length {length} exceeds the {remaining} byte(s) remaining")]
    OversizeBytes { length: usize, remaining: usize },

    #[error("string of {0} bytes does not fit an i16 length prefix")]
    StringTooLong(usize),

    #[error("command declared {declared} bytes but wrote {written}")]
    SizeMismatch { declared: usize, written: usize },

    #[error("invalid {field} value {value:#x}")]
    InvalidValue { field: &'static str, value: u32 },

    #[error("invalid UTF-8 in string field")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Capability consumed by the frame encoder.
///
/// A command describes its opcode key, protocol version, and optional
/// correlation id, and knows how to emit its body fields. The frame encoder
/// (`framing::encode_command`) owns the header emission, so command types
/// never write their own key/version/correlation — the header layout lives
/// in exactly one place.
///
/// `size_needed` must equal the number of bytes the encoder emits after the
/// outer length prefix; the encoder checks this on every write.
pub trait Command {
    /// Opcode key selecting the command's layout and semantics.
    fn key(&self) -> u16;

    /// Protocol version for this command.
    fn version(&self) -> u16 {
        PROTOCOL_VERSION
    }

    /// Correlation id, for commands that expect a paired response.
    fn correlation_id(&self) -> Option<u32> {
        None
    }

    /// Exact byte length of the body fields (everything after the
    /// key/version/correlation header).
    fn body_size(&self) -> usize;

    /// Emit the body fields in their documented order. Returns the number of
    /// bytes written, which must equal `body_size`.
    fn write_body(&self, buf: &mut BytesMut) -> Result<usize, CodecError>;

    /// Total frame payload: key + version + optional correlation id + body.
    /// Equals the value of the outer `u32` length prefix.
    fn size_needed(&self) -> usize {
        let correlation = if self.correlation_id().is_some() { 4 } else { 0 };
        2 + 2 + correlation + self.body_size()
    }
}

// ── Encoding ────────────────────────────────────────────────────────────────
//
// All writers append to a `BytesMut` and return the number of bytes written
// so command bodies can sum their output and compare it against `body_size`.

pub fn write_u8(buf: &mut BytesMut, value: u8) -> usize {
    buf.put_u8(value);
    1
}

pub fn write_u16(buf: &mut BytesMut, value: u16) -> usize {
    buf.put_u16(value);
    2
}

pub fn write_u32(buf: &mut BytesMut, value: u32) -> usize {
    buf.put_u32(value);
    4
}

pub fn write_u64(buf: &mut BytesMut, value: u64) -> usize {
    buf.put_u64(value);
    8
}

pub fn write_i16(buf: &mut BytesMut, value: i16) -> usize {
    buf.put_i16(value);
    2
}

pub fn write_i32(buf: &mut BytesMut, value: i32) -> usize {
    buf.put_i32(value);
    4
}

pub fn write_i64(buf: &mut BytesMut, value: i64) -> usize {
    buf.put_i64(value);
    8
}

/// Booleans travel as one octet: 0 = false, anything else = true.
pub fn write_bool(buf: &mut BytesMut, value: bool) -> usize {
    buf.put_u8(u8::from(value));
    1
}

/// Size of a string on the wire: 2-byte length prefix plus the UTF-8 bytes.
/// A null string is the prefix alone.
pub fn size_of_string(value: Option<&str>) -> usize {
    2 + value.map_or(0, str::len)
}

/// Write an `i16` length-prefixed UTF-8 string. `None` encodes as length -1.
pub fn write_string(buf: &mut BytesMut, value: Option<&str>) -> Result<usize, CodecError> {
    match value {
        None => {
            buf.put_i16(-1);
            Ok(2)
        }
        Some(s) => {
            let len = s.len();
            if len > i16::MAX as usize {
                return Err(CodecError::StringTooLong(len));
            }
            buf.put_i16(len as i16);
            buf.put_slice(s.as_bytes());
            Ok(2 + len)
        }
    }
}

/// Size of a byte array on the wire: 4-byte length prefix plus the payload.
pub fn size_of_bytes(value: Option<&[u8]>) -> usize {
    4 + value.map_or(0, <[u8]>::len)
}

/// Write an `i32` length-prefixed byte array. `None` encodes as length -1.
pub fn write_bytes(buf: &mut BytesMut, value: Option<&[u8]>) -> usize {
    match value {
        None => {
            buf.put_i32(-1);
            4
        }
        Some(b) => {
            buf.put_i32(b.len() as i32);
            buf.put_slice(b);
            4 + b.len()
        }
    }
}

// ── Decoding ────────────────────────────────────────────────────────────────
//
// Readers are generic over `Buf` so the input may be non-contiguous. Each
// reader advances the buffer past the bytes it consumed.

fn ensure(buf: &impl Buf, needed: usize) -> Result<(), CodecError> {
    if buf.remaining() < needed {
        return Err(CodecError::Underflow {
            needed: needed - buf.remaining(),
        });
    }
    Ok(())
}

pub fn read_u8(buf: &mut impl Buf) -> Result<u8, CodecError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn read_u16(buf: &mut impl Buf) -> Result<u16, CodecError> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

pub fn read_u32(buf: &mut impl Buf) -> Result<u32, CodecError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

pub fn read_u64(buf: &mut impl Buf) -> Result<u64, CodecError> {
    ensure(buf, 8)?;
    Ok(buf.get_u64())
}

pub fn read_i16(buf: &mut impl Buf) -> Result<i16, CodecError> {
    ensure(buf, 2)?;
    Ok(buf.get_i16())
}

pub fn read_i32(buf: &mut impl Buf) -> Result<i32, CodecError> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

pub fn read_i64(buf: &mut impl Buf) -> Result<i64, CodecError> {
    ensure(buf, 8)?;
    Ok(buf.get_i64())
}

pub fn read_bool(buf: &mut impl Buf) -> Result<bool, CodecError> {
    Ok(read_u8(buf)? != 0)
}

/// Read an `i16` length-prefixed string. Length -1 decodes as `None`.
pub fn read_string(buf: &mut impl Buf) -> Result<Option<String>, CodecError> {
    let len = read_i16(buf)?;
    if len < 0 {
        return Ok(None);
    }
    let len = len as usize;
    if buf.remaining() < len {
        return Err(CodecError::OversizeString {
            length: len,
            remaining: buf.remaining(),
        });
    }
    let bytes = buf.copy_to_bytes(len);
    Ok(Some(String::from_utf8(bytes.to_vec())?))
}

/// Read an `i32` length-prefixed byte array. Length -1 decodes as `None`.
pub fn read_bytes(buf: &mut impl Buf) -> Result<Option<Bytes>, CodecError> {
    let len = read_i32(buf)?;
    if len < 0 {
        return Ok(None);
    }
    let len = len as usize;
    if buf.remaining() < len {
        return Err(CodecError::OversizeBytes {
            length: len,
            remaining: buf.remaining(),
        });
    }
    Ok(Some(buf.copy_to_bytes(len)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn integer_roundtrips() {
        let mut buf = BytesMut::new();
        assert_eq!(write_u8(&mut buf, 0x7F), 1);
        assert_eq!(write_u16(&mut buf, 0xBEEF), 2);
        assert_eq!(write_u32(&mut buf, 0xDEAD_BEEF), 4);
        assert_eq!(write_u64(&mut buf, u64::MAX - 1), 8);
        assert_eq!(write_i16(&mut buf, -2), 2);
        assert_eq!(write_i32(&mut buf, i32::MIN), 4);
        assert_eq!(write_i64(&mut buf, -42), 8);

        let mut cursor = Cursor::new(buf.as_ref());
        assert_eq!(read_u8(&mut cursor).unwrap(), 0x7F);
        assert_eq!(read_u16(&mut cursor).unwrap(), 0xBEEF);
        assert_eq!(read_u32(&mut cursor).unwrap(), 0xDEAD_BEEF);
        assert_eq!(read_u64(&mut cursor).unwrap(), u64::MAX - 1);
        assert_eq!(read_i16(&mut cursor).unwrap(), -2);
        assert_eq!(read_i32(&mut cursor).unwrap(), i32::MIN);
        assert_eq!(read_i64(&mut cursor).unwrap(), -42);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn integers_are_big_endian() {
        let mut buf = BytesMut::new();
        write_u16(&mut buf, 0x0102);
        write_u32(&mut buf, 0x01020304);
        assert_eq!(buf.as_ref(), &[0x01, 0x02, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn string_roundtrip() {
        let mut buf = BytesMut::new();
        let written = write_string(&mut buf, Some("stream-1")).unwrap();
        assert_eq!(written, 10);
        assert_eq!(written, size_of_string(Some("stream-1")));
        assert_eq!(&buf[..2], &[0x00, 0x08]);

        let mut cursor = Cursor::new(buf.as_ref());
        assert_eq!(
            read_string(&mut cursor).unwrap().as_deref(),
            Some("stream-1")
        );
    }

    #[test]
    fn null_and_empty_strings_are_distinct() {
        let mut buf = BytesMut::new();
        assert_eq!(write_string(&mut buf, None).unwrap(), 2);
        assert_eq!(write_string(&mut buf, Some("")).unwrap(), 2);
        assert_eq!(buf.as_ref(), &[0xFF, 0xFF, 0x00, 0x00]);

        let mut cursor = Cursor::new(buf.as_ref());
        assert_eq!(read_string(&mut cursor).unwrap(), None);
        assert_eq!(read_string(&mut cursor).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn unicode_string_uses_byte_length() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, Some("café")).unwrap();
        // 'é' is two bytes in UTF-8
        assert_eq!(&buf[..2], &[0x00, 0x05]);

        let mut cursor = Cursor::new(buf.as_ref());
        assert_eq!(read_string(&mut cursor).unwrap().as_deref(), Some("café"));
    }

    #[test]
    fn oversize_string_length_is_rejected() {
        // Length field claims 100 bytes, only 3 present
        let data: &[u8] = &[0x00, 0x64, b'a', b'b', b'c'];
        let mut cursor = Cursor::new(data);
        let err = read_string(&mut cursor).unwrap_err();
        assert!(matches!(
            err,
            CodecError::OversizeString {
                length: 100,
                remaining: 3
            }
        ));
    }

    #[test]
    fn underflow_is_reported() {
        let data: &[u8] = &[0x01, 0x02];
        let mut cursor = Cursor::new(data);
        let err = read_u32(&mut cursor).unwrap_err();
        assert!(matches!(err, CodecError::Underflow { needed: 2 }));
    }

    #[test]
    fn bytes_roundtrip_including_null() {
        let mut buf = BytesMut::new();
        write_bytes(&mut buf, Some(&[1, 2, 3]));
        write_bytes(&mut buf, None);

        let mut cursor = Cursor::new(buf.as_ref());
        assert_eq!(
            read_bytes(&mut cursor).unwrap().as_deref(),
            Some(&[1u8, 2, 3][..])
        );
        assert_eq!(read_bytes(&mut cursor).unwrap(), None);
    }

    #[test]
    fn bool_encoding() {
        let mut buf = BytesMut::new();
        write_bool(&mut buf, true);
        write_bool(&mut buf, false);
        assert_eq!(buf.as_ref(), &[0x01, 0x00]);

        let mut cursor = Cursor::new(buf.as_ref());
        assert!(read_bool(&mut cursor).unwrap());
        assert!(!read_bool(&mut cursor).unwrap());
    }
}
