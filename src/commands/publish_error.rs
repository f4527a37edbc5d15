use crate::codec::{self, CodecError};
use crate::commands::response_code::{read_response_code, ResponseCode};
use bytes::Buf;

/// One rejected publishing id and the reason it was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishingError {
    pub publishing_id: u64,
    pub code: ResponseCode,
}

/// Publishing ids the broker rejected for one publisher.
///
/// Pushed by the broker; never sent by the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishError {
    pub publisher_id: u8,
    pub errors: Vec<PublishingError>,
}

impl PublishError {
    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        let publisher_id = codec::read_u8(buf)?;
        let count = codec::read_i32(buf)?.max(0) as usize;
        let mut errors = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            errors.push(PublishingError {
                publishing_id: codec::read_u64(buf)?,
                code: read_response_code(buf)?,
            });
        }
        Ok(PublishError {
            publisher_id,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_publish_error() {
        let data: &[u8] = &[
            0x01, // publisher id
            0x00, 0x00, 0x00, 0x01, // 1 error
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09, // publishing id 9
            0x00, 0x12, // PublisherDoesNotExist
        ];
        let mut cursor = std::io::Cursor::new(data);

        let error = PublishError::decode(&mut cursor).unwrap();
        assert_eq!(error.publisher_id, 1);
        assert_eq!(error.errors.len(), 1);
        assert_eq!(error.errors[0].publishing_id, 9);
        assert_eq!(error.errors[0].code, ResponseCode::PublisherDoesNotExist);
    }
}
