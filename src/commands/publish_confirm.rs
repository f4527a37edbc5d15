use crate::codec::{self, CodecError};
use bytes::Buf;

/// Publishing ids the broker has safely stored for one publisher.
///
/// Pushed by the broker; never sent by the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishConfirm {
    pub publisher_id: u8,
    pub publishing_ids: Vec<u64>,
}

impl PublishConfirm {
    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        let publisher_id = codec::read_u8(buf)?;
        let count = codec::read_i32(buf)?.max(0) as usize;
        let mut publishing_ids = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            publishing_ids.push(codec::read_u64(buf)?);
        }
        Ok(PublishConfirm {
            publisher_id,
            publishing_ids,
        })
    }
}
