use crate::codec::{self, CodecError};
use bytes::{Buf, Bytes};

/// A chunk of messages for one subscription.
///
/// The chunk payload (osiris chunk header, entries, checksum) is opaque to
/// the connection core and handed to consumer machinery untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deliver {
    pub subscription_id: u8,
    pub chunk: Bytes,
}

impl Deliver {
    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        let subscription_id = codec::read_u8(buf)?;
        let chunk = buf.copy_to_bytes(buf.remaining());
        Ok(Deliver {
            subscription_id,
            chunk,
        })
    }
}
