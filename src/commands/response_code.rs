// ABOUTME: Defines the response codes returned in correlated broker replies
// ABOUTME: Implements code validation and success/failure categorization

use crate::codec::{self, CodecError};
use bytes::Buf;
use num_enum::TryFromPrimitive;

/// Response codes of the RabbitMQ Stream protocol.
///
/// Every correlated response carries one of these in a 2-octet field right
/// after the correlation id. Code 1 means success; everything else is a
/// failure whose meaning depends on the command that was answered.
#[derive(TryFromPrimitive)]
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// Operation completed successfully
    Ok = 0x01,
    /// The named stream is not defined on this broker
    StreamDoesNotExist = 0x02,
    /// The subscription id is already in use on this connection
    SubscriptionIdAlreadyExists = 0x03,
    /// The subscription id is not known on this connection
    SubscriptionIdDoesNotExist = 0x04,
    /// A stream with this name already exists
    StreamAlreadyExists = 0x05,
    /// The stream exists but has no elected leader
    StreamNotAvailable = 0x06,
    /// The requested SASL mechanism is not offered by the broker
    SaslMechanismNotSupported = 0x07,
    /// Credentials were rejected
    AuthenticationFailure = 0x08,
    /// SASL exchange failed for a non-credential reason
    SaslError = 0x09,
    /// The broker expects a further SASL round trip
    SaslChallenge = 0x0A,
    /// Loopback-user authentication attempted from a remote host
    SaslAuthenticationFailureLoopback = 0x0B,
    /// The user cannot access the requested virtual host
    VirtualHostAccessFailure = 0x0C,
    /// The broker did not recognize the frame it received
    UnknownFrame = 0x0D,
    /// A frame exceeded the negotiated frame_max
    FrameTooLarge = 0x0E,
    /// Unspecified broker-side failure
    InternalError = 0x0F,
    /// The user lacks permission for the operation
    AccessRefused = 0x10,
    /// A precondition of the operation did not hold
    PreconditionFailed = 0x11,
    /// The publisher id is not known on this connection
    PublisherDoesNotExist = 0x12,
    /// No offset is stored for the consumer reference
    NoOffset = 0x13,
}

impl ResponseCode {
    pub fn is_ok(self) -> bool {
        self == ResponseCode::Ok
    }
}

/// Read and validate a response code field.
pub(crate) fn read_response_code(buf: &mut impl Buf) -> Result<ResponseCode, CodecError> {
    let raw = codec::read_u16(buf)?;
    ResponseCode::try_from(raw).map_err(|_| CodecError::InvalidValue {
        field: "response_code",
        value: u32::from(raw),
    })
}
