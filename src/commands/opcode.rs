// ABOUTME: Defines the opcode keys of the RabbitMQ Stream binary protocol
// ABOUTME: Implements key validation and the response-bit convention

use num_enum::TryFromPrimitive;

/// Bit set in the key of response commands.
///
/// A response reuses the key of the request it answers with the high bit
/// set, e.g. `declare_publisher` is 0x0001 and its response is 0x8001.
pub const RESPONSE_KEY_BIT: u16 = 0x8000;

/// Opcode keys of the RabbitMQ Stream protocol.
///
/// The key is a 2-octet field directly after the outer length prefix of
/// every frame and selects the layout and semantics of the remainder.
/// Commands this crate does not exchange (the SASL handshake, publish,
/// subscribe) still appear here so inbound frames carrying them are
/// identified before being dropped.
#[derive(TryFromPrimitive)]
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// declare_publisher request - register a publisher id on a stream
    DeclarePublisher = 0x0001,
    /// declare_publisher response
    DeclarePublisherResponse = 0x8001,
    /// publish - batch of messages from a publisher (producer machinery)
    Publish = 0x0002,
    /// publish_confirm push - publishing ids the broker has safely stored
    PublishConfirm = 0x0003,
    /// publish_error push - publishing ids the broker rejected
    PublishError = 0x0004,
    /// query_publisher_sequence request
    QueryPublisherSequence = 0x0005,
    /// query_publisher_sequence response
    QueryPublisherSequenceResponse = 0x8005,
    /// delete_publisher request
    DeletePublisher = 0x0006,
    /// delete_publisher response
    DeletePublisherResponse = 0x8006,
    /// subscribe request (consumer machinery)
    Subscribe = 0x0007,
    /// subscribe response
    SubscribeResponse = 0x8007,
    /// deliver push - a chunk of messages for a subscription
    Deliver = 0x0008,
    /// credit - grant the broker chunks for a subscription, fire-and-forget
    Credit = 0x0009,
    /// credit response - only sent when the credit request was in error
    CreditResponse = 0x8009,
    /// store_offset - persist a consumer offset, fire-and-forget
    StoreOffset = 0x000A,
    /// query_offset request
    QueryOffset = 0x000B,
    /// query_offset response
    QueryOffsetResponse = 0x800B,
    /// unsubscribe request
    Unsubscribe = 0x000C,
    /// unsubscribe response
    UnsubscribeResponse = 0x800C,
    /// create (stream) request
    CreateStream = 0x000D,
    /// create (stream) response
    CreateStreamResponse = 0x800D,
    /// delete (stream) request
    DeleteStream = 0x000E,
    /// delete (stream) response
    DeleteStreamResponse = 0x800E,
    /// metadata request
    Metadata = 0x000F,
    /// metadata response
    MetadataResponse = 0x800F,
    /// metadata_update push - topology of a stream changed
    MetadataUpdate = 0x0010,
    /// peer_properties request
    PeerProperties = 0x0011,
    /// peer_properties response
    PeerPropertiesResponse = 0x8011,
    /// sasl_handshake request
    SaslHandshake = 0x0012,
    /// sasl_handshake response
    SaslHandshakeResponse = 0x8012,
    /// sasl_authenticate request
    SaslAuthenticate = 0x0013,
    /// sasl_authenticate response
    SaslAuthenticateResponse = 0x8013,
    /// tune - connection-level maxima exchange, same key both directions
    Tune = 0x0014,
    /// open request
    Open = 0x0015,
    /// open response
    OpenResponse = 0x8015,
    /// close - graceful shutdown, sent by either peer
    Close = 0x0016,
    /// close response
    CloseResponse = 0x8016,
    /// heartbeat - liveness probe, same key both directions
    Heartbeat = 0x0017,
    /// route request - resolve a routing key against a super stream
    QueryRoute = 0x0018,
    /// route response
    QueryRouteResponse = 0x8018,
    /// partitions request
    QueryPartitions = 0x0019,
    /// partitions response
    QueryPartitionsResponse = 0x8019,
    /// consumer_update push
    ConsumerUpdate = 0x001A,
    /// exchange_command_versions request
    ExchangeCommandVersions = 0x001B,
    /// exchange_command_versions response
    ExchangeCommandVersionsResponse = 0x801B,
    /// stream_stats request
    StreamStats = 0x001C,
    /// stream_stats response
    StreamStatsResponse = 0x801C,
}

impl OpCode {
    /// Whether this key carries the response bit.
    pub fn is_response(self) -> bool {
        (self as u16) & RESPONSE_KEY_BIT != 0
    }
}
