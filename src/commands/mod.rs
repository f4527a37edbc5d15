// ABOUTME: Typed command family of the RabbitMQ Stream protocol, one file per command
// ABOUTME: Provides the single inbound decode entry point used by the dispatcher

use crate::codec;
use crate::error::Error;
use bytes::Bytes;

mod close;
mod create;
mod credit;
mod declare_publisher;
mod delete;
mod deliver;
mod generic_response;
mod heartbeat;
mod metadata_update;
mod opcode;
mod publish_confirm;
mod publish_error;
mod query_offset;
mod response_code;
mod route;
mod store_offset;
mod stream_stats;
mod tune;

pub use close::{Close, CloseResponse};
pub use create::CreateStream;
pub use credit::{Credit, CreditResponse};
pub use declare_publisher::DeclarePublisher;
pub use delete::DeleteStream;
pub use deliver::Deliver;
pub use generic_response::GenericResponse;
pub use heartbeat::Heartbeat;
pub use metadata_update::MetadataUpdate;
pub use opcode::{OpCode, RESPONSE_KEY_BIT};
pub use publish_confirm::PublishConfirm;
pub use publish_error::{PublishError, PublishingError};
pub use query_offset::{QueryOffset, QueryOffsetResponse};
pub use response_code::ResponseCode;
pub use route::{QueryRoute, RouteResponse};
pub use store_offset::StoreOffset;
pub use stream_stats::{StreamStats, StreamStatsResponse};
pub use tune::Tune;

/// A correlated broker reply, routed to the waiter registered under its
/// correlation id.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Generic(GenericResponse),
    QueryOffset(QueryOffsetResponse),
    Route(RouteResponse),
    StreamStats(StreamStatsResponse),
}

impl Response {
    pub fn correlation_id(&self) -> u32 {
        match self {
            Response::Generic(r) => r.correlation_id,
            Response::QueryOffset(r) => r.correlation_id,
            Response::Route(r) => r.correlation_id,
            Response::StreamStats(r) => r.correlation_id,
        }
    }

    pub fn response_code(&self) -> ResponseCode {
        match self {
            Response::Generic(r) => r.response_code,
            Response::QueryOffset(r) => r.response_code,
            Response::Route(r) => r.response_code,
            Response::StreamStats(r) => r.response_code,
        }
    }
}

/// A broker-initiated command, not solicited by any correlated request.
#[derive(Clone, Debug, PartialEq)]
pub enum Push {
    Heartbeat,
    Tune(Tune),
    Close(Close),
    MetadataUpdate(MetadataUpdate),
    Credit(CreditResponse),
    PublishConfirm(PublishConfirm),
    PublishError(PublishError),
    Deliver(Deliver),
}

/// One decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Response(Response),
    Push(Push),
}

/// Decode one inbound frame body (the bytes after the outer length prefix).
///
/// Unknown or unexpected keys surface as [`Error::UnknownCommand`], which
/// the dispatcher treats as log-and-drop; malformed bodies surface as
/// [`Error::Decode`], which is fatal for the connection.
pub fn parse_inbound(mut frame: Bytes) -> Result<Inbound, Error> {
    let key = codec::read_u16(&mut frame)?;
    let _version = codec::read_u16(&mut frame)?;

    let Ok(op) = OpCode::try_from(key) else {
        return Err(Error::UnknownCommand(key));
    };

    let inbound = match op {
        OpCode::DeclarePublisherResponse
        | OpCode::CreateStreamResponse
        | OpCode::DeleteStreamResponse
        | OpCode::CloseResponse => Inbound::Response(Response::Generic(
            GenericResponse::decode(&mut frame)?,
        )),
        OpCode::QueryOffsetResponse => Inbound::Response(Response::QueryOffset(
            QueryOffsetResponse::decode(&mut frame)?,
        )),
        OpCode::QueryRouteResponse => {
            Inbound::Response(Response::Route(RouteResponse::decode(&mut frame)?))
        }
        OpCode::StreamStatsResponse => Inbound::Response(Response::StreamStats(
            StreamStatsResponse::decode(&mut frame)?,
        )),
        OpCode::Heartbeat => Inbound::Push(Push::Heartbeat),
        OpCode::Tune => Inbound::Push(Push::Tune(Tune::decode(&mut frame)?)),
        OpCode::Close => Inbound::Push(Push::Close(Close::decode(&mut frame)?)),
        OpCode::MetadataUpdate => Inbound::Push(Push::MetadataUpdate(MetadataUpdate::decode(
            &mut frame,
        )?)),
        OpCode::CreditResponse => {
            Inbound::Push(Push::Credit(CreditResponse::decode(&mut frame)?))
        }
        OpCode::PublishConfirm => Inbound::Push(Push::PublishConfirm(PublishConfirm::decode(
            &mut frame,
        )?)),
        OpCode::PublishError => {
            Inbound::Push(Push::PublishError(PublishError::decode(&mut frame)?))
        }
        OpCode::Deliver => Inbound::Push(Push::Deliver(Deliver::decode(&mut frame)?)),
        // Valid protocol keys this core neither sends nor services
        _ => return Err(Error::UnknownCommand(key)),
    };

    Ok(inbound)
}
