// ABOUTME: Typed client facade over the connection core and dispatcher
// ABOUTME: Maps broker response codes onto errors and owns the connect/close lifecycle

use crate::commands::{
    Close, CreateStream, Credit, DeclarePublisher, DeleteStream, QueryOffset, QueryRoute,
    Response, ResponseCode, StoreOffset, StreamStats, Tune,
};
use crate::connection::{Connection, Endpoint, TlsOptions};
use crate::dispatcher::{Dispatcher, DispatcherOptions, PushCallback};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to reach one broker.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub endpoint: Endpoint,
    pub tls: TlsOptions,
    /// Desired heartbeat interval; tune negotiation may shorten it.
    pub heartbeat: Duration,
    /// Largest frame this client will accept. 0 = unlimited.
    pub frame_max: u32,
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            endpoint: Endpoint::default(),
            tls: TlsOptions::default(),
            heartbeat: Duration::from_secs(60),
            frame_max: 1024 * 1024,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// One connection to a stream broker with typed request methods.
///
/// Producer and consumer state machines sit on top of this: they receive
/// deliveries, confirms, and metadata updates through the push callback
/// given to [`Client::connect`] and issue their control commands through
/// the typed methods here.
pub struct Client {
    connection: Arc<Connection>,
    dispatcher: Dispatcher,
}

impl Client {
    /// Connect to the broker and wire up the dispatcher.
    ///
    /// `on_push` receives every broker-initiated command the dispatcher
    /// does not service itself (deliveries, publish confirms and errors,
    /// metadata updates, credit errors).
    pub async fn connect(options: ClientOptions, on_push: PushCallback) -> Result<Client> {
        let dispatcher = Dispatcher::new(
            DispatcherOptions {
                frame_max: options.frame_max,
                heartbeat: options.heartbeat,
                request_timeout: options.request_timeout,
            },
            on_push,
        );
        let connection = Connection::create(
            options.endpoint,
            dispatcher.frame_callback(),
            dispatcher.close_callback(),
            &options.tls,
        )
        .await?;
        dispatcher.attach(&connection);

        Ok(Client {
            connection,
            dispatcher,
        })
    }

    /// Register `publisher_id` for publishing to `stream`.
    pub async fn declare_publisher(
        &self,
        publisher_id: u8,
        publisher_ref: Option<&str>,
        stream: &str,
    ) -> Result<()> {
        let response = self
            .dispatcher
            .request(|correlation_id| DeclarePublisher {
                correlation_id,
                publisher_id,
                publisher_ref: publisher_ref.map(str::to_string),
                stream: stream.to_string(),
            })
            .await?;
        expect_ok(response, "declare_publisher response")
    }

    /// Create `stream` with the given retention arguments.
    pub async fn create_stream(
        &self,
        stream: &str,
        arguments: Vec<(String, String)>,
    ) -> Result<()> {
        let response = self
            .dispatcher
            .request(|correlation_id| CreateStream {
                correlation_id,
                stream: stream.to_string(),
                arguments,
            })
            .await?;
        expect_ok(response, "create response")
    }

    /// Delete `stream`.
    pub async fn delete_stream(&self, stream: &str) -> Result<()> {
        let response = self
            .dispatcher
            .request(|correlation_id| DeleteStream {
                correlation_id,
                stream: stream.to_string(),
            })
            .await?;
        expect_ok(response, "delete response")
    }

    /// Look up the offset stored for `reference` on `stream`.
    ///
    /// A consumer that never stored an offset surfaces as
    /// `Error::Protocol(ResponseCode::NoOffset)`.
    pub async fn query_offset(&self, reference: &str, stream: &str) -> Result<u64> {
        let response = self
            .dispatcher
            .request(|correlation_id| QueryOffset {
                correlation_id,
                reference: reference.to_string(),
                stream: stream.to_string(),
            })
            .await?;
        match response {
            Response::QueryOffset(r) if r.response_code.is_ok() => Ok(r.offset),
            Response::QueryOffset(r) => Err(Error::Protocol(r.response_code)),
            other => Err(unexpected(other, "query_offset response")),
        }
    }

    /// Persist `offset` for `reference` on `stream`. Fire-and-forget.
    pub async fn store_offset(&self, reference: &str, stream: &str, offset: u64) -> Result<()> {
        self.dispatcher
            .send(&StoreOffset {
                reference: reference.to_string(),
                stream: stream.to_string(),
                offset,
            })
            .await
    }

    /// Resolve `routing_key` against `super_stream`.
    pub async fn query_route(&self, routing_key: &str, super_stream: &str) -> Result<Vec<String>> {
        let response = self
            .dispatcher
            .request(|correlation_id| QueryRoute {
                correlation_id,
                routing_key: routing_key.to_string(),
                super_stream: super_stream.to_string(),
            })
            .await?;
        match response {
            Response::Route(r) if r.response_code.is_ok() => Ok(r.streams),
            Response::Route(r) => Err(Error::Protocol(r.response_code)),
            other => Err(unexpected(other, "route response")),
        }
    }

    /// Fetch the broker-side counters of `stream`.
    pub async fn stream_stats(&self, stream: &str) -> Result<HashMap<String, i64>> {
        let response = self
            .dispatcher
            .request(|correlation_id| StreamStats {
                correlation_id,
                stream: stream.to_string(),
            })
            .await?;
        match response {
            Response::StreamStats(r) if r.response_code.is_ok() => Ok(r.stats),
            Response::StreamStats(r) => Err(Error::Protocol(r.response_code)),
            other => Err(unexpected(other, "stream_stats response")),
        }
    }

    /// Grant the broker `credit` more chunks for `subscription_id`.
    /// Fire-and-forget.
    pub async fn credit(&self, subscription_id: u8, credit: u16) -> Result<()> {
        self.dispatcher
            .send(&Credit {
                subscription_id,
                credit,
            })
            .await
    }

    /// Graceful shutdown: tell the broker, wait for its acknowledgement,
    /// then dispose the connection.
    pub async fn close(&self, reason: &str) -> Result<()> {
        if self.connection.is_closed() {
            return Ok(());
        }
        let outcome = self
            .dispatcher
            .request(|correlation_id| Close {
                correlation_id,
                code: ResponseCode::Ok,
                reason: reason.to_string(),
            })
            .await;
        self.connection.close("client closed the connection").await;
        match outcome {
            // The broker acknowledged, or went away while we were asking;
            // either way the connection is down now
            Ok(_) | Err(Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// Values fixed by tune negotiation, once the broker has tuned.
    pub async fn negotiated_tune(&self) -> Option<Tune> {
        self.dispatcher.negotiated_tune().await
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }
}

fn expect_ok(response: Response, expected: &'static str) -> Result<()> {
    match response {
        Response::Generic(r) if r.is_ok() => Ok(()),
        Response::Generic(r) => Err(Error::Protocol(r.response_code)),
        other => Err(unexpected(other, expected)),
    }
}

fn unexpected(response: Response, expected: &'static str) -> Error {
    Error::UnexpectedResponse {
        expected,
        actual: format!("{response:?}"),
    }
}
