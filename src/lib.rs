//! Connection core of a RabbitMQ Stream protocol client.
//!
//! The crate frames the stream protocol's length-prefixed binary commands
//! over one TCP (optionally TLS) connection and pairs correlated broker
//! replies with the requests that are suspended waiting for them. Producer
//! and consumer machinery is expected to live on top of this core and use
//! it through [`Client`] or, for full control, [`Connection`] plus
//! [`Dispatcher`].
//!
//! # Layers
//!
//! * [`codec`] — big-endian primitive encoding and the [`Command`] trait.
//! * [`commands`] — the typed command family keyed by opcode.
//! * [`framing`] — the 4-byte length-prefix rule, outbound and inbound.
//! * [`connection`] — one socket, a single-permit write gate, and a
//!   background frame-reader task.
//! * [`dispatcher`] — correlation table, push routing, heartbeats, and
//!   tune negotiation.
//! * [`client`] — typed request methods mapping response codes to errors.
//!
//! # Example
//!
//! ```rust,no_run
//! use rmq_stream::{Client, ClientOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect(
//!         ClientOptions::default(),
//!         Box::new(|push| Box::pin(async move { println!("push: {push:?}") })),
//!     )
//!     .await?;
//!
//!     client.create_stream("events", Vec::new()).await?;
//!     client.declare_publisher(1, Some("app-1"), "events").await?;
//!
//!     client.close("done").await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod commands;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod framing;


pub use client::{Client, ClientOptions};
pub use codec::{CodecError, Command, PROTOCOL_VERSION};
pub use commands::{Inbound, OpCode, Push, Response, ResponseCode};
pub use connection::{Connection, Endpoint, TlsOptions};
pub use dispatcher::{Dispatcher, DispatcherOptions, PushCallback};
pub use error::{Error, Result};
