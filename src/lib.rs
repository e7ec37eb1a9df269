//! # Yar Protocol
//!
//! Server side of the Yar binary RPC protocol: a fixed 90-byte framing
//! layer over stream sockets, pluggable body packagers and a request/response
//! codec that keeps several requests in flight on one connection.
//!
//! ## Layers
//! - [`core`]: wire header and the `tokio_util` frame codec
//! - [`packager`]: msgpack and JSON body serializers behind one registry
//! - [`transport`]: framed sockets, listener abstraction and the accept loop
//! - [`protocol`]: request/response envelopes and the server codec
//! - [`service`]: a small RPC host driving the codec per connection
//!
//! ## Example
//! ```no_run
//! use yar_protocol::config::NetworkConfig;
//! use yar_protocol::service::Server;
//!
//! # async fn run() -> yar_protocol::error::Result<()> {
//! let server = Server::new(NetworkConfig::default());
//! server.register("echo", |params| Ok(params))?;
//! let listener = server.bind().await?;
//! server.serve(listener).await
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod core;
pub mod error;
pub mod packager;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::{Frame, FrameCodec, WireHeader};
pub use crate::error::{ProtocolError, Result};
pub use crate::packager::{Packager, PackagerRegistry, Value};
pub use crate::protocol::codec::ServerCodec;
pub use crate::protocol::message::{Message, MessageType};
pub use crate::service::Server;
pub use crate::transport::{listen, YarSocket, TRANSPORT_NAME};
