//! # Transport
//!
//! TCP transport for the Yar protocol: one connection carries one stream of
//! request frames.
//!
//! - [`socket`]: frame reader and serialized writer for one connection
//! - [`listener`]: accept loop with backoff and per-connection tasks
//!
//! Only the listening side is provided; there is no client dialer.

pub mod listener;
pub mod socket;

use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::error::Result;

pub use listener::{AcceptBackoff, Acceptor, Listener};
pub use socket::{SocketWriter, TransportMessage, YarSocket};

/// Name of this transport.
pub const TRANSPORT_NAME: &str = "yar";

/// Bind a TCP listener for Yar connections.
#[instrument]
pub async fn listen(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "Listening");
    Ok(listener)
}
