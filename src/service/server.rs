//! Minimal RPC server driving the Yar codec.
//!
//! Per connection: receive a frame, read the request header and parameters,
//! run the handler registered for the method in a separate task and write the
//! reply from there. Request-scoped failures are answered with an error status
//! and the loop keeps reading; connection-fatal failures end the loop, including
//! a failed reply write in one of the handler tasks.

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::NetworkConfig;
use crate::error::{ProtocolError, Result};
use crate::packager::{PackagerRegistry, Value};
use crate::protocol::codec::{Responder, ServerCodec};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::Message;
use crate::transport::listener::{Acceptor, Listener};
use crate::transport::socket::YarSocket;
use crate::transport::listen;
use crate::utils::metrics::Timer;

pub struct Server {
    config: NetworkConfig,
    registry: Arc<PackagerRegistry>,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            registry: Arc::new(PackagerRegistry::with_defaults()),
            dispatcher: Arc::new(Dispatcher::new()),
        }
    }

    /// Replace the packager registry. Call before serving.
    pub fn with_registry(mut self, registry: PackagerRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn register<F>(&self, method: &str, handler: F) -> Result<()>
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.dispatcher.register(method, handler)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener> {
        listen(&self.config.server.address).await
    }

    pub async fn serve<L: Listener>(&self, listener: L) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }

    pub async fn serve_with_shutdown<L, Sh>(&self, listener: L, shutdown: Sh) -> Result<()>
    where
        L: Listener,
        Sh: Future<Output = ()> + Send,
    {
        let registry = Arc::clone(&self.registry);
        let dispatcher = Arc::clone(&self.dispatcher);
        info!(methods = ?dispatcher.methods(), "Serving Yar requests");

        Acceptor::from_config(listener, &self.config)
            .run_with_shutdown(
                move |socket| {
                    handle_connection(socket, Arc::clone(&registry), Arc::clone(&dispatcher))
                },
                shutdown,
            )
            .await
    }
}

/// Serve requests on one connection until it closes or breaks.
#[instrument(skip_all, fields(peer = ?socket.peer_addr()))]
pub async fn handle_connection<S>(
    mut socket: YarSocket<S>,
    registry: Arc<PackagerRegistry>,
    dispatcher: Arc<Dispatcher>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let mut codec = ServerCodec::new(socket.writer(), registry);
    let broken = CancellationToken::new();

    loop {
        let received = tokio::select! {
            _ = broken.cancelled() => {
                warn!("Reply write failed, closing connection");
                break;
            }
            received = socket.recv() => received,
        };
        let incoming = match received {
            Ok(incoming) => incoming,
            Err(ProtocolError::ConnectionClosed) => {
                debug!("Peer closed connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Closing connection");
                break;
            }
        };

        let mut msg = Message::from(incoming);
        if let Err(e) = codec.read_header(&mut msg) {
            if e.is_connection_fatal() {
                warn!(error = %e, "Closing connection");
                break;
            }
            warn!(error = %e, method = %msg.method, "Rejecting request");
            if !msg.id.is_empty() && reply_error(&codec.responder(), &msg, e).await.is_err() {
                break;
            }
            continue;
        }

        let mut params = Value::Null;
        if let Err(e) = codec.read_body(Some(&mut params)) {
            warn!(error = %e, method = %msg.method, "Rejecting request parameters");
            if reply_error(&codec.responder(), &msg, e).await.is_err() {
                break;
            }
            continue;
        }

        let reply = msg.response();
        let responder = codec.responder();
        let dispatcher = Arc::clone(&dispatcher);
        let broken = broken.clone();
        tokio::spawn(async move {
            let _timer = Timer::start("dispatch");
            let written = match dispatcher.dispatch(&reply.method, params) {
                Ok(result) => responder.write(&reply, &result).await,
                Err(e) => {
                    debug!(error = %e, method = %reply.method, "Handler failed");
                    responder.write_error(&reply, &e).await
                }
            };
            if let Err(e) = written {
                warn!(error = %e, id = %reply.id, "Failed to write reply");
                if e.is_connection_fatal() {
                    broken.cancel();
                }
            }
        });
    }

    if let Err(e) = socket.close().await {
        debug!(error = %e, "Error while closing socket");
    }
}

/// Answer a rejected request. Only a connection-fatal write failure is returned.
async fn reply_error<S>(
    responder: &Responder<WriteHalf<S>>,
    msg: &Message,
    err: ProtocolError,
) -> Result<()>
where
    S: AsyncWrite + Send,
{
    match responder.write_error(&msg.response(), &err).await {
        Err(write_err) if write_err.is_connection_fatal() => {
            warn!(error = %write_err, "Failed to write error reply, closing connection");
            Err(write_err)
        }
        Err(write_err) => {
            warn!(error = %write_err, "Failed to write error reply");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
