//! Connection acceptor.
//!
//! Accepts connections in a loop and hands each one, wrapped in a
//! [`YarSocket`], to a handler running in its own task. Temporary accept
//! failures (aborted connections, descriptor exhaustion) are retried with
//! exponential backoff; any other accept failure stops the loop. A panicking
//! handler only takes its own connection down. On shutdown the listener is
//! closed first, then open connections get `shutdown_timeout` to finish.

use std::any::Any;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::{NetworkConfig, TransportConfig};
use crate::error::{ProtocolError, Result};
use crate::transport::socket::YarSocket;
use crate::utils::metrics::global_metrics;

/// Source of inbound stream connections.
pub trait Listener: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn accept_stream(
        &mut self,
    ) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Listener for TcpListener {
    type Stream = TcpStream;

    fn accept_stream(
        &mut self,
    ) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Exponential backoff between failed accepts.
#[derive(Debug, Clone)]
pub struct AcceptBackoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Default for AcceptBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(5), Duration::from_secs(1))
    }
}

impl AcceptBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: None,
        }
    }

    /// Delay before the next retry: `initial` first, then doubled, capped at `max`.
    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.initial,
            Some(delay) => delay.saturating_mul(2),
        }
        .min(self.max);
        self.current = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// Whether an accept error is worth retrying.
pub fn is_temporary(err: &io::Error) -> bool {
    // ENFILE / EMFILE / ENOBUFS / ENOMEM
    #[cfg(target_os = "linux")]
    const RESOURCE_ERRNOS: [i32; 4] = [23, 24, 105, 12];
    #[cfg(not(target_os = "linux"))]
    const RESOURCE_ERRNOS: [i32; 0] = [];

    if let Some(code) = err.raw_os_error() {
        if RESOURCE_ERRNOS.contains(&code) {
            return true;
        }
    }

    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::OutOfMemory
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub struct Acceptor<L: Listener> {
    listener: L,
    backoff: AcceptBackoff,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
    shutdown_timeout: Duration,
    transport: TransportConfig,
}

impl<L: Listener> Acceptor<L> {
    pub fn new(listener: L) -> Self {
        Self::from_config(listener, &NetworkConfig::default())
    }

    pub fn from_config(listener: L, config: &NetworkConfig) -> Self {
        Self {
            listener,
            backoff: AcceptBackoff::new(
                config.server.accept_backoff_initial,
                config.server.accept_backoff_max,
            ),
            connection_limit: Arc::new(Semaphore::new(config.server.max_connections)),
            max_connections: config.server.max_connections,
            shutdown_timeout: config.server.shutdown_timeout,
            transport: config.transport.clone(),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept until a non-temporary error occurs.
    pub async fn run<F, Fut>(self, handler: F) -> Result<()>
    where
        F: Fn(YarSocket<L::Stream>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.run_with_shutdown(handler, std::future::pending())
            .await
    }

    /// Accept until `shutdown` completes or a non-temporary error occurs.
    ///
    /// Connections already handed to `handler` keep running either way. After
    /// `shutdown` the call returns once they have all finished or
    /// `shutdown_timeout` has passed, whichever comes first.
    pub async fn run_with_shutdown<F, Fut, Sh>(mut self, handler: F, shutdown: Sh) -> Result<()>
    where
        F: Fn(YarSocket<L::Stream>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
        Sh: Future<Output = ()> + Send,
    {
        let handler = Arc::new(handler);
        tokio::pin!(shutdown);
        info!(addr = ?self.listener.local_addr().ok(), "Accepting connections");

        'accept: loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break 'accept,
                permit = Arc::clone(&self.connection_limit).acquire_owned() => permit
                    .map_err(|_| ProtocolError::Custom("connection limiter closed".to_string()))?,
            };

            let accepted = tokio::select! {
                _ = &mut shutdown => break 'accept,
                accepted = self.listener.accept_stream() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(conn) => {
                    self.backoff.reset();
                    conn
                }
                Err(e) if is_temporary(&e) => {
                    let delay = self.backoff.next_delay();
                    warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "Accept error; retrying");
                    global_metrics().accept_retry();
                    drop(permit);
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Listener failed, stopping acceptor");
                    return Err(ProtocolError::Listener(e));
                }
            };

            debug!(peer = %peer, "Connection accepted");
            global_metrics().connection_established();

            let socket = YarSocket::with_config(stream, &self.transport).with_peer(peer);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let _permit = permit;
                let outcome = AssertUnwindSafe(async move { (*handler)(socket).await })
                    .catch_unwind()
                    .await;
                if let Err(panic) = outcome {
                    global_metrics().handler_panic();
                    error!(
                        peer = %peer,
                        panic = %panic_message(panic.as_ref()),
                        "Connection handler panicked"
                    );
                }
                global_metrics().connection_closed();
                debug!(peer = %peer, "Connection finished");
            });
        }

        info!("Shutdown requested, no longer accepting connections");
        let Self {
            listener,
            connection_limit,
            max_connections,
            shutdown_timeout,
            ..
        } = self;
        drop(listener);
        drain(&connection_limit, max_connections, shutdown_timeout).await;
        Ok(())
    }
}

/// Wait until every connection permit is back or `timeout` passes.
async fn drain(limit: &Semaphore, max_connections: usize, timeout: Duration) {
    let all = u32::try_from(max_connections).unwrap_or(u32::MAX);
    match tokio::time::timeout(timeout, limit.acquire_many(all)).await {
        Ok(_) => debug!("All connections finished"),
        Err(_) => warn!(
            active = max_connections.saturating_sub(limit.available_permits()),
            timeout_ms = timeout.as_millis() as u64,
            "Connections still open after shutdown timeout"
        ),
    }
}
