//! Per-connection Yar socket.
//!
//! The read half is a `FramedRead` over [`FrameCodec`]: each `recv` yields one
//! frame body plus the metadata the codec needs. The write half is shared
//! behind an async mutex so concurrent replies on one connection never
//! interleave their bytes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::codec::FramedRead;
use tracing::trace;

use crate::config::TransportConfig;
use crate::core::codec::FrameCodec;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::{CONTENT_TYPE_YAR, HEADER_CONTENT_TYPE, HEADER_PACKAGER};

/// Body and metadata of one received frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportMessage {
    pub header: HashMap<String, String>,
    pub body: Bytes,
}

/// Shared, serialized write access to a connection.
pub struct SocketWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for SocketWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> SocketWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write `data` verbatim.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        let mut writer = self.inner.lock().await;
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Exclusive access for multi-part writes.
    pub async fn lock(&self) -> MutexGuard<'_, W> {
        self.inner.lock().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        let mut writer = self.inner.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

pub struct YarSocket<S> {
    reader: FramedRead<ReadHalf<S>, FrameCodec>,
    writer: SocketWriter<WriteHalf<S>>,
    packager_hint: String,
    peer: Option<SocketAddr>,
}

impl<S> YarSocket<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, &TransportConfig::default())
    }

    pub fn with_config(stream: S, config: &TransportConfig) -> Self {
        let (read_half, write_half) = split(stream);
        Self {
            reader: FramedRead::new(
                read_half,
                FrameCodec::with_max_body_size(config.max_body_size),
            ),
            writer: SocketWriter::new(write_half),
            packager_hint: config.default_packager.clone(),
            peer: None,
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Receive the next frame.
    ///
    /// Returns [`ProtocolError::ConnectionClosed`] on a clean end of stream.
    /// Any other error leaves the stream out of sync and is connection-fatal.
    pub async fn recv(&mut self) -> Result<TransportMessage> {
        let frame = match self.reader.next().await {
            Some(frame) => frame?,
            None => return Err(ProtocolError::ConnectionClosed),
        };
        trace!(
            transaction_id = frame.header.transaction_id,
            wire_packager = %frame.header.packager_str(),
            "Frame received"
        );

        let mut header = HashMap::with_capacity(2);
        header.insert(HEADER_CONTENT_TYPE.to_string(), CONTENT_TYPE_YAR.to_string());
        header.insert(HEADER_PACKAGER.to_string(), self.packager_hint.clone());

        Ok(TransportMessage {
            header,
            body: frame.body,
        })
    }

    /// Write `data` to the connection as-is. No header is attached.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        self.writer.send(data).await
    }

    pub fn writer(&self) -> SocketWriter<WriteHalf<S>> {
        self.writer.clone()
    }

    /// Stop reading and shut the write half down.
    ///
    /// Replies still held by other tasks through [`SocketWriter`] clones fail
    /// once the shutdown completes.
    pub async fn close(self) -> Result<()> {
        let Self { reader, writer, .. } = self;
        drop(reader);
        writer.shutdown().await
    }
}
