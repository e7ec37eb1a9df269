//! Request/response codec for one Yar connection.
//!
//! The codec never exposes the client's request id as the dispatch id. Each
//! request header read issues the next value of a per-connection counter; the
//! counter value becomes the message id and the client id is parked in a
//! pending map until the reply is written. Client ids may repeat, be zero or be
//! hostile without two in-flight requests ever sharing a dispatch id.
//!
//! ```text
//! read_header:  seq += 1; pending[seq] = client_id; msg.id = seq
//! write:        client_id = pending.remove(msg.id); header.transaction_id = client_id
//! ```
//!
//! Reads happen on the connection task. Writes go through [`Responder`], which
//! can be cloned into other tasks so several requests may be answered
//! concurrently and out of order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::core::header::WireHeader;
use crate::error::{constants, ProtocolError, Result};
use crate::packager::{Packager, PackagerRegistry};
use crate::protocol::envelope::{EnvelopeFormat, RequestEnvelope, ResponseEnvelope};
use crate::protocol::message::{Message, MessageType};
use crate::transport::socket::SocketWriter;
use crate::utils::metrics::global_metrics;

#[derive(Debug, Default)]
struct PendingRequests {
    seq: u64,
    pending: HashMap<u64, i64>,
}

impl PendingRequests {
    fn issue(&mut self, client_id: i64) -> u64 {
        self.seq += 1;
        self.pending.insert(self.seq, client_id);
        self.seq
    }

    fn peek(&self, seq: u64) -> Option<i64> {
        self.pending.get(&seq).copied()
    }

    fn take(&mut self, seq: u64) -> Option<i64> {
        self.pending.remove(&seq)
    }
}

/// Write side of a connection codec.
pub struct Responder<W> {
    state: Arc<Mutex<PendingRequests>>,
    writer: SocketWriter<W>,
}

impl<W> Clone for Responder<W> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            writer: self.writer.clone(),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> Responder<W> {
    fn lock_state(&self) -> Result<MutexGuard<'_, PendingRequests>> {
        self.state
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_LOCK_POISONED.to_string()))
    }

    fn issue(&self, client_id: i64) -> Result<u64> {
        Ok(self.lock_state()?.issue(client_id))
    }

    fn mismatch(dispatch_id: &str) -> ProtocolError {
        global_metrics().sequence_mismatch();
        ProtocolError::SequenceMismatch(dispatch_id.to_string())
    }

    /// Client request id behind a dispatch id. The entry stays pending.
    fn client_id(&self, dispatch_id: &str) -> Result<(u64, i64)> {
        let seq = dispatch_id
            .parse::<u64>()
            .map_err(|_| Self::mismatch(dispatch_id))?;
        let client_id = self
            .lock_state()?
            .peek(seq)
            .ok_or_else(|| Self::mismatch(dispatch_id))?;
        Ok((seq, client_id))
    }

    /// Number of requests read but not yet answered.
    pub fn in_flight(&self) -> usize {
        self.lock_state().map(|state| state.pending.len()).unwrap_or(0)
    }

    /// Answer the request behind `msg.id` with `result`.
    pub async fn write<T: Serialize + ?Sized>(&self, msg: &Message, result: &T) -> Result<()> {
        if msg.message_type != MessageType::Response {
            return Err(ProtocolError::UnexpectedMessage(format!(
                "{:?}",
                msg.message_type
            )));
        }
        let result = serde_json::to_value(result)
            .map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
        let (seq, client_id) = self.client_id(&msg.id)?;
        self.send(&msg.id, seq, ResponseEnvelope::ok(client_id, result))
            .await
    }

    /// Answer the request behind `msg.id` with a failure status.
    pub async fn write_error(&self, msg: &Message, err: &ProtocolError) -> Result<()> {
        let (seq, client_id) = self.client_id(&msg.id)?;
        debug!(client_id, error = %err, "Replying with error status");
        self.send(&msg.id, seq, ResponseEnvelope::failure(client_id, err))
            .await
    }

    /// Encode `response`, retire its pending entry, then write it.
    ///
    /// The entry is only retired once the body is encoded, so an encode
    /// failure can still be answered with an error reply.
    async fn send(&self, dispatch_id: &str, seq: u64, response: ResponseEnvelope) -> Result<()> {
        let body = response.encode()?;
        let header = WireHeader::for_response(response.id, body.len()).to_bytes();
        let retired = self.lock_state()?.take(seq);
        if retired.is_none() {
            return Err(Self::mismatch(dispatch_id));
        }

        {
            let mut writer = self.writer.lock().await;
            writer.write_all(&header).await?;
            writer.write_all(&body).await?;
            writer.flush().await?;
        }

        trace!(
            client_id = response.id,
            status = response.status,
            body_len = body.len(),
            "Response written"
        );
        global_metrics().response_sent((header.len() + body.len()) as u64);
        Ok(())
    }
}

/// Server-side Yar codec bound to one connection.
pub struct ServerCodec<W> {
    registry: Arc<PackagerRegistry>,
    request: RequestEnvelope,
    packager: Option<Arc<dyn Packager>>,
    message_type: MessageType,
    responder: Responder<W>,
}

impl<W: AsyncWrite + Unpin + Send> ServerCodec<W> {
    pub fn new(writer: SocketWriter<W>, registry: Arc<PackagerRegistry>) -> Self {
        Self {
            registry,
            request: RequestEnvelope::default(),
            packager: None,
            message_type: MessageType::Request,
            responder: Responder {
                state: Arc::new(Mutex::new(PendingRequests::default())),
                writer,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        "yar-rpc"
    }

    /// Decode the request envelope from `msg.body` and assign the dispatch id.
    ///
    /// On success `msg.method` and `msg.id` are set. If the packager hint does
    /// not resolve, the dispatch id is still assigned before the error is
    /// returned, so the caller can reply with a failure.
    pub fn read_header(&mut self, msg: &mut Message) -> Result<()> {
        self.message_type = msg.message_type;
        if msg.message_type != MessageType::Request {
            return Ok(());
        }

        self.request.reset();
        self.packager = None;

        let hint = msg.packager_hint().unwrap_or_default().to_string();
        let format = EnvelopeFormat::from_hint(&hint);
        self.request = RequestEnvelope::decode_as(&msg.body, format).map_err(|e| {
            global_metrics().decode_error();
            e
        })?;
        msg.method = self.request.method.clone();

        let seq = self.responder.issue(self.request.id)?;
        trace!(seq, client_id = self.request.id, method = %msg.method, "Request header read");
        self.request.id = 0;
        msg.id = seq.to_string();

        match self.registry.resolve(hint.as_bytes()) {
            Ok(packager) => {
                self.packager = Some(packager);
                Ok(())
            }
            Err(e) => {
                warn!(hint = %hint, "No packager registered for hint");
                global_metrics().packager_miss();
                Err(e)
            }
        }
    }

    /// Decode the parameters of the last request into `dest`.
    ///
    /// `None` is accepted for methods without parameters and does nothing.
    pub fn read_body<T: DeserializeOwned>(&mut self, dest: Option<&mut T>) -> Result<()> {
        if self.message_type != MessageType::Request {
            return Ok(());
        }
        let Some(dest) = dest else {
            return Ok(());
        };
        let packager = self
            .packager
            .as_ref()
            .ok_or_else(|| ProtocolError::PackagerNotFound(constants::ERR_NO_PACKAGER.to_string()))?;
        packager.unpack_into(&self.request.params, dest).map_err(|e| {
            global_metrics().decode_error();
            e
        })
    }

    pub async fn write<T: Serialize + ?Sized>(&self, msg: &Message, result: &T) -> Result<()> {
        self.responder.write(msg, result).await
    }

    pub async fn write_error(&self, msg: &Message, err: &ProtocolError) -> Result<()> {
        self.responder.write_error(msg, err).await
    }

    /// Handle for answering requests from other tasks.
    pub fn responder(&self) -> Responder<W> {
        self.responder.clone()
    }
}
