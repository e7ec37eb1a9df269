//! Frame codec for the Yar wire format.
//!
//! Used with `tokio_util::codec::FramedRead` on the server side. A frame is a
//! [`WireHeader`] followed by exactly `body_length - 8` body bytes. The body
//! length is validated as soon as the header is buffered, so an invalid frame
//! is rejected before any of its body is read.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::core::header::{WireHeader, BODY_LENGTH_OFFSET, HEADER_SIZE, MAGIC_NUMBER, MAX_BODY_SIZE};
use crate::error::{ProtocolError, Result};
use crate::utils::metrics::global_metrics;

/// One header and its raw, uninterpreted body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: WireHeader,
    pub body: Bytes,
}

impl Frame {
    /// Build a frame whose header declares `body`'s length.
    pub fn new(mut header: WireHeader, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        header.body_length = body.len() as u32 + BODY_LENGTH_OFFSET;
        Self { header, body }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_body_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_body_size: MAX_BODY_SIZE,
        }
    }

    /// Lower the body size limit. Values above [`MAX_BODY_SIZE`] are clamped.
    pub fn with_max_body_size(max_body_size: usize) -> Self {
        Self {
            max_body_size: max_body_size.min(MAX_BODY_SIZE),
        }
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Validate the declared body length of a header.
    pub fn body_len(&self, header: &WireHeader) -> Result<usize> {
        let body_len = header
            .declared_body_len()
            .ok_or(ProtocolError::InvalidBodyLength(header.body_length))?;
        if body_len > self.max_body_size {
            return Err(ProtocolError::OversizedBody(body_len));
        }
        Ok(body_len)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if src.len() < HEADER_SIZE {
            src.reserve(HEADER_SIZE - src.len());
            return Ok(None);
        }

        let header = WireHeader::read_from(&mut &src[..HEADER_SIZE]);
        let body_len = match self.body_len(&header) {
            Ok(len) => len,
            Err(e) => {
                global_metrics().framing_error();
                return Err(e);
            }
        };

        let frame_len = HEADER_SIZE + body_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        if header.magic_number != MAGIC_NUMBER {
            warn!(
                magic = %format!("{:#010x}", header.magic_number),
                "Frame header carries an unexpected magic number"
            );
        }

        src.advance(HEADER_SIZE);
        let body = src.split_to(body_len).freeze();
        trace!(
            transaction_id = header.transaction_id,
            body_len,
            "Decoded frame"
        );
        global_metrics().frame_received(frame_len as u64);

        Ok(Some(Frame { header, body }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                global_metrics().framing_error();
                Err(ProtocolError::IncompleteFrame(src.len()))
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        if item.body.len() > self.max_body_size {
            return Err(ProtocolError::OversizedBody(item.body.len()));
        }
        dst.reserve(HEADER_SIZE + item.body.len());
        item.header.write_to(dst);
        dst.extend_from_slice(&item.body);
        Ok(())
    }
}
