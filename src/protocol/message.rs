use std::collections::HashMap;

use bytes::Bytes;

use crate::transport::socket::TransportMessage;

/// Metadata key carrying the body content type.
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

/// Metadata key carrying the packager hint used by the read path.
pub const HEADER_PACKAGER: &str = "Packager";

/// Content type of every Yar frame.
pub const CONTENT_TYPE_YAR: &str = "application/yar";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageType {
    #[default]
    Request,
    Response,
    Event,
    Error,
}

/// Message exchanged between the dispatch loop and the codec.
///
/// `id` is the dispatch id assigned by the codec when a request header is read;
/// the reply must carry the same id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub message_type: MessageType,
    pub id: String,
    pub method: String,
    pub header: HashMap<String, String>,
    pub body: Bytes,
}

impl Message {
    pub fn request(header: HashMap<String, String>, body: Bytes) -> Self {
        Self {
            message_type: MessageType::Request,
            header,
            body,
            ..Self::default()
        }
    }

    /// Response message addressed with this message's dispatch id.
    pub fn response(&self) -> Self {
        Self {
            message_type: MessageType::Response,
            id: self.id.clone(),
            method: self.method.clone(),
            header: self.header.clone(),
            body: Bytes::new(),
        }
    }

    pub fn packager_hint(&self) -> Option<&str> {
        self.header.get(HEADER_PACKAGER).map(String::as_str)
    }
}

impl From<TransportMessage> for Message {
    fn from(msg: TransportMessage) -> Self {
        Self::request(msg.header, msg.body)
    }
}
