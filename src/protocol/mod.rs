//! # Protocol Layer
//!
//! Yar request/response handling on top of the framing layer.
//!
//! ## Components
//! - **Message**: the dispatch-loop view of one request or reply
//! - **Envelope**: request (`i`/`m`/`p`) and response (`i`/`e`/`o`/`s`/`r`) bodies
//! - **ServerCodec**: decodes requests, maps client ids to dispatch ids, writes replies
//! - **Dispatcher**: method-name routing to handlers

pub mod codec;
pub mod dispatcher;
pub mod envelope;
pub mod message;
