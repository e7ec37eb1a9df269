//! # Core Protocol Components
//!
//! Wire header and frame codec for the Yar protocol.
//!
//! ## Components
//! - **WireHeader**: the fixed 90-byte big-endian header
//! - **FrameCodec**: Tokio codec that splits a byte stream into header + body frames
//!
//! ## Wire Format
//! ```text
//! [TxId(4)] [Version(2)] [Magic(4)] [Reserved(4)] [Provider(32)] [Token(32)]
//! [BodyLength(4)] [Packager(8)] [Body(BodyLength - 8)]
//! ```
//!
//! ## Limits
//! - Maximum body size: 2 MiB
//! - Length validation before the body is buffered

pub mod codec;
pub mod header;

pub use codec::{Frame, FrameCodec};
pub use header::WireHeader;
