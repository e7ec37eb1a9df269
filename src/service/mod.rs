//! # Service Layer
//!
//! A small RPC host on top of the transport and protocol layers: method
//! registration, per-connection request loop and graceful shutdown.

pub mod server;

pub use server::{handle_connection, Server};
