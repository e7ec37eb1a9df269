//! Fixed-layout Yar wire header.
//!
//! ```text
//! offset  size  field
//! 0       4     transaction_id  (i32)
//! 4       2     version         (u16)
//! 6       4     magic_number    (u32, 0x80DFEC60)
//! 10      4     reserved        (u32)
//! 14      32    provider
//! 46      32    token
//! 78      4     body_length     (u32) = encoded body + BODY_LENGTH_OFFSET
//! 82      8     packager_name
//! ```
//!
//! All integers are big-endian.

use bytes::{Buf, BufMut};

/// Magic number carried by every Yar header.
pub const MAGIC_NUMBER: u32 = 0x80DF_EC60;

/// Protocol version written on outgoing headers.
pub const PROTOCOL_VERSION: u16 = 0;

/// Value of the reserved field on outgoing headers.
pub const RESERVED: u32 = 0;

/// Serialized header size in bytes.
pub const HEADER_SIZE: usize = 90;

/// Fixed amount added to the encoded body length in `body_length`.
pub const BODY_LENGTH_OFFSET: u32 = 8;

/// Largest body accepted by the frame reader (2 MiB).
pub const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Provider identifier written on outgoing headers.
pub const PROVIDER: [u8; 32] = fixed_name(b"Yar Rust Server");

/// Token written on outgoing headers. Never validated on input.
pub const TOKEN: [u8; 32] = [0u8; 32];

/// Packager name advertised on every response header.
pub const RESPONSE_PACKAGER: [u8; 8] = fixed_name(b"msgpack");

/// Zero-pad (or truncate) an ASCII name into a fixed-width field.
pub const fn fixed_name<const N: usize>(name: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let mut i = 0;
    while i < N && i < name.len() {
        out[i] = name[i];
        i += 1;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireHeader {
    pub transaction_id: i32,
    pub version: u16,
    pub magic_number: u32,
    pub reserved: u32,
    pub provider: [u8; 32],
    pub token: [u8; 32],
    pub body_length: u32,
    pub packager_name: [u8; 8],
}

impl Default for WireHeader {
    fn default() -> Self {
        Self {
            transaction_id: 0,
            version: 0,
            magic_number: 0,
            reserved: 0,
            provider: [0u8; 32],
            token: [0u8; 32],
            body_length: 0,
            packager_name: [0u8; 8],
        }
    }
}

impl WireHeader {
    /// Header for a response carrying `body_len` encoded bytes.
    ///
    /// `transaction_id` is the client's request id truncated to 32 bits.
    pub fn for_response(client_request_id: i64, body_len: usize) -> Self {
        let mut header = Self::default();
        header.reset();
        header.transaction_id = client_request_id as i32;
        header.version = PROTOCOL_VERSION;
        header.magic_number = MAGIC_NUMBER;
        header.reserved = RESERVED;
        header.provider = PROVIDER;
        header.token = TOKEN;
        header.body_length = body_len as u32 + BODY_LENGTH_OFFSET;
        header.packager_name = RESPONSE_PACKAGER;
        header
    }

    /// Zero the numeric fields. Byte-array fields are left as they are.
    pub fn reset(&mut self) {
        self.transaction_id = 0;
        self.version = 0;
        self.magic_number = 0;
        self.reserved = 0;
        self.body_length = 0;
    }

    /// Read the header fields in wire order. `src` must hold at least
    /// [`HEADER_SIZE`] bytes.
    pub fn read_from<B: Buf>(src: &mut B) -> Self {
        let transaction_id = src.get_i32();
        let version = src.get_u16();
        let magic_number = src.get_u32();
        let reserved = src.get_u32();
        let mut provider = [0u8; 32];
        src.copy_to_slice(&mut provider);
        let mut token = [0u8; 32];
        src.copy_to_slice(&mut token);
        let body_length = src.get_u32();
        let mut packager_name = [0u8; 8];
        src.copy_to_slice(&mut packager_name);

        Self {
            transaction_id,
            version,
            magic_number,
            reserved,
            provider,
            token,
            body_length,
            packager_name,
        }
    }

    pub fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_i32(self.transaction_id);
        dst.put_u16(self.version);
        dst.put_u32(self.magic_number);
        dst.put_u32(self.reserved);
        dst.put_slice(&self.provider);
        dst.put_slice(&self.token);
        dst.put_u32(self.body_length);
        dst.put_slice(&self.packager_name);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        self.write_to(&mut out);
        out
    }

    /// Body length declared by the header, without the fixed offset.
    ///
    /// `None` when `body_length` is smaller than the offset.
    pub fn declared_body_len(&self) -> Option<usize> {
        self.body_length
            .checked_sub(BODY_LENGTH_OFFSET)
            .map(|len| len as usize)
    }

    /// Packager name with trailing NUL padding removed.
    pub fn packager_str(&self) -> String {
        let end = self
            .packager_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.packager_name.len());
        String::from_utf8_lossy(&self.packager_name[..end]).into_owned()
    }
}
