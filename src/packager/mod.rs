//! # Packagers
//!
//! A packager is one serialization scheme for Yar bodies. The wire header names
//! the scheme in an 8-byte field; the [`PackagerRegistry`] maps that name to an
//! implementation.
//!
//! Packagers work on the dynamic [`Value`] type so that they can live behind
//! `Arc<dyn Packager>`. Typed helpers on `dyn Packager` convert to and from
//! concrete `serde` types:
//!
//! ```rust
//! use std::collections::HashMap;
//! use yar_protocol::packager::PackagerRegistry;
//!
//! let registry = PackagerRegistry::with_defaults();
//! let packager = registry.resolve(b"MSGPACK").unwrap();
//!
//! let mut args = HashMap::new();
//! args.insert("name".to_string(), 7i64);
//! let bytes = packager.pack(&args).unwrap();
//!
//! let mut decoded: HashMap<String, i64> = HashMap::new();
//! packager.unpack_into(&bytes, &mut decoded).unwrap();
//! assert_eq!(decoded, args);
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ProtocolError, Result};

mod json;
mod msgpack;
mod registry;

pub use json::JsonPackager;
pub use msgpack::MsgpackPackager;
pub use registry::{lookup_key, PackagerRegistry};

/// Dynamic value exchanged with packagers.
pub type Value = serde_json::Value;

/// One body serialization scheme.
pub trait Packager: Send + Sync + fmt::Debug {
    /// 8-byte name advertised in the wire header.
    fn name(&self) -> [u8; 8];

    fn encode(&self, value: &Value) -> Result<Vec<u8>>;

    fn decode(&self, data: &[u8]) -> Result<Value>;
}

impl dyn Packager {
    /// Encode any serializable value with this scheme.
    pub fn pack<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let value = serde_json::to_value(value)
            .map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
        self.encode(&value)
    }

    /// Decode `data` into `dest`. `dest` is only overwritten on success.
    ///
    /// The built-in schemes decode straight into `T`, so integer map keys and
    /// binary strings reach typed destinations even though [`Value`] cannot
    /// hold them. Other packagers go through [`Packager::decode`].
    pub fn unpack_into<T: DeserializeOwned>(&self, data: &[u8], dest: &mut T) -> Result<()> {
        let decoded = match self.name() {
            MsgpackPackager::NAME => rmp_serde::from_slice(data)?,
            JsonPackager::NAME => serde_json::from_slice(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string()))?,
            _ => serde_json::from_value(self.decode(data)?)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string()))?,
        };
        *dest = decoded;
        Ok(())
    }
}
