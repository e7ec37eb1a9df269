use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::{ProtocolError, Result};

use super::{JsonPackager, MsgpackPackager, Packager};

/// Number of leading name bytes that take part in lookups.
const KEY_LEN: usize = 4;

static GLOBAL_REGISTRY: Lazy<PackagerRegistry> = Lazy::new(PackagerRegistry::with_defaults);

/// Lookup key for a wire packager name.
///
/// The name is padded or truncated to the 8-byte wire width, then only the
/// first four bytes are kept and lowercased: `"MSGPACK"` and `"msgpxxxx"` both
/// map to `"msgp"`.
pub fn lookup_key(raw_name: &[u8]) -> String {
    let mut buf = [0u8; 8];
    let len = raw_name.len().min(buf.len());
    buf[..len].copy_from_slice(&raw_name[..len]);
    String::from_utf8_lossy(&buf[..KEY_LEN]).to_lowercase()
}

/// Named packagers, filled during startup and read-only afterwards.
#[derive(Debug, Default)]
pub struct PackagerRegistry {
    packagers: HashMap<String, Arc<dyn Packager>>,
}

impl PackagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `msgp` and `json`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("msgp", MsgpackPackager);
        registry.register("json", JsonPackager);
        registry
    }

    /// Process-wide registry with the default packagers.
    pub fn global() -> &'static PackagerRegistry {
        &GLOBAL_REGISTRY
    }

    /// Register `packager` under `short_name`. The name is normalized the same
    /// way wire names are, so registering `"msgpack"` stores it as `"msgp"`.
    pub fn register<P: Packager + 'static>(&mut self, short_name: &str, packager: P) -> &mut Self {
        let key = lookup_key(short_name.as_bytes());
        debug!(key = %key, "Registering packager");
        self.packagers.insert(key, Arc::new(packager));
        self
    }

    /// Resolve a raw wire packager name.
    pub fn resolve(&self, raw_name: &[u8]) -> Result<Arc<dyn Packager>> {
        let key = lookup_key(raw_name);
        self.packagers
            .get(&key)
            .cloned()
            .ok_or(ProtocolError::PackagerNotFound(key))
    }

    pub fn len(&self) -> usize {
        self.packagers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packagers.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.packagers.keys().map(String::as_str)
    }
}
