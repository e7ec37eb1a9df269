use crate::core::header::fixed_name;
use crate::error::{ProtocolError, Result};

use super::{Packager, Value};

/// JSON packager, registered under `json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPackager;

impl JsonPackager {
    pub const NAME: [u8; 8] = fixed_name(b"JSON");
}

impl Packager for JsonPackager {
    fn name(&self) -> [u8; 8] {
        Self::NAME
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| ProtocolError::SerializeError(e.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<Value> {
        serde_json::from_slice(data).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
    }
}
