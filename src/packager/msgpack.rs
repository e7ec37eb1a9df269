//! MessagePack packager using `rmp-serde`.
//!
//! Encodes with `to_vec_named` so structs travel as maps keyed by field name,
//! which is what the Yar envelopes (`i`, `m`, `p`, ...) require.

use crate::core::header::fixed_name;
use crate::error::{constants, ProtocolError, Result};

use super::{Packager, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct MsgpackPackager;

impl MsgpackPackager {
    pub const NAME: [u8; 8] = fixed_name(b"MSGPACK");
}

impl Packager for MsgpackPackager {
    fn name(&self) -> [u8; 8] {
        Self::NAME
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        if value.is_null() {
            return Err(ProtocolError::SerializeError(
                constants::ERR_NULL_RESPONSE.to_string(),
            ));
        }
        Ok(rmp_serde::to_vec_named(value)?)
    }

    fn decode(&self, data: &[u8]) -> Result<Value> {
        Ok(rmp_serde::from_slice(data)?)
    }
}
