//! Request and response envelopes carried in Yar bodies.
//!
//! The request envelope is a map with keys `i` (client request id), `m`
//! (method) and `p` (parameters). The parameters are kept as the raw bytes of
//! that one value, in the scheme the body was written in, and only decoded when
//! the dispatched method asks for them. Nothing about `p` is interpreted here,
//! so integer-keyed maps, binary strings and extension types pass through.
//!
//! Request bodies are msgpack unless the packager hint names JSON, in which
//! case the whole body is a JSON object and `p` is kept as raw JSON text.
//!
//! The response envelope is a map with keys `i`, `e` (error details), `o`
//! (captured output), `s` (status) and `r` (result). Responses are always
//! encoded with msgpack, whatever packager the request used.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{constants, ProtocolError, Result};
use crate::packager::{lookup_key, Value};

/// Yar status codes reported in the `s` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusCode {
    Okey = 0,
    Packager = 1,
    Protocol = 2,
    Request = 4,
    Output = 8,
    Transport = 16,
    Forbidden = 32,
    Exception = 64,
    EmptyResponse = 128,
}

impl StatusCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Scheme a request body is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeFormat {
    #[default]
    Msgpack,
    Json,
}

impl EnvelopeFormat {
    /// Pick the body scheme for a packager hint. Unknown hints read as msgpack.
    pub fn from_hint(hint: &str) -> Self {
        if lookup_key(hint.as_bytes()) == "json" {
            EnvelopeFormat::Json
        } else {
            EnvelopeFormat::Msgpack
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub id: i64,
    pub method: String,
    /// Encoded `p` value; empty when the request carried no parameters.
    pub params: Vec<u8>,
}

#[derive(Deserialize)]
struct JsonRequest<'a> {
    #[serde(default)]
    i: i64,
    #[serde(default)]
    m: String,
    #[serde(default, borrow)]
    p: Option<&'a RawValue>,
}

fn malformed(reason: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::DeserializeError(reason.to_string())
}

impl RequestEnvelope {
    pub fn decode_as(body: &[u8], format: EnvelopeFormat) -> Result<Self> {
        match format {
            EnvelopeFormat::Msgpack => Self::decode(body),
            EnvelopeFormat::Json => Self::decode_json(body),
        }
    }

    /// Decode a msgpack request body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut reader = body;
        let rmpv::Value::Map(entries) = rmpv::decode::read_value(&mut reader).map_err(malformed)?
        else {
            return Err(malformed(constants::ERR_ENVELOPE_NOT_MAP));
        };

        let mut request = Self::default();
        for (key, value) in entries {
            match key.as_str() {
                Some("i") if value.is_nil() => request.id = 0,
                Some("i") => {
                    request.id = value
                        .as_i64()
                        .ok_or_else(|| malformed(format!("invalid request id: {value}")))?;
                }
                Some("m") if value.is_nil() => request.method.clear(),
                Some("m") => {
                    request.method = value
                        .as_str()
                        .ok_or_else(|| malformed(format!("invalid method name: {value}")))?
                        .to_string();
                }
                Some("p") => {
                    request.params.clear();
                    rmpv::encode::write_value(&mut request.params, &value).map_err(malformed)?;
                }
                _ => {}
            }
        }
        Ok(request)
    }

    /// Decode a JSON request body.
    pub fn decode_json(body: &[u8]) -> Result<Self> {
        let request: JsonRequest<'_> = serde_json::from_slice(body).map_err(malformed)?;
        Ok(Self {
            id: request.i,
            method: request.m,
            params: request
                .p
                .map(|raw| raw.get().as_bytes().to_vec())
                .unwrap_or_default(),
        })
    }

    /// Encode a request body the way a Yar client does.
    pub fn encode<P: Serialize + ?Sized>(id: i64, method: &str, params: &P) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct Outgoing<'a, P: ?Sized> {
            i: i64,
            m: &'a str,
            p: &'a P,
        }

        Ok(rmp_serde::to_vec_named(&Outgoing {
            i: id,
            m: method,
            p: params,
        })?)
    }

    pub fn reset(&mut self) {
        self.id = 0;
        self.method.clear();
        self.params.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "i")]
    pub id: i64,
    #[serde(rename = "e", default)]
    pub error: BTreeMap<String, String>,
    #[serde(rename = "o", default)]
    pub output: String,
    #[serde(rename = "s")]
    pub status: i32,
    #[serde(rename = "r", default)]
    pub result: Value,
}

impl ResponseEnvelope {
    pub fn ok(id: i64, result: Value) -> Self {
        Self {
            id,
            error: BTreeMap::new(),
            output: String::new(),
            status: StatusCode::Okey.as_i32(),
            result,
        }
    }

    pub fn failure(id: i64, err: &ProtocolError) -> Self {
        let status = err.status_code().as_i32();
        let mut error = BTreeMap::new();
        error.insert("message".to_string(), err.to_string());
        error.insert("code".to_string(), status.to_string());
        Self {
            id,
            error,
            output: String::new(),
            status,
            result: Value::Null,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn decode(body: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(body)?)
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::Okey.as_i32()
    }
}
