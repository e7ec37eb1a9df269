#![no_main]

use libfuzzer_sys::fuzz_target;
use yar_protocol::protocol::envelope::{EnvelopeFormat, RequestEnvelope};

fuzz_target!(|data: &[u8]| {
    let _ = RequestEnvelope::decode_as(data, EnvelopeFormat::Msgpack);
    let _ = RequestEnvelope::decode_as(data, EnvelopeFormat::Json);
});
