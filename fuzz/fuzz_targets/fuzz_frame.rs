#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;
use yar_protocol::FrameCodec;

fuzz_target!(|data: &[u8]| {
    // Drain every frame out of arbitrary input; errors are fine, panics are not.
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_frame)) = codec.decode(&mut buf) {}
    let _ = codec.decode_eof(&mut buf);
});
