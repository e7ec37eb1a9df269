//! Integration tests for zero-copy frame codec operations
//!
//! These tests validate that decoded frame bodies are split off the read
//! buffer rather than copied, and that the codec handles incremental reads.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use yar_protocol::core::header::{WireHeader, HEADER_SIZE};
use yar_protocol::{Frame, FrameCodec};

fn encoded(body: &[u8]) -> BytesMut {
    let mut buf = BytesMut::new();
    FrameCodec::new()
        .encode(
            Frame::new(WireHeader::for_response(1, 0), Bytes::copy_from_slice(body)),
            &mut buf,
        )
        .unwrap();
    buf
}

#[test]
fn test_decoded_body_shares_read_buffer() {
    let mut codec = FrameCodec::new();
    let mut buffer = encoded(&[1, 2, 3, 4, 5]);
    let body_ptr = buffer[HEADER_SIZE..].as_ptr();

    let frame = codec.decode(&mut buffer).unwrap().expect("frame");

    assert_eq!(frame.body.as_ref(), &[1, 2, 3, 4, 5]);
    // The body is a view into the original allocation.
    assert_eq!(frame.body.as_ptr(), body_ptr);
    assert!(buffer.is_empty());
}

#[test]
fn test_partial_decode_preserves_buffer() {
    let mut codec = FrameCodec::new();
    let full = encoded(b"payload");
    let mut buffer = BytesMut::from(&full[..HEADER_SIZE + 3]);

    assert!(codec.decode(&mut buffer).unwrap().is_none());
    assert_eq!(buffer.len(), HEADER_SIZE + 3);
}

#[test]
fn test_partial_decode_reserves_remaining_frame() {
    let mut codec = FrameCodec::new();
    let full = encoded(&[0xAA; 4096]);
    let mut buffer = BytesMut::from(&full[..HEADER_SIZE]);

    assert!(codec.decode(&mut buffer).unwrap().is_none());
    assert!(buffer.capacity() >= HEADER_SIZE + 4096);
}

#[test]
fn test_encode_writes_exact_length() {
    let mut codec = FrameCodec::new();
    let mut buffer = BytesMut::new();
    codec
        .encode(Frame::new(WireHeader::default(), vec![7u8; 100]), &mut buffer)
        .unwrap();

    assert_eq!(buffer.len(), HEADER_SIZE + 100);
}

#[test]
fn test_buffer_reuse_across_frames() {
    let mut codec = FrameCodec::new();
    let mut buffer = BytesMut::with_capacity(1024);

    for i in 0..10u8 {
        codec
            .encode(Frame::new(WireHeader::default(), vec![i; 10]), &mut buffer)
            .unwrap();
    }
    assert_eq!(buffer.len(), 10 * (HEADER_SIZE + 10));

    for i in 0..10u8 {
        let frame = codec.decode(&mut buffer).unwrap().expect("frame");
        assert_eq!(frame.body.as_ref(), &[i; 10]);
    }
    assert!(buffer.is_empty());
}

#[test]
fn test_incremental_buffer_fill() {
    let mut codec = FrameCodec::new();
    let full = encoded(b"slow network");
    let mut buffer = BytesMut::new();

    for (i, byte) in full.iter().enumerate() {
        buffer.extend_from_slice(&[*byte]);
        let decoded = codec.decode(&mut buffer).unwrap();
        if i + 1 < full.len() {
            assert!(decoded.is_none(), "decoded early at byte {i}");
        } else {
            assert_eq!(decoded.expect("frame").body.as_ref(), b"slow network");
        }
    }
}

#[test]
fn test_large_body_decodes_without_growth() {
    let mut codec = FrameCodec::new();
    let mut buffer = encoded(&vec![0xFF; 1024 * 1024]);
    let capacity = buffer.capacity();

    let frame = codec.decode(&mut buffer).unwrap().expect("frame");
    assert_eq!(frame.body.len(), 1024 * 1024);
    assert!(buffer.capacity() <= capacity);
}

#[test]
fn test_body_clones_share_storage() {
    let mut codec = FrameCodec::new();
    let mut buffer = encoded(b"shared");
    let frame = codec.decode(&mut buffer).unwrap().expect("frame");

    let copy = frame.clone();
    assert_eq!(copy.body.as_ptr(), frame.body.as_ptr());
    assert_eq!(copy, frame);
}
