//! Property-based tests using proptest
//!
//! These tests validate framing, sequencing and packager invariants across a
//! wide range of randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use proptest::prelude::*;
use serde_json::json;
use tokio::io::{duplex, split};
use tokio_util::codec::{Decoder, Encoder};
use yar_protocol::core::header::{WireHeader, BODY_LENGTH_OFFSET, MAX_BODY_SIZE};
use yar_protocol::error::ProtocolError;
use yar_protocol::packager::{lookup_key, PackagerRegistry};
use yar_protocol::protocol::envelope::RequestEnvelope;
use yar_protocol::protocol::message::{Message, HEADER_PACKAGER};
use yar_protocol::transport::SocketWriter;
use yar_protocol::{Frame, FrameCodec, ServerCodec};

fn header_with_length(body_length: u32) -> WireHeader {
    let mut header = WireHeader::for_response(0, 0);
    header.body_length = body_length;
    header
}

// Property: any body within the limit survives encode + decode unchanged
proptest! {
    #[test]
    fn prop_frame_body_preserved(body in prop::collection::vec(any::<u8>(), 0..8192), id in any::<i32>()) {
        let mut codec = FrameCodec::new();
        let mut header = WireHeader::for_response(0, 0);
        header.transaction_id = id;
        let mut buf = BytesMut::new();
        codec.encode(Frame::new(header, body.clone()), &mut buf).unwrap();

        let frame = codec.decode(&mut buf).unwrap().expect("complete frame");
        prop_assert_eq!(frame.body.as_ref(), body.as_slice());
        prop_assert_eq!(frame.header.transaction_id, id);
        prop_assert_eq!(frame.header.body_length as usize, body.len() + 8);
        prop_assert!(buf.is_empty());
    }
}

// Property: body lengths below the fixed offset are always rejected
proptest! {
    #[test]
    fn prop_body_length_below_offset_rejected(body_length in 0u32..BODY_LENGTH_OFFSET) {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        header_with_length(body_length).write_to(&mut buf);

        let rejected = matches!(codec.decode(&mut buf), Err(ProtocolError::InvalidBodyLength(_)));
        prop_assert!(rejected);
    }
}

// Property: declared bodies above the limit are rejected from the header alone
proptest! {
    #[test]
    fn prop_oversized_rejected_without_body(excess in 1u32..1_000_000) {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        header_with_length(BODY_LENGTH_OFFSET + MAX_BODY_SIZE as u32 + excess).write_to(&mut buf);

        let rejected = matches!(codec.decode(&mut buf), Err(ProtocolError::OversizedBody(_)));
        prop_assert!(rejected);
    }
}

// Property: a stream of frames decodes regardless of how it is chunked
proptest! {
    #[test]
    fn prop_chunking_does_not_matter(
        bodies in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..256), 1..8),
        chunk in 1usize..128,
    ) {
        let mut encoder = FrameCodec::new();
        let mut wire = BytesMut::new();
        for body in &bodies {
            encoder.encode(Frame::new(WireHeader::default(), body.clone()), &mut wire).unwrap();
        }

        let mut decoder = FrameCodec::new();
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buf.extend_from_slice(piece);
            while let Some(frame) = decoder.decode(&mut buf).unwrap() {
                decoded.push(frame.body.to_vec());
            }
        }
        prop_assert_eq!(decoded, bodies);
    }
}

// Property: dispatch ids are distinct and strictly increasing whatever the client sends
proptest! {
    #[test]
    fn prop_dispatch_ids_distinct(client_ids in prop::collection::vec(any::<i64>(), 1..64)) {
        let (_client, server) = duplex(1024);
        let (_, server_write) = split(server);
        let mut codec = ServerCodec::new(
            SocketWriter::new(server_write),
            Arc::new(PackagerRegistry::with_defaults()),
        );

        let mut seen = HashSet::new();
        let mut last = 0u64;
        for client_id in &client_ids {
            let mut header = HashMap::new();
            header.insert(HEADER_PACKAGER.to_string(), "msgpack".to_string());
            let body = RequestEnvelope::encode(*client_id, "m", &json!([])).unwrap();
            let mut msg = Message::request(header, Bytes::from(body));
            codec.read_header(&mut msg).unwrap();

            let id: u64 = msg.id.parse().unwrap();
            prop_assert!(id > last);
            prop_assert!(seen.insert(id));
            last = id;
        }
        prop_assert_eq!(seen.len(), client_ids.len());
    }
}

// Property: packager lookup ignores case and everything after four bytes
proptest! {
    #[test]
    fn prop_lookup_key_case_insensitive(prefix in "[mM][sS][gG][pP]|[jJ][sS][oO][nN]", suffix in "[a-zA-Z]{0,4}") {
        let name = format!("{prefix}{suffix}");
        let registry = PackagerRegistry::with_defaults();

        prop_assert_eq!(lookup_key(name.as_bytes()), prefix.to_lowercase());
        prop_assert!(registry.resolve(name.as_bytes()).is_ok());
    }
}

// Property: msgpack and JSON packagers round trip string maps
proptest! {
    #[test]
    fn prop_packager_roundtrip(map in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..16)) {
        let registry = PackagerRegistry::with_defaults();
        for name in ["msgpack", "json"] {
            let packager = registry.resolve(name.as_bytes()).unwrap();
            let encoded = packager.pack(&map).unwrap();
            let mut decoded: BTreeMap<String, i64> = BTreeMap::new();
            packager.unpack_into(&encoded, &mut decoded).unwrap();
            prop_assert_eq!(&decoded, &map);
        }
    }
}
