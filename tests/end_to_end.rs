#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! End-to-end tests over TCP loopback: a real `Server` answering framed
//! msgpack requests from a `Framed<TcpStream, FrameCodec>` client.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_util::codec::Framed;
use yar_protocol::config::NetworkConfig;
use yar_protocol::core::header::{WireHeader, BODY_LENGTH_OFFSET, MAGIC_NUMBER, RESPONSE_PACKAGER};
use yar_protocol::error::ProtocolError;
use yar_protocol::protocol::envelope::{RequestEnvelope, ResponseEnvelope, StatusCode};
use yar_protocol::{Frame, FrameCodec, Server};

type Client = Framed<TcpStream, FrameCodec>;

async fn start_server(config: NetworkConfig) -> (std::net::SocketAddr, oneshot::Sender<()>) {
    let server = Server::new(config);
    server.register("echo", |params| Ok(params)).unwrap();
    server
        .register("add", |params| {
            let a = params["a"].as_i64().unwrap_or_default();
            let b = params["b"].as_i64().unwrap_or_default();
            Ok(json!(a + b))
        })
        .unwrap();
    server
        .register("fail", |_| Err(ProtocolError::Custom("boom".into())))
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .serve_with_shutdown(listener, async move {
                let _ = rx.await;
            })
            .await
    });
    (addr, tx)
}

async fn connect(addr: std::net::SocketAddr) -> Client {
    Framed::new(TcpStream::connect(addr).await.unwrap(), FrameCodec::new())
}

async fn call(client: &mut Client, id: i64, method: &str, params: Value) -> (WireHeader, ResponseEnvelope) {
    let body = RequestEnvelope::encode(id, method, &params).unwrap();
    call_raw(client, id, body).await
}

async fn call_raw(client: &mut Client, id: i64, body: Vec<u8>) -> (WireHeader, ResponseEnvelope) {
    let mut header = WireHeader::default();
    header.transaction_id = id as i32;
    header.magic_number = MAGIC_NUMBER;
    header.packager_name = *b"msgpack\0";
    client.send(Frame::new(header, body)).await.unwrap();
    read_reply(client).await
}

async fn read_reply(client: &mut Client) -> (WireHeader, ResponseEnvelope) {
    let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("reply in time")
        .expect("connection open")
        .unwrap();
    let envelope = ResponseEnvelope::decode(&frame.body).unwrap();
    (frame.header, envelope)
}

#[tokio::test]
async fn test_echo_restores_client_id() {
    let (addr, _shutdown) = start_server(NetworkConfig::default()).await;
    let mut client = connect(addr).await;

    let (header, response) = call(&mut client, 42, "echo", json!(["hello"])).await;

    assert_eq!(header.transaction_id, 42);
    assert_eq!(header.magic_number, MAGIC_NUMBER);
    assert_eq!(header.packager_name, RESPONSE_PACKAGER);
    assert_eq!(response.id, 42);
    assert!(response.is_ok());
    assert_eq!(response.result, json!(["hello"]));
}

#[tokio::test]
async fn test_sequential_calls_on_one_connection() {
    let (addr, _shutdown) = start_server(NetworkConfig::default()).await;
    let mut client = connect(addr).await;

    for i in 0..10i64 {
        let (header, response) = call(&mut client, 100 + i, "add", json!({"a": i, "b": 1})).await;
        assert_eq!(header.transaction_id as i64, 100 + i);
        assert_eq!(response.id, 100 + i);
        assert_eq!(response.result, json!(i + 1));
    }
}

#[tokio::test]
async fn test_unknown_method_gets_error_reply() {
    let (addr, _shutdown) = start_server(NetworkConfig::default()).await;
    let mut client = connect(addr).await;

    let (header, response) = call(&mut client, 7, "missing", json!([])).await;
    assert_eq!(header.transaction_id, 7);
    assert_eq!(response.status, StatusCode::Request.as_i32());
    assert!(response.error["message"].contains("missing"));

    // The connection stays usable.
    let (_, response) = call(&mut client, 8, "echo", json!(1)).await;
    assert_eq!(response.result, json!(1));
}

#[tokio::test]
async fn test_handler_error_gets_error_reply() {
    let (addr, _shutdown) = start_server(NetworkConfig::default()).await;
    let mut client = connect(addr).await;

    let (_, response) = call(&mut client, 3, "fail", json!(null)).await;
    assert_eq!(response.id, 3);
    assert_eq!(response.status, StatusCode::Exception.as_i32());
}

#[tokio::test]
async fn test_unresolvable_packager_hint_gets_error_reply() {
    let config = NetworkConfig::default_with_overrides(|c| {
        c.transport.default_packager = "php".to_string();
    });
    let (addr, _shutdown) = start_server(config).await;
    let mut client = connect(addr).await;

    let (header, response) = call(&mut client, 11, "echo", json!([])).await;
    assert_eq!(header.transaction_id, 11);
    assert_eq!(response.status, StatusCode::Packager.as_i32());
}

#[tokio::test]
async fn test_malformed_envelope_is_dropped_and_connection_survives() {
    let (addr, _shutdown) = start_server(NetworkConfig::default()).await;
    let mut client = connect(addr).await;

    client
        .send(Frame::new(WireHeader::default(), vec![0xC1u8]))
        .await
        .unwrap();

    let (_, response) = call(&mut client, 5, "echo", json!("after")).await;
    assert_eq!(response.id, 5);
    assert_eq!(response.result, json!("after"));
}

#[tokio::test]
async fn test_invalid_body_length_closes_connection() {
    let (addr, _shutdown) = start_server(NetworkConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut header = WireHeader::default();
    header.body_length = BODY_LENGTH_OFFSET - 1;
    stream.write_all(&header.to_bytes()).await.unwrap();

    let mut client = Framed::new(stream, FrameCodec::new());
    let next = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("server closes in time");
    assert!(next.is_none() || matches!(next, Some(Err(_))));
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let (addr, shutdown) = start_server(NetworkConfig::default()).await;
    let mut client = connect(addr).await;
    let (_, response) = call(&mut client, 1, "echo", json!("before")).await;
    assert_eq!(response.result, json!("before"));

    shutdown.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Existing connections keep working after the acceptor stops.
    let (_, response) = call(&mut client, 2, "echo", json!("after")).await;
    assert_eq!(response.result, json!("after"));

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_json_clients_are_served() {
    let config = NetworkConfig::default_with_overrides(|c| {
        c.transport.default_packager = "json".to_string();
    });
    let (addr, _shutdown) = start_server(config).await;
    let mut client = connect(addr).await;

    let body = serde_json::to_vec(&json!({"i": 31, "m": "add", "p": {"a": 2, "b": 40}})).unwrap();
    let (header, response) = call_raw(&mut client, 31, body).await;

    assert_eq!(header.transaction_id, 31);
    assert_eq!(header.packager_name, RESPONSE_PACKAGER);
    assert!(response.is_ok());
    assert_eq!(response.result, json!(42));
}

#[tokio::test]
async fn test_integer_keyed_params_get_reply() {
    let (addr, _shutdown) = start_server(NetworkConfig::default()).await;
    let mut client = connect(addr).await;

    let envelope = rmpv::Value::Map(vec![
        (rmpv::Value::from("i"), rmpv::Value::from(77)),
        (rmpv::Value::from("m"), rmpv::Value::from("echo")),
        (
            rmpv::Value::from("p"),
            rmpv::Value::Map(vec![(rmpv::Value::from(1), rmpv::Value::from("a"))]),
        ),
    ]);
    let mut body = Vec::new();
    rmpv::encode::write_value(&mut body, &envelope).unwrap();

    let (header, response) = call_raw(&mut client, 77, body).await;
    assert_eq!(header.transaction_id, 77);
    assert_eq!(response.id, 77);
    assert_eq!(response.status, StatusCode::Packager.as_i32());

    let (_, response) = call(&mut client, 78, "echo", json!({"1": "a"})).await;
    assert_eq!(response.result, json!({"1": "a"}));
}
