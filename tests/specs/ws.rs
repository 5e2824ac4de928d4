// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket gateway contract over a real socket.

use super::prelude::*;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio_tungstenite::tungstenite::Message;
use tower_core::LogStream;

fn solo_catalog() -> Catalog {
    Catalog::from_descriptors([(server_name("solo"), descriptor("sleep", &["3600"], 0))])
        .expect("catalog")
}

async fn serve(fleet: &Fleet) -> SocketAddr {
    let app = fleet.app(10_000, 60_000);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });
    addr
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(addr: SocketAddr) -> WsStream {
    let (stream, _response) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await.expect("connect");
    stream
}

async fn next_json(stream: &mut WsStream) -> serde_json::Value {
    let deadline = Duration::from_secs(10);
    loop {
        let message = tokio::time::timeout(deadline, stream.next())
            .await
            .expect("frame before timeout")
            .expect("stream open")
            .expect("frame");
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).expect("json"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn connected_frame_arrives_first() {
    let fleet = fleet(solo_catalog(), fast_tuning());
    let addr = serve(&fleet).await;
    let mut stream = connect(addr).await;

    let frame = next_json(&mut stream).await;
    assert_eq!(frame["type"], "connected");
    assert!(frame["subscriptionId"].as_str().expect("id").starts_with("sub-"));
    assert!(frame["serverTimeMs"].as_u64().expect("time") > 0);

    fleet.cancel.cancel();
}

#[tokio::test]
async fn ping_gets_pong_and_unknown_types_get_errors() {
    let fleet = fleet(solo_catalog(), fast_tuning());
    let addr = serve(&fleet).await;
    let mut stream = connect(addr).await;
    next_json(&mut stream).await; // connected

    stream
        .send(Message::Text(r#"{"type":"PING"}"#.into()))
        .await
        .expect("send ping");
    let frame = next_json(&mut stream).await;
    assert_eq!(frame["type"], "PONG");
    assert!(frame["at"].as_u64().expect("at") > 0);

    // Unknown frames are answered, not fatal.
    stream
        .send(Message::Text(r#"{"type":"NONSENSE"}"#.into()))
        .await
        .expect("send nonsense");
    let frame = next_json(&mut stream).await;
    assert_eq!(frame["type"], "ERROR");
    assert_eq!(frame["reason"], "unknown_type");

    // Still open: ping again.
    stream.send(Message::Text(r#"{"type":"PING"}"#.into())).await.expect("send ping");
    assert_eq!(next_json(&mut stream).await["type"], "PONG");

    fleet.cancel.cancel();
}

#[tokio::test]
async fn subscribe_switches_channels_to_logs() {
    let fleet = fleet(solo_catalog(), fast_tuning());
    let addr = serve(&fleet).await;
    let mut stream = connect(addr).await;
    next_json(&mut stream).await; // connected

    stream
        .send(Message::Text(r#"{"type":"SUBSCRIBE","channels":["logs"]}"#.into()))
        .await
        .expect("subscribe");
    // Round-trip a PING so the SUBSCRIBE is definitely applied.
    stream.send(Message::Text(r#"{"type":"PING"}"#.into())).await.expect("ping");
    assert_eq!(next_json(&mut stream).await["type"], "PONG");

    fleet
        .hub
        .publish(Event::Log {
            name: server_name("solo"),
            stream: LogStream::Stdout,
            message: "hello".to_string(),
            at: 1,
        })
        .await;

    let frame = next_json(&mut stream).await;
    assert_eq!(frame["type"], "server.log");
    assert_eq!(frame["message"], "hello");
    assert_eq!(frame["name"], "solo");
    assert!(frame["seq"].as_u64().expect("seq") > 0);

    fleet.cancel.cancel();
}

#[tokio::test]
async fn state_events_flow_on_the_default_channels() {
    let fleet = fleet(solo_catalog(), fast_tuning());
    let addr = serve(&fleet).await;
    let mut stream = connect(addr).await;
    next_json(&mut stream).await; // connected

    fleet.orchestrator.start("solo").await.expect("start");

    // stopped→starting is the first state change on the wire.
    let frame = next_json(&mut stream).await;
    assert_eq!(frame["type"], "server.state_changed");
    assert_eq!(frame["from"], "stopped");
    assert_eq!(frame["to"], "starting");

    fleet.orchestrator.shutdown().await;
    fleet.cancel.cancel();
}

#[tokio::test]
async fn shutdown_closes_with_try_again_later() {
    let fleet = fleet(solo_catalog(), fast_tuning());
    let addr = serve(&fleet).await;
    let mut stream = connect(addr).await;
    next_json(&mut stream).await; // connected

    fleet.cancel.cancel();

    let deadline = Duration::from_secs(10);
    loop {
        let message = tokio::time::timeout(deadline, stream.next())
            .await
            .expect("close before timeout");
        match message {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(u16::from(frame.code), 1013);
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => break,
        }
    }
}
