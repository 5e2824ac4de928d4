// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tower_core::Channel;

#[test]
fn subscribe_frame_parses() {
    let frame: ClientFrame =
        serde_json::from_str(r#"{"type":"SUBSCRIBE","channels":["servers","logs"]}"#).unwrap();
    assert_eq!(
        frame,
        ClientFrame::Subscribe { channels: vec![Channel::Servers, Channel::Logs] }
    );
}

#[test]
fn ping_frame_parses() {
    let frame: ClientFrame = serde_json::from_str(r#"{"type":"PING"}"#).unwrap();
    assert_eq!(frame, ClientFrame::Ping);
}

#[test]
fn unknown_type_fails_to_parse() {
    assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"NONSENSE"}"#).is_err());
    assert!(serde_json::from_str::<ClientFrame>(r#"{"hello":"world"}"#).is_err());
}

#[test]
fn connected_frame_uses_camel_case() {
    let frame = ServerFrame::Connected {
        subscription_id: tower_core::SubscriptionId::from_string("sub-1"),
        server_time_ms: 1_234,
    };
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["type"], "connected");
    assert_eq!(json["subscriptionId"], "sub-1");
    assert_eq!(json["serverTimeMs"], 1_234);
}

#[test]
fn error_frame_carries_reason() {
    let json = serde_json::to_value(ServerFrame::unknown_type()).unwrap();
    assert_eq!(json["type"], "ERROR");
    assert_eq!(json["reason"], "unknown_type");
}

#[test]
fn pong_frame_shape() {
    let json = serde_json::to_value(ServerFrame::Pong { at: 9 }).unwrap();
    assert_eq!(json["type"], "PONG");
    assert_eq!(json["at"], 9);
}
