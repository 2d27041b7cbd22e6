use std::time::Duration;

use dispatch_edge::realtime::{
    PacketError,
    packet::{EnginePacket, OpenInfo, SocketPacket},
};
use serde_json::json;

#[test]
fn test_decode_engine_open() {
    let frame = r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

    let EnginePacket::Open(info) = EnginePacket::decode(frame).unwrap() else {
        panic!("expected open packet");
    };
    assert_eq!(
        info,
        OpenInfo {
            sid: "lv_VI97HAXpY6yYWAAAC".to_string(),
            upgrades: vec![],
            ping_interval: 25000,
            ping_timeout: 20000,
            max_payload: 1_000_000,
        }
    );
    assert_eq!(info.heartbeat_deadline(), Duration::from_secs(45));
}

#[test]
fn test_decode_heartbeats_and_close() {
    assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping);
    assert_eq!(EnginePacket::decode("3").unwrap(), EnginePacket::Pong);
    assert_eq!(EnginePacket::decode("1").unwrap(), EnginePacket::Close);
    assert_eq!(EnginePacket::decode("6").unwrap(), EnginePacket::Noop);
}

#[test]
fn test_decode_connect_ack_and_error() {
    assert_eq!(
        EnginePacket::decode(r#"40{"sid":"abc"}"#).unwrap(),
        EnginePacket::Message(SocketPacket::Connect(Some(json!({"sid": "abc"}))))
    );
    assert_eq!(
        EnginePacket::decode("40").unwrap(),
        EnginePacket::Message(SocketPacket::Connect(None))
    );

    let EnginePacket::Message(SocketPacket::ConnectError(payload)) =
        EnginePacket::decode(r#"44{"message":"Not authorized"}"#).unwrap()
    else {
        panic!("expected connect error");
    };
    assert_eq!(SocketPacket::error_message(&payload), "Not authorized");
}

#[test]
fn test_decode_event_with_namespace_and_ack_id() {
    let expected = SocketPacket::Event {
        name: "order_status_update".to_string(),
        args: vec![json!({"order_id": 12, "status": "picked_up"})],
    };

    let plain = r#"2["order_status_update",{"order_id":12,"status":"picked_up"}]"#;
    assert_eq!(SocketPacket::decode(plain).unwrap(), expected);

    let with_ack = r#"213["order_status_update",{"order_id":12,"status":"picked_up"}]"#;
    assert_eq!(SocketPacket::decode(with_ack).unwrap(), expected);

    let namespaced = r#"2/admin,["order_status_update",{"order_id":12,"status":"picked_up"}]"#;
    assert_eq!(SocketPacket::decode(namespaced).unwrap(), expected);
}

#[test]
fn test_decode_rejects_malformed_frames() {
    assert!(matches!(EnginePacket::decode(""), Err(PacketError::Empty)));
    assert!(matches!(
        EnginePacket::decode("9"),
        Err(PacketError::UnknownEngineType('9'))
    ));
    assert!(matches!(
        EnginePacket::decode("é"),
        Err(PacketError::UnknownEngineType('é'))
    ));
    assert!(matches!(
        EnginePacket::decode(r#"45-["upload",{"_placeholder":true,"num":0}]"#),
        Err(PacketError::Binary)
    ));
    assert!(matches!(
        EnginePacket::decode("42[]"),
        Err(PacketError::MissingEventName)
    ));
    assert!(matches!(
        EnginePacket::decode("42[7]"),
        Err(PacketError::MissingEventName)
    ));
    assert!(matches!(
        EnginePacket::decode("42[\"join\""),
        Err(PacketError::Payload(_))
    ));
}

#[test]
fn test_encode_client_handshake_frames() {
    let connect = EnginePacket::Message(SocketPacket::Connect(Some(json!({"token": "t0k"}))));
    assert_eq!(connect.encode(), r#"40{"token":"t0k"}"#);

    let join = EnginePacket::Message(SocketPacket::Event {
        name: "join".to_string(),
        args: vec![json!({"role": "courier"})],
    });
    assert_eq!(join.encode(), r#"42["join",{"role":"courier"}]"#);

    assert_eq!(EnginePacket::Pong.encode(), "3");
    assert_eq!(EnginePacket::Message(SocketPacket::Disconnect).encode(), "41");
}
