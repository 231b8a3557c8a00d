use chrono::{TimeZone, Utc};
use clinic_relay::types::{InboundMessage, ServerEvent};
use std::collections::HashMap;

fn sample_message() -> InboundMessage {
    let mut params = HashMap::new();
    params.insert("From".to_string(), "whatsapp:+15551234567".to_string());
    InboundMessage {
        message_sid: "SM123".to_string(),
        from: "whatsapp:+15551234567".to_string(),
        to: "whatsapp:+14155238886".to_string(),
        body: "Hello".to_string(),
        num_media: Some("0".to_string()),
        received_at: Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap(),
        params,
    }
}

#[test]
fn test_hello_serialization() {
    let event = ServerEvent::hello(3);
    let json = serde_json::to_string(&event).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["type"], "ws:open");
    assert_eq!(parsed["connectedPeers"], 3);
    assert!(parsed["at"].as_str().unwrap().ends_with('Z'));
}

#[test]
fn test_incoming_serialization_camel_case() {
    let event = ServerEvent::incoming(&sample_message());
    let parsed: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
    assert_eq!(parsed["type"], "incoming");
    assert_eq!(parsed["messageSid"], "SM123");
    assert_eq!(parsed["from"], "whatsapp:+15551234567");
    assert_eq!(parsed["to"], "whatsapp:+14155238886");
    assert_eq!(parsed["body"], "Hello");
    assert_eq!(parsed["numMedia"], "0");
    assert_eq!(parsed["receivedAt"], "2026-08-07T12:00:00.000Z");
    assert_eq!(parsed["params"]["From"], "whatsapp:+15551234567");
}

#[test]
fn test_incoming_omits_absent_fields() {
    let mut msg = sample_message();
    msg.num_media = None;
    msg.params.clear();
    let parsed: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&ServerEvent::incoming(&msg)).unwrap())
            .unwrap();
    assert!(parsed.get("numMedia").is_none());
    assert!(parsed.get("params").is_none());
}

#[test]
fn test_unknown_discriminator_roundtrips_to_unknown() {
    let event: ServerEvent =
        serde_json::from_str(r#"{"type":"presence","status":"connected"}"#).unwrap();
    assert!(matches!(event, ServerEvent::Unknown));
}

#[test]
fn test_hello_deserialization() {
    let event: ServerEvent =
        serde_json::from_str(r#"{"type":"ws:open","at":"2026-08-07T12:00:00.000Z","connectedPeers":1}"#)
            .unwrap();
    match event {
        ServerEvent::Hello {
            at,
            connected_peers,
        } => {
            assert_eq!(at, "2026-08-07T12:00:00.000Z");
            assert_eq!(connected_peers, 1);
        }
        _ => panic!("wrong variant"),
    }
}

#[test]
fn test_incoming_deserialization() {
    let json = r#"{"type":"incoming","receivedAt":"2026-08-07T12:00:00.000Z","messageSid":"SM9","from":"a","to":"b","body":"hi"}"#;
    let event: ServerEvent = serde_json::from_str(json).unwrap();
    match event {
        ServerEvent::Incoming {
            message_sid,
            num_media,
            params,
            ..
        } => {
            assert_eq!(message_sid, "SM9");
            assert!(num_media.is_none());
            assert!(params.is_none());
        }
        _ => panic!("wrong variant"),
    }
}

#[test]
fn test_inbound_message_clone_and_debug() {
    let msg = sample_message();
    let copy = msg.clone();
    assert_eq!(copy.message_sid, msg.message_sid);
    assert!(format!("{msg:?}").contains("SM123"));
}
