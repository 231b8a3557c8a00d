use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical record of one received WhatsApp message. Built once per verified
/// webhook call, broadcast, then dropped; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_sid: String,
    pub from: String,
    pub to: String,
    pub body: String,
    /// Twilio sends this as a string number ("0", "1", ...).
    pub num_media: Option<String>,
    pub received_at: DateTime<Utc>,
    /// Raw decoded form params, retained for forwarding/debugging.
    pub params: HashMap<String, String>,
}

/// Server→client frames on the live-update channel.
///
/// `Unknown` absorbs unrecognized discriminators so future event types do not
/// break older parsers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "ws:open", rename_all = "camelCase")]
    Hello { at: String, connected_peers: usize },

    #[serde(rename = "incoming", rename_all = "camelCase")]
    Incoming {
        received_at: String,
        message_sid: String,
        from: String,
        to: String,
        body: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        num_media: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        params: Option<HashMap<String, String>>,
    },

    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    pub fn hello(connected_peers: usize) -> Self {
        ServerEvent::Hello {
            at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            connected_peers,
        }
    }

    pub fn incoming(msg: &InboundMessage) -> Self {
        ServerEvent::Incoming {
            received_at: msg
                .received_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            message_sid: msg.message_sid.clone(),
            from: msg.from.clone(),
            to: msg.to.clone(),
            body: msg.body.clone(),
            num_media: msg.num_media.clone(),
            params: if msg.params.is_empty() {
                None
            } else {
                Some(msg.params.clone())
            },
        }
    }
}
