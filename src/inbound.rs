use chrono::Utc;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;

use crate::error::ApiError;
use crate::types::InboundMessage;

/// Decodes an `application/x-www-form-urlencoded` body into a flat map.
///
/// Lenient by design: empty segments are skipped, a segment without `=` is a
/// key with an empty value, and on duplicate keys the last value wins. The
/// only rejected input is a value that decodes to invalid UTF-8.
pub fn parse_form(raw: &str) -> Result<HashMap<String, String>, ApiError> {
    let mut out = HashMap::new();
    for segment in raw.split('&') {
        if segment.is_empty() {
            continue;
        }
        let (key, value) = match segment.split_once('=') {
            Some((k, v)) => (k, v),
            None => (segment, ""),
        };
        out.insert(decode_component(key)?, decode_component(value)?);
    }
    Ok(out)
}

fn decode_component(raw: &str) -> Result<String, ApiError> {
    let plus_decoded = raw.replace('+', " ");
    percent_decode_str(&plus_decoded)
        .decode_utf8()
        .map(|cow| cow.into_owned())
        .map_err(|_| ApiError::validation("Invalid webhook payload encoding"))
}

/// Parses a raw webhook body into the canonical inbound record.
///
/// Twilio field names are extracted when present; everything it sent,
/// recognized or not, is retained in `params`. `MessageSid` falls back to
/// `SmsMessageSid` then `SmsSid`, first non-empty wins.
pub fn normalize(raw: &str) -> Result<InboundMessage, ApiError> {
    Ok(from_params(parse_form(raw)?))
}

/// Builds the canonical record from an already-decoded parameter map.
/// Total: missing fields become empty strings, never errors.
pub fn from_params(params: HashMap<String, String>) -> InboundMessage {
    let message_sid = ["MessageSid", "SmsMessageSid", "SmsSid"]
        .iter()
        .filter_map(|key| params.get(*key))
        .find(|v| !v.is_empty())
        .cloned()
        .unwrap_or_default();

    let field = |key: &str| params.get(key).cloned().unwrap_or_default();

    InboundMessage {
        message_sid,
        from: field("From"),
        to: field("To"),
        body: field("Body"),
        num_media: params.get("NumMedia").cloned(),
        received_at: Utc::now(),
        params,
    }
}
