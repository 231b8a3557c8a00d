//! Twilio webhook signature scheme (`X-Twilio-Signature`).
//!
//! Twilio signs the public webhook URL concatenated with every form parameter
//! name and value, the names sorted byte-wise ascending, with no separators.
//! The digest is HMAC-SHA1 keyed with the account auth token, base64-encoded.
//! The signature covers the *decoded* parameter values, not the raw
//! form-urlencoded body.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use tracing::warn;

type HmacSha1 = Hmac<Sha1>;

/// Computes the reference signature for `url` and `params`.
///
/// Also used by the dev test hook to sign synthetic webhook requests.
pub fn compute_signature(auth_token: &str, url: &str, params: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();

    let mut data = String::from(url);
    for key in keys {
        data.push_str(key);
        data.push_str(&params[key]);
    }

    let mut mac = match HmacSha1::new_from_slice(auth_token.as_bytes()) {
        Ok(mac) => mac,
        Err(err) => {
            // HMAC accepts keys of any length, so this is unreachable in
            // practice; an empty signature fails verification either way.
            warn!("failed to key signature hmac: {err}");
            return String::new();
        }
    };
    mac.update(data.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verifies a webhook signature header against the reconstructed public URL
/// and the decoded form parameters. Comparison is constant-time.
pub fn verify(
    auth_token: &str,
    signature_header: &str,
    url: &str,
    params: &HashMap<String, String>,
) -> bool {
    let expected = compute_signature(auth_token, url, params);
    if expected.is_empty() {
        return false;
    }
    expected
        .as_bytes()
        .ct_eq(signature_header.as_bytes())
        .into()
}
