use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{error, info};

use crate::error::ApiError;

/// Outbound send request: either free text or a pre-approved content
/// template with variables. Mirrors the site's `/api/whatsapp/send` JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SendBody {
    Text {
        to: String,
        body: String,
    },
    #[serde(rename_all = "camelCase")]
    Template {
        to: String,
        content_sid: String,
        #[serde(default)]
        content_variables: Option<ContentVariables>,
    },
}

/// Twilio accepts content variables either as a pre-encoded JSON string or as
/// a flat map; both arrive here.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentVariables {
    Json(String),
    Map(HashMap<String, String>),
}

impl ContentVariables {
    pub fn into_json(self) -> String {
        match self {
            ContentVariables::Json(raw) => raw,
            ContentVariables::Map(map) => {
                serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
            }
        }
    }
}

impl SendBody {
    pub fn to(&self) -> &str {
        match self {
            SendBody::Text { to, .. } | SendBody::Template { to, .. } => to,
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let to = self.to();
        if !to.starts_with("whatsapp:") {
            return Err(ApiError::validation_with_details(
                "Invalid request body",
                serde_json::json!({"to": ["must start with \"whatsapp:\""]}),
            ));
        }
        match self {
            SendBody::Text { body, .. } if body.is_empty() => Err(ApiError::validation_with_details(
                "Invalid request body",
                serde_json::json!({"body": ["must not be empty"]}),
            )),
            SendBody::Template { content_sid, .. } if content_sid.is_empty() => {
                Err(ApiError::validation_with_details(
                    "Invalid request body",
                    serde_json::json!({"contentSid": ["must not be empty"]}),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

/// Masks an address for logs: keeps the transport prefix and last 4 digits.
pub fn mask_phone(value: &str) -> String {
    let (prefix, rest) = match value.strip_prefix("whatsapp:") {
        Some(rest) => ("whatsapp:", rest),
        None => ("", value),
    };
    let last4: String = rest
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{prefix}***{last4}")
}

/// Creates one message through the Twilio REST API and returns its sid.
///
/// Provider failures surface only the non-sensitive error code/message;
/// credentials never appear in errors or logs.
pub async fn send_whatsapp_message(
    client: &Client,
    api_base_url: &str,
    account_sid: &str,
    auth_token: &str,
    from: &str,
    request: SendBody,
    request_id: &str,
) -> Result<String, ApiError> {
    let url = format!("{api_base_url}/2010-04-01/Accounts/{account_sid}/Messages.json");

    let mut form: Vec<(&str, String)> = vec![("From", from.to_string())];
    match request {
        SendBody::Text { to, body } => {
            info!(
                request_id,
                to = %mask_phone(&to),
                body_length = body.len(),
                "whatsapp send start (text)"
            );
            form.push(("To", to));
            form.push(("Body", body));
        }
        SendBody::Template {
            to,
            content_sid,
            content_variables,
        } => {
            info!(
                request_id,
                to = %mask_phone(&to),
                content_sid = %content_sid,
                "whatsapp send start (template)"
            );
            form.push(("To", to));
            form.push(("ContentSid", content_sid));
            form.push((
                "ContentVariables",
                content_variables
                    .map(ContentVariables::into_json)
                    .unwrap_or_else(|| "{}".to_string()),
            ));
        }
    }

    let resp = client
        .post(&url)
        .basic_auth(account_sid, Some(auth_token))
        .form(&form)
        .send()
        .await
        .map_err(|err| {
            error!(request_id, "whatsapp send request failed: {err}");
            ApiError::Upstream {
                code: None,
                message: "Failed to send WhatsApp message via Twilio".to_string(),
            }
        })?;

    if resp.status().is_success() {
        let message: MessageResource = resp.json().await.map_err(|err| {
            error!(request_id, "whatsapp send response unreadable: {err}");
            ApiError::Upstream {
                code: None,
                message: "Failed to send WhatsApp message via Twilio".to_string(),
            }
        })?;
        info!(request_id, sid = %message.sid, "whatsapp send success");
        return Ok(message.sid);
    }

    let status = resp.status();
    let detail: TwilioErrorBody = resp.json().await.unwrap_or(TwilioErrorBody {
        code: None,
        message: None,
    });
    error!(
        request_id,
        status = %status,
        code = ?detail.code,
        message = ?detail.message,
        "whatsapp send failed"
    );
    Err(ApiError::Upstream {
        code: detail.code,
        message: detail
            .message
            .unwrap_or_else(|| "Failed to send WhatsApp message via Twilio".to_string()),
    })
}
