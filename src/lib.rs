pub mod config;
pub mod error;
pub mod inbound;
pub mod lead;
pub mod relay;
pub mod signature;
pub mod twilio;
pub mod types;
pub mod ws;

pub use config::Config;

use self::config::load_config;
use self::error::ApiError;
use self::lead::{LeadForward, LeadRequest, RateDecision, RateLimiter};
use self::relay::PeerRegistry;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Neutral TwiML acknowledgement; Twilio only requires a 2xx but an explicit
/// empty response is unambiguous.
pub const XML_ACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub http: reqwest::Client,
    pub registry: Arc<PeerRegistry>,
    pub lead_limiter: Arc<RateLimiter>,
}

pub fn create_app() -> (AppState, Router) {
    create_app_with_config(load_config())
}

/// Composition root: the peer registry and rate limiter are constructed here
/// and live exactly as long as the service.
pub fn create_app_with_config(config: Config) -> (AppState, Router) {
    let state = AppState {
        config: config.clone(),
        http: reqwest::Client::new(),
        registry: Arc::new(PeerRegistry::new()),
        lead_limiter: Arc::new(RateLimiter::new(
            config.lead.rate_limit_max,
            config.lead.rate_limit_window_seconds,
        )),
    };

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/lead", post(lead_intake))
        .route("/api/whatsapp/send", post(send_message))
        .route("/api/whatsapp/test-incoming", post(test_incoming))
        .route(&config.twilio.inbound_path, post(whatsapp_incoming))
        .route(&config.twilio.ws_path, get(ws_handler))
        .with_state(state.clone());

    (state, app)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"connectedPeers": state.registry.count()}))
}

async fn ws_handler(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> impl IntoResponse {
    let registry = state.registry.clone();
    upgrade.on_upgrade(move |socket| ws::handle_ws(socket, registry))
}

/// Twilio webhook entry point. Hard gates, in order: signature verification
/// (403), normalization (400), then fan-out. Redelivered webhooks broadcast
/// again; subscribers tolerate duplicate sids.
async fn whatsapp_incoming(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let auth_token = state.config.require_auth_token()?;

    let signature = headers
        .get("x-twilio-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let raw = std::str::from_utf8(&body)
        .map_err(|_| ApiError::validation("Invalid webhook payload encoding"))?;
    let params = inbound::parse_form(raw)?;

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let webhook_url = public_url(&headers, path_and_query);

    if !signature::verify(auth_token, signature, &webhook_url, &params) {
        return Err(ApiError::Authentication);
    }

    let message = inbound::from_params(params);
    let delivered = state.registry.broadcast(&message);
    info!(
        message_sid = %message.message_sid,
        from = %twilio::mask_phone(&message.from),
        to = %twilio::mask_phone(&message.to),
        num_media = ?message.num_media,
        delivered,
        "whatsapp inbound received"
    );

    Ok((
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        XML_ACK,
    ))
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<twilio::SendBody>,
) -> Result<impl IntoResponse, ApiError> {
    let account_sid = state.config.require_account_sid()?;
    let auth_token = state.config.require_auth_token()?;
    let from = state.config.require_whatsapp_from()?;

    body.validate()?;

    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let sid = twilio::send_whatsapp_message(
        &state.http,
        &state.config.twilio.api_base_url,
        account_sid,
        auth_token,
        from,
        body,
        &request_id,
    )
    .await?;

    Ok(Json(json!({"ok": true, "sid": sid})))
}

async fn lead_intake(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LeadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lead = request.validate()?;

    // Honeypot hits get a friendly 200 and go nowhere.
    if lead.is_spam() {
        info!(source_page = %lead.source_page, "lead honeypot triggered (spam)");
        return Ok(Json(json!({"ok": true})));
    }

    let now = Utc::now();
    let ip = client_ip(&headers);
    if let RateDecision::Limited {
        retry_after_seconds,
    } = state.lead_limiter.check_and_consume(&ip, now)
    {
        return Err(ApiError::RateLimited {
            retry_after_seconds,
        });
    }

    let webhook_url = state.config.require_lead_webhook_url()?;

    let payload = LeadForward {
        name: lead.name,
        phone: lead.phone,
        service: lead.service,
        message: lead.message,
        source_page: lead.source_page,
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        ip,
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    lead::forward_lead(&state.http, webhook_url, &payload).await?;

    Ok(Json(json!({"ok": true})))
}

fn default_test_from() -> String {
    "whatsapp:+972500000000".to_string()
}

fn default_test_to() -> String {
    "whatsapp:+14155238886".to_string()
}

fn default_test_body() -> String {
    "Test message (local webhook test)".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestIncomingRequest {
    #[serde(default = "default_test_from")]
    from: String,
    #[serde(default = "default_test_to")]
    to: String,
    #[serde(default = "default_test_body")]
    body: String,
    #[serde(default)]
    extra: HashMap<String, String>,
    #[serde(default)]
    target_path: Option<String>,
    #[serde(default = "default_true")]
    include_response_body: bool,
}

/// Dev-only loopback: builds a Twilio-style form, signs it with the real
/// auth token, and POSTs it at this server's own webhook endpoint.
async fn test_incoming(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TestIncomingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.config.server.dev_routes {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let auth_token = state.config.require_auth_token()?;

    let mut form = HashMap::new();
    form.insert("From".to_string(), request.from);
    form.insert("To".to_string(), request.to);
    form.insert("Body".to_string(), request.body);
    for (key, value) in request.extra {
        form.insert(key, value);
    }

    let target_path = request
        .target_path
        .unwrap_or_else(|| state.config.twilio.inbound_path.clone());
    let target_url = public_url(&headers, &target_path);

    let sig = signature::compute_signature(auth_token, &target_url, &form);

    let form_pairs: Vec<(&String, &String)> = form.iter().collect();
    let resp = state
        .http
        .post(&target_url)
        .header("x-twilio-signature", &sig)
        .form(&form_pairs)
        .send()
        .await
        .map_err(|err| ApiError::Upstream {
            code: None,
            message: format!("webhook self-call failed: {err}"),
        })?;

    let response_status = resp.status().as_u16();
    let response_body = if request.include_response_body {
        Some(resp.text().await.unwrap_or_default())
    } else {
        None
    };

    Ok(Json(json!({
        "ok": (200..300).contains(&response_status),
        "request": {
            "url": target_url,
            "signature": sig,
            "form": form,
        },
        "response": {
            "status": response_status,
            "body": response_body,
        },
    }))
    .into_response())
}

/// Reconstructs the externally visible URL for this request. Twilio signs
/// against the public URL, so forwarded-proto/host from the reverse proxy
/// take precedence over what the socket saw.
pub fn public_url(headers: &HeaderMap, path_and_query: &str) -> String {
    let first_token = |value: &str| value.split(',').next().unwrap_or("").trim().to_string();

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(first_token)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "http".to_string());

    let host = headers
        .get("x-forwarded-host")
        .and_then(|v| v.to_str().ok())
        .map(first_token)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "localhost".to_string());

    format!("{scheme}://{host}{path_and_query}")
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string())
}
