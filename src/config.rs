use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub twilio: TwilioConfig,
    pub lead: LeadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Mounts the webhook test hook. Never enable in production: it signs
    /// arbitrary payloads with the real auth token.
    pub dev_routes: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            dev_routes: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    /// Sender address in provider wire format, e.g. "whatsapp:+14155238886".
    pub whatsapp_from: Option<String>,
    pub api_base_url: String,
    pub inbound_path: String,
    pub ws_path: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            whatsapp_from: None,
            api_base_url: "https://api.twilio.com".to_string(),
            inbound_path: "/api/whatsapp/incoming".to_string(),
            ws_path: "/api/whatsapp/incoming/ws".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadConfig {
    pub webhook_url: Option<String>,
    pub rate_limit_max: u32,
    pub rate_limit_window_seconds: u64,
}

impl Default for LeadConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            rate_limit_max: 10,
            rate_limit_window_seconds: 600,
        }
    }
}

impl Config {
    pub fn require_auth_token(&self) -> Result<&str, ApiError> {
        self.twilio
            .auth_token
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                ApiError::Configuration("Twilio is not configured. Set TWILIO_AUTH_TOKEN.".into())
            })
    }

    pub fn require_account_sid(&self) -> Result<&str, ApiError> {
        self.twilio
            .account_sid
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                ApiError::Configuration("Twilio is not configured. Set TWILIO_ACCOUNT_SID.".into())
            })
    }

    pub fn require_whatsapp_from(&self) -> Result<&str, ApiError> {
        self.twilio
            .whatsapp_from
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                ApiError::Configuration(
                    "Twilio WhatsApp sender is not configured. Set TWILIO_WHATSAPP_FROM.".into(),
                )
            })
    }

    pub fn require_lead_webhook_url(&self) -> Result<&str, ApiError> {
        self.lead
            .webhook_url
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                ApiError::Configuration(
                    "Lead forwarding is not configured. Set LEAD_WEBHOOK_URL.".into(),
                )
            })
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn resolve_config_path() -> PathBuf {
    env::var("CLINIC_RELAY_CONFIG")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| expand_tilde("~/.clinic-relay/clinic-relay.json"))
}

pub fn load_config() -> Config {
    let config_path = resolve_config_path();

    let mut cfg = Config::default();

    if config_path.exists() {
        if let Ok(raw) = fs::read_to_string(&config_path) {
            if let Ok(file_cfg) = serde_json::from_str::<Config>(&raw) {
                cfg = file_cfg;
            }
        }
    }

    // Override from environment
    if let Ok(sid) = env::var("TWILIO_ACCOUNT_SID") {
        if !sid.trim().is_empty() {
            cfg.twilio.account_sid = Some(sid);
        }
    }

    if let Ok(token) = env::var("TWILIO_AUTH_TOKEN") {
        if !token.trim().is_empty() {
            cfg.twilio.auth_token = Some(token);
        }
    }

    if let Ok(from) = env::var("TWILIO_WHATSAPP_FROM") {
        if !from.trim().is_empty() {
            cfg.twilio.whatsapp_from = Some(from);
        }
    }

    if let Ok(url) = env::var("LEAD_WEBHOOK_URL") {
        if !url.trim().is_empty() {
            cfg.lead.webhook_url = Some(url);
        }
    }

    if let Ok(port) = env::var("CLINIC_RELAY_PORT") {
        if let Ok(port) = port.trim().parse::<u16>() {
            cfg.server.port = port;
        }
    }

    cfg
}
