use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::error;

use crate::error::ApiError;

/// Booking-form submission from the site.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRequest {
    pub name: String,
    pub phone: String,
    pub service: String,
    #[serde(default)]
    pub message: String,
    pub source_page: String,
    /// Honeypot field. Bots fill it; the form never does.
    #[serde(default)]
    pub hp: String,
}

/// Payload forwarded to the clinic's lead webhook.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadForward {
    pub name: String,
    pub phone: String,
    pub service: String,
    pub message: String,
    pub source_page: String,
    pub timestamp: String,
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl LeadRequest {
    /// Trims every field and enforces the form's length bounds. All
    /// violations are reported together, keyed by field.
    pub fn validate(mut self) -> Result<Self, ApiError> {
        self.name = self.name.trim().to_string();
        self.phone = self.phone.trim().to_string();
        self.service = self.service.trim().to_string();
        self.message = self.message.trim().to_string();
        self.source_page = self.source_page.trim().to_string();

        let mut field_errors: HashMap<&str, Vec<String>> = HashMap::new();
        let mut check = |field: &'static str, value: &str, min: usize, max: usize| {
            if value.len() < min {
                field_errors
                    .entry(field)
                    .or_default()
                    .push(format!("must be at least {min} characters"));
            } else if value.len() > max {
                field_errors
                    .entry(field)
                    .or_default()
                    .push(format!("must be at most {max} characters"));
            }
        };
        check("name", &self.name, 2, 80);
        check("phone", &self.phone, 6, 30);
        check("service", &self.service, 2, 80);
        check("message", &self.message, 0, 1000);
        check("sourcePage", &self.source_page, 1, 200);

        if field_errors.is_empty() {
            Ok(self)
        } else {
            Err(ApiError::validation_with_details(
                "Invalid request body",
                serde_json::json!(field_errors),
            ))
        }
    }

    pub fn is_spam(&self) -> bool {
        !self.hp.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct RateEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_seconds: u64 },
}

/// Fixed-window per-source rate limiter. Volatile, per process, like the
/// rest of the service's state.
pub struct RateLimiter {
    max: u32,
    window_seconds: u64,
    entries: Mutex<HashMap<String, RateEntry>>,
}

const SWEEP_THRESHOLD: usize = 5000;

impl RateLimiter {
    pub fn new(max: u32, window_seconds: u64) -> Self {
        Self {
            max,
            window_seconds,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn check_and_consume(&self, key: &str, now: DateTime<Utc>) -> RateDecision {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if entries.len() > SWEEP_THRESHOLD {
            entries.retain(|_, entry| entry.reset_at > now);
        }

        let window = chrono::Duration::seconds(self.window_seconds as i64);
        match entries.get_mut(key) {
            Some(entry) if now < entry.reset_at => {
                if entry.count >= self.max {
                    let retry_after_seconds =
                        (entry.reset_at - now).num_seconds().max(1) as u64;
                    return RateDecision::Limited {
                        retry_after_seconds,
                    };
                }
                entry.count += 1;
                RateDecision::Allowed {
                    remaining: self.max.saturating_sub(entry.count),
                }
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    RateEntry {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                RateDecision::Allowed {
                    remaining: self.max.saturating_sub(1),
                }
            }
        }
    }
}

/// Forwards one lead to the configured webhook. Failures map to a 502 with
/// no retry; the caller decides whether to resubmit.
pub async fn forward_lead(
    client: &Client,
    webhook_url: &str,
    payload: &LeadForward,
) -> Result<(), ApiError> {
    let resp = client
        .post(webhook_url)
        .json(payload)
        .send()
        .await
        .map_err(|err| {
            error!("lead webhook forward failed: {err}");
            ApiError::Upstream {
                code: None,
                message: "Webhook call failed".to_string(),
            }
        })?;

    if !resp.status().is_success() {
        error!(status = %resp.status(), "lead webhook forward rejected");
        return Err(ApiError::Upstream {
            code: None,
            message: "Webhook call failed".to_string(),
        });
    }
    Ok(())
}
