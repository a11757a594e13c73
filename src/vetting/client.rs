//! HTTP client for the carrier vetting backend.
//!
//! One call: post a DOT number, get back an opaque JSON report. A
//! non-success status is surfaced with the backend's `detail` message when
//! it sent one. No retries.

use crate::config::ApiConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest error body echoed back to the user.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Request body for both vetting routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotRequest {
    pub dot_number: String,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub mock: bool,
}

/// A vetting report as returned by the backend, plus when it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VettingReport {
    pub dot_number: String,
    pub fetched_at: DateTime<Utc>,
    pub body: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum VettingError {
    #[error("invalid DOT number: {0}")]
    InvalidDot(String),
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("vetting failed with HTTP {status}")]
    Status { status: u16, detail: Option<String> },
    #[error("invalid response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl VettingError {
    /// Short text for a user-facing alert.
    pub fn alert_message(&self) -> String {
        match self {
            Self::InvalidDot(reason) => format!("Please enter a valid DOT number ({reason})."),
            Self::Network(_) => "Could not reach the vetting service. Please try again.".into(),
            Self::Status {
                detail: Some(detail),
                ..
            } => format!("Error fetching carrier data: {detail}"),
            Self::Status { status, .. } => format!("Error fetching carrier data (HTTP {status})."),
            Self::Decode(_) => "The vetting service returned an unreadable report.".into(),
        }
    }
}

/// Trim and check a user-entered DOT number.
pub fn normalize_dot(input: &str) -> Result<String, VettingError> {
    let dot = input.trim();
    if dot.is_empty() {
        return Err(VettingError::InvalidDot("empty".into()));
    }
    if !dot.chars().all(|c| c.is_ascii_digit()) {
        return Err(VettingError::InvalidDot("digits only".into()));
    }
    Ok(dot.to_string())
}

pub struct VettingClient {
    config: ApiConfig,
    http: reqwest::Client,
}

impl VettingClient {
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn endpoint_url(&self) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.endpoint.path()
        )
    }

    pub fn request_for(&self, dot_number: &str) -> DotRequest {
        DotRequest {
            dot_number: dot_number.to_string(),
            tenant_id: self.config.tenant_id.clone(),
            user_id: self.config.user_id.clone(),
            mock: self.config.mock,
        }
    }

    /// Look up a carrier. `bearer` is the session token, when logged in.
    pub async fn vet(
        &self,
        dot_input: &str,
        bearer: Option<&str>,
    ) -> Result<VettingReport, VettingError> {
        let dot_number = normalize_dot(dot_input)?;
        let url = self.endpoint_url();

        let mut req = self.http.post(&url).json(&self.request_for(&dot_number));
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }

        tracing::debug!(%url, dot = %dot_number, "Requesting carrier report");
        let res = req.send().await.map_err(VettingError::Network)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let detail = error_detail(&text);
            tracing::warn!(status = status.as_u16(), dot = %dot_number, "Vetting request failed");
            return Err(VettingError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body: serde_json::Value = res.json().await.map_err(VettingError::Decode)?;
        Ok(VettingReport {
            dot_number,
            fetched_at: Utc::now(),
            body,
        })
    }
}

/// Pull a readable message out of an error body: the `detail` field of a
/// JSON error, or the (truncated) raw text.
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        match value.get("detail") {
            Some(serde_json::Value::String(s)) => return Some(s.clone()),
            Some(other) => return Some(other.to_string()),
            None => {}
        }
    }
    Some(trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect())
}
