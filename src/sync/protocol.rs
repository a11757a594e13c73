//! Runtime message types.
//!
//! Messages cross the runtime bus as JSON text, the same shape the page
//! context would post: `{"kind": "AUTH_SYNC", "token": ..., "email": ...}`.
//! Absent fields are omitted rather than sent as `null`.

use serde::{Deserialize, Serialize};

/// Token/email pair observed in page storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl SyncMessage {
    pub fn login(token: impl Into<String>, email: Option<String>) -> Self {
        Self {
            token: Some(token.into()),
            email,
        }
    }

    /// A message carrying no token: downstream clears its auth state.
    pub fn logout() -> Self {
        Self::default()
    }
}

/// Everything that can travel over the runtime bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RuntimeMessage {
    #[serde(rename = "AUTH_SYNC")]
    AuthSync(SyncMessage),
    /// Any kind this build does not handle.
    #[serde(other)]
    Unknown,
}

impl RuntimeMessage {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_sync_wire_shape() {
        let msg = RuntimeMessage::AuthSync(SyncMessage::login("abc123", Some("a@b.com".into())));
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"kind": "AUTH_SYNC", "token": "abc123", "email": "a@b.com"})
        );
    }

    #[test]
    fn logout_omits_fields() {
        let json = RuntimeMessage::AuthSync(SyncMessage::logout())
            .to_json()
            .unwrap();
        assert_eq!(json, r#"{"kind":"AUTH_SYNC"}"#);
    }

    #[test]
    fn parses_null_fields_as_absent() {
        let msg = RuntimeMessage::from_json(r#"{"kind":"AUTH_SYNC","token":null,"email":null}"#)
            .unwrap();
        assert_eq!(msg, RuntimeMessage::AuthSync(SyncMessage::logout()));
    }

    #[test]
    fn unknown_kind_is_tolerated() {
        let msg = RuntimeMessage::from_json(r#"{"kind":"OPEN_PANEL","tab":3}"#).unwrap();
        assert_eq!(msg, RuntimeMessage::Unknown);
    }

    #[test]
    fn missing_kind_is_an_error() {
        assert!(RuntimeMessage::from_json(r#"{"token":"abc"}"#).is_err());
    }
}
