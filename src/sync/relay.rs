//! Background relay: runtime bus → shared auth store.
//!
//! The relay is the only writer of the auth keys. A message carrying a
//! non-empty token writes the token/email pair; anything else removes both
//! keys. Applying the same message twice leaves the store as applying it
//! once, so redelivery is harmless.

use super::bus::BusListener;
use super::protocol::{RuntimeMessage, SyncMessage};
use crate::auth::{AuthStore, StorageMap, AUTH_KEYS, AUTH_TOKEN_KEY, USER_EMAIL_KEY};
use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What the relay did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    /// Token/email written.
    Stored,
    /// Both auth keys removed.
    Cleared,
    /// Not an auth message, or not parseable.
    Ignored,
}

pub struct BackgroundRelay {
    store: Arc<dyn AuthStore>,
}

impl BackgroundRelay {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Mirror one sync message into the store.
    pub async fn apply(&self, msg: &SyncMessage) -> Result<RelayAction> {
        let Some(token) = msg.token.as_deref().filter(|t| !t.is_empty()) else {
            self.store.remove(&AUTH_KEYS).await?;
            return Ok(RelayAction::Cleared);
        };

        match msg.email.as_deref() {
            Some(email) => {
                self.store
                    .set(StorageMap::from([
                        (AUTH_TOKEN_KEY.to_string(), token.to_string()),
                        (USER_EMAIL_KEY.to_string(), email.to_string()),
                    ]))
                    .await?;
            }
            None => {
                // Drop a previous user's email in the same write as the new token.
                self.store
                    .update(
                        StorageMap::from([(AUTH_TOKEN_KEY.to_string(), token.to_string())]),
                        &[USER_EMAIL_KEY],
                    )
                    .await?;
            }
        }
        Ok(RelayAction::Stored)
    }

    /// Handle one raw bus message.
    pub async fn handle_message(&self, json: &str) -> Result<RelayAction> {
        let msg = match RuntimeMessage::from_json(json) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("BackgroundRelay: failed to parse message: {e}");
                return Ok(RelayAction::Ignored);
            }
        };

        match msg {
            RuntimeMessage::AuthSync(sync) => self.apply(&sync).await,
            RuntimeMessage::Unknown => Ok(RelayAction::Ignored),
        }
    }

    /// Drain the bus until every sender is gone or `shutdown` fires.
    pub async fn run(self, mut listener: BusListener, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                msg = listener.recv() => {
                    let Some(json) = msg else {
                        tracing::debug!("Runtime bus closed; relay stopping");
                        break;
                    };
                    match self.handle_message(&json).await {
                        Ok(action) => tracing::debug!(?action, store = self.store.name(), "Relayed auth sync"),
                        Err(e) => tracing::warn!("Failed to mirror auth state: {e:#}"),
                    }
                }
                () = shutdown.cancelled() => {
                    tracing::debug!("Background relay stopped");
                    break;
                }
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
