//! Page token watcher.
//!
//! Polls a page's local storage for the `authToken`/`userEmail` pair and
//! forwards each token transition over the runtime bus exactly once. The
//! page storage has no change event reachable from here, so this is a
//! fixed-interval poll: one check immediately, then one per interval.

use super::bus::{BusError, BusSender};
use super::protocol::{RuntimeMessage, SyncMessage};
use crate::auth::{AUTH_TOKEN_KEY, USER_EMAIL_KEY};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

// ── Page storage ────────────────────────────────────────────────

/// Read access to a page's local key-value storage.
pub trait PageStorage: Send + Sync {
    /// Read several keys from one snapshot. Absent keys are omitted.
    fn get_items(&self, keys: &[&str]) -> Result<HashMap<String, String>>;

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_items(&[key])?.remove(key))
    }
}

fn pick(items: &HashMap<String, String>, keys: &[&str]) -> HashMap<String, String> {
    keys.iter()
        .filter_map(|k| items.get(*k).map(|v| ((*k).to_string(), v.clone())))
        .collect()
}

/// In-process page storage, written by whatever plays the page.
#[derive(Default)]
pub struct MemoryPageStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryPageStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_item(&self, key: &str, value: &str) {
        self.items.lock().insert(key.to_string(), value.to_string());
    }

    pub fn remove_item(&self, key: &str) {
        self.items.lock().remove(key);
    }
}

impl PageStorage for MemoryPageStorage {
    fn get_items(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        Ok(pick(&self.items.lock(), keys))
    }
}

/// Page storage dumped as a flat JSON object, re-read on every lookup.
/// A missing file reads as empty storage.
pub struct JsonFilePageStorage {
    path: PathBuf,
}

impl JsonFilePageStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageStorage for JsonFilePageStorage {
    fn get_items(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        let items: HashMap<String, serde_json::Value> = serde_json::from_str(&raw)
            .with_context(|| format!("Page storage {} is not a JSON object", self.path.display()))?;

        // Page storage only holds strings; tolerate hand-written non-string values.
        Ok(keys
            .iter()
            .filter_map(|k| {
                let value = match items.get(*k)? {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some(((*k).to_string(), value))
            })
            .collect())
    }
}

// ── Watcher ─────────────────────────────────────────────────────

/// The token most recently handed to the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastForwarded {
    /// Nothing forwarded yet.
    Unset,
    /// A logged-out state (no token) was forwarded.
    Absent,
    /// This exact token was forwarded. May be the empty string.
    Value(String),
}

impl LastForwarded {
    fn from_token(token: Option<&str>) -> Self {
        match token {
            None => Self::Absent,
            Some(t) => Self::Value(t.to_string()),
        }
    }

    fn matches(&self, token: Option<&str>) -> bool {
        match (self, token) {
            (Self::Unset, _) => false,
            (Self::Absent, None) => true,
            (Self::Value(last), Some(t)) => last == t,
            _ => false,
        }
    }
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The token changed and the bus took the message.
    Forwarded,
    /// Same token as last forwarded.
    Unchanged,
    /// First poll found no token and initial logged-out forwarding is off.
    Suppressed,
    /// The token changed but the bus refused the message; retried next poll.
    Dropped,
}

pub struct PageTokenWatcher {
    storage: Arc<dyn PageStorage>,
    bus: BusSender,
    last: LastForwarded,
    forward_initial_absent: bool,
}

impl PageTokenWatcher {
    pub fn new(storage: Arc<dyn PageStorage>, bus: BusSender) -> Self {
        Self {
            storage,
            bus,
            last: LastForwarded::Unset,
            forward_initial_absent: true,
        }
    }

    /// Whether a first poll with no token still forwards a logout.
    pub fn with_forward_initial_absent(mut self, enabled: bool) -> Self {
        self.forward_initial_absent = enabled;
        self
    }

    pub fn last_forwarded(&self) -> &LastForwarded {
        &self.last
    }

    /// Poll page storage once and forward the pair if the token changed.
    pub fn sync_auth(&mut self) -> Result<SyncOutcome> {
        let mut items = self.storage.get_items(&[AUTH_TOKEN_KEY, USER_EMAIL_KEY])?;
        let token = items.remove(AUTH_TOKEN_KEY);
        let email = items.remove(USER_EMAIL_KEY);

        if self.last.matches(token.as_deref()) {
            return Ok(SyncOutcome::Unchanged);
        }

        if self.last == LastForwarded::Unset && token.is_none() && !self.forward_initial_absent {
            self.last = LastForwarded::Absent;
            return Ok(SyncOutcome::Suppressed);
        }

        let next = LastForwarded::from_token(token.as_deref());
        let msg = RuntimeMessage::AuthSync(SyncMessage { token, email });
        match self.bus.send(&msg) {
            Ok(()) => {
                tracing::debug!(last = ?next, "Forwarded page auth state");
                self.last = next;
                Ok(SyncOutcome::Forwarded)
            }
            Err(e @ (BusError::Closed | BusError::Full)) => {
                tracing::debug!("Auth sync message dropped: {e}");
                Ok(SyncOutcome::Dropped)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Poll until `shutdown` fires. The first poll runs immediately.
    pub async fn run(mut self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_auth() {
                        tracing::warn!("Page auth poll failed: {e:#}");
                    }
                }
                () = shutdown.cancelled() => {
                    tracing::debug!("Page token watcher stopped");
                    break;
                }
            }
        }
    }
}
