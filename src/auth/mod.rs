//! Shared authentication state.
//!
//! Provides:
//! - [`AuthRecord`]: the token/email pair every context agrees on
//! - [`AuthStore`]: the shared key-value storage contract (get/set/remove/subscribe)
//! - In-memory and file-backed store implementations
//!
//! ## Layout
//! Two keys, `authToken` and `userEmail`, written together on login and
//! removed together on logout. Presence of `authToken` is the only signal
//! any UI root uses to decide whether the user is logged in.

pub mod store;

pub use store::{
    AuthStore, ChangeSet, FileAuthStore, MemoryAuthStore, Notification, StorageMap, Subscription,
    ValueChange,
};

use crate::config::StorageConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Storage key holding the session token.
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// Storage key holding the signed-in user's email.
pub const USER_EMAIL_KEY: &str = "userEmail";

/// Both auth keys, in the order they are read and cleared.
pub const AUTH_KEYS: [&str; 2] = [AUTH_TOKEN_KEY, USER_EMAIL_KEY];

/// The currently known authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRecord {
    pub token: Option<String>,
    pub email: Option<String>,
}

impl AuthRecord {
    /// Read the record from the shared store.
    pub async fn load(store: &dyn AuthStore) -> Result<Self> {
        let mut values = store.get(&AUTH_KEYS).await?;
        Ok(Self {
            token: values.remove(AUTH_TOKEN_KEY),
            email: values.remove(USER_EMAIL_KEY),
        })
    }

    /// A record is logged in when it carries a non-empty token.
    pub fn is_logged_in(&self) -> bool {
        is_present(self.token.as_deref())
    }
}

/// `true` for `Some` non-empty values. Empty strings count as absent.
pub(crate) fn is_present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Factory: create the configured store backend.
pub fn create_store(config: &StorageConfig) -> Result<Arc<dyn AuthStore>> {
    match config.kind.as_str() {
        "memory" => Ok(Arc::new(MemoryAuthStore::new())),
        "file" => {
            let path = config.resolved_path()?;
            Ok(Arc::new(FileAuthStore::open(&path)?))
        }
        other if other.trim().is_empty() => {
            anyhow::bail!("storage.kind cannot be empty. Supported values: file, memory")
        }
        other => anyhow::bail!("Unknown storage kind '{other}'. Supported values: file, memory"),
    }
}
