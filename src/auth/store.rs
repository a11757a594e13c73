//! Shared key-value storage with change notifications.
//!
//! Backends:
//! - [`MemoryAuthStore`]: process-local map, lost on exit
//! - [`FileAuthStore`]: JSON map persisted on every mutation
//!
//! Every mutation that actually changes a value is broadcast to all live
//! [`Subscription`]s as one [`ChangeSet`]. Writes are serialized by the
//! backend's own lock and notifications are sent while that lock is held,
//! so each subscriber sees changes in write order.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Notifications buffered per subscriber before it is considered lagging.
const NOTIFY_CAPACITY: usize = 64;

/// Key → value mapping as stored.
pub type StorageMap = BTreeMap<String, String>;

/// Old and new value of a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueChange {
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// All key changes produced by one write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: BTreeMap<String, ValueChange>,
}

impl ChangeSet {
    pub fn get(&self, key: &str) -> Option<&ValueChange> {
        self.changes.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    fn record(&mut self, key: &str, old_value: Option<String>, new_value: Option<String>) {
        if old_value != new_value {
            self.changes.insert(
                key.to_string(),
                ValueChange {
                    old_value,
                    new_value,
                },
            );
        }
    }
}

/// What a subscriber receives next.
#[derive(Debug, Clone)]
pub enum Notification {
    /// One write's worth of changes.
    Changed(Arc<ChangeSet>),
    /// The subscriber fell behind and `n` change sets were discarded.
    /// Re-read the store to resynchronize.
    Lagged(u64),
    /// The store was dropped; no further notifications will arrive.
    Closed,
}

/// A live change subscription. Dropping it releases the subscription.
pub struct Subscription {
    rx: broadcast::Receiver<Arc<ChangeSet>>,
}

impl Subscription {
    /// Wait for the next notification.
    pub async fn next(&mut self) -> Notification {
        match self.rx.recv().await {
            Ok(changes) => Notification::Changed(changes),
            Err(broadcast::error::RecvError::Lagged(n)) => Notification::Lagged(n),
            Err(broadcast::error::RecvError::Closed) => Notification::Closed,
        }
    }
}

/// Shared, persisted auth state visible to every context.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Read the given keys. Absent keys are omitted from the result.
    async fn get(&self, keys: &[&str]) -> Result<StorageMap>;

    /// Delete `remove`, then write every pair in `set`, as one mutation.
    /// Subscribers see a single [`ChangeSet`] covering both.
    async fn update(&self, set: StorageMap, remove: &[&str]) -> Result<()>;

    /// Write every pair in `items`, overwriting existing values.
    async fn set(&self, items: StorageMap) -> Result<()> {
        self.update(items, &[]).await
    }

    /// Delete the given keys. Missing keys are ignored.
    async fn remove(&self, keys: &[&str]) -> Result<()> {
        self.update(StorageMap::new(), keys).await
    }

    /// Pick up writes made outside this instance, notifying subscribers of
    /// whatever changed. Process-local backends have nothing to pick up.
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    /// Subscribe to change notifications for writes made after this call.
    fn subscribe(&self) -> Subscription;
}

fn read_keys(entries: &StorageMap, keys: &[&str]) -> StorageMap {
    keys.iter()
        .filter_map(|k| entries.get(*k).map(|v| ((*k).to_string(), v.clone())))
        .collect()
}

/// Every key whose value differs between `before` and `after`.
fn diff(before: &StorageMap, after: &StorageMap) -> ChangeSet {
    let mut changes = ChangeSet::default();
    for key in before.keys().chain(after.keys()) {
        changes.record(key, before.get(key).cloned(), after.get(key).cloned());
    }
    changes
}

fn apply_update(entries: &mut StorageMap, set: StorageMap, remove: &[&str]) -> ChangeSet {
    let before = entries.clone();
    for key in remove {
        entries.remove(*key);
    }
    entries.extend(set);
    diff(&before, entries)
}

fn notify(tx: &broadcast::Sender<Arc<ChangeSet>>, changes: ChangeSet) {
    if changes.is_empty() {
        return;
    }
    // No receivers is fine: nobody is mounted yet.
    let _ = tx.send(Arc::new(changes));
}

// ── In-memory backend ───────────────────────────────────────────

/// Process-local store. State lives as long as the value does.
pub struct MemoryAuthStore {
    entries: Mutex<StorageMap>,
    changes: broadcast::Sender<Arc<ChangeSet>>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            entries: Mutex::new(StorageMap::new()),
            changes,
        }
    }
}

impl Default for MemoryAuthStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, keys: &[&str]) -> Result<StorageMap> {
        Ok(read_keys(&self.entries.lock(), keys))
    }

    async fn update(&self, set: StorageMap, remove: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock();
        let changes = apply_update(&mut entries, set, remove);
        notify(&self.changes, changes);
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.changes.subscribe(),
        }
    }
}

// ── File backend ────────────────────────────────────────────────

/// Store persisted as a JSON object at `path`.
///
/// The file is the source of truth: every read and every mutation starts by
/// re-reading it, so writes from other processes (or other instances on the
/// same path) are never overwritten with stale state. Differences from the
/// last copy this instance saw are announced to its subscribers. Mutations
/// rewrite the file (temp file + rename) only when something changed.
pub struct FileAuthStore {
    path: PathBuf,
    /// Last contents seen on disk.
    seen: tokio::sync::Mutex<StorageMap>,
    changes: broadcast::Sender<Arc<ChangeSet>>,
}

fn parse_store(path: &Path, raw: &str) -> Result<StorageMap> {
    if raw.trim().is_empty() {
        return Ok(StorageMap::new());
    }
    serde_json::from_str(raw).with_context(|| format!("Corrupt auth store at {}", path.display()))
}

impl FileAuthStore {
    /// Open (or create on first write) the store file at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => parse_store(path, &raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StorageMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        let (changes, _rx) = broadcast::channel(NOTIFY_CAPACITY);
        Ok(Self {
            path: path.to_path_buf(),
            seen: tokio::sync::Mutex::new(entries),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StorageMap> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => parse_store(&self.path, &raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StorageMap::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }

    /// Bring `seen` up to date with the file, announcing outside writes.
    async fn reload(&self, seen: &mut StorageMap) -> Result<()> {
        let current = self.load().await?;
        let changes = diff(seen, &current);
        if !changes.is_empty() {
            tracing::debug!(
                path = %self.path.display(),
                keys = changes.len(),
                "Auth store changed on disk"
            );
            *seen = current;
            notify(&self.changes, changes);
        }
        Ok(())
    }

    async fn persist(&self, entries: &StorageMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl AuthStore for FileAuthStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, keys: &[&str]) -> Result<StorageMap> {
        let mut seen = self.seen.lock().await;
        self.reload(&mut seen).await?;
        Ok(read_keys(&seen, keys))
    }

    async fn update(&self, set: StorageMap, remove: &[&str]) -> Result<()> {
        let mut seen = self.seen.lock().await;
        self.reload(&mut seen).await?;

        let mut next = seen.clone();
        let changes = apply_update(&mut next, set, remove);
        if changes.is_empty() {
            return Ok(());
        }
        self.persist(&next).await?;
        *seen = next;
        tracing::debug!(path = %self.path.display(), keys = changes.len(), "Auth store updated");
        notify(&self.changes, changes);
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        let mut seen = self.seen.lock().await;
        self.reload(&mut seen).await
    }

    fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.changes.subscribe(),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
