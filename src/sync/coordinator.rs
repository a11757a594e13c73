//! Sync coordinator: starts and stops the page → store pipeline.
//!
//! Wires a [`PageTokenWatcher`] to a [`BackgroundRelay`] over a fresh
//! runtime bus, each on its own task, and tears both down on [`stop`].
//! A third task refreshes the store on the poll interval so writes made by
//! other processes (a `logout` from another shell) reach the mounted gates.
//!
//! [`stop`]: SyncCoordinator::stop

use super::bus::RuntimeBus;
use super::relay::BackgroundRelay;
use super::watcher::{PageStorage, PageTokenWatcher};
use crate::auth::AuthStore;
use crate::config::SyncConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct SyncCoordinator {
    shutdown: CancellationToken,
    watcher: JoinHandle<()>,
    relay: JoinHandle<()>,
    refresh: JoinHandle<()>,
}

impl SyncCoordinator {
    /// Spawn the watcher and relay tasks.
    pub fn start(
        store: Arc<dyn AuthStore>,
        page: Arc<dyn PageStorage>,
        config: &SyncConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let (bus_tx, bus_rx) = RuntimeBus::channel(config.bus_capacity);

        let relay = BackgroundRelay::new(Arc::clone(&store));
        let relay = tokio::spawn(relay.run(bus_rx, shutdown.child_token()));

        let interval = Duration::from_millis(config.poll_interval_ms);
        let watcher = PageTokenWatcher::new(page, bus_tx)
            .with_forward_initial_absent(config.forward_initial_absent);
        let watcher = tokio::spawn(watcher.run(interval, shutdown.child_token()));

        let refresh = tokio::spawn(refresh_store(
            Arc::clone(&store),
            interval,
            shutdown.child_token(),
        ));

        tracing::info!(
            interval_ms = config.poll_interval_ms,
            store = store.name(),
            "Auth sync started"
        );

        Self {
            shutdown,
            watcher,
            relay,
            refresh,
        }
    }

    /// Signal every task and wait for them to finish.
    pub async fn stop(self) {
        self.shutdown.cancel();
        for (name, task) in [
            ("watcher", self.watcher),
            ("relay", self.relay),
            ("refresh", self.refresh),
        ] {
            if let Err(e) = task.await {
                tracing::warn!(task = name, "Auth sync task ended abnormally: {e}");
            }
        }
        tracing::info!("Auth sync stopped");
    }
}

async fn refresh_store(store: Arc<dyn AuthStore>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = store.refresh().await {
                    tracing::warn!(store = store.name(), "Auth store refresh failed: {e:#}");
                }
            }
            () = shutdown.cancelled() => {
                tracing::debug!("Auth store refresh stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthRecord, FileAuthStore, MemoryAuthStore, Notification, Subscription};
    use crate::sync::watcher::MemoryPageStorage;

    #[tokio::test(start_paused = true)]
    async fn page_login_reaches_store() {
        let store = Arc::new(MemoryAuthStore::new());
        let page = Arc::new(MemoryPageStorage::new());
        let mut sub = store.subscribe();

        let coordinator = SyncCoordinator::start(store.clone(), page.clone(), &SyncConfig::default());

        page.set_item("authToken", "abc123");
        page.set_item("userEmail", "a@b.com");

        loop {
            match sub.next().await {
                Notification::Changed(changes) if changes.get("authToken").is_some() => break,
                Notification::Changed(_) => continue,
                other => panic!("unexpected notification {other:?}"),
            }
        }

        let record = AuthRecord::load(store.as_ref()).await.unwrap();
        assert_eq!(record.token.as_deref(), Some("abc123"));
        assert_eq!(record.email.as_deref(), Some("a@b.com"));

        coordinator.stop().await;
    }

    async fn token_becomes(sub: &mut Subscription, want: Option<&str>) {
        loop {
            match sub.next().await {
                Notification::Changed(changes) => {
                    let matched = changes
                        .get("authToken")
                        .is_some_and(|c| c.new_value.as_deref() == want);
                    if matched {
                        return;
                    }
                }
                other => panic!("unexpected notification {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn other_process_logout_reaches_running_sync() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("auth_store.json");
        let running = Arc::new(FileAuthStore::open(&path).unwrap());
        let page = Arc::new(MemoryPageStorage::new());
        page.set_item("authToken", "abc123");
        page.set_item("userEmail", "a@b.com");

        let mut sub = running.subscribe();
        let config = SyncConfig {
            poll_interval_ms: 20,
            ..SyncConfig::default()
        };
        let coordinator = SyncCoordinator::start(running.clone(), page.clone(), &config);

        tokio::time::timeout(Duration::from_secs(5), token_becomes(&mut sub, Some("abc123")))
            .await
            .unwrap();

        // A separate `carrier-vet logout` writes through its own instance.
        let other = FileAuthStore::open(&path).unwrap();
        other.remove(&["authToken", "userEmail"]).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), token_becomes(&mut sub, None))
            .await
            .unwrap();
        assert_eq!(
            AuthRecord::load(running.as_ref()).await.unwrap(),
            AuthRecord::default()
        );
        assert!(other.get(&["authToken"]).await.unwrap().is_empty());

        coordinator.stop().await;
    }
}
