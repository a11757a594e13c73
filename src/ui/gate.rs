//! Login gate state machine.
//!
//! Decides whether a UI root shows the login view or the main view. Each
//! root runs its own gate; gates never talk to each other and converge
//! only through the shared store.
//!
//! Transitions:
//! - mount: `authToken` present → `LoggedIn`, otherwise `LoggedOut`
//! - change with a present new `authToken` → `LoggedIn`
//! - change whose old `authToken` was present and new one is absent → `LoggedOut`

use crate::auth::{is_present, AuthRecord, AuthStore, ChangeSet, Notification, AUTH_TOKEN_KEY};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Initial read of the store has not finished.
    Checking,
    LoggedOut,
    LoggedIn,
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Checking => "checking",
            Self::LoggedOut => "logged_out",
            Self::LoggedIn => "logged_in",
        })
    }
}

/// Pure transition logic, independent of any task or store.
#[derive(Debug)]
pub struct AuthGate {
    state: GateState,
}

impl AuthGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Checking,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Apply the result of reading the store on mount (or after a lag).
    pub fn on_mount(&mut self, record: &AuthRecord) -> GateState {
        self.state = if record.is_logged_in() {
            GateState::LoggedIn
        } else {
            GateState::LoggedOut
        };
        self.state
    }

    /// Apply one store change notification.
    pub fn on_change(&mut self, changes: &ChangeSet) -> GateState {
        if let Some(change) = changes.get(AUTH_TOKEN_KEY) {
            if is_present(change.new_value.as_deref()) {
                self.state = GateState::LoggedIn;
            } else if is_present(change.old_value.as_deref()) {
                self.state = GateState::LoggedOut;
            }
        }
        self.state
    }
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new()
    }
}

/// A running gate bound to one UI root.
///
/// The gate task owns the store subscription; [`GateHandle::shutdown`]
/// stops the task and releases the subscription with it.
pub struct GateHandle {
    root: String,
    state: watch::Receiver<GateState>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl GateHandle {
    /// Mount a gate for `root` against the shared store.
    pub fn spawn(root: impl Into<String>, store: Arc<dyn AuthStore>) -> Self {
        let root = root.into();
        let (tx, rx) = watch::channel(GateState::Checking);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_gate(root.clone(), store, tx, shutdown.clone()));
        Self {
            root,
            state: rx,
            shutdown,
            task,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    /// A receiver that observes every state the gate publishes.
    pub fn watch(&self) -> watch::Receiver<GateState> {
        self.state.clone()
    }

    /// Wait until the gate reaches `target`. Returns `false` if the gate
    /// stopped first.
    pub async fn wait_for(&self, target: GateState) -> bool {
        let mut rx = self.state.clone();
        let reached = rx.wait_for(|s| *s == target).await.is_ok();
        reached
    }

    /// Unmount: stop the gate task and drop its subscription.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(root = %self.root, "Gate task ended abnormally: {e}");
        }
    }
}

async fn resync(
    root: &str,
    store: &dyn AuthStore,
    gate: &mut AuthGate,
    tx: &watch::Sender<GateState>,
) {
    match AuthRecord::load(store).await {
        Ok(record) => publish(root, gate.on_mount(&record), tx),
        Err(e) => tracing::warn!(root, "Failed to read auth state: {e:#}"),
    }
}

fn publish(root: &str, state: GateState, tx: &watch::Sender<GateState>) {
    tx.send_if_modified(|current| {
        if *current == state {
            return false;
        }
        tracing::info!(root, from = %current, to = %state, "Auth gate transition");
        *current = state;
        true
    });
}

async fn run_gate(
    root: String,
    store: Arc<dyn AuthStore>,
    tx: watch::Sender<GateState>,
    shutdown: CancellationToken,
) {
    // Subscribe before the initial read so no write slips between them.
    let mut subscription = store.subscribe();
    let mut gate = AuthGate::new();
    resync(&root, store.as_ref(), &mut gate, &tx).await;

    loop {
        tokio::select! {
            notification = subscription.next() => match notification {
                Notification::Changed(changes) => publish(&root, gate.on_change(&changes), &tx),
                Notification::Lagged(missed) => {
                    tracing::debug!(root = %root, missed, "Gate lagged; re-reading auth state");
                    resync(&root, store.as_ref(), &mut gate, &tx).await;
                }
                Notification::Closed => {
                    tracing::debug!(root = %root, "Auth store closed; gate stopping");
                    break;
                }
            },
            () = shutdown.cancelled() => break,
        }
    }
}
