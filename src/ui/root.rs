//! A UI root: one gate plus one vetting panel.

use super::gate::{GateHandle, GateState};
use crate::auth::AuthStore;
use crate::vetting::{SubmitOutcome, VettingClient, VettingPanel};
use std::sync::Arc;

/// Which top-level view a root shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Loading,
    Login,
    Main,
}

impl From<GateState> for View {
    fn from(state: GateState) -> Self {
        match state {
            GateState::Checking => Self::Loading,
            GateState::LoggedOut => Self::Login,
            GateState::LoggedIn => Self::Main,
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Loading => "loading",
            Self::Login => "login",
            Self::Main => "main",
        })
    }
}

pub struct UiRoot {
    gate: GateHandle,
    panel: VettingPanel,
    login_url: String,
}

impl UiRoot {
    /// Mount a root: start its gate and an empty vetting panel.
    pub fn mount(
        name: impl Into<String>,
        store: Arc<dyn AuthStore>,
        client: Arc<VettingClient>,
        login_url: impl Into<String>,
    ) -> Self {
        let gate = GateHandle::spawn(name, Arc::clone(&store));
        Self {
            gate,
            panel: VettingPanel::new(client, store),
            login_url: login_url.into(),
        }
    }

    pub fn name(&self) -> &str {
        self.gate.root()
    }

    pub fn gate(&self) -> &GateHandle {
        &self.gate
    }

    pub fn view(&self) -> View {
        self.gate.state().into()
    }

    /// Where the login action sends the user.
    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    pub fn panel(&self) -> &VettingPanel {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut VettingPanel {
        &mut self.panel
    }

    /// Submit a DOT lookup from the main view.
    pub async fn vet(&mut self, dot: &str) -> SubmitOutcome {
        self.panel.set_dot_input(dot);
        self.panel.submit().await
    }

    /// Tear down the root, releasing its store subscription.
    pub async fn unmount(self) {
        self.gate.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryAuthStore, StorageMap, AUTH_KEYS, AUTH_TOKEN_KEY, USER_EMAIL_KEY};
    use crate::config::ApiConfig;

    fn mount(store: Arc<MemoryAuthStore>) -> UiRoot {
        let client = VettingClient::new(ApiConfig::default()).unwrap();
        UiRoot::mount("popup", store, Arc::new(client), "https://app.example.com/login")
    }

    #[test]
    fn view_follows_gate_state() {
        assert_eq!(View::from(GateState::Checking), View::Loading);
        assert_eq!(View::from(GateState::LoggedOut), View::Login);
        assert_eq!(View::from(GateState::LoggedIn), View::Main);
    }

    #[tokio::test]
    async fn root_switches_views_with_store() {
        let store = Arc::new(MemoryAuthStore::new());
        let root = mount(store.clone());
        assert_eq!(root.name(), "popup");
        assert_eq!(root.login_url(), "https://app.example.com/login");

        assert!(root.gate().wait_for(GateState::LoggedOut).await);
        assert_eq!(root.view(), View::Login);

        store
            .set(StorageMap::from([
                (AUTH_TOKEN_KEY.to_string(), "abc123".to_string()),
                (USER_EMAIL_KEY.to_string(), "a@b.com".to_string()),
            ]))
            .await
            .unwrap();
        assert!(root.gate().wait_for(GateState::LoggedIn).await);
        assert_eq!(root.view(), View::Main);

        store.remove(&AUTH_KEYS).await.unwrap();
        assert!(root.gate().wait_for(GateState::LoggedOut).await);
        assert_eq!(root.view(), View::Login);

        root.unmount().await;
    }
}
