//! End-to-end: page storage → watcher → bus → relay → store → UI roots.

use carrier_vet::auth::{AuthRecord, AuthStore, FileAuthStore, MemoryAuthStore};
use carrier_vet::config::{ApiConfig, SyncConfig};
use carrier_vet::sync::{MemoryPageStorage, SyncCoordinator};
use carrier_vet::ui::{GateState, UiRoot, View};
use carrier_vet::vetting::{SubmitOutcome, VettingClient};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(5);

fn fast_sync() -> SyncConfig {
    SyncConfig {
        poll_interval_ms: 20,
        ..SyncConfig::default()
    }
}

fn mount_roots(store: &Arc<dyn AuthStore>, api: ApiConfig) -> (UiRoot, UiRoot) {
    let client = Arc::new(VettingClient::new(api).unwrap());
    let popup = UiRoot::mount("popup", Arc::clone(store), Arc::clone(&client), "https://app/login");
    let panel = UiRoot::mount("panel", Arc::clone(store), client, "https://app/login");
    (popup, panel)
}

async fn reach(root: &UiRoot, state: GateState) {
    let reached = tokio::time::timeout(WAIT, root.gate().wait_for(state))
        .await
        .unwrap_or(false);
    assert!(reached, "{} never reached {state}", root.name());
}

#[tokio::test]
async fn page_login_and_logout_propagate_to_every_root() {
    let store: Arc<dyn AuthStore> = Arc::new(MemoryAuthStore::new());
    let page = Arc::new(MemoryPageStorage::new());
    let (popup, panel) = mount_roots(&store, ApiConfig::default());

    let sync = SyncCoordinator::start(Arc::clone(&store), page.clone(), &fast_sync());

    reach(&popup, GateState::LoggedOut).await;
    reach(&panel, GateState::LoggedOut).await;

    page.set_item("authToken", "abc123");
    page.set_item("userEmail", "a@b.com");

    reach(&popup, GateState::LoggedIn).await;
    reach(&panel, GateState::LoggedIn).await;
    assert_eq!(popup.view(), View::Main);
    assert_eq!(
        AuthRecord::load(store.as_ref()).await.unwrap(),
        AuthRecord {
            token: Some("abc123".into()),
            email: Some("a@b.com".into()),
        }
    );

    page.remove_item("authToken");
    page.remove_item("userEmail");

    reach(&popup, GateState::LoggedOut).await;
    reach(&panel, GateState::LoggedOut).await;
    assert_eq!(panel.view(), View::Login);
    assert_eq!(
        AuthRecord::load(store.as_ref()).await.unwrap(),
        AuthRecord::default()
    );

    sync.stop().await;
    popup.unmount().await;
    panel.unmount().await;
}

#[tokio::test]
async fn late_mounted_root_sees_existing_session() {
    let tmp = TempDir::new().unwrap();
    let store_path = tmp.path().join("auth_store.json");
    let page = Arc::new(MemoryPageStorage::new());
    page.set_item("authToken", "abc123");
    page.set_item("userEmail", "a@b.com");

    {
        let store: Arc<dyn AuthStore> = Arc::new(FileAuthStore::open(&store_path).unwrap());
        let (popup, panel) = mount_roots(&store, ApiConfig::default());
        let sync = SyncCoordinator::start(Arc::clone(&store), page.clone(), &fast_sync());
        reach(&popup, GateState::LoggedIn).await;
        sync.stop().await;
        popup.unmount().await;
        panel.unmount().await;
    }

    // A fresh process reading the same file starts logged in.
    let store: Arc<dyn AuthStore> = Arc::new(FileAuthStore::open(&store_path).unwrap());
    let (popup, panel) = mount_roots(&store, ApiConfig::default());
    reach(&popup, GateState::LoggedIn).await;
    reach(&panel, GateState::LoggedIn).await;
    popup.unmount().await;
    panel.unmount().await;
}

#[tokio::test]
async fn logged_in_root_vets_with_session_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fmsca/dot_parse"))
        .and(header("authorization", "Bearer abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"carrier_name": "ACME TRUCKING"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store: Arc<dyn AuthStore> = Arc::new(MemoryAuthStore::new());
    let page = Arc::new(MemoryPageStorage::new());
    let api = ApiConfig {
        base_url: server.uri(),
        ..ApiConfig::default()
    };
    let (mut popup, panel) = mount_roots(&store, api);
    let sync = SyncCoordinator::start(Arc::clone(&store), page.clone(), &fast_sync());

    reach(&popup, GateState::LoggedOut).await;
    assert_eq!(popup.vet("1234567").await, SubmitOutcome::Alerted);

    page.set_item("authToken", "abc123");
    page.set_item("userEmail", "a@b.com");
    reach(&popup, GateState::LoggedIn).await;

    assert_eq!(popup.vet("1234567").await, SubmitOutcome::Loaded);
    assert_eq!(
        popup.panel().carrier_data().unwrap().body["carrier_name"],
        "ACME TRUCKING"
    );

    sync.stop().await;
    popup.unmount().await;
    panel.unmount().await;
}
