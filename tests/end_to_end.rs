//! Engine, HTTP client and push channel against one in-process server

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use dashsync::cache::{CacheStore, MemoryStore};
use dashsync::model::{Group, Identity, Snapshot};
use dashsync::push::{PushClient, PushConfig};
use dashsync::remote::{HttpApi, HttpApiConfig};
use dashsync::sync::{EngineConfig, SyncEngine, SyncHandle, SyncPhase};

struct Running {
    handle: SyncHandle,
    kv: Arc<MemoryStore>,
}

fn start(server: &common::TestServer) -> Running {
    let api = Arc::new(
        HttpApi::new(HttpApiConfig {
            base_url: server.base_url.clone(),
            request_timeout_ms: 5_000,
        })
        .unwrap(),
    );
    let kv = Arc::new(MemoryStore::new());
    let config = EngineConfig {
        debounce: Duration::from_millis(50),
        ..Default::default()
    };
    let (engine, handle) = SyncEngine::new(api, kv.clone(), config);

    let push = PushConfig {
        url: server.ws_url.clone(),
        initial_backoff: Duration::from_millis(50),
        ..Default::default()
    };
    let (events_tx, events_rx) = mpsc::channel(16);
    tokio::spawn(PushClient::new(push, engine.session_id(), engine.token_watch(), events_tx).run());
    tokio::spawn(engine.run(events_rx));

    Running { handle, kv }
}

async fn wait_for_snapshot<F: Fn(&Snapshot) -> bool>(handle: &SyncHandle, check: F) -> Snapshot {
    for _ in 0..250 {
        let snapshot = handle.snapshot().await.unwrap();
        if check(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Snapshot never reached the expected state");
}

async fn wait_idle(handle: &SyncHandle) {
    for _ in 0..250 {
        if handle.status().await.unwrap().phase == SyncPhase::Idle {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Engine never settled");
}

fn has_group(snapshot: &Snapshot, id: &str) -> bool {
    snapshot.groups.iter().any(|g| g.id == id)
}

#[tokio::test]
async fn test_edit_reaches_server_and_remote_change_comes_back() {
    let server = common::spawn().await;
    let running = start(&server);

    running
        .handle
        .login(common::USERNAME, common::PASSWORD)
        .await
        .unwrap();
    let status = running.handle.status().await.unwrap();
    assert_eq!(status.identity, Identity::User(common::USERNAME.to_string()));

    // The push channel re-authenticates with the new token
    let state = server.state.clone();
    common::eventually(|| {
        state
            .received("auth")
            .iter()
            .any(|m| m["token"] == common::TOKEN)
    })
    .await;

    running
        .handle
        .update(|s| s.groups.push(Group::new("links", "Links")))
        .unwrap();
    common::eventually(|| state.private_has_group("links")).await;
    wait_idle(&running.handle).await;

    // Another device edits the dashboard
    {
        let mut private = server.state.private.lock().unwrap();
        private["groups"]
            .as_array_mut()
            .unwrap()
            .push(json!({"id": "remote", "title": "From laptop", "items": []}));
    }
    server
        .state
        .push(json!({"type": "data_changed", "username": common::USERNAME}));

    let snapshot = wait_for_snapshot(&running.handle, |s| has_group(s, "remote")).await;
    assert!(has_group(&snapshot, "links"));

    let cached = CacheStore::new(running.kv.clone())
        .load(&Identity::User(common::USERNAME.to_string()))
        .unwrap();
    assert!(has_group(&cached, "remote"));

    running.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_guest_sees_public_dashboard_and_mode_change_logs_out() {
    let server = common::spawn().await;
    {
        let mut public = server.state.public.lock().unwrap();
        public["groups"] = json!([{"id": "public", "title": "Shared links"}]);
    }
    let running = start(&server);

    let snapshot = wait_for_snapshot(&running.handle, |s| has_group(s, "public")).await;
    assert!(snapshot.widget("docker").is_some());
    assert_eq!(
        running.handle.status().await.unwrap().identity,
        Identity::Guest
    );

    running
        .handle
        .login(common::USERNAME, common::PASSWORD)
        .await
        .unwrap();
    let state = server.state.clone();
    common::eventually(|| {
        state
            .received("auth")
            .iter()
            .any(|m| m["token"] == common::TOKEN)
    })
    .await;

    server
        .state
        .push(json!({"type": "mode_changed", "origin": "another-session"}));
    wait_for_snapshot(&running.handle, |s| has_group(s, "public")).await;
    assert_eq!(
        running.handle.status().await.unwrap().identity,
        Identity::Guest
    );
}
