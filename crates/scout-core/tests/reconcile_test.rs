// Integration tests for the alarm panel's poll/push reconciliation and
// command paths, using wiremock as the vendor API.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scout_api::models::{ModeEvent, ModeEventKind};
use scout_api::{LocationClient, RestClient, Session};
use scout_core::config::ReconcileConfig;
use scout_core::{AlarmPanel, ArmedKind, PanelState};

// ── Helpers ─────────────────────────────────────────────────────────

const MODES_PATH: &str = "/locations/loc-1/modes";

async fn mount_account(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jwt": "jwt-1" })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "member-1" })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/members/member-1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "loc-1", "name": "House", "hub_id": "hub-1" }
        ])))
        .mount(server)
        .await;
}

fn panel_for(
    server: &MockServer,
    mapping: &[(ArmedKind, &str)],
    reconcile: ReconcileConfig,
) -> Arc<AlarmPanel> {
    let session = Arc::new(
        Session::with_base_url(
            server.uri().parse().unwrap(),
            "user@example.com",
            SecretString::from("hunter2".to_string()),
        )
        .unwrap(),
    );
    let location = Arc::new(LocationClient::new(RestClient::new(session).unwrap()));
    let mapping = mapping
        .iter()
        .map(|(kind, name)| (*kind, (*name).to_string()))
        .collect();
    AlarmPanel::new(location, mapping, reconcile)
}

fn fast_reconcile(max_attempts: u32) -> ReconcileConfig {
    ReconcileConfig {
        max_attempts,
        retry_delay: Duration::from_millis(1),
    }
}

fn pushed(panel: &AlarmPanel, mode_id: &str, kind: ModeEventKind) {
    panel.apply_pushed_event(&ModeEvent {
        mode_id: mode_id.into(),
        event: kind,
        affector: None,
    });
}

fn modes_body(state: &str) -> serde_json::Value {
    json!([{ "id": "m1", "name": "Home", "state": state }])
}

// ── Reconciliation ──────────────────────────────────────────────────

#[tokio::test]
async fn stale_poll_is_retried_until_it_matches_the_push() {
    let server = MockServer::start().await;
    mount_account(&server).await;

    // First poll lags the push notification; the second has caught up.
    Mock::given(method("GET"))
        .and(path(MODES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(modes_body("arming")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(MODES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(modes_body("armed")))
        .expect(1)
        .mount(&server)
        .await;

    let panel = panel_for(&server, &[(ArmedKind::Home, "Home")], fast_reconcile(30));
    pushed(&panel, "m1", ModeEventKind::Armed);

    panel.refresh().await.unwrap();

    assert_eq!(panel.state(), Some(PanelState::Armed(ArmedKind::Home)));
}

#[tokio::test]
async fn reconciliation_gives_up_at_the_attempt_ceiling() {
    let server = MockServer::start().await;
    mount_account(&server).await;

    // The poll never catches up: one initial poll plus `max_attempts`
    // retries, then the last snapshot wins.
    Mock::given(method("GET"))
        .and(path(MODES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(modes_body("arming")))
        .expect(4)
        .mount(&server)
        .await;

    let panel = panel_for(&server, &[(ArmedKind::Home, "Home")], fast_reconcile(3));
    pushed(&panel, "m1", ModeEventKind::Armed);

    panel.refresh().await.unwrap();

    assert_eq!(panel.state(), Some(PanelState::Arming));
}

#[tokio::test]
async fn refresh_without_pending_event_polls_once() {
    let server = MockServer::start().await;
    mount_account(&server).await;

    Mock::given(method("GET"))
        .and(path(MODES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(modes_body("armed")))
        .expect(1)
        .mount(&server)
        .await;

    let panel = panel_for(&server, &[(ArmedKind::Home, "Home")], fast_reconcile(30));
    panel.refresh().await.unwrap();

    assert_eq!(panel.state(), Some(PanelState::Armed(ArmedKind::Home)));
}

#[tokio::test]
async fn triggered_push_does_not_gate_the_poll() {
    let server = MockServer::start().await;
    mount_account(&server).await;

    Mock::given(method("GET"))
        .and(path(MODES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(modes_body("armed")))
        .expect(1)
        .mount(&server)
        .await;

    let panel = panel_for(&server, &[(ArmedKind::Home, "Home")], fast_reconcile(30));
    pushed(&panel, "m1", ModeEventKind::Triggered);

    panel.refresh().await.unwrap();

    // One poll, and the unconsumed trigger keeps the pending window open.
    assert_eq!(panel.state(), Some(PanelState::Pending));
}

#[tokio::test]
async fn newer_push_mid_loop_replaces_the_expectation() {
    let server = MockServer::start().await;
    mount_account(&server).await;

    // Poll forever says "disarmed" -- the first expectation (armed) can
    // never match; the later disarmed push resolves the loop.
    Mock::given(method("GET"))
        .and(path(MODES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(modes_body("disarmed")))
        .mount(&server)
        .await;

    let panel = panel_for(
        &server,
        &[(ArmedKind::Home, "Home")],
        ReconcileConfig {
            max_attempts: 50,
            retry_delay: Duration::from_millis(5),
        },
    );
    pushed(&panel, "m1", ModeEventKind::Armed);

    let pusher = {
        let panel = Arc::clone(&panel);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(25)).await;
            pushed(&panel, "m1", ModeEventKind::Disarmed);
        })
    };

    panel.refresh().await.unwrap();
    pusher.await.unwrap();

    assert_eq!(panel.state(), Some(PanelState::Disarmed));
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn arm_targets_the_mapped_mode() {
    let server = MockServer::start().await;
    mount_account(&server).await;

    Mock::given(method("GET"))
        .and(path(MODES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "m1", "name": "Home", "state": "disarmed" },
            { "id": "m2", "name": "Away", "state": "disarmed" },
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/modes/m1"))
        .and(body_json(json!({ "state": "arming" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let panel = panel_for(&server, &[(ArmedKind::Home, "Home")], fast_reconcile(30));
    panel.refresh().await.unwrap();

    panel.arm(ArmedKind::Home).await.unwrap();
}

#[tokio::test]
async fn arm_without_matching_mode_is_a_silent_noop() {
    let server = MockServer::start().await;
    mount_account(&server).await;

    Mock::given(method("GET"))
        .and(path(MODES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "m1", "name": "Casa", "state": "disarmed" },
        ])))
        .mount(&server)
        .await;

    // No mode write may happen in either case.
    Mock::given(method("POST"))
        .and(path("/modes/m1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let panel = panel_for(&server, &[(ArmedKind::Home, "Home")], fast_reconcile(30));
    panel.refresh().await.unwrap();

    // Mapped kind, but no vendor mode named "Home" exists.
    panel.arm(ArmedKind::Home).await.unwrap();
    // Unmapped kind.
    panel.arm(ArmedKind::Night).await.unwrap();
}

#[tokio::test]
async fn disarm_prefers_the_alarmed_mode() {
    let server = MockServer::start().await;
    mount_account(&server).await;

    Mock::given(method("GET"))
        .and(path(MODES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "m1", "name": "Home", "state": "armed" },
            { "id": "m2", "name": "Away", "state": "alarmed" },
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/modes/m2"))
        .and(body_json(json!({ "state": "disarm" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let panel = panel_for(&server, &[(ArmedKind::Home, "Home")], fast_reconcile(30));
    panel.refresh().await.unwrap();

    panel.disarm().await.unwrap();
}

#[tokio::test]
async fn disarm_falls_back_to_the_arming_mode() {
    let server = MockServer::start().await;
    mount_account(&server).await;

    Mock::given(method("GET"))
        .and(path(MODES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(modes_body("arming")))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/modes/m1"))
        .and(body_json(json!({ "state": "disarm" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let panel = panel_for(&server, &[(ArmedKind::Home, "Home")], fast_reconcile(30));
    panel.refresh().await.unwrap();

    panel.disarm().await.unwrap();
}
