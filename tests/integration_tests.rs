// Integration tests: HTTP endpoints over the scripted connector

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use common::*;
use mactrace::audit::{AuditSink, ChannelAudit};
use mactrace::config::{GroupConfig, LoadConfig, TraceConfig};
use mactrace::inventory::StaticInventory;
use mactrace::load::LoadGuard;
use mactrace::orchestrator::Tracer;
use mactrace::routes;
use mactrace::vlan::VlanWorkflow;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn test_server(connector: &ScriptedConnector, load: Arc<LoadGuard>) -> TestServer {
    let limiter = limiter();
    let access = access(connector, limiter.clone());
    let audit = Arc::new(RecordingAudit::default());
    let inventory = StaticInventory::from_config(&[GroupConfig {
        name: "bldg-a".into(),
        devices: vec![device(1), device(2)],
    }]);
    let app = routes::app(routes::Services {
        tracer: Arc::new(Tracer::new(
            access.clone(),
            load.clone(),
            audit.clone(),
            TraceConfig::default(),
        )),
        vlan: Arc::new(VlanWorkflow::new(access, audit)),
        inventory: Arc::new(inventory),
        load,
        limiter,
    });
    TestServer::try_new(app).unwrap()
}

fn default_server(connector: &ScriptedConnector) -> TestServer {
    test_server(connector, LoadGuard::new(LoadConfig::default()))
}

#[tokio::test]
async fn test_version_endpoint() {
    let server = default_server(&ScriptedConnector::new());
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json.get("name").and_then(|v| v.as_str()), Some("mactrace"));
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_groups_endpoint() {
    let server = default_server(&ScriptedConnector::new());
    let response = server.get("/api/groups").await;
    response.assert_status_ok();
    response.assert_json(&json!(["bldg-a"]));
}

#[tokio::test]
async fn test_trace_rejects_malformed_mac() {
    let connector = ScriptedConnector::new();
    let server = default_server(&connector);
    let response = server
        .post("/api/trace")
        .json(&json!({ "group": "bldg-a", "mac": "not-a-mac" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test]
async fn test_trace_unknown_group() {
    let server = default_server(&ScriptedConnector::new());
    let response = server
        .post("/api/trace")
        .json(&json!({ "group": "bldg-z", "mac": "aabb.ccdd.eeff" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trace_returns_one_outcome_per_device() {
    let connector = ScriptedConnector::new();
    connector.script(
        "10.0.0.1",
        DeviceScript::default()
            .reply("show mac address-table address aabb.ccdd.eeff", MAC_TABLE_GI5)
            .reply("show running-config interface Gi1/0/5", RUNNING_GI5)
            .reply("show interfaces status Gi1/0/5", STATUS_GI5),
    );
    let server = default_server(&connector);

    let response = server
        .post("/api/trace")
        .add_header(
            HeaderName::from_static("x-caller"),
            HeaderValue::from_static("alice"),
        )
        .json(&json!({ "group": "bldg-a", "mac": "AA:BB:CC:DD:EE:FF" }))
        .await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["result"], "completed");
    let outcomes = json["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["status"], "found");
    assert_eq!(outcomes[0]["port"], "Gi1/0/5");
    assert_eq!(outcomes[0]["vlan"], 100);
    assert_eq!(outcomes[0]["device"]["name"], "sw-01");
    assert_eq!(outcomes[1]["status"], "not_found");
}

#[tokio::test]
async fn test_trace_rejected_under_critical_load() {
    let connector = ScriptedConnector::new();
    let load = LoadGuard::new(LoadConfig::default());
    for _ in 0..5 {
        load.record_sample(99.0);
    }
    let server = test_server(&connector, load);

    let response = server
        .post("/api/trace")
        .json(&json!({ "group": "bldg-a", "mac": "aabbccddeeff" }))
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = response.json();
    assert_eq!(json["result"], "rejected");
    assert_eq!(connector.connect_count(), 0);

    let load = server.get("/api/load").await;
    load.assert_status_ok();
    let json: serde_json::Value = load.json();
    assert_eq!(json["zone"], "critical");
    assert_eq!(json["currentPercent"], 99.0);
}

#[tokio::test]
async fn test_device_health_lists_contacted_devices() {
    let connector = ScriptedConnector::new();
    let server = default_server(&connector);
    server
        .post("/api/trace")
        .json(&json!({ "group": "bldg-a", "mac": "aabbccddeeff" }))
        .await
        .assert_status_ok();

    let response = server.get("/api/devices/health").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    let devices = json.as_array().unwrap();
    assert_eq!(devices.len(), 2);
    assert!(devices.iter().all(|d| d["tier"] == "healthy"));
    assert!(devices.iter().all(|d| d["activeSessions"] == 0));
}

#[tokio::test]
async fn test_vlan_change_needs_confirmation() {
    let connector = ScriptedConnector::new();
    connector.script(
        "10.0.0.1",
        DeviceScript::default().reply(
            "show interfaces status",
            "
Port       Description                    Vlan  Duplex Speed   Neg  Link   Flow Ctrl
---------  -----------------------------  ----- ------ ------- ---- ------ ---------
Gi1/0/1                                   1     Full   1000    Auto Down   Inactive
Gi1/0/2    Server                         Trnk  Full   1000    Auto Up     Inactive
",
        ),
    );
    let server = default_server(&connector);

    let response = server
        .post("/api/vlan")
        .json(&json!({
            "device": "10.0.0.1",
            "ports": "Gi1/0/1-2",
            "vlanId": 100,
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    response.assert_json(&json!({
        "result": "confirmation_needed",
        "blocking": ["Gi1/0/2"],
        "safe": ["Gi1/0/1"],
    }));
}

#[tokio::test]
async fn test_vlan_change_validation_and_unknown_device() {
    let connector = ScriptedConnector::new();
    let server = default_server(&connector);

    let response = server
        .post("/api/vlan")
        .json(&json!({ "device": "10.0.0.1", "ports": "Gi1/0/1", "vlanId": 5000 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let json: serde_json::Value = response.json();
    assert_eq!(json["kind"], "validation_error");

    let response = server
        .post("/api/vlan")
        .json(&json!({ "device": "10.9.9.9", "ports": "Gi1/0/1", "vlanId": 100 }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test]
async fn test_shutdown_drains_idle_keep_alive_clients() {
    let connector = ScriptedConnector::new();
    let limiter = limiter();
    let access = access(&connector, limiter.clone());
    let (sink, mut audit_rx) = ChannelAudit::new(16);
    let audit: Arc<dyn AuditSink> = Arc::new(sink);
    let load = LoadGuard::new(LoadConfig::default());
    let app = routes::app(routes::Services {
        tracer: Arc::new(Tracer::new(
            access.clone(),
            load.clone(),
            audit.clone(),
            TraceConfig::default(),
        )),
        vlan: Arc::new(VlanWorkflow::new(access, audit)),
        inventory: Arc::new(StaticInventory::from_config(&[])),
        load,
        limiter,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(routes::serve(listener, app, async move {
        let _ = stop_rx.await;
    }));

    // One request, then the connection stays open and idle.
    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /version HTTP/1.1\r\nHost: test\r\n\r\n")
        .await
        .unwrap();
    let mut buf = [0u8; 1024];
    let n = client.read(&mut buf).await.unwrap();
    assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 200"));

    stop_tx.send(()).unwrap();
    let served = tokio::time::timeout(Duration::from_secs(5), server).await;
    assert!(matches!(served, Ok(Ok(Ok(())))), "server still running: {:?}", served);

    // The router state held every audit sender; the writer sees the channel close.
    let closed = tokio::time::timeout(Duration::from_secs(5), audit_rx.recv()).await;
    assert!(matches!(closed, Ok(None)));
    drop(client);
}
