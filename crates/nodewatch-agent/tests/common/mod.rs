#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use nodewatch_agent::api;
use nodewatch_agent::state::{AppState, ReconciliationReport};
use nodewatch_alert::registry::EntityKey;
use nodewatch_alert::ThresholdPolicy;
use nodewatch_common::types::{LiveProcess, SupervisorRecord, TenantIdentity};
use nodewatch_tenant::reconcile::reconcile;
use serde_json::Value;
use std::time::Duration;
use tower::util::ServiceExt;

pub struct TestContext {
    pub state: AppState,
    pub app: axum::Router,
}

pub fn build_test_context() -> TestContext {
    let state = AppState::new("nc-test");
    let app = api::router(state.clone());
    TestContext { state, app }
}

/// Registers a handful of metrics across entity kinds.
pub fn seed_metrics(state: &AppState) {
    let registries = &state.registries;
    let cpu = registries.gauges.get_or_create(
        EntityKey::System,
        "cpu_usage",
        ThresholdPolicy::SustainedBreach,
        90.0,
        Duration::from_secs(60),
    );
    cpu.observe(42.0);
    let disk = registries.gauges.get_or_create(
        EntityKey::Disk("/data1".to_string()),
        "disk_usage",
        ThresholdPolicy::ImmediateWithCooldown,
        50.0,
        Duration::from_secs(300),
    );
    disk.observe(12.5);
    let conns = registries.counters.get_or_create(
        EntityKey::Tenant("a.example.com".to_string()),
        "conn_count",
        ThresholdPolicy::SustainedBreach,
        15,
        Duration::from_secs(60),
    );
    conns.observe(3);
}

pub fn seed_reconciliation(state: &AppState) {
    let tenants = vec![
        TenantIdentity::with_dns("a.example.com"),
        TenantIdentity::with_dns("b.example.com"),
    ];
    let records = vec![SupervisorRecord::new("a.example.com", 100)];
    let live = vec![LiveProcess {
        process_id: 100,
        name: "minio".to_string(),
        cpu_percent: 1.0,
        memory_percent: 1.0,
        connection_count: 0,
    }];
    state.record_reconciliation(ReconciliationReport {
        completed_at: Utc::now(),
        directory_stale: false,
        supervisor_stale: true,
        summary: reconcile(&tenants, &records, &live).summary(),
    });
}

pub async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub fn assert_ok_envelope(body: &Value) {
    assert_eq!(body["err_code"], 0, "unexpected body: {body}");
    assert_eq!(body["err_msg"], "success");
    assert!(body["trace_id"].is_string());
}

pub fn assert_err_envelope(body: &Value, code: i64) {
    assert_eq!(body["err_code"], code, "unexpected body: {body}");
    assert!(body["data"].is_null());
}
