//! Read-only status API over the registries and the last reconciliation.

use crate::logging::{self, TraceId};
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use chrono::Utc;
use nodewatch_alert::registry::{EntityKind, MetricSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response envelope shared by every endpoint.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 0 on success.
    pub err_code: i32,
    pub err_msg: String,
    pub trace_id: String,
    pub data: Option<T>,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "not_found" => 1004,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

#[derive(Serialize)]
struct HealthResponse {
    version: String,
    node_id: String,
    uptime_secs: i64,
    metric_count: usize,
}

async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            node_id: state.node_id.to_string(),
            uptime_secs: (Utc::now() - state.start_time).num_seconds(),
            metric_count: state.registries.len(),
        },
    )
}

#[derive(Deserialize)]
struct MetricsQuery {
    kind: Option<String>,
}

const ALL_KINDS: [EntityKind; 4] = [
    EntityKind::System,
    EntityKind::Disk,
    EntityKind::Process,
    EntityKind::Tenant,
];

async fn list_metrics(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    let kinds: Vec<EntityKind> = match query.kind.as_deref() {
        None | Some("") => ALL_KINDS.to_vec(),
        Some(raw) => match raw.parse() {
            Ok(kind) => vec![kind],
            Err(e) => return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", &e),
        },
    };
    let metrics: Vec<MetricSnapshot> = kinds
        .into_iter()
        .flat_map(|kind| state.registries.snapshots(kind))
        .collect();
    success_response(StatusCode::OK, &trace_id, metrics)
}

async fn reconciliation(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    match state.reconciliation() {
        Some(report) => success_response(StatusCode::OK, &trace_id, report),
        None => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "no reconciliation pass has completed yet",
        ),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/metrics", get(list_metrics))
        .route("/v1/tenants/reconciliation", get(reconciliation))
        .layer(middleware::from_fn(logging::request_logging))
        .with_state(state)
}
