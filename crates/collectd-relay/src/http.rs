// SPDX-License-Identifier: Apache-2.0

//! HTTP front-end: sample ingestion plus status endpoints.
//!
//! `POST /collectd` takes a JSON array of collectd `write_http` samples and
//! hands every sample to every configured writer. Acceptance is fire and
//! forget; delivery failures surface only via `/_status/metrics`.

use std::fmt::Write;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::debug;

use collectd_pipeline::collectd::CollectdSample;
use collectd_pipeline::writer::Writer;

#[derive(Clone)]
pub struct AppState {
    pub writers: Arc<Vec<Writer>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/collectd", post(ingest))
        // axum's get() also answers HEAD
        .route("/_status/health", get(health))
        .route("/_status/metrics", get(metrics))
        .with_state(state)
}

async fn ingest(
    State(state): State<AppState>,
    Json(samples): Json<Vec<CollectdSample>>,
) -> Response {
    if samples.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"msg": "no data/decode failed"})),
        )
            .into_response();
    }
    debug!("accepted {} samples", samples.len());
    for sample in &samples {
        for writer in state.writers.iter() {
            writer.write_sample(sample).await;
        }
    }
    StatusCode::ACCEPTED.into_response()
}

async fn health() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

/// Renders per-writer delivery counters in exposition format for an
/// external scraper.
async fn metrics(State(state): State<AppState>) -> Response {
    let mut body = String::new();
    for writer in state.writers.iter() {
        let stats = writer.stats();
        let name = writer.name();
        // rendering into a String is infallible
        let _ = writeln!(
            body,
            "collectd_relay_events_total{{writer=\"{name}\"}} {}",
            stats.events
        );
        let _ = writeln!(
            body,
            "collectd_relay_requests_total{{writer=\"{name}\",state=\"ok\"}} {}",
            stats.requests_ok
        );
        let _ = writeln!(
            body,
            "collectd_relay_requests_total{{writer=\"{name}\",state=\"fail\"}} {}",
            stats.requests_failed
        );
        let _ = writeln!(
            body,
            "collectd_relay_events_dropped_total{{writer=\"{name}\"}} {}",
            stats.events_dropped
        );
    }
    ([("content-type", "text/plain")], body).into_response()
}
