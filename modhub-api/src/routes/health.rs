use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use modhub_shared::types::api::{HealthCheck, HealthResponse};

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut checks = vec![match state.store.ping() {
        Ok(()) => HealthCheck::healthy("storage"),
        Err(e) => {
            tracing::warn!(error = %e, "storage ping failed");
            HealthCheck::unhealthy("storage", e.to_string())
        }
    }];

    if let Some(redis) = &state.redis {
        checks.push(match redis.ping().await {
            Ok(()) => HealthCheck::healthy("redis"),
            Err(e) => HealthCheck::unhealthy("redis", e.to_string()),
        });
    }

    Json(HealthResponse::healthy("modhub-api", env!("CARGO_PKG_VERSION")).with_checks(checks))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            String::from("metrics recorder not installed\n"),
        ),
    }
}
