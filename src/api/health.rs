use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::population::Table;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    store: ComponentHealth,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    kind: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// GET /healthz
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let start = std::time::Instant::now();
    // Counting against the nil project exercises the store without touching data
    let store = match state.repo.count(Table::Panels, Uuid::nil()).await {
        Ok(_) => ComponentHealth {
            kind: state.store,
            status: "healthy",
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => ComponentHealth {
            kind: state.store,
            status: "unhealthy",
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    Json(HealthResponse {
        status: if store.error.is_none() { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now(),
        store,
    })
}
