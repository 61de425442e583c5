use crate::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
    pub version: String,
}

fn connectivity(ok: bool) -> &'static str {
    if ok { "connected" } else { "disconnected" }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse),
        (status = 503, description = "A dependency is unreachable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.db.ping().await.is_ok();
    let storage_ok = state.storage.health_check().await;

    let (status, label) = if db_ok && storage_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            database: connectivity(db_ok).to_string(),
            storage: connectivity(storage_ok).to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
