mod license;
mod scan;

pub use license::*;
pub use scan::*;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/license/create", post(create_license))
        .route("/api/license/verify", post(verify_license))
        .route("/api/license/renew/{code}", post(renew_license))
        .route("/api/license/list", get(list_licenses))
        // Gate + scan engine composition; the only path that counts usage
        .route("/api/scan/start", post(start_scan))
}
