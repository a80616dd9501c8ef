use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::code::normalize_code;
use crate::db::{queries, AppState};
use crate::error::Result;
use crate::extractors::Json;
use crate::license;
use crate::models::Authorization;

#[derive(Debug, Deserialize)]
pub struct StartScanRequest {
    pub code: String,
    /// Generated server-side when absent, matching first-run clients that
    /// have not persisted an identifier yet.
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartScanResponse {
    pub authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_left: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<serde_json::Value>,
}

/// POST /api/scan/start
///
/// Asks the gate whether this device may scan under this code; on a grant,
/// runs the injected scan engine and records the event. Denials come back
/// as 403 with a stable reason code, never as an error.
pub async fn start_scan(
    State(state): State<AppState>,
    Json(req): Json<StartScanRequest>,
) -> Result<(StatusCode, Json<StartScanResponse>)> {
    let conn = state.db.get()?;
    let device_id = req
        .device_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match license::authorize(&conn, &req.code, &device_id)? {
        Authorization::Denied { reason } => {
            tracing::debug!(reason, %device_id, "scan denied");
            Ok((
                StatusCode::FORBIDDEN,
                Json(StartScanResponse {
                    authorized: false,
                    reason: Some(reason),
                    scan_id: None,
                    device_id: None,
                    days_left: None,
                    usage_count: None,
                    report: None,
                }),
            ))
        }
        Authorization::Authorized {
            days_left,
            usage_count,
        } => {
            let report = state.scanner.scan(&device_id)?;
            let scan_id = Uuid::new_v4().to_string();
            let code = normalize_code(&req.code);
            let event = queries::insert_scan_event(&conn, &scan_id, &code, &device_id, &report)?;
            tracing::info!(%scan_id, %code, %device_id, "scan completed");

            Ok((
                StatusCode::OK,
                Json(StartScanResponse {
                    authorized: true,
                    reason: None,
                    scan_id: Some(event.scan_id),
                    device_id: Some(event.device_id),
                    days_left: Some(days_left),
                    usage_count: Some(usage_count),
                    report: Some(event.report),
                }),
            ))
        }
    }
}
