use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query};
use crate::license;
use crate::models::{CreateLicense, License, RenewOutcome, Verification, VerifyLicense};

/// POST /api/license/create
pub async fn create_license(
    State(state): State<AppState>,
    Json(req): Json<CreateLicense>,
) -> Result<Json<License>> {
    let conn = state.db.get()?;
    let license = license::issue(&conn, &req.email, req.duration_days)?;
    tracing::info!(code = %license.code, email = %license.email, "issued license");
    Ok(Json(license))
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_left: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<i64>,
}

impl From<Verification> for VerifyResponse {
    fn from(outcome: Verification) -> Self {
        let reason = outcome.denial_reason();
        let (days_left, usage_count, expired_at) = match outcome {
            Verification::Valid {
                days_left,
                usage_count,
            } => (Some(days_left), Some(usage_count), None),
            Verification::Expired { expired_at } => (None, None, Some(expired_at)),
            Verification::DeviceMismatch | Verification::Invalid => (None, None, None),
        };
        VerifyResponse {
            valid: reason.is_none(),
            reason,
            days_left,
            usage_count,
            expired_at,
        }
    }
}

/// POST /api/license/verify
pub async fn verify_license(
    State(state): State<AppState>,
    Json(req): Json<VerifyLicense>,
) -> Result<Json<VerifyResponse>> {
    let conn = state.db.get()?;
    let outcome = license::verify(&conn, &req.code, req.device_id.as_deref())?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct RenewParams {
    #[serde(default = "default_additional_days")]
    pub additional_days: i64,
}

fn default_additional_days() -> i64 {
    30
}

#[derive(Debug, Serialize)]
pub struct RenewResponse {
    pub success: bool,
    pub new_expires_at: i64,
}

/// POST /api/license/renew/{code}?additional_days=30
pub async fn renew_license(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<RenewParams>,
) -> Result<Json<RenewResponse>> {
    let conn = state.db.get()?;
    match license::renew(&conn, &code, params.additional_days)? {
        RenewOutcome::Renewed { new_expires_at } => {
            tracing::info!(%code, new_expires_at, "renewed license");
            Ok(Json(RenewResponse {
                success: true,
                new_expires_at,
            }))
        }
        RenewOutcome::NotFound => Err(AppError::NotFound("license code not found".into())),
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub count: usize,
    pub licenses: Vec<License>,
}

/// GET /api/license/list - administrative listing, newest first
pub async fn list_licenses(State(state): State<AppState>) -> Result<Json<ListResponse>> {
    let conn = state.db.get()?;
    let licenses = queries::list_licenses(&conn)?;
    Ok(Json(ListResponse {
        count: licenses.len(),
        licenses,
    }))
}
