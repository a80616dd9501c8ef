//! License lifecycle: issuance, verification with first-use device binding,
//! renewal, and usage accounting.
//!
//! All functions operate on a caller-supplied connection; the store is an
//! injected dependency, never an ambient global. These functions are the
//! only writers of license rows.

use chrono::Utc;
use rusqlite::Connection;

use crate::code::{generate_code, is_well_formed, normalize_code};
use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{Authorization, License, RenewOutcome, Verification};

const SECONDS_PER_DAY: i64 = 86400;

/// Largest window a caller may request, in days (one century). Keeps the
/// expiry arithmetic far away from i64 overflow.
const MAX_DURATION_DAYS: i64 = 36_500;

/// Generator collisions are vanishingly rare at 80 bits; a handful of
/// retries is plenty before treating the store as broken.
const MAX_CODE_ATTEMPTS: u32 = 5;

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Days until `expires_at`, rounded up. `now <= expires_at` is assumed.
fn days_left(expires_at: i64, now: i64) -> i64 {
    (expires_at - now + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}

/// Issue a new license for `email`, valid for `duration_days` from now.
///
/// Input validation happens before any store access. Code collisions are
/// retried transparently; the table's primary key is the authority.
pub fn issue(conn: &Connection, email: &str, duration_days: i64) -> Result<License> {
    issue_with_generator(conn, email, duration_days, generate_code)
}

/// The generator is injectable so tests can force code collisions.
fn issue_with_generator(
    conn: &Connection,
    email: &str,
    duration_days: i64,
    mut next_code: impl FnMut() -> String,
) -> Result<License> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("invalid email address".into()));
    }
    if duration_days <= 0 || duration_days > MAX_DURATION_DAYS {
        return Err(AppError::BadRequest(format!(
            "duration_days must be between 1 and {}",
            MAX_DURATION_DAYS
        )));
    }

    let created_at = now();
    let expires_at = created_at + duration_days * SECONDS_PER_DAY;

    for _ in 0..MAX_CODE_ATTEMPTS {
        let license = License {
            code: next_code(),
            email: email.to_string(),
            device_id: None,
            created_at,
            expires_at,
            active: true,
            usage_count: 0,
        };

        match queries::insert_license(conn, &license) {
            Ok(()) => return Ok(license),
            Err(AppError::DuplicateCode) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(AppError::Internal(
        "exhausted license code generation attempts".into(),
    ))
}

/// Verify a code, binding the presenting device on first use.
///
/// The checks run in a fixed order: existence and active flag, then expiry
/// (which deactivates as a side effect), then device binding. Binding is a
/// one-time assignment enforced by a conditional update at the store; of
/// two devices racing on a fresh code, exactly one wins and the other is
/// told the code belongs elsewhere.
pub fn verify(conn: &Connection, code: &str, device_id: Option<&str>) -> Result<Verification> {
    let code = normalize_code(code);
    if !is_well_formed(&code) {
        return Ok(Verification::Invalid);
    }

    let Some(license) = queries::get_license(conn, &code)? else {
        return Ok(Verification::Invalid);
    };
    if !license.active {
        return Ok(Verification::Invalid);
    }

    let now = now();
    if now > license.expires_at {
        queries::deactivate_license(conn, &code)?;
        return Ok(Verification::Expired {
            expired_at: license.expires_at,
        });
    }

    if let Some(device) = device_id {
        match license.device_id.as_deref() {
            Some(bound) if bound != device => return Ok(Verification::DeviceMismatch),
            Some(_) => {}
            None => {
                if !queries::try_bind_device(conn, &code, device)? {
                    // Lost the bind to a concurrent verify. Whoever won owns
                    // the code now; re-read to see if it happens to be us.
                    let bound = queries::get_license(conn, &code)?.and_then(|l| l.device_id);
                    if bound.as_deref() != Some(device) {
                        return Ok(Verification::DeviceMismatch);
                    }
                }
            }
        }
    }

    Ok(Verification::Valid {
        days_left: days_left(license.expires_at, now),
        usage_count: license.usage_count,
    })
}

/// Extend a license by `additional_days` and reactivate it.
///
/// The new window starts from the later of the current expiry and now: an
/// early renewal keeps its remaining days, an expired one restarts from
/// now rather than backdating. Device binding and usage are untouched.
pub fn renew(conn: &Connection, code: &str, additional_days: i64) -> Result<RenewOutcome> {
    if additional_days <= 0 || additional_days > MAX_DURATION_DAYS {
        return Err(AppError::BadRequest(format!(
            "additional_days must be between 1 and {}",
            MAX_DURATION_DAYS
        )));
    }

    let code = normalize_code(code);
    let Some(license) = queries::get_license(conn, &code)? else {
        return Ok(RenewOutcome::NotFound);
    };

    let new_expires_at = license.expires_at.max(now()) + additional_days * SECONDS_PER_DAY;
    queries::renew_license(conn, &code, new_expires_at)?;

    Ok(RenewOutcome::Renewed { new_expires_at })
}

/// Count one authorized scan against the license. Not idempotent; the gate
/// calls it exactly once per granted authorization.
pub fn record_usage(conn: &Connection, code: &str) -> Result<i64> {
    let code = normalize_code(code);
    match queries::increment_usage(conn, &code)? {
        Some(count) => Ok(count),
        None => Err(AppError::NotFound(format!("no license with code {}", code))),
    }
}

/// The gate: may this device scan under this code right now?
///
/// Composes verify and usage recording so a denied attempt is never
/// counted. This is the single entry point scan callers use.
pub fn authorize(conn: &Connection, code: &str, device_id: &str) -> Result<Authorization> {
    match verify(conn, code, Some(device_id))? {
        Verification::Valid { days_left, .. } => {
            let usage_count = record_usage(conn, code)?;
            Ok(Authorization::Authorized {
                days_left,
                usage_count,
            })
        }
        denial => Ok(Authorization::Denied {
            reason: denial.denial_reason().unwrap_or("invalid"),
        }),
    }
}
