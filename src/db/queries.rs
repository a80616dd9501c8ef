//! License store operations.
//!
//! This module is the only place license rows are read or written. Every
//! mutation is a single conditional UPDATE so that concurrent callers on the
//! same code cannot interleave a read-check-write sequence: device binding is
//! a compare-and-set on `device_id IS NULL`, and usage accounting increments
//! in SQL rather than in application code.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{AppError, Result};
use crate::models::{License, ScanEvent};

use super::from_row::{query_all, query_one, LICENSE_COLS, SCAN_EVENT_COLS};

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Insert a freshly issued license.
///
/// Fails with [`AppError::DuplicateCode`] if the code already exists; the
/// primary key is the authority on uniqueness, not the generator's
/// randomness, and the caller regenerates and retries.
pub fn insert_license(conn: &Connection, license: &License) -> Result<()> {
    let result = conn.execute(
        "INSERT INTO licenses (code, email, device_id, created_at, expires_at, active, usage_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &license.code,
            &license.email,
            &license.device_id,
            license.created_at,
            license.expires_at,
            license.active,
            license.usage_count,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(AppError::DuplicateCode)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_license(conn: &Connection, code: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE code = ?1", LICENSE_COLS),
        &[&code],
    )
}

/// All licenses, newest first (rowid breaks ties within one second).
pub fn list_licenses(conn: &Connection) -> Result<Vec<License>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM licenses ORDER BY created_at DESC, rowid DESC",
            LICENSE_COLS
        ),
        &[],
    )
}

/// Atomically bind a device to an unbound license.
///
/// The WHERE clause is the critical section: of two concurrent callers on a
/// freshly issued code, exactly one UPDATE matches. Returns true if this
/// call performed the bind.
pub fn try_bind_device(conn: &Connection, code: &str, device_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE licenses SET device_id = ?1 WHERE code = ?2 AND device_id IS NULL",
        params![device_id, code],
    )?;
    Ok(affected > 0)
}

/// Flip `active` off after an observed expiry. Idempotent and safe to race;
/// concurrent observers converge on the same state.
pub fn deactivate_license(conn: &Connection, code: &str) -> Result<()> {
    conn.execute(
        "UPDATE licenses SET active = 0 WHERE code = ?1",
        params![code],
    )?;
    Ok(())
}

/// Apply a renewal: new expiry, and reactivate unconditionally.
/// Returns false if the code does not exist.
pub fn renew_license(conn: &Connection, code: &str, new_expires_at: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE licenses SET expires_at = ?1, active = 1 WHERE code = ?2",
        params![new_expires_at, code],
    )?;
    Ok(affected > 0)
}

/// Increment the usage counter in SQL and return the new count.
///
/// Returns None if the code does not exist. The increment happens at the
/// store so concurrent authorized scans never lose updates.
pub fn increment_usage(conn: &Connection, code: &str) -> Result<Option<i64>> {
    conn.query_row(
        "UPDATE licenses SET usage_count = usage_count + 1 WHERE code = ?1 RETURNING usage_count",
        params![code],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

/// Record one authorized scan with its opaque report payload.
pub fn insert_scan_event(
    conn: &Connection,
    scan_id: &str,
    code: &str,
    device_id: &str,
    report: &serde_json::Value,
) -> Result<ScanEvent> {
    let created_at = now();
    conn.execute(
        "INSERT INTO scan_events (scan_id, code, device_id, report, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![scan_id, code, device_id, report.to_string(), created_at],
    )?;

    Ok(ScanEvent {
        scan_id: scan_id.to_string(),
        code: code.to_string(),
        device_id: device_id.to_string(),
        report: report.clone(),
        created_at,
    })
}

/// Scan history for one license, newest first.
pub fn list_scan_events_for_code(conn: &Connection, code: &str) -> Result<Vec<ScanEvent>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM scan_events WHERE code = ?1 ORDER BY created_at DESC, rowid DESC",
            SCAN_EVENT_COLS
        ),
        &[&code],
    )
}
