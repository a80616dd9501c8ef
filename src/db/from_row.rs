//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub const LICENSE_COLS: &str =
    "code, email, device_id, created_at, expires_at, active, usage_count";

pub const SCAN_EVENT_COLS: &str = "scan_id, code, device_id, report, created_at";

impl FromRow for License {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(License {
            code: row.get(0)?,
            email: row.get(1)?,
            device_id: row.get(2)?,
            created_at: row.get(3)?,
            expires_at: row.get(4)?,
            active: row.get(5)?,
            usage_count: row.get(6)?,
        })
    }
}

impl FromRow for ScanEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        // Stored as JSON text; a row that fails to parse indicates
        // corruption, surfaced as a column type error rather than a panic.
        let raw: String = row.get(3)?;
        let report = serde_json::from_str(&raw).map_err(|_| {
            rusqlite::Error::InvalidColumnType(3, "report".to_string(), rusqlite::types::Type::Text)
        })?;
        Ok(ScanEvent {
            scan_id: row.get(0)?,
            code: row.get(1)?,
            device_id: row.get(2)?,
            report,
            created_at: row.get(4)?,
        })
    }
}
