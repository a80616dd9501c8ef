use rusqlite::Connection;

/// Initialize the database schema
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Licenses: one row per issued code. The code itself is the key.
        -- device_id stays NULL until the first verify that presents a
        -- device; binding is a conditional update on "device_id IS NULL".
        CREATE TABLE IF NOT EXISTS licenses (
            code TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            device_id TEXT,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            usage_count INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_licenses_created ON licenses(created_at DESC);

        -- Scan events: append-only audit trail of authorized scans.
        -- report holds the engine's payload as JSON text, uninterpreted.
        CREATE TABLE IF NOT EXISTS scan_events (
            scan_id TEXT PRIMARY KEY,
            code TEXT NOT NULL REFERENCES licenses(code),
            device_id TEXT NOT NULL,
            report TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_scan_events_code ON scan_events(code, created_at DESC);
        "#,
    )?;
    Ok(())
}
