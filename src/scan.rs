//! Scan engine boundary.
//!
//! The licensing core never inspects a scan report; it authorizes the scan,
//! hands the device id to whatever engine is injected, and stores the
//! resulting payload verbatim.

use chrono::Utc;

use crate::error::Result;

/// Produces a diagnostic report for a device. Implementations are external
/// collaborators (hardware probes, remote agents); the core only requires
/// an opaque JSON payload.
pub trait ScanEngine: Send + Sync {
    fn scan(&self, device_id: &str) -> Result<serde_json::Value>;
}

/// Minimal engine wired in by default: records scan metadata only.
/// A real hardware scanner implements [`ScanEngine`] and replaces it at
/// composition time.
pub struct BasicScanEngine;

impl ScanEngine for BasicScanEngine {
    fn scan(&self, device_id: &str) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "device_id": device_id,
            "scanned_at": Utc::now().timestamp(),
            "components": {},
        }))
    }
}
