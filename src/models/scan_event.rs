use serde::{Deserialize, Serialize};

/// Audit record of one authorized scan. The report payload comes from the
/// scan engine and is stored verbatim; the licensing core never inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    pub scan_id: String,
    /// License code the scan was authorized under
    pub code: String,
    pub device_id: String,
    pub report: serde_json::Value,
    pub created_at: i64,
}
