use serde::{Deserialize, Serialize};

/// A license row. The code is the primary key and the shared secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    /// Normalized (uppercase) license code, immutable once created
    pub code: String,
    /// Owner email, set at issuance
    pub email: String,
    /// Device the code is bound to. Unset until the first verify that
    /// presents a device id; immutable after that, renewals included.
    pub device_id: Option<String>,
    pub created_at: i64,
    /// Mutated only by renewal
    pub expires_at: i64,
    /// Flipped to false when a verify observes expiry; only renewal
    /// flips it back
    pub active: bool,
    /// Incremented once per authorized scan
    pub usage_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateLicense {
    pub email: String,
    #[serde(default = "default_duration_days")]
    pub duration_days: i64,
}

fn default_duration_days() -> i64 {
    30
}

#[derive(Debug, Deserialize)]
pub struct VerifyLicense {
    pub code: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Outcome of a verify call. Denials are ordinary results, not errors:
/// an unknown or expired code is an expected input, and callers branch
/// on the variant rather than catching a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid { days_left: i64, usage_count: i64 },
    /// The expiry that was exceeded; the license has been deactivated.
    Expired { expired_at: i64 },
    /// The code is locked to a different device.
    DeviceMismatch,
    /// Unknown code, or deactivated by a previously observed expiry.
    Invalid,
}

impl Verification {
    /// Stable machine-readable reason for a denial, None when valid.
    pub fn denial_reason(&self) -> Option<&'static str> {
        match self {
            Verification::Valid { .. } => None,
            Verification::Expired { .. } => Some("expired"),
            Verification::DeviceMismatch => Some("device_mismatch"),
            Verification::Invalid => Some("invalid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewOutcome {
    Renewed { new_expires_at: i64 },
    NotFound,
}

/// Decision of the gate: verify plus usage accounting in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Authorized { days_left: i64, usage_count: i64 },
    Denied { reason: &'static str },
}
