//! Attendance correction model.
//!
//! # Responsibility
//! - Capture one manual edit of an attendance interval as an audit entry.
//!
//! # Invariants
//! - Corrections are append-only; they never rewrite the interval ledger.
//! - `integrity_hash` is computed over every other field before the record
//!   is stored and is never recomputed in place.
//! - `after.exit_time`, when present, is not earlier than `after.entry_time`.

use crate::model::attendance::{AttendanceSnapshot, IntervalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable correction identifier.
pub type CorrectionId = Uuid;

/// One self-certifying manual edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceCorrection {
    pub id: CorrectionId,
    pub attendance_interval_id: IntervalId,
    pub reason: String,
    pub before: AttendanceSnapshot,
    pub after: AttendanceSnapshot,
    pub corrected_at: DateTime<Utc>,
    /// SHA-256 hex over the fields above.
    pub integrity_hash: String,
}

/// Caller input for a new correction.
///
/// `before` is not part of the request; it is taken from the current
/// effective state of the interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionRequest {
    pub attendance_interval_id: IntervalId,
    pub reason: String,
    pub after: AttendanceSnapshot,
}
