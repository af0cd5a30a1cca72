//! Location evidence model.
//!
//! # Responsibility
//! - Record the location sample that justified an attendance transition.
//!
//! # Invariants
//! - Evidence is append-only; a stored record is never edited.
//! - Every record links to exactly one attendance interval.

use crate::model::attendance::IntervalId;
use crate::model::place::PlaceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable evidence identifier.
pub type EvidenceId = Uuid;

/// Why a piece of evidence was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceReason {
    /// Boundary-crossing signal from the region monitor.
    EntryTrigger,
    /// Arrival confirmed after the stay window.
    StayCheck,
    /// Departure confirmed after the exit recheck window.
    ExitCheck,
}

impl EvidenceReason {
    /// Stable wire value, shared by hashing and export.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EntryTrigger => "entry_trigger",
            Self::StayCheck => "stay_check",
            Self::ExitCheck => "exit_check",
        }
    }
}

/// One location sample attached to an attendance interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEvidence {
    pub id: EvidenceId,
    pub place_id: PlaceId,
    pub attendance_interval_id: IntervalId,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters, as reported by the location provider.
    pub horizontal_accuracy: f64,
    pub reason: EvidenceReason,
}

impl LocationEvidence {
    /// Creates evidence with a generated id.
    pub fn new(
        place_id: PlaceId,
        attendance_interval_id: IntervalId,
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        horizontal_accuracy: f64,
        reason: EvidenceReason,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            place_id,
            attendance_interval_id,
            timestamp,
            latitude,
            longitude,
            horizontal_accuracy,
            reason,
        }
    }
}
