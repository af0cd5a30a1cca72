//! Correction use-case service.
//!
//! # Responsibility
//! - Validate correction requests before any ledger write.
//! - Populate and hash corrections, then append them.
//! - Derive the effective (corrected) view of an interval.
//!
//! # Invariants
//! - A rejected request never touches the correction ledger.
//! - `integrity_hash` is computed over the fully populated record and is
//!   never a placeholder when appended.
//! - `before` is the interval's effective state at correction time.

use crate::clock::SharedClock;
use crate::model::attendance::{AttendanceInterval, AttendanceSnapshot, IntervalId};
use crate::model::correction::{AttendanceCorrection, CorrectionRequest};
use crate::repo::attendance_repo::AttendanceRepository;
use crate::repo::correction_repo::CorrectionRepository;
use crate::service::integrity::hash_correction;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Rejection reason for a correction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyReason,
    /// `after.exit_time` precedes `after.entry_time`.
    InvertedTimes,
    IntervalNotFound(IntervalId),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyReason => write!(f, "correction reason must not be empty"),
            Self::InvertedTimes => write!(f, "corrected exit time precedes entry time"),
            Self::IntervalNotFound(id) => write!(f, "attendance interval not found: {id}"),
        }
    }
}

impl Error for ValidationError {}

impl ValidationError {
    /// Stable machine code for logs and FFI envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyReason => "empty_reason",
            Self::InvertedTimes => "inverted_times",
            Self::IntervalNotFound(_) => "interval_not_found",
        }
    }
}

/// Use-case service for appending validated corrections.
pub struct CorrectionService {
    clock: SharedClock,
}

impl CorrectionService {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    /// Validates, hashes and appends one correction.
    ///
    /// # Errors
    /// - `EmptyReason` when the reason is blank after trimming.
    /// - `InvertedTimes` when `after` exits before it enters.
    /// - `IntervalNotFound` when the referenced interval does not exist.
    pub fn apply(
        &self,
        attendance: &AttendanceRepository,
        corrections: &mut CorrectionRepository,
        request: CorrectionRequest,
    ) -> Result<AttendanceCorrection, ValidationError> {
        let before = match validate(attendance, corrections, &request) {
            Ok(before) => before,
            Err(err) => {
                warn!(
                    "event=correction_apply module=correction status=error interval_id={} error_code={}",
                    request.attendance_interval_id,
                    err.code()
                );
                return Err(err);
            }
        };

        let mut correction = AttendanceCorrection {
            id: Uuid::new_v4(),
            attendance_interval_id: request.attendance_interval_id,
            reason: request.reason,
            before,
            after: request.after,
            corrected_at: self.clock.now(),
            integrity_hash: String::new(),
        };
        correction.integrity_hash = hash_correction(&correction);
        corrections.append(correction.clone());

        info!(
            "event=correction_apply module=correction status=ok interval_id={} correction_id={}",
            correction.attendance_interval_id, correction.id
        );
        Ok(correction)
    }
}

/// Current effective state of `interval` after applying its latest correction.
pub fn effective_snapshot(
    interval: &AttendanceInterval,
    corrections: &CorrectionRepository,
) -> AttendanceSnapshot {
    corrections
        .latest_for(interval.id)
        .map(|correction| correction.after)
        .unwrap_or_else(|| interval.snapshot())
}

fn validate(
    attendance: &AttendanceRepository,
    corrections: &CorrectionRepository,
    request: &CorrectionRequest,
) -> Result<AttendanceSnapshot, ValidationError> {
    if request.reason.trim().is_empty() {
        return Err(ValidationError::EmptyReason);
    }
    if !request.after.is_ordered() {
        return Err(ValidationError::InvertedTimes);
    }
    let interval = attendance
        .fetch_by_id(request.attendance_interval_id)
        .ok_or(ValidationError::IntervalNotFound(request.attendance_interval_id))?;
    Ok(effective_snapshot(interval, corrections))
}
