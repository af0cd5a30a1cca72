//! Integrity hashing for corrections and location evidence.
//!
//! # Responsibility
//! - Canonicalize hashed records into one delimiter-joined string.
//! - Digest with SHA-256 and render lower-case hex.
//!
//! # Invariants
//! - Times are rendered by `timefmt::exact` (UTC, nanosecond fraction).
//! - An absent time is rendered as `timefmt::ABSENT_TIME_TOKEN`.
//! - Floating-point fields use ten fractional digits.
//! - A correction's own `integrity_hash` is never part of its digest.

use crate::model::correction::AttendanceCorrection;
use crate::model::evidence::LocationEvidence;
use crate::timefmt::{exact, exact_or, ABSENT_TIME_TOKEN};
use sha2::{Digest, Sha256};

const FIELD_DELIMITER: &str = "|";

/// Digests the hashed fields of a correction.
pub fn hash_correction(correction: &AttendanceCorrection) -> String {
    let fields = [
        correction.id.to_string(),
        correction.attendance_interval_id.to_string(),
        correction.reason.clone(),
        exact(correction.before.entry_time),
        exact_or(correction.before.exit_time, ABSENT_TIME_TOKEN),
        exact(correction.after.entry_time),
        exact_or(correction.after.exit_time, ABSENT_TIME_TOKEN),
        exact(correction.corrected_at),
    ];
    sha256_hex(&fields.join(FIELD_DELIMITER))
}

pub fn verify_correction(correction: &AttendanceCorrection, hash: &str) -> bool {
    hash_correction(correction) == hash
}

/// Digests the hashed fields of one evidence record.
pub fn hash_location_evidence(evidence: &LocationEvidence) -> String {
    let fields = [
        evidence.id.to_string(),
        evidence.place_id.to_string(),
        evidence.attendance_interval_id.to_string(),
        exact(evidence.timestamp),
        normalized_float(evidence.latitude),
        normalized_float(evidence.longitude),
        normalized_float(evidence.horizontal_accuracy),
        evidence.reason.as_str().to_string(),
    ];
    sha256_hex(&fields.join(FIELD_DELIMITER))
}

pub fn verify_location_evidence(evidence: &LocationEvidence, hash: &str) -> bool {
    hash_location_evidence(evidence) == hash
}

pub(crate) fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

fn normalized_float(value: f64) -> String {
    format!("{value:.10}")
}
