//! Canonical and display time formatting.
//!
//! # Invariants
//! - Canonical strings are UTC, millisecond precision, `Z` suffix. Export
//!   depends on this exact shape.
//! - Exact strings keep all nine fractional digits. Integrity digests use
//!   them, so any stored instant change alters the digest.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};

/// Token written in place of an absent optional instant.
pub const ABSENT_TIME_TOKEN: &str = "none";

/// Canonical UTC ISO-8601 string with fractional seconds.
pub fn canonical(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// UTC ISO-8601 string with nanosecond fraction, for hash input.
pub fn exact(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Exact string for an optional instant, `absent` when `None`.
pub fn exact_or(instant: Option<DateTime<Utc>>, absent: &str) -> String {
    match instant {
        Some(value) => exact(value),
        None => absent.to_string(),
    }
}

/// Canonical string for an optional instant, `absent` when `None`.
pub fn canonical_or(instant: Option<DateTime<Utc>>, absent: &str) -> String {
    match instant {
        Some(value) => canonical(value),
        None => absent.to_string(),
    }
}

/// Renders `YYYY-MM-DD HH:MM` in the given offset.
///
/// Storage always keeps the absolute UTC instant; only rendering shifts.
pub fn display(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}
