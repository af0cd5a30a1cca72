//! Self-verifying ledger export.
//!
//! # Responsibility
//! - Render attendance, corrections and evidence into a canonical body.
//! - Append a trailing `integrity_hash,<hex>` line over that body.
//! - Verify exported content independently of how it was produced.
//!
//! # Invariants
//! - The digest never covers any `integrity_hash,` line, so verification
//!   is idempotent.
//! - Free text is sanitized so no field can inject a line or a column.

use crate::clock::SharedClock;
use crate::model::attendance::AttendanceInterval;
use crate::model::correction::AttendanceCorrection;
use crate::model::evidence::LocationEvidence;
use crate::service::integrity::{hash_location_evidence, sha256_hex};
use crate::timefmt::{canonical, canonical_or};
use chrono::{DateTime, Utc};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Line prefix carrying the export digest.
pub const INTEGRITY_LINE_PREFIX: &str = "integrity_hash,";

static UNSAFE_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,\r\n]").expect("valid export sanitize regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Pdf => "pdf",
        }
    }
}

/// Export handed to the consumer. `content` carries its own digest line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPayload {
    pub format: ExportFormat,
    pub content: String,
    pub generated_at: DateTime<Utc>,
    pub integrity_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// All three ledgers are empty.
    NoData,
    /// A built payload failed its own verification.
    IntegrityMismatch,
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoData => write!(f, "nothing to export"),
            Self::IntegrityMismatch => write!(f, "export content does not match its digest"),
        }
    }
}

impl Error for ExportError {}

/// Builds export payloads stamped with the injected clock.
pub struct ExportService {
    clock: SharedClock,
}

impl ExportService {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    /// Builds one payload over the given ledgers.
    ///
    /// # Errors
    /// - `NoData` when every collection is empty.
    pub fn build_export(
        &self,
        format: ExportFormat,
        attendance: &[AttendanceInterval],
        corrections: &[AttendanceCorrection],
        evidence: &[LocationEvidence],
    ) -> Result<ExportPayload, ExportError> {
        if attendance.is_empty() && corrections.is_empty() && evidence.is_empty() {
            return Err(ExportError::NoData);
        }

        let generated_at = self.clock.now();
        let mut lines = Vec::new();
        if format == ExportFormat::Pdf {
            lines.push("PDF_EXPORT".to_string());
        }
        lines.push(format!("generated_at,{}", canonical(generated_at)));
        lines.push(format!("format,{}", format.as_str()));
        if format == ExportFormat::Pdf {
            lines.push(format!("attendance_count,{}", attendance.len()));
            lines.push(format!("correction_count,{}", corrections.len()));
            lines.push(format!("evidence_count,{}", evidence.len()));
        }
        push_sections(&mut lines, attendance, corrections, evidence);

        let body = lines.join("\n");
        let integrity_hash = sha256_hex(&body);
        let content = format!("{body}\n{INTEGRITY_LINE_PREFIX}{integrity_hash}");

        info!(
            "event=export_build module=export status=ok format={} attendance={} corrections={} evidence={}",
            format.as_str(),
            attendance.len(),
            corrections.len(),
            evidence.len()
        );

        Ok(ExportPayload {
            format,
            content,
            generated_at,
            integrity_hash,
        })
    }

    /// Recomputes the digest of `content` without its digest lines.
    pub fn verify(content: &str, hash: &str) -> bool {
        let body = content
            .split('\n')
            .filter(|line| !line.starts_with(INTEGRITY_LINE_PREFIX))
            .collect::<Vec<_>>()
            .join("\n");
        sha256_hex(&body) == hash
    }
}

fn push_sections(
    lines: &mut Vec<String>,
    attendance: &[AttendanceInterval],
    corrections: &[AttendanceCorrection],
    evidence: &[LocationEvidence],
) {
    lines.push("[attendance]".to_string());
    lines.push("attendance_id,place_id,entry_time,exit_time".to_string());
    lines.extend(attendance.iter().map(|record| {
        format!(
            "{},{},{},{}",
            record.id,
            record.place_id,
            canonical(record.entry_time),
            canonical_or(record.exit_time, "")
        )
    }));

    lines.push("[corrections]".to_string());
    lines.push(
        "correction_id,attendance_id,reason,before_entry,before_exit,after_entry,after_exit,corrected_at,record_hash"
            .to_string(),
    );
    lines.extend(corrections.iter().map(|correction| {
        format!(
            "{},{},{},{},{},{},{},{},{}",
            correction.id,
            correction.attendance_interval_id,
            sanitize(&correction.reason),
            canonical(correction.before.entry_time),
            canonical_or(correction.before.exit_time, ""),
            canonical(correction.after.entry_time),
            canonical_or(correction.after.exit_time, ""),
            canonical(correction.corrected_at),
            sanitize(&correction.integrity_hash)
        )
    }));

    lines.push("[evidence]".to_string());
    lines.push(
        "evidence_id,attendance_id,place_id,timestamp,latitude,longitude,horizontal_accuracy,reason,record_hash"
            .to_string(),
    );
    lines.extend(evidence.iter().map(|item| {
        format!(
            "{},{},{},{},{},{},{},{},{}",
            item.id,
            item.attendance_interval_id,
            item.place_id,
            canonical(item.timestamp),
            item.latitude,
            item.longitude,
            item.horizontal_accuracy,
            item.reason.as_str(),
            hash_location_evidence(item)
        )
    }));
}

pub(crate) fn sanitize(input: &str) -> String {
    UNSAFE_TEXT_RE.replace_all(input, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::{sanitize, ExportError, ExportFormat, ExportService};
    use crate::clock::ManualClock;
    use crate::model::attendance::AttendanceInterval;
    use chrono::DateTime;
    use std::sync::Arc;
    use uuid::Uuid;

    fn service() -> ExportService {
        ExportService::new(Arc::new(ManualClock::at_epoch_seconds(1_700_000_000)))
    }

    #[test]
    fn empty_ledgers_are_no_data() {
        assert_eq!(
            service().build_export(ExportFormat::Csv, &[], &[], &[]),
            Err(ExportError::NoData)
        );
    }

    #[test]
    fn csv_body_starts_with_metadata_and_ends_with_digest_line() {
        let entry = DateTime::from_timestamp(1_699_990_000, 0).unwrap();
        let interval = AttendanceInterval::open(Uuid::new_v4(), entry);
        let payload = service()
            .build_export(ExportFormat::Csv, &[interval.clone()], &[], &[])
            .expect("non-empty export");

        let lines: Vec<_> = payload.content.lines().collect();
        assert_eq!(lines[0], "generated_at,2023-11-14T22:13:20.000Z");
        assert_eq!(lines[1], "format,csv");
        assert!(lines.contains(&format!(
            "{},{},2023-11-14T19:26:40.000Z,",
            interval.id, interval.place_id
        )
        .as_str()));
        assert_eq!(
            lines.last().copied(),
            Some(format!("integrity_hash,{}", payload.integrity_hash).as_str())
        );
    }

    #[test]
    fn pdf_body_carries_counts() {
        let interval = AttendanceInterval::open(
            Uuid::new_v4(),
            DateTime::from_timestamp(1_699_990_000, 0).unwrap(),
        );
        let payload = service()
            .build_export(ExportFormat::Pdf, &[interval], &[], &[])
            .expect("non-empty export");
        assert!(payload.content.starts_with("PDF_EXPORT\n"));
        assert!(payload.content.contains("\nattendance_count,1\n"));
        assert!(payload.content.contains("\nevidence_count,0\n"));
    }

    #[test]
    fn verify_rejects_edited_body() {
        let interval = AttendanceInterval::open(
            Uuid::new_v4(),
            DateTime::from_timestamp(1_699_990_000, 0).unwrap(),
        );
        let payload = service()
            .build_export(ExportFormat::Csv, &[interval], &[], &[])
            .expect("non-empty export");
        let edited = payload.content.replacen("format,csv", "format,pdf", 1);
        assert!(!ExportService::verify(&edited, &payload.integrity_hash));
    }

    #[test]
    fn sanitize_replaces_commas_and_line_breaks() {
        assert_eq!(sanitize("late, train\r\ndelay"), "late  train  delay");
    }
}
