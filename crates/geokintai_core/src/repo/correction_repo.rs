//! Attendance correction ledger (append-only).
//!
//! # Invariants
//! - The ledger stores whatever it is given; validation and hashing happen in
//!   `CorrectionService` before `append` is called.

use crate::model::attendance::IntervalId;
use crate::model::correction::AttendanceCorrection;
use crate::repo::{notify, ChangeHook, LedgerKind};

/// In-memory correction ledger.
#[derive(Default)]
pub struct CorrectionRepository {
    corrections: Vec<AttendanceCorrection>,
    on_change: Option<ChangeHook>,
}

impl CorrectionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(corrections: Vec<AttendanceCorrection>) -> Self {
        Self {
            corrections,
            on_change: None,
        }
    }

    pub fn set_change_hook(&mut self, hook: ChangeHook) {
        self.on_change = Some(hook);
    }

    pub fn append(&mut self, correction: AttendanceCorrection) {
        self.corrections.push(correction);
        notify(&self.on_change, LedgerKind::Corrections);
    }

    /// Corrections for one interval ordered by `corrected_at`.
    ///
    /// Ties keep ledger order.
    pub fn fetch_by_interval(&self, interval_id: IntervalId) -> Vec<&AttendanceCorrection> {
        let mut items: Vec<_> = self
            .corrections
            .iter()
            .filter(|item| item.attendance_interval_id == interval_id)
            .collect();
        items.sort_by_key(|item| item.corrected_at);
        items
    }

    /// Most recent correction for one interval.
    pub fn latest_for(&self, interval_id: IntervalId) -> Option<&AttendanceCorrection> {
        self.fetch_by_interval(interval_id).last().copied()
    }

    pub fn fetch_all(&self) -> &[AttendanceCorrection] {
        &self.corrections
    }

    pub fn len(&self) -> usize {
        self.corrections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty()
    }
}
