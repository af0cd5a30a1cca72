//! Location evidence ledger (append-only).

use crate::model::attendance::IntervalId;
use crate::model::evidence::LocationEvidence;
use crate::model::place::PlaceId;
use crate::repo::{notify, ChangeHook, LedgerKind};

/// In-memory evidence ledger.
#[derive(Default)]
pub struct EvidenceRepository {
    evidence: Vec<LocationEvidence>,
    on_change: Option<ChangeHook>,
}

impl EvidenceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(evidence: Vec<LocationEvidence>) -> Self {
        Self {
            evidence,
            on_change: None,
        }
    }

    pub fn set_change_hook(&mut self, hook: ChangeHook) {
        self.on_change = Some(hook);
    }

    pub fn append(&mut self, evidence: LocationEvidence) {
        self.evidence.push(evidence);
        notify(&self.on_change, LedgerKind::Evidence);
    }

    /// Evidence for one interval, oldest first.
    pub fn fetch_by_interval(&self, interval_id: IntervalId) -> Vec<&LocationEvidence> {
        let mut items: Vec<_> = self
            .evidence
            .iter()
            .filter(|item| item.attendance_interval_id == interval_id)
            .collect();
        items.sort_by_key(|item| item.timestamp);
        items
    }

    /// Evidence for one place, oldest first.
    pub fn fetch_by_place(&self, place_id: PlaceId) -> Vec<&LocationEvidence> {
        let mut items: Vec<_> = self
            .evidence
            .iter()
            .filter(|item| item.place_id == place_id)
            .collect();
        items.sort_by_key(|item| item.timestamp);
        items
    }

    pub fn fetch_all(&self) -> &[LocationEvidence] {
        &self.evidence
    }

    pub fn len(&self) -> usize {
        self.evidence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evidence.is_empty()
    }
}
