//! Attendance interval ledger.
//!
//! # Responsibility
//! - Create and close attendance intervals on confirmed transitions.
//!
//! # Invariants
//! - For any place, at most one interval has `exit_time == None`.
//! - `create_open_record` is idempotent while an interval is open.
//! - Intervals are never deleted.

use crate::model::attendance::{AttendanceInterval, IntervalId};
use crate::model::place::PlaceId;
use crate::repo::{notify, ChangeHook, LedgerKind, RepoError, RepoResult};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// In-memory attendance ledger.
#[derive(Default)]
pub struct AttendanceRepository {
    records: Vec<AttendanceInterval>,
    on_change: Option<ChangeHook>,
}

impl AttendanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a ledger from persisted records.
    ///
    /// # Errors
    /// - `InvalidData` when a place has more than one open interval or an
    ///   interval exits before it enters.
    pub fn from_records(records: Vec<AttendanceInterval>) -> RepoResult<Self> {
        let mut open_places = HashSet::new();
        for record in &records {
            if !record.snapshot().is_ordered() {
                return Err(RepoError::InvalidData(format!(
                    "interval {} exits before it enters",
                    record.id
                )));
            }
            if record.is_open() && !open_places.insert(record.place_id) {
                return Err(RepoError::InvalidData(format!(
                    "place {} has more than one open interval",
                    record.place_id
                )));
            }
        }

        Ok(Self {
            records,
            on_change: None,
        })
    }

    pub fn set_change_hook(&mut self, hook: ChangeHook) {
        self.on_change = Some(hook);
    }

    /// Opens an interval for `place_id`, or returns the one already open.
    pub fn create_open_record(
        &mut self,
        place_id: PlaceId,
        entry_time: DateTime<Utc>,
    ) -> AttendanceInterval {
        if let Some(existing) = self.fetch_open_record(place_id) {
            return existing.clone();
        }

        let record = AttendanceInterval::open(place_id, entry_time);
        self.records.push(record.clone());
        notify(&self.on_change, LedgerKind::Attendance);
        record
    }

    /// Closes the open interval for `place_id`.
    ///
    /// # Errors
    /// - `NoOpenInterval` when nothing is open for the place.
    /// - `ExitBeforeEntry` when `exit_time` precedes the entry.
    pub fn close_open_record(
        &mut self,
        place_id: PlaceId,
        exit_time: DateTime<Utc>,
    ) -> RepoResult<AttendanceInterval> {
        let record = self
            .records
            .iter_mut()
            .find(|record| record.place_id == place_id && record.is_open())
            .ok_or(RepoError::NoOpenInterval(place_id))?;

        if exit_time < record.entry_time {
            return Err(RepoError::ExitBeforeEntry(record.id));
        }

        record.exit_time = Some(exit_time);
        let closed = record.clone();
        notify(&self.on_change, LedgerKind::Attendance);
        Ok(closed)
    }

    pub fn fetch_open_record(&self, place_id: PlaceId) -> Option<&AttendanceInterval> {
        self.records
            .iter()
            .find(|record| record.place_id == place_id && record.is_open())
    }

    pub fn fetch_by_id(&self, id: IntervalId) -> Option<&AttendanceInterval> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Intervals for one place in insertion order.
    pub fn fetch_by_place(&self, place_id: PlaceId) -> Vec<&AttendanceInterval> {
        self.records
            .iter()
            .filter(|record| record.place_id == place_id)
            .collect()
    }

    pub fn fetch_all(&self) -> &[AttendanceInterval] {
        &self.records
    }

    pub fn open_count(&self, place_id: PlaceId) -> usize {
        self.records
            .iter()
            .filter(|record| record.place_id == place_id && record.is_open())
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::AttendanceRepository;
    use crate::model::attendance::AttendanceInterval;
    use crate::repo::{LedgerKind, RepoError};
    use chrono::{DateTime, Duration};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[test]
    fn change_hook_fires_only_on_mutation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut repo = AttendanceRepository::new();
        repo.set_change_hook(Arc::new(move |kind| sink.lock().unwrap().push(kind)));

        let place = Uuid::new_v4();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        repo.create_open_record(place, now);
        repo.create_open_record(place, now + Duration::seconds(5));
        repo.close_open_record(place, now + Duration::seconds(60))
            .expect("close open interval");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![LedgerKind::Attendance, LedgerKind::Attendance]
        );
    }

    #[test]
    fn close_rejects_exit_before_entry() {
        let mut repo = AttendanceRepository::new();
        let place = Uuid::new_v4();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let open = repo.create_open_record(place, now);

        let err = repo
            .close_open_record(place, now - Duration::seconds(1))
            .expect_err("inverted close must fail");
        assert_eq!(err, RepoError::ExitBeforeEntry(open.id));
        assert!(repo.fetch_open_record(place).is_some());
    }

    #[test]
    fn from_records_rejects_two_open_intervals_for_one_place() {
        let place = Uuid::new_v4();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let records = vec![
            AttendanceInterval::open(place, now),
            AttendanceInterval::open(place, now + Duration::seconds(10)),
        ];

        let err = AttendanceRepository::from_records(records)
            .err()
            .expect("duplicate open intervals must be rejected");
        assert!(matches!(err, RepoError::InvalidData(_)));
    }
}
