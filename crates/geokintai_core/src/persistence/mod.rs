//! Snapshot persistence contract.
//!
//! # Responsibility
//! - Define the full-ledger snapshot exchanged with a persistence
//!   collaborator.
//! - Guard that append-only ledgers only grew since the last save.
//!
//! # Invariants
//! - A failed save leaves in-memory state untouched; callers decide whether
//!   to retry.
//! - A missing snapshot loads as empty.

pub mod json_store;

use crate::model::attendance::AttendanceInterval;
use crate::model::correction::AttendanceCorrection;
use crate::model::evidence::LocationEvidence;
use crate::model::place::Place;
use crate::repo::append_only::is_append_only;
use crate::repo::LedgerKind;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use json_store::JsonFileSnapshotStore;

pub type PersistResult<T> = Result<T, PersistenceError>;

/// Every ledger at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default)]
    pub attendance: Vec<AttendanceInterval>,
    #[serde(default)]
    pub corrections: Vec<AttendanceCorrection>,
    #[serde(default)]
    pub evidence: Vec<LocationEvidence>,
}

impl LedgerSnapshot {
    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
            && self.attendance.is_empty()
            && self.corrections.is_empty()
            && self.evidence.is_empty()
    }
}

#[derive(Debug)]
pub enum PersistenceError {
    Io(std::io::Error),
    Serde(serde_json::Error),
    /// An append-only ledger lost or rewrote entries since the last save.
    AppendOnlyViolation(LedgerKind),
    /// Test or collaborator-injected write failure.
    Rejected(String),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "snapshot io failed: {err}"),
            Self::Serde(err) => write!(f, "snapshot encoding failed: {err}"),
            Self::AppendOnlyViolation(kind) => {
                write!(f, "{} ledger is no longer append-only", kind.as_str())
            }
            Self::Rejected(message) => write!(f, "snapshot write rejected: {message}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serde(err) => Some(err),
            Self::AppendOnlyViolation(_) | Self::Rejected(_) => None,
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

/// Persistence collaborator that loads and saves whole snapshots.
pub trait SnapshotStore: Send {
    fn load(&self) -> PersistResult<LedgerSnapshot>;
    fn save(&mut self, snapshot: &LedgerSnapshot) -> PersistResult<()>;
}

/// Checks that corrections and evidence only grew from `previous` to `next`.
///
/// # Errors
/// - `AppendOnlyViolation` naming the first offending ledger.
pub fn ensure_append_only(previous: &LedgerSnapshot, next: &LedgerSnapshot) -> PersistResult<()> {
    if !is_append_only(&previous.corrections, &next.corrections) {
        return Err(PersistenceError::AppendOnlyViolation(LedgerKind::Corrections));
    }
    if !is_append_only(&previous.evidence, &next.evidence) {
        return Err(PersistenceError::AppendOnlyViolation(LedgerKind::Evidence));
    }
    Ok(())
}

/// Snapshot store kept in memory; can be told to fail saves.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshot: LedgerSnapshot,
    saves: usize,
    fail_saves: bool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            snapshot,
            ..Self::default()
        }
    }

    /// Makes every following `save` fail until reset.
    pub fn set_fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    pub fn snapshot(&self) -> &LedgerSnapshot {
        &self.snapshot
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> PersistResult<LedgerSnapshot> {
        Ok(self.snapshot.clone())
    }

    fn save(&mut self, snapshot: &LedgerSnapshot) -> PersistResult<()> {
        if self.fail_saves {
            return Err(PersistenceError::Rejected("memory store is read-only".to_string()));
        }
        self.snapshot = snapshot.clone();
        self.saves += 1;
        Ok(())
    }
}
