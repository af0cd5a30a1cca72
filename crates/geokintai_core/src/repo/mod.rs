//! In-memory ledgers and their shared contracts.
//!
//! # Responsibility
//! - Hold places, attendance intervals, location evidence and corrections.
//! - Enforce per-ledger invariants at the write boundary.
//! - Notify an optional observer after every mutation so an external
//!   persistence collaborator can snapshot.
//!
//! # Invariants
//! - Evidence and correction ledgers only grow (see `append_only`).
//! - At most one open attendance interval per place.
//! - A change hook fires only after the mutation is fully applied.

pub mod append_only;
pub mod attendance_repo;
pub mod correction_repo;
pub mod evidence_repo;
pub mod place_repo;

use crate::model::attendance::IntervalId;
use crate::model::place::{PlaceId, PlaceValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type RepoResult<T> = Result<T, RepoError>;

/// Ledger identity passed to change hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LedgerKind {
    Places,
    Attendance,
    Evidence,
    Corrections,
}

impl LedgerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Places => "places",
            Self::Attendance => "attendance",
            Self::Evidence => "evidence",
            Self::Corrections => "corrections",
        }
    }
}

/// Observer invoked after each committed ledger mutation.
pub type ChangeHook = Arc<dyn Fn(LedgerKind) + Send + Sync>;

/// Repository error for ledger reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub enum RepoError {
    /// No open interval exists for the place.
    NoOpenInterval(PlaceId),
    IntervalNotFound(IntervalId),
    PlaceNotFound(PlaceId),
    /// Closing would put `exit_time` before `entry_time`.
    ExitBeforeEntry(IntervalId),
    InvalidPlace(PlaceValidationError),
    /// Restored data violates a ledger invariant.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOpenInterval(place_id) => {
                write!(f, "no open attendance interval for place {place_id}")
            }
            Self::IntervalNotFound(id) => write!(f, "attendance interval not found: {id}"),
            Self::PlaceNotFound(id) => write!(f, "place not found: {id}"),
            Self::ExitBeforeEntry(id) => {
                write!(f, "exit time precedes entry time for interval {id}")
            }
            Self::InvalidPlace(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid ledger data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPlace(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PlaceValidationError> for RepoError {
    fn from(value: PlaceValidationError) -> Self {
        Self::InvalidPlace(value)
    }
}

pub(crate) fn notify(hook: &Option<ChangeHook>, kind: LedgerKind) {
    if let Some(hook) = hook {
        hook(kind);
    }
}
