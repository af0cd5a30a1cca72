//! Attendance interval model.
//!
//! # Invariants
//! - An interval with `exit_time == None` is "open".
//! - For one place at most one interval is open at any time (enforced by
//!   `AttendanceRepository`).
//! - `exit_time`, once set, is never earlier than `entry_time`.

use crate::model::place::PlaceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable attendance interval identifier.
pub type IntervalId = Uuid;

/// One stay at a place, from confirmed arrival to confirmed departure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceInterval {
    pub id: IntervalId,
    pub place_id: PlaceId,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
}

impl AttendanceInterval {
    /// Creates an open interval with a generated id.
    pub fn open(place_id: PlaceId, entry_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            place_id,
            entry_time,
            exit_time: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    /// Entry/exit pair used by corrections.
    pub fn snapshot(&self) -> AttendanceSnapshot {
        AttendanceSnapshot {
            entry_time: self.entry_time,
            exit_time: self.exit_time,
        }
    }
}

/// Entry/exit times of an interval at one point in its correction history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSnapshot {
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
}

impl AttendanceSnapshot {
    pub fn new(entry_time: DateTime<Utc>, exit_time: Option<DateTime<Utc>>) -> Self {
        Self {
            entry_time,
            exit_time,
        }
    }

    /// Returns whether `exit_time` (when present) is not before `entry_time`.
    pub fn is_ordered(&self) -> bool {
        match self.exit_time {
            Some(exit) => exit >= self.entry_time,
            None => true,
        }
    }
}
