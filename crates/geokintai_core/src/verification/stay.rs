//! Arrival debounce.
//!
//! # Invariants
//! - A sample is inside when `distance <= radius`.
//! - `Confirmed` and `CancelledEarlyExit` latch: later samples return the
//!   same decision without being evaluated.
//! - An outside sample cancels only while the inside countdown is running and
//!   has not yet met the required duration.

use crate::clock::SharedClock;
use chrono::{DateTime, Duration, Utc};

/// Continuous inside time required before an arrival is confirmed.
pub const DEFAULT_STAY_DURATION_SECONDS: i64 = 5 * 60;

/// Result of feeding one sample to a `StayVerifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StayDecision {
    Pending,
    Confirmed { at: DateTime<Utc> },
    CancelledEarlyExit { at: DateTime<Utc> },
}

impl StayDecision {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Per-place arrival state machine.
pub struct StayVerifier {
    clock: SharedClock,
    required_stay: Duration,
    inside_since: Option<DateTime<Utc>>,
    terminal: Option<StayDecision>,
}

impl StayVerifier {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_required_stay(clock, Duration::seconds(DEFAULT_STAY_DURATION_SECONDS))
    }

    pub fn with_required_stay(clock: SharedClock, required_stay: Duration) -> Self {
        Self {
            clock,
            required_stay,
            inside_since: None,
            terminal: None,
        }
    }

    /// Feeds one distance sample and returns the current decision.
    pub fn on_location(
        &mut self,
        distance_from_center_meters: f64,
        radius_meters: f64,
    ) -> StayDecision {
        if let Some(decision) = self.terminal {
            return decision;
        }

        let now = self.clock.now();
        let inside = distance_from_center_meters <= radius_meters;

        if inside {
            match self.inside_since {
                Some(since) if now - since >= self.required_stay => {
                    return self.latch(StayDecision::Confirmed { at: now });
                }
                Some(_) => {}
                None => self.inside_since = Some(now),
            }
            return StayDecision::Pending;
        }

        if let Some(since) = self.inside_since {
            if now - since < self.required_stay {
                return self.latch(StayDecision::CancelledEarlyExit { at: now });
            }
        }

        // Countdown already satisfied or never started: drop it silently.
        self.inside_since = None;
        StayDecision::Pending
    }

    /// Instant the current inside countdown started, if any.
    pub fn inside_since(&self) -> Option<DateTime<Utc>> {
        self.inside_since
    }

    fn latch(&mut self, decision: StayDecision) -> StayDecision {
        self.terminal = Some(decision);
        decision
    }
}

impl std::fmt::Debug for StayVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StayVerifier")
            .field("required_stay", &self.required_stay)
            .field("inside_since", &self.inside_since)
            .field("terminal", &self.terminal)
            .finish()
    }
}
