//! Departure debounce.
//!
//! # Invariants
//! - A sample is outside when `distance > radius`.
//! - `Confirmed` latches.
//! - Any inside sample before the threshold resets the countdown to zero.

use crate::clock::SharedClock;
use chrono::{DateTime, Duration, Utc};

/// Continuous outside time required before a departure is confirmed.
pub const DEFAULT_EXIT_RECHECK_SECONDS: i64 = 2 * 60;

/// Result of feeding one sample to an `ExitVerifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    Pending,
    Confirmed { at: DateTime<Utc> },
}

/// Per-place departure state machine.
pub struct ExitVerifier {
    clock: SharedClock,
    required_outside: Duration,
    outside_since: Option<DateTime<Utc>>,
    terminal: Option<ExitDecision>,
}

impl ExitVerifier {
    pub fn new(clock: SharedClock) -> Self {
        Self::with_required_outside(clock, Duration::seconds(DEFAULT_EXIT_RECHECK_SECONDS))
    }

    pub fn with_required_outside(clock: SharedClock, required_outside: Duration) -> Self {
        Self {
            clock,
            required_outside,
            outside_since: None,
            terminal: None,
        }
    }

    /// Feeds one distance sample and returns the current decision.
    pub fn on_location(
        &mut self,
        distance_from_center_meters: f64,
        radius_meters: f64,
    ) -> ExitDecision {
        if let Some(decision) = self.terminal {
            return decision;
        }

        let now = self.clock.now();
        if distance_from_center_meters <= radius_meters {
            self.outside_since = None;
            return ExitDecision::Pending;
        }

        match self.outside_since {
            Some(since) if now - since >= self.required_outside => {
                let decision = ExitDecision::Confirmed { at: now };
                self.terminal = Some(decision);
                decision
            }
            Some(_) => ExitDecision::Pending,
            None => {
                self.outside_since = Some(now);
                ExitDecision::Pending
            }
        }
    }

    /// Returns whether an outside countdown is currently running.
    pub fn is_counting_down(&self) -> bool {
        self.terminal.is_none() && self.outside_since.is_some()
    }
}

impl std::fmt::Debug for ExitVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitVerifier")
            .field("required_outside", &self.required_outside)
            .field("outside_since", &self.outside_since)
            .field("terminal", &self.terminal)
            .finish()
    }
}
