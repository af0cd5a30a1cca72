//! Debounce state machines for arrival and departure.
//!
//! # Responsibility
//! - Convert trailing distance samples into pending/confirmed/cancelled
//!   decisions, independently per place.
//!
//! # Invariants
//! - A place has at most one active verifier; `VerifierState` makes the
//!   stay/exit choice a tagged variant rather than two parallel slots.
//! - Verifiers are pure functions of elapsed clock time since a remembered
//!   instant; they never schedule work.

pub mod exit;
pub mod stay;

pub use exit::{ExitDecision, ExitVerifier, DEFAULT_EXIT_RECHECK_SECONDS};
pub use stay::{StayDecision, StayVerifier, DEFAULT_STAY_DURATION_SECONDS};

/// The single active verifier for one place.
#[derive(Debug)]
pub enum VerifierState {
    Stay(StayVerifier),
    Exit(ExitVerifier),
}

impl VerifierState {
    pub fn phase(&self) -> VerifierPhase {
        match self {
            Self::Stay(_) => VerifierPhase::VerifyingStay,
            Self::Exit(_) => VerifierPhase::VerifyingExit,
        }
    }
}

/// Observable verification phase of one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierPhase {
    Idle,
    VerifyingStay,
    VerifyingExit,
}
