//! Attendance flow coordination.
//!
//! # Responsibility
//! - Own the per-place verifier map.
//! - Translate verifier decisions into attendance and evidence ledger writes.
//!
//! # Invariants
//! - A place has at most one active verifier (`VerifierState` is a tagged
//!   variant in one map).
//! - Within one `handle_location_update` call the interval write and the
//!   evidence append either both happen or neither does.
//! - Cancellation never touches the ledgers.

use crate::clock::SharedClock;
use crate::model::attendance::IntervalId;
use crate::model::evidence::{EvidenceReason, LocationEvidence};
use crate::model::place::{Place, PlaceId};
use crate::repo::attendance_repo::AttendanceRepository;
use crate::repo::evidence_repo::EvidenceRepository;
use crate::repo::ChangeHook;
use crate::verification::{
    ExitDecision, ExitVerifier, StayDecision, StayVerifier, VerifierPhase, VerifierState,
    DEFAULT_EXIT_RECHECK_SECONDS, DEFAULT_STAY_DURATION_SECONDS,
};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Horizontal accuracy recorded with stay-check evidence.
pub const STAY_CHECK_ACCURACY_METERS: f64 = 5.0;
/// Horizontal accuracy recorded with exit-check evidence.
pub const EXIT_CHECK_ACCURACY_METERS: f64 = 8.0;

/// Result of feeding one sample through the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    None,
    EntryConfirmed(IntervalId),
    EntryCancelled,
    ExitConfirmed(IntervalId),
}

/// Drives verifiers and commits their confirmed decisions.
pub struct AttendanceFlowCoordinator {
    clock: SharedClock,
    stay_duration: Duration,
    exit_recheck_duration: Duration,
    attendance: AttendanceRepository,
    evidence: EvidenceRepository,
    verifiers: HashMap<PlaceId, VerifierState>,
}

impl AttendanceFlowCoordinator {
    /// Creates a coordinator with empty ledgers and default durations.
    pub fn new(clock: SharedClock) -> Self {
        Self::with_ledgers(clock, AttendanceRepository::new(), EvidenceRepository::new())
    }

    /// Creates a coordinator over existing ledgers.
    pub fn with_ledgers(
        clock: SharedClock,
        attendance: AttendanceRepository,
        evidence: EvidenceRepository,
    ) -> Self {
        Self {
            clock,
            stay_duration: Duration::seconds(DEFAULT_STAY_DURATION_SECONDS),
            exit_recheck_duration: Duration::seconds(DEFAULT_EXIT_RECHECK_SECONDS),
            attendance,
            evidence,
            verifiers: HashMap::new(),
        }
    }

    /// Overrides debounce windows for verifiers installed from now on.
    pub fn with_durations(mut self, stay: Duration, exit_recheck: Duration) -> Self {
        self.stay_duration = stay;
        self.exit_recheck_duration = exit_recheck;
        self
    }

    /// Registers one change hook on both owned ledgers.
    pub fn set_change_hook(&mut self, hook: ChangeHook) {
        self.attendance.set_change_hook(hook.clone());
        self.evidence.set_change_hook(hook);
    }

    /// Starts (or restarts) arrival verification for `place`.
    pub fn handle_did_enter(&mut self, place: &Place) {
        let verifier = StayVerifier::with_required_stay(self.clock.clone(), self.stay_duration);
        if self
            .verifiers
            .insert(place.id, VerifierState::Stay(verifier))
            .is_some()
        {
            debug!(
                "event=verifier_replaced module=flow status=ok place_id={} phase=verifying_stay",
                place.id
            );
        }
    }

    /// Starts departure verification when `place` has an open interval.
    ///
    /// No-op otherwise, so an exit with nothing to close is never tracked.
    pub fn handle_did_exit(&mut self, place: &Place) {
        if self.attendance.fetch_open_record(place.id).is_none() {
            debug!(
                "event=exit_ignored module=flow status=ok place_id={} reason=no_open_interval",
                place.id
            );
            return;
        }

        let verifier =
            ExitVerifier::with_required_outside(self.clock.clone(), self.exit_recheck_duration);
        self.verifiers
            .insert(place.id, VerifierState::Exit(verifier));
    }

    /// Feeds one distance sample to the active verifier of `place`.
    ///
    /// # Contract
    /// - `EntryConfirmed`: an open interval exists and one `stay_check`
    ///   evidence record references it.
    /// - `EntryCancelled`: no ledger mutation.
    /// - `ExitConfirmed`: the interval is closed and one `exit_check`
    ///   evidence record references it.
    /// - A confirmed exit with no open interval is dropped as `None`.
    pub fn handle_location_update(
        &mut self,
        place: &Place,
        distance_from_center_meters: f64,
    ) -> FlowOutcome {
        let Some(state) = self.verifiers.get_mut(&place.id) else {
            return FlowOutcome::None;
        };

        match state {
            VerifierState::Stay(verifier) => {
                match verifier.on_location(distance_from_center_meters, place.radius_meters) {
                    StayDecision::Pending => FlowOutcome::None,
                    StayDecision::CancelledEarlyExit { .. } => {
                        self.verifiers.remove(&place.id);
                        info!(
                            "event=stay_cancelled module=flow status=ok place_id={}",
                            place.id
                        );
                        FlowOutcome::EntryCancelled
                    }
                    StayDecision::Confirmed { at } => {
                        self.verifiers.remove(&place.id);
                        FlowOutcome::EntryConfirmed(self.commit_entry(place, at))
                    }
                }
            }
            VerifierState::Exit(verifier) => {
                let was_counting = verifier.is_counting_down();
                match verifier.on_location(distance_from_center_meters, place.radius_meters) {
                    ExitDecision::Pending => {
                        if was_counting && !verifier.is_counting_down() {
                            debug!(
                                "event=exit_countdown_reset module=flow status=ok place_id={}",
                                place.id
                            );
                        }
                        FlowOutcome::None
                    }
                    ExitDecision::Confirmed { at } => {
                        self.verifiers.remove(&place.id);
                        match self.commit_exit(place, at) {
                            Some(interval_id) => FlowOutcome::ExitConfirmed(interval_id),
                            None => FlowOutcome::None,
                        }
                    }
                }
            }
        }
    }

    /// Drops verifier state for one place. Ledgers are untouched.
    pub fn cancel(&mut self, place_id: PlaceId) -> bool {
        self.verifiers.remove(&place_id).is_some()
    }

    /// Drops every verifier and returns how many were active.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.verifiers.len();
        self.verifiers.clear();
        count
    }

    pub fn verifier_phase(&self, place_id: PlaceId) -> VerifierPhase {
        self.verifiers
            .get(&place_id)
            .map(VerifierState::phase)
            .unwrap_or(VerifierPhase::Idle)
    }

    /// Places with an active verifier, sorted for stable iteration.
    pub fn active_place_ids(&self) -> Vec<PlaceId> {
        let mut ids: Vec<_> = self.verifiers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn attendance(&self) -> &AttendanceRepository {
        &self.attendance
    }

    pub fn evidence(&self) -> &EvidenceRepository {
        &self.evidence
    }

    fn commit_entry(&mut self, place: &Place, at: DateTime<Utc>) -> IntervalId {
        let interval = self.attendance.create_open_record(place.id, at);
        self.evidence.append(LocationEvidence::new(
            place.id,
            interval.id,
            at,
            place.latitude,
            place.longitude,
            STAY_CHECK_ACCURACY_METERS,
            EvidenceReason::StayCheck,
        ));
        info!(
            "event=stay_confirmed module=flow status=ok place_id={} interval_id={}",
            place.id, interval.id
        );
        interval.id
    }

    fn commit_exit(&mut self, place: &Place, at: DateTime<Utc>) -> Option<IntervalId> {
        let closed = match self.attendance.close_open_record(place.id, at) {
            Ok(closed) => closed,
            Err(err) => {
                warn!(
                    "event=exit_confirmed module=flow status=dropped place_id={} error={}",
                    place.id, err
                );
                return None;
            }
        };

        self.evidence.append(LocationEvidence::new(
            place.id,
            closed.id,
            at,
            place.latitude,
            place.longitude,
            EXIT_CHECK_ACCURACY_METERS,
            EvidenceReason::ExitCheck,
        ));
        info!(
            "event=exit_confirmed module=flow status=ok place_id={} interval_id={}",
            place.id, closed.id
        );
        Some(closed.id)
    }
}

#[cfg(test)]
mod tests {
    use super::{AttendanceFlowCoordinator, FlowOutcome};
    use crate::clock::ManualClock;
    use crate::model::evidence::EvidenceReason;
    use crate::model::place::Place;
    use crate::verification::VerifierPhase;
    use std::sync::Arc;

    fn setup() -> (Arc<ManualClock>, AttendanceFlowCoordinator, Place) {
        let clock = Arc::new(ManualClock::at_epoch_seconds(1_700_000_000));
        let coordinator = AttendanceFlowCoordinator::new(clock.clone());
        let place = Place::new("Office", 35.681236, 139.767125, 100.0);
        (clock, coordinator, place)
    }

    #[test]
    fn exit_without_open_interval_is_not_tracked() {
        let (_, mut coordinator, place) = setup();
        coordinator.handle_did_exit(&place);
        assert_eq!(coordinator.verifier_phase(place.id), VerifierPhase::Idle);
        assert_eq!(
            coordinator.handle_location_update(&place, 500.0),
            FlowOutcome::None
        );
    }

    #[test]
    fn reentering_replaces_the_stay_countdown() {
        let (clock, mut coordinator, place) = setup();
        coordinator.handle_did_enter(&place);
        coordinator.handle_location_update(&place, 10.0);

        clock.advance_seconds(200);
        coordinator.handle_did_enter(&place);
        coordinator.handle_location_update(&place, 10.0);

        clock.advance_seconds(200);
        assert_eq!(
            coordinator.handle_location_update(&place, 10.0),
            FlowOutcome::None
        );

        clock.advance_seconds(100);
        assert!(matches!(
            coordinator.handle_location_update(&place, 10.0),
            FlowOutcome::EntryConfirmed(_)
        ));
    }

    #[test]
    fn confirmed_entry_writes_interval_and_stay_evidence_at_place_coordinates() {
        let (clock, mut coordinator, place) = setup();
        coordinator.handle_did_enter(&place);
        coordinator.handle_location_update(&place, 20.0);
        clock.advance_seconds(300);

        let FlowOutcome::EntryConfirmed(interval_id) =
            coordinator.handle_location_update(&place, 10.0)
        else {
            panic!("expected entry confirmation");
        };

        let evidence = coordinator.evidence().fetch_by_interval(interval_id);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].reason, EvidenceReason::StayCheck);
        assert_eq!(evidence[0].latitude, place.latitude);
        assert_eq!(evidence[0].longitude, place.longitude);
        assert_eq!(evidence[0].horizontal_accuracy, 5.0);
        assert_eq!(coordinator.verifier_phase(place.id), VerifierPhase::Idle);
    }

    #[test]
    fn cancel_all_keeps_ledgers() {
        let (clock, mut coordinator, place) = setup();
        coordinator.handle_did_enter(&place);
        coordinator.handle_location_update(&place, 20.0);
        clock.advance_seconds(300);
        coordinator.handle_location_update(&place, 20.0);

        coordinator.handle_did_exit(&place);
        coordinator.handle_did_enter(&Place::new("Depot", 35.0, 139.0, 50.0));
        assert_eq!(coordinator.cancel_all(), 2);
        assert!(coordinator.active_place_ids().is_empty());
        assert_eq!(coordinator.attendance().len(), 1);
        assert_eq!(coordinator.evidence().len(), 1);
    }
}
