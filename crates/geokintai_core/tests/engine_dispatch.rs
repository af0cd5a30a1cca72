use chrono::{TimeZone, Utc};
use geokintai_core::{
    AttendanceEngine, Clock, CoordinateSample, EngineConfig, EvidenceReason, FailureType,
    FlowOutcome, InMemoryRegionMonitor, LocationEvent, LogLevel, ManualClock, PermissionStatus,
    Place, PlaceDraft, RegionMonitor, RegionRouter, VerifierPhase,
};
use std::sync::Arc;

fn engine() -> (Arc<ManualClock>, AttendanceEngine<InMemoryRegionMonitor>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 4, 1, 8, 55, 0).unwrap(),
    ));
    let engine = AttendanceEngine::new(
        EngineConfig::default(),
        clock.clone(),
        InMemoryRegionMonitor::new(),
    );
    (clock, engine)
}

fn office(engine: &mut AttendanceEngine<InMemoryRegionMonitor>) -> Place {
    let draft = PlaceDraft {
        name: "Head office".to_string(),
        latitude: "35.681236".to_string(),
        longitude: "139.767125".to_string(),
        radius: String::new(),
    };
    engine.add_place(&draft).unwrap().0
}

fn region(place: &Place) -> String {
    RegionRouter::identifier_for(place.id)
}

fn distance(place: &Place, meters: f64) -> LocationEvent {
    LocationEvent::DistanceSample {
        place_id: place.id,
        distance_meters: meters,
    }
}

#[test]
fn granting_permission_starts_monitoring_and_requests_state() {
    let (_, mut engine) = engine();
    let place = office(&mut engine);
    assert!(engine.monitor().active_ids().is_empty());

    let report = engine.dispatch(LocationEvent::AuthorizationChanged {
        status: PermissionStatus::Always,
    });

    assert_eq!(report.state_requests, vec![place.id]);
    assert!(engine.monitor().active_ids().contains(&place.id));
    assert!(report.failure.is_none());
}

#[test]
fn full_day_produces_closed_interval_with_two_evidence_records() {
    let (clock, mut engine) = engine();
    let place = office(&mut engine);
    engine.set_permission_status(PermissionStatus::Always);

    engine.dispatch(LocationEvent::DidEnterRegion {
        region: region(&place),
    });
    assert_eq!(engine.verifier_phase(place.id), VerifierPhase::VerifyingStay);
    engine.dispatch(distance(&place, 40.0));

    clock.advance_seconds(300);
    let arrived = engine.dispatch(distance(&place, 12.0));
    let interval_id = match arrived.outcomes.as_slice() {
        [(id, FlowOutcome::EntryConfirmed(interval_id))] if *id == place.id => *interval_id,
        other => panic!("unexpected outcomes: {other:?}"),
    };
    assert_eq!(engine.open_interval(place.id).unwrap().id, interval_id);

    clock.advance_seconds(8 * 3600);
    engine.dispatch(LocationEvent::DidExitRegion {
        region: region(&place),
    });
    engine.dispatch(distance(&place, 260.0));
    clock.advance_seconds(120);
    let left = engine.dispatch(distance(&place, 300.0));
    assert_eq!(
        left.outcomes,
        vec![(place.id, FlowOutcome::ExitConfirmed(interval_id))]
    );

    assert!(engine.open_interval(place.id).is_none());
    let reasons: Vec<_> = engine.evidence().iter().map(|e| e.reason).collect();
    assert_eq!(reasons, vec![EvidenceReason::StayCheck, EvidenceReason::ExitCheck]);
    let interval = &engine.attendance()[0];
    assert_eq!(interval.exit_time, Some(clock.now()));

    let messages: Vec<_> = engine
        .event_log()
        .events()
        .iter()
        .map(|event| event.message.split(' ').next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        messages,
        vec![
            "did_enter_region",
            "stay_confirmed",
            "did_exit_region",
            "exit_confirmed"
        ]
    );
}

#[test]
fn early_exit_cancels_without_ledger_writes() {
    let (clock, mut engine) = engine();
    let place = office(&mut engine);
    engine.set_permission_status(PermissionStatus::Always);

    engine.dispatch(LocationEvent::DidEnterRegion {
        region: region(&place),
    });
    engine.dispatch(distance(&place, 25.0));
    clock.advance_seconds(270);
    let report = engine.dispatch(distance(&place, 150.0));

    assert_eq!(report.outcomes, vec![(place.id, FlowOutcome::EntryCancelled)]);
    assert!(engine.attendance().is_empty());
    assert!(engine.evidence().is_empty());
}

#[test]
fn coordinate_samples_feed_active_verifiers() {
    let (clock, mut engine) = engine();
    let place = office(&mut engine);
    engine.set_permission_status(PermissionStatus::Always);
    engine.dispatch(LocationEvent::DidDetermineState {
        region: region(&place),
        is_inside: true,
    });

    let fix = |timestamp| CoordinateSample {
        timestamp,
        latitude: 35.6813,
        longitude: 139.7672,
        horizontal_accuracy: 12.0,
    };
    engine.dispatch(LocationEvent::CoordinateSample {
        sample: fix(clock.now()),
    });
    clock.advance_seconds(300);
    let report = engine.dispatch(LocationEvent::CoordinateSample {
        sample: fix(clock.now()),
    });

    assert!(matches!(
        report.outcomes.as_slice(),
        [(_, FlowOutcome::EntryConfirmed(_))]
    ));
}

#[test]
fn permission_downgrade_cancels_verifiers_and_stops_regions_in_one_call() {
    let (_, mut engine) = engine();
    let place = office(&mut engine);
    engine.set_permission_status(PermissionStatus::Always);
    engine.dispatch(LocationEvent::DidEnterRegion {
        region: region(&place),
    });
    engine.dispatch(distance(&place, 10.0));

    let report = engine.dispatch(LocationEvent::AuthorizationChanged {
        status: PermissionStatus::WhenInUse,
    });

    assert_eq!(engine.verifier_phase(place.id), VerifierPhase::Idle);
    assert!(engine.monitor().active_ids().is_empty());
    assert_eq!(engine.monitor().stop_count(place.id), 1);
    let failure = report.failure.unwrap();
    assert_eq!(failure.failure_type, FailureType::PermissionInsufficient);
    assert!(failure.handling.should_preserve_existing_data);
}

#[test]
fn location_error_is_logged_and_retryable() {
    let (_, mut engine) = engine();
    let report = engine.dispatch(LocationEvent::LocationError {
        detail: "kCLErrorLocationUnknown".to_string(),
    });

    let failure = report.failure.unwrap();
    assert_eq!(failure.failure_type, FailureType::LocationUnavailable);
    assert!(failure.handling.should_retry);

    let last = engine.event_log().events().last().unwrap();
    assert_eq!(last.level, LogLevel::Error);
    assert!(last.message.starts_with("failure type=location_unavailable"));
}

#[test]
fn unknown_region_and_disabled_place_are_ignored() {
    let (_, mut engine) = engine();
    let place = office(&mut engine);
    engine.set_permission_status(PermissionStatus::Always);

    let unknown = engine.dispatch(LocationEvent::DidEnterRegion {
        region: "legacy-region".to_string(),
    });
    assert!(unknown.is_quiet());

    engine.set_monitoring(place.id, false).unwrap();
    let disabled = engine.dispatch(LocationEvent::DidEnterRegion {
        region: region(&place),
    });
    assert!(disabled.is_quiet());
    assert_eq!(engine.verifier_phase(place.id), VerifierPhase::Idle);
}

#[test]
fn exit_region_without_open_interval_is_not_tracked() {
    let (_, mut engine) = engine();
    let place = office(&mut engine);
    engine.set_permission_status(PermissionStatus::Always);

    engine.dispatch(LocationEvent::DidExitRegion {
        region: region(&place),
    });
    assert_eq!(engine.verifier_phase(place.id), VerifierPhase::Idle);
}

#[test]
fn deleting_a_place_cancels_its_verifier_and_keeps_history() {
    let (clock, mut engine) = engine();
    let place = office(&mut engine);
    engine.set_permission_status(PermissionStatus::Always);
    engine.dispatch(LocationEvent::DidEnterRegion {
        region: region(&place),
    });
    engine.dispatch(distance(&place, 10.0));
    clock.advance_seconds(300);
    engine.dispatch(distance(&place, 10.0));
    engine.dispatch(LocationEvent::DidExitRegion {
        region: region(&place),
    });
    assert_eq!(engine.verifier_phase(place.id), VerifierPhase::VerifyingExit);

    let sync = engine.delete_place(place.id).unwrap();
    assert!(sync.monitored_ids.is_empty());
    assert_eq!(engine.verifier_phase(place.id), VerifierPhase::Idle);
    assert_eq!(engine.attendance().len(), 1);
    assert!(engine.places().is_empty());
}

/// Runs an arrival through the stay window and returns the opened interval.
fn arrive(
    clock: &ManualClock,
    engine: &mut AttendanceEngine<InMemoryRegionMonitor>,
    place: &Place,
) -> geokintai_core::IntervalId {
    engine.dispatch(LocationEvent::DidEnterRegion {
        region: region(place),
    });
    engine.dispatch(distance(place, 20.0));
    clock.advance_seconds(300);
    engine.dispatch(distance(place, 20.0));
    engine.open_interval(place.id).unwrap().id
}

#[test]
fn state_inside_without_open_interval_starts_stay_verification() {
    let (clock, mut engine) = engine();
    let place = office(&mut engine);
    engine.set_permission_status(PermissionStatus::Always);
    assert_eq!(engine.verifier_phase(place.id), VerifierPhase::Idle);

    let report = engine.dispatch(LocationEvent::DidDetermineState {
        region: region(&place),
        is_inside: true,
    });
    assert!(report.outcomes.is_empty());
    assert_eq!(engine.verifier_phase(place.id), VerifierPhase::VerifyingStay);

    engine.dispatch(distance(&place, 30.0));
    clock.advance_seconds(300);
    let arrived = engine.dispatch(distance(&place, 30.0));
    assert!(matches!(
        arrived.outcomes.as_slice(),
        [(id, FlowOutcome::EntryConfirmed(_))] if *id == place.id
    ));

    let repeated = engine.dispatch(LocationEvent::DidDetermineState {
        region: region(&place),
        is_inside: true,
    });
    assert!(repeated.outcomes.is_empty());
    assert_eq!(engine.verifier_phase(place.id), VerifierPhase::Idle);
}

#[test]
fn state_outside_with_open_interval_starts_exit_verification() {
    let (clock, mut engine) = engine();
    let place = office(&mut engine);
    engine.set_permission_status(PermissionStatus::Always);
    let interval_id = arrive(&clock, &mut engine, &place);
    assert_eq!(engine.verifier_phase(place.id), VerifierPhase::Idle);

    engine.dispatch(LocationEvent::DidDetermineState {
        region: region(&place),
        is_inside: false,
    });
    assert_eq!(engine.verifier_phase(place.id), VerifierPhase::VerifyingExit);

    engine.dispatch(distance(&place, 260.0));
    clock.advance_seconds(120);
    let left = engine.dispatch(distance(&place, 260.0));
    assert_eq!(
        left.outcomes,
        vec![(place.id, FlowOutcome::ExitConfirmed(interval_id))]
    );
}

#[test]
fn repeated_outside_state_keeps_running_exit_countdown() {
    let (clock, mut engine) = engine();
    let place = office(&mut engine);
    engine.set_permission_status(PermissionStatus::Always);
    let interval_id = arrive(&clock, &mut engine, &place);

    engine.dispatch(LocationEvent::DidExitRegion {
        region: region(&place),
    });
    engine.dispatch(distance(&place, 260.0));
    clock.advance_seconds(60);

    let repeated = engine.dispatch(LocationEvent::DidDetermineState {
        region: region(&place),
        is_inside: false,
    });
    assert!(repeated.outcomes.is_empty());
    assert_eq!(engine.verifier_phase(place.id), VerifierPhase::VerifyingExit);

    // A restarted countdown would still be pending 60 s later.
    clock.advance_seconds(60);
    let left = engine.dispatch(distance(&place, 270.0));
    assert_eq!(
        left.outcomes,
        vec![(place.id, FlowOutcome::ExitConfirmed(interval_id))]
    );
}
