//! Attendance engine: the single entry point a platform shell drives.
//!
//! # Responsibility
//! - Own every ledger, the flow coordinator, region sync and the event log.
//! - Consume typed `LocationEvent`s one at a time.
//! - Gate automatic recording on the permission policy.
//! - Snapshot ledgers through an optional `SnapshotStore` after mutations.
//!
//! # Invariants
//! - Every operation takes `&mut self` and runs to completion, so events are
//!   handled serially in call order.
//! - A permission downgrade cancels all verifiers and stops all regions in
//!   one call.
//! - A persistence failure never rolls back or retries in-memory state.
//! - After a failed save no further snapshot is written until the caller
//!   invokes `retry_persist`; changes accumulate in memory meanwhile.

pub mod event;

use chrono::{DateTime, Utc};
use crate::clock::SharedClock;
use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use crate::geo::{distance_meters, Coordinate};
use crate::model::attendance::{AttendanceInterval, AttendanceSnapshot, IntervalId};
use crate::model::correction::{AttendanceCorrection, CorrectionId, CorrectionRequest};
use crate::model::evidence::LocationEvidence;
use crate::model::place::{Place, PlaceDraft, PlaceId};
use crate::persistence::{ensure_append_only, LedgerSnapshot, PersistResult, SnapshotStore};
use crate::region::monitor::RegionMonitor;
use crate::region::router::RegionRouter;
use crate::region::sync::{RegionMonitoringSyncService, RegionSyncResult};
use crate::repo::attendance_repo::AttendanceRepository;
use crate::repo::correction_repo::CorrectionRepository;
use crate::repo::evidence_repo::EvidenceRepository;
use crate::repo::place_repo::PlaceRepository;
use crate::repo::{ChangeHook, LedgerKind, RepoError};
use crate::service::attendance_flow::{AttendanceFlowCoordinator, FlowOutcome};
use crate::service::correction_service::{effective_snapshot, CorrectionService};
use crate::service::event_log::{EventLog, LogEventType};
use crate::service::export_service::{ExportError, ExportFormat, ExportPayload, ExportService};
use crate::service::failure::FailureType;
use crate::service::integrity::verify_correction;
use crate::service::permission::{PermissionDecision, PermissionPolicy, PermissionStatus};
use crate::verification::VerifierPhase;
use event::{CoordinateSample, DispatchReport, EngineFailure, LocationEvent};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

/// Ledgers touched since the last successful snapshot.
type DirtyLedgers = Arc<Mutex<BTreeSet<LedgerKind>>>;

/// Findings of `AttendanceEngine::audit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Corrections whose stored hash no longer verifies.
    pub invalid_corrections: Vec<CorrectionId>,
    /// Places holding more than one open interval.
    pub open_invariant_violations: Vec<PlaceId>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_corrections.is_empty() && self.open_invariant_violations.is_empty()
    }
}

/// Geofence attendance engine over a platform `RegionMonitor`.
pub struct AttendanceEngine<M: RegionMonitor> {
    config: EngineConfig,
    clock: SharedClock,
    permission_status: PermissionStatus,
    places: PlaceRepository,
    flow: AttendanceFlowCoordinator,
    corrections: CorrectionRepository,
    correction_service: CorrectionService,
    export_service: ExportService,
    regions: RegionMonitoringSyncService<M>,
    router: RegionRouter,
    event_log: EventLog,
    store: Option<Box<dyn SnapshotStore>>,
    last_persisted: LedgerSnapshot,
    dirty: DirtyLedgers,
    save_blocked: bool,
}

impl<M: RegionMonitor> AttendanceEngine<M> {
    /// Creates an engine with empty ledgers and no persistence.
    pub fn new(config: EngineConfig, clock: SharedClock, monitor: M) -> Self {
        Self::assemble(
            config,
            clock,
            monitor,
            None,
            LedgerSnapshot::default(),
            PlaceRepository::new(),
            AttendanceRepository::new(),
            EvidenceRepository::new(),
            CorrectionRepository::new(),
        )
    }

    /// Creates an engine restored from the store's last snapshot.
    ///
    /// # Errors
    /// - `Config` when `config` does not validate.
    /// - `PersistenceWriteFailed` when the store cannot be read.
    /// - `Repo` when the snapshot violates a ledger invariant.
    pub fn open(
        config: EngineConfig,
        clock: SharedClock,
        monitor: M,
        store: Box<dyn SnapshotStore>,
    ) -> CoreResult<Self> {
        config.validate()?;
        let snapshot = store.load()?;
        let places = PlaceRepository::from_records(snapshot.places.clone())?;
        let attendance = AttendanceRepository::from_records(snapshot.attendance.clone())?;
        let evidence = EvidenceRepository::from_records(snapshot.evidence.clone());
        let corrections = CorrectionRepository::from_records(snapshot.corrections.clone());

        info!(
            "event=engine_open module=engine status=ok places={} attendance={} corrections={} evidence={}",
            snapshot.places.len(),
            snapshot.attendance.len(),
            snapshot.corrections.len(),
            snapshot.evidence.len()
        );

        Ok(Self::assemble(
            config,
            clock,
            monitor,
            Some(store),
            snapshot,
            places,
            attendance,
            evidence,
            corrections,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        config: EngineConfig,
        clock: SharedClock,
        monitor: M,
        store: Option<Box<dyn SnapshotStore>>,
        last_persisted: LedgerSnapshot,
        mut places: PlaceRepository,
        attendance: AttendanceRepository,
        evidence: EvidenceRepository,
        mut corrections: CorrectionRepository,
    ) -> Self {
        let dirty: DirtyLedgers = Arc::new(Mutex::new(BTreeSet::new()));
        let sink = dirty.clone();
        let hook: ChangeHook = Arc::new(move |kind| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(kind);
        });

        let mut flow = AttendanceFlowCoordinator::with_ledgers(clock.clone(), attendance, evidence)
            .with_durations(config.stay_duration, config.exit_recheck_duration);
        flow.set_change_hook(hook.clone());
        places.set_change_hook(hook.clone());
        corrections.set_change_hook(hook);

        let mut router = RegionRouter::new();
        for place in places.fetch_all() {
            router.bind(RegionRouter::identifier_for(place.id), place.id);
        }

        Self {
            correction_service: CorrectionService::new(clock.clone()),
            export_service: ExportService::new(clock.clone()),
            event_log: EventLog::new(clock.clone()),
            config,
            clock,
            permission_status: PermissionStatus::NotDetermined,
            places,
            flow,
            corrections,
            regions: RegionMonitoringSyncService::new(monitor),
            router,
            store,
            last_persisted,
            dirty,
            save_blocked: false,
        }
    }

    /// Handles one platform event.
    pub fn dispatch(&mut self, event: LocationEvent) -> DispatchReport {
        debug!(
            "event=dispatch module=engine status=start kind={}",
            event.name()
        );

        let mut report = match event {
            LocationEvent::AuthorizationChanged { status } => self.set_permission_status(status),
            LocationEvent::DidEnterRegion { region } => self.on_region_entered(&region),
            LocationEvent::DidExitRegion { region } => self.on_region_exited(&region),
            LocationEvent::DidDetermineState { region, is_inside } => {
                self.on_state_determined(&region, is_inside)
            }
            LocationEvent::DistanceSample {
                place_id,
                distance_meters,
            } => self.on_distance_sample(place_id, distance_meters),
            LocationEvent::CoordinateSample { sample } => self.on_coordinate_sample(sample),
            LocationEvent::LocationError { detail } => DispatchReport {
                failure: Some(self.record_failure(FailureType::LocationUnavailable, detail)),
                ..DispatchReport::default()
            },
        };

        if let Err(failure) = self.persist() {
            if report.failure.is_none() {
                report.failure = Some(failure);
            }
        }
        report
    }

    /// Applies a new permission status.
    ///
    /// Losing auto recording cancels every verifier and stops every region
    /// in this one call.
    pub fn set_permission_status(&mut self, status: PermissionStatus) -> DispatchReport {
        let was_allowed = self.recording_allowed();
        self.permission_status = status;
        let allowed = self.recording_allowed();
        info!(
            "event=permission_changed module=engine status=ok permission={} auto_recording={}",
            status.as_str(),
            allowed
        );

        let mut report = DispatchReport::default();
        if !allowed {
            let cancelled = self.flow.cancel_all();
            let sync = self.regions.sync(self.places.fetch_all(), false);
            if was_allowed || cancelled > 0 {
                report.failure = Some(self.record_failure(
                    FailureType::PermissionInsufficient,
                    format!(
                        "permission={} cancelled_verifiers={cancelled}",
                        status.as_str()
                    ),
                ));
            }
            report.region_sync = Some(sync);
            return report;
        }

        let sync = self.regions.sync(self.places.fetch_all(), true);
        report.state_requests = sync.changed_ids.iter().copied().collect();
        report.region_sync = Some(sync);
        report
    }

    /// Validates a place draft, stores it and re-syncs regions.
    ///
    /// # Errors
    /// - `InvalidPlace` when the draft does not parse.
    /// - `PersistenceWriteFailed` when the change could not be snapshotted;
    ///   the place is still registered in memory.
    pub fn add_place(&mut self, draft: &PlaceDraft) -> CoreResult<(Place, RegionSyncResult)> {
        let place = draft.parse(self.config.default_radius_meters)?;
        let sync = self.upsert_place(place.clone())?;
        Ok((place, sync))
    }

    /// Inserts or replaces a place and re-syncs regions.
    ///
    /// An edited place with different bounds has its region restarted.
    pub fn upsert_place(&mut self, place: Place) -> CoreResult<RegionSyncResult> {
        let place_id = place.id;
        let enabled = place.monitoring_enabled;
        self.places.save(place)?;
        self.router
            .bind(RegionRouter::identifier_for(place_id), place_id);
        if !enabled {
            self.flow.cancel(place_id);
        }
        self.finish_place_change()
    }

    /// Removes a place, cancels its verifier and stops its region.
    ///
    /// Attendance history for the place is kept.
    pub fn delete_place(&mut self, place_id: PlaceId) -> CoreResult<RegionSyncResult> {
        self.places.delete(place_id)?;
        self.flow.cancel(place_id);
        self.router.unbind_place(place_id);
        self.finish_place_change()
    }

    pub fn set_monitoring(
        &mut self,
        place_id: PlaceId,
        enabled: bool,
    ) -> CoreResult<RegionSyncResult> {
        let mut place = self
            .places
            .fetch_by_id(place_id)
            .cloned()
            .ok_or(RepoError::PlaceNotFound(place_id))?;
        place.monitoring_enabled = enabled;
        self.upsert_place(place)
    }

    /// Re-runs region reconciliation with the current permission state.
    pub fn resync_regions(&mut self) -> RegionSyncResult {
        let allowed = self.recording_allowed();
        self.regions.sync(self.places.fetch_all(), allowed)
    }

    /// Validates, hashes and appends a correction.
    ///
    /// # Errors
    /// - `Validation` when the request is rejected; nothing is appended to
    ///   the correction ledger and the rejection is logged.
    /// - `PersistenceWriteFailed` when the appended correction could not be
    ///   snapshotted.
    pub fn apply_correction(
        &mut self,
        request: CorrectionRequest,
    ) -> CoreResult<AttendanceCorrection> {
        let applied = self
            .correction_service
            .apply(self.flow.attendance(), &mut self.corrections, request)
            .map_err(CoreError::from);
        let correction = match applied {
            Ok(correction) => correction,
            Err(err) => {
                self.record_error(&err);
                return Err(err);
            }
        };
        self.persist_or_error()?;
        Ok(correction)
    }

    /// Builds an export and verifies it before returning.
    ///
    /// # Errors
    /// - `Export(NoData)` when every ledger is empty.
    /// - `Export(IntegrityMismatch)` when the built content does not verify.
    ///
    /// Either error is also appended to the event log.
    pub fn export(&mut self, format: ExportFormat) -> CoreResult<ExportPayload> {
        let built = self
            .export_service
            .build_export(
                format,
                self.flow.attendance().fetch_all(),
                self.corrections.fetch_all(),
                self.flow.evidence().fetch_all(),
            )
            .map_err(CoreError::from)
            .and_then(|payload| {
                if ExportService::verify(&payload.content, &payload.integrity_hash) {
                    Ok(payload)
                } else {
                    warn!(
                        "event=export_verify module=engine status=error format={}",
                        format.as_str()
                    );
                    Err(ExportError::IntegrityMismatch.into())
                }
            });
        if let Err(err) = &built {
            self.record_error(err);
        }
        built
    }

    /// Interval as currently corrected, or `None` for an unknown id.
    pub fn effective_interval(&self, interval_id: IntervalId) -> Option<AttendanceSnapshot> {
        self.flow
            .attendance()
            .fetch_by_id(interval_id)
            .map(|interval| effective_snapshot(interval, &self.corrections))
    }

    /// Re-verifies correction hashes and the at-most-one-open invariant.
    pub fn audit(&self) -> AuditReport {
        let invalid_corrections = self
            .corrections
            .fetch_all()
            .iter()
            .filter(|correction| !verify_correction(correction, &correction.integrity_hash))
            .map(|correction| correction.id)
            .collect();

        let mut open_per_place: BTreeMap<PlaceId, usize> = BTreeMap::new();
        for interval in self.flow.attendance().fetch_all() {
            if interval.is_open() {
                *open_per_place.entry(interval.place_id).or_default() += 1;
            }
        }
        let open_invariant_violations = open_per_place
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(place_id, _)| place_id)
            .collect();

        AuditReport {
            invalid_corrections,
            open_invariant_violations,
        }
    }

    /// Current ledgers as one snapshot.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            places: self.places.fetch_all().to_vec(),
            attendance: self.flow.attendance().fetch_all().to_vec(),
            corrections: self.corrections.fetch_all().to_vec(),
            evidence: self.flow.evidence().fetch_all().to_vec(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn permission_status(&self) -> PermissionStatus {
        self.permission_status
    }

    pub fn permission_decision(&self) -> PermissionDecision {
        PermissionPolicy::evaluate(
            self.permission_status,
            self.config.requires_background_recording,
        )
    }

    pub fn places(&self) -> &[Place] {
        self.places.fetch_all()
    }

    pub fn attendance(&self) -> &[AttendanceInterval] {
        self.flow.attendance().fetch_all()
    }

    pub fn open_interval(&self, place_id: PlaceId) -> Option<&AttendanceInterval> {
        self.flow.attendance().fetch_open_record(place_id)
    }

    pub fn evidence(&self) -> &[LocationEvidence] {
        self.flow.evidence().fetch_all()
    }

    pub fn corrections(&self) -> &[AttendanceCorrection] {
        self.corrections.fetch_all()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn verifier_phase(&self, place_id: PlaceId) -> VerifierPhase {
        self.flow.verifier_phase(place_id)
    }

    pub fn monitor(&self) -> &M {
        self.regions.monitor()
    }

    /// Shell access to the monitor, e.g. to drain a command journal.
    pub fn monitor_mut(&mut self) -> &mut M {
        self.regions.monitor_mut()
    }

    pub fn router_mut(&mut self) -> &mut RegionRouter {
        &mut self.router
    }

    fn recording_allowed(&self) -> bool {
        self.permission_decision().should_run_auto_recording
    }

    /// Resolves a region event to a monitored place, or explains the drop.
    fn gate_region(&mut self, region: &str, report: &mut DispatchReport) -> Option<Place> {
        let Some(place_id) = self.router.resolve(region) else {
            debug!("event=region_ignored module=engine status=ok reason=unknown_region");
            return None;
        };
        self.gate_place(place_id, report)
    }

    fn gate_place(&mut self, place_id: PlaceId, report: &mut DispatchReport) -> Option<Place> {
        let place = match self.places.fetch_by_id(place_id) {
            Some(place) if place.monitoring_enabled => place.clone(),
            Some(_) => {
                debug!(
                    "event=place_ignored module=engine status=ok place_id={} reason=monitoring_disabled",
                    place_id
                );
                return None;
            }
            None => {
                debug!(
                    "event=place_ignored module=engine status=ok place_id={} reason=unknown_place",
                    place_id
                );
                return None;
            }
        };

        if !self.recording_allowed() {
            report.failure = Some(self.record_failure(
                FailureType::PermissionInsufficient,
                format!("permission={}", self.permission_status.as_str()),
            ));
            return None;
        }
        Some(place)
    }

    fn on_region_entered(&mut self, region: &str) -> DispatchReport {
        let mut report = DispatchReport::default();
        if let Some(place) = self.gate_region(region, &mut report) {
            self.event_log
                .record(LogEventType::DidEnterRegion { place_id: place.id });
            self.flow.handle_did_enter(&place);
        }
        report
    }

    fn on_region_exited(&mut self, region: &str) -> DispatchReport {
        let mut report = DispatchReport::default();
        if let Some(place) = self.gate_region(region, &mut report) {
            self.event_log
                .record(LogEventType::DidExitRegion { place_id: place.id });
            self.flow.handle_did_exit(&place);
        }
        report
    }

    fn on_state_determined(&mut self, region: &str, is_inside: bool) -> DispatchReport {
        let mut report = DispatchReport::default();
        let Some(place) = self.gate_region(region, &mut report) else {
            return report;
        };

        let has_open = self.flow.attendance().fetch_open_record(place.id).is_some();
        let phase = self.flow.verifier_phase(place.id);
        if is_inside && !has_open && phase == VerifierPhase::Idle {
            self.event_log
                .record(LogEventType::DidEnterRegion { place_id: place.id });
            self.flow.handle_did_enter(&place);
        } else if !is_inside && has_open && phase != VerifierPhase::VerifyingExit {
            self.event_log
                .record(LogEventType::DidExitRegion { place_id: place.id });
            self.flow.handle_did_exit(&place);
        }
        report
    }

    fn on_distance_sample(&mut self, place_id: PlaceId, distance: f64) -> DispatchReport {
        let mut report = DispatchReport::default();
        if !distance.is_finite() || distance < 0.0 {
            report.failure = Some(self.record_failure(
                FailureType::LocationUnavailable,
                format!("unusable distance sample for place {place_id}"),
            ));
            return report;
        }
        if let Some(place) = self.gate_place(place_id, &mut report) {
            self.feed(&place, distance, &mut report);
        }
        report
    }

    fn on_coordinate_sample(&mut self, sample: CoordinateSample) -> DispatchReport {
        let mut report = DispatchReport::default();
        if !sample.is_usable() {
            report.failure = Some(self.record_failure(
                FailureType::LocationUnavailable,
                "unusable coordinate sample",
            ));
            return report;
        }

        let position = Coordinate::new(sample.latitude, sample.longitude);
        for place_id in self.flow.active_place_ids() {
            if let Some(place) = self.gate_place(place_id, &mut report) {
                let distance = distance_meters(position, place.coordinate());
                self.feed(&place, distance, &mut report);
            }
        }
        report
    }

    fn feed(&mut self, place: &Place, distance: f64, report: &mut DispatchReport) {
        let phase_before = self.flow.verifier_phase(place.id);
        let outcome = self.flow.handle_location_update(place, distance);
        match outcome {
            FlowOutcome::None => {
                if phase_before == VerifierPhase::VerifyingExit
                    && self.flow.verifier_phase(place.id) == VerifierPhase::Idle
                {
                    self.event_log.record(LogEventType::Failure {
                        tag: "not_found",
                        detail: format!("confirmed exit without open interval place_id={}", place.id),
                    });
                }
                return;
            }
            FlowOutcome::EntryConfirmed(interval_id) => {
                self.event_log
                    .record(LogEventType::StayConfirmed { interval_id });
            }
            FlowOutcome::EntryCancelled => {
                self.event_log
                    .record(LogEventType::StayCancelled { place_id: place.id });
            }
            FlowOutcome::ExitConfirmed(interval_id) => {
                self.event_log
                    .record(LogEventType::ExitConfirmed { interval_id });
            }
        }
        report.outcomes.push((place.id, outcome));
    }

    fn record_failure(
        &mut self,
        failure_type: FailureType,
        detail: impl Into<String>,
    ) -> EngineFailure {
        let failure = EngineFailure::new(failure_type, detail);
        self.event_log
            .record(LogEventType::failure(failure_type, failure.detail.clone()));
        failure
    }

    /// Appends a caller-facing error to the event log under its type tag.
    fn record_error(&mut self, err: &CoreError) {
        self.event_log.record(LogEventType::Failure {
            tag: err.type_tag(),
            detail: err.to_string(),
        });
    }

    fn finish_place_change(&mut self) -> CoreResult<RegionSyncResult> {
        let sync = self.resync_regions();
        self.persist_or_error()?;
        Ok(sync)
    }

    fn persist_or_error(&mut self) -> CoreResult<()> {
        match self.try_persist() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.record_failure(FailureType::PersistenceWriteFailed, err.to_string());
                Err(err)
            }
        }
    }

    fn persist(&mut self) -> Result<(), EngineFailure> {
        self.try_persist().map_err(|err| {
            self.record_failure(FailureType::PersistenceWriteFailed, err.to_string())
        })
    }

    /// Saves a snapshot when any ledger changed since the last save.
    ///
    /// Skips the write while a previous failure awaits `retry_persist`.
    fn try_persist(&mut self) -> CoreResult<()> {
        let pending: Vec<LedgerKind> = {
            let dirty = self.dirty.lock().unwrap_or_else(PoisonError::into_inner);
            dirty.iter().copied().collect()
        };
        if pending.is_empty() {
            return Ok(());
        }
        if self.store.is_none() {
            self.clear_dirty();
            return Ok(());
        }
        let ledgers = pending
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join("+");
        if self.save_blocked {
            debug!(
                "event=snapshot_commit module=engine status=skipped reason=awaiting_retry ledgers={ledgers}"
            );
            return Ok(());
        }

        let next = self.snapshot();
        if let Err(err) = self.write_snapshot(&next) {
            self.save_blocked = true;
            warn!(
                "event=snapshot_commit module=engine status=error ledgers={ledgers} blocked=true"
            );
            return Err(err.into());
        }

        debug!("event=snapshot_commit module=engine status=ok ledgers={ledgers}");
        self.last_persisted = next;
        self.clear_dirty();
        Ok(())
    }

    fn write_snapshot(&mut self, next: &LedgerSnapshot) -> PersistResult<()> {
        ensure_append_only(&self.last_persisted, next)?;
        match self.store.as_mut() {
            Some(store) => store.save(next),
            None => Ok(()),
        }
    }

    fn clear_dirty(&self) {
        self.dirty
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Attempts the snapshot write held back by an earlier failure.
    ///
    /// Succeeds without writing when nothing changed since the last save.
    ///
    /// # Errors
    /// - `PersistenceWriteFailed` when the store rejects the write again;
    ///   automatic saves stay paused.
    pub fn retry_persist(&mut self) -> CoreResult<()> {
        self.save_blocked = false;
        self.persist_or_error()
    }

    /// Whether some ledger change has not reached the store yet.
    pub fn has_unsaved_changes(&self) -> bool {
        !self
            .dirty
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Current instant of the engine clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
