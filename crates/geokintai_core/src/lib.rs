//! Core domain logic for GeoKintai geofence attendance.
//! This crate is the single source of truth for attendance invariants.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod region;
pub mod repo;
pub mod service;
pub mod timefmt;
pub mod verification;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use engine::event::{
    CoordinateSample, DispatchReport, EngineFailure, LocationEvent,
};
pub use engine::{AttendanceEngine, AuditReport};
pub use error::{CoreError, CoreResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::attendance::{AttendanceInterval, AttendanceSnapshot, IntervalId};
pub use model::correction::{AttendanceCorrection, CorrectionId, CorrectionRequest};
pub use model::evidence::{EvidenceId, EvidenceReason, LocationEvidence};
pub use model::place::{Place, PlaceDraft, PlaceId, PlaceValidationError};
pub use model::region::MonitoredRegion;
pub use persistence::{
    JsonFileSnapshotStore, LedgerSnapshot, MemorySnapshotStore, PersistenceError, SnapshotStore,
};
pub use region::{
    InMemoryRegionMonitor, MonitorCommand, RegionMonitor, RegionMonitoringSyncService,
    RegionRouter, RegionSyncResult,
};
pub use repo::append_only::is_append_only;
pub use repo::{LedgerKind, RepoError, RepoResult};
pub use service::attendance_flow::{AttendanceFlowCoordinator, FlowOutcome};
pub use service::event_log::{EventLog, LogEvent, LogEventType, LogLevel};
pub use service::export_service::{ExportError, ExportFormat, ExportPayload, ExportService};
pub use service::failure::{FailureHandling, FailureType, UserMessage};
pub use service::permission::{
    PermissionDecision, PermissionGuidance, PermissionPolicy, PermissionStatus,
};
pub use verification::{
    ExitDecision, ExitVerifier, StayDecision, StayVerifier, VerifierPhase, VerifierState,
};

/// Minimal health-check API for shell integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
