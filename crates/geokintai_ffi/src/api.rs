//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Hold the single attendance engine session owned by the app process.
//! - Keep error semantics simple: envelopes carry `ok` plus a message.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Return values are UTF-8 strings with stable meaning.
//! - Region start/stop commands are drained after every call that can
//!   change them, so the shell applies each command exactly once.

use chrono::{DateTime, FixedOffset, Utc};
use geokintai_core::timefmt;
use geokintai_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AttendanceEngine, DispatchReport, EngineConfig, ExportFormat, ExportService, FailureHandling,
    FailureType, FlowOutcome, InMemoryRegionMonitor, JsonFileSnapshotStore, LocationEvent,
    MonitorCommand, PermissionGuidance, PermissionPolicy, PermissionStatus, PlaceDraft,
    RegionRouter, SystemClock, UserMessage,
};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

type Session = AttendanceEngine<InMemoryRegionMonitor>;

static SESSION: OnceLock<Mutex<Option<Session>>> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - UI-thread safe for current implementation.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - UI-thread safe for current implementation.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Optional affected place ID.
    pub place_id: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
    /// Region commands the shell must apply (`start:<region>` / `stop:<region>`).
    pub monitor_commands: Vec<String>,
}

impl ActionResponse {
    fn success(message: impl Into<String>, place_id: Option<String>) -> Self {
        Self {
            ok: true,
            place_id,
            message: message.into(),
            monitor_commands: Vec::new(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            place_id: None,
            message: message.into(),
            monitor_commands: Vec::new(),
        }
    }
}

/// Outcome of one dispatched platform event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    pub ok: bool,
    /// `<kind>:<place_id>[:<interval_id>]` per place the event touched.
    pub outcomes: Vec<String>,
    /// Region identifiers whose inside/outside state should be requested.
    pub state_requests: Vec<String>,
    pub monitor_commands: Vec<String>,
    /// Failure type tag, when the event produced a failure.
    pub failure: Option<String>,
    /// User message category for the failure (`location_retrying` etc.).
    pub user_message: Option<String>,
    pub message: String,
}

impl DispatchResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            outcomes: Vec::new(),
            state_requests: Vec::new(),
            monitor_commands: Vec::new(),
            failure: None,
            user_message: None,
            message: message.into(),
        }
    }
}

/// Export envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResponse {
    pub ok: bool,
    pub format: String,
    pub content: String,
    pub integrity_hash: String,
    pub message: String,
}

/// Permission decision envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionResponse {
    pub ok: bool,
    pub should_run_auto_recording: bool,
    /// Whether the shell should offer a shortcut to system settings.
    pub open_settings: bool,
    pub message: String,
}

/// Failure handling envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailurePolicyResponse {
    pub ok: bool,
    pub should_retry: bool,
    pub should_preserve_existing_data: bool,
    pub user_message: String,
    pub message: String,
}

/// Opens the engine session backed by a JSON snapshot at `state_path`.
///
/// Engine settings come from `GEOKINTAI_*` environment variables.
///
/// # FFI contract
/// - Sync call; reads the snapshot file.
/// - Replaces any previously open session.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn engine_open(state_path: String) -> ActionResponse {
    let path = state_path.trim();
    if path.is_empty() {
        return ActionResponse::failure("engine_open failed: state_path must not be empty");
    }

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(err) => return ActionResponse::failure(format!("engine_open failed: {err}")),
    };
    let engine = match AttendanceEngine::open(
        config,
        Arc::new(SystemClock),
        InMemoryRegionMonitor::new(),
        Box::new(JsonFileSnapshotStore::new(path)),
    ) {
        Ok(engine) => engine,
        Err(err) => return ActionResponse::failure(format!("engine_open failed: {err}")),
    };

    let message = format!("engine opened with {} place(s)", engine.places().len());
    *session_slot() = Some(engine);
    log::info!("event=ffi_engine_open module=ffi status=ok");
    ActionResponse::success(message, None)
}

/// Adds a place from raw settings-form input.
///
/// Blank `radius` uses the configured default radius.
///
/// # FFI contract
/// - Sync call; persists the place snapshot.
/// - Never panics; validation errors come back with `ok = false`.
#[flutter_rust_bridge::frb(sync)]
pub fn place_add(name: String, latitude: String, longitude: String, radius: String) -> ActionResponse {
    let draft = PlaceDraft {
        name,
        latitude,
        longitude,
        radius,
    };
    with_session(ActionResponse::failure, |engine| {
        let mut response = match engine.add_place(&draft) {
            Ok((place, _)) => {
                ActionResponse::success("place added", Some(place.id.to_string()))
            }
            Err(err) => ActionResponse::failure(format!("place_add failed: {err}")),
        };
        response.monitor_commands = drain_monitor_commands(engine);
        response
    })
}

/// Enables or disables monitoring for one place.
///
/// # FFI contract
/// - Sync call; persists the place snapshot.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn place_set_monitoring(place_id: String, enabled: bool) -> ActionResponse {
    let Ok(id) = uuid::Uuid::parse_str(place_id.trim()) else {
        return ActionResponse::failure(format!("invalid place_id: `{place_id}`"));
    };
    with_session(ActionResponse::failure, |engine| {
        let mut response = match engine.set_monitoring(id, enabled) {
            Ok(_) => ActionResponse::success("monitoring updated", Some(id.to_string())),
            Err(err) => ActionResponse::failure(format!("place_set_monitoring failed: {err}")),
        };
        response.monitor_commands = drain_monitor_commands(engine);
        response
    })
}

/// Deletes one place; its attendance history is kept.
///
/// # FFI contract
/// - Sync call; persists the place snapshot.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn place_delete(place_id: String) -> ActionResponse {
    let Ok(id) = uuid::Uuid::parse_str(place_id.trim()) else {
        return ActionResponse::failure(format!("invalid place_id: `{place_id}`"));
    };
    with_session(ActionResponse::failure, |engine| {
        let mut response = match engine.delete_place(id) {
            Ok(_) => ActionResponse::success("place deleted", Some(id.to_string())),
            Err(err) => ActionResponse::failure(format!("place_delete failed: {err}")),
        };
        response.monitor_commands = drain_monitor_commands(engine);
        response
    })
}

/// Feeds one platform event, encoded as JSON, into the engine.
///
/// Example: `{"type":"did_enter_region","region":"<uuid>"}`.
///
/// # FFI contract
/// - Sync call; may persist a snapshot.
/// - Never panics; malformed JSON returns `ok = false`.
#[flutter_rust_bridge::frb(sync)]
pub fn engine_dispatch(event_json: String) -> DispatchResponse {
    let event: LocationEvent = match serde_json::from_str(&event_json) {
        Ok(event) => event,
        Err(err) => return DispatchResponse::failure(format!("invalid event: {err}")),
    };
    with_session(DispatchResponse::failure, |engine| {
        let report = engine.dispatch(event);
        let monitor_commands = drain_monitor_commands(engine);
        to_dispatch_response(report, monitor_commands)
    })
}

/// Retries the snapshot write paused by an earlier persistence failure.
///
/// # FFI contract
/// - Sync call; writes the snapshot file when changes are pending.
/// - Never panics; a repeated failure returns `ok = false`.
#[flutter_rust_bridge::frb(sync)]
pub fn engine_retry_persist() -> ActionResponse {
    with_session(ActionResponse::failure, |engine| match engine.retry_persist() {
        Ok(()) => ActionResponse::success("snapshot saved", None),
        Err(err) => ActionResponse::failure(format!("engine_retry_persist failed: {err}")),
    })
}

/// Builds a verifiable export of every ledger.
///
/// `format` is `csv` or `pdf`.
///
/// # FFI contract
/// - Sync call, in-memory only.
/// - Never panics; empty ledgers return `ok = false` with `no_data`.
#[flutter_rust_bridge::frb(sync)]
pub fn engine_export(format: String) -> ExportResponse {
    let failure = |message: String| ExportResponse {
        ok: false,
        format: format.clone(),
        content: String::new(),
        integrity_hash: String::new(),
        message,
    };
    let Some(export_format) = parse_export_format(&format) else {
        return failure(format!("unsupported export format: `{format}`"));
    };

    with_session(failure, |engine| match engine.export(export_format) {
        Ok(payload) => ExportResponse {
            ok: true,
            format: payload.format.as_str().to_string(),
            content: payload.content,
            integrity_hash: payload.integrity_hash,
            message: "export ready".to_string(),
        },
        Err(err) => ExportResponse {
            ok: false,
            format: export_format.as_str().to_string(),
            content: String::new(),
            integrity_hash: String::new(),
            message: err.type_tag().to_string(),
        },
    })
}

/// Checks an export body against its recorded integrity hash.
///
/// # FFI contract
/// - Sync call, pure function.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn verify_export(content: String, integrity_hash: String) -> bool {
    ExportService::verify(&content, &integrity_hash)
}

/// Maps a permission status tag to an auto-recording decision.
///
/// # FFI contract
/// - Sync call, pure function.
/// - Never panics; unknown tags return `ok = false`.
#[flutter_rust_bridge::frb(sync)]
pub fn evaluate_permission(status: String, requires_background_recording: bool) -> PermissionResponse {
    let Some(parsed) = parse_permission_status(&status) else {
        return PermissionResponse {
            ok: false,
            should_run_auto_recording: false,
            open_settings: false,
            message: format!("unknown permission status: `{status}`"),
        };
    };

    let decision = PermissionPolicy::evaluate(parsed, requires_background_recording);
    PermissionResponse {
        ok: true,
        should_run_auto_recording: decision.should_run_auto_recording,
        open_settings: decision.guidance == PermissionGuidance::OpenSettings,
        message: String::new(),
    }
}

/// Returns the handling policy for a failure type tag.
///
/// # FFI contract
/// - Sync call, pure function.
/// - Never panics; unknown tags return `ok = false`.
#[flutter_rust_bridge::frb(sync)]
pub fn failure_policy(failure_type: String) -> FailurePolicyResponse {
    let normalized = failure_type.trim();
    let Some(parsed) = FailureType::ALL
        .into_iter()
        .find(|candidate| candidate.as_str() == normalized)
    else {
        return FailurePolicyResponse {
            ok: false,
            should_retry: false,
            should_preserve_existing_data: true,
            user_message: String::new(),
            message: format!("unknown failure type: `{failure_type}`"),
        };
    };

    let handling = FailureHandling::for_failure(parsed);
    FailurePolicyResponse {
        ok: true,
        should_retry: handling.should_retry,
        should_preserve_existing_data: handling.should_preserve_existing_data,
        user_message: user_message_tag(handling.message).to_string(),
        message: String::new(),
    }
}

/// Renders an epoch-millisecond instant as `YYYY-MM-DD HH:MM` at a UTC offset.
///
/// # FFI contract
/// - Sync call, pure function.
/// - Never panics; out-of-range input returns an empty string.
#[flutter_rust_bridge::frb(sync)]
pub fn display_time(epoch_ms: i64, utc_offset_minutes: i32) -> String {
    let Some(instant) = DateTime::<Utc>::from_timestamp_millis(epoch_ms) else {
        return String::new();
    };
    let Some(offset) = utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
    else {
        return String::new();
    };
    timefmt::display(instant, offset)
}

fn session_slot() -> std::sync::MutexGuard<'static, Option<Session>> {
    SESSION
        .get_or_init(|| Mutex::new(None))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn with_session<T>(
    on_missing: impl FnOnce(String) -> T,
    f: impl FnOnce(&mut Session) -> T,
) -> T {
    let mut slot = session_slot();
    match slot.as_mut() {
        Some(engine) => f(engine),
        None => on_missing("engine is not open; call engine_open first".to_string()),
    }
}

fn drain_monitor_commands(engine: &mut Session) -> Vec<String> {
    let commands = engine
        .monitor()
        .journal()
        .iter()
        .map(|command| match command {
            MonitorCommand::Start(region) => {
                format!("start:{}", RegionRouter::identifier_for(region.place_id))
            }
            MonitorCommand::Stop(place_id) => {
                format!("stop:{}", RegionRouter::identifier_for(*place_id))
            }
        })
        .collect();
    engine.monitor_mut().clear_journal();
    commands
}

fn to_dispatch_response(report: DispatchReport, monitor_commands: Vec<String>) -> DispatchResponse {
    let outcomes = report
        .outcomes
        .iter()
        .filter_map(|(place_id, outcome)| match outcome {
            FlowOutcome::None => None,
            FlowOutcome::EntryConfirmed(interval_id) => {
                Some(format!("entry_confirmed:{place_id}:{interval_id}"))
            }
            FlowOutcome::EntryCancelled => Some(format!("entry_cancelled:{place_id}")),
            FlowOutcome::ExitConfirmed(interval_id) => {
                Some(format!("exit_confirmed:{place_id}:{interval_id}"))
            }
        })
        .collect();
    let state_requests = report
        .state_requests
        .iter()
        .map(|place_id| RegionRouter::identifier_for(*place_id))
        .collect();

    let (failure, user_message, message) = match report.failure {
        Some(failure) => (
            Some(failure.failure_type.as_str().to_string()),
            Some(user_message_tag(failure.handling.message).to_string()),
            failure.detail,
        ),
        None => (None, None, String::new()),
    };

    DispatchResponse {
        ok: true,
        outcomes,
        state_requests,
        monitor_commands,
        failure,
        user_message,
        message,
    }
}

fn parse_permission_status(raw: &str) -> Option<PermissionStatus> {
    let normalized = raw.trim().to_ascii_lowercase();
    PermissionStatus::ALL
        .into_iter()
        .find(|status| status.as_str() == normalized)
}

fn parse_export_format(raw: &str) -> Option<ExportFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "csv" => Some(ExportFormat::Csv),
        "pdf" => Some(ExportFormat::Pdf),
        _ => None,
    }
}

fn user_message_tag(message: UserMessage) -> &'static str {
    match message {
        UserMessage::LocationRetrying => "location_retrying",
        UserMessage::SaveFailedDataKept => "save_failed_data_kept",
        UserMessage::OpenSettings => "open_settings",
    }
}
