//! CLI smoke entry point and scenario replayer.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `geokintai_core` linkage.
//! - Replay a recorded event scenario against a manual clock so attendance
//!   decisions can be reproduced without a device.
//! - Keep output deterministic for quick local sanity checks.

use chrono::{DateTime, Utc};
use geokintai_core::{
    AttendanceEngine, Clock, EngineConfig, ExportFormat, FlowOutcome, InMemoryRegionMonitor,
    LocationEvent, ManualClock, PermissionStatus, Place, PlaceId,
};
use serde::Deserialize;
use std::process::ExitCode;
use std::sync::Arc;

/// Recorded session: places, a start instant and a timed event sequence.
#[derive(Debug, Deserialize)]
struct Scenario {
    start: DateTime<Utc>,
    #[serde(default = "default_permission")]
    permission: PermissionStatus,
    places: Vec<ScenarioPlace>,
    steps: Vec<ScenarioStep>,
    #[serde(default)]
    export: Option<ExportFormat>,
}

#[derive(Debug, Deserialize)]
struct ScenarioPlace {
    id: PlaceId,
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    radius_meters: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ScenarioStep {
    /// Seconds to move the clock forward before delivering `event`.
    #[serde(default)]
    advance_seconds: i64,
    event: LocationEvent,
}

fn default_permission() -> PermissionStatus {
    PermissionStatus::Always
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => {
            println!("geokintai_core ping={}", geokintai_core::ping());
            println!("geokintai_core version={}", geokintai_core::core_version());
            ExitCode::SUCCESS
        }
        [command, path] if command == "replay" => match replay_file(path) {
            Ok(lines) => {
                for line in lines {
                    println!("{line}");
                }
                ExitCode::SUCCESS
            }
            Err(message) => {
                eprintln!("replay failed: {message}");
                ExitCode::FAILURE
            }
        },
        _ => {
            eprintln!("usage: geokintai_cli [replay <scenario.json>]");
            ExitCode::from(2)
        }
    }
}

fn replay_file(path: &str) -> Result<Vec<String>, String> {
    let raw = std::fs::read_to_string(path).map_err(|err| format!("read {path}: {err}"))?;
    let scenario: Scenario =
        serde_json::from_str(&raw).map_err(|err| format!("parse {path}: {err}"))?;
    replay(scenario)
}

/// Runs `scenario` and returns one output line per observable decision.
fn replay(scenario: Scenario) -> Result<Vec<String>, String> {
    let config = EngineConfig::default();
    let default_radius = config.default_radius_meters;
    let clock = Arc::new(ManualClock::new(scenario.start));
    let mut engine = AttendanceEngine::new(config, clock.clone(), InMemoryRegionMonitor::new());

    for entry in &scenario.places {
        let place = Place::with_id(
            entry.id,
            entry.name.as_str(),
            entry.latitude,
            entry.longitude,
            entry.radius_meters.unwrap_or(default_radius),
        );
        engine
            .upsert_place(place)
            .map_err(|err| format!("place {}: {err}", entry.id))?;
    }
    engine.dispatch(LocationEvent::AuthorizationChanged {
        status: scenario.permission,
    });

    let mut lines = Vec::new();
    for step in scenario.steps {
        clock.advance_seconds(step.advance_seconds);
        let kind = step.event.name();
        let report = engine.dispatch(step.event);
        let at = geokintai_core::timefmt::canonical(clock.now());

        for (place_id, outcome) in &report.outcomes {
            let text = match outcome {
                FlowOutcome::None => continue,
                FlowOutcome::EntryConfirmed(id) => format!("entry_confirmed interval={id}"),
                FlowOutcome::EntryCancelled => "entry_cancelled".to_string(),
                FlowOutcome::ExitConfirmed(id) => format!("exit_confirmed interval={id}"),
            };
            lines.push(format!("{at} {kind} place={place_id} {text}"));
        }
        if let Some(failure) = &report.failure {
            lines.push(format!(
                "{at} {kind} failure={} retry={}",
                failure.failure_type.as_str(),
                failure.handling.should_retry
            ));
        }
    }

    for interval in engine.attendance() {
        lines.push(format!(
            "interval place={} entry={} exit={}",
            interval.place_id,
            geokintai_core::timefmt::canonical(interval.entry_time),
            geokintai_core::timefmt::canonical_or(interval.exit_time, "open")
        ));
    }

    if let Some(format) = scenario.export {
        let payload = engine.export(format).map_err(|err| err.to_string())?;
        lines.push(payload.content);
        lines.push(format!("integrity_hash={}", payload.integrity_hash));
    }
    Ok(lines)
}
