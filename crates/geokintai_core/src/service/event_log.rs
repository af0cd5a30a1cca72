//! Append-only domain event log.
//!
//! # Responsibility
//! - Record attendance transitions and failures as `LogEvent`s stamped by
//!   the injected clock.
//! - Mirror each appended event to the process `log` facade.
//!
//! # Invariants
//! - Events are never removed or rewritten.
//! - Failure events carry a stable type tag and a single-line detail.

use crate::clock::SharedClock;
use crate::logging::sanitize_message;
use crate::model::attendance::IntervalId;
use crate::model::place::PlaceId;
use crate::service::failure::FailureType;
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};

const MAX_DETAIL_CHARS: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Typed events accepted by `EventLog::record`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEventType {
    DidEnterRegion { place_id: PlaceId },
    StayConfirmed { interval_id: IntervalId },
    StayCancelled { place_id: PlaceId },
    DidExitRegion { place_id: PlaceId },
    ExitConfirmed { interval_id: IntervalId },
    Failure { tag: &'static str, detail: String },
}

impl LogEventType {
    /// Failure event for one of the policy-table failure types.
    pub fn failure(failure: FailureType, detail: impl Into<String>) -> Self {
        Self::Failure {
            tag: failure.as_str(),
            detail: detail.into(),
        }
    }

    fn level(&self) -> LogLevel {
        match self {
            Self::Failure { .. } => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::DidEnterRegion { place_id } => format!("did_enter_region place_id={place_id}"),
            Self::StayConfirmed { interval_id } => {
                format!("stay_confirmed interval_id={interval_id}")
            }
            Self::StayCancelled { place_id } => format!("stay_cancelled place_id={place_id}"),
            Self::DidExitRegion { place_id } => format!("did_exit_region place_id={place_id}"),
            Self::ExitConfirmed { interval_id } => {
                format!("exit_confirmed interval_id={interval_id}")
            }
            Self::Failure { tag, detail } => format!(
                "failure type={tag} detail={}",
                sanitize_message(detail, MAX_DETAIL_CHARS)
            ),
        }
    }
}

/// In-memory audit log owned by the engine.
pub struct EventLog {
    clock: SharedClock,
    events: Vec<LogEvent>,
}

impl EventLog {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            events: Vec::new(),
        }
    }

    /// Appends one event and returns it.
    pub fn record(&mut self, event_type: LogEventType) -> &LogEvent {
        let level = event_type.level();
        let message = event_type.render();
        match level {
            LogLevel::Info => info!("event=audit module=event_log status=ok {message}"),
            LogLevel::Error => error!("event=audit module=event_log status=error {message}"),
        }

        self.events.push(LogEvent {
            timestamp: self.clock.now(),
            level,
            message,
        });
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn errors(&self) -> impl Iterator<Item = &LogEvent> {
        self.events
            .iter()
            .filter(|event| event.level == LogLevel::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::{EventLog, LogEventType, LogLevel};
    use crate::clock::{Clock, ManualClock};
    use crate::service::failure::FailureType;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn failure_events_are_error_level_with_stable_tag() {
        let clock = Arc::new(ManualClock::at_epoch_seconds(1_700_000_000));
        let mut log = EventLog::new(clock.clone());

        let event = log
            .record(LogEventType::failure(
                FailureType::LocationUnavailable,
                "gps timeout\nretrying",
            ))
            .clone();

        assert_eq!(event.level, LogLevel::Error);
        assert_eq!(event.timestamp, clock.now());
        assert_eq!(
            event.message,
            "failure type=location_unavailable detail=gps timeout retrying"
        );
    }

    #[test]
    fn events_accumulate_in_order() {
        let clock = Arc::new(ManualClock::at_epoch_seconds(1_700_000_000));
        let mut log = EventLog::new(clock.clone());
        let place_id = Uuid::new_v4();

        log.record(LogEventType::DidEnterRegion { place_id });
        clock.advance_seconds(10);
        log.record(LogEventType::DidExitRegion { place_id });

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].timestamp < events[1].timestamp);
        assert_eq!(events[1].message, format!("did_exit_region place_id={place_id}"));
        assert_eq!(log.errors().count(), 0);
    }
}
