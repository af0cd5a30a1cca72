//! Typed inputs and outputs of `AttendanceEngine::dispatch`.

use crate::model::place::PlaceId;
use crate::region::sync::RegionSyncResult;
use crate::service::attendance_flow::FlowOutcome;
use crate::service::failure::{FailureHandling, FailureType};
use crate::service::permission::PermissionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw fix from the platform location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSample {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub horizontal_accuracy: f64,
}

impl CoordinateSample {
    /// A fix is usable when its coordinates are in range and its accuracy
    /// is a non-negative number.
    pub fn is_usable(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.horizontal_accuracy.is_finite()
            && self.horizontal_accuracy >= 0.0
    }
}

/// Everything the platform shell can tell the engine.
///
/// Region events carry the platform region identifier; `RegionRouter`
/// resolves it to a place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocationEvent {
    AuthorizationChanged {
        status: PermissionStatus,
    },
    DidEnterRegion {
        region: String,
    },
    DidExitRegion {
        region: String,
    },
    DidDetermineState {
        region: String,
        is_inside: bool,
    },
    /// Distance from the place center, pre-computed by the shell.
    DistanceSample {
        place_id: PlaceId,
        distance_meters: f64,
    },
    CoordinateSample {
        sample: CoordinateSample,
    },
    LocationError {
        detail: String,
    },
}

impl LocationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthorizationChanged { .. } => "authorization_changed",
            Self::DidEnterRegion { .. } => "did_enter_region",
            Self::DidExitRegion { .. } => "did_exit_region",
            Self::DidDetermineState { .. } => "did_determine_state",
            Self::DistanceSample { .. } => "distance_sample",
            Self::CoordinateSample { .. } => "coordinate_sample",
            Self::LocationError { .. } => "location_error",
        }
    }
}

/// A classified failure raised while handling one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub failure_type: FailureType,
    pub handling: FailureHandling,
    pub detail: String,
}

impl EngineFailure {
    pub fn new(failure_type: FailureType, detail: impl Into<String>) -> Self {
        Self {
            failure_type,
            handling: FailureHandling::for_failure(failure_type),
            detail: detail.into(),
        }
    }
}

/// What one `dispatch` call changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Non-`None` flow outcomes, in processing order.
    pub outcomes: Vec<(PlaceId, FlowOutcome)>,
    pub region_sync: Option<RegionSyncResult>,
    /// Places whose current inside/outside state the shell should query.
    pub state_requests: Vec<PlaceId>,
    pub failure: Option<EngineFailure>,
}

impl DispatchReport {
    pub fn is_quiet(&self) -> bool {
        self.outcomes.is_empty()
            && self.region_sync.is_none()
            && self.state_requests.is_empty()
            && self.failure.is_none()
    }
}
