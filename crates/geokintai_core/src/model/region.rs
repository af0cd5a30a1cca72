//! Monitored region model.

use crate::model::place::{Place, PlaceId};
use serde::{Deserialize, Serialize};

/// The geofence mirror of a place, as handed to the region monitor.
///
/// Compared by full value: a moved center or a new radius is a different
/// region and must restart monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitoredRegion {
    pub place_id: PlaceId,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

impl From<&Place> for MonitoredRegion {
    fn from(place: &Place) -> Self {
        Self {
            place_id: place.id,
            latitude: place.latitude,
            longitude: place.longitude,
            radius_meters: place.radius_meters,
        }
    }
}
