//! Place domain model.
//!
//! # Responsibility
//! - Define a registered place that can be geofenced.
//! - Parse raw settings input into a validated place.
//!
//! # Invariants
//! - `id` is stable; every other field may be edited by settings.
//! - `radius_meters` is strictly positive and finite.
//! - Coordinates stay inside WGS84 bounds.

use crate::geo::Coordinate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable place identifier.
pub type PlaceId = Uuid;

/// Geofence radius used when settings input leaves it blank.
pub const DEFAULT_PLACE_RADIUS_METERS: f64 = 100.0;

/// A registered place whose attendance is tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    /// Only enabled places are handed to the region monitor.
    pub monitoring_enabled: bool,
}

impl Place {
    /// Creates an enabled place with a generated id.
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64, radius_meters: f64) -> Self {
        Self::with_id(Uuid::new_v4(), name, latitude, longitude, radius_meters)
    }

    /// Creates an enabled place with a caller-provided id.
    pub fn with_id(
        id: PlaceId,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius_meters: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            latitude,
            longitude,
            radius_meters,
            monitoring_enabled: true,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Validates place invariants.
    ///
    /// # Errors
    /// - Nil id, blank name, out-of-range coordinates, or a non-positive radius.
    pub fn validate(&self) -> Result<(), PlaceValidationError> {
        if self.id.is_nil() {
            return Err(PlaceValidationError::NilId);
        }
        if self.name.trim().is_empty() {
            return Err(PlaceValidationError::EmptyName);
        }
        check_latitude(self.latitude)?;
        check_longitude(self.longitude)?;
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(PlaceValidationError::InvalidRadius(
                self.radius_meters.to_string(),
            ));
        }
        Ok(())
    }
}

/// Raw text input from a place settings form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceDraft {
    pub name: String,
    pub latitude: String,
    pub longitude: String,
    /// Blank means "use the default radius".
    pub radius: String,
}

impl PlaceDraft {
    /// Parses form input into a new, enabled place.
    ///
    /// # Errors
    /// - `EmptyName` when the trimmed name is empty.
    /// - `NotANumber` when a coordinate or radius does not parse.
    /// - Range errors for coordinates and radius.
    pub fn parse(&self, default_radius_meters: f64) -> Result<Place, PlaceValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(PlaceValidationError::EmptyName);
        }

        let latitude = parse_number("latitude", &self.latitude)?;
        let longitude = parse_number("longitude", &self.longitude)?;

        let radius_text = self.radius.trim();
        let radius_meters = if radius_text.is_empty() {
            default_radius_meters
        } else {
            match radius_text.parse::<f64>() {
                Ok(value) if value.is_finite() && value > 0.0 => value,
                _ => {
                    return Err(PlaceValidationError::InvalidRadius(radius_text.to_string()));
                }
            }
        };

        let place = Place::new(name, latitude, longitude, radius_meters);
        place.validate()?;
        Ok(place)
    }
}

/// Validation errors for place input and persisted places.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceValidationError {
    NilId,
    EmptyName,
    NotANumber { field: &'static str, value: String },
    LatitudeOutOfRange(f64),
    LongitudeOutOfRange(f64),
    InvalidRadius(String),
}

impl Display for PlaceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "place id must not be nil"),
            Self::EmptyName => write!(f, "place name must not be empty"),
            Self::NotANumber { field, value } => write!(f, "{field} is not a number: `{value}`"),
            Self::LatitudeOutOfRange(value) => {
                write!(f, "latitude {value} is outside [-90, 90]")
            }
            Self::LongitudeOutOfRange(value) => {
                write!(f, "longitude {value} is outside [-180, 180]")
            }
            Self::InvalidRadius(value) => {
                write!(f, "radius must be a positive number, got `{value}`")
            }
        }
    }
}

impl Error for PlaceValidationError {}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, PlaceValidationError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| PlaceValidationError::NotANumber {
            field,
            value: trimmed.to_string(),
        })
}

fn check_latitude(value: f64) -> Result<(), PlaceValidationError> {
    if (-90.0..=90.0).contains(&value) {
        Ok(())
    } else {
        Err(PlaceValidationError::LatitudeOutOfRange(value))
    }
}

fn check_longitude(value: f64) -> Result<(), PlaceValidationError> {
    if (-180.0..=180.0).contains(&value) {
        Ok(())
    } else {
        Err(PlaceValidationError::LongitudeOutOfRange(value))
    }
}

#[cfg(test)]
mod tests {
    use super::{PlaceDraft, PlaceValidationError, DEFAULT_PLACE_RADIUS_METERS};

    fn draft(name: &str, lat: &str, lon: &str, radius: &str) -> PlaceDraft {
        PlaceDraft {
            name: name.to_string(),
            latitude: lat.to_string(),
            longitude: lon.to_string(),
            radius: radius.to_string(),
        }
    }

    #[test]
    fn blank_radius_uses_default_and_enables_monitoring() {
        let place = draft("  Head office ", "35.681236", "139.767125", " ")
            .parse(DEFAULT_PLACE_RADIUS_METERS)
            .expect("valid draft");
        assert_eq!(place.name, "Head office");
        assert_eq!(place.radius_meters, 100.0);
        assert!(place.monitoring_enabled);
    }

    #[test]
    fn rejects_blank_name() {
        let err = draft("   ", "35", "139", "")
            .parse(DEFAULT_PLACE_RADIUS_METERS)
            .expect_err("blank name must fail");
        assert_eq!(err, PlaceValidationError::EmptyName);
    }

    #[test]
    fn rejects_non_numeric_coordinate() {
        let err = draft("Office", "north", "139", "")
            .parse(DEFAULT_PLACE_RADIUS_METERS)
            .expect_err("text latitude must fail");
        assert!(matches!(
            err,
            PlaceValidationError::NotANumber {
                field: "latitude",
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_or_negative_radius() {
        for radius in ["0", "-5", "wide"] {
            let err = draft("Office", "35", "139", radius)
                .parse(DEFAULT_PLACE_RADIUS_METERS)
                .expect_err("bad radius must fail");
            assert!(matches!(err, PlaceValidationError::InvalidRadius(_)));
        }
    }

    #[test]
    fn rejects_out_of_range_latitude() {
        let err = draft("Office", "91", "139", "")
            .parse(DEFAULT_PLACE_RADIUS_METERS)
            .expect_err("latitude 91 must fail");
        assert_eq!(err, PlaceValidationError::LatitudeOutOfRange(91.0));
    }
}
