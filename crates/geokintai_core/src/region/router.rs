//! External region identifier resolution.
//!
//! Explicit bindings win; otherwise an identifier that parses as a UUID is
//! taken as the place id itself.

use crate::model::place::PlaceId;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct RegionRouter {
    bindings: HashMap<String, PlaceId>,
}

impl RegionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bindings(bindings: HashMap<String, PlaceId>) -> Self {
        Self { bindings }
    }

    pub fn bind(&mut self, identifier: impl Into<String>, place_id: PlaceId) {
        self.bindings.insert(identifier.into(), place_id);
    }

    pub fn unbind_place(&mut self, place_id: PlaceId) {
        self.bindings.retain(|_, bound| *bound != place_id);
    }

    /// Canonical identifier registered with the platform for a place.
    pub fn identifier_for(place_id: PlaceId) -> String {
        place_id.hyphenated().to_string()
    }

    pub fn resolve(&self, identifier: &str) -> Option<PlaceId> {
        if let Some(place_id) = self.bindings.get(identifier) {
            return Some(*place_id);
        }
        Uuid::parse_str(identifier.trim()).ok()
    }
}
