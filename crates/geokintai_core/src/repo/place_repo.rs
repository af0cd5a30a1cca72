//! Place registry.
//!
//! # Invariants
//! - Places are keyed by id; `save` replaces an existing place in position.
//! - Only validated places are stored.

use crate::model::place::{Place, PlaceId};
use crate::repo::{notify, ChangeHook, LedgerKind, RepoError, RepoResult};

/// In-memory place registry.
#[derive(Default)]
pub struct PlaceRepository {
    places: Vec<Place>,
    on_change: Option<ChangeHook>,
}

impl PlaceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores places from persisted state.
    ///
    /// # Errors
    /// - `InvalidPlace` when a stored place fails validation.
    pub fn from_records(places: Vec<Place>) -> RepoResult<Self> {
        for place in &places {
            place.validate()?;
        }
        Ok(Self {
            places,
            on_change: None,
        })
    }

    pub fn set_change_hook(&mut self, hook: ChangeHook) {
        self.on_change = Some(hook);
    }

    /// Inserts or replaces a place by id.
    pub fn save(&mut self, place: Place) -> RepoResult<()> {
        place.validate()?;
        match self.places.iter_mut().find(|existing| existing.id == place.id) {
            Some(existing) => *existing = place,
            None => self.places.push(place),
        }
        notify(&self.on_change, LedgerKind::Places);
        Ok(())
    }

    pub fn fetch_by_id(&self, id: PlaceId) -> Option<&Place> {
        self.places.iter().find(|place| place.id == id)
    }

    pub fn fetch_all(&self) -> &[Place] {
        &self.places
    }

    /// Removes a place.
    ///
    /// # Errors
    /// - `PlaceNotFound` when no place has `id`.
    pub fn delete(&mut self, id: PlaceId) -> RepoResult<Place> {
        let index = self
            .places
            .iter()
            .position(|place| place.id == id)
            .ok_or(RepoError::PlaceNotFound(id))?;
        let removed = self.places.remove(index);
        notify(&self.on_change, LedgerKind::Places);
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::PlaceRepository;
    use crate::model::place::Place;
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn save_replaces_by_id() {
        let mut repo = PlaceRepository::new();
        let mut place = Place::new("Office", 35.0, 139.0, 100.0);
        repo.save(place.clone()).expect("save new place");

        place.radius_meters = 250.0;
        repo.save(place.clone()).expect("save edited place");

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.fetch_by_id(place.id).unwrap().radius_meters, 250.0);
    }

    #[test]
    fn save_rejects_invalid_place() {
        let mut repo = PlaceRepository::new();
        let place = Place::new("  ", 35.0, 139.0, 100.0);
        assert!(matches!(
            repo.save(place),
            Err(RepoError::InvalidPlace(_))
        ));
        assert!(repo.is_empty());
    }

    #[test]
    fn delete_unknown_place_is_not_found() {
        let mut repo = PlaceRepository::new();
        let id = Uuid::new_v4();
        assert_eq!(repo.delete(id), Err(RepoError::PlaceNotFound(id)));
    }
}
