//! Region monitor collaborator contract.
//!
//! # Invariants
//! - Starts and stops are visible synchronously to the next
//!   `active_region_map` call.

use crate::model::place::PlaceId;
use crate::model::region::MonitoredRegion;
use std::collections::{BTreeMap, BTreeSet};

/// Platform geofence facility as seen by the core.
pub trait RegionMonitor {
    fn start_monitoring(&mut self, region: MonitoredRegion);
    fn stop_monitoring(&mut self, place_id: PlaceId);
    fn active_region_map(&self) -> BTreeMap<PlaceId, MonitoredRegion>;

    fn active_ids(&self) -> BTreeSet<PlaceId> {
        self.active_region_map().into_keys().collect()
    }
}

/// One call observed by `InMemoryRegionMonitor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorCommand {
    Start(MonitoredRegion),
    Stop(PlaceId),
}

/// In-process monitor that records every command it receives.
#[derive(Debug, Default)]
pub struct InMemoryRegionMonitor {
    active: BTreeMap<PlaceId, MonitoredRegion>,
    journal: Vec<MonitorCommand>,
}

impl InMemoryRegionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> &[MonitorCommand] {
        &self.journal
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// Number of stop commands issued for `place_id`.
    pub fn stop_count(&self, place_id: PlaceId) -> usize {
        self.journal
            .iter()
            .filter(|command| matches!(command, MonitorCommand::Stop(id) if *id == place_id))
            .count()
    }

    /// Number of start commands issued for `place_id`.
    pub fn start_count(&self, place_id: PlaceId) -> usize {
        self.journal
            .iter()
            .filter(
                |command| matches!(command, MonitorCommand::Start(region) if region.place_id == place_id),
            )
            .count()
    }
}

impl RegionMonitor for InMemoryRegionMonitor {
    fn start_monitoring(&mut self, region: MonitoredRegion) {
        self.journal.push(MonitorCommand::Start(region));
        self.active.insert(region.place_id, region);
    }

    fn stop_monitoring(&mut self, place_id: PlaceId) {
        self.journal.push(MonitorCommand::Stop(place_id));
        self.active.remove(&place_id);
    }

    fn active_region_map(&self) -> BTreeMap<PlaceId, MonitoredRegion> {
        self.active.clone()
    }
}
