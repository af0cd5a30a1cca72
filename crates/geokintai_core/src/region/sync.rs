//! Region monitoring reconciliation.
//!
//! # Responsibility
//! - Diff "places that should be monitored" against active regions.
//! - Apply the minimal set of stop/start commands.
//!
//! # Invariants
//! - Regions compare by full value, so an edited place restarts its
//!   geofence instead of keeping stale bounds.
//! - With `allow_monitoring == false` the target set is empty.
//! - Each id is stopped at most once per `sync` call.

use crate::model::place::{Place, PlaceId};
use crate::model::region::MonitoredRegion;
use crate::region::monitor::RegionMonitor;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSyncResult {
    pub monitored_ids: BTreeSet<PlaceId>,
    /// Regions (re)started by this pass; each needs a state re-query.
    pub changed_ids: BTreeSet<PlaceId>,
}

/// Reconciles places with a `RegionMonitor` it owns.
pub struct RegionMonitoringSyncService<M: RegionMonitor> {
    monitor: M,
}

impl<M: RegionMonitor> RegionMonitoringSyncService<M> {
    pub fn new(monitor: M) -> Self {
        Self { monitor }
    }

    pub fn monitor(&self) -> &M {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut M {
        &mut self.monitor
    }

    pub fn into_monitor(self) -> M {
        self.monitor
    }

    /// Applies the diff between `places` and the monitor's active regions.
    pub fn sync(&mut self, places: &[Place], allow_monitoring: bool) -> RegionSyncResult {
        let target: BTreeMap<PlaceId, MonitoredRegion> = if allow_monitoring {
            places
                .iter()
                .filter(|place| place.monitoring_enabled)
                .map(|place| (place.id, MonitoredRegion::from(place)))
                .collect()
        } else {
            BTreeMap::new()
        };
        let current = self.monitor.active_region_map();

        let mut stopped = 0usize;
        for place_id in current.keys() {
            if !target.contains_key(place_id) {
                self.monitor.stop_monitoring(*place_id);
                stopped += 1;
            }
        }

        let mut changed_ids = BTreeSet::new();
        for (place_id, region) in &target {
            match current.get(place_id) {
                Some(active) if active == region => continue,
                Some(_) => self.monitor.stop_monitoring(*place_id),
                None => {}
            }
            self.monitor.start_monitoring(*region);
            changed_ids.insert(*place_id);
        }

        let monitored_ids = self.monitor.active_ids();
        info!(
            "event=region_sync module=region status=ok allow={} monitored={} changed={} stopped={}",
            allow_monitoring,
            monitored_ids.len(),
            changed_ids.len(),
            stopped
        );

        RegionSyncResult {
            monitored_ids,
            changed_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RegionMonitoringSyncService;
    use crate::model::place::Place;
    use crate::region::monitor::{InMemoryRegionMonitor, MonitorCommand};

    #[test]
    fn moved_place_is_restarted_with_new_bounds() {
        let mut place = Place::new("Office", 35.0, 139.0, 100.0);
        let mut service = RegionMonitoringSyncService::new(InMemoryRegionMonitor::new());
        service.sync(std::slice::from_ref(&place), true);
        service.monitor_mut().clear_journal();

        place.radius_meters = 150.0;
        let result = service.sync(std::slice::from_ref(&place), true);

        assert!(result.changed_ids.contains(&place.id));
        assert_eq!(
            service.monitor().journal(),
            &[
                MonitorCommand::Stop(place.id),
                MonitorCommand::Start((&place).into()),
            ]
        );
    }

    #[test]
    fn removed_place_is_stopped_without_restart() {
        let office = Place::new("Office", 35.0, 139.0, 100.0);
        let depot = Place::new("Depot", 35.1, 139.1, 80.0);
        let mut service = RegionMonitoringSyncService::new(InMemoryRegionMonitor::new());
        service.sync(&[office.clone(), depot.clone()], true);

        let result = service.sync(std::slice::from_ref(&office), true);

        assert!(result.changed_ids.is_empty());
        assert_eq!(result.monitored_ids.len(), 1);
        assert!(result.monitored_ids.contains(&office.id));
        assert_eq!(service.monitor().stop_count(depot.id), 1);
        assert_eq!(service.monitor().start_count(office.id), 1);
    }
}
