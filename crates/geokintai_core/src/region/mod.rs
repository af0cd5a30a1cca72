//! Region monitoring: collaborator contract, reconciliation and routing.

pub mod monitor;
pub mod router;
pub mod sync;

pub use monitor::{InMemoryRegionMonitor, MonitorCommand, RegionMonitor};
pub use router::RegionRouter;
pub use sync::{RegionMonitoringSyncService, RegionSyncResult};
