//! Domain model for places, attendance and audit records.
//!
//! # Responsibility
//! - Define canonical data structures shared by verifiers, ledgers and export.
//!
//! # Invariants
//! - Every record is identified by a stable v4 UUID.
//! - All instants are absolute UTC values; display conversion happens at the
//!   edge (`timefmt::display`).

pub mod attendance;
pub mod correction;
pub mod evidence;
pub mod place;
pub mod region;
