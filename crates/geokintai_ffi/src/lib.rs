//! Flutter-facing bindings for the GeoKintai core.

pub mod api;
