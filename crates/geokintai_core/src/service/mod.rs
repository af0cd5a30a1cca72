//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate ledger calls into attendance use cases.
//! - Keep policy tables (permission, failure) free of platform details.

pub mod attendance_flow;
pub mod correction_service;
pub mod event_log;
pub mod export_service;
pub mod failure;
pub mod integrity;
pub mod permission;
