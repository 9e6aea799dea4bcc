//! Package tracking domain model.
//!
//! # Responsibility
//! - Define the canonical package record persisted by the store.
//! - Own the closed status and waypoint enumerations.
//!
//! # Invariants
//! - Every record is identified by a stable, never reused `PackageId`.
//! - Coordinates are always derived from the waypoint table.
//! - Records are never deleted.

pub mod package;
pub mod station;
