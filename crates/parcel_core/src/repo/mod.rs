//! Repository layer over the whole-collection store.
//!
//! # Responsibility
//! - Define the package operations callers may invoke.
//! - Enforce record invariants; no other layer constructs or mutates records.
//!
//! # Invariants
//! - Not-found is `Ok(None)`, never an error.
//! - Repository errors only carry store failures.

pub mod package_repo;
