//! Whole-collection persistence for package records.
//!
//! # Responsibility
//! - Define the load/save contract the repository persists through.
//! - Provide the JSON file store and its load-time migrations.
//!
//! # Invariants
//! - Every save replaces the entire collection atomically.
//! - Malformed persisted content self-heals to an empty collection; it is
//!   never surfaced as an error.
//!
//! # See also
//! - `db::migrations` for the record normalization registry.

use crate::model::package::PackageRecord;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod json_store;

pub use json_store::JsonFileStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Encode(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "store io failed at `{}`: {source}", path.display()),
            Self::Encode(err) => write!(f, "failed to encode package records: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Backing medium for the full record collection.
///
/// Implementations own recovery from missing or corrupt content; `load`
/// only fails on real I/O problems.
pub trait RecordStore {
    fn load(&self) -> StoreResult<Vec<PackageRecord>>;
    fn save(&self, records: &[PackageRecord]) -> StoreResult<()>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn load(&self) -> StoreResult<Vec<PackageRecord>> {
        (**self).load()
    }

    fn save(&self, records: &[PackageRecord]) -> StoreResult<()> {
        (**self).save(records)
    }
}
