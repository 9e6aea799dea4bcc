//! Core record store for package tracking.
//! This crate is the single source of truth for package invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;

pub use config::{ConfigError, CoreConfig};
pub use db::{JsonFileStore, RecordStore, StoreError, StoreResult};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LoggingError};
pub use model::package::{
    HistoryEntry, NewPackage, PackageId, PackageRecord, PackageStatus, ParseStatusError,
};
pub use model::station::{Coordinates, ParseStationError, Station};
pub use notify::{ChangeNotifier, Subscription};
pub use repo::package_repo::{
    PackageRepository, RepoError, RepoResult, StoredPackageRepository,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
