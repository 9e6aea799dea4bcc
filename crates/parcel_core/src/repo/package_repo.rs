//! Package repository contract and store-backed implementation.
//!
//! # Responsibility
//! - Provide list/find/create/update APIs over the full record collection.
//! - Publish post-mutation snapshots through the change notifier.
//!
//! # Invariants
//! - Every store access runs inside one section: mutations span
//!   load -> mutate -> save, and reads span their load, because a load may
//!   itself rewrite the file while normalizing it.
//! - Notifications are sent inside the write section, preserving per-id
//!   mutation order.
//! - Lookups that miss perform no persistence.

use crate::db::{RecordStore, StoreError};
use crate::model::package::{
    generate_package_id, NewPackage, PackageId, PackageRecord, PackageStatus,
};
use crate::model::station::Station;
use crate::notify::ChangeNotifier;
use chrono::Utc;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for package persistence operations.
#[derive(Debug)]
pub enum RepoError {
    Store(StoreError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Repository interface for package operations.
pub trait PackageRepository {
    fn list(&self) -> RepoResult<Vec<PackageRecord>>;
    fn list_by_owner(&self, owner_id: &str) -> RepoResult<Vec<PackageRecord>>;
    fn find_by_tracking(&self, tracking_number: &str) -> RepoResult<Option<PackageRecord>>;
    fn find_by_id(&self, id: &str) -> RepoResult<Option<PackageRecord>>;
    fn create(&self, request: NewPackage) -> RepoResult<PackageRecord>;
    fn update_station(&self, id: &str, station: Station) -> RepoResult<Option<PackageRecord>>;
    fn update_status_by_id(
        &self,
        id: &str,
        status: PackageStatus,
    ) -> RepoResult<Option<PackageRecord>>;
    fn update_status_by_tracking(
        &self,
        tracking_number: &str,
        status: PackageStatus,
    ) -> RepoResult<Option<PackageRecord>>;
}

/// Which field locates the record a mutation targets.
#[derive(Debug, Clone, Copy)]
enum Key<'a> {
    Id(&'a str),
    Tracking(&'a str),
}

impl Key<'_> {
    fn matches(&self, record: &PackageRecord) -> bool {
        match self {
            Key::Id(id) => record.id == *id,
            Key::Tracking(tracking) => record.tracking_number == *tracking,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Key::Id(_) => "id",
            Key::Tracking(_) => "tracking",
        }
    }
}

/// Repository over any whole-collection [`RecordStore`].
pub struct StoredPackageRepository<S: RecordStore> {
    store: S,
    notifier: ChangeNotifier,
    store_section: Mutex<()>,
}

impl<S: RecordStore> StoredPackageRepository<S> {
    pub fn new(store: S, notifier: ChangeNotifier) -> Self {
        Self {
            store,
            notifier,
            store_section: Mutex::new(()),
        }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Loads a snapshot under the store section.
    fn snapshot(&self) -> RepoResult<Vec<PackageRecord>> {
        let _guard = self.lock_store();
        Ok(self.store.load()?)
    }

    fn lock_store(&self) -> MutexGuard<'_, ()> {
        self.store_section.lock().unwrap_or_else(|poisoned| {
            warn!("event=repo_lock module=repo status=recovered reason=poisoned");
            poisoned.into_inner()
        })
    }

    /// Runs `mutate` on the first record matching `key` and persists it.
    ///
    /// Returns `Ok(None)` without saving when nothing matches.
    fn mutate_one(
        &self,
        event: &'static str,
        key: Key<'_>,
        publish: bool,
        mutate: impl FnOnce(&mut PackageRecord),
    ) -> RepoResult<Option<PackageRecord>> {
        let started_at = Instant::now();
        let _guard = self.lock_store();

        let mut records = self.store.load()?;
        let Some(record) = records.iter_mut().find(|record| key.matches(record)) else {
            info!(
                "event={event} module=repo status=not_found key={} duration_ms={}",
                key.kind(),
                started_at.elapsed().as_millis()
            );
            return Ok(None);
        };

        mutate(record);
        let updated = record.clone();

        if let Err(err) = self.store.save(&records) {
            error!(
                "event={event} module=repo status=error key={} duration_ms={} error_code=save_failed error={}",
                key.kind(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }

        let delivered = if publish {
            self.notifier.publish(&updated.id, &updated)
        } else {
            0
        };
        info!(
            "event={event} module=repo status=ok key={} history_len={} delivered={} duration_ms={}",
            key.kind(),
            updated.history_len(),
            delivered,
            started_at.elapsed().as_millis()
        );
        Ok(Some(updated))
    }

    fn update_status(
        &self,
        key: Key<'_>,
        status: PackageStatus,
        publish: bool,
    ) -> RepoResult<Option<PackageRecord>> {
        self.mutate_one("package_update_status", key, publish, |record| {
            record.record_status(status, Utc::now());
        })
    }
}

impl<S: RecordStore> PackageRepository for StoredPackageRepository<S> {
    fn list(&self) -> RepoResult<Vec<PackageRecord>> {
        self.snapshot()
    }

    fn list_by_owner(&self, owner_id: &str) -> RepoResult<Vec<PackageRecord>> {
        let mut records = self.snapshot()?;
        records.retain(|record| record.owner_id.as_deref() == Some(owner_id));
        Ok(records)
    }

    fn find_by_tracking(&self, tracking_number: &str) -> RepoResult<Option<PackageRecord>> {
        let records = self.snapshot()?;
        Ok(records
            .into_iter()
            .find(|record| Key::Tracking(tracking_number).matches(record)))
    }

    fn find_by_id(&self, id: &str) -> RepoResult<Option<PackageRecord>> {
        let records = self.snapshot()?;
        Ok(records.into_iter().find(|record| Key::Id(id).matches(record)))
    }

    /// Creates a package at the default station with a single-entry history.
    fn create(&self, request: NewPackage) -> RepoResult<PackageRecord> {
        let started_at = Instant::now();
        let _guard = self.lock_store();

        let mut records = self.store.load()?;
        let now = Utc::now();
        let id: PackageId = loop {
            let candidate = generate_package_id(now);
            if !records.iter().any(|record| record.id == candidate) {
                break candidate;
            }
        };

        let record = PackageRecord::create(id, request, now);
        records.push(record.clone());

        match self.store.save(&records) {
            Ok(()) => {
                info!(
                    "event=package_create module=repo status=ok records={} duration_ms={}",
                    records.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(record)
            }
            Err(err) => {
                error!(
                    "event=package_create module=repo status=error duration_ms={} error_code=save_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    fn update_station(&self, id: &str, station: Station) -> RepoResult<Option<PackageRecord>> {
        self.mutate_one("package_update_station", Key::Id(id), true, |record| {
            record.move_to(station, Utc::now());
        })
    }

    fn update_status_by_id(
        &self,
        id: &str,
        status: PackageStatus,
    ) -> RepoResult<Option<PackageRecord>> {
        self.update_status(Key::Id(id), status, true)
    }

    /// Appends a status transition; tracking-keyed updates are not published.
    fn update_status_by_tracking(
        &self,
        tracking_number: &str,
        status: PackageStatus,
    ) -> RepoResult<Option<PackageRecord>> {
        self.update_status(Key::Tracking(tracking_number), status, false)
    }
}
