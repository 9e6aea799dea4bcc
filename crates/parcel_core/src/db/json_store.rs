//! JSON file backing medium.
//!
//! # Responsibility
//! - Load and save the full record collection as one pretty-printed array.
//! - Self-heal missing, blank and unparseable files to an empty collection.
//! - Quarantine individual undecodable records, keeping the rest.
//! - Run load-time migrations and persist the normalized result.
//!
//! # Invariants
//! - Every save writes a uniquely named temp file in the target directory and
//!   renames it over the primary path, so readers see either the old or the
//!   new content and concurrent saves never share a temp file.
//! - Discarded content is optionally preserved under a `.corrupt-*` side name.

use super::migrations::apply_migrations;
use super::{RecordStore, StoreError, StoreResult};
use crate::model::package::PackageRecord;
use chrono::Utc;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::NamedTempFile;

const EMPTY_COLLECTION: &str = "[]";

/// Single-writer JSON file store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    preserve_corrupt: bool,
}

impl JsonFileStore {
    /// Creates a store over `path`; corrupt content is preserved on reset.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            preserve_corrupt: true,
        }
    }

    /// Enables or disables copying corrupt content aside before reset.
    pub fn preserve_corrupt(mut self, enabled: bool) -> Self {
        self.preserve_corrupt = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn write_atomic(&self, contents: &str) -> StoreResult<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(|err| self.io_error(parent, err))?;
                parent
            }
            None => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir).map_err(|err| self.io_error(dir, err))?;
        temp.write_all(contents.as_bytes())
            .map_err(|err| self.io_error(dir, err))?;
        temp.persist(&self.path)
            .map_err(|err| self.io_error(&self.path, err.error))?;
        Ok(())
    }

    fn reset(&self) -> StoreResult<Vec<PackageRecord>> {
        self.write_atomic(EMPTY_COLLECTION)?;
        Ok(Vec::new())
    }

    /// Copies discarded bytes aside when preservation is enabled.
    fn preserve(&self, raw: &[u8]) -> Option<PathBuf> {
        if !self.preserve_corrupt {
            return None;
        }
        let side_path = self.corrupt_side_path();
        match fs::write(&side_path, raw) {
            Ok(()) => Some(side_path),
            Err(err) => {
                error!(
                    "event=store_recover module=db status=error path={} error_code=preserve_failed error={}",
                    side_path.display(),
                    err
                );
                None
            }
        }
    }

    fn recover_corrupt(&self, raw: &[u8], reason: &str) -> StoreResult<Vec<PackageRecord>> {
        let preserved = self.preserve(raw);
        warn!(
            "event=store_recover module=db status=reset path={} reason={} bytes={} preserved_at={}",
            self.path.display(),
            reason,
            raw.len(),
            display_or_none(preserved.as_deref())
        );
        self.reset()
    }

    /// Moves undecodable records aside as a JSON array of their raw values.
    fn quarantine(&self, rejected: &[Value]) -> StoreResult<()> {
        let raw = serde_json::to_vec_pretty(rejected)?;
        let preserved = self.preserve(&raw);
        warn!(
            "event=store_recover module=db status=quarantined path={} reason=invalid_record rejected={} preserved_at={}",
            self.path.display(),
            rejected.len(),
            display_or_none(preserved.as_deref())
        );
        Ok(())
    }

    fn corrupt_side_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.fZ")));
        PathBuf::from(name)
    }

    fn read_raw(&self) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(&self.path, err)),
        }
    }
}

fn display_or_none(path: Option<&Path>) -> String {
    path.map_or_else(|| "none".to_string(), |p| p.display().to_string())
}

impl RecordStore for JsonFileStore {
    /// Loads the full collection.
    ///
    /// # Side effects
    /// - Creates the file as `[]` when missing; resets blank, unparseable or
    ///   non-array content.
    /// - Persists the collection when a migration changed a record or an
    ///   undecodable record was quarantined.
    fn load(&self) -> StoreResult<Vec<PackageRecord>> {
        let Some(raw) = self.read_raw()? else {
            info!(
                "event=store_init module=db status=ok path={}",
                self.path.display()
            );
            return self.reset();
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            info!(
                "event=store_init module=db status=ok reason=blank path={}",
                self.path.display()
            );
            return self.reset();
        }

        let mut values = match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Array(values)) => values,
            Ok(_) => return self.recover_corrupt(&raw, "not_an_array"),
            Err(_) => return self.recover_corrupt(&raw, "invalid_json"),
        };

        let report = apply_migrations(&mut values, Utc::now());

        let mut records = Vec::with_capacity(values.len());
        let mut rejected = Vec::new();
        for value in values {
            match PackageRecord::deserialize(&value) {
                Ok(record) => records.push(record),
                Err(_) => rejected.push(value),
            }
        }

        if !rejected.is_empty() {
            self.quarantine(&rejected)?;
        }

        if report.is_changed() || !rejected.is_empty() {
            info!(
                "event=store_migrate module=db status=ok path={} changed_records={} rejected={} steps={}",
                self.path.display(),
                report.changed_records,
                rejected.len(),
                report.applied.join(",")
            );
            self.save(&records)?;
        }

        Ok(records)
    }

    /// Replaces the whole collection via a unique temp file and rename.
    fn save(&self, records: &[PackageRecord]) -> StoreResult<()> {
        let started_at = Instant::now();
        let encoded = serde_json::to_string_pretty(records)?;

        match self.write_atomic(&encoded) {
            Ok(()) => {
                info!(
                    "event=store_save module=db status=ok records={} duration_ms={}",
                    records.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=store_save module=db status=error records={} duration_ms={} error_code=write_failed error={}",
                    records.len(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}
