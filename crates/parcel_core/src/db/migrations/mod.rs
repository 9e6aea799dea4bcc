//! Load-time record migration registry and executor.
//!
//! # Responsibility
//! - Register record normalization steps in strictly increasing order.
//! - Bring raw persisted records up to the current shape before decoding.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Every step is idempotent, so an already-normalized collection is a
//!   fixed point and re-saving it produces identical bytes.

use crate::model::package::{generate_package_id, PackageStatus};
use crate::model::station::Station;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    apply: fn(&mut Map<String, Value>, &mut MigrationContext) -> bool,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "backfill_ids",
        apply: backfill_id,
    },
    Migration {
        version: 2,
        name: "canonical_status",
        apply: canonical_status,
    },
    Migration {
        version: 3,
        name: "derive_coordinates",
        apply: derive_coordinates,
    },
];

/// Collection-wide state shared by steps while one load is migrated.
struct MigrationContext {
    now: DateTime<Utc>,
    known_ids: HashSet<String>,
    seen_ids: HashSet<String>,
}

/// Outcome of migrating one raw collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Names of steps that changed at least one record, in registry order.
    pub applied: Vec<&'static str>,
    /// Number of records changed by any step.
    pub changed_records: usize,
}

impl MigrationReport {
    pub fn is_changed(&self) -> bool {
        self.changed_records > 0
    }
}

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies every registered step to each raw record, in order.
///
/// Non-object entries are left untouched; decoding rejects them later.
pub fn apply_migrations(records: &mut [Value], now: DateTime<Utc>) -> MigrationReport {
    let mut ctx = MigrationContext {
        now,
        known_ids: records
            .iter()
            .filter_map(|record| record.get("id").and_then(Value::as_str))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect(),
        seen_ids: HashSet::new(),
    };

    let mut report = MigrationReport::default();
    for record in records.iter_mut() {
        let Some(fields) = record.as_object_mut() else {
            continue;
        };

        let mut record_changed = false;
        for migration in MIGRATIONS {
            if (migration.apply)(fields, &mut ctx) {
                record_changed = true;
                if !report.applied.contains(&migration.name) {
                    report.applied.push(migration.name);
                }
            }
        }
        if record_changed {
            report.changed_records += 1;
        }
    }

    report
        .applied
        .sort_by_key(|name| MIGRATIONS.iter().position(|m| m.name == *name));
    report
}

/// Assigns a fresh id to records with a missing, empty or duplicate id.
fn backfill_id(fields: &mut Map<String, Value>, ctx: &mut MigrationContext) -> bool {
    let current = fields
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    if let Some(id) = current {
        if ctx.seen_ids.insert(id) {
            return false;
        }
    }

    let fresh = loop {
        let candidate = generate_package_id(ctx.now);
        if !ctx.known_ids.contains(&candidate) {
            break candidate;
        }
    };
    ctx.known_ids.insert(fresh.clone());
    ctx.seen_ids.insert(fresh.clone());
    fields.insert("id".to_string(), Value::String(fresh));
    true
}

/// Rewrites loose status spellings (e.g. `"Pending"`) to the canonical form.
fn canonical_status(fields: &mut Map<String, Value>, _ctx: &mut MigrationContext) -> bool {
    let mut changed = canonicalize_status_value(fields.get_mut("status"));

    if let Some(Value::Array(history)) = fields.get_mut("history") {
        for entry in history.iter_mut() {
            changed |= canonicalize_status_value(entry.get_mut("status"));
        }
    }

    changed
}

fn canonicalize_status_value(value: Option<&mut Value>) -> bool {
    let Some(Value::String(text)) = value else {
        return false;
    };
    match text.parse::<PackageStatus>() {
        Ok(status) if status.as_str() != text.as_str() => {
            *text = status.as_str().to_string();
            true
        }
        _ => false,
    }
}

/// Re-derives `coordinates` from `station`; drops coordinates with no station.
fn derive_coordinates(fields: &mut Map<String, Value>, _ctx: &mut MigrationContext) -> bool {
    let station = match fields.get("station") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => match text.parse::<Station>() {
            Ok(station) => Some(station),
            Err(_) => return false,
        },
        Some(_) => return false,
    };

    let Some(station) = station else {
        let had_station_key = fields.remove("station").is_some();
        return fields.remove("coordinates").is_some() || had_station_key;
    };

    let mut changed = false;
    let canonical_name = Value::String(station.as_str().to_string());
    if fields.get("station") != Some(&canonical_name) {
        fields.insert("station".to_string(), canonical_name);
        changed = true;
    }

    let expected = coordinates_value(station);
    if fields.get("coordinates") != Some(&expected) {
        fields.insert("coordinates".to_string(), expected);
        changed = true;
    }
    changed
}

fn coordinates_value(station: Station) -> Value {
    let coordinates = station.coordinates();
    let mut map = Map::new();
    map.insert("lat".to_string(), Value::from(coordinates.lat));
    map.insert("lng".to_string(), Value::from(coordinates.lng));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version};
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn latest_version_matches_registry_tail() {
        assert_eq!(latest_version(), 3);
    }

    #[test]
    fn missing_and_duplicate_ids_are_backfilled() {
        let mut records = vec![
            json!({"id": "pkg_a", "status": "PENDING"}),
            json!({"status": "PENDING"}),
            json!({"id": "pkg_a", "status": "PENDING"}),
            json!({"id": "", "status": "PENDING"}),
        ];

        let report = apply_migrations(&mut records, Utc::now());
        assert_eq!(report.changed_records, 3);
        assert_eq!(report.applied, vec!["backfill_ids"]);
        assert_eq!(records[0]["id"], "pkg_a");

        let ids: std::collections::HashSet<_> =
            records.iter().map(|r| r["id"].as_str().unwrap().to_string()).collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn legacy_status_is_canonicalized_in_record_and_history() {
        let mut records = vec![json!({
            "id": "pkg_a",
            "status": "Pending",
            "history": [{"status": "pending", "date": "2024-01-01T00:00:00Z"}]
        })];

        let report = apply_migrations(&mut records, Utc::now());
        assert!(report.is_changed());
        assert_eq!(records[0]["status"], "PENDING");
        assert_eq!(records[0]["history"][0]["status"], "PENDING");
    }

    #[test]
    fn coordinates_follow_station() {
        let mut records = vec![
            json!({"id": "a", "status": "PENDING", "station": "bogura", "coordinates": {"lat": 0.0, "lng": 0.0}}),
            json!({"id": "b", "status": "PENDING", "coordinates": {"lat": 1.0, "lng": 1.0}}),
        ];

        apply_migrations(&mut records, Utc::now());
        assert_eq!(records[0]["station"], "BOGURA");
        assert_eq!(records[0]["coordinates"], json!({"lat": 24.8465, "lng": 89.3776}));
        assert!(records[1].get("coordinates").is_none());
    }

    #[test]
    fn normalized_collection_is_a_fixed_point() {
        let mut records = vec![json!({"status": "Shipped", "station": "SHERPUR"})];
        assert!(apply_migrations(&mut records, Utc::now()).is_changed());

        let snapshot = records.clone();
        let report = apply_migrations(&mut records, Utc::now());
        assert!(!report.is_changed());
        assert_eq!(records, snapshot);
    }
}
