//! Package record domain model.
//!
//! # Responsibility
//! - Define the persisted package record and its status history.
//! - Provide the only mutation helpers allowed to touch status/station state.
//!
//! # Invariants
//! - `id` is assigned once at creation and never reassigned.
//! - `history` is append-only; its first entry is the creation status.
//! - `coordinates` always equals the table value for `station`.
//! - `updated_at >= created_at`, and every mutation strictly increases
//!   `updated_at`.

use crate::model::station::{Coordinates, Station};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Opaque package identifier.
///
/// Kept as a string alias because legacy stores carry ids minted by other
/// schemes; new ids use [`generate_package_id`].
pub type PackageId = String;

/// Package lifecycle status, in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
}

impl PackageStatus {
    /// Status assigned to every newly created package.
    pub const INITIAL: PackageStatus = PackageStatus::Pending;

    pub const ALL: [PackageStatus; 6] = [
        PackageStatus::Pending,
        PackageStatus::Confirmed,
        PackageStatus::Processing,
        PackageStatus::Shipped,
        PackageStatus::OutForDelivery,
        PackageStatus::Delivered,
    ];

    /// Canonical identifier, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            PackageStatus::Pending => "PENDING",
            PackageStatus::Confirmed => "CONFIRMED",
            PackageStatus::Processing => "PROCESSING",
            PackageStatus::Shipped => "SHIPPED",
            PackageStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            PackageStatus::Delivered => "DELIVERED",
        }
    }
}

impl Display for PackageStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when text does not name a known status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(pub String);

impl Display for ParseStatusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown package status `{}`", self.0)
    }
}

impl Error for ParseStatusError {}

impl FromStr for PackageStatus {
    type Err = ParseStatusError;

    /// Parses case-insensitively; `-` and spaces are read as `_`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        PackageStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ParseStatusError(value.to_string()))
    }
}

/// One timestamped status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: PackageStatus,
    pub date: DateTime<Utc>,
}

/// Caller-supplied fields for a new package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPackage {
    /// Business key. Uniqueness is not enforced.
    pub tracking_number: String,
    pub sender: String,
    pub receiver: String,
    pub destination: String,
    /// External owner identity; not validated.
    pub owner_id: Option<String>,
}

/// Persisted package state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub id: PackageId,
    pub tracking_number: String,
    pub sender: String,
    pub receiver: String,
    pub destination: String,
    pub status: PackageStatus,
    /// Absent only on legacy records never touched by a status update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<Station>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl PackageRecord {
    /// Builds a freshly created record.
    ///
    /// # Invariants
    /// - `status` is [`PackageStatus::INITIAL`] with a single-entry history.
    /// - `created_at == updated_at == now`.
    /// - Placed at [`Station::DEFAULT`] with its table coordinates.
    pub fn create(id: PackageId, request: NewPackage, now: DateTime<Utc>) -> Self {
        let station = Station::DEFAULT;
        Self {
            id,
            tracking_number: request.tracking_number,
            sender: request.sender,
            receiver: request.receiver,
            destination: request.destination,
            status: PackageStatus::INITIAL,
            history: Some(vec![HistoryEntry {
                status: PackageStatus::INITIAL,
                date: now,
            }]),
            created_at: now,
            updated_at: now,
            owner_id: request.owner_id,
            station: Some(station),
            coordinates: Some(station.coordinates()),
        }
    }

    /// Appends one history entry and moves the record to `status`.
    ///
    /// Creates a single-entry history when none existed yet.
    pub fn record_status(&mut self, status: PackageStatus, now: DateTime<Utc>) {
        let at = next_stamp(self.updated_at, now);
        self.history
            .get_or_insert_with(Vec::new)
            .push(HistoryEntry { status, date: at });
        self.status = status;
        self.updated_at = at;
    }

    /// Moves the record to `station`, re-deriving its coordinates.
    pub fn move_to(&mut self, station: Station, now: DateTime<Utc>) {
        self.station = Some(station);
        self.coordinates = Some(station.coordinates());
        self.updated_at = next_stamp(self.updated_at, now);
    }

    /// Returns whether `coordinates` matches the table value for `station`.
    pub fn is_consistent(&self) -> bool {
        self.coordinates == self.station.map(Station::coordinates)
    }

    /// Number of recorded status transitions, creation included.
    pub fn history_len(&self) -> usize {
        self.history.as_ref().map_or(0, Vec::len)
    }
}

/// Returns a mutation timestamp strictly after `previous`.
///
/// Clock ties and small backwards skews are resolved by stepping one
/// microsecond past `previous`.
pub fn next_stamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Mints a new package id: `pkg_<unix-millis>_<random>`.
pub fn generate_package_id(now: DateTime<Utc>) -> PackageId {
    format!("pkg_{}_{}", now.timestamp_millis(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::{
        generate_package_id, next_stamp, NewPackage, PackageRecord, PackageStatus,
    };
    use crate::model::station::Station;
    use chrono::{Duration, Utc};

    fn request() -> NewPackage {
        NewPackage {
            tracking_number: "TRK-1".to_string(),
            sender: "A".to_string(),
            receiver: "B".to_string(),
            destination: "C".to_string(),
            owner_id: Some("owner1".to_string()),
        }
    }

    #[test]
    fn create_sets_initial_state_together() {
        let now = Utc::now();
        let record = PackageRecord::create("pkg_1".to_string(), request(), now);

        assert_eq!(record.status, PackageStatus::INITIAL);
        assert_eq!(record.history_len(), 1);
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.station, Some(Station::DEFAULT));
        assert!(record.is_consistent());
    }

    #[test]
    fn record_status_on_legacy_record_creates_history() {
        let now = Utc::now();
        let mut record = PackageRecord::create("pkg_1".to_string(), request(), now);
        record.history = None;

        record.record_status(PackageStatus::Shipped, now);
        let history = record.history.as_ref().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, PackageStatus::Shipped);
        assert!(record.updated_at > record.created_at);
    }

    #[test]
    fn next_stamp_is_strictly_increasing_on_clock_ties() {
        let now = Utc::now();
        assert_eq!(next_stamp(now, now), now + Duration::microseconds(1));
        assert_eq!(next_stamp(now, now - Duration::seconds(3)), now + Duration::microseconds(1));
        let later = now + Duration::seconds(1);
        assert_eq!(next_stamp(now, later), later);
    }

    #[test]
    fn status_parse_accepts_legacy_spelling() {
        assert_eq!("Pending".parse::<PackageStatus>().unwrap(), PackageStatus::Pending);
        assert_eq!(
            "out for delivery".parse::<PackageStatus>().unwrap(),
            PackageStatus::OutForDelivery
        );
        assert!("LOST".parse::<PackageStatus>().is_err());
    }

    #[test]
    fn generated_ids_are_distinct() {
        let now = Utc::now();
        assert_ne!(generate_package_id(now), generate_package_id(now));
        assert!(generate_package_id(now).starts_with("pkg_"));
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let mut record = PackageRecord::create("pkg_1".to_string(), request(), Utc::now());
        record.owner_id = None;
        record.history = None;
        let encoded = serde_json::to_value(&record).unwrap();
        assert!(encoded.get("ownerId").is_none());
        assert!(encoded.get("history").is_none());
        assert_eq!(encoded["trackingNumber"], "TRK-1");
        assert_eq!(encoded["station"], "ELENGA");
    }
}
