//! Fixed waypoint table.
//!
//! # Responsibility
//! - Enumerate the closed set of named waypoints on the delivery route.
//! - Map every waypoint to its geographic coordinates.
//!
//! # Invariants
//! - The table is read-only; coordinates are never set independently.
//! - Unknown waypoint names are rejected at parse time.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Geographic coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Named waypoint on the delivery route, in route order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Station {
    Elenga,
    Sirajgonj,
    Sherpur,
    Bogura,
    Polashbari,
    RangpurHub,
}

impl Station {
    /// Waypoint assigned to every newly created package.
    pub const DEFAULT: Station = Station::Elenga;

    /// Every waypoint in route order.
    pub const ALL: [Station; 6] = [
        Station::Elenga,
        Station::Sirajgonj,
        Station::Sherpur,
        Station::Bogura,
        Station::Polashbari,
        Station::RangpurHub,
    ];

    /// Looks up this waypoint's coordinates in the fixed table.
    pub fn coordinates(self) -> Coordinates {
        let (lat, lng) = match self {
            Station::Elenga => (24.3167, 89.9167),
            Station::Sirajgonj => (24.4539, 89.7),
            Station::Sherpur => (25.0206, 90.0174),
            Station::Bogura => (24.8465, 89.3776),
            Station::Polashbari => (25.3282, 89.3915),
            Station::RangpurHub => (25.7439, 89.2752),
        };
        Coordinates { lat, lng }
    }

    /// Canonical identifier, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            Station::Elenga => "ELENGA",
            Station::Sirajgonj => "SIRAJGONJ",
            Station::Sherpur => "SHERPUR",
            Station::Bogura => "BOGURA",
            Station::Polashbari => "POLASHBARI",
            Station::RangpurHub => "RANGPUR_HUB",
        }
    }
}

impl Display for Station {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when text does not name a known waypoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStationError(pub String);

impl Display for ParseStationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown station `{}`", self.0)
    }
}

impl Error for ParseStationError {}

impl FromStr for Station {
    type Err = ParseStationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Station::ALL
            .into_iter()
            .find(|station| station.as_str() == normalized)
            .ok_or_else(|| ParseStationError(value.to_string()))
    }
}
