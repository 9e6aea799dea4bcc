use clap::{Args, Parser, Subcommand};
use parcel_core::{PackageStatus, Station};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "parceltrack", about = "Package tracking record store", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub globals: GlobalArgs,
}

/// Store and logging flags shared by every subcommand.
#[derive(Args)]
pub struct GlobalArgs {
    /// JSON config file (`dbPath`, `preserveCorrupt`, `logLevel`, `logDir`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store file; overrides config and PARCEL_DB_PATH.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Reset corrupt stores without keeping a side copy.
    #[arg(long, global = true)]
    pub discard_corrupt: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// List packages, optionally for one owner
    List {
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show a package by id
    Show { id: String },
    /// Show a package by tracking number
    Track { tracking_number: String },
    /// Create a package at the default station
    Create(CreateArgs),
    /// Record a status transition
    Status {
        /// Package id, or tracking number with --by-tracking
        key: String,
        #[arg(value_parser = parse_status)]
        status: PackageStatus,
        #[arg(long)]
        by_tracking: bool,
    },
    /// Move a package to a station
    Station {
        id: String,
        #[arg(value_parser = parse_station)]
        station: Station,
    },
    /// Print the station coordinate table
    Stations,
    /// Check core linkage
    Ping,
}

#[derive(Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub sender: String,
    #[arg(long)]
    pub receiver: String,
    #[arg(long)]
    pub destination: String,
    #[arg(long)]
    pub owner: Option<String>,
    /// Defaults to `PKG-<unix-millis>`
    #[arg(long)]
    pub tracking: Option<String>,
}

fn parse_status(value: &str) -> Result<PackageStatus, String> {
    value.parse().map_err(|err: parcel_core::ParseStatusError| err.to_string())
}

fn parse_station(value: &str) -> Result<Station, String> {
    value.parse().map_err(|err: parcel_core::ParseStationError| err.to_string())
}
