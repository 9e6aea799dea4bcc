//! Operator CLI over the package store.
//!
//! # Responsibility
//! - Expose the repository operations to local operators.
//! - Keep output machine-readable (pretty JSON).

mod cli;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Command, GlobalArgs};
use parcel_core::{
    init_logging, ChangeNotifier, CoreConfig, JsonFileStore, NewPackage, PackageRecord,
    PackageRepository, Station, StoredPackageRepository,
};
use serde::Serialize;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the targeted package does not exist.
fn run(cli: Cli) -> Result<bool> {
    let Cli { command, globals } = cli;

    match command {
        Command::Ping => {
            println!("parcel_core ping={}", parcel_core::ping());
            println!("parcel_core version={}", parcel_core::core_version());
            Ok(true)
        }
        Command::Stations => {
            print_stations()?;
            Ok(true)
        }
        Command::List { owner } => {
            let repo = open_repo(&globals, "list")?;
            let records = match owner {
                Some(owner) => repo.list_by_owner(&owner)?,
                None => repo.list()?,
            };
            print_json(&records)?;
            Ok(true)
        }
        Command::Show { id } => print_found(open_repo(&globals, "show")?.find_by_id(&id)?, &id),
        Command::Track { tracking_number } => print_found(
            open_repo(&globals, "track")?.find_by_tracking(&tracking_number)?,
            &tracking_number,
        ),
        Command::Create(args) => {
            reject_empty(&args.sender, "sender")?;
            reject_empty(&args.receiver, "receiver")?;
            reject_empty(&args.destination, "destination")?;
            let tracking_number = args
                .tracking
                .unwrap_or_else(|| format!("PKG-{}", Utc::now().timestamp_millis()));
            let record = open_repo(&globals, "create")?.create(NewPackage {
                tracking_number,
                sender: args.sender,
                receiver: args.receiver,
                destination: args.destination,
                owner_id: args.owner,
            })?;
            print_json(&record)?;
            Ok(true)
        }
        Command::Status { key, status, by_tracking } => {
            let repo = open_repo(&globals, "status")?;
            let updated = if by_tracking {
                repo.update_status_by_tracking(&key, status)?
            } else {
                repo.update_status_by_id(&key, status)?
            };
            print_found(updated, &key)
        }
        Command::Station { id, station } => {
            print_found(open_repo(&globals, "station")?.update_station(&id, station)?, &id)
        }
    }
}

/// Resolves config, starts logging and opens the repository.
fn open_repo(globals: &GlobalArgs, command: &str) -> Result<StoredPackageRepository<JsonFileStore>> {
    let config = resolve_config(globals)?;
    init_logging(config.log_settings()?.echo_stderr(true)).context("failed to start logging")?;
    log::info!("event=cli_start module=cli status=ok command={command}");
    Ok(StoredPackageRepository::new(config.open_store(), ChangeNotifier::new()))
}

fn resolve_config(globals: &GlobalArgs) -> Result<CoreConfig> {
    let base = match &globals.config {
        Some(path) => CoreConfig::from_file(path)?,
        None => CoreConfig::default(),
    };
    let mut config = base.with_env()?;
    if let Some(db) = &globals.db {
        config.db_path = db.clone();
    }
    if let Some(dir) = &globals.log_dir {
        config.log_dir = dir.clone();
    }
    if let Some(level) = &globals.log_level {
        config.log_level = level.clone();
    }
    if globals.discard_corrupt {
        config.preserve_corrupt = false;
    }
    Ok(config)
}

fn print_found(record: Option<PackageRecord>, key: &str) -> Result<bool> {
    match record {
        Some(record) => {
            print_json(&record)?;
            Ok(true)
        }
        None => {
            eprintln!("package not found: {key}");
            Ok(false)
        }
    }
}

fn print_stations() -> Result<()> {
    let table: Vec<_> = Station::ALL
        .into_iter()
        .map(|station| serde_json::json!({ "station": station, "coordinates": station.coordinates() }))
        .collect();
    print_json(&table)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let encoded = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{encoded}");
    Ok(())
}

fn reject_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::run;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn ping_and_stations_do_not_open_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.json");
        let db_arg = db.to_str().unwrap();

        for command in ["ping", "stations"] {
            let cli = Cli::parse_from(["parceltrack", "--db", db_arg, command]);
            assert!(run(cli).unwrap());
        }
        assert!(!db.exists());
    }
}
