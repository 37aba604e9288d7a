//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `orgdir_core` linkage and that a configured database opens.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `orgdir_cli [config.toml]`

use orgdir_core::db::open_db_with_config;
use orgdir_core::{DirectoryConfig, DirectoryQueryService, SqliteOrganizationStore};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("orgdir_core ping={}", orgdir_core::ping());
    println!("orgdir_core version={}", orgdir_core::core_version());

    match run(std::env::args().nth(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("orgdir_cli error={message}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: Option<String>) -> Result<(), String> {
    let config = match config_path {
        Some(path) => DirectoryConfig::from_file(path).map_err(|err| err.to_string())?,
        None => DirectoryConfig::default(),
    };
    orgdir_core::init_logging_from_config(&config.logging).map_err(|err| err.to_string())?;

    let conn = open_db_with_config(&config.database).map_err(|err| err.to_string())?;
    let store = SqliteOrganizationStore::try_new(&conn).map_err(|err| err.to_string())?;
    let service = DirectoryQueryService::with_config(store, &config.query);

    // Zero-radius smoke query at the origin exercises projection, scan and hydration.
    let found = service
        .in_circle(0.0, 0.0, 0.0)
        .map_err(|err| err.to_string())?;
    println!("orgdir_core smoke_in_circle_count={}", found.len());
    Ok(())
}
