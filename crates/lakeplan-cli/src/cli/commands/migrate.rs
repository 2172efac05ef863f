//! `lakeplan migrate` - Move flat legacy files into the partitioned layout.

use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::args::MigrateArgs;
use crate::cli::helpers::{load_config, open_catalogued_lake, parse_now, print_json};
use crate::exit_codes;

pub async fn run(args: MigrateArgs, config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let now = parse_now(args.now.as_deref())?;
    let lake = open_catalogued_lake(&args.store.store, config).await?;

    let report = lake
        .migrate_legacy(now, args.dry_run)
        .await
        .context("failed to migrate lake")?;
    print_json(&report)?;

    if !report.unmatched.is_empty() {
        eprintln!(
            "{} file(s) match no migration rule; add rules under `migrations` in the config",
            report.unmatched.len()
        );
    }
    if report.failed.is_empty() {
        Ok(exit_codes::SUCCESS)
    } else {
        eprintln!("{} file(s) could not be migrated", report.failed.len());
        Ok(exit_codes::VALIDATION_FAILED)
    }
}
