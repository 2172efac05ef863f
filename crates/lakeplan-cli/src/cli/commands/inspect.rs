//! `lakeplan stats|validate|report` - Read-only views of a lake.

use anyhow::{Context, Result};
use chrono::Utc;
use lakeplan_core::{
    render_report, validate_layout, CatalogStore, LayoutReport, ObjectStoreLake, StorageStats,
};
use std::path::Path;

use crate::cli::args::{ReportArgs, StoreArgs};
use crate::cli::helpers::{load_config, open_catalogued_lake, open_lake, print_json};
use crate::exit_codes;

async fn storage_stats(lake: &ObjectStoreLake) -> Result<StorageStats> {
    let entries = lake
        .catalog()
        .list()
        .await
        .context("failed to read catalog")?;
    Ok(StorageStats::from_entries(&entries))
}

async fn layout(lake: &ObjectStoreLake) -> Result<LayoutReport> {
    let keys = lake.list_keys().await.context("failed to list lake")?;
    Ok(validate_layout(
        keys.iter().map(|(k, _)| k.as_str()),
        lake.planner().config(),
    ))
}

pub async fn cmd_stats(args: StoreArgs, config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let lake = open_catalogued_lake(&args.store, config).await?;
    print_json(&storage_stats(&lake).await?)?;
    Ok(exit_codes::SUCCESS)
}

pub async fn cmd_validate(args: StoreArgs, config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let lake = open_lake(&args.store, config)?;
    let report = layout(&lake).await?;
    print_json(&report)?;

    if report.valid {
        Ok(exit_codes::SUCCESS)
    } else {
        eprintln!("layout invalid: {} issue(s)", report.issues.len());
        Ok(exit_codes::VALIDATION_FAILED)
    }
}

pub async fn cmd_report(args: ReportArgs, config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let lake = open_catalogued_lake(&args.store.store, config).await?;
    let stats = storage_stats(&lake).await?;
    let layout = layout(&lake).await?;
    let text = render_report(&stats, &layout, Utc::now());

    match &args.out {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            eprintln!("report written to {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(exit_codes::SUCCESS)
}
