use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lakeplan_core::{
    parse_timestamp, DataFormat, DatasetDescriptor, LakeConfig, LakePathPlanner, ObjectStoreLake,
    PlanResult,
};
use serde::Serialize;
use std::path::Path;
use tracing::warn;

use super::args::DatasetArgs;

pub fn load_config(path: &Path) -> Result<LakeConfig> {
    LakeConfig::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

/// Connect to the store without touching the catalog.
pub fn open_lake(store: &str, config: LakeConfig) -> Result<ObjectStoreLake> {
    ObjectStoreLake::from_url(store, LakePathPlanner::new(config))
        .with_context(|| format!("failed to open store {}", store))
}

/// Connect and populate the catalog from what is already in storage.
pub async fn open_catalogued_lake(store: &str, config: LakeConfig) -> Result<ObjectStoreLake> {
    let lake = open_lake(store, config)?;
    let report = lake
        .rebuild_catalog()
        .await
        .context("failed to scan lake")?;
    if !report.skipped.is_empty() {
        warn!(
            skipped = report.skipped.len(),
            "some keys could not be catalogued; run `lakeplan validate` for details"
        );
    }
    Ok(lake)
}

/// RFC 3339 instant, or the current time when absent.
pub fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>> {
    match now {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .with_context(|| format!("invalid --now: {}", s)),
        None => Ok(Utc::now()),
    }
}

/// Dataset timestamp: RFC 3339 or the lake's `YYYYMMDD_HHMMSS`, UTC.
pub fn parse_dataset_time(
    ts: Option<&str>,
    default: DateTime<Utc>,
) -> PlanResult<DateTime<Utc>> {
    let Some(s) = ts else {
        return Ok(default);
    };
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    parse_timestamp(s)
}

/// `default_time` applies when `--timestamp` is absent.
pub fn descriptor_from_args(
    args: &DatasetArgs,
    format: DataFormat,
    default_time: DateTime<Utc>,
) -> PlanResult<DatasetDescriptor> {
    let timestamp = parse_dataset_time(args.timestamp.as_deref(), default_time)?;
    let base_name = args.base_name.as_deref().unwrap_or(&args.data_type);
    Ok(DatasetDescriptor::new(
        args.zone,
        &args.source,
        &args.data_type,
        base_name,
        timestamp,
        format,
    ))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
