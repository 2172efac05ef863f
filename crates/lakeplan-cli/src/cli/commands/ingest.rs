//! `lakeplan ingest` - Upload a local file into the lake.
//!
//! Writes the data file, its metadata sidecar and (for alias zones) the
//! latest alias. CSV and JSON content is profiled for the sidecar; Parquet
//! is opaque here, so its row count comes from `--rows`.
//!
//! Without `--timestamp` the dataset time is taken from a `YYYYMMDD_HHMMSS`
//! token in the file name, falling back to now.

use anyhow::{Context, Result};
use chrono::Utc;
use lakeplan_core::sidecar::{duplicate_percentage, missing_percentage};
use lakeplan_core::{
    schema_fingerprint, timestamp_in_file_name, Bytes, DataFormat, MetadataSidecar,
};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use crate::cli::args::IngestArgs;
use crate::cli::helpers::{descriptor_from_args, load_config, open_lake, print_json};
use crate::exit_codes;

/// What could be learned from the file content.
#[derive(Debug, Default, PartialEq)]
struct ContentProfile {
    rows: Option<u64>,
    columns: Vec<String>,
    missing_percentage: Option<f64>,
    duplicate_percentage: Option<f64>,
}

pub async fn run(args: IngestArgs, config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let now = Utc::now();

    let format = match args.format {
        Some(f) => f,
        None => match format_from_extension(&args.file) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("error: {}", e);
                return Ok(e.exit_code());
            }
        },
    };
    let default_time = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(timestamp_in_file_name)
        .unwrap_or(now);
    let descriptor = match descriptor_from_args(&args.dataset, format, default_time) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {}", e);
            return Ok(e.exit_code());
        }
    };

    let data = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let profile = profile_content(format, &data);

    let rows = match (args.rows, profile.rows) {
        (Some(rows), _) | (None, Some(rows)) => rows,
        (None, None) => {
            warn!(file = %args.file.display(), "row count unknown, recording 0 (use --rows)");
            0
        }
    };

    let columns: Vec<(String, String)> = if args.schema.is_empty() {
        profile
            .columns
            .iter()
            .map(|c| (c.clone(), "string".to_string()))
            .collect()
    } else {
        args.schema
            .iter()
            .map(|c| match c.split_once(':') {
                Some((name, ty)) => (name.trim().to_string(), ty.trim().to_string()),
                None => (c.trim().to_string(), "string".to_string()),
            })
            .collect()
    };

    let mut sidecar = MetadataSidecar::new(rows, 0, schema_fingerprint(&columns));
    if let Some(source_path) = &args.derived_from {
        sidecar = sidecar.with_source_path(source_path);
    }
    if let Some(pct) = profile.missing_percentage {
        sidecar = sidecar.with_metric("missing_percentage", pct);
    }
    if let Some(pct) = profile.duplicate_percentage {
        sidecar = sidecar.with_metric("duplicate_percentage", pct);
    }

    let lake = open_lake(&args.store.store, config)?;
    match lake
        .write_object(&descriptor, Bytes::from(data), sidecar, now)
        .await
    {
        Ok(receipt) => {
            print_json(&receipt)?;
            if let Some(alias) = &receipt.stale_alias {
                eprintln!(
                    "warning: {} was not repointed and still serves the previous object",
                    alias
                );
            }
            Ok(exit_codes::SUCCESS)
        }
        Err(e) if e.exit_code() == exit_codes::VALIDATION_FAILED => {
            eprintln!("error: {}", e);
            Ok(exit_codes::VALIDATION_FAILED)
        }
        Err(e) => Err(e).context("failed to write object"),
    }
}

fn format_from_extension(path: &Path) -> lakeplan_core::PlanResult<DataFormat> {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
        .parse()
}

fn profile_content(format: DataFormat, data: &[u8]) -> ContentProfile {
    match format {
        DataFormat::Csv => profile_csv(&String::from_utf8_lossy(data)),
        DataFormat::Json => profile_json(data),
        DataFormat::Parquet => ContentProfile::default(),
    }
}

/// Header row, then one record per non-empty line. Quoted commas are not
/// special-cased.
fn profile_csv(text: &str) -> ContentProfile {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return ContentProfile {
            rows: Some(0),
            ..Default::default()
        };
    };
    let columns: Vec<String> = header.split(',').map(|c| c.trim().to_string()).collect();
    let records: Vec<&str> = lines.collect();

    let missing = records
        .iter()
        .map(|r| {
            let fields: Vec<&str> = r.split(',').collect();
            let empty = fields.iter().filter(|f| f.trim().is_empty()).count();
            let absent = columns.len().saturating_sub(fields.len());
            (empty + absent) as u64
        })
        .sum::<u64>();
    let unique: HashSet<&str> = records.iter().copied().collect();
    let rows = records.len() as u64;

    ContentProfile {
        rows: Some(rows),
        missing_percentage: Some(missing_percentage(missing, rows, columns.len() as u64)),
        duplicate_percentage: Some(duplicate_percentage(rows - unique.len() as u64, rows)),
        columns,
    }
}

/// A JSON array, a single object, or JSON lines.
fn profile_json(data: &[u8]) -> ContentProfile {
    let rows = match serde_json::from_slice::<serde_json::Value>(data) {
        Ok(serde_json::Value::Array(items)) => items.len() as u64,
        Ok(_) => 1,
        Err(_) => String::from_utf8_lossy(data)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .count() as u64,
    };
    ContentProfile {
        rows: Some(rows),
        ..Default::default()
    }
}
