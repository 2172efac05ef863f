//! Storage statistics and layout validation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::LakeConfig;
use crate::naming;
use crate::store::CatalogEntry;
use crate::zone::Zone;

/// Size and file count of one zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ZoneStats {
    pub size_bytes: u64,
    pub file_count: usize,
}

/// Per-zone totals over catalogued data files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub zones: BTreeMap<Zone, ZoneStats>,
    pub total_size_bytes: u64,
    pub total_files: usize,
}

impl StorageStats {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            let zone = stats.zones.entry(entry.zone()).or_default();
            zone.size_bytes += entry.size;
            zone.file_count += 1;
            stats.total_size_bytes += entry.size;
            stats.total_files += 1;
        }
        stats
    }
}

/// Findings of a layout check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayoutReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Check raw storage keys against the lake grammar.
///
/// Every key must be a grammar-conformant data file, the sidecar of one, or
/// a latest alias in a zone `config` keeps aliases for. Data files must have
/// a sidecar, and sidecars a data file.
pub fn validate_layout<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    config: &LakeConfig,
) -> LayoutReport {
    let keys: BTreeSet<&str> = keys.into_iter().collect();
    let mut report = LayoutReport {
        valid: true,
        ..Default::default()
    };

    for key in &keys {
        if naming::is_latest_alias_path(key) && alias_zone_allowed(key, config) {
            continue;
        }

        if let Some(data) = key.strip_suffix(naming::SIDECAR_SUFFIX) {
            if !keys.contains(data) {
                report.issues.push(format!("orphaned sidecar: {}", key));
                report
                    .recommendations
                    .push(format!("remove {} or restore its data file", key));
            }
            continue;
        }

        match naming::parse_object_path(key) {
            Ok(_) => {
                if !keys.contains(naming::metadata_path(key).as_str()) {
                    report.issues.push(format!("missing sidecar: {}", key));
                    report
                        .recommendations
                        .push(format!("write {}", naming::metadata_path(key)));
                }
            }
            Err(e) => {
                report.issues.push(format!("orphaned file: {} ({})", key, e));
                report.recommendations.push(format!(
                    "move {} into the partitioned layout (lakeplan migrate)",
                    key
                ));
            }
        }
    }

    report.valid = report.issues.is_empty();
    report
}

/// Whether `key`'s zone keeps a latest alias under `config`.
pub(crate) fn alias_zone_allowed(key: &str, config: &LakeConfig) -> bool {
    key.split_once('/')
        .and_then(|(zone, _)| zone.parse::<Zone>().ok())
        .is_some_and(|zone| config.keeps_latest_alias(zone))
}

/// Render stats and layout findings as Markdown.
pub fn render_report(
    stats: &StorageStats,
    layout: &LayoutReport,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    write_report(&mut out, stats, layout, generated_at).ok();
    out
}

fn write_report(
    out: &mut String,
    stats: &StorageStats,
    layout: &LayoutReport,
    generated_at: DateTime<Utc>,
) -> fmt::Result {
    const MB: f64 = 1024.0 * 1024.0;

    writeln!(out, "# Data Lake Storage Report")?;
    writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out)?;
    writeln!(out, "## Storage Statistics")?;
    writeln!(
        out,
        "Total Size: {:.2} MB ({} files)",
        stats.total_size_bytes as f64 / MB,
        stats.total_files
    )?;
    writeln!(out)?;
    for (zone, z) in &stats.zones {
        writeln!(
            out,
            "- **{}**: {:.2} MB ({} files)",
            zone,
            z.size_bytes as f64 / MB,
            z.file_count
        )?;
    }
    writeln!(out)?;
    writeln!(out, "## Layout Validation")?;
    writeln!(
        out,
        "Status: {}",
        if layout.valid { "VALID" } else { "INVALID" }
    )?;
    write_section(out, "Issues", &layout.issues)?;
    write_section(out, "Recommendations", &layout.recommendations)
}

fn write_section(out: &mut String, title: &str, lines: &[String]) -> fmt::Result {
    if lines.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "### {}", title)?;
    for line in lines {
        writeln!(out, "- {}", line)?;
    }
    Ok(())
}
