//! Moving flat legacy files into the partitioned layout.
//!
//! Lakes that predate the key grammar hold files such as
//! `raw/events_20250101_120000.parquet` directly under a zone. Migration
//! rules map those keys, by glob, onto a dataset (`zone`, `source`, `type`);
//! the dataset time comes from a `YYYYMMDD_HHMMSS` token in the file name.
//!
//! ```yaml
//! migrations:
//!   - pattern: "raw/events_*"
//!     zone: raw
//!     source: csv_ingestion
//!     type: events
//! ```

use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LakeConfig;
use crate::descriptor::{validate_identifier, DataFormat, DatasetDescriptor};
use crate::error::{ConfigError, ConfigResult, PlanError, PlanResult};
use crate::naming;
use crate::report::alias_zone_allowed;
use crate::sidecar::{schema_fingerprint, MetadataSidecar};
use crate::store::{ObjectStoreLake, StoreError, StoreResult};
use crate::zone::Zone;

/// Maps legacy keys matching `pattern` onto a dataset.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct MigrationRule {
    /// Glob over lake-relative keys. `*` does not cross `/`.
    pub pattern: String,
    pub zone: Zone,
    pub source: String,
    #[serde(rename = "type")]
    pub data_type: String,
    /// Defaults to the type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
}

impl MigrationRule {
    pub fn new(
        pattern: impl Into<String>,
        zone: Zone,
        source: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            zone,
            source: source.into(),
            data_type: data_type.into(),
            base_name: None,
        }
    }

    fn matcher(&self) -> ConfigResult<GlobMatcher> {
        GlobBuilder::new(&self.pattern)
            .literal_separator(true)
            .build()
            .map(|g| g.compile_matcher())
            .map_err(|e| ConfigError::Invalid {
                message: format!("invalid migration pattern '{}': {}", self.pattern, e),
            })
    }

    /// Reject bad globs and identifiers the planner would refuse.
    pub fn validate(&self) -> ConfigResult<()> {
        self.matcher()?;
        let base_name = self.base_name.as_deref().unwrap_or(&self.data_type);
        validate_identifier("source", &self.source)
            .and_then(|()| validate_identifier("type", &self.data_type))
            .and_then(|()| validate_identifier("base_name", base_name))
            .map_err(|e| ConfigError::Invalid {
                message: format!("migration rule '{}': {}", self.pattern, e),
            })
    }

    /// Descriptor for a legacy key; `fallback` is used when the file name
    /// carries no timestamp.
    pub fn descriptor_for(
        &self,
        key: &str,
        fallback: DateTime<Utc>,
    ) -> PlanResult<DatasetDescriptor> {
        let file = key.rsplit('/').next().unwrap_or(key);
        let format: DataFormat = file
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default()
            .parse()?;
        let timestamp = naming::timestamp_in_file_name(file).unwrap_or(fallback);
        Ok(DatasetDescriptor::new(
            self.zone,
            &self.source,
            &self.data_type,
            self.base_name.as_deref().unwrap_or(&self.data_type),
            timestamp,
            format,
        ))
    }
}

/// Rules for the flat layout lakes used before partitioning.
pub fn default_rules() -> Vec<MigrationRule> {
    vec![
        MigrationRule::new("raw/events_*", Zone::Raw, "csv_ingestion", "events"),
        MigrationRule::new(
            "raw/item_properties_*",
            Zone::Raw,
            "csv_ingestion",
            "item_properties",
        ),
        MigrationRule::new("raw/products_*", Zone::Raw, "api_ingestion", "products"),
        MigrationRule::new("raw/categories_*", Zone::Raw, "api_ingestion", "categories"),
        MigrationRule::new("archive/*.csv", Zone::Archive, "csv_ingestion", "csv_backups"),
        MigrationRule::new(
            "api_responses/*.json",
            Zone::Archive,
            "api_ingestion",
            "api_responses",
        ),
    ]
}

/// Summary of [`ObjectStoreLake::migrate_legacy`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    /// `(legacy_key, data_file_path)` of completed moves.
    pub migrated: Vec<(String, String)>,
    /// Moves listed but not executed (dry run).
    pub planned: Vec<(String, String)>,
    /// Keys outside the layout that no rule matches.
    pub unmatched: Vec<String>,
    /// `(legacy_key, error)`; the legacy key is left in place.
    pub failed: Vec<(String, String)>,
}

/// Keys that already belong to the layout: data files, sidecars and
/// aliases of alias-keeping zones.
fn in_layout(key: &str, config: &LakeConfig) -> bool {
    naming::is_sidecar_path(key)
        || (naming::is_latest_alias_path(key) && alias_zone_allowed(key, config))
        || naming::parse_object_path(key).is_ok()
}

impl ObjectStoreLake {
    /// Move legacy keys into the layout using the config's migration rules.
    ///
    /// Each matched key is written through [`ObjectStoreLake::write_object`]
    /// with the legacy key recorded as lineage, then deleted. Files are
    /// written oldest first so latest aliases end on the newest one. `now`
    /// is the dataset time for files whose name has no timestamp token.
    pub async fn migrate_legacy(
        &self,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> StoreResult<MigrationReport> {
        let config = self.planner().config();
        let rules: Vec<(&MigrationRule, GlobMatcher)> = config
            .migrations
            .iter()
            .filter_map(|rule| match rule.matcher() {
                Ok(m) => Some((rule, m)),
                Err(e) => {
                    warn!(error = %e, "ignoring migration rule");
                    None
                }
            })
            .collect();

        let mut report = MigrationReport::default();
        let mut candidates = Vec::new();
        for (key, _) in self.list_keys().await? {
            if in_layout(&key, config) {
                continue;
            }
            let Some((rule, _)) = rules.iter().find(|(_, m)| m.is_match(&key)) else {
                debug!(key = %key, "no migration rule matches");
                report.unmatched.push(key);
                continue;
            };
            match rule.descriptor_for(&key, now) {
                Ok(d) => candidates.push((key, d)),
                Err(e) => report.failed.push((key, e.to_string())),
            }
        }
        candidates.sort_by(|(ka, a), (kb, b)| a.timestamp.cmp(&b.timestamp).then(ka.cmp(kb)));

        for (key, descriptor) in candidates {
            if dry_run {
                match self.planner().plan_object_path(&descriptor, now) {
                    Ok(paths) => report.planned.push((key, paths.data_file_path)),
                    Err(e) => report.failed.push((key, e.to_string())),
                }
                continue;
            }
            match self.migrate_one(&key, &descriptor, now).await {
                Ok(target) => report.migrated.push((key, target)),
                Err(e) => {
                    warn!(key = %key, error = %e, "legacy file not migrated");
                    report.failed.push((key, e.to_string()));
                }
            }
        }

        info!(
            migrated = report.migrated.len(),
            unmatched = report.unmatched.len(),
            failed = report.failed.len(),
            dry_run,
            "legacy migration finished"
        );
        Ok(report)
    }

    async fn migrate_one(
        &self,
        key: &str,
        descriptor: &DatasetDescriptor,
        now: DateTime<Utc>,
    ) -> StoreResult<String> {
        let data = self.get(key).await?;
        let sidecar = MetadataSidecar::new(0, 0, schema_fingerprint::<&str, &str>(&[]))
            .with_source_path(key);

        let target = match self
            .write_object(descriptor, data.clone(), sidecar, now)
            .await
        {
            Ok(receipt) => receipt.paths.data_file_path,
            // A previous run copied the file but stopped before deleting it.
            Err(StoreError::Plan(PlanError::PathCollision { path })) => {
                if self.get(&path).await? != data {
                    return Err(PlanError::PathCollision { path }.into());
                }
                path
            }
            Err(e) => return Err(e),
        };

        self.delete_if_exists(key).await?;
        info!(from = %key, to = %target, "legacy file migrated");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 26, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_default_rules_are_valid() {
        for rule in default_rules() {
            rule.validate().unwrap();
        }
    }

    #[test]
    fn test_star_stays_within_one_segment() {
        let rule = MigrationRule::new("raw/events_*", Zone::Raw, "csv_ingestion", "events");
        let m = rule.matcher().unwrap();
        assert!(m.is_match("raw/events_20250101_120000.parquet"));
        assert!(!m.is_match("raw/events_x/nested.parquet"));
        assert!(!m.is_match("processed/events_1.parquet"));
    }

    #[test]
    fn test_descriptor_from_file_name_token() {
        let rule = MigrationRule::new("raw/events_*", Zone::Raw, "csv_ingestion", "events");
        let d = rule
            .descriptor_for("raw/events_20250101_120000.PARQUET", now())
            .unwrap();
        assert_eq!(d.timestamp, Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap());
        assert_eq!(d.format, DataFormat::Parquet);
        assert_eq!(d.base_name, "events");

        let d = rule.descriptor_for("raw/events_old.csv", now()).unwrap();
        assert_eq!(d.timestamp, now());

        assert!(matches!(
            rule.descriptor_for("raw/events_old.xlsx", now()),
            Err(PlanError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let mut rule = MigrationRule::new("raw/[events", Zone::Raw, "csv_ingestion", "events");
        assert!(rule.validate().is_err());
        rule.pattern = "raw/events_*".into();
        rule.source = "CSV".into();
        assert!(rule.validate().is_err());
    }
}
