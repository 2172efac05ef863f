//! Lake configuration.
//!
//! Loaded from YAML. Every field has a default and a missing file yields the
//! default policy. A full example:
//!
//! ```yaml
//! retention:
//!   max_age_days: { raw: 90, processed: 365, features: 180, metadata: 730 }
//!   on_expiry:
//!     raw: transition:archive
//!     processed: delete
//!     features: delete
//!     metadata: delete
//! partitioning:
//!   metadata: date
//! latest_alias_zones: [raw]
//! migrations:
//!   - pattern: "raw/events_*"
//!     zone: raw
//!     source: csv_ingestion
//!     type: events
//! ```
//!
//! `migrations` replaces the built-in legacy rules when present.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::migration::{default_rules, MigrationRule};
use crate::naming::PartitionScheme;
use crate::retention::{ExpiryAction, RetentionPolicy};
use crate::zone::Zone;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "LAKEPLAN_CONFIG";

/// Top-level configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LakeConfig {
    pub retention: RetentionConfig,

    /// Per-zone partition grammar. Zones not listed use `timestamp`.
    pub partitioning: BTreeMap<Zone, PartitionScheme>,

    /// Zones that maintain a `{zone}/{base}_latest.{ext}` alias.
    pub latest_alias_zones: Vec<Zone>,

    /// Rules mapping flat legacy keys onto datasets, first match wins.
    pub migrations: Vec<MigrationRule>,
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            retention: RetentionConfig::default(),
            partitioning: BTreeMap::new(),
            latest_alias_zones: vec![Zone::Raw],
            migrations: default_rules(),
        }
    }
}

/// Retention section.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    /// Maximum age per zone. Zones absent here never expire.
    pub max_age_days: BTreeMap<Zone, u32>,

    /// What happens once an entry is past its zone's max age.
    /// Zones with a max age but no entry here default to `delete`; entries
    /// for zones without a max age are inert.
    pub on_expiry: BTreeMap<Zone, ExpiryAction>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: BTreeMap::from([
                (Zone::Raw, 90),
                (Zone::Processed, 365),
                (Zone::Features, 180),
                (Zone::Metadata, 730),
            ]),
            on_expiry: BTreeMap::from([
                (Zone::Raw, ExpiryAction::Transition(Zone::Archive)),
                (Zone::Processed, ExpiryAction::Delete),
                (Zone::Features, ExpiryAction::Delete),
                (Zone::Metadata, ExpiryAction::Delete),
            ]),
        }
    }
}

impl LakeConfig {
    /// Load from a YAML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %shown, "config file not found, using default lake policy");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: shown,
                    source,
                })
            }
        };

        let config = Self::from_yaml(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: shown.clone(),
                source,
            },
            other => other,
        })?;
        info!(path = %shown, "loaded lake config");
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent retention and migration rules.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        for (zone, days) in &self.retention.max_age_days {
            if *days == 0 {
                return invalid(format!("max_age_days for {} must be positive", zone));
            }
        }

        for (zone, action) in &self.retention.on_expiry {
            if let ExpiryAction::Transition(to) = action {
                if to == zone {
                    return invalid(format!("{} cannot transition into itself", zone));
                }
                if zone.is_terminal() {
                    return invalid(format!("{} is terminal and cannot transition", zone));
                }
            }
        }

        for rule in &self.migrations {
            rule.validate()?;
        }

        Ok(())
    }

    /// Partition grammar for a zone.
    pub fn scheme_for(&self, zone: Zone) -> PartitionScheme {
        self.partitioning.get(&zone).copied().unwrap_or_default()
    }

    /// Whether a zone keeps a latest alias.
    pub fn keeps_latest_alias(&self, zone: Zone) -> bool {
        self.latest_alias_zones.contains(&zone)
    }

    /// Build the retention policy described by this config.
    pub fn retention_policy(&self) -> RetentionPolicy {
        let mut policy = RetentionPolicy::empty();
        for (zone, days) in &self.retention.max_age_days {
            let action = self
                .retention
                .on_expiry
                .get(zone)
                .copied()
                .unwrap_or(ExpiryAction::Delete);
            policy = policy.with_rule(*zone, Duration::days(i64::from(*days)), action);
        }
        policy
    }
}
