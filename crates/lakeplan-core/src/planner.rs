//! Path planning: where a dataset lands in the lake.
//!
//! The planner is pure. It performs no I/O and holds no mutable state, so a
//! single instance can be shared by any number of callers. Writers call
//! [`LakePathPlanner::plan_object_path`] first, write the data file and its
//! sidecar, then repoint the latest alias.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LakeConfig;
use crate::descriptor::DatasetDescriptor;
use crate::error::{PlanError, PlanResult};
use crate::naming;
use crate::zone::Zone;

/// Every key derived from one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPaths {
    pub partition_dir: String,
    pub data_file_path: String,
    pub metadata_file_path: String,
    /// Only for zones that keep a latest alias (`raw` by default).
    pub latest_alias_path: Option<String>,
}

/// Computes canonical lake paths for dataset descriptors.
#[derive(Debug, Clone, Default)]
pub struct LakePathPlanner {
    config: LakeConfig,
}

impl LakePathPlanner {
    pub fn new(config: LakeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LakeConfig {
        &self.config
    }

    /// Plan the paths for a new object.
    ///
    /// Fails with `InvalidIdentifier` if `source`, `type` or `base_name`
    /// break the `[a-z0-9_]+` rule, and with `InvalidTimestamp` if the
    /// descriptor's timestamp is after `now` or outside years 0000..=9999.
    pub fn plan_object_path(
        &self,
        descriptor: &DatasetDescriptor,
        now: DateTime<Utc>,
    ) -> PlanResult<ObjectPaths> {
        if let Err(e) = descriptor.validate_identifiers() {
            debug!(error = %e, "rejected descriptor");
            return Err(e);
        }
        check_year(descriptor)?;
        if descriptor.timestamp > now {
            debug!(timestamp = %descriptor.timestamp, now = %now, "rejected future timestamp");
            return Err(PlanError::future_timestamp(descriptor.timestamp, now));
        }
        Ok(self.paths_for(descriptor))
    }

    /// Plan against a catalog snapshot; `exists` reports taken data-file paths.
    ///
    /// On `PathCollision` the caller either waits one second for a fresh
    /// timestamp or picks a different base name.
    pub fn plan_unique<F>(
        &self,
        descriptor: &DatasetDescriptor,
        now: DateTime<Utc>,
        exists: F,
    ) -> PlanResult<ObjectPaths>
    where
        F: Fn(&str) -> bool,
    {
        let paths = self.plan_object_path(descriptor, now)?;
        if exists(&paths.data_file_path) {
            warn!(path = %paths.data_file_path, "planned path already in catalog");
            return Err(PlanError::PathCollision {
                path: paths.data_file_path,
            });
        }
        Ok(paths)
    }

    /// Paths the same dataset occupies once moved into `zone`.
    ///
    /// Used by lifecycle transitions, where the timestamp is in the past by
    /// construction.
    pub fn plan_relocation(
        &self,
        descriptor: &DatasetDescriptor,
        zone: Zone,
    ) -> PlanResult<ObjectPaths> {
        let moved = descriptor.with_zone(zone);
        moved.validate_identifiers()?;
        check_year(&moved)?;
        Ok(self.paths_for(&moved))
    }

    fn paths_for(&self, descriptor: &DatasetDescriptor) -> ObjectPaths {
        let partition_dir =
            naming::partition_dir(descriptor, self.config.scheme_for(descriptor.zone));
        let data_file_path = format!("{}/{}", partition_dir, naming::data_file_name(descriptor));
        let metadata_file_path = naming::metadata_path(&data_file_path);
        let latest_alias_path = self
            .config
            .keeps_latest_alias(descriptor.zone)
            .then(|| {
                naming::latest_alias_path(descriptor.zone, &descriptor.base_name, descriptor.format)
            });

        ObjectPaths {
            partition_dir,
            data_file_path,
            metadata_file_path,
            latest_alias_path,
        }
    }
}

/// `timestamp=` segments are exactly 15 characters; `%Y` widens past 9999.
fn check_year(descriptor: &DatasetDescriptor) -> PlanResult<()> {
    let year = descriptor.timestamp.year();
    if (0..=9999).contains(&year) {
        return Ok(());
    }
    debug!(timestamp = %descriptor.timestamp, "rejected out-of-range year");
    Err(PlanError::InvalidTimestamp {
        value: descriptor.timestamp.to_rfc3339(),
        reason: format!("year {} is outside 0000..=9999", year),
    })
}
