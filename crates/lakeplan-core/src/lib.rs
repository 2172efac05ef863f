//! Layout planning for a zoned data lake.
//!
//! This crate decides where a dataset lives and when it moves:
//!
//! - canonical partition directories, file names, sidecar names and
//!   `latest` aliases for a [`DatasetDescriptor`]
//! - parsing those paths back into descriptors
//! - age-based lifecycle actions (archive or delete) over a catalog snapshot
//! - an `object_store` backed lake that writes objects and applies actions
//! - migration of flat legacy files into the partitioned layout
//!
//! # Quick Start
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use lakeplan_core::{DataFormat, DatasetDescriptor, LakePathPlanner, Zone};
//!
//! let ts = Utc.with_ymd_and_hms(2026, 1, 26, 14, 9, 37).unwrap();
//! let descriptor = DatasetDescriptor::new(
//!     Zone::Raw,
//!     "csv_ingestion",
//!     "events",
//!     "events",
//!     ts,
//!     DataFormat::Parquet,
//! );
//!
//! let paths = LakePathPlanner::default()
//!     .plan_object_path(&descriptor, ts)
//!     .unwrap();
//! assert_eq!(
//!     paths.data_file_path,
//!     "raw/source=csv_ingestion/type=events/timestamp=20260126_140937/events_csv_ingestion_20260126_140937.parquet"
//! );
//! assert_eq!(paths.latest_alias_path.as_deref(), Some("raw/events_latest.parquet"));
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `LAKEPLAN_CONFIG` | Path to the YAML lake config (default: `lakeplan.yaml`) |
//! | `LAKEPLAN_STORE_URL` | Store URL (`s3://bucket/prefix`, `file:///path`, `memory://`) |

pub mod config;
pub mod descriptor;
pub mod error;
pub mod migration;
pub mod naming;
pub mod planner;
pub mod report;
pub mod retention;
pub mod sidecar;
pub mod store;
pub mod zone;

// Re-export main types
pub use config::{LakeConfig, RetentionConfig, CONFIG_ENV};
pub use descriptor::{validate_identifier, DataFormat, DatasetDescriptor};
pub use error::{ConfigError, ConfigResult, PlanError, PlanResult};
pub use naming::{
    format_timestamp, parse_object_path, parse_timestamp, timestamp_in_file_name, PartitionScheme,
};
pub use migration::{MigrationReport, MigrationRule};
pub use planner::{LakePathPlanner, ObjectPaths};
pub use report::{render_report, validate_layout, LayoutReport, StorageStats, ZoneStats};
pub use retention::{
    ExpiryAction, LifecycleAction, LifecycleActions, RetentionEvaluator, RetentionPolicy,
    RetentionRule,
};
pub use sidecar::{schema_fingerprint, Lineage, MetadataSidecar};
pub use store::{
    ApplyOptions, ApplyOutcome, ApplyReport, CatalogEntry, CatalogStore, InMemoryCatalog,
    ObjectStoreLake, RebuildReport, RetryPolicy, StoreError, StoreResult, StoreSpec,
    WriteReceipt,
};
pub use zone::Zone;

// Re-export bytes for CLI convenience
pub use bytes::Bytes;
