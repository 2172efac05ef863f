//! Catalog abstraction and object-storage backed lake.
//!
//! The catalog is the only shared mutable state. It is injected as a
//! [`CatalogStore`] rather than held globally, so planner and evaluator stay
//! testable against [`InMemoryCatalog`].
//!
//! # Write protocol
//!
//! 1. plan paths (pure)
//! 2. `insert_if_absent` into the catalog, the per-path critical section
//! 3. conditional create of the data file, then the sidecar
//! 4. overwrite the latest alias (single-object put, atomic for readers),
//!    retried; a final failure leaves the write committed and the alias stale

pub mod error;
pub mod memory;
pub mod object_store_backend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::descriptor::DatasetDescriptor;
use crate::naming;
use crate::sidecar::MetadataSidecar;
use crate::zone::Zone;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryCatalog;
pub use object_store_backend::{
    ApplyOptions, ApplyOutcome, ApplyReport, ObjectStoreLake, RebuildReport, RetryPolicy,
    WriteReceipt,
};

/// Parsed store specification from CLI/config.
///
/// # Examples
///
/// ```text
/// s3://my-bucket/lake
/// file:///srv/lake
/// memory://  (for testing)
/// ```
#[derive(Debug, Clone)]
pub struct StoreSpec {
    /// The scheme (s3, file, memory)
    pub scheme: String,
    /// Bucket name (empty for file://)
    pub bucket: Option<String>,
    /// Base prefix/path within the bucket
    pub prefix: String,
    /// Optional region (for S3)
    pub region: Option<String>,
}

impl StoreSpec {
    /// Parse a store URL like `s3://bucket/prefix` or `file:///path`.
    pub fn parse(url: &str) -> StoreResult<Self> {
        let url = url::Url::parse(url).map_err(|e| StoreError::InvalidSpec {
            spec: url.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = url.scheme().to_string();
        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .map(|s| s.to_string());
        let prefix = url.path().trim_matches('/').to_string();

        let region = url
            .query_pairs()
            .find(|(k, _)| k == "region")
            .map(|(_, v)| v.to_string());

        Ok(Self {
            scheme,
            bucket,
            prefix,
            region,
        })
    }

    pub fn is_memory(&self) -> bool {
        self.scheme == "memory"
    }

    pub fn is_file(&self) -> bool {
        self.scheme == "file"
    }
}

/// One live object in the lake: descriptor, sidecar and physical size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Catalog key.
    pub data_file_path: String,
    pub descriptor: DatasetDescriptor,
    pub sidecar: MetadataSidecar,
    /// Bytes of the data file on storage.
    pub size: u64,
}

impl CatalogEntry {
    pub fn new(
        data_file_path: impl Into<String>,
        descriptor: DatasetDescriptor,
        sidecar: MetadataSidecar,
        size: u64,
    ) -> Self {
        Self {
            data_file_path: data_file_path.into(),
            descriptor,
            sidecar,
            size,
        }
    }

    pub fn metadata_file_path(&self) -> String {
        naming::metadata_path(&self.data_file_path)
    }

    pub fn zone(&self) -> Zone {
        self.descriptor.zone
    }
}

/// The catalog capability.
///
/// # Concurrency
///
/// `insert_if_absent` must be exactly-once per `data_file_path`: of two
/// concurrent inserts for the same path, one gets `AlreadyExists`.
/// `update_zone` and `remove` are idempotent so a lifecycle action can be
/// retried after a partial failure.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert a new entry, failing with `AlreadyExists` if the path is taken.
    async fn insert_if_absent(&self, entry: CatalogEntry) -> StoreResult<()>;

    /// Look up an entry by data-file path.
    async fn get(&self, data_file_path: &str) -> StoreResult<Option<CatalogEntry>>;

    /// Snapshot of all live entries, ordered by path.
    async fn list(&self) -> StoreResult<Vec<CatalogEntry>>;

    /// Move an entry into `zone`, re-keyed under `relocated_path`.
    ///
    /// A no-op returning the current entry if it is already in `zone`, either
    /// still under `data_file_path` or already under `relocated_path`.
    /// `NotFound` if neither key is present. `AlreadyExists` if another
    /// object of a different size is catalogued under `relocated_path`; the
    /// source entry is then left in place.
    async fn update_zone(
        &self,
        data_file_path: &str,
        zone: Zone,
        relocated_path: &str,
    ) -> StoreResult<CatalogEntry>;

    /// Remove an entry. Removing an absent entry returns `None`.
    async fn remove(&self, data_file_path: &str) -> StoreResult<Option<CatalogEntry>>;
}
