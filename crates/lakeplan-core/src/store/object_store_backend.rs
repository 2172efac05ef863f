//! Lake backed by `object_store`.
//!
//! Supports S3 (and compatibles), local filesystem and in-memory stores.
//! Data files are written with conditional creates so an existing object is
//! never overwritten; the latest alias is the one key that is overwritten on
//! purpose.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::{ObjectStore, ObjectStoreExt, PutMode, PutOptions, PutPayload};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{CatalogEntry, CatalogStore, InMemoryCatalog, StoreError, StoreResult, StoreSpec};
use crate::descriptor::DatasetDescriptor;
use crate::error::PlanError;
use crate::naming;
use crate::planner::{LakePathPlanner, ObjectPaths};
use crate::retention::{ExpiryAction, LifecycleAction};
use crate::sidecar::MetadataSidecar;
use crate::zone::Zone;

/// Retry settings for lifecycle actions and latest-alias writes.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Full-jitter exponential backoff for the given attempt (1-based).
    fn backoff(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let exp = self
            .base_backoff
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_backoff);
        let jittered_ms = rand::thread_rng().gen_range(0..=exp.as_millis() as u64);
        Duration::from_millis(jittered_ms.max(10))
    }
}

/// Result of a successful [`ObjectStoreLake::write_object`].
#[derive(Debug, Clone, Serialize)]
pub struct WriteReceipt {
    pub paths: ObjectPaths,
    pub size: u64,
    /// Alias that could not be repointed after retries. The data file and
    /// sidecar are committed; the alias still serves the previous bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_alias: Option<String>,
}

/// How a move treats an object already present at the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnConflict {
    /// Keep the target; the move completes only if it holds the same bytes.
    Verify,
    /// Replace the target with the source.
    Replace,
}

/// What [`ObjectStoreLake::apply`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Transitioned { to: Zone, data_file_path: String },
    Deleted,
    /// Nothing left to do; a previous attempt already completed the action.
    AlreadyApplied,
}

/// Options for [`ObjectStoreLake::apply_all`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Report what would happen without touching storage.
    pub dry_run: bool,
    /// Stop after this many actions; the rest are counted as remaining.
    pub max_actions: Option<usize>,
}

/// Summary of one lifecycle run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub transitioned: usize,
    pub deleted: usize,
    pub already_applied: usize,
    /// Actions listed but not executed (dry run).
    pub planned: Vec<String>,
    /// `(data_file_path, error)` for actions that failed after retries.
    pub failed: Vec<(String, String)>,
    /// Actions left unprocessed because the budget ran out.
    pub remaining: usize,
    /// Bytes removed from their zone (transitioned or deleted).
    pub bytes_released: u64,
}

/// Summary of [`ObjectStoreLake::rebuild_catalog`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebuildReport {
    pub inserted: usize,
    pub already_present: usize,
    /// Keys that look like data files but could not be catalogued.
    pub skipped: Vec<String>,
}

/// Lake on top of an `ObjectStore`, with an injected catalog.
pub struct ObjectStoreLake {
    inner: Arc<dyn ObjectStore>,
    prefix: String,
    planner: LakePathPlanner,
    catalog: Arc<dyn CatalogStore>,
    retry: RetryPolicy,
}

impl ObjectStoreLake {
    /// Lake over an arbitrary object store.
    pub fn new(
        inner: Arc<dyn ObjectStore>,
        prefix: &str,
        planner: LakePathPlanner,
        catalog: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            inner,
            prefix: prefix.trim_matches('/').to_string(),
            planner,
            catalog,
            retry: RetryPolicy::default(),
        }
    }

    /// Create a lake from a parsed spec, with an empty in-memory catalog.
    pub fn from_spec(spec: &StoreSpec, planner: LakePathPlanner) -> StoreResult<Self> {
        let (inner, prefix): (Arc<dyn ObjectStore>, String) = match spec.scheme.as_str() {
            "memory" => (
                Arc::new(object_store::memory::InMemory::new()),
                spec.prefix.clone(),
            ),
            "file" => {
                let path = match &spec.bucket {
                    Some(host) => format!("/{}/{}", host, spec.prefix),
                    None => format!("/{}", spec.prefix),
                };
                std::fs::create_dir_all(&path).map_err(|e| StoreError::Io {
                    message: format!("failed to create lake directory {}: {}", path, e),
                })?;
                let fs = object_store::local::LocalFileSystem::new_with_prefix(&path).map_err(
                    |e| StoreError::Io {
                        message: format!("failed to open local lake at {}: {}", path, e),
                    },
                )?;
                (Arc::new(fs), String::new())
            }
            "s3" => {
                let bucket = spec
                    .bucket
                    .as_ref()
                    .ok_or_else(|| StoreError::InvalidSpec {
                        spec: format!("s3:///{}", spec.prefix),
                        reason: "S3 URL must include bucket name".to_string(),
                    })?;

                let mut builder = object_store::aws::AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_allow_http(false);
                if let Some(region) = &spec.region {
                    builder = builder.with_region(region);
                }

                let s3 = builder.build().map_err(|e| StoreError::Io {
                    message: format!("failed to create S3 client: {}", e),
                })?;
                (Arc::new(s3), spec.prefix.clone())
            }
            scheme => {
                return Err(StoreError::InvalidSpec {
                    spec: spec.scheme.clone(),
                    reason: format!("unsupported scheme: {}", scheme),
                })
            }
        };

        Ok(Self::new(
            inner,
            &prefix,
            planner,
            Arc::new(InMemoryCatalog::new()),
        ))
    }

    /// Create a lake from a URL string.
    pub fn from_url(url: &str, planner: LakePathPlanner) -> StoreResult<Self> {
        let spec = StoreSpec::parse(url)?;
        Self::from_spec(&spec, planner)
    }

    /// In-memory lake with default config, for tests.
    pub fn memory() -> Self {
        Self::new(
            Arc::new(object_store::memory::InMemory::new()),
            "",
            LakePathPlanner::default(),
            Arc::new(InMemoryCatalog::new()),
        )
    }

    /// In-memory lake under a key prefix, for tests.
    pub fn memory_with_prefix(prefix: &str) -> Self {
        Self::new(
            Arc::new(object_store::memory::InMemory::new()),
            prefix,
            LakePathPlanner::default(),
            Arc::new(InMemoryCatalog::new()),
        )
    }

    /// Replace the catalog.
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogStore>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn planner(&self) -> &LakePathPlanner {
        &self.planner
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogStore> {
        &self.catalog
    }

    fn key(&self, path: &str) -> object_store::path::Path {
        if self.prefix.is_empty() {
            object_store::path::Path::from(path)
        } else {
            object_store::path::Path::from(format!("{}/{}", self.prefix, path))
        }
    }

    /// Lake-relative path of a listed location, or `None` if outside the prefix.
    fn relative(&self, location: &object_store::path::Path) -> Option<String> {
        let full = location.as_ref();
        if self.prefix.is_empty() {
            return Some(full.to_string());
        }
        full.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| rest.to_string())
    }

    async fn put_if_not_exists(&self, path: &str, bytes: Bytes) -> StoreResult<()> {
        let opts = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };
        self.inner
            .put_opts(&self.key(path), PutPayload::from_bytes(bytes), opts)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_object_store(e, path))
    }

    async fn put_overwrite(&self, path: &str, bytes: Bytes) -> StoreResult<()> {
        self.inner
            .put(&self.key(path), PutPayload::from_bytes(bytes))
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_object_store(e, path))
    }

    /// Read an object by lake-relative path.
    pub async fn get(&self, path: &str) -> StoreResult<Bytes> {
        let result = self
            .inner
            .get(&self.key(path))
            .await
            .map_err(|e| StoreError::from_object_store(e, path))?;
        result.bytes().await.map_err(|e| StoreError::Io {
            message: format!("failed to read {}: {}", path, e),
        })
    }

    /// Whether an object exists.
    pub async fn exists(&self, path: &str) -> StoreResult<bool> {
        match self.inner.head(&self.key(path)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StoreError::from_object_store(e, path)),
        }
    }

    /// Delete an object; returns whether it existed.
    pub(crate) async fn delete_if_exists(&self, path: &str) -> StoreResult<bool> {
        if !self.exists(path).await? {
            return Ok(false);
        }
        match self.inner.delete(&self.key(path)).await {
            Ok(()) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StoreError::from_object_store(e, path)),
        }
    }

    /// Read and decode a sidecar.
    pub async fn read_sidecar(&self, data_file_path: &str) -> StoreResult<MetadataSidecar> {
        let path = naming::metadata_path(data_file_path);
        let bytes = self.get(&path).await?;
        MetadataSidecar::from_json_slice(&bytes).map_err(|e| StoreError::Serialization {
            path,
            message: e.to_string(),
        })
    }

    /// All keys under the lake prefix with their sizes, ordered by key.
    pub async fn list_keys(&self) -> StoreResult<Vec<(String, u64)>> {
        let prefix = (!self.prefix.is_empty())
            .then(|| object_store::path::Path::from(self.prefix.as_str()));
        let entries: Vec<_> = self
            .inner
            .list(prefix.as_ref())
            .try_collect()
            .await
            .map_err(|e| StoreError::Io {
                message: format!("failed to list lake: {}", e),
            })?;

        let mut keys: Vec<(String, u64)> = entries
            .iter()
            .filter_map(|meta| self.relative(&meta.location).map(|k| (k, meta.size as u64)))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Place a dataset in the lake.
    ///
    /// Plans the paths, claims the data-file path in the catalog, writes the
    /// data file and its sidecar, then repoints the latest alias. The
    /// sidecar's `byte_size` is set to the actual payload size.
    pub async fn write_object(
        &self,
        descriptor: &DatasetDescriptor,
        data: Bytes,
        sidecar: MetadataSidecar,
        now: DateTime<Utc>,
    ) -> StoreResult<WriteReceipt> {
        let paths = self.planner.plan_object_path(descriptor, now)?;
        let size = data.len() as u64;
        let mut sidecar = sidecar;
        sidecar.byte_size = size;

        let sidecar_bytes = sidecar.to_json_bytes().map_err(|e| StoreError::Serialization {
            path: paths.metadata_file_path.clone(),
            message: e.to_string(),
        })?;

        let entry = CatalogEntry::new(
            paths.data_file_path.clone(),
            descriptor.clone(),
            sidecar,
            size,
        );
        match self.catalog.insert_if_absent(entry).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists { path }) => {
                warn!(path = %path, "data file already catalogued");
                return Err(PlanError::PathCollision { path }.into());
            }
            Err(e) => return Err(e),
        }

        if let Err(e) = self
            .put_if_not_exists(&paths.data_file_path, data.clone())
            .await
        {
            self.catalog.remove(&paths.data_file_path).await?;
            return Err(match e {
                StoreError::AlreadyExists { path } => {
                    warn!(path = %path, "data file exists in storage but not in catalog");
                    PlanError::PathCollision { path }.into()
                }
                other => other,
            });
        }

        if let Err(e) = self
            .put_overwrite(&paths.metadata_file_path, Bytes::from(sidecar_bytes))
            .await
        {
            warn!(path = %paths.data_file_path, error = %e, "sidecar write failed, rolling back");
            self.delete_if_exists(&paths.data_file_path).await?;
            self.catalog.remove(&paths.data_file_path).await?;
            return Err(e);
        }

        let mut stale_alias = None;
        if let Some(alias) = &paths.latest_alias_path {
            match self
                .run_with_retry(alias, || self.put_overwrite(alias, data.clone()))
                .await
            {
                Ok(()) => {
                    debug!(
                        alias = %alias,
                        target = %paths.data_file_path,
                        "latest alias repointed"
                    );
                }
                Err(e) => {
                    warn!(
                        alias = %alias,
                        target = %paths.data_file_path,
                        error = %e,
                        "latest alias not repointed, it still serves the previous object"
                    );
                    stale_alias = Some(alias.clone());
                }
            }
        }

        info!(
            path = %paths.data_file_path,
            zone = %descriptor.zone,
            bytes = size,
            "object written"
        );
        Ok(WriteReceipt {
            paths,
            size,
            stale_alias,
        })
    }

    /// Move a single object; returns false if it had already been moved.
    ///
    /// The source is deleted only once the target holds its bytes.
    async fn move_object(
        &self,
        from: &str,
        to: &str,
        on_conflict: OnConflict,
    ) -> StoreResult<bool> {
        let bytes = match self.get(from).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound { path }) => {
                if self.exists(to).await? {
                    return Ok(false);
                }
                return Err(StoreError::NotFound { path });
            }
            Err(e) => return Err(e),
        };

        match on_conflict {
            OnConflict::Replace => self.put_overwrite(to, bytes).await?,
            OnConflict::Verify => match self.put_if_not_exists(to, bytes.clone()).await {
                Ok(()) => {}
                Err(StoreError::AlreadyExists { .. }) => {
                    if self.get(to).await? != bytes {
                        warn!(
                            from = %from,
                            to = %to,
                            "target holds a different object, source kept"
                        );
                        return Err(PlanError::PathCollision {
                            path: to.to_string(),
                        }
                        .into());
                    }
                    debug!(from = %from, to = %to, "target already holds the same bytes");
                }
                Err(e) => return Err(e),
            },
        }
        self.delete_if_exists(from).await?;
        Ok(true)
    }

    /// Apply one lifecycle action. Idempotent: re-applying a completed action
    /// returns `AlreadyApplied`.
    pub async fn apply(&self, action: &LifecycleAction) -> StoreResult<ApplyOutcome> {
        let entry = &action.entry;
        match action.action {
            ExpiryAction::Transition(zone) => {
                if entry.descriptor.zone == zone {
                    return Ok(ApplyOutcome::AlreadyApplied);
                }
                let target = self.planner.plan_relocation(&entry.descriptor, zone)?;

                let moved_data = self
                    .move_object(
                        &entry.data_file_path,
                        &target.data_file_path,
                        OnConflict::Verify,
                    )
                    .await?;
                let moved_meta = match self
                    .move_object(
                        &entry.metadata_file_path(),
                        &target.metadata_file_path,
                        OnConflict::Replace,
                    )
                    .await
                {
                    Ok(moved) => moved,
                    Err(StoreError::NotFound { path }) => {
                        warn!(path = %path, "sidecar missing during transition");
                        false
                    }
                    Err(e) => return Err(e),
                };
                self.catalog
                    .update_zone(&entry.data_file_path, zone, &target.data_file_path)
                    .await?;

                if !moved_data && !moved_meta {
                    return Ok(ApplyOutcome::AlreadyApplied);
                }
                info!(
                    from = %entry.data_file_path,
                    to = %target.data_file_path,
                    reason = %action.reason,
                    "transitioned"
                );
                Ok(ApplyOutcome::Transitioned {
                    to: zone,
                    data_file_path: target.data_file_path,
                })
            }
            ExpiryAction::Delete => {
                let had_data = self.delete_if_exists(&entry.data_file_path).await?;
                let had_meta = self.delete_if_exists(&entry.metadata_file_path()).await?;
                let had_entry = self.catalog.remove(&entry.data_file_path).await?.is_some();

                if !had_data && !had_meta && !had_entry {
                    return Ok(ApplyOutcome::AlreadyApplied);
                }
                info!(path = %entry.data_file_path, reason = %action.reason, "deleted");
                Ok(ApplyOutcome::Deleted)
            }
        }
    }

    /// Run `op` until it succeeds, fails permanently or retries run out.
    async fn run_with_retry<T, F, Fut>(&self, path: &str, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut retries = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retries < self.retry.max_retries => {
                    retries += 1;
                    let backoff = self.retry.backoff(retries);
                    warn!(
                        path = %path,
                        error = %e,
                        retry = retries,
                        max_retries = self.retry.max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying storage operation"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Apply actions in order (oldest first when fed from the evaluator).
    ///
    /// Failures are recorded and do not stop the run.
    pub async fn apply_all<I>(&self, actions: I, options: ApplyOptions) -> ApplyReport
    where
        I: IntoIterator<Item = LifecycleAction>,
    {
        let mut report = ApplyReport::default();
        let mut processed = 0usize;

        for action in actions {
            if options.max_actions.is_some_and(|max| processed >= max) {
                report.remaining += 1;
                continue;
            }
            processed += 1;

            if options.dry_run {
                report.planned.push(format!(
                    "{} {} ({})",
                    action.action, action.entry.data_file_path, action.reason
                ));
                continue;
            }

            match self
                .run_with_retry(&action.entry.data_file_path, || self.apply(&action))
                .await
            {
                Ok(ApplyOutcome::Transitioned { .. }) => {
                    report.transitioned += 1;
                    report.bytes_released += action.entry.size;
                }
                Ok(ApplyOutcome::Deleted) => {
                    report.deleted += 1;
                    report.bytes_released += action.entry.size;
                }
                Ok(ApplyOutcome::AlreadyApplied) => report.already_applied += 1,
                Err(e) => {
                    warn!(path = %action.entry.data_file_path, error = %e, "lifecycle action failed");
                    report
                        .failed
                        .push((action.entry.data_file_path.clone(), e.to_string()));
                }
            }
        }

        if report.remaining > 0 {
            info!(remaining = report.remaining, "lifecycle budget exhausted");
        }
        report
    }

    /// Populate the catalog from what is in storage.
    ///
    /// Every key that parses through the path grammar and has a readable
    /// sidecar becomes a catalog entry. Anything else is skipped with a
    /// warning; latest aliases and sidecars are not entries themselves.
    pub async fn rebuild_catalog(&self) -> StoreResult<RebuildReport> {
        let mut report = RebuildReport::default();

        for (key, size) in self.list_keys().await? {
            if naming::is_sidecar_path(&key) || naming::is_latest_alias_path(&key) {
                continue;
            }

            let descriptor = match naming::parse_object_path(&key) {
                Ok(d) => d,
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping key outside the lake grammar");
                    report.skipped.push(key);
                    continue;
                }
            };

            let sidecar = match self.read_sidecar(&key).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping data file without a readable sidecar");
                    report.skipped.push(key);
                    continue;
                }
            };

            match self
                .catalog
                .insert_if_absent(CatalogEntry::new(key, descriptor, sidecar, size))
                .await
            {
                Ok(()) => report.inserted += 1,
                Err(StoreError::AlreadyExists { .. }) => report.already_present += 1,
                Err(e) => return Err(e),
            }
        }

        info!(
            inserted = report.inserted,
            skipped = report.skipped.len(),
            "catalog rebuilt from storage"
        );
        Ok(report)
    }
}
