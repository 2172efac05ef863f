//! In-memory catalog.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CatalogEntry, CatalogStore, StoreError, StoreResult};
use crate::zone::Zone;

/// Catalog held in a `BTreeMap` behind a tokio `RwLock`.
///
/// Every mutation takes the write lock for its whole check-and-set, which is
/// what makes `insert_if_absent` exactly-once per path.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: RwLock<BTreeMap<String, CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with `entries`; later duplicates replace earlier ones.
    pub fn with_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let map = entries
            .into_iter()
            .map(|e| (e.data_file_path.clone(), e))
            .collect();
        Self {
            entries: RwLock::new(map),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn insert_if_absent(&self, entry: CatalogEntry) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.data_file_path) {
            return Err(StoreError::AlreadyExists {
                path: entry.data_file_path,
            });
        }
        entries.insert(entry.data_file_path.clone(), entry);
        Ok(())
    }

    async fn get(&self, data_file_path: &str) -> StoreResult<Option<CatalogEntry>> {
        Ok(self.entries.read().await.get(data_file_path).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<CatalogEntry>> {
        Ok(self.entries.read().await.values().cloned().collect())
    }

    async fn update_zone(
        &self,
        data_file_path: &str,
        zone: Zone,
        relocated_path: &str,
    ) -> StoreResult<CatalogEntry> {
        let mut entries = self.entries.write().await;

        match entries.get(data_file_path) {
            Some(current) if current.descriptor.zone == zone => return Ok(current.clone()),
            Some(_) => {}
            None => {
                return match entries.get(relocated_path) {
                    Some(moved) if moved.descriptor.zone == zone => Ok(moved.clone()),
                    _ => Err(StoreError::NotFound {
                        path: data_file_path.to_string(),
                    }),
                }
            }
        }

        if let (Some(source), Some(target)) =
            (entries.get(data_file_path), entries.get(relocated_path))
        {
            if source.size != target.size {
                return Err(StoreError::AlreadyExists {
                    path: relocated_path.to_string(),
                });
            }
        }

        let Some(mut entry) = entries.remove(data_file_path) else {
            return Err(StoreError::NotFound {
                path: data_file_path.to_string(),
            });
        };
        entry.descriptor.zone = zone;
        entry.data_file_path = relocated_path.to_string();

        // Same object already catalogued at the target (an interrupted move).
        let stored = entries
            .entry(relocated_path.to_string())
            .or_insert(entry)
            .clone();
        Ok(stored)
    }

    async fn remove(&self, data_file_path: &str) -> StoreResult<Option<CatalogEntry>> {
        Ok(self.entries.write().await.remove(data_file_path))
    }
}
