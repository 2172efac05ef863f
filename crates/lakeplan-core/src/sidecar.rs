//! Metadata sidecars: one JSON document next to every data file.
//!
//! ```json
//! {
//!   "lineage": { "source_path": "raw/source=.../events_csv_ingestion_20260126_140937.parquet" },
//!   "row_count": 2756101,
//!   "byte_size": 48213377,
//!   "schema_fingerprint": "sha256:9f1c...",
//!   "quality": { "missing_percentage": 0.12, "duplicate_percentage": 0.0 }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Lineage of a derived dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    /// Path of the object this one was derived from, if any.
    pub source_path: Option<String>,
}

/// Sidecar record attached 1:1 to a data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSidecar {
    pub lineage: Lineage,
    pub row_count: u64,
    pub byte_size: u64,
    pub schema_fingerprint: String,
    /// Metric name → value. Ordered for stable output.
    #[serde(default)]
    pub quality: BTreeMap<String, f64>,
}

impl MetadataSidecar {
    pub fn new(row_count: u64, byte_size: u64, schema_fingerprint: impl Into<String>) -> Self {
        Self {
            lineage: Lineage::default(),
            row_count,
            byte_size,
            schema_fingerprint: schema_fingerprint.into(),
            quality: BTreeMap::new(),
        }
    }

    /// Record the path this dataset was derived from.
    pub fn with_source_path(mut self, source_path: impl Into<String>) -> Self {
        self.lineage.source_path = Some(source_path.into());
        self
    }

    /// Add a quality metric. NaN and infinities have no JSON form and are dropped.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        let name = name.into();
        if value.is_finite() {
            self.quality.insert(name, value);
        } else {
            warn!(metric = %name, "dropping non-finite quality metric");
        }
        self
    }

    /// Pretty JSON bytes, as written next to the data file.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Fingerprint of a column schema: `sha256:<hex>` over `name:type` lines.
///
/// Column order is significant.
pub fn schema_fingerprint<N, T>(columns: &[(N, T)]) -> String
where
    N: AsRef<str>,
    T: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for (name, ty) in columns {
        hasher.update(name.as_ref().as_bytes());
        hasher.update(b":");
        hasher.update(ty.as_ref().as_bytes());
        hasher.update(b"\n");
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Share of missing cells, in percent, rounded to two decimals.
pub fn missing_percentage(missing_cells: u64, rows: u64, columns: u64) -> f64 {
    percentage(missing_cells, rows.saturating_mul(columns))
}

/// Share of duplicate rows, in percent, rounded to two decimals.
pub fn duplicate_percentage(duplicate_rows: u64, rows: u64) -> f64 {
    percentage(duplicate_rows, rows)
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = part as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}
