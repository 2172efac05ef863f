//! Dataset descriptors: the unit of data placed in the lake.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::zone::Zone;

/// On-disk data format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    Parquet,
    Json,
    Csv,
}

impl DataFormat {
    /// File extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            DataFormat::Parquet => "parquet",
            DataFormat::Json => "json",
            DataFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DataFormat {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parquet" => Ok(DataFormat::Parquet),
            "json" => Ok(DataFormat::Json),
            "csv" => Ok(DataFormat::Csv),
            other => Err(PlanError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// Immutable description of one unit of data to be placed in the lake.
///
/// `(zone, source, data_type, timestamp)` need not be unique; the planned
/// data-file path must be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub zone: Zone,
    /// Ingestion or processing origin (`csv_ingestion`, `feature_store`, ...).
    pub source: String,
    /// Logical data type (`events`, `user_features`, ...).
    #[serde(rename = "type")]
    pub data_type: String,
    /// Name used in file names; may differ from `data_type`.
    pub base_name: String,
    /// Capture/creation time. Only second precision is significant.
    pub timestamp: DateTime<Utc>,
    pub format: DataFormat,
}

impl DatasetDescriptor {
    pub fn new(
        zone: Zone,
        source: impl Into<String>,
        data_type: impl Into<String>,
        base_name: impl Into<String>,
        timestamp: DateTime<Utc>,
        format: DataFormat,
    ) -> Self {
        Self {
            zone,
            source: source.into(),
            data_type: data_type.into(),
            base_name: base_name.into(),
            timestamp: truncate_to_second(timestamp),
            format,
        }
    }

    /// Same dataset, relocated to another zone.
    pub fn with_zone(&self, zone: Zone) -> Self {
        Self {
            zone,
            ..self.clone()
        }
    }

    /// Check `source`, `data_type` and `base_name` against the identifier rule.
    pub fn validate_identifiers(&self) -> PlanResult<()> {
        validate_identifier("source", &self.source)?;
        validate_identifier("type", &self.data_type)?;
        validate_identifier("base_name", &self.base_name)?;
        Ok(())
    }
}

/// Identifiers are non-empty and drawn from `[a-z0-9_]`.
pub fn validate_identifier(field: &'static str, value: &str) -> PlanResult<()> {
    let ok = !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(PlanError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}

pub(crate) fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}
