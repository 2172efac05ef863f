//! Key naming conventions for the lake.
//!
//! # Key Schema
//!
//! ```text
//! {zone}/source={source}/type={type}/timestamp={YYYYMMDD_HHMMSS}/{base}_{source}_{YYYYMMDD_HHMMSS}.{ext}
//! {zone}/source={source}/type={type}/year={YYYY}/month={MM}/day={DD}/{base}_{source}_{YYYYMMDD_HHMMSS}.{ext}
//! {data_file}.metadata.json                      # sidecar, always JSON
//! {zone}/{base}_latest.{ext}                     # latest alias
//! ```
//!
//! The first form is the default. The date form is the ingestion-log layout
//! and is selected per zone through [`PartitionScheme`]. Both forms carry the
//! full second-precision timestamp in the file name, so either parses back to
//! the same descriptor.
//!
//! All timestamps are rendered in UTC. Partition directories sort
//! lexically in chronological order, and listing relies on that.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::descriptor::{validate_identifier, DataFormat, DatasetDescriptor};
use crate::error::{PlanError, PlanResult};
use crate::zone::Zone;

/// `chrono` format of the partition timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Suffix appended to a data-file path to get its sidecar path.
pub const SIDECAR_SUFFIX: &str = ".metadata.json";

const LATEST_MARKER: &str = "_latest";

/// Partition grammar used below `{zone}/source=/type=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionScheme {
    /// `timestamp={YYYYMMDD_HHMMSS}`
    #[default]
    Timestamp,
    /// `year={YYYY}/month={MM}/day={DD}`
    Date,
}

/// Render a timestamp as `YYYYMMDD_HHMMSS` (UTC, zero-padded).
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a `YYYYMMDD_HHMMSS` string back into a UTC instant.
pub fn parse_timestamp(s: &str) -> PlanResult<DateTime<Utc>> {
    let invalid = |reason: &str| PlanError::InvalidTimestamp {
        value: s.to_string(),
        reason: reason.to_string(),
    };

    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 15
        && bytes[8] == b'_'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 8 || b.is_ascii_digit());
    if !shape_ok {
        return Err(invalid("expected YYYYMMDD_HHMMSS"));
    }

    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| invalid(&e.to_string()))
}

/// First `YYYYMMDD_HHMMSS` token embedded in a file name, if any.
///
/// Legacy exports such as `events_20250101_120000.csv` carry their
/// extraction time this way.
pub fn timestamp_in_file_name(name: &str) -> Option<DateTime<Utc>> {
    let file = name.rsplit('/').next().unwrap_or(name);
    (0..file.len())
        .filter_map(|start| file.get(start..start + 15))
        .find_map(|window| parse_timestamp(window).ok())
}

/// Partition directory for a descriptor under the given grammar.
pub fn partition_dir(descriptor: &DatasetDescriptor, scheme: PartitionScheme) -> String {
    let prefix = format!(
        "{}/source={}/type={}",
        descriptor.zone, descriptor.source, descriptor.data_type
    );
    match scheme {
        PartitionScheme::Timestamp => {
            format!("{}/timestamp={}", prefix, format_timestamp(&descriptor.timestamp))
        }
        PartitionScheme::Date => {
            let ts = &descriptor.timestamp;
            format!(
                "{}/year={:04}/month={:02}/day={:02}",
                prefix,
                ts.year(),
                ts.month(),
                ts.day()
            )
        }
    }
}

/// File name: `{base}_{source}_{YYYYMMDD_HHMMSS}.{ext}`.
pub fn data_file_name(descriptor: &DatasetDescriptor) -> String {
    format!(
        "{}_{}_{}.{}",
        descriptor.base_name,
        descriptor.source,
        format_timestamp(&descriptor.timestamp),
        descriptor.format.extension()
    )
}

/// Sidecar path for a data-file path.
pub fn metadata_path(data_file_path: &str) -> String {
    format!("{}{}", data_file_path, SIDECAR_SUFFIX)
}

/// Latest alias: `{zone}/{base}_latest.{ext}`.
pub fn latest_alias_path(zone: Zone, base_name: &str, format: DataFormat) -> String {
    format!("{}/{}{}.{}", zone, base_name, LATEST_MARKER, format.extension())
}

/// Whether `path` is a sidecar key.
pub fn is_sidecar_path(path: &str) -> bool {
    path.ends_with(SIDECAR_SUFFIX)
}

/// Whether `path` has the shape of a latest alias (`{zone}/{base}_latest.{ext}`).
pub fn is_latest_alias_path(path: &str) -> bool {
    let Some((zone, file)) = path.split_once('/') else {
        return false;
    };
    if zone.parse::<Zone>().is_err() || file.contains('/') {
        return false;
    }
    let Some((stem, ext)) = file.rsplit_once('.') else {
        return false;
    };
    ext.parse::<DataFormat>().is_ok()
        && stem
            .strip_suffix(LATEST_MARKER)
            .is_some_and(|base| validate_identifier("base_name", base).is_ok())
}

/// Parse a data-file path back into the descriptor that produced it.
///
/// Accepts both partition grammars. The partition directory must agree with
/// the timestamp embedded in the file name.
pub fn parse_object_path(path: &str) -> PlanResult<DatasetDescriptor> {
    let parts: Vec<&str> = path.split('/').collect();
    let (scheme, file_name) = match parts.len() {
        5 => (PartitionScheme::Timestamp, parts[4]),
        7 => (PartitionScheme::Date, parts[6]),
        n => {
            return Err(PlanError::invalid_path(
                path,
                format!("expected 5 or 7 segments, found {}", n),
            ))
        }
    };

    let zone: Zone = parts[0]
        .parse()
        .map_err(|_| PlanError::invalid_path(path, format!("unknown zone '{}'", parts[0])))?;
    let source = partition_value(path, parts[1], "source")?;
    let data_type = partition_value(path, parts[2], "type")?;
    validate_identifier("source", source)?;
    validate_identifier("type", data_type)?;

    let (stem, ext) = file_name
        .rsplit_once('.')
        .ok_or_else(|| PlanError::invalid_path(path, "file name has no extension"))?;
    let format: DataFormat = ext.parse()?;

    // {base}_{source}_{YYYYMMDD_HHMMSS}; the timestamp is fixed-width and the
    // source is known from the partition, so the base name is what remains.
    let ts_len = 15;
    if !stem.is_ascii() || stem.len() < ts_len + 1 {
        return Err(PlanError::invalid_path(path, "malformed file name"));
    }
    let (head, ts_str) = stem.split_at(stem.len() - ts_len);
    let timestamp = parse_timestamp(ts_str)?;
    let base_name = head
        .strip_suffix('_')
        .and_then(|h| h.strip_suffix(source))
        .and_then(|h| h.strip_suffix('_'))
        .ok_or_else(|| {
            PlanError::invalid_path(path, format!("file name does not embed source '{}'", source))
        })?;
    validate_identifier("base_name", base_name)?;

    let descriptor = DatasetDescriptor::new(zone, source, data_type, base_name, timestamp, format);

    // The directory must be exactly what the planner would have produced.
    let expected_dir = partition_dir(&descriptor, scheme);
    let actual_dir = parts[..parts.len() - 1].join("/");
    if expected_dir != actual_dir {
        return Err(PlanError::invalid_path(
            path,
            format!("partition '{}' disagrees with file name", actual_dir),
        ));
    }

    Ok(descriptor)
}

fn partition_value<'a>(path: &str, segment: &'a str, key: &str) -> PlanResult<&'a str> {
    segment
        .strip_prefix(key)
        .and_then(|rest| rest.strip_prefix('='))
        .ok_or_else(|| PlanError::invalid_path(path, format!("expected '{}=' segment", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn descriptor() -> DatasetDescriptor {
        DatasetDescriptor::new(
            Zone::Raw,
            "csv_ingestion",
            "events",
            "events",
            Utc.with_ymd_and_hms(2026, 1, 26, 14, 9, 37).unwrap(),
            DataFormat::Parquet,
        )
    }

    #[test]
    fn test_format_timestamp_zero_padded() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(format_timestamp(&ts), "20260304_050607");
    }

    #[test]
    fn test_parse_timestamp_rejects_bad_shapes() {
        assert!(parse_timestamp("20260126_140937").is_ok());
        assert!(parse_timestamp("2026012_1409377").is_err());
        assert!(parse_timestamp("20261326_140937").is_err());
        assert!(parse_timestamp("20260126-140937").is_err());
        assert!(parse_timestamp("+2026012_140937").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_partition_dir_timestamp() {
        assert_eq!(
            partition_dir(&descriptor(), PartitionScheme::Timestamp),
            "raw/source=csv_ingestion/type=events/timestamp=20260126_140937"
        );
    }

    #[test]
    fn test_partition_dir_date() {
        assert_eq!(
            partition_dir(&descriptor(), PartitionScheme::Date),
            "raw/source=csv_ingestion/type=events/year=2026/month=01/day=26"
        );
    }

    #[test]
    fn test_latest_alias_shape() {
        assert_eq!(
            latest_alias_path(Zone::Raw, "events", DataFormat::Parquet),
            "raw/events_latest.parquet"
        );
        assert!(is_latest_alias_path("raw/events_latest.parquet"));
        assert!(!is_latest_alias_path("raw/events.parquet"));
        assert!(!is_latest_alias_path("bronze/events_latest.parquet"));
        assert!(!is_latest_alias_path("raw/x/events_latest.parquet"));
    }

    #[test]
    fn test_parse_base_name_with_underscores() {
        let path = "processed/source=data_processing/type=events/timestamp=20260126_140937/clean_events_data_processing_20260126_140937.parquet";
        let d = parse_object_path(path).unwrap();
        assert_eq!(d.base_name, "clean_events");
        assert_eq!(d.source, "data_processing");
        assert_eq!(d.zone, Zone::Processed);
    }

    #[test]
    fn test_parse_date_grammar() {
        let path = "metadata/source=csv_ingestion/type=ingestion_logs/year=2026/month=01/day=26/csv_ingestion_csv_ingestion_20260126_140937.json";
        let d = parse_object_path(path).unwrap();
        assert_eq!(d.base_name, "csv_ingestion");
        assert_eq!(d.format, DataFormat::Json);
        assert_eq!(d.timestamp, Utc.with_ymd_and_hms(2026, 1, 26, 14, 9, 37).unwrap());
    }

    #[test]
    fn test_parse_rejects_mismatched_partition() {
        let path = "raw/source=csv_ingestion/type=events/timestamp=20260126_140938/events_csv_ingestion_20260126_140937.parquet";
        assert!(matches!(
            parse_object_path(path),
            Err(PlanError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_foreign_source_in_file_name() {
        let path = "raw/source=csv_ingestion/type=events/timestamp=20260126_140937/events_api_ingestion_20260126_140937.parquet";
        assert!(parse_object_path(path).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_extension() {
        let path = "raw/source=csv_ingestion/type=events/timestamp=20260126_140937/events_csv_ingestion_20260126_140937.xlsx";
        assert!(matches!(
            parse_object_path(path),
            Err(PlanError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_timestamp_in_file_name() {
        assert_eq!(
            timestamp_in_file_name("exports/events_20250101_120000.csv"),
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(
            timestamp_in_file_name("item_properties_part1_20240612_000001.csv"),
            Some(Utc.with_ymd_and_hms(2024, 6, 12, 0, 0, 1).unwrap())
        );
        assert_eq!(timestamp_in_file_name("events_20250101.csv"), None);
        assert_eq!(timestamp_in_file_name("events_20251399_000000.csv"), None);
        assert_eq!(
            timestamp_in_file_name("é_20250101_120000"),
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap())
        );
    }
}
