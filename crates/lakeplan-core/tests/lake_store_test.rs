//! End-to-end lake behavior against in-memory and local-filesystem stores.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use lakeplan_core::{
    validate_layout, ApplyOptions, ApplyOutcome, Bytes, CatalogStore, DataFormat,
    DatasetDescriptor, ExpiryAction, InMemoryCatalog, LakeConfig, LakePathPlanner,
    MetadataSidecar, ObjectStoreLake, RetentionEvaluator, RetryPolicy, Zone,
};
use serde_json::{json, Value};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 26, 0, 0, 0).unwrap()
}

fn raw(base: &str, age: Duration) -> DatasetDescriptor {
    DatasetDescriptor::new(
        Zone::Raw,
        "csv_ingestion",
        "events",
        base,
        now() - age,
        DataFormat::Parquet,
    )
}

fn processed(age: Duration) -> DatasetDescriptor {
    DatasetDescriptor::new(
        Zone::Processed,
        "data_processing",
        "events",
        "clean_events",
        now() - age,
        DataFormat::Parquet,
    )
}

fn sidecar() -> MetadataSidecar {
    MetadataSidecar::new(10, 0, "sha256:00").with_metric("missing_percentage", 0.5)
}

async fn keys(lake: &ObjectStoreLake) -> Vec<String> {
    lake.list_keys()
        .await
        .unwrap()
        .into_iter()
        .map(|(k, _)| k)
        .collect()
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_latest_alias_follows_newest_write() {
    let lake = ObjectStoreLake::memory();
    lake.write_object(&raw("events", Duration::days(2)), Bytes::from("old"), sidecar(), now())
        .await
        .unwrap();
    lake.write_object(&raw("events", Duration::days(1)), Bytes::from("new"), sidecar(), now())
        .await
        .unwrap();

    assert_eq!(
        lake.get("raw/events_latest.parquet").await.unwrap(),
        Bytes::from("new")
    );
    // two data files, two sidecars, one alias
    assert_eq!(keys(&lake).await.len(), 5);
}

#[tokio::test]
async fn test_rejected_write_leaves_no_trace() {
    let lake = ObjectStoreLake::memory();
    let mut d = raw("events", Duration::days(1));
    d.source = "CSV".to_string();

    let err = lake
        .write_object(&d, Bytes::from("x"), sidecar(), now())
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 1);
    assert!(keys(&lake).await.is_empty());
    assert!(lake.catalog().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_writers_same_path_one_wins() {
    let lake = Arc::new(ObjectStoreLake::memory());
    let d = raw("events", Duration::days(1));

    let mut handles = Vec::new();
    for i in 0..8 {
        let lake = Arc::clone(&lake);
        let d = d.clone();
        handles.push(tokio::spawn(async move {
            lake.write_object(&d, Bytes::from(format!("w{}", i)), sidecar(), now())
                .await
        }));
    }

    let mut ok = 0;
    let mut collisions = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) if e.is_collision() => collisions += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(collisions, 7);
}

#[tokio::test]
async fn test_local_filesystem_lake() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("file://{}", dir.path().display());
    let lake = ObjectStoreLake::from_url(&url, LakePathPlanner::default()).unwrap();

    let receipt = lake
        .write_object(&raw("events", Duration::days(1)), Bytes::from("on-disk"), sidecar(), now())
        .await
        .unwrap();

    assert!(dir.path().join(&receipt.paths.data_file_path).exists());
    assert!(dir.path().join(&receipt.paths.metadata_file_path).exists());
    assert!(dir.path().join("raw/events_latest.parquet").exists());
}

#[tokio::test]
async fn test_failed_alias_update_keeps_committed_write() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the alias file should go makes every alias put fail.
    std::fs::create_dir_all(dir.path().join("raw/events_latest.parquet")).unwrap();
    let url = format!("file://{}", dir.path().display());
    let lake = ObjectStoreLake::from_url(&url, LakePathPlanner::default())
        .unwrap()
        .with_retry(RetryPolicy {
            max_retries: 1,
            base_backoff: std::time::Duration::from_millis(1),
            max_backoff: std::time::Duration::from_millis(5),
        });

    let receipt = lake
        .write_object(&raw("events", Duration::days(1)), Bytes::from("kept"), sidecar(), now())
        .await
        .unwrap();

    assert_eq!(receipt.stale_alias.as_deref(), Some("raw/events_latest.parquet"));
    assert!(dir.path().join(&receipt.paths.data_file_path).is_file());
    assert!(dir.path().join(&receipt.paths.metadata_file_path).is_file());
    assert!(dir.path().join("raw/events_latest.parquet").is_dir());
    assert_eq!(lake.catalog().list().await.unwrap().len(), 1);

    let json = serde_json::to_value(&receipt).unwrap();
    assert_eq!(json["stale_alias"], "raw/events_latest.parquet");
}

#[tokio::test]
async fn test_receipt_omits_stale_alias_on_success() {
    let lake = ObjectStoreLake::memory();
    let receipt = lake
        .write_object(&raw("events", Duration::days(1)), Bytes::from("x"), sidecar(), now())
        .await
        .unwrap();
    assert!(receipt.stale_alias.is_none());
    assert!(serde_json::to_value(&receipt)
        .unwrap()
        .get("stale_alias")
        .is_none());
}

// ============================================================================
// Sidecar document
// ============================================================================

#[tokio::test]
async fn test_sidecar_matches_documented_schema() {
    let schema = json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["lineage", "row_count", "byte_size", "schema_fingerprint", "quality"],
        "properties": {
            "lineage": {
                "type": "object",
                "required": ["source_path"],
                "properties": { "source_path": { "type": ["string", "null"] } }
            },
            "row_count": { "type": "integer", "minimum": 0 },
            "byte_size": { "type": "integer", "minimum": 0 },
            "schema_fingerprint": { "type": "string", "pattern": "^sha256:" },
            "quality": {
                "type": "object",
                "additionalProperties": { "type": "number" }
            }
        }
    });
    let validator = jsonschema::validator_for(&schema).unwrap();

    let lake = ObjectStoreLake::memory();
    let receipt = lake
        .write_object(
            &processed(Duration::days(1)),
            Bytes::from("rows"),
            sidecar().with_source_path("raw/events_latest.parquet"),
            now(),
        )
        .await
        .unwrap();

    let bytes = lake.get(&receipt.paths.metadata_file_path).await.unwrap();
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    let errors: Vec<String> = validator.iter_errors(&doc).map(|e| e.to_string()).collect();
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(doc["byte_size"], 4);
    assert_eq!(doc["lineage"]["source_path"], "raw/events_latest.parquet");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_transition_is_idempotent() {
    let lake = ObjectStoreLake::memory();
    let receipt = lake
        .write_object(&raw("events", Duration::days(91)), Bytes::from("x"), sidecar(), now())
        .await
        .unwrap();

    let entries = lake.catalog().list().await.unwrap();
    let action = RetentionEvaluator::default()
        .evaluate(entries, now())
        .next()
        .unwrap();
    assert_eq!(action.action, ExpiryAction::Transition(Zone::Archive));

    let first = lake.apply(&action).await.unwrap();
    let archived = match first {
        ApplyOutcome::Transitioned { to, data_file_path } => {
            assert_eq!(to, Zone::Archive);
            data_file_path
        }
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert!(archived.starts_with("archive/source=csv_ingestion/type=events/"));
    assert!(!lake.exists(&receipt.paths.data_file_path).await.unwrap());
    assert!(lake.exists(&archived).await.unwrap());
    assert!(lake.read_sidecar(&archived).await.is_ok());

    let second = lake.apply(&action).await.unwrap();
    assert_eq!(second, ApplyOutcome::AlreadyApplied);

    let catalog = lake.catalog().list().await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].zone(), Zone::Archive);
    assert_eq!(catalog[0].data_file_path, archived);
}

#[tokio::test]
async fn test_transition_keeps_source_when_target_differs() {
    let lake = ObjectStoreLake::memory();
    let old = raw("events", Duration::days(120));
    let source = lake
        .write_object(&old, Bytes::from("RAW-DATA"), sidecar(), now())
        .await
        .unwrap();
    let occupant = lake
        .write_object(&old.with_zone(Zone::Archive), Bytes::from("OTHER"), sidecar(), now())
        .await
        .unwrap();

    let actions = RetentionEvaluator::default().evaluate(lake.catalog().list().await.unwrap(), now());
    let report = lake.apply_all(actions, ApplyOptions::default()).await;

    assert_eq!(report.transitioned, 0);
    assert_eq!(report.bytes_released, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, source.paths.data_file_path);
    assert!(report.failed[0].1.contains("collision"));

    assert_eq!(
        lake.get(&source.paths.data_file_path).await.unwrap(),
        Bytes::from("RAW-DATA")
    );
    assert!(lake.read_sidecar(&source.paths.data_file_path).await.is_ok());
    assert_eq!(
        lake.get(&occupant.paths.data_file_path).await.unwrap(),
        Bytes::from("OTHER")
    );
    let mut zones: Vec<Zone> = lake
        .catalog()
        .list()
        .await
        .unwrap()
        .iter()
        .map(|e| e.zone())
        .collect();
    zones.sort();
    assert_eq!(zones, vec![Zone::Raw, Zone::Archive]);
}

#[tokio::test]
async fn test_transition_completes_over_identical_target() {
    let lake = ObjectStoreLake::memory();
    let old = raw("events", Duration::days(120));
    let source = lake
        .write_object(&old, Bytes::from("RAW-DATA"), sidecar(), now())
        .await
        .unwrap();
    // Copy left behind by an interrupted transition.
    let copy = lake
        .write_object(&old.with_zone(Zone::Archive), Bytes::from("RAW-DATA"), sidecar(), now())
        .await
        .unwrap();

    let actions = RetentionEvaluator::default().evaluate(lake.catalog().list().await.unwrap(), now());
    let report = lake.apply_all(actions, ApplyOptions::default()).await;

    assert_eq!(report.transitioned, 1);
    assert!(report.failed.is_empty());
    assert!(!lake.exists(&source.paths.data_file_path).await.unwrap());
    assert_eq!(
        lake.get(&copy.paths.data_file_path).await.unwrap(),
        Bytes::from("RAW-DATA")
    );
    let catalog = lake.catalog().list().await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].zone(), Zone::Archive);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let lake = ObjectStoreLake::memory();
    lake.write_object(&processed(Duration::days(400)), Bytes::from("x"), sidecar(), now())
        .await
        .unwrap();

    let entries = lake.catalog().list().await.unwrap();
    let action = RetentionEvaluator::default()
        .evaluate(entries, now())
        .next()
        .unwrap();
    assert_eq!(action.action, ExpiryAction::Delete);

    assert_eq!(lake.apply(&action).await.unwrap(), ApplyOutcome::Deleted);
    assert_eq!(
        lake.apply(&action).await.unwrap(),
        ApplyOutcome::AlreadyApplied
    );
    assert!(keys(&lake).await.is_empty());
    assert!(lake.catalog().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let lake = ObjectStoreLake::memory();
    lake.write_object(&raw("events", Duration::days(120)), Bytes::from("x"), sidecar(), now())
        .await
        .unwrap();
    let before = keys(&lake).await;

    let actions = RetentionEvaluator::default().evaluate(lake.catalog().list().await.unwrap(), now());
    let report = lake
        .apply_all(
            actions,
            ApplyOptions {
                dry_run: true,
                max_actions: None,
            },
        )
        .await;

    assert_eq!(report.planned.len(), 1);
    assert!(report.planned[0].starts_with("transition:archive raw/"));
    assert_eq!(report.transitioned, 0);
    assert_eq!(keys(&lake).await, before);
}

#[tokio::test]
async fn test_budget_processes_oldest_first() {
    let lake = ObjectStoreLake::memory();
    for (base, days) in [("a", 100), ("b", 300), ("c", 200)] {
        lake.write_object(&raw(base, Duration::days(days)), Bytes::from("xyz"), sidecar(), now())
            .await
            .unwrap();
    }

    let actions = RetentionEvaluator::default().evaluate(lake.catalog().list().await.unwrap(), now());
    let report = lake
        .apply_all(
            actions,
            ApplyOptions {
                dry_run: false,
                max_actions: Some(2),
            },
        )
        .await;

    assert_eq!(report.transitioned, 2);
    assert_eq!(report.remaining, 1);
    assert_eq!(report.bytes_released, 6);
    assert!(report.failed.is_empty());

    let mut zones: Vec<(String, Zone)> = lake
        .catalog()
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|e| (e.descriptor.base_name.clone(), e.zone()))
        .collect();
    zones.sort();
    assert_eq!(
        zones,
        vec![
            ("a".to_string(), Zone::Raw),
            ("b".to_string(), Zone::Archive),
            ("c".to_string(), Zone::Archive),
        ]
    );
}

// ============================================================================
// Catalog rebuild
// ============================================================================

#[tokio::test]
async fn test_rebuild_catalog_from_storage() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("file://{}", dir.path().display());

    let writer = ObjectStoreLake::from_url(&url, LakePathPlanner::default()).unwrap();
    writer
        .write_object(&raw("events", Duration::days(3)), Bytes::from("a"), sidecar(), now())
        .await
        .unwrap();
    writer
        .write_object(&processed(Duration::days(2)), Bytes::from("bb"), sidecar(), now())
        .await
        .unwrap();
    std::fs::create_dir_all(dir.path().join("raw")).unwrap();
    std::fs::write(dir.path().join("raw/events_20260126.parquet"), b"junk").unwrap();

    let catalog = Arc::new(InMemoryCatalog::new());
    let reader = ObjectStoreLake::from_url(&url, LakePathPlanner::default())
        .unwrap()
        .with_catalog(catalog.clone());

    let report = reader.rebuild_catalog().await.unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, vec!["raw/events_20260126.parquet".to_string()]);
    assert_eq!(catalog.len().await, 2);

    let again = reader.rebuild_catalog().await.unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(again.already_present, 2);
}

// ============================================================================
// Legacy migration
// ============================================================================

const EVENTS_NEW: &str = "raw/source=csv_ingestion/type=events/timestamp=20250102_120000/events_csv_ingestion_20250102_120000.parquet";

fn write_legacy(root: &std::path::Path, key: &str, bytes: &str) {
    let path = root.join(key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

#[tokio::test]
async fn test_migrate_legacy_files_into_layout() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("file://{}", dir.path().display());
    write_legacy(dir.path(), "raw/events_20250102_120000.parquet", "E2");
    write_legacy(dir.path(), "raw/events_20250101_120000.parquet", "E1");
    write_legacy(dir.path(), "archive/backup_20240101_000000.csv", "a,b");
    write_legacy(dir.path(), "raw/notes.txt", "?");

    let lake = ObjectStoreLake::from_url(&url, LakePathPlanner::default()).unwrap();

    let plan = lake.migrate_legacy(now(), true).await.unwrap();
    assert_eq!(plan.planned.len(), 3);
    assert!(plan.migrated.is_empty());
    assert!(dir.path().join("raw/events_20250101_120000.parquet").exists());
    assert!(!dir.path().join(EVENTS_NEW).exists());

    let report = lake.migrate_legacy(now(), false).await.unwrap();
    assert_eq!(report.migrated.len(), 3);
    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(report.unmatched, vec!["raw/notes.txt".to_string()]);

    assert!(!dir.path().join("raw/events_20250102_120000.parquet").exists());
    assert_eq!(lake.get(EVENTS_NEW).await.unwrap(), Bytes::from("E2"));
    // Oldest first, so the alias ends on the newest file.
    assert_eq!(
        lake.get("raw/events_latest.parquet").await.unwrap(),
        Bytes::from("E2")
    );
    let sidecar = lake.read_sidecar(EVENTS_NEW).await.unwrap();
    assert_eq!(
        sidecar.lineage.source_path.as_deref(),
        Some("raw/events_20250102_120000.parquet")
    );
    assert_eq!(sidecar.byte_size, 2);
    assert!(lake
        .exists("archive/source=csv_ingestion/type=csv_backups/timestamp=20240101_000000/csv_backups_csv_ingestion_20240101_000000.csv")
        .await
        .unwrap());

    let keys = keys(&lake).await;
    let layout = validate_layout(keys.iter().map(String::as_str), &LakeConfig::default());
    assert_eq!(layout.issues.len(), 1);
    assert!(layout.issues[0].starts_with("orphaned file: raw/notes.txt"));
}

#[tokio::test]
async fn test_migrate_resumes_and_refuses_foreign_target() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("file://{}", dir.path().display());
    write_legacy(dir.path(), "raw/events_20250102_120000.parquet", "E2");
    let lake = ObjectStoreLake::from_url(&url, LakePathPlanner::default()).unwrap();
    lake.migrate_legacy(now(), false).await.unwrap();

    // Interrupted run: the legacy file was copied but not deleted.
    write_legacy(dir.path(), "raw/events_20250102_120000.parquet", "E2");
    let report = lake.migrate_legacy(now(), false).await.unwrap();
    assert_eq!(report.migrated.len(), 1);
    assert!(!dir.path().join("raw/events_20250102_120000.parquet").exists());

    // Different bytes for the same dataset time stay where they are.
    write_legacy(dir.path(), "raw/events_20250102_120000.parquet", "OTHER");
    let report = lake.migrate_legacy(now(), false).await.unwrap();
    assert!(report.migrated.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].1.contains("collision"));
    assert!(dir.path().join("raw/events_20250102_120000.parquet").exists());
    assert_eq!(lake.get(EVENTS_NEW).await.unwrap(), Bytes::from("E2"));
}
