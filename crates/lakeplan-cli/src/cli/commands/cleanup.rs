//! `lakeplan cleanup` - Evaluate retention and apply the actions.

use anyhow::{Context, Result};
use lakeplan_core::{ApplyOptions, CatalogStore, RetentionEvaluator};
use std::path::Path;
use tracing::info;

use crate::cli::args::CleanupArgs;
use crate::cli::helpers::{load_config, open_catalogued_lake, parse_now, print_json};
use crate::exit_codes;

pub async fn run(args: CleanupArgs, config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let now = parse_now(args.now.as_deref())?;
    let evaluator = RetentionEvaluator::new(config.retention_policy());

    let lake = open_catalogued_lake(&args.store.store, config).await?;
    let entries = lake
        .catalog()
        .list()
        .await
        .context("failed to read catalog")?;

    let actions = evaluator.evaluate(entries, now);
    info!(due = actions.len(), dry_run = args.dry_run, "starting cleanup");

    let report = lake
        .apply_all(
            actions,
            ApplyOptions {
                dry_run: args.dry_run,
                max_actions: args.max_actions,
            },
        )
        .await;
    print_json(&report)?;

    if report.failed.is_empty() {
        Ok(exit_codes::SUCCESS)
    } else {
        eprintln!("{} lifecycle action(s) failed", report.failed.len());
        Ok(exit_codes::VALIDATION_FAILED)
    }
}
