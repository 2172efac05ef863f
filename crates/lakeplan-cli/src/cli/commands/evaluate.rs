//! `lakeplan evaluate` - List lifecycle actions due for the lake.

use anyhow::{Context, Result};
use lakeplan_core::{CatalogStore, LifecycleAction, RetentionEvaluator};
use serde::Serialize;
use std::path::Path;

use crate::cli::args::EvaluateArgs;
use crate::cli::helpers::{load_config, open_catalogued_lake, parse_now, print_json};
use crate::exit_codes;

#[derive(Serialize)]
struct Evaluation {
    now: String,
    actions: Vec<LifecycleAction>,
    /// Entries excluded for having a future timestamp.
    skipped: usize,
}

pub async fn run(args: EvaluateArgs, config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let now = parse_now(args.now.as_deref())?;
    let evaluator = RetentionEvaluator::new(config.retention_policy());

    let lake = open_catalogued_lake(&args.store.store, config).await?;
    let entries = lake
        .catalog()
        .list()
        .await
        .context("failed to read catalog")?;

    let mut actions = evaluator.evaluate(entries, now);
    let skipped = actions.skipped();
    let evaluation = Evaluation {
        now: now.to_rfc3339(),
        actions: actions.by_ref().collect(),
        skipped,
    };
    print_json(&evaluation)?;
    Ok(exit_codes::SUCCESS)
}
