//! `lakeplan plan` - Print the planned paths for a dataset.

use anyhow::Result;
use chrono::Utc;
use lakeplan_core::LakePathPlanner;
use std::path::Path;

use crate::cli::args::PlanArgs;
use crate::cli::helpers::{descriptor_from_args, load_config, print_json};
use crate::exit_codes;

pub fn run(args: PlanArgs, config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let now = Utc::now();
    let planner = LakePathPlanner::new(config);

    let planned = descriptor_from_args(&args.dataset, args.format, now)
        .and_then(|descriptor| planner.plan_object_path(&descriptor, now));
    match planned {
        Ok(paths) => {
            print_json(&paths)?;
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            Ok(e.exit_code())
        }
    }
}
