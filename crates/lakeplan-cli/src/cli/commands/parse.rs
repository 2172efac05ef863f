//! `lakeplan parse` - Recover a dataset descriptor from a lake path.

use anyhow::Result;
use lakeplan_core::parse_object_path;

use crate::cli::args::ParseArgs;
use crate::cli::helpers::print_json;
use crate::exit_codes;

pub fn run(args: ParseArgs) -> Result<i32> {
    match parse_object_path(&args.path) {
        Ok(descriptor) => {
            print_json(&descriptor)?;
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            Ok(e.exit_code())
        }
    }
}
