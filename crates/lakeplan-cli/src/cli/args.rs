use clap::{Args, Parser, Subcommand};
use lakeplan_core::{DataFormat, Zone};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "lakeplan",
    version,
    about = "Layout planning and lifecycle management for a zoned data lake"
)]
pub struct Cli {
    /// Lake config (YAML). A missing file means the default policy.
    #[arg(
        long,
        global = true,
        env = "LAKEPLAN_CONFIG",
        default_value = "lakeplan.yaml"
    )]
    pub config: PathBuf,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the planned paths for a dataset
    Plan(PlanArgs),
    /// Parse a lake path back into its dataset descriptor
    Parse(ParseArgs),
    /// List lifecycle actions due for the lake
    Evaluate(EvaluateArgs),
    /// Evaluate retention and apply the resulting actions
    Cleanup(CleanupArgs),
    /// Upload a local file into the lake with its sidecar
    Ingest(IngestArgs),
    /// Per-zone size and file counts
    Stats(StoreArgs),
    /// Check storage keys against the lake layout
    Validate(StoreArgs),
    /// Markdown storage report
    Report(ReportArgs),
    /// Move flat legacy files into the partitioned layout
    Migrate(MigrateArgs),
}

#[derive(Args, Clone, Debug)]
pub struct StoreArgs {
    /// Store URL (e.g., s3://bucket/prefix, file:///path)
    /// Can also be set via LAKEPLAN_STORE_URL
    #[arg(long, env = "LAKEPLAN_STORE_URL")]
    pub store: String,
}

#[derive(Args, Clone, Debug)]
pub struct DatasetArgs {
    /// Target zone (raw, processed, features, ...)
    #[arg(long)]
    pub zone: Zone,

    /// Ingestion or processing origin, [a-z0-9_]+
    #[arg(long)]
    pub source: String,

    /// Dataset type, [a-z0-9_]+
    #[arg(long = "type", value_name = "TYPE")]
    pub data_type: String,

    /// Logical dataset name; defaults to the type
    #[arg(long)]
    pub base_name: Option<String>,

    /// Dataset time: RFC 3339 or YYYYMMDD_HHMMSS (UTC). `ingest` falls back
    /// to a YYYYMMDD_HHMMSS token in the file name, otherwise now.
    #[arg(long)]
    pub timestamp: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// File format
    #[arg(long, default_value = "parquet")]
    pub format: DataFormat,
}

#[derive(Args, Clone, Debug)]
pub struct ParseArgs {
    /// Lake-relative data file path
    #[arg(value_name = "PATH")]
    pub path: String,
}

#[derive(Args, Clone, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Evaluation time (RFC 3339). Defaults to now.
    #[arg(long)]
    pub now: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct CleanupArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Evaluation time (RFC 3339). Defaults to now.
    #[arg(long)]
    pub now: Option<String>,

    /// List actions without touching storage
    #[arg(long)]
    pub dry_run: bool,

    /// Apply at most N actions, oldest first
    #[arg(long, value_name = "N")]
    pub max_actions: Option<usize>,
}

#[derive(Args, Clone, Debug)]
pub struct IngestArgs {
    /// Local file to upload
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// File format; inferred from the file extension when omitted
    #[arg(long)]
    pub format: Option<DataFormat>,

    /// Row count for the sidecar; counted from CSV/JSON content when omitted
    #[arg(long)]
    pub rows: Option<u64>,

    /// Column schema as name:type pairs, comma separated
    #[arg(long, value_delimiter = ',')]
    pub schema: Vec<String>,

    /// Lake path this dataset was derived from
    #[arg(long)]
    pub derived_from: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct ReportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Write the report to a file instead of stdout
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Fallback dataset time for files without a timestamp token (RFC 3339).
    /// Defaults to now.
    #[arg(long)]
    pub now: Option<String>,

    /// List planned moves without touching storage
    #[arg(long)]
    pub dry_run: bool,
}
