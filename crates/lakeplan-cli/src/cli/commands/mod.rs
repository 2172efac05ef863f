use super::args::*;

pub mod cleanup;
pub mod evaluate;
pub mod ingest;
pub mod inspect;
pub mod migrate;
pub mod parse;
pub mod plan;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config_path = cli.config;
    match cli.cmd {
        Command::Plan(args) => plan::run(args, &config_path),
        Command::Parse(args) => parse::run(args),
        Command::Evaluate(args) => evaluate::run(args, &config_path).await,
        Command::Cleanup(args) => cleanup::run(args, &config_path).await,
        Command::Ingest(args) => ingest::run(args, &config_path).await,
        Command::Stats(args) => inspect::cmd_stats(args, &config_path).await,
        Command::Validate(args) => inspect::cmd_validate(args, &config_path).await,
        Command::Report(args) => inspect::cmd_report(args, &config_path).await,
        Command::Migrate(args) => migrate::run(args, &config_path).await,
    }
}
