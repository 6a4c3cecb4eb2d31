use super::act::cmd_act;
use super::env::CliArgs;
use super::run::cmd_run;
use super::snapshot::cmd_snapshot;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, ctx).await,
        Commands::Snapshot(args) => cmd_snapshot(args, ctx).await,
        Commands::Act(args) => cmd_act(args, ctx).await,
    }
}
