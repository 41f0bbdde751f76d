use super::config::cmd_config;
use super::env::CliArgs;
use super::info::cmd_info;
use super::simulate::cmd_simulate;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Simulate(args) => cmd_simulate(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
        Commands::Info(args) => cmd_info(args, ctx).await,
    }
}
