use clap::Subcommand;

use super::config::ConfigArgs;
use super::info::InfoArgs;
use super::simulate::SimulateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Drive the adapter against a page fixture held in memory
    Simulate(SimulateArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Show build and adapter information
    Info(InfoArgs),
}
