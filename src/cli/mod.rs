pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod output;
pub mod runtime;
pub mod simulate;

pub use config::{cmd_config, ConfigArgs};
pub use info::{cmd_info, InfoArgs};
pub use simulate::{cmd_simulate, SimulateArgs, SimulationReport};
