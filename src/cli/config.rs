use std::path::Path;

use crate::cli::context::CliContext;
use crate::config::Config;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value as JsonValue;
use tokio::fs;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print one configuration value
    Get {
        /// Dotted key, e.g. `adapter.site.domain`
        key: String,
    },

    /// Validate the configuration file
    Validate,

    /// Print the configuration file path
    Path,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path();
    match args.action {
        ConfigAction::Show => {
            let config = ctx.config();
            match ctx.output().render(config)? {
                Some(rendered) => println!("{rendered}"),
                None => {
                    println!("Current configuration ({}):", path.display());
                    println!("{}", serde_yaml::to_string(config)?);
                }
            }
        }
        ConfigAction::Get { key } => {
            let json = serde_json::to_value(ctx.config())?;
            let segments = split_key(&key)?;
            match get_json_value(&json, &segments) {
                Some(value) => println!("{}", serde_yaml::to_string(value)?.trim_end()),
                None => bail!("{} not found in configuration", key),
            }
        }
        ConfigAction::Validate => {
            let config = if fs::try_exists(path).await? {
                read_config_file(path).await?
            } else {
                Config::default()
            };
            config
                .validate()
                .map_err(|reason| anyhow!("{}: {}", path.display(), reason))?;
            println!("Configuration {} is valid", path.display());
        }
        ConfigAction::Path => println!("{}", path.display()),
    }

    Ok(())
}

async fn read_config_file(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn get_json_value<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path {
        match current {
            JsonValue::Object(map) => {
                current = map.get(*segment)?;
            }
            _ => return None,
        }
    }
    Some(current)
}
