//! Config command - show configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::CarryallResult;
use std::path::PathBuf;

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, path: Option<PathBuf>) -> CarryallResult<()> {
    let manager = match path {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };

    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
    }

    Ok(())
}

fn show_config(config: &Config) -> CarryallResult<()> {
    let toml = toml::to_string_pretty(config)?;
    println!("{}", toml);
    Ok(())
}
