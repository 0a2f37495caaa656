//! Carryall - artifact cache and synchronization for air-gapped environments
//!
//! CLI entry point that dispatches to subcommands.

use carryall::cli::{Cli, Commands};
use carryall::config::{Config, ConfigManager};
use carryall::error::{CarryallError, CarryallResult};
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CarryallResult<()> {
    let cli = Cli::parse();

    // Completions don't need config loading
    if let Commands::Completions(args) = cli.command {
        return carryall::cli::commands::completions(args);
    }

    let config = load_config(&cli).await?;
    init_logging(
        cli.verbose,
        cli.log_format.as_deref().unwrap_or(&config.general.log_format),
    );
    debug!("Configuration loaded");

    // Dispatch to command
    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::Save(args) => carryall::cli::commands::save(args, &config).await,
        Commands::Restore(args) => carryall::cli::commands::restore(args, &config).await,
        Commands::Publish(args) => carryall::cli::commands::publish(args, &config).await,
        Commands::Clean(args) => carryall::cli::commands::clean(args, &config).await,
        Commands::ImageVars(args) => carryall::cli::commands::image_vars(args, &config).await,
        Commands::Config(args) => carryall::cli::commands::config(args, &config, cli.config).await,
    }
}

async fn load_config(cli: &Cli) -> CarryallResult<Config> {
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| CarryallError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    config_manager
        .load_merged(local_config_path.as_deref())
        .await
}

/// 0 = warn (spinners only), 1 = info, 2+ = debug
fn init_logging(verbose: u8, format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("carryall=warn"),
        1 => EnvFilter::new("carryall=info"),
        _ => EnvFilter::new("carryall=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
