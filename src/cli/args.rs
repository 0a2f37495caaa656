//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Carryall - carry build artifacts into air-gapped environments
///
/// Saves container images, git repositories and downloads into one
/// checksummed directory, and restores them on the other side.
#[derive(Parser, Debug)]
#[command(name = "carryall")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CARRYALL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .carryall.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Log format: text or json (overrides general.log_format)
    #[arg(long, global = true, env = "CARRYALL_LOG_FORMAT")]
    pub log_format: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture images, repositories and downloads into the archive directory
    Save(SaveArgs),

    /// Restore an archive directory into a destination
    Restore(RestoreArgs),

    /// Load saved images and push them to a registry
    Publish(PublishArgs),

    /// Delete files the ledger does not record
    Clean(CleanArgs),

    /// Print shell exports pointing image variables at a registry
    ImageVars(ImageVarsArgs),

    /// Show configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the save command
#[derive(Parser, Debug)]
pub struct SaveArgs {
    /// Archive directory (default: archive.dir)
    #[arg(short, long, env = "CARRYALL_DIR")]
    pub dir: Option<PathBuf>,

    /// Container images to save (comma-separated)
    #[arg(short, long, value_delimiter = ',', env = "CARRYALL_IMAGES")]
    pub images: Vec<String>,

    /// Git repositories to archive, besides the current one (comma-separated)
    #[arg(short, long, value_delimiter = ',', env = "CARRYALL_REPOS")]
    pub repos: Vec<PathBuf>,

    /// Files to download, as url,filename,sha256[,true] (whitespace-separated)
    #[arg(short, long, env = "CARRYALL_WEB_FILES")]
    pub web_files: Vec<String>,

    /// Environment variables holding image references (comma-separated)
    #[arg(long, value_delimiter = ',', env = "CARRYALL_IMAGE_VARS")]
    pub image_vars: Vec<String>,

    /// Platform of the carryall binary to include, as <os>_<arch>
    #[arg(long, env = "CARRYALL_TARGET_PLATFORM")]
    pub target_platform: Option<String>,

    /// Do not archive the git repository of the current directory
    #[arg(long)]
    pub no_home: bool,

    /// Do not include the carryall binary
    #[arg(long)]
    pub no_binary: bool,
}

/// Arguments for the restore command
#[derive(Parser, Debug)]
pub struct RestoreArgs {
    /// Directory holding the saved artifacts
    #[arg(short, long, env = "CARRYALL_SOURCE_DIR")]
    pub source_dir: PathBuf,

    /// Directory to restore into (defaults to current directory)
    #[arg(short, long, env = "CARRYALL_DEST_DIR")]
    pub dest_dir: Option<PathBuf>,
}

/// Arguments for the publish command
#[derive(Parser, Debug)]
pub struct PublishArgs {
    /// Archive directory (default: archive.dir)
    #[arg(short, long, env = "CARRYALL_DIR")]
    pub dir: Option<PathBuf>,

    /// Registry to push to (default: publish.registry)
    #[arg(long, env = "CARRYALL_REGISTRY")]
    pub registry: Option<String>,

    /// Registry user name
    #[arg(long, env = "CARRYALL_REGISTRY_USERNAME", requires = "password")]
    pub username: Option<String>,

    /// Registry password
    #[arg(long, env = "CARRYALL_REGISTRY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Arguments for the clean command
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Archive directory (default: archive.dir)
    #[arg(short, long, env = "CARRYALL_DIR")]
    pub dir: Option<PathBuf>,

    /// Dry run - show what would be removed
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the image-vars command
#[derive(Parser, Debug)]
pub struct ImageVarsArgs {
    /// Environment variables holding image references (default: save.image_vars)
    #[arg(value_delimiter = ',')]
    pub vars: Vec<String>,

    /// Registry the images were published to (default: publish.registry)
    #[arg(long, env = "CARRYALL_REGISTRY")]
    pub registry: Option<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_save() {
        let cli = Cli::parse_from([
            "carryall",
            "save",
            "--images",
            "alpine:3.19,nginx",
            "--dir",
            "out",
            "--no-binary",
        ]);
        match cli.command {
            Commands::Save(args) => {
                assert_eq!(args.images, vec!["alpine:3.19", "nginx"]);
                assert_eq!(args.dir, Some(PathBuf::from("out")));
                assert!(args.no_binary);
                assert!(!args.no_home);
            }
            _ => panic!("expected Save command"),
        }
    }

    #[test]
    fn cli_parses_restore() {
        let cli = Cli::parse_from(["carryall", "restore", "-s", "/media/usb"]);
        match cli.command {
            Commands::Restore(args) => {
                assert_eq!(args.source_dir, PathBuf::from("/media/usb"));
                assert!(args.dest_dir.is_none());
            }
            _ => panic!("expected Restore command"),
        }
    }

    #[test]
    fn cli_parses_clean() {
        let cli = Cli::parse_from(["carryall", "clean", "--dry-run"]);
        match cli.command {
            Commands::Clean(args) => {
                assert!(args.dry_run);
                assert!(!args.yes);
            }
            _ => panic!("expected Clean command"),
        }
    }

    #[test]
    fn cli_parses_image_vars() {
        let cli = Cli::parse_from([
            "carryall",
            "image-vars",
            "API_IMAGE,DB_IMAGE",
            "--registry",
            "registry.local",
        ]);
        match cli.command {
            Commands::ImageVars(args) => {
                assert_eq!(args.vars, vec!["API_IMAGE", "DB_IMAGE"]);
                assert_eq!(args.registry.as_deref(), Some("registry.local"));
            }
            _ => panic!("expected ImageVars command"),
        }
    }

    #[test]
    fn username_requires_password() {
        let result = Cli::try_parse_from(["carryall", "publish", "--username", "ci"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_verbose_count() {
        let cli = Cli::parse_from(["carryall", "-vv", "config", "path"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Config(args) => assert!(matches!(args.action, Some(ConfigAction::Path))),
            _ => panic!("expected Config command"),
        }
    }
}
