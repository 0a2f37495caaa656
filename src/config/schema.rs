//! Configuration schema for Carryall
//!
//! Configuration is stored at `~/.config/carryall/config.toml`, optionally
//! overlaid by a project-local `.carryall.toml`.

use crate::orchestration::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default archive directory, relative to the working directory
pub const DEFAULT_ARCHIVE_DIR: &str = "downloads";

/// Default platform the saved tool binary is fetched for
pub const DEFAULT_TARGET_PLATFORM: &str = "linux_amd64";

/// Where release binaries are published
pub const DEFAULT_RELEASE_URL: &str = "https://github.com/carryall/carryall/releases/download";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Archive directory settings
    pub archive: ArchiveConfig,

    /// Container runtime settings
    pub runtime: RuntimeConfig,

    /// Release download settings
    pub release: ReleaseConfig,

    /// Artifacts captured by `save`
    pub save: SaveConfig,

    /// Publishing settings
    pub publish: PublishConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Archive directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory artifacts are saved to and published from
    pub dir: PathBuf,

    /// Platform (`<os>_<arch>`) of the tool binary stored with the artifacts
    pub target_platform: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_ARCHIVE_DIR),
            target_platform: DEFAULT_TARGET_PLATFORM.to_string(),
        }
    }
}

/// Container runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Engine to drive; detected from PATH when unset
    pub engine: Option<Engine>,
}

/// Release download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Base URL; binaries live at `<base_url>/<version>/carryall_<platform>`
    pub base_url: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RELEASE_URL.to_string(),
        }
    }
}

/// Artifacts to capture
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Container image references
    pub images: Vec<String>,

    /// Local repository paths
    pub repos: Vec<PathBuf>,

    /// Web files as `url,filename,sha256[,true|false]`
    pub web_files: Vec<String>,

    /// Environment variables holding further image references
    pub image_vars: Vec<String>,
}

/// Publishing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Registry images are re-published to
    pub registry: Option<String>,
}
