//! Runtime factory for creating the configured container runtime

use crate::config::Config;
use crate::error::{CarryallError, CarryallResult};
use crate::orchestration::engine::CliRuntime;
use crate::orchestration::runtime::ImageRuntime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Supported container engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Docker,
    Podman,
}

impl Engine {
    /// Name of the engine's CLI binary
    pub fn binary(&self) -> &'static str {
        match self {
            Engine::Docker => "docker",
            Engine::Podman => "podman",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.binary())
    }
}

impl FromStr for Engine {
    type Err = CarryallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(Engine::Docker),
            "podman" => Ok(Engine::Podman),
            other => Err(CarryallError::RuntimeNotFound(other.to_string())),
        }
    }
}

/// Find an installed engine, preferring docker
pub async fn detect_engine() -> CarryallResult<Engine> {
    for engine in [Engine::Docker, Engine::Podman] {
        if CliRuntime::is_installed(engine).await {
            debug!("Detected container engine: {}", engine);
            return Ok(engine);
        }
    }
    Err(CarryallError::RuntimeNotFound("docker or podman".to_string()))
}

/// Create the container runtime named in the configuration
///
/// Without a configured engine, the first installed one is used.
pub async fn create_runtime(config: &Config) -> CarryallResult<Box<dyn ImageRuntime>> {
    let engine = match config.runtime.engine {
        Some(engine) => engine,
        None => detect_engine().await?,
    };
    Ok(Box::new(CliRuntime::new(engine)))
}
