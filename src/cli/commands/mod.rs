//! CLI command implementations

pub mod clean;
pub mod completions;
pub mod config;
pub mod image_vars;
pub mod publish;
pub mod restore;
pub mod save;

pub use clean::execute as clean;
pub use completions::execute as completions;
pub use config::execute as config;
pub use image_vars::execute as image_vars;
pub use publish::execute as publish;
pub use restore::execute as restore;
pub use save::execute as save;

use crate::config::Config;
use crate::error::{CarryallError, CarryallResult};
use crate::orchestration::{create_runtime, ImageRuntime};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Container runtime if one is available
///
/// Operations that need it report its absence themselves.
async fn optional_runtime(config: &Config) -> Option<Box<dyn ImageRuntime>> {
    match create_runtime(config).await {
        Ok(runtime) => Some(runtime),
        Err(e) => {
            debug!("No container runtime: {}", e);
            None
        }
    }
}

fn current_dir() -> CarryallResult<PathBuf> {
    std::env::current_dir().map_err(|e| CarryallError::io("getting current directory", e))
}

/// Command-line list if given, configured list otherwise
fn or_configured<T: Clone>(given: Vec<T>, configured: &[T]) -> Vec<T> {
    if given.is_empty() {
        configured.to_vec()
    } else {
        given
    }
}

/// File name for display, falling back to the full path
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_list_wins() {
        let configured = vec!["alpine".to_string()];
        assert_eq!(or_configured(vec![], &configured), configured);
        assert_eq!(
            or_configured(vec!["nginx".to_string()], &configured),
            vec!["nginx".to_string()]
        );
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name(Path::new("/a/b/kubectl")), "kubectl");
        assert_eq!(display_name(Path::new("/")), "/");
    }
}
