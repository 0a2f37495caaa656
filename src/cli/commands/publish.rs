//! Publish command - push saved images to a registry

use super::optional_runtime;
use crate::cli::args::PublishArgs;
use crate::config::Config;
use crate::error::CarryallResult;
use crate::orchestration::RegistryCredentials;
use crate::sync::{self, Collaborators, PublishRequest};
use crate::ui::{self, ArtifactStatus, TaskSpinner, UiContext};
use crate::vcs::GitVcs;

/// Execute the publish command
pub async fn execute(args: PublishArgs, config: &Config) -> CarryallResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "carryall publish");

    let credentials = match (args.username, args.password) {
        (Some(username), Some(password)) => Some(RegistryCredentials { username, password }),
        _ => None,
    };
    let request = PublishRequest {
        source_dir: args.dir.unwrap_or_else(|| config.archive.dir.clone()),
        registry: args.registry.or_else(|| config.publish.registry.clone()),
        credentials,
    };

    let runtime = optional_runtime(config).await;
    let vcs = GitVcs::new();
    let collab = Collaborators {
        runtime: runtime.as_deref(),
        vcs: &vcs,
        transfer: None,
    };

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Publishing images...");
    let report = match sync::publish(&request, collab).await {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Publishing failed");
            return Err(e);
        }
    };
    spinner.stop(&format!("Published {} image(s)", report.images.len()));

    for image in &report.images {
        let detail = match &image.digest {
            Some(digest) => format!("{} verified", digest),
            None => image.reference.clone(),
        };
        ui::artifact(&ctx, ArtifactStatus::Published, &image.target, Some(&detail));
    }

    if report.images.is_empty() {
        ui::outro_warn(&ctx, "No images to publish");
    } else {
        ui::outro_success(&ctx, "All images pushed");
    }
    Ok(())
}
