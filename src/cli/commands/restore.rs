//! Restore command - unpack an archive directory at the destination

use super::{current_dir, display_name};
use crate::cli::args::RestoreArgs;
use crate::config::Config;
use crate::error::CarryallResult;
use crate::sync::{self, Collaborators, RestoreRequest};
use crate::ui::{self, ArtifactStatus, UiContext};
use crate::vcs::GitVcs;

/// Execute the restore command
pub async fn execute(args: RestoreArgs, _config: &Config) -> CarryallResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "carryall restore");

    let request = RestoreRequest {
        source_dir: args.source_dir,
        dest_dir: match args.dest_dir {
            Some(dir) => dir,
            None => current_dir()?,
        },
    };

    let vcs = GitVcs::new();
    let collab = Collaborators {
        runtime: None,
        vcs: &vcs,
        transfer: None,
    };

    let report = sync::restore(&request, collab)?;

    if let Some(tree) = &report.tree {
        let action = if tree.refreshed { "Refreshed" } else { "Restored" };
        ui::step_ok(
            &ctx,
            &format!(
                "{} {} ({} files)",
                action,
                report.tree_root.display(),
                tree.summary.files
            ),
        );
        for path in &tree.relocated {
            ui::artifact(&ctx, ArtifactStatus::KeptLocal, &path.display().to_string(), None);
        }
    }

    let manifest = &report.manifest;
    for path in &manifest.present {
        ui::artifact(&ctx, ArtifactStatus::Restored, &display_name(path), None);
    }
    for path in &manifest.recoverable {
        ui::artifact(&ctx, ArtifactStatus::InPlace, &display_name(path), None);
    }

    ui::outro_success(
        &ctx,
        &format!(
            "{} in {}",
            ui::tally(&[
                (ArtifactStatus::Restored, manifest.present.len()),
                (ArtifactStatus::InPlace, manifest.recoverable.len()),
            ]),
            report.archive_dir.display()
        ),
    );
    Ok(())
}
