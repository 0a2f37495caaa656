//! Save command - capture artifacts into the archive directory

use super::{current_dir, display_name, optional_runtime, or_configured};
use crate::cli::args::SaveArgs;
use crate::config::Config;
use crate::error::CarryallResult;
use crate::sync::{self, parse_web_files, resolve_image_vars, Collaborators, SaveRequest, ToolRelease};
use crate::transfer::HttpTransfer;
use crate::ui::{self, ArtifactStatus, UiContext};
use crate::vcs::GitVcs;
use std::fs;

/// Execute the save command
pub async fn execute(args: SaveArgs, config: &Config) -> CarryallResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "carryall save");

    let cwd = current_dir()?;
    let archive_dir = args.dir.unwrap_or_else(|| config.archive.dir.clone());

    let mut images = or_configured(args.images, &config.save.images);
    let image_vars = or_configured(args.image_vars, &config.save.image_vars);
    images.extend(resolve_image_vars(&image_vars, |name| std::env::var(name).ok())?);

    let web_files = parse_web_files(&or_configured(args.web_files, &config.save.web_files))?;

    let mut repos = or_configured(args.repos, &config.save.repos);
    let home = if args.no_home {
        None
    } else {
        GitVcs::discover_root(&cwd)
    };
    if let Some(home) = &home {
        let known = repos
            .iter()
            .any(|r| fs::canonicalize(r).ok() == fs::canonicalize(home).ok());
        if !known {
            repos.insert(0, home.clone());
        }
    }

    let tool = (!args.no_binary).then(|| ToolRelease {
        platform: args
            .target_platform
            .unwrap_or_else(|| config.archive.target_platform.clone()),
        base_url: config.release.base_url.clone(),
        version: format!("v{}", env!("CARGO_PKG_VERSION")),
    });

    let request = SaveRequest {
        archive_dir,
        images,
        repos,
        web_files,
        home,
        tool,
    };

    let runtime = if request.images.is_empty() {
        None
    } else {
        optional_runtime(config).await
    };
    let transfer = HttpTransfer::new(ctx.clone());
    let vcs = GitVcs::new();
    let collab = Collaborators {
        runtime: runtime.as_deref(),
        vcs: &vcs,
        transfer: Some(&transfer),
    };

    ui::section(&ctx, &format!("Saving into {}", request.archive_dir.display()));
    let report = sync::save(&request, collab).await?;

    let groups = [
        (ArtifactStatus::Saved, &report.fetched),
        (ArtifactStatus::Unchanged, &report.cached),
        (ArtifactStatus::Removed, &report.removed),
    ];
    for (status, paths) in groups {
        for path in paths {
            ui::artifact(&ctx, status, &display_name(path), None);
        }
    }

    let counts: Vec<_> = groups.iter().map(|(status, paths)| (*status, paths.len())).collect();
    ui::outro_success(&ctx, &ui::tally(&counts));
    Ok(())
}
