//! Clean command - remove files the ledger does not record

use super::display_name;
use crate::cli::args::CleanArgs;
use crate::config::Config;
use crate::error::CarryallResult;
use crate::sync;
use crate::ui::{self, UiContext};

/// Execute the clean command
pub async fn execute(args: CleanArgs, config: &Config) -> CarryallResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let dir = args.dir.unwrap_or_else(|| config.archive.dir.clone());

    let candidates = sync::clean(&dir, true)?;
    if candidates.is_empty() {
        ui::step_ok(&ctx, &format!("Nothing to clean in {}", dir.display()));
        return Ok(());
    }

    for path in &candidates {
        ui::remark(&ctx, &display_name(path));
    }
    if args.dry_run {
        ui::step_info(
            &ctx,
            &format!("Would remove {} item(s) (dry run)", candidates.len()),
        );
        return Ok(());
    }

    let message = format!("Remove {} item(s) from {}?", candidates.len(), dir.display());
    if !ui::confirm(&ctx, &message, false).await? {
        ui::step_warn(&ctx, "Nothing removed (pass --yes to skip this prompt)");
        return Ok(());
    }

    let removed = sync::clean(&dir, false)?;
    ui::step_ok(&ctx, &format!("Removed {} item(s)", removed.len()));
    Ok(())
}
