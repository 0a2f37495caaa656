//! Confirmation prompt with CI/non-interactive fallback

use super::context::UiContext;
use crate::error::{CarryallError, CarryallResult};

/// Ask for confirmation, returning `default` without asking when the
/// terminal is not interactive
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> CarryallResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }

    if !ctx.is_interactive() {
        return Ok(default);
    }

    // cliclack blocks on terminal input
    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| CarryallError::User(format!("Prompt task failed: {}", e)))?
    .map_err(|e| CarryallError::User(format!("Prompt failed: {}", e)))
}
