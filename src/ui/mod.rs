//! UI module for consistent CLI output
//!
//! Uses `cliclack` for interactive terminals with automatic fallback to
//! plain `[OK]`/`[WARN]` lines in CI and other non-interactive environments.
//!
//! # Example
//!
//! ```rust,ignore
//! use carryall::ui::{self, ArtifactStatus, UiContext};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "carryall save");
//! ui::artifact(&ctx, ArtifactStatus::Unchanged, "alpine~~3.19.docker.tar", None);
//! ui::outro_success(&ctx, &ui::tally(&[(ArtifactStatus::Unchanged, 1)]));
//! ```

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    artifact, intro, outro_success, outro_warn, remark, section, step_info, step_ok, step_warn,
    tally, ArtifactStatus,
};
pub use progress::{DownloadProgress, TaskSpinner};
pub use prompts::confirm;
