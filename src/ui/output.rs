//! Command output: banners, steps and per-artifact status lines

use super::context::UiContext;
use console::style;
use std::fmt;

/// What a command did with one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// Fetched or rebuilt into the archive directory
    Saved,
    /// Checksum matched, nothing fetched
    Unchanged,
    /// Swept because it was not requested again
    Removed,
    /// Moved to the destination and verified
    Restored,
    /// Already at the destination with a matching checksum
    InPlace,
    /// Kept from the previous tree across a refresh
    KeptLocal,
    /// Pushed to the target registry
    Published,
}

impl ArtifactStatus {
    /// Lowercase word used in summaries
    pub fn label(self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::Unchanged => "unchanged",
            Self::Removed => "removed",
            Self::Restored => "restored",
            Self::InPlace => "already in place",
            Self::KeptLocal => "kept local",
            Self::Published => "published",
        }
    }

    fn is_change(self) -> bool {
        matches!(self, Self::Saved | Self::Restored | Self::Published)
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary line such as `2 saved, 1 unchanged, 0 removed`
pub fn tally(counts: &[(ArtifactStatus, usize)]) -> String {
    counts
        .iter()
        .map(|(status, n)| format!("{} {}", n, status))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Report one artifact
pub fn artifact(ctx: &UiContext, status: ArtifactStatus, name: &str, detail: Option<&str>) {
    let line = match detail {
        Some(detail) => format!("{} ({})", name, detail),
        None => name.to_string(),
    };

    if ctx.use_fancy_output() {
        let line = format!("{} {}", line, style(status).dim());
        if status.is_change() {
            cliclack::log::success(line).ok();
        } else if status == ArtifactStatus::Removed {
            cliclack::log::info(line).ok();
        } else {
            cliclack::log::remark(line).ok();
        }
    } else {
        let tag = format!("[{}]", status.label().to_uppercase().replace(' ', "-"));
        let tag = if status.is_change() {
            style(tag).green()
        } else {
            style(tag).dim()
        };
        println!("  {} {}", tag, line);
    }
}

pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}", style(title).cyan().bold());
    }
}

pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!("{} {}", style("[OK]").green(), message);
    }
}

pub fn outro_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).yellow().bold()).ok();
    } else {
        println!("{} {}", style("[WARN]").yellow(), message);
    }
}

/// Header before a group of artifact lines
pub fn section(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::step(style(title).bold()).ok();
    } else {
        println!();
        println!("{}", style(title).bold());
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(message).ok();
    } else {
        println!("  {} {}", style("[OK]").green(), message);
    }
}

pub fn step_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(message).ok();
    } else {
        println!("  {} {}", style("[WARN]").yellow(), message);
    }
}

pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(message).ok();
    } else {
        println!("  {} {}", style("[INFO]").cyan(), message);
    }
}

/// Dimmed line, used for file listings
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}
