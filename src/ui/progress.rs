//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    /// Create a new spinner (shows on `start` in interactive mode)
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else {
            println!("{} {}", style("[FAIL]").red(), message);
        }
    }
}

/// Byte progress for a single download
///
/// Draws an indicatif bar when progress is enabled and prints one line per
/// download otherwise. Cloneable so it can move into a blocking task.
#[derive(Clone)]
pub struct DownloadProgress {
    bar: Option<ProgressBar>,
    label: String,
}

impl DownloadProgress {
    pub fn new(ctx: &UiContext, label: &str) -> Self {
        let bar = ctx.show_progress().then(|| {
            let bar = ProgressBar::new(0);
            if let Ok(template) = ProgressStyle::default_bar().template(
                "  {spinner:.cyan} {prefix}  {bar:24.cyan/dim} {bytes}/{total_bytes} {bytes_per_sec:.dim}",
            ) {
                bar.set_style(template.progress_chars("━╸─"));
            }
            bar.set_prefix(label.to_string());
            bar
        });
        Self {
            bar,
            label: label.to_string(),
        }
    }

    /// Begin reporting, `already` bytes in (resumed) out of `total` if known
    pub fn start(&self, already: u64, total: Option<u64>) {
        match &self.bar {
            Some(bar) => {
                if let Some(total) = total {
                    bar.set_length(total);
                }
                bar.set_position(already);
            }
            None if already > 0 => {
                println!("  Resuming {} at {} bytes", self.label, already)
            }
            None => println!("  Downloading {}", self.label),
        }
    }

    pub fn advance(&self, bytes: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(bytes);
        }
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
