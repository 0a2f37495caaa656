//! Orchestration module for container runtimes
//!
//! Provides the image operations used by save and publish:
//! - `ImageRuntime` trait consumed by the sync engine
//! - `CliRuntime` driving docker or podman

mod engine;
mod factory;
mod runtime;

pub use engine::CliRuntime;
pub use factory::{create_runtime, detect_engine, Engine};
pub use runtime::{ImageRuntime, RegistryCredentials};

/// Max number of output lines to include in command error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of command output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn output_tail(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}

/// First `sha256:<64 hex>` token in `text`
pub(crate) fn find_sha256(text: &str) -> Option<String> {
    const PREFIX: &str = "sha256:";
    let mut rest = text;
    while let Some(pos) = rest.find(PREFIX) {
        let candidate = &rest[pos + PREFIX.len()..];
        let hex: String = candidate
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        if hex.len() == 64 {
            return Some(format!("{}{}", PREFIX, hex.to_ascii_lowercase()));
        }
        rest = candidate;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_tail_under_limit() {
        assert_eq!(output_tail("a\nb", "c"), "a\nb\nc");
    }

    #[test]
    fn output_tail_truncates() {
        let stdout: String = (0..80).map(|i| format!("line {}\n", i)).collect();
        let tail = output_tail(&stdout, "");
        assert_eq!(tail.lines().count(), ERROR_TAIL_LINES);
        assert!(tail.ends_with("line 79"));
    }

    #[test]
    fn find_sha256_in_push_output() {
        let hex = "a".repeat(64);
        let line = format!("1.31-musl: digest: sha256:{} size: 527", hex);
        assert_eq!(find_sha256(&line), Some(format!("sha256:{}", hex)));
        assert_eq!(find_sha256("sha256:abc sha256:"), None);
    }
}
