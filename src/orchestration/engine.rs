//! Image runtime backed by the docker or podman command line
//!
//! Both CLIs accept the same `pull`, `save`, `load`, `tag`, `push` and
//! `image inspect` invocations, so a single implementation drives either.

use super::factory::Engine;
use super::runtime::{ImageRuntime, RegistryCredentials};
use super::{find_sha256, output_tail};
use crate::error::{CarryallError, CarryallResult};
use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Container runtime driven through its CLI
pub struct CliRuntime {
    engine: Engine,
}

impl CliRuntime {
    /// Create a runtime for the given engine
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Check if the engine binary is installed
    pub async fn is_installed(engine: Engine) -> bool {
        Command::new(engine.binary())
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Execute an engine command and return the output
    async fn exec(&self, args: &[&str]) -> CarryallResult<Output> {
        let binary = self.engine.binary();
        debug!("Executing: {} {:?}", binary, args);

        Command::new(binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CarryallError::RuntimeNotFound(binary.to_string())
                } else {
                    CarryallError::command_failed(format!("{} {:?}", binary, args), e)
                }
            })
    }

    /// Execute and fail with the combined output tail on a non-zero exit
    async fn exec_ok(&self, args: &[&str]) -> CarryallResult<Output> {
        let output = self.exec(args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(CarryallError::command_exec(
                format!("{} {}", self.engine.binary(), args.join(" ")),
                failure_text(&output),
            ))
        }
    }
}

fn failure_text(output: &Output) -> String {
    output_tail(
        &String::from_utf8_lossy(&output.stdout),
        &String::from_utf8_lossy(&output.stderr),
    )
}

#[async_trait]
impl ImageRuntime for CliRuntime {
    async fn fetch(&self, reference: &str, dest: &Path) -> CarryallResult<()> {
        info!("Pulling image: {}", reference);
        let pulled = self.exec(&["pull", reference]).await?;
        if !pulled.status.success() {
            return Err(CarryallError::ImagePull {
                image: reference.to_string(),
                reason: failure_text(&pulled),
            });
        }

        let dest_str = dest.to_string_lossy();
        debug!("Saving {} to {}", reference, dest_str);
        let saved = self.exec(&["save", "-o", &dest_str, reference]).await?;
        if !saved.status.success() {
            return Err(CarryallError::ImagePull {
                image: reference.to_string(),
                reason: format!("saving archive: {}", failure_text(&saved)),
            });
        }
        Ok(())
    }

    async fn load(&self, archive: &Path) -> CarryallResult<String> {
        let archive_str = archive.to_string_lossy();
        let output = self.exec(&["load", "-i", &archive_str]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            return Err(CarryallError::ImageLoad {
                path: archive.to_path_buf(),
                reason: failure_text(&output),
            });
        }

        parse_loaded(&stdout).ok_or_else(|| CarryallError::ImageLoad {
            path: archive.to_path_buf(),
            reason: format!("unrecognised load output: {}", stdout.trim()),
        })
    }

    async fn tag(&self, source: &str, target: &str) -> CarryallResult<()> {
        debug!("Tagging {} as {}", source, target);
        self.exec_ok(&["tag", source, target]).await?;
        Ok(())
    }

    async fn push(&self, reference: &str) -> CarryallResult<Option<String>> {
        info!("Pushing image: {}", reference);
        let output = self.exec(&["push", reference]).await?;
        if !output.status.success() {
            return Err(CarryallError::ImagePush {
                image: reference.to_string(),
                reason: failure_text(&output),
            });
        }

        let combined = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(combined
            .lines()
            .filter(|line| line.contains("digest:"))
            .find_map(find_sha256))
    }

    async fn inspect_digests(&self, image: &str) -> CarryallResult<Vec<String>> {
        let output = self
            .exec_ok(&["image", "inspect", "--format", "{{json .RepoDigests}}", image])
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let digests: Option<Vec<String>> = serde_json::from_str(stdout.trim())?;
        Ok(digests.unwrap_or_default())
    }

    async fn login(&self, registry: &str, credentials: &RegistryCredentials) -> CarryallResult<()> {
        let binary = self.engine.binary();
        info!("Logging in to {} as {}", registry, credentials.username);

        let mut child = Command::new(binary)
            .args([
                "login",
                "--username",
                &credentials.username,
                "--password-stdin",
                registry,
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CarryallError::command_failed(format!("{} login", binary), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(credentials.password.as_bytes())
                .await
                .map_err(|e| CarryallError::io("writing registry password", e))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CarryallError::command_failed(format!("{} login", binary), e))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(CarryallError::command_exec(
                format!("{} login {}", binary, registry),
                failure_text(&output),
            ))
        }
    }

    fn runtime_name(&self) -> &'static str {
        self.engine.binary()
    }
}

/// Pick the loaded image out of `load` output
///
/// Untagged images are reported by ID (`Loaded image ID: sha256:...`, or a
/// bare `sha256:...` from podman); tagged ones by reference.
fn parse_loaded(stdout: &str) -> Option<String> {
    if let Some(id) = stdout.lines().find_map(find_sha256) {
        return Some(id);
    }
    stdout.lines().find_map(|line| {
        let (_, rest) = line.split_once("Loaded image")?;
        let name = rest.trim_start_matches(['(', 's', ')', ':']).trim();
        name.split(',').next().map(str::trim).filter(|n| !n.is_empty()).map(String::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "sha256:7e01a0d0a1dcd9e539f8e9bbd80106d59efbf9fa4a8cba3ae7a4ea9e7d4b3b10";

    #[test]
    fn parse_loaded_image_id() {
        assert_eq!(parse_loaded(&format!("Loaded image ID: {ID}\n")), Some(ID.to_string()));
        assert_eq!(parse_loaded(&format!("Loaded image: {ID}\n")), Some(ID.to_string()));
    }

    #[test]
    fn parse_loaded_reference() {
        assert_eq!(
            parse_loaded("Loaded image: dns.registry/busybox:1.31-musl\n").as_deref(),
            Some("dns.registry/busybox:1.31-musl")
        );
        assert_eq!(
            parse_loaded("Loaded image(s): localhost/app:dev\n").as_deref(),
            Some("localhost/app:dev")
        );
        assert_eq!(parse_loaded("nothing useful"), None);
    }

    #[test]
    fn runtime_name_follows_engine() {
        assert_eq!(CliRuntime::new(Engine::Podman).runtime_name(), "podman");
        assert_eq!(CliRuntime::new(Engine::Docker).runtime_name(), "docker");
    }
}
