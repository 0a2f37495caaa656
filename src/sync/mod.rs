//! Save, restore and maintain an archive directory
//!
//! The engine drives the ledger, the artifact codec and the archive code
//! through three collaborators it does not implement itself: a container
//! runtime ([`ImageRuntime`]), version control ([`VersionControl`]) and a
//! transfer client ([`Transfer`]). Every operation takes them as trait
//! objects so tests can swap in fakes.
//!
//! # Ledger discipline
//!
//! Artifacts of different kinds are fetched concurrently during save, but a
//! ledger is single-writer. It lives behind a `tokio::sync::Mutex` and the
//! lock is only taken around the check, keep and update steps, never while a
//! pull or download is in flight.

pub mod binary;
mod clean;
mod image_vars;
pub mod meta;
mod publish;
mod restore;
mod save;
mod web;

pub use binary::{host_platform, ToolRelease, TOOL_BINARY_NAME};
pub use clean::clean;
pub use image_vars::{image_var_exports, resolve_image_vars};
pub use publish::{publish, PublishReport, PublishRequest, PublishedImage};
pub use restore::{restore, RestoreManifest, RestoreReport, RestoreRequest};
pub use save::{save, SaveReport, SaveRequest};
pub use web::{parse_web_files, WebFile};

use crate::error::{CarryallError, CarryallResult};
use crate::orchestration::ImageRuntime;
use crate::transfer::Transfer;
use crate::vcs::VersionControl;
use std::fs;
use std::path::Path;

/// External collaborators an operation may call into
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Absent when no container runtime is installed; only needed when
    /// there are images to handle
    pub runtime: Option<&'a dyn ImageRuntime>,
    pub vcs: &'a dyn VersionControl,
    /// Only needed for downloads; restore runs without one
    pub transfer: Option<&'a dyn Transfer>,
}

impl<'a> Collaborators<'a> {
    fn runtime(&self) -> CarryallResult<&'a dyn ImageRuntime> {
        self.runtime
            .ok_or_else(|| CarryallError::RuntimeNotFound("docker or podman".to_string()))
    }

    fn transfer(&self) -> CarryallResult<&'a dyn Transfer> {
        self.transfer
            .ok_or_else(|| CarryallError::Internal("no transfer client for downloads".to_string()))
    }
}

/// Move a file, falling back to copy and delete across filesystems
pub(crate) fn move_file(from: &Path, to: &Path) -> CarryallResult<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| {
        CarryallError::io(format!("copying {} to {}", from.display(), to.display()), e)
    })?;
    fs::remove_file(from)
        .map_err(|e| CarryallError::io(format!("removing {}", from.display()), e))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::orchestration::RegistryCredentials;
    use async_trait::async_trait;
    use sha2::{Digest, Sha256};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Serves canned bodies by URL and counts requests
    #[derive(Default)]
    pub(crate) struct FakeTransfer {
        bodies: HashMap<String, Vec<u8>>,
        calls: AtomicUsize,
    }

    impl FakeTransfer {
        pub(crate) fn serve(mut self, url: &str, body: Vec<u8>) -> Self {
            self.bodies.insert(url.to_string(), body);
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transfer for FakeTransfer {
        async fn fetch(&self, url: &str, dest: &Path, executable: bool) -> CarryallResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = self.bodies.get(url).ok_or_else(|| CarryallError::Download {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })?;
            fs::write(dest, body).unwrap();
            if executable {
                crate::transfer::make_executable(dest)?;
            }
            Ok(())
        }
    }

    /// In-memory container runtime
    ///
    /// Pulled images are written as `image:<reference>`; loading returns a
    /// fixed image ID and pushes report the digest configured for the
    /// target name.
    #[derive(Default)]
    pub(crate) struct FakeRuntime {
        pub(crate) fetches: AtomicUsize,
        pub(crate) image_id: String,
        pub(crate) push_digests: HashMap<String, String>,
        pub(crate) repo_digests: Vec<String>,
        pub(crate) tags: Mutex<Vec<(String, String)>>,
        pub(crate) pushed: Mutex<Vec<String>>,
        pub(crate) logins: Mutex<Vec<String>>,
    }

    impl FakeRuntime {
        pub(crate) fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageRuntime for FakeRuntime {
        async fn fetch(&self, reference: &str, dest: &Path) -> CarryallResult<()> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            fs::write(dest, format!("image:{reference}")).unwrap();
            Ok(())
        }

        async fn load(&self, archive: &Path) -> CarryallResult<String> {
            assert!(archive.is_file());
            Ok(self.image_id.clone())
        }

        async fn tag(&self, source: &str, target: &str) -> CarryallResult<()> {
            self.tags
                .lock()
                .unwrap()
                .push((source.to_string(), target.to_string()));
            Ok(())
        }

        async fn push(&self, reference: &str) -> CarryallResult<Option<String>> {
            self.pushed.lock().unwrap().push(reference.to_string());
            Ok(self.push_digests.get(reference).cloned())
        }

        async fn inspect_digests(&self, _image: &str) -> CarryallResult<Vec<String>> {
            Ok(self.repo_digests.clone())
        }

        async fn login(&self, registry: &str, _credentials: &RegistryCredentials) -> CarryallResult<()> {
            self.logins.lock().unwrap().push(registry.to_string());
            Ok(())
        }

        fn runtime_name(&self) -> &'static str {
            "fake"
        }
    }

    #[test]
    fn move_file_replaces_destination() {
        let temp = tempfile::TempDir::new().unwrap();
        let from = temp.path().join("a");
        let to: PathBuf = temp.path().join("b");
        fs::write(&from, "new").unwrap();
        fs::write(&to, "old").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "new");
    }

    #[test]
    fn missing_runtime_is_reported() {
        let collab = Collaborators {
            runtime: None,
            vcs: &crate::vcs::GitVcs,
            transfer: None,
        };
        assert!(matches!(
            collab.runtime(),
            Err(CarryallError::RuntimeNotFound(_))
        ));
        assert!(matches!(collab.transfer(), Err(CarryallError::Internal(_))));
    }
}
