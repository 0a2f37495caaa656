//! Container runtime abstraction
//!
//! Save and publish only need a handful of image operations, so the trait is
//! kept to those. Tests substitute a fake implementation.

use crate::error::CarryallResult;
use async_trait::async_trait;
use std::path::Path;

/// Registry login details passed through to the runtime
#[derive(Debug, Clone)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

/// Image operations the sync engine consumes
#[async_trait]
pub trait ImageRuntime: Send + Sync {
    /// Pull `reference` and write it as a tar archive to `dest`
    async fn fetch(&self, reference: &str, dest: &Path) -> CarryallResult<()>;

    /// Load an image archive and return the image ID or reference it was
    /// loaded as
    async fn load(&self, archive: &Path) -> CarryallResult<String>;

    /// Add `target` as a name for the image `source`
    async fn tag(&self, source: &str, target: &str) -> CarryallResult<()>;

    /// Push `reference`, returning the digest the registry reported, if any
    async fn push(&self, reference: &str) -> CarryallResult<Option<String>>;

    /// Repository digests (`name@sha256:<hex>`) recorded for an image
    async fn inspect_digests(&self, image: &str) -> CarryallResult<Vec<String>>;

    /// Authenticate against `registry` before pushing
    async fn login(&self, registry: &str, credentials: &RegistryCredentials) -> CarryallResult<()>;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
