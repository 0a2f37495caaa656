//! Re-publishing saved images to a registry in the isolated environment

use super::Collaborators;
use crate::codec::ArtifactKind;
use crate::error::{CarryallError, CarryallResult};
use crate::image::ImageRef;
use crate::ledger::{checksum_file, Ledger};
use crate::orchestration::RegistryCredentials;
use std::path::PathBuf;
use tracing::{debug, info};

/// Hex characters of the image ID used as tag for digest-only references
const ID_TAG_LEN: usize = 12;

#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Archive directory holding the image archives and their ledger
    pub source_dir: PathBuf,
    /// Registry host (and optional path) to push to
    pub registry: Option<String>,
    pub credentials: Option<RegistryCredentials>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedImage {
    /// Reference the image was saved under
    pub reference: String,
    /// Reference it was pushed as
    pub target: String,
    /// Digest verified against the saved reference, for digest references
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    pub images: Vec<PublishedImage>,
}

/// Load, retag and push every image archive recorded in the ledger
pub async fn publish(
    request: &PublishRequest,
    collab: Collaborators<'_>,
) -> CarryallResult<PublishReport> {
    let ledger = Ledger::open(&request.source_dir, true)?;
    let archives: Vec<PathBuf> = ledger
        .files()
        .into_iter()
        .filter(|path| ArtifactKind::of(path) == ArtifactKind::Image)
        .collect();
    if archives.is_empty() {
        info!("No image archives in {}", ledger.directory().display());
        return Ok(PublishReport::default());
    }

    let registry = request
        .registry
        .as_deref()
        .map(|r| r.trim().trim_end_matches('/'))
        .filter(|r| !r.is_empty())
        .ok_or(CarryallError::RegistryRequired(archives.len()))?;
    let runtime = collab.runtime()?;

    if let Some(credentials) = &request.credentials {
        runtime.login(registry, credentials).await?;
    }

    let mut report = PublishReport::default();
    for archive in archives {
        if !ledger.is_cached(&archive) {
            return Err(CarryallError::StaleOrMissingArtifact {
                name: archive
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: archive,
            });
        }
        if !ledger.is_matching_file(&archive)? {
            return Err(CarryallError::ChecksumMismatch {
                expected: ledger.checksum(&archive).unwrap_or_default().to_string(),
                actual: checksum_file(&archive)?,
                path: archive,
            });
        }

        let image = ImageRef::from_archive(&archive)?;
        info!("Loading {}", image);
        let loaded = runtime.load(&archive).await?;

        let target_name = image.retarget(Some(registry));
        let tag = publish_tag(&image, &loaded);
        let source = match image.digest {
            Some(_) => loaded.clone(),
            None => format!("{}:{}", image.name, image.tag.as_deref().unwrap_or("latest")),
        };
        let target = format!("{}:{}", target_name, tag);

        debug!("Tagging {} as {}", source, target);
        runtime.tag(&source, &target).await?;
        info!("Pushing {}", target);
        let pushed = runtime.push(&target).await?;

        let digest = match &image.digest {
            Some(expected) => {
                let expected = expected.to_string();
                verify_digest(collab, &target, &target_name, &expected, pushed.as_deref()).await?;
                Some(expected)
            }
            None => None,
        };

        report.images.push(PublishedImage {
            reference: image.to_string(),
            target,
            digest,
        });
    }
    Ok(report)
}

/// Tag to push under: the saved tag, else a short image ID for digest
/// references, else `latest`
fn publish_tag(image: &ImageRef, loaded: &str) -> String {
    if let Some(tag) = &image.tag {
        return tag.clone();
    }
    if image.digest.is_some() {
        let id = loaded.rsplit(':').next().unwrap_or(loaded);
        if id.len() >= ID_TAG_LEN && id.chars().all(|c| c.is_ascii_hexdigit()) {
            return id[..ID_TAG_LEN].to_string();
        }
    }
    "latest".to_string()
}

/// Check the pushed image still has the digest it was saved with
async fn verify_digest(
    collab: Collaborators<'_>,
    target: &str,
    target_name: &str,
    expected: &str,
    pushed: Option<&str>,
) -> CarryallResult<()> {
    if pushed == Some(expected) {
        return Ok(());
    }

    let wanted = format!("{}@{}", target_name, expected);
    let digests = collab.runtime()?.inspect_digests(target).await?;
    if digests.iter().any(|d| *d == wanted) {
        return Ok(());
    }

    let prefix = format!("{}@", target_name);
    let same_repo: Vec<String> = digests
        .into_iter()
        .filter(|d| d.starts_with(&prefix))
        .collect();
    if same_repo.len() > 1 {
        return Err(CarryallError::AmbiguousDigestSet {
            image: target.to_string(),
            digests: same_repo,
        });
    }

    let actual = same_repo
        .first()
        .and_then(|d| d.split_once('@'))
        .map(|(_, digest)| digest.to_string())
        .or_else(|| pushed.map(str::to_string))
        .unwrap_or_else(|| "none".to_string());
    Err(CarryallError::ChecksumMismatch {
        path: PathBuf::from(target),
        expected: expected.to_string(),
        actual,
    })
}
