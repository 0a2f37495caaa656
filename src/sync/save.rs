//! Capturing artifacts into an archive directory

use super::binary::{save_tool, ToolRelease};
use super::web::WebFile;
use super::{meta, move_file, Collaborators};
use crate::archive;
use crate::codec::{self, ArtifactKind};
use crate::error::{CarryallError, CarryallResult};
use crate::ledger::{checksum_file, Ledger};
use crate::orchestration::ImageRuntime;
use crate::transfer::{partial_path, Transfer};
use crate::vcs::VersionControl;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What to capture
#[derive(Debug, Clone, Default)]
pub struct SaveRequest {
    /// Archive directory, as given by the user
    pub archive_dir: PathBuf,
    /// Image references to pull
    pub images: Vec<String>,
    /// Repository working trees to pack
    pub repos: Vec<PathBuf>,
    pub web_files: Vec<WebFile>,
    /// Repository the archive directory belongs to; its archive gets the
    /// home extension
    pub home: Option<PathBuf>,
    /// Capture the carryall executable for this release target
    pub tool: Option<ToolRelease>,
}

/// What a save run did
#[derive(Debug, Clone, Default)]
pub struct SaveReport {
    /// Artifacts pulled, downloaded or rebuilt
    pub fetched: Vec<PathBuf>,
    /// Artifacts whose saved copy was still valid
    pub cached: Vec<PathBuf>,
    /// Files swept because they were not requested this run
    pub removed: Vec<PathBuf>,
}

#[derive(Default)]
struct Outcome {
    fetched: Vec<PathBuf>,
    cached: Vec<PathBuf>,
}

impl Outcome {
    fn record(&mut self, path: PathBuf, fetched: bool) {
        if fetched {
            self.fetched.push(path);
        } else {
            self.cached.push(path);
        }
    }
}

/// Bring the archive directory up to date with `request`
///
/// Artifacts already saved with a matching checksum are kept without any
/// runtime or network call. Anything recorded in the ledger but not
/// requested this run is deleted at the end.
pub async fn save(request: &SaveRequest, collab: Collaborators<'_>) -> CarryallResult<SaveReport> {
    for repo in &request.repos {
        if !collab.vcs.is_working_tree_clean(repo)? {
            return Err(CarryallError::DirtyRepository { path: repo.clone() });
        }
    }
    let images = dedup(&request.images);
    let runtime = if images.is_empty() {
        None
    } else {
        Some(collab.runtime()?)
    };
    let transfer = if request.tool.is_none() && request.web_files.is_empty() {
        None
    } else {
        Some(collab.transfer()?)
    };

    fs::create_dir_all(&request.archive_dir).map_err(|e| {
        CarryallError::io(format!("creating {}", request.archive_dir.display()), e)
    })?;
    let ledger = Mutex::new(Ledger::open(&request.archive_dir, false)?);
    let dir = ledger.lock().await.directory().to_path_buf();
    info!("Saving artifacts into {}", dir.display());

    let mut outcome = Outcome::default();

    {
        let recorded = recorded_save_dir(&request.archive_dir, &dir, request.home.as_deref());
        let mut ledger = ledger.lock().await;
        meta::write_save_dir(&mut ledger, &recorded)?;
    }

    if let (Some(release), Some(transfer)) = (&request.tool, transfer) {
        let (path, fetched) = save_tool(&ledger, release, transfer).await?;
        outcome.record(path, fetched);
    }

    for repo in &request.repos {
        let path = save_repo(&ledger, collab.vcs, repo, request.home.as_deref()).await?;
        outcome.record(path, true);
    }

    let (images, files) = tokio::try_join!(
        save_images(&ledger, runtime, &images),
        save_web_files(&ledger, transfer, &request.web_files),
    )?;
    for part in [images, files] {
        outcome.fetched.extend(part.fetched);
        outcome.cached.extend(part.cached);
    }

    let removed = ledger.lock().await.sweep()?;
    for path in &removed {
        if path.exists() {
            info!("Removing {}", path.display());
            fs::remove_file(path)
                .map_err(|e| CarryallError::io(format!("removing {}", path.display()), e))?;
        }
    }

    Ok(SaveReport {
        fetched: outcome.fetched,
        cached: outcome.cached,
        removed,
    })
}

/// Pack a repository's HEAD files and metadata into its archive
async fn save_repo(
    ledger: &Mutex<Ledger>,
    vcs: &dyn VersionControl,
    repo: &Path,
    home: Option<&Path>,
) -> CarryallResult<PathBuf> {
    let kind = if home.is_some_and(|home| same_dir(home, repo)) {
        ArtifactKind::HomeRepository
    } else {
        ArtifactKind::Repository
    };
    let name = vcs.repository_name(repo)?;
    let dir = ledger.lock().await.directory().to_path_buf();
    let path = codec::encode_as(&name, &dir, kind);

    let mut files = vec![PathBuf::from(".")];
    files.extend(vcs.head_tree_files(repo)?);
    for file in vcs.metadata_files(repo)? {
        let relative = file.strip_prefix(repo).map_err(|_| CarryallError::PathInvalid {
            path: file.clone(),
            reason: format!("not inside {}", repo.display()),
        })?;
        files.push(relative.to_path_buf());
    }

    info!("Archiving {} ({} entries)", repo.display(), files.len());
    let partial = partial_path(&path);
    archive::build(&partial, repo, &files)?;
    move_file(&partial, &path)?;

    ledger.lock().await.update(&path)?;
    Ok(path)
}

async fn save_images(
    ledger: &Mutex<Ledger>,
    runtime: Option<&dyn ImageRuntime>,
    images: &[String],
) -> CarryallResult<Outcome> {
    let mut outcome = Outcome::default();
    let Some(runtime) = runtime else {
        return Ok(outcome);
    };
    let dir = ledger.lock().await.directory().to_path_buf();

    for image in images {
        let path = codec::encode(image, &dir);
        if path.is_file() {
            let actual = hash_off_thread(&path).await?;
            let mut ledger = ledger.lock().await;
            if ledger.is_matching(&path, &actual) {
                debug!("Image {} already saved", image);
                ledger.keep(&path);
                outcome.record(path, false);
                continue;
            }
        }

        info!("Pulling {}", image);
        let partial = partial_path(&path);
        runtime.fetch(image, &partial).await?;
        move_file(&partial, &path)?;

        ledger.lock().await.update(&path)?;
        outcome.record(path, true);
    }
    Ok(outcome)
}

/// Hash a file on the blocking pool, outside the ledger lock
async fn hash_off_thread(path: &Path) -> CarryallResult<String> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || checksum_file(&owned))
        .await
        .map_err(|e| CarryallError::Internal(format!("Hashing {} failed: {}", path.display(), e)))?
}

async fn save_web_files(
    ledger: &Mutex<Ledger>,
    transfer: Option<&dyn Transfer>,
    files: &[WebFile],
) -> CarryallResult<Outcome> {
    let mut outcome = Outcome::default();
    let Some(transfer) = transfer else {
        return Ok(outcome);
    };
    let dir = ledger.lock().await.directory().to_path_buf();

    for file in files {
        let path = dir.join(&file.file_name);
        {
            let mut ledger = ledger.lock().await;
            if ledger.is_matching(&path, &file.sha256) {
                debug!("{} already saved", file.file_name);
                ledger.keep(&path);
                if file.executable {
                    meta::binmark(&mut ledger, &path)?;
                }
                outcome.record(path, false);
                continue;
            }
        }

        if path.exists() {
            warn!("Replacing stale {}", path.display());
            fs::remove_file(&path)
                .map_err(|e| CarryallError::io(format!("removing {}", path.display()), e))?;
        }
        transfer.fetch(&file.url, &path, file.executable).await?;

        let actual = checksum_file(&path)?;
        if actual != file.sha256 {
            fs::remove_file(&path).ok();
            return Err(CarryallError::ChecksumMismatch {
                path,
                expected: file.sha256.clone(),
                actual,
            });
        }

        let mut ledger = ledger.lock().await;
        ledger.update(&path)?;
        if file.executable {
            meta::binmark(&mut ledger, &path)?;
        }
        outcome.record(path, true);
    }
    Ok(outcome)
}

/// Relative path restore should use for the archive directory
///
/// Relative arguments are kept as given. An absolute directory inside the
/// home repository is recorded relative to it; anything else falls back to
/// the directory name.
fn recorded_save_dir(given: &Path, canonical: &Path, home: Option<&Path>) -> PathBuf {
    if given.is_relative() && !given.components().any(|c| c == Component::ParentDir) {
        return given.to_path_buf();
    }
    if let Some(home) = home.and_then(|h| fs::canonicalize(h).ok()) {
        if let Ok(relative) = canonical.strip_prefix(&home) {
            return relative.to_path_buf();
        }
    }
    canonical
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn dedup(images: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    images
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty() && seen.insert(i.to_string()))
        .map(str::to_string)
        .collect()
}
