//! Version-control collaborator
//!
//! Repository archives hold exactly the files of the HEAD commit plus the
//! repository metadata directory, so a restored checkout is a working
//! repository without build output or other untracked content.

use crate::error::{CarryallError, CarryallResult};
use git2::{ObjectType, Repository, Status, StatusOptions, TreeWalkMode, TreeWalkResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the repository metadata directory
pub const METADATA_DIR: &str = ".git";

/// Repository queries the sync engine consumes
pub trait VersionControl: Send + Sync {
    /// True if no tracked file differs from HEAD, in the index or worktree
    ///
    /// Untracked and ignored content does not count.
    fn is_working_tree_clean(&self, path: &Path) -> CarryallResult<bool>;

    /// Files of the HEAD tree, relative to the repository root
    fn head_tree_files(&self, path: &Path) -> CarryallResult<Vec<PathBuf>>;

    /// Every path under the metadata directory, as `path` joined with the
    /// relative location
    fn metadata_files(&self, path: &Path) -> CarryallResult<Vec<PathBuf>>;

    /// Top-level untracked or ignored paths, relative to the repository root
    fn untracked_paths(&self, path: &Path) -> CarryallResult<Vec<PathBuf>>;

    /// Short name of the repository: the origin URL's last component without
    /// `.git`, or else the directory name
    fn repository_name(&self, path: &Path) -> CarryallResult<String>;
}

/// `VersionControl` backed by libgit2
#[derive(Debug, Default, Clone, Copy)]
pub struct GitVcs;

impl GitVcs {
    pub fn new() -> Self {
        Self
    }

    fn open(path: &Path) -> CarryallResult<Repository> {
        Repository::open(path).map_err(|e| CarryallError::git(path, e))
    }

    /// Working tree root of the repository containing `path`, if any
    pub fn discover_root(path: &Path) -> Option<PathBuf> {
        let repo = Repository::discover(path).ok()?;
        let root = repo.workdir()?.to_path_buf();
        debug!("{} is inside repository {}", path.display(), root.display());
        Some(root)
    }
}

impl VersionControl for GitVcs {
    fn is_working_tree_clean(&self, path: &Path) -> CarryallResult<bool> {
        let repo = Self::open(path)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(false)
            .include_ignored(false)
            .exclude_submodules(true);

        let statuses = repo
            .statuses(Some(&mut opts))
            .map_err(|e| CarryallError::git(path, e))?;
        for entry in statuses.iter() {
            debug!("Changed in {}: {:?} {:?}", path.display(), entry.status(), entry.path());
        }
        Ok(statuses.is_empty())
    }

    fn head_tree_files(&self, path: &Path) -> CarryallResult<Vec<PathBuf>> {
        let repo = Self::open(path)?;
        let tree = repo
            .head()
            .and_then(|head| head.peel_to_tree())
            .map_err(|e| CarryallError::git(path, e))?;

        let mut files = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    files.push(Path::new(root).join(name));
                }
            }
            TreeWalkResult::Ok
        })
        .map_err(|e| CarryallError::git(path, e))?;

        Ok(files)
    }

    fn metadata_files(&self, path: &Path) -> CarryallResult<Vec<PathBuf>> {
        let root = path.join(METADATA_DIR);
        if !root.is_dir() {
            return Err(CarryallError::PathInvalid {
                path: path.to_path_buf(),
                reason: format!("no {} directory", METADATA_DIR),
            });
        }

        let mut files = vec![root.clone()];
        walk(&root, &mut files)?;
        Ok(files)
    }

    fn untracked_paths(&self, path: &Path) -> CarryallResult<Vec<PathBuf>> {
        let repo = Self::open(path)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .include_ignored(true)
            .recurse_untracked_dirs(false)
            .recurse_ignored_dirs(false);

        let statuses = repo
            .statuses(Some(&mut opts))
            .map_err(|e| CarryallError::git(path, e))?;

        let mut paths: Vec<PathBuf> = statuses
            .iter()
            .filter(|entry| entry.status().intersects(Status::WT_NEW | Status::IGNORED))
            .filter_map(|entry| entry.path().map(|p| PathBuf::from(p.trim_end_matches('/'))))
            .collect();
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    fn repository_name(&self, path: &Path) -> CarryallResult<String> {
        let repo = Self::open(path)?;
        if let Ok(remote) = repo.find_remote("origin") {
            if let Some(name) = remote.url().and_then(name_from_url) {
                return Ok(name);
            }
        }

        let dir = fs::canonicalize(path)
            .map_err(|e| CarryallError::io(format!("resolving {}", path.display()), e))?;
        dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CarryallError::PathInvalid {
                path: dir.clone(),
                reason: "repository has no directory name".to_string(),
            })
    }
}

/// Last component of a remote URL without the `.git` suffix
fn name_from_url(url: &str) -> Option<String> {
    let last = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    (!name.is_empty()).then(|| name.to_string())
}

/// Collect every entry below `dir`, depth first
fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> CarryallResult<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| CarryallError::io(format!("reading {}", dir.display()), e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CarryallError::io(format!("reading {}", dir.display()), e))?;
        paths.push(entry.path());
    }
    paths.sort();

    for path in paths {
        let is_dir = fs::symlink_metadata(&path)
            .map(|m| m.is_dir())
            .unwrap_or(false);
        out.push(path.clone());
        if is_dir {
            walk(&path, out)?;
        }
    }
    Ok(())
}
