//! Replacing a live tree from an archive without losing local content

use super::extractor::{extract, ExtractSummary};
use crate::error::{CarryallError, CarryallResult};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix of the sibling directory a refresh extracts into
pub const STAGING_SUFFIX: &str = ".carryall-staging";

/// Steps of a refresh, reported when one of them fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapPhase {
    Stage,
    Relocate,
    Swap,
    Cleanup,
}

impl fmt::Display for SwapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stage => "stage",
            Self::Relocate => "relocate",
            Self::Swap => "swap",
            Self::Cleanup => "cleanup",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of [`restore_tree`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeRestore {
    pub summary: ExtractSummary,
    /// Whether an existing tree was replaced
    pub refreshed: bool,
    /// Preserved paths carried over from the previous tree
    pub relocated: Vec<PathBuf>,
}

/// Staging directory used when refreshing `parent/tree_name`
pub fn staging_dir(parent: &Path, tree_name: &str) -> PathBuf {
    parent.join(format!("{}{}", tree_name, STAGING_SUFFIX))
}

/// Extract `archive` so that its top-level folder becomes `parent/tree_name`
///
/// If the tree does not exist yet the archive is extracted in place. If it
/// does, the archive is extracted into a staging directory, every path in
/// `preserve` (relative to the tree) is moved from the live tree into the
/// staged one, and the staged tree then replaces the live one. The live
/// tree is never written to directly, so an interrupted refresh leaves at
/// worst an orphaned staging directory.
pub fn restore_tree(
    archive: &Path,
    parent: &Path,
    tree_name: &str,
    preserve: &[PathBuf],
) -> CarryallResult<TreeRestore> {
    let live = parent.join(tree_name);

    if !live.exists() {
        debug!("{} does not exist, extracting in place", live.display());
        fs::create_dir_all(parent)
            .map_err(|e| CarryallError::io(format!("creating {}", parent.display()), e))?;
        let summary = extract(archive, parent)?;
        return Ok(TreeRestore {
            summary,
            refreshed: false,
            relocated: Vec::new(),
        });
    }

    let staging = staging_dir(parent, tree_name);
    let staged = staging.join(tree_name);
    let phase_err = |phase: SwapPhase| {
        let staging = staging.clone();
        move |source: io::Error| CarryallError::RefreshSwap {
            phase: phase.to_string(),
            staging,
            source,
        }
    };

    // Stage
    if staging.exists() {
        warn!("Found orphaned staging directory {}", staging.display());
        recover_orphan(&staged, &live, preserve).map_err(phase_err(SwapPhase::Stage))?;
        fs::remove_dir_all(&staging).map_err(phase_err(SwapPhase::Stage))?;
    }
    fs::create_dir_all(&staging).map_err(phase_err(SwapPhase::Stage))?;
    let summary = extract(archive, &staging)?;
    if !staged.is_dir() {
        return Err(CarryallError::archive(
            archive,
            format!("archive does not contain a top-level {} folder", tree_name),
        ));
    }

    // Relocate
    let mut relocated = Vec::new();
    for rel in preserve {
        let from = live.join(rel);
        if fs::symlink_metadata(&from).is_err() {
            continue;
        }
        let to = staged.join(rel);
        move_replacing(&from, &to).map_err(phase_err(SwapPhase::Relocate))?;
        debug!("Relocated {} into staging", rel.display());
        relocated.push(rel.clone());
    }

    // Swap
    fs::remove_dir_all(&live).map_err(phase_err(SwapPhase::Swap))?;
    fs::rename(&staged, &live).map_err(phase_err(SwapPhase::Swap))?;

    // Cleanup
    fs::remove_dir_all(&staging).map_err(phase_err(SwapPhase::Cleanup))?;

    info!("Refreshed {} ({} preserved)", live.display(), relocated.len());
    Ok(TreeRestore {
        summary,
        refreshed: true,
        relocated,
    })
}

/// Put preserved paths left in an old staging tree back into the live tree
///
/// A refresh interrupted between relocation and swap leaves them only in
/// staging.
fn recover_orphan(staged: &Path, live: &Path, preserve: &[PathBuf]) -> io::Result<()> {
    for rel in preserve {
        let orphan = staged.join(rel);
        let target = live.join(rel);
        if fs::symlink_metadata(&orphan).is_ok() && fs::symlink_metadata(&target).is_err() {
            debug!("Recovering {} from orphaned staging", rel.display());
            move_replacing(&orphan, &target)?;
        }
    }
    Ok(())
}

/// Rename `from` to `to`, removing whatever `to` currently holds
fn move_replacing(from: &Path, to: &Path) -> io::Result<()> {
    match fs::symlink_metadata(to) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(to)?,
        Ok(_) => fs::remove_file(to)?,
        Err(_) => {}
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(from, to)
}
