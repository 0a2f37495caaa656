//! Packing a file list into a tar archive

use crate::error::{CarryallError, CarryallResult};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Create a tar archive at `archive_path` from `files`
///
/// `files` are paths relative to `base`, written in the given order. Every
/// entry is stored under a single prefix taken from the first file: its own
/// name if it is a directory, otherwise the name of its parent directory.
/// Symbolic links are stored as links with their target unchanged.
///
/// Returns the number of entries written.
pub fn build(archive_path: &Path, base: &Path, files: &[PathBuf]) -> CarryallResult<usize> {
    let first = files
        .first()
        .ok_or_else(|| CarryallError::archive(archive_path, "must supply at least one path to archive"))?;
    let prefix = archive_prefix(&base.join(first))?;
    debug!("Archive prefix for {} is {}", archive_path.display(), prefix.display());

    let out = File::create(archive_path)
        .map_err(|e| CarryallError::io(format!("creating archive {}", archive_path.display()), e))?;
    let mut builder = tar::Builder::new(BufWriter::new(out));
    builder.follow_symlinks(false);

    for file in files {
        let name = entry_name(&prefix, file).ok_or_else(|| CarryallError::PathInvalid {
            path: file.clone(),
            reason: "archive entries must be relative paths without '..'".to_string(),
        })?;
        let source = base.join(file);

        builder
            .append_path_with_name(&source, &name)
            .map_err(|e| {
                CarryallError::archive(
                    archive_path,
                    format!("adding {}: {}", source.display(), e),
                )
            })?;
    }

    let mut writer = builder
        .into_inner()
        .map_err(|e| CarryallError::io(format!("finishing archive {}", archive_path.display()), e))?;
    writer
        .flush()
        .map_err(|e| CarryallError::io(format!("flushing archive {}", archive_path.display()), e))?;

    debug!("Wrote {} entries to {}", files.len(), archive_path.display());
    Ok(files.len())
}

/// Folder name every entry is nested under
fn archive_prefix(first: &Path) -> CarryallResult<PathBuf> {
    let meta = fs::symlink_metadata(first).map_err(|e| {
        CarryallError::io(format!("unable to archive {}", first.display()), e)
    })?;

    let anchor = if meta.is_dir() {
        first
    } else {
        match first.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    };

    let anchor = fs::canonicalize(anchor)
        .map_err(|e| CarryallError::io(format!("resolving {}", anchor.display()), e))?;

    anchor
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| CarryallError::PathInvalid {
            path: anchor.clone(),
            reason: "cannot derive an archive prefix from a root directory".to_string(),
        })
}

/// Join `file` onto `prefix`, dropping `.` components
fn entry_name(prefix: &Path, file: &Path) -> Option<PathBuf> {
    let mut name = prefix.to_path_buf();
    for component in file.components() {
        match component {
            Component::Normal(part) => name.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(name)
}
