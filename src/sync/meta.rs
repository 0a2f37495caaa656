//! Marker files recorded alongside artifacts
//!
//! Both markers are ordinary ledger entries, so they travel with the
//! archive directory and are verified like any other file.

use crate::error::{CarryallError, CarryallResult};
use crate::ledger::Ledger;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Records the archive directory path used at save time
pub const SAVE_DIR_META: &str = "saveDir.meta";

/// Suffix of the zero-length marker flagging an executable artifact
pub const BINMARK_SUFFIX: &str = ".binmark.meta";

/// Write `saveDir.meta` holding `recorded` and add it to the ledger
pub fn write_save_dir(ledger: &mut Ledger, recorded: &Path) -> CarryallResult<PathBuf> {
    let marker = ledger.directory().join(SAVE_DIR_META);
    fs::write(&marker, recorded.to_string_lossy().as_bytes())
        .map_err(|e| CarryallError::io(format!("writing {}", marker.display()), e))?;
    ledger.update(&marker)?;
    Ok(marker)
}

/// Read the archive directory path recorded in `dir`, if any
///
/// The path must be relative and stay below the directory it is joined to.
pub fn read_save_dir(dir: &Path) -> CarryallResult<Option<PathBuf>> {
    let marker = dir.join(SAVE_DIR_META);
    if !marker.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&marker)
        .map_err(|e| CarryallError::io(format!("reading {}", marker.display()), e))?;
    let recorded = PathBuf::from(text.trim());

    let mut clean = PathBuf::new();
    for component in recorded.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => {
                return Err(CarryallError::PathInvalid {
                    path: recorded.clone(),
                    reason: format!("{} must hold a relative path", SAVE_DIR_META),
                })
            }
        }
    }
    debug!("Recorded archive directory is {:?}", clean);
    Ok(Some(clean))
}

/// Marker path for an executable artifact
pub fn binmark_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(BINMARK_SUFFIX);
    PathBuf::from(name)
}

/// The artifact a marker file flags, if `marker` is one
pub fn binmark_target(marker: &Path) -> Option<PathBuf> {
    let name = marker.file_name()?.to_str()?;
    let target = name.strip_suffix(BINMARK_SUFFIX)?;
    (!target.is_empty()).then(|| marker.with_file_name(target))
}

/// Create the executable marker for `file` and record it
pub fn binmark(ledger: &mut Ledger, file: &Path) -> CarryallResult<PathBuf> {
    let marker = binmark_path(file);
    fs::File::create(&marker)
        .map_err(|e| CarryallError::io(format!("creating {}", marker.display()), e))?;
    ledger.update(&marker)?;
    Ok(marker)
}
