//! Removing files the ledger does not account for

use crate::error::{CarryallError, CarryallResult};
use crate::ledger::{Ledger, LEDGER_FILE_NAME};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Delete every entry in `dir` that the ledger does not record
///
/// Leftover partial downloads and files written by other tools are the
/// usual candidates. The ledger file is never touched. With `dry_run`
/// nothing is deleted and the candidates are only returned.
pub fn clean(dir: &Path, dry_run: bool) -> CarryallResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        debug!("{} does not exist, nothing to clean", dir.display());
        return Ok(Vec::new());
    }
    let ledger = Ledger::open(dir, false)?;
    let ledger_tmp = format!("{}.tmp", LEDGER_FILE_NAME);

    let entries = fs::read_dir(ledger.directory())
        .map_err(|e| CarryallError::io(format!("reading {}", dir.display()), e))?;
    let mut stray = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CarryallError::io(format!("reading {}", dir.display()), e))?;
        let name = entry.file_name();
        if name == LEDGER_FILE_NAME || name == ledger_tmp.as_str() {
            continue;
        }
        let path = entry.path();
        if !ledger.is_cached(&path) {
            stray.push(path);
        }
    }
    stray.sort();

    if dry_run {
        return Ok(stray);
    }
    for path in &stray {
        info!("Removing {}", path.display());
        let result = if fs::symlink_metadata(path).is_ok_and(|m| m.is_dir()) {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        result.map_err(|e| CarryallError::io(format!("removing {}", path.display()), e))?;
    }
    Ok(stray)
}
