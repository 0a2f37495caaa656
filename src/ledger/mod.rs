//! Checksum ledger for an archive directory
//!
//! The ledger is the single record of which artifacts in a directory have
//! been captured and what their contents hash to. It is persisted as a plain
//! text file (`checksum.txt`) inside the directory it describes.
//!
//! # Mark and sweep
//!
//! Every `update` or `keep` during a run marks an entry as kept. `sweep`
//! then drops everything that was not marked and hands the dropped paths
//! back so the caller can delete the files.
//!
//! # Persistence
//!
//! The whole file is rewritten on every mutation, via a temporary file and a
//! rename. A ledger is single-writer: callers that share one across tasks
//! must serialize access (see `sync::save`).

mod checksum;

pub use checksum::{checksum_file, format_line, parse_checksums};

use crate::error::{CarryallError, CarryallResult};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fixed name of the ledger file inside an archive directory
pub const LEDGER_FILE_NAME: &str = "checksum.txt";

/// A single recorded artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// File name relative to the ledger directory
    pub file_name: String,
    /// Lowercase hex SHA256 of the file contents
    pub checksum: String,
}

/// Directory-scoped checksum ledger
#[derive(Debug)]
pub struct Ledger {
    directory: PathBuf,
    ledger_path: PathBuf,
    entries: HashMap<PathBuf, LedgerEntry>,
    kept: HashSet<PathBuf>,
}

impl Ledger {
    /// Open the ledger for `dir`, loading existing entries if present
    ///
    /// With `error_if_missing`, a directory without a ledger file is an error.
    pub fn open(dir: &Path, error_if_missing: bool) -> CarryallResult<Self> {
        let directory = fs::canonicalize(dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CarryallError::PathNotFound(dir.to_path_buf())
            } else {
                CarryallError::io(format!("resolving ledger directory {}", dir.display()), e)
            }
        })?;
        let ledger_path = directory.join(LEDGER_FILE_NAME);

        let mut ledger = Self {
            directory,
            ledger_path,
            entries: HashMap::new(),
            kept: HashSet::new(),
        };

        if ledger.ledger_path.is_file() {
            ledger.load()?;
        } else if error_if_missing {
            return Err(CarryallError::MissingLedger(dir.to_path_buf()));
        } else {
            debug!("No ledger at {}, starting empty", ledger.ledger_path.display());
        }

        Ok(ledger)
    }

    fn load(&mut self) -> CarryallResult<()> {
        let text = fs::read_to_string(&self.ledger_path).map_err(|e| {
            CarryallError::io(format!("reading ledger {}", self.ledger_path.display()), e)
        })?;

        for (checksum, file_name) in parse_checksums(&text) {
            if file_name.contains(['/', '\\']) || file_name == LEDGER_FILE_NAME {
                debug!("Ignoring ledger entry {:?}", file_name);
                continue;
            }
            self.entries.insert(
                self.directory.join(&file_name),
                LedgerEntry {
                    file_name,
                    checksum,
                },
            );
        }

        debug!(
            "Loaded {} entries from {}",
            self.entries.len(),
            self.ledger_path.display()
        );
        Ok(())
    }

    /// Canonical directory this ledger describes
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the persisted ledger file
    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Number of recorded entries (stale ones included)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All recorded entries, keyed by absolute path
    pub fn entries(&self) -> impl Iterator<Item = (&Path, &LedgerEntry)> {
        self.entries.iter().map(|(path, entry)| (path.as_path(), entry))
    }

    /// Absolute paths of all recorded files, sorted
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.entries.keys().cloned().collect();
        files.sort();
        files
    }

    /// Map a caller path onto the ledger key, if it lives in this directory
    fn key(&self, path: &Path) -> Option<PathBuf> {
        let file_name = path.file_name()?;
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let parent = fs::canonicalize(parent).ok()?;
        (parent == self.directory).then(|| self.directory.join(file_name))
    }

    /// True if the file exists on disk and has a ledger entry
    pub fn is_cached(&self, path: &Path) -> bool {
        if !path.is_file() {
            debug!("File {} doesn't exist", path.display());
            return false;
        }
        match self.key(path) {
            Some(key) if self.entries.contains_key(&key) => {
                debug!("Cache hit for {}", key.display());
                true
            }
            _ => {
                debug!("Cache miss for {}", path.display());
                false
            }
        }
    }

    /// Recorded checksum for a cached file
    pub fn checksum(&self, path: &Path) -> Option<&str> {
        if !self.is_cached(path) {
            return None;
        }
        let key = self.key(path)?;
        self.entries.get(&key).map(|e| e.checksum.as_str())
    }

    /// True if the file is cached and its recorded hash equals `expected`
    pub fn is_matching(&self, path: &Path, expected: &str) -> bool {
        self.checksum(path)
            .is_some_and(|recorded| recorded.eq_ignore_ascii_case(expected))
    }

    /// True if the file is cached and its current contents still hash to the
    /// recorded value
    pub fn is_matching_file(&self, path: &Path) -> CarryallResult<bool> {
        match self.checksum(path) {
            Some(recorded) => {
                let actual = checksum_file(path)?;
                Ok(recorded == actual)
            }
            None => Ok(false),
        }
    }

    /// Hash the file, record it, mark it kept and persist the ledger
    pub fn update(&mut self, path: &Path) -> CarryallResult<String> {
        if !path.is_file() {
            return Err(CarryallError::PathNotFound(path.to_path_buf()));
        }
        let key = self
            .key(path)
            .ok_or_else(|| CarryallError::OutsideArchiveDir {
                dir: self.directory.clone(),
                path: path.to_path_buf(),
            })?;
        let file_name = key
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!("Updating checksum for {}", path.display());
        let checksum = checksum_file(path)?;

        self.entries.insert(
            key.clone(),
            LedgerEntry {
                file_name,
                checksum: checksum.clone(),
            },
        );
        self.kept.insert(key);
        self.persist()?;

        Ok(checksum)
    }

    /// Mark an existing entry as kept without re-hashing
    ///
    /// Returns false if the path has no entry.
    pub fn keep(&mut self, path: &Path) -> bool {
        match self.key(path) {
            Some(key) if self.entries.contains_key(&key) => {
                self.kept.insert(key);
                true
            }
            _ => false,
        }
    }

    /// Whether an entry has been kept during this run
    pub fn is_kept(&self, path: &Path) -> bool {
        self.key(path).is_some_and(|key| self.kept.contains(&key))
    }

    /// Drop every entry not kept during this run and persist
    ///
    /// Returns the dropped paths, sorted. Deleting them is up to the caller.
    pub fn sweep(&mut self) -> CarryallResult<Vec<PathBuf>> {
        let mut removed: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|key| !self.kept.contains(*key))
            .cloned()
            .collect();
        removed.sort();

        for key in &removed {
            debug!("Sweeping ledger entry {}", key.display());
            self.entries.remove(key);
        }

        self.persist()?;
        Ok(removed)
    }

    /// Rewrite the ledger file from the in-memory entries
    fn persist(&self) -> CarryallResult<()> {
        let mut entries: Vec<&LedgerEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        let contents: String = entries
            .iter()
            .map(|e| format_line(&e.checksum, &e.file_name))
            .collect();

        let tmp = self.ledger_path.with_extension("txt.tmp");
        fs::write(&tmp, contents)
            .map_err(|e| CarryallError::io(format!("writing ledger {}", tmp.display()), e))?;
        fs::rename(&tmp, &self.ledger_path).map_err(|e| {
            CarryallError::io(format!("replacing ledger {}", self.ledger_path.display()), e)
        })?;

        Ok(())
    }
}
