//! Error types for Carryall
//!
//! All modules use `CarryallResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Carryall operations
pub type CarryallResult<T> = Result<T, CarryallError>;

/// All errors that can occur in Carryall
#[derive(Error, Debug)]
pub enum CarryallError {
    // Ledger errors
    #[error("Checksum ledger not found in {0}")]
    MissingLedger(PathBuf),

    #[error("Artifact {name} is recorded in the ledger but missing from disk: {path}")]
    StaleOrMissingArtifact { name: String, path: PathBuf },

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Path is outside the archive directory {dir}: {path}")]
    OutsideArchiveDir { dir: PathBuf, path: PathBuf },

    // Restore preconditions
    #[error(
        "{} file(s) in {} are present in neither the source nor the destination {}",
        .missing.len(),
        .ledger.display(),
        .destination.display()
    )]
    IncompleteArchiveSet {
        ledger: PathBuf,
        destination: PathBuf,
        missing: Vec<PathBuf>,
    },

    #[error("Destination repository is not clean: {0}")]
    DirtyDestination(PathBuf),

    #[error("Multiple home repository archives found in {0}")]
    AmbiguousHomeRepository(PathBuf),

    #[error("Refresh restore failed during {phase} (staging left at {staging}): {source}")]
    RefreshSwap {
        phase: String,
        staging: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Naming errors
    #[error("File name does not encode an artifact reference: {name}: {reason}")]
    CodecDecodeFailure { name: String, reason: String },

    #[error("Invalid image reference {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Invalid web file specification {spec}: expected url,filename,sha256[,true|false]")]
    InvalidWebFile { spec: String },

    // Container runtime errors
    #[error("Container runtime not found: {0}")]
    RuntimeNotFound(String),

    #[error("Image pull failed: {image}: {reason}")]
    ImagePull { image: String, reason: String },

    #[error("Image load failed: {path}: {reason}")]
    ImageLoad { path: PathBuf, reason: String },

    #[error("Image push failed: {image}: {reason}")]
    ImagePush { image: String, reason: String },

    #[error("Expected exactly one digest for {image}, found {}: {}", .digests.len(), .digests.join(", "))]
    AmbiguousDigestSet { image: String, digests: Vec<String> },

    #[error("No registry specified for publishing {0} image(s)")]
    RegistryRequired(usize),

    // Repository errors
    #[error("Git repository {path} is not clean, refusing to continue")]
    DirtyRepository { path: PathBuf },

    #[error("Git error at {path}: {source}")]
    Git {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    // Transfer errors
    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    // Archive errors
    #[error("Archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Invalid path: {path}: {reason}")]
    PathInvalid { path: PathBuf, reason: String },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl CarryallError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a git error for a repository path
    pub fn git(path: impl Into<PathBuf>, source: git2::Error) -> Self {
        Self::Git {
            path: path.into(),
            source,
        }
    }

    /// Create an archive error
    pub fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Archive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the error was raised by a pre-flight check, before anything
    /// on disk was changed
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::IncompleteArchiveSet { .. }
                | Self::DirtyDestination(_)
                | Self::DirtyRepository { .. }
                | Self::AmbiguousHomeRepository(_)
                | Self::MissingLedger(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::DirtyDestination(_) | Self::DirtyRepository { .. } => {
                Some("Commit or stash local changes, then run again")
            }
            Self::IncompleteArchiveSet { .. } => {
                Some("Copy the complete archive directory, or restore into the previous checkout")
            }
            Self::RefreshSwap { .. } => {
                Some("The staging directory is safe to delete; re-run the restore")
            }
            Self::RegistryRequired(_) => Some("Pass --registry or set CARRYALL_REGISTRY"),
            Self::RuntimeNotFound(_) => Some("Install docker or podman, or set runtime.engine"),
            Self::MissingLedger(_) => Some("Point --source-dir at a directory created by `carryall save`"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CarryallError::ChecksumMismatch {
            path: PathBuf::from("downloads/alpine.docker.tar"),
            expected: "aaa".to_string(),
            actual: "bbb".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("expected aaa"));
        assert!(msg.contains("got bbb"));
    }

    #[test]
    fn incomplete_set_counts_missing() {
        let err = CarryallError::IncompleteArchiveSet {
            ledger: PathBuf::from("src/checksum.txt"),
            destination: PathBuf::from("dst"),
            missing: vec![PathBuf::from("a"), PathBuf::from("b")],
        };
        assert!(err.to_string().starts_with("2 file(s)"));
    }

    #[test]
    fn error_hint() {
        let err = CarryallError::DirtyDestination(PathBuf::from("repo"));
        assert_eq!(
            err.hint(),
            Some("Commit or stash local changes, then run again")
        );
        assert_eq!(CarryallError::Internal("x".into()).hint(), None);
    }

    #[test]
    fn preconditions() {
        assert!(CarryallError::DirtyDestination(PathBuf::from("r")).is_precondition());
        assert!(!CarryallError::Internal("x".into()).is_precondition());
    }
}
