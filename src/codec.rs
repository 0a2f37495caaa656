//! Reversible mapping between artifact references and flat file names
//!
//! References such as `registry.local:5000/team/app:1.2@sha256:<hex>` contain
//! path separators, tag separators and a digest marker. Each is replaced by
//! an escape built from `~`, which never appears in a valid reference:
//!
//! | Reference | File name |
//! |-----------|-----------|
//! | `/` | `~` |
//! | `:` | `~~` |
//! | `@<alg>:` | `~~~<alg>~` |
//!
//! Decoding reverses the digest marker first, because `~~~` contains `~~`.

use crate::error::{CarryallError, CarryallResult};
use std::fmt;
use std::path::{Path, PathBuf};

const PATH_ESCAPE: &str = "~";
const TAG_ESCAPE: &str = "~~";
const DIGEST_ESCAPE: &str = "~~~";

/// Extension for saved container image archives
pub const IMAGE_EXTENSION: &str = ".docker.tar";
/// Extension for repository archives
pub const REPO_EXTENSION: &str = ".git.tar";
/// Extension for the repository archive of the working directory at save time
pub const HOME_REPO_EXTENSION: &str = ".git.home.tar";

/// Kind of artifact an archive file holds, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A saved container image
    Image,
    /// A repository that is not the home repository
    Repository,
    /// The home repository
    HomeRepository,
    /// Anything else (downloads, markers, the tool binary)
    File,
}

impl ArtifactKind {
    /// Classify an archive file by name
    pub fn of(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if name.ends_with(HOME_REPO_EXTENSION) {
            Self::HomeRepository
        } else if name.ends_with(REPO_EXTENSION) {
            Self::Repository
        } else if name.ends_with(IMAGE_EXTENSION) {
            Self::Image
        } else {
            Self::File
        }
    }

    /// File extension for this kind (empty for plain files)
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Image => IMAGE_EXTENSION,
            Self::Repository => REPO_EXTENSION,
            Self::HomeRepository => HOME_REPO_EXTENSION,
            Self::File => "",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Image => "image",
            Self::Repository => "repository",
            Self::HomeRepository => "home repository",
            Self::File => "file",
        };
        write!(f, "{}", name)
    }
}

/// Encode an image reference as an archive file path inside `dir`
pub fn encode(reference: &str, dir: &Path) -> PathBuf {
    encode_as(reference, dir, ArtifactKind::Image)
}

/// Encode a reference with the extension of the given artifact kind
pub fn encode_as(reference: &str, dir: &Path, kind: ArtifactKind) -> PathBuf {
    let (name, digest) = match reference.rsplit_once('@') {
        Some((name, digest)) => (name, Some(digest)),
        None => (reference, None),
    };

    let mut encoded = name.replace('/', PATH_ESCAPE).replace(':', TAG_ESCAPE);

    if let Some(digest) = digest {
        encoded.push_str(DIGEST_ESCAPE);
        match digest.split_once(':') {
            Some((algorithm, hex)) => {
                encoded.push_str(algorithm);
                encoded.push_str(PATH_ESCAPE);
                encoded.push_str(hex);
            }
            None => encoded.push_str(digest),
        }
    }

    encoded.push_str(kind.extension());
    dir.join(encoded)
}

/// Decode an archive file name back to the reference it was encoded from
///
/// Only the base name is considered, so the containing directory is
/// irrelevant.
pub fn decode(file: &Path) -> CarryallResult<String> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let fail = |reason: &str| CarryallError::CodecDecodeFailure {
        name: name.clone(),
        reason: reason.to_string(),
    };

    let kind = ArtifactKind::of(file);
    if kind == ArtifactKind::File {
        return Err(fail("unknown extension"));
    }
    let stem = &name[..name.len() - kind.extension().len()];

    let (name_part, digest) = match stem.rfind(DIGEST_ESCAPE) {
        Some(pos) => {
            let digest = &stem[pos + DIGEST_ESCAPE.len()..];
            let (algorithm, hex) = digest
                .split_once(PATH_ESCAPE)
                .ok_or_else(|| fail("digest marker without an algorithm separator"))?;
            if algorithm.is_empty() || hex.is_empty() || hex.contains(PATH_ESCAPE) {
                return Err(fail("malformed digest"));
            }
            (&stem[..pos], Some(format!("@{}:{}", algorithm, hex)))
        }
        None => (stem, None),
    };

    if name_part.is_empty() {
        return Err(fail("empty reference name"));
    }
    if name_part.contains(DIGEST_ESCAPE) {
        return Err(fail("ambiguous escape sequence"));
    }

    let mut reference = name_part.replace(TAG_ESCAPE, ":").replace(PATH_ESCAPE, "/");
    if reference.split('/').any(str::is_empty) {
        return Err(fail("empty path component"));
    }
    if let Some(digest) = digest {
        reference.push_str(&digest);
    }

    Ok(reference)
}
