//! Structured view of container image references
//!
//! The codec round-trips references as opaque strings; publishing needs to
//! know which parts are the repository name, the tag and the digest.

use crate::codec;
use crate::error::{CarryallError, CarryallResult};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Content digest qualifier (`<algorithm>:<hex>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub algorithm: String,
    pub hex: String,
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// A parsed image reference: `name[:tag][@algorithm:hex]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Repository name including any registry host and path
    pub name: String,
    /// Explicit tag, if any
    pub tag: Option<String>,
    /// Content digest, if the reference is digest-qualified
    pub digest: Option<Digest>,
}

impl ImageRef {
    /// Parse the image reference encoded in an archive file name
    pub fn from_archive(file: &Path) -> CarryallResult<Self> {
        codec::decode(file)?.parse()
    }

    /// Last path component of the repository name (`team/app` -> `app`)
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Repository name to publish under in `registry`
    ///
    /// Without a registry the name is unchanged.
    pub fn retarget(&self, registry: Option<&str>) -> String {
        match registry.map(|r| r.trim_end_matches('/')) {
            Some(registry) if !registry.is_empty() => {
                format!("{}/{}", registry, self.short_name())
            }
            _ => self.name.clone(),
        }
    }
}

impl FromStr for ImageRef {
    type Err = CarryallError;

    fn from_str(reference: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CarryallError::InvalidReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        let (named, digest) = match reference.rsplit_once('@') {
            Some((named, digest)) => {
                let (algorithm, hex) = digest
                    .split_once(':')
                    .ok_or_else(|| invalid("digest must be <algorithm>:<hex>"))?;
                if algorithm.is_empty() || hex.is_empty() {
                    return Err(invalid("digest must be <algorithm>:<hex>"));
                }
                (
                    named,
                    Some(Digest {
                        algorithm: algorithm.to_string(),
                        hex: hex.to_string(),
                    }),
                )
            }
            None => (reference, None),
        };

        // A colon before the last '/' belongs to a registry port, not a tag
        let last_component = named.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match named[last_component..].rfind(':') {
            Some(i) => {
                let split = last_component + i;
                (&named[..split], Some(named[split + 1..].to_string()))
            }
            None => (named, None),
        };

        if name.is_empty() || name.split('/').any(str::is_empty) {
            return Err(invalid("empty name component"));
        }
        if name.contains('~') || tag.as_deref().is_some_and(|t| t.is_empty() || t.contains('~')) {
            return Err(invalid("reserved character or empty tag"));
        }

        Ok(Self {
            name: name.to_string(),
            tag,
            digest,
        })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}
