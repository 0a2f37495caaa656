//! Content hashing and the plain-text checksum line format
//!
//! Lines look like `sha256sum` output: `<hex hash>  <file name>`.

use crate::error::{CarryallError, CarryallResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::warn;

/// Hash a file's full contents using SHA256, returning lowercase hex
pub fn checksum_file(path: &Path) -> CarryallResult<String> {
    let mut file = File::open(path)
        .map_err(|e| CarryallError::io(format!("opening {} for hashing", path.display()), e))?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| CarryallError::io(format!("hashing {}", path.display()), e))?;

    Ok(hex::encode(hasher.finalize()))
}

/// Parse checksum lines into `(hash, file name)` pairs
///
/// Malformed lines are logged and skipped.
pub fn parse_checksums(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(pair) => pairs.push(pair),
            None => warn!("Skipping invalid checksum line {}: {:?}", number + 1, line),
        }
    }

    pairs
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let (hash, rest) = line.trim_end_matches('\r').split_once(' ')?;
    // `sha256sum` puts ' ' before the name in text mode and '*' in binary mode
    let name = rest.strip_prefix([' ', '*'])?;
    if name.is_empty() || hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some((hash.to_ascii_lowercase(), name.to_string()))
}

/// Format one checksum line, including the trailing newline
pub fn format_line(hash: &str, name: &str) -> String {
    format!("{}  {}\n", hash, name)
}
