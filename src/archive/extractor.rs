//! Unpacking tar archives

use crate::error::{CarryallError, CarryallResult};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use tar::EntryType;
use tracing::debug;

/// Counts of what an extraction created
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    pub directories: usize,
    pub files: usize,
    pub links: usize,
}

/// A link whose creation waits until every directory exists
enum PendingLink {
    Symbolic { path: PathBuf, target: PathBuf },
    Hard { path: PathBuf, original: PathBuf },
}

/// Extract `archive_path` into `dest`
///
/// Directories are created as needed, regular files keep their stored mode
/// bits, and links are created last so their parent directories (and, for
/// hard links, their originals) already exist.
pub fn extract(archive_path: &Path, dest: &Path) -> CarryallResult<ExtractSummary> {
    debug!("Opening archive {}", archive_path.display());
    let file = File::open(archive_path)
        .map_err(|e| CarryallError::io(format!("opening archive {}", archive_path.display()), e))?;
    let mut archive = tar::Archive::new(BufReader::new(file));

    let read_err = |e: io::Error| CarryallError::archive(archive_path, e);

    let mut summary = ExtractSummary::default();
    let mut pending = Vec::new();

    for entry in archive.entries().map_err(read_err)? {
        let mut entry = entry.map_err(read_err)?;
        let name = entry.path().map_err(read_err)?.into_owned();
        let relative = safe_relative(&name).ok_or_else(|| {
            CarryallError::archive(archive_path, format!("unsafe entry path {}", name.display()))
        })?;
        let target = dest.join(&relative);

        match entry.header().entry_type() {
            EntryType::Directory => {
                create_dir(&target)?;
                summary.directories += 1;
            }
            EntryType::Symlink => {
                let link = entry
                    .link_name()
                    .map_err(read_err)?
                    .ok_or_else(|| {
                        CarryallError::archive(archive_path, format!("link {} has no target", name.display()))
                    })?
                    .into_owned();
                pending.push(PendingLink::Symbolic {
                    path: target,
                    target: link,
                });
            }
            EntryType::Link => {
                let original = entry
                    .link_name()
                    .map_err(read_err)?
                    .and_then(|l| safe_relative(&l))
                    .ok_or_else(|| {
                        CarryallError::archive(archive_path, format!("bad hard link {}", name.display()))
                    })?;
                pending.push(PendingLink::Hard {
                    path: target,
                    original: dest.join(original),
                });
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    create_dir(parent)?;
                }
                remove_existing(&target)?;

                let mut out = File::create(&target)
                    .map_err(|e| CarryallError::io(format!("creating {}", target.display()), e))?;
                io::copy(&mut entry, &mut out)
                    .map_err(|e| CarryallError::io(format!("writing {}", target.display()), e))?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let mode = entry.header().mode().map_err(read_err)?;
                    fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))
                        .map_err(|e| {
                            CarryallError::io(format!("setting mode on {}", target.display()), e)
                        })?;
                }
                summary.files += 1;
            }
            other => debug!("Skipping {:?} entry {}", other, name.display()),
        }
    }

    for link in pending {
        create_link(link)?;
        summary.links += 1;
    }

    debug!(
        "Extracted {} dirs, {} files, {} links into {}",
        summary.directories,
        summary.files,
        summary.links,
        dest.display()
    );
    Ok(summary)
}

/// Name of the folder the first entry of `archive_path` sits under
pub fn top_level_folder(archive_path: &Path) -> CarryallResult<String> {
    let file = File::open(archive_path)
        .map_err(|e| CarryallError::io(format!("opening archive {}", archive_path.display()), e))?;
    let mut archive = tar::Archive::new(BufReader::new(file));
    let read_err = |e: io::Error| CarryallError::archive(archive_path, e);

    let first = archive
        .entries()
        .map_err(read_err)?
        .next()
        .ok_or_else(|| CarryallError::archive(archive_path, "archive is empty"))?
        .map_err(read_err)?;
    let name = first.path().map_err(read_err)?.into_owned();

    safe_relative(&name)
        .and_then(|p| p.components().next().map(|c| c.as_os_str().to_string_lossy().into_owned()))
        .ok_or_else(|| {
            CarryallError::archive(archive_path, format!("unsafe entry path {}", name.display()))
        })
}

/// Strip `.` components and reject anything that could escape `dest`
fn safe_relative(path: &Path) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!relative.as_os_str().is_empty()).then_some(relative)
}

fn create_dir(path: &Path) -> CarryallResult<()> {
    fs::create_dir_all(path)
        .map_err(|e| CarryallError::io(format!("creating directory {}", path.display()), e))
}

fn remove_existing(path: &Path) -> CarryallResult<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return Ok(()),
    }
    .map_err(|e| CarryallError::io(format!("replacing {}", path.display()), e))
}

fn create_link(link: PendingLink) -> CarryallResult<()> {
    let path = match &link {
        PendingLink::Symbolic { path, .. } | PendingLink::Hard { path, .. } => path.clone(),
    };
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    remove_existing(&path)?;

    let result = match &link {
        PendingLink::Symbolic { target, .. } => symlink(target, &path),
        PendingLink::Hard { original, .. } => fs::hard_link(original, &path),
    };
    result.map_err(|e| CarryallError::io(format!("creating link {}", path.display()), e))
}

#[cfg(unix)]
fn symlink(target: &Path, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are only restored on unix",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::build;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn round_trip_preserves_files_dirs_links_and_modes() {
        use std::os::unix::fs::PermissionsExt;

        let src = TempDir::new().unwrap();
        let tree = src.path().join("site");
        fs::create_dir_all(tree.join("bin")).unwrap();
        fs::write(tree.join("index.html"), b"<h1>hi</h1>").unwrap();
        fs::write(tree.join("bin/run.sh"), b"#!/bin/sh\necho run\n").unwrap();
        fs::set_permissions(tree.join("bin/run.sh"), fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink("bin/run.sh", tree.join("start")).unwrap();

        let archive = src.path().join("site.tar");
        let files = vec![
            PathBuf::from("."),
            PathBuf::from("start"),
            PathBuf::from("index.html"),
            PathBuf::from("bin"),
            PathBuf::from("bin/run.sh"),
        ];
        build(&archive, &tree, &files).unwrap();

        let dest = TempDir::new().unwrap();
        let summary = extract(&archive, dest.path()).unwrap();
        assert_eq!(summary.files, 2);
        assert_eq!(summary.links, 1);

        let out = dest.path().join("site");
        assert_eq!(fs::read(out.join("index.html")).unwrap(), b"<h1>hi</h1>");
        assert_eq!(fs::read(out.join("bin/run.sh")).unwrap(), b"#!/bin/sh\necho run\n");
        let mode = fs::metadata(out.join("bin/run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(fs::read_link(out.join("start")).unwrap(), PathBuf::from("bin/run.sh"));
        assert_eq!(fs::read(out.join("start")).unwrap(), b"#!/bin/sh\necho run\n");
    }

    #[test]
    fn extract_is_idempotent_over_existing_tree() {
        let src = TempDir::new().unwrap();
        let tree = src.path().join("docs");
        fs::create_dir_all(&tree).unwrap();
        fs::write(tree.join("a.md"), "new").unwrap();

        let archive = src.path().join("docs.tar");
        build(&archive, &tree, &[PathBuf::from("."), PathBuf::from("a.md")]).unwrap();

        let dest = TempDir::new().unwrap();
        fs::create_dir_all(dest.path().join("docs")).unwrap();
        fs::write(dest.path().join("docs/a.md"), "old and longer").unwrap();

        extract(&archive, dest.path()).unwrap();
        extract(&archive, dest.path()).unwrap();
        assert_eq!(fs::read_to_string(dest.path().join("docs/a.md")).unwrap(), "new");
        assert_eq!(top_level_folder(&archive).unwrap(), "docs");
    }

    #[test]
    fn safe_relative_rejects_escapes() {
        assert_eq!(safe_relative(Path::new("./a/b")), Some(PathBuf::from("a/b")));
        assert_eq!(safe_relative(Path::new("../a")), None);
        assert_eq!(safe_relative(Path::new("/etc/passwd")), None);
        assert_eq!(safe_relative(Path::new(".")), None);
    }
}
