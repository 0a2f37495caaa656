//! Restoring an archive directory into a destination
//!
//! A restore first checks, without touching anything, that every file the
//! source ledger records is either present in the source or already in
//! place at the destination with the recorded checksum. Only then is the
//! home repository extracted (through the refresh protocol when a checkout
//! already exists) and are artifacts moved into the archive directory
//! inside it. The ledger file moves last, so an interrupted restore can be
//! run again from the source.

use super::{meta, move_file, Collaborators};
use crate::archive::{self, TreeRestore};
use crate::codec::{self, ArtifactKind};
use crate::error::{CarryallError, CarryallResult};
use crate::ledger::{checksum_file, Ledger, LEDGER_FILE_NAME};
use crate::transfer::make_executable;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where to restore from and to
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    /// Directory holding the saved artifacts and their ledger
    pub source_dir: PathBuf,
    /// Directory the home repository is restored into
    pub dest_dir: PathBuf,
}

/// Pre-flight classification of the ledger entries, by file name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreManifest {
    /// In the source directory, to be moved
    pub present: Vec<PathBuf>,
    /// Absent from the source but already at the destination and verified
    pub recoverable: Vec<PathBuf>,
    /// In neither place
    pub missing: Vec<PathBuf>,
}

/// What a restore did
#[derive(Debug, Clone)]
pub struct RestoreReport {
    /// Root of the restored repository, or the destination without one
    pub tree_root: PathBuf,
    /// Directory the artifacts now live in
    pub archive_dir: PathBuf,
    /// Set when the home repository archive was extracted
    pub tree: Option<TreeRestore>,
    pub manifest: RestoreManifest,
}

/// Restore `request.source_dir` into `request.dest_dir`
pub fn restore(request: &RestoreRequest, collab: Collaborators<'_>) -> CarryallResult<RestoreReport> {
    let ledger = Ledger::open(&request.source_dir, true)?;
    let source = ledger.directory().to_path_buf();

    let home = home_archive(&ledger)?;
    let saved_dir = meta::read_save_dir(&source)?.unwrap_or_else(|| PathBuf::from("."));

    let tree_name = match &home {
        Some(archive) if archive.is_file() => Some(archive::top_level_folder(archive)?),
        Some(archive) => Some(codec::decode(archive)?),
        None => None,
    };
    let tree_root = match &tree_name {
        Some(name) => request.dest_dir.join(name),
        None => request.dest_dir.clone(),
    };
    let dst_dir = tree_root.join(&saved_dir);
    let refresh = tree_name.is_some() && tree_root.exists();
    debug!(
        "Restoring {} into {} (refresh: {})",
        source.display(),
        dst_dir.display(),
        refresh
    );

    if refresh {
        if let Ok(root) = fs::canonicalize(&tree_root) {
            if source.starts_with(&root) {
                return Err(CarryallError::PathInvalid {
                    path: source,
                    reason: format!("source may not be inside {}, which is replaced", root.display()),
                });
            }
        }
    }

    let manifest = preflight(&ledger, &dst_dir)?;
    if !manifest.missing.is_empty() {
        return Err(CarryallError::IncompleteArchiveSet {
            ledger: ledger.ledger_path().to_path_buf(),
            destination: dst_dir,
            missing: manifest.missing,
        });
    }
    if refresh && !collab.vcs.is_working_tree_clean(&tree_root)? {
        return Err(CarryallError::DirtyDestination(tree_root));
    }

    let mut tree = None;
    if let (Some(archive), Some(name)) = (&home, &tree_name) {
        if archive.is_file() {
            let preserve = if refresh {
                collab.vcs.untracked_paths(&tree_root)?
            } else {
                Vec::new()
            };
            info!("Restoring repository {} into {}", name, request.dest_dir.display());
            tree = Some(archive::restore_tree(archive, &request.dest_dir, name, &preserve)?);
        }
    }

    fs::create_dir_all(&dst_dir)
        .map_err(|e| CarryallError::io(format!("creating {}", dst_dir.display()), e))?;
    let in_place = fs::canonicalize(&dst_dir).is_ok_and(|d| d == source);

    for name in &manifest.present {
        let from = source.join(name);
        let to = dst_dir.join(name);
        if !in_place {
            debug!("Moving {} to {}", from.display(), to.display());
            move_file(&from, &to)?;
        }
        verify(&ledger, name, &to)?;
    }

    for (path, entry) in ledger.entries() {
        if let Some(target) = meta::binmark_target(Path::new(&entry.file_name)) {
            let target = dst_dir.join(target);
            if target.is_file() {
                debug!("Marking {} executable ({})", target.display(), path.display());
                make_executable(&target)?;
            }
        }
    }

    if !in_place {
        move_file(ledger.ledger_path(), &dst_dir.join(LEDGER_FILE_NAME))?;
    }
    info!(
        "Restored {} artifacts into {}",
        manifest.present.len() + manifest.recoverable.len(),
        dst_dir.display()
    );

    Ok(RestoreReport {
        tree_root,
        archive_dir: dst_dir,
        tree,
        manifest,
    })
}

/// The ledger's home repository archive, if it records one
fn home_archive(ledger: &Ledger) -> CarryallResult<Option<PathBuf>> {
    let homes: Vec<&Path> = ledger
        .entries()
        .map(|(path, _)| path)
        .filter(|path| ArtifactKind::of(path) == ArtifactKind::HomeRepository)
        .collect();
    match homes.as_slice() {
        [] => Ok(None),
        [home] => Ok(Some(home.to_path_buf())),
        _ => Err(CarryallError::AmbiguousHomeRepository(
            ledger.directory().to_path_buf(),
        )),
    }
}

/// Classify every ledger entry without changing anything on disk
fn preflight(ledger: &Ledger, dst_dir: &Path) -> CarryallResult<RestoreManifest> {
    let mut manifest = RestoreManifest::default();
    let mut entries: Vec<_> = ledger.entries().collect();
    entries.sort_by(|a, b| a.1.file_name.cmp(&b.1.file_name));

    for (path, entry) in entries {
        let name = PathBuf::from(&entry.file_name);
        if path.is_file() {
            manifest.present.push(name);
            continue;
        }
        let existing = dst_dir.join(&name);
        if existing.is_file() {
            let actual = checksum_file(&existing)?;
            if actual != entry.checksum {
                return Err(CarryallError::ChecksumMismatch {
                    path: existing,
                    expected: entry.checksum.clone(),
                    actual,
                });
            }
            debug!("{} already restored", existing.display());
            manifest.recoverable.push(name);
        } else {
            manifest.missing.push(name);
        }
    }
    Ok(manifest)
}

fn verify(ledger: &Ledger, name: &Path, restored: &Path) -> CarryallResult<()> {
    let expected = ledger
        .entries()
        .find(|(_, e)| Path::new(&e.file_name) == name)
        .map(|(_, e)| e.checksum.clone())
        .ok_or_else(|| CarryallError::Internal(format!("{} left the ledger", name.display())))?;
    let actual = checksum_file(restored)?;
    if actual != expected {
        return Err(CarryallError::ChecksumMismatch {
            path: restored.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::{sha256_hex, FakeRuntime, FakeTransfer};
    use crate::sync::{save, SaveRequest, WebFile};
    use crate::vcs::tests::{commit_all, init_repo};
    use crate::vcs::{GitVcs, VersionControl};
    use tempfile::TempDir;

    const TOOL: &[u8] = b"#!/bin/sh\necho tool\n";

    fn collab<'a>(runtime: &'a FakeRuntime, transfer: &'a FakeTransfer) -> Collaborators<'a> {
        Collaborators {
            runtime: Some(runtime),
            vcs: &GitVcs,
            transfer: Some(transfer),
        }
    }

    fn copy_flat(from: &Path, to: &Path) {
        fs::create_dir_all(to).unwrap();
        for entry in fs::read_dir(from).unwrap() {
            let entry = entry.unwrap();
            fs::copy(entry.path(), to.join(entry.file_name())).unwrap();
        }
    }

    /// Save a committed project with one image and one executable download,
    /// returning two independent copies of the archive directory
    async fn saved_project(root: &Path) -> (PathBuf, PathBuf) {
        let home = root.join("project");
        fs::create_dir_all(&home).unwrap();
        let repo = init_repo(&home);
        fs::write(home.join(".gitignore"), "downloads/\n").unwrap();
        commit_all(&repo);

        let transfer = FakeTransfer::default().serve("https://dl.example.com/tool", TOOL.to_vec());
        let web: WebFile = format!("https://dl.example.com/tool,tool,{},true", sha256_hex(TOOL))
            .parse()
            .unwrap();
        let request = SaveRequest {
            archive_dir: home.join("downloads"),
            images: vec!["alpine:3.19".to_string()],
            repos: vec![home.clone()],
            web_files: vec![web],
            home: Some(home.clone()),
            tool: None,
        };
        save(&request, collab(&FakeRuntime::default(), &transfer))
            .await
            .unwrap();

        let first = root.join("usb1");
        let second = root.join("usb2");
        copy_flat(&home.join("downloads"), &first);
        copy_flat(&home.join("downloads"), &second);
        (first, second)
    }

    /// Restore needs neither a container runtime nor a transfer client
    fn run(source: &Path, dest: &Path) -> CarryallResult<RestoreReport> {
        restore(
            &RestoreRequest {
                source_dir: source.to_path_buf(),
                dest_dir: dest.to_path_buf(),
            },
            Collaborators {
                runtime: None,
                vcs: &GitVcs,
                transfer: None,
            },
        )
    }

    #[tokio::test]
    async fn fresh_restore_rebuilds_checkout_and_moves_artifacts() {
        let temp = TempDir::new().unwrap();
        let (source, _) = saved_project(temp.path()).await;
        let dest = temp.path().join("airgap");

        let report = run(&source, &dest).unwrap();
        let tree = report.tree.unwrap();
        assert!(!tree.refreshed);

        let project = dest.join("project");
        assert_eq!(report.tree_root, project);
        assert_eq!(fs::read_to_string(project.join("src/main.rs")).unwrap(), "fn main() {}\n");
        assert!(project.join(".git/HEAD").is_file());

        let downloads = project.join("downloads");
        assert!(downloads.join("alpine~~3.19.docker.tar").is_file());
        assert!(downloads.join("project.git.home.tar").is_file());
        assert!(downloads.join(LEDGER_FILE_NAME).is_file());
        assert!(!source.join(LEDGER_FILE_NAME).exists());
        assert!(!source.join("tool").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(downloads.join("tool")).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
        assert!(GitVcs.is_working_tree_clean(&project).unwrap());
    }

    #[tokio::test]
    async fn refresh_keeps_local_content() {
        let temp = TempDir::new().unwrap();
        let (first, second) = saved_project(temp.path()).await;
        let dest = temp.path().join("airgap");
        run(&first, &dest).unwrap();

        let project = dest.join("project");
        fs::create_dir_all(project.join("local-cache")).unwrap();
        fs::write(project.join("local-cache/data.bin"), "keep me").unwrap();

        let report = run(&second, &dest).unwrap();
        let tree = report.tree.unwrap();
        assert!(tree.refreshed);
        assert!(tree.relocated.contains(&PathBuf::from("local-cache")));
        assert_eq!(
            fs::read_to_string(project.join("local-cache/data.bin")).unwrap(),
            "keep me"
        );
        assert!(project.join("downloads/alpine~~3.19.docker.tar").is_file());
        assert!(!archive::staging_dir(&dest, "project").exists());
    }

    #[tokio::test]
    async fn dirty_destination_is_left_alone() {
        let temp = TempDir::new().unwrap();
        let (first, second) = saved_project(temp.path()).await;
        let dest = temp.path().join("airgap");
        run(&first, &dest).unwrap();
        fs::write(dest.join("project/README.md"), "local edit\n").unwrap();

        let err = run(&second, &dest).unwrap_err();
        assert!(matches!(err, CarryallError::DirtyDestination(_)));
        assert!(err.is_precondition());
        assert!(second.join(LEDGER_FILE_NAME).is_file());
        assert_eq!(
            fs::read_to_string(dest.join("project/README.md")).unwrap(),
            "local edit\n"
        );
    }

    #[tokio::test]
    async fn refresh_reuses_artifacts_already_in_place() {
        let temp = TempDir::new().unwrap();
        let (first, second) = saved_project(temp.path()).await;
        let dest = temp.path().join("airgap");
        run(&first, &dest).unwrap();

        // The second copy lost its image, which the first restore put in place
        fs::remove_file(second.join("alpine~~3.19.docker.tar")).unwrap();
        let report = run(&second, &dest).unwrap();
        assert_eq!(
            report.manifest.recoverable,
            vec![PathBuf::from("alpine~~3.19.docker.tar")]
        );
    }

    #[test]
    fn preflight_reports_exactly_the_missing_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        fs::create_dir_all(&source).unwrap();
        let mut ledger = Ledger::open(&source, false).unwrap();
        for name in ["a.bin", "b.bin", "c.bin"] {
            fs::write(source.join(name), name).unwrap();
            ledger.update(&source.join(name)).unwrap();
        }
        fs::remove_file(source.join("b.bin")).unwrap();

        let dest = temp.path().join("dst");
        let err = run(&source, &dest).unwrap_err();
        match err {
            CarryallError::IncompleteArchiveSet { missing, .. } => {
                assert_eq!(missing, vec![PathBuf::from("b.bin")]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(source.join("a.bin").is_file());
        assert!(source.join("c.bin").is_file());
        assert!(!dest.exists());
    }

    #[test]
    fn restore_without_home_repository_uses_saved_dir() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("usb");
        fs::create_dir_all(&source).unwrap();
        let mut ledger = Ledger::open(&source, false).unwrap();
        meta::write_save_dir(&mut ledger, Path::new("vendor")).unwrap();
        fs::write(source.join("notes.txt"), "hello").unwrap();
        ledger.update(&source.join("notes.txt")).unwrap();

        let dest = temp.path().join("dst");
        let report = run(&source, &dest).unwrap();
        assert!(report.tree.is_none());
        assert_eq!(report.archive_dir, dest.join("vendor"));
        assert_eq!(fs::read_to_string(dest.join("vendor/notes.txt")).unwrap(), "hello");
        assert!(dest.join("vendor").join(LEDGER_FILE_NAME).is_file());
    }

    #[test]
    fn restoring_in_place_moves_nothing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("downloads");
        fs::create_dir_all(&dir).unwrap();
        let mut ledger = Ledger::open(&dir, false).unwrap();
        meta::write_save_dir(&mut ledger, Path::new("downloads")).unwrap();
        fs::write(dir.join("a.bin"), "a").unwrap();
        ledger.update(&dir.join("a.bin")).unwrap();

        let report = run(&dir, temp.path()).unwrap();
        assert_eq!(report.manifest.present.len(), 2);
        assert!(dir.join(LEDGER_FILE_NAME).is_file());
        assert!(dir.join("a.bin").is_file());
    }

    #[test]
    fn tampered_source_fails_after_move() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("usb");
        fs::create_dir_all(&source).unwrap();
        let mut ledger = Ledger::open(&source, false).unwrap();
        fs::write(source.join("a.bin"), "original").unwrap();
        ledger.update(&source.join("a.bin")).unwrap();
        fs::write(source.join("a.bin"), "tampered").unwrap();

        let dest = temp.path().join("dst");
        let err = run(&source, &dest).unwrap_err();
        assert!(matches!(err, CarryallError::ChecksumMismatch { .. }));
        // Not rolled back; the ledger stays behind so the run can be repeated
        assert!(source.join(LEDGER_FILE_NAME).is_file());
    }

    #[test]
    fn two_home_archives_are_ambiguous() {
        let temp = TempDir::new().unwrap();
        let mut ledger = Ledger::open(temp.path(), false).unwrap();
        for name in ["a.git.home.tar", "b.git.home.tar"] {
            fs::write(temp.path().join(name), name).unwrap();
            ledger.update(&temp.path().join(name)).unwrap();
        }
        let err = run(temp.path(), &temp.path().join("dst")).unwrap_err();
        assert!(matches!(err, CarryallError::AmbiguousHomeRepository(_)));
    }

    #[test]
    fn missing_ledger_is_reported() {
        let temp = TempDir::new().unwrap();
        let err = run(temp.path(), &temp.path().join("dst")).unwrap_err();
        assert!(matches!(err, CarryallError::MissingLedger(_)));
    }
}
