//! Capturing the carryall executable with the artifacts
//!
//! The restore side needs a binary for its own platform. When that matches
//! the host the running executable is copied; otherwise the release build is
//! downloaded and checked against the release checksum file.

use super::meta;
use super::move_file;
use crate::error::{CarryallError, CarryallResult};
use crate::ledger::{checksum_file, parse_checksums, Ledger, LEDGER_FILE_NAME};
use crate::transfer::Transfer;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// File name of the saved executable
pub const TOOL_BINARY_NAME: &str = "carryall";

/// Where and for which platform to obtain the executable
#[derive(Debug, Clone)]
pub struct ToolRelease {
    /// Target platform as `<os>_<arch>`
    pub platform: String,
    /// Release base URL
    pub base_url: String,
    /// Release version path component, e.g. `v0.3.0`
    pub version: String,
}

impl ToolRelease {
    /// Name of the release asset for the target platform
    pub fn asset_name(&self) -> String {
        format!("{}_{}", TOOL_BINARY_NAME, self.platform)
    }

    fn url(&self, file: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.version,
            file
        )
    }
}

/// Platform of the running executable, as `<os>_<arch>`
pub fn host_platform() -> String {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };
    format!("{}_{}", os, arch)
}

/// Store the executable for `release.platform` in the ledger directory
///
/// Returns the saved path and whether anything had to be copied or fetched.
pub async fn save_tool(
    ledger: &Mutex<Ledger>,
    release: &ToolRelease,
    transfer: &dyn Transfer,
) -> CarryallResult<(PathBuf, bool)> {
    let dir = ledger.lock().await.directory().to_path_buf();
    let dest = dir.join(TOOL_BINARY_NAME);

    if release.platform == host_platform() {
        let exe = std::env::current_exe()
            .map_err(|e| CarryallError::io("locating the running executable", e))?;
        let expected = checksum_file(&exe)?;
        let changed = capture(ledger, &dest, &expected, |dest| {
            debug!("Copying {} to {}", exe.display(), dest.display());
            fs::copy(&exe, dest)
                .map(|_| ())
                .map_err(|e| CarryallError::io(format!("copying {}", exe.display()), e))
        })
        .await?;
        return Ok((dest, changed));
    }

    let expected = release_checksum(release, &dir, transfer).await?;
    if is_current(ledger, &dest, &expected).await? {
        return Ok((dest, false));
    }

    let asset = release.asset_name();
    let staged = dir.join(format!("{}{}", asset, crate::transfer::PARTIAL_SUFFIX));
    let url = release.url(&asset);
    info!("Fetching {} for {}", TOOL_BINARY_NAME, release.platform);
    transfer.fetch(&url, &staged, true).await?;

    let actual = checksum_file(&staged)?;
    if actual != expected {
        fs::remove_file(&staged).ok();
        return Err(CarryallError::ChecksumMismatch {
            path: PathBuf::from(url),
            expected,
            actual,
        });
    }
    move_file(&staged, &dest)?;
    record(ledger, &dest).await?;
    Ok((dest, true))
}

/// Expected hash of the release asset, from the release checksum file
async fn release_checksum(
    release: &ToolRelease,
    dir: &Path,
    transfer: &dyn Transfer,
) -> CarryallResult<String> {
    let url = release.url(LEDGER_FILE_NAME);
    let sums = dir.join(format!(".{}-{}", TOOL_BINARY_NAME, LEDGER_FILE_NAME));
    transfer.fetch(&url, &sums, false).await?;
    let text = fs::read_to_string(&sums)
        .map_err(|e| CarryallError::io(format!("reading {}", sums.display()), e));
    fs::remove_file(&sums).ok();

    let asset = release.asset_name();
    parse_checksums(&text?)
        .into_iter()
        .find(|(_, name)| *name == asset)
        .map(|(hash, _)| hash)
        .ok_or_else(|| CarryallError::Download {
            url,
            reason: format!("no checksum listed for {}", asset),
        })
}

async fn is_current(ledger: &Mutex<Ledger>, dest: &Path, expected: &str) -> CarryallResult<bool> {
    let mut ledger = ledger.lock().await;
    if ledger.is_matching(dest, expected) && checksum_file(dest)? == expected {
        debug!("{} already saved", dest.display());
        ledger.keep(dest);
        meta::binmark(&mut ledger, dest)?;
        return Ok(true);
    }
    Ok(false)
}

/// Place the executable with `place` unless the saved copy already matches
async fn capture<F>(
    ledger: &Mutex<Ledger>,
    dest: &Path,
    expected: &str,
    place: F,
) -> CarryallResult<bool>
where
    F: FnOnce(&Path) -> CarryallResult<()>,
{
    if is_current(ledger, dest, expected).await? {
        return Ok(false);
    }
    place(dest)?;
    record(ledger, dest).await?;
    Ok(true)
}

async fn record(ledger: &Mutex<Ledger>, dest: &Path) -> CarryallResult<()> {
    let mut ledger = ledger.lock().await;
    ledger.update(dest)?;
    meta::binmark(&mut ledger, dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::FakeTransfer;
    use tempfile::TempDir;

    fn release(platform: &str) -> ToolRelease {
        ToolRelease {
            platform: platform.to_string(),
            base_url: "https://releases.example.com/".to_string(),
            version: "v0.3.0".to_string(),
        }
    }

    #[test]
    fn host_platform_shape() {
        let platform = host_platform();
        assert_eq!(platform.split('_').count(), 2, "{platform}");
    }

    #[test]
    fn release_urls() {
        let release = release("linux_arm64");
        assert_eq!(release.asset_name(), "carryall_linux_arm64");
        assert_eq!(
            release.url("checksum.txt"),
            "https://releases.example.com/v0.3.0/checksum.txt"
        );
    }

    #[tokio::test]
    async fn host_platform_copies_running_executable() {
        let temp = TempDir::new().unwrap();
        let ledger = Mutex::new(Ledger::open(temp.path(), false).unwrap());
        let transfer = FakeTransfer::default();

        let (saved, changed) = save_tool(&ledger, &release(&host_platform()), &transfer)
            .await
            .unwrap();
        assert!(changed);
        assert!(saved.is_file());
        assert!(meta::binmark_path(&saved).is_file());
        assert_eq!(transfer.calls(), 0);

        let ledger = Mutex::new(Ledger::open(temp.path(), false).unwrap());
        let (_, changed) = save_tool(&ledger, &release(&host_platform()), &transfer)
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn other_platform_is_downloaded_and_verified() {
        let temp = TempDir::new().unwrap();
        let ledger = Mutex::new(Ledger::open(temp.path(), false).unwrap());

        let binary = b"release binary".to_vec();
        let hash = crate::sync::tests::sha256_hex(&binary);
        let transfer = FakeTransfer::default()
            .serve(
                "https://releases.example.com/v0.3.0/checksum.txt",
                format!("{hash}  carryall_plan9_mips\n").into_bytes(),
            )
            .serve(
                "https://releases.example.com/v0.3.0/carryall_plan9_mips",
                binary,
            );

        let (saved, changed) = save_tool(&ledger, &release("plan9_mips"), &transfer)
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(checksum_file(&saved).unwrap(), hash);
        assert!(ledger.lock().await.is_matching(&saved, &hash));

        // Second run only fetches the checksum list
        let before = transfer.calls();
        let (_, changed) = save_tool(&ledger, &release("plan9_mips"), &transfer)
            .await
            .unwrap();
        assert!(!changed);
        assert_eq!(transfer.calls(), before + 1);
    }

    #[tokio::test]
    async fn tampered_release_is_rejected() {
        let temp = TempDir::new().unwrap();
        let ledger = Mutex::new(Ledger::open(temp.path(), false).unwrap());
        let transfer = FakeTransfer::default()
            .serve(
                "https://releases.example.com/v0.3.0/checksum.txt",
                format!("{}  carryall_plan9_mips\n", "0".repeat(64)).into_bytes(),
            )
            .serve(
                "https://releases.example.com/v0.3.0/carryall_plan9_mips",
                b"evil".to_vec(),
            );

        let err = save_tool(&ledger, &release("plan9_mips"), &transfer)
            .await
            .unwrap_err();
        assert!(matches!(err, CarryallError::ChecksumMismatch { .. }));
        assert!(!temp.path().join(TOOL_BINARY_NAME).exists());
    }
}
