//! HTTP transfer collaborator
//!
//! Downloads go to `<dest>.download` first and are renamed over `dest` only
//! once complete. A leftover partial file is resumed with a range request
//! when the server supports it.

use crate::error::{CarryallError, CarryallResult};
use crate::ui::{DownloadProgress, UiContext};
use async_trait::async_trait;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Suffix of in-progress downloads
pub const PARTIAL_SUFFIX: &str = ".download";

/// Fetches remote files onto disk
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Download `url` to `dest`, replacing any existing file
    ///
    /// With `executable`, the file is made executable once in place.
    async fn fetch(&self, url: &str, dest: &Path, executable: bool) -> CarryallResult<()>;
}

/// `Transfer` over HTTP(S)
#[derive(Clone)]
pub struct HttpTransfer {
    agent: ureq::Agent,
    ui: UiContext,
}

impl HttpTransfer {
    pub fn new(ui: UiContext) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .user_agent(concat!("carryall/", env!("CARGO_PKG_VERSION")))
            .build()
            .into();
        Self { agent, ui }
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn fetch(&self, url: &str, dest: &Path, executable: bool) -> CarryallResult<()> {
        info!("Downloading {}", url);
        let agent = self.agent.clone();
        let url = url.to_string();
        let dest = dest.to_path_buf();
        let label = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.clone());
        let progress = DownloadProgress::new(&self.ui, &label);

        tokio::task::spawn_blocking(move || {
            let result = download(&agent, &url, &dest, &progress);
            progress.finish();
            result?;
            if executable {
                make_executable(&dest)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| CarryallError::Internal(format!("download task failed: {}", e)))?
    }
}

/// Path of the partial download for `dest`
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

fn download(
    agent: &ureq::Agent,
    url: &str,
    dest: &Path,
    progress: &DownloadProgress,
) -> CarryallResult<()> {
    let failed = |reason: String| CarryallError::Download {
        url: url.to_string(),
        reason,
    };

    let partial = partial_path(dest);
    let offset = fs::metadata(&partial).map(|m| m.len()).unwrap_or(0);

    let mut request = agent.get(url);
    if offset > 0 {
        debug!("Resuming {} from byte {}", partial.display(), offset);
        request = request.header("Range", format!("bytes={}-", offset));
    }
    let mut response = request.call().map_err(|e| failed(e.to_string()))?;

    let status = response.status().as_u16();
    let mut out = match status {
        206 => OpenOptions::new().append(true).open(&partial),
        200 => File::create(&partial),
        416 if offset > 0 => {
            debug!("Server reports {} already complete", partial.display());
            return finish(&partial, dest);
        }
        code => return Err(failed(format!("HTTP {}", code))),
    }
    .map_err(|e| CarryallError::io(format!("opening {}", partial.display()), e))?;

    let already = if status == 206 { offset } else { 0 };
    let remaining = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    progress.start(already, remaining.map(|r| r + already));

    let mut reader = response.body_mut().as_reader();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(|e| failed(e.to_string()))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])
            .map_err(|e| CarryallError::io(format!("writing {}", partial.display()), e))?;
        progress.advance(n as u64);
    }
    out.flush()
        .map_err(|e| CarryallError::io(format!("flushing {}", partial.display()), e))?;
    drop(out);

    finish(&partial, dest)
}

/// Move a completed partial download into place
fn finish(partial: &Path, dest: &Path) -> CarryallResult<()> {
    if dest.exists() {
        fs::remove_file(dest)
            .map_err(|e| CarryallError::io(format!("replacing {}", dest.display()), e))?;
    }
    fs::rename(partial, dest).map_err(|e| {
        CarryallError::io(
            format!("moving {} to {}", partial.display(), dest.display()),
            e,
        )
    })?;
    info!("Download saved to {}", dest.display());
    Ok(())
}

#[cfg(unix)]
pub(crate) fn make_executable(path: &Path) -> CarryallResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| CarryallError::io(format!("setting executable mode on {}", path.display()), e))
}

#[cfg(not(unix))]
pub(crate) fn make_executable(_path: &Path) -> CarryallResult<()> {
    Ok(())
}
