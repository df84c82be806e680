use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to extract {path}: {source}")]
    Extract {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Temporary sibling that a write to `dest` goes through: `<dest>.part`.
///
/// The suffix is appended, so `models.json` and `models.dat` never share
/// a temp file.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name: OsString = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Progress callback: `(bytes_done, total_bytes)`.
/// `total_bytes` is 0 when the size is not known up front.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Fetches a remote resource into a local file.
///
/// Implementations must not leave `dest` (or any temporary next to it)
/// behind when they fail.
pub trait Downloader: Send + Sync {
    fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<(), TransferError>;
}

/// Unpacks a downloaded archive into the final model file.
///
/// Implementations must not leave a partial `dest` behind when they fail.
pub trait Extractor: Send + Sync {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), TransferError>;
}
