use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::models::domain::transfer::{partial_path, Downloader, ProgressFn, TransferError};
use crate::models::registry::{CatalogueError, ModelRegistry};

/// Report progress at most once per this many bytes.
const PROGRESS_STEP: u64 = 1024 * 1024;
const READ_BUF_SIZE: usize = 64 * 1024;

/// Blocking HTTP(S) downloader.
///
/// The body is streamed into `<dest>.part` and renamed into place once
/// complete, so `dest` only ever holds a full download.
#[derive(Debug, Default)]
pub struct HttpDownloader;

impl HttpDownloader {
    pub fn new() -> Self {
        Self
    }

    /// Fetches and decodes a remote catalogue.
    pub fn fetch_catalogue(&self, url: &str) -> Result<ModelRegistry, CatalogueError> {
        let fetch_err = |e: reqwest::Error| CatalogueError::Fetch {
            url: url.to_string(),
            source: Box::new(e),
        };
        let body = reqwest::blocking::get(url)
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(fetch_err)?;
        ModelRegistry::from_json(&body)
    }
}

impl Downloader for HttpDownloader {
    fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<(), TransferError> {
        let temp_path = partial_path(dest);
        let result = download_inner(url, dest, &temp_path, progress);
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), TransferError> {
    let download_err = |e: reqwest::Error| TransferError::Download {
        url: url.to_string(),
        source: Box::new(e),
    };
    let write_err = |e: std::io::Error| TransferError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut last_reported: u64 = 0;

    let mut file = fs::File::create(temp_path).map_err(write_err)?;
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = response.read(&mut buf).map_err(|e| TransferError::Download {
            url: url.to_string(),
            source: Box::new(e),
        })?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if downloaded - last_reported >= PROGRESS_STEP {
            last_reported = downloaded;
            if let Some(ref cb) = progress {
                cb(downloaded, total);
            }
        }
    }
    if let Some(ref cb) = progress {
        cb(downloaded, total);
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| TransferError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;
    log::info!("Downloaded {downloaded} bytes from {url}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_download_invalid_url_returns_error() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.dat.download");
        let result = HttpDownloader::new().download("http://invalid.nonexistent.example.com/m", &dest, None);
        assert!(matches!(result, Err(TransferError::Download { .. })));
    }

    #[test]
    fn test_download_atomic_no_partial_on_failure() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.dat.download");
        let _ = HttpDownloader::new().download("http://invalid.nonexistent.example.com/m", &dest, None);
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_fetch_catalogue_invalid_url_returns_error() {
        let result = HttpDownloader::new().fetch_catalogue("http://invalid.nonexistent.example.com/models.json");
        assert!(matches!(result, Err(CatalogueError::Fetch { .. })));
    }
}
