//! On-disk layout of downloaded models.
//!
//! Each model lives at `<dir>/<file>`. While a model is being fetched its
//! compressed archive sits next to it as `<dir>/<file>.download`; neither
//! file survives a failed transfer.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::domain::model_descriptor::ModelDescriptor;
use crate::models::domain::transfer::{Downloader, Extractor, ProgressFn, TransferError};
use crate::models::integrity::{self, Verification};
use crate::shared::constants::{ARCHIVE_SUFFIX, CATALOGUE_FILE_NAME};

/// Platform-specific model directory.
///
/// - macOS: `~/Library/Application Support/FaceMark/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceMark/models/` or `~/.cache/FaceMark/models/`
/// - Windows: `%LOCALAPPDATA%/FaceMark/models/`
pub fn default_model_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir().map(|d| d.join("FaceMark").join("models"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir().map(|d| d.join("FaceMark").join("models"))
    }
}

pub struct ModelStore {
    dir: PathBuf,
    downloader: Arc<dyn Downloader>,
    extractor: Arc<dyn Extractor>,
}

impl ModelStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        downloader: Arc<dyn Downloader>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            dir: dir.into(),
            downloader,
            extractor,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn catalogue_path(&self) -> PathBuf {
        self.dir.join(CATALOGUE_FILE_NAME)
    }

    pub fn path_of(&self, descriptor: &ModelDescriptor) -> PathBuf {
        self.dir.join(descriptor.file_name())
    }

    pub fn archive_path_of(&self, descriptor: &ModelDescriptor) -> PathBuf {
        self.dir
            .join(format!("{}.{ARCHIVE_SUFFIX}", descriptor.file_name()))
    }

    pub fn exists(&self, descriptor: &ModelDescriptor) -> bool {
        self.path_of(descriptor).is_file()
    }

    /// Downloads the descriptor's archive next to the model file.
    pub fn download_archive(
        &self,
        descriptor: &ModelDescriptor,
        progress: Option<ProgressFn>,
    ) -> Result<PathBuf, TransferError> {
        fs::create_dir_all(&self.dir).map_err(|e| TransferError::Write {
            path: self.dir.clone(),
            source: e,
        })?;
        let archive = self.archive_path_of(descriptor);
        log::info!("Downloading {} from {}", descriptor.name(), descriptor.url());
        if let Err(e) = self.downloader.download(descriptor.url(), &archive, progress) {
            remove_quietly(&archive);
            return Err(e);
        }
        Ok(archive)
    }

    /// Unpacks a previously downloaded archive into the model file and
    /// removes the archive. On failure both files are removed.
    pub fn extract_archive(&self, descriptor: &ModelDescriptor) -> Result<PathBuf, TransferError> {
        let archive = self.archive_path_of(descriptor);
        let dest = self.path_of(descriptor);
        log::info!("Extracting {}", archive.display());
        let result = self.extractor.extract(&archive, &dest);
        remove_quietly(&archive);
        if let Err(e) = result {
            remove_quietly(&dest);
            return Err(e);
        }
        log::info!("Model {} ready at {}", descriptor.id(), dest.display());
        Ok(dest)
    }

    /// Checks the local file against the catalogue digest. Read failures
    /// other than a missing file are errors.
    pub fn verify(&self, descriptor: &ModelDescriptor) -> std::io::Result<Verification> {
        integrity::verify(&self.path_of(descriptor), descriptor.expected_digest())
    }

    /// Removes the model file and any leftover archive. Missing files are
    /// not an error.
    pub fn delete(&self, descriptor: &ModelDescriptor) -> std::io::Result<()> {
        remove_quietly(&self.archive_path_of(descriptor));
        match fs::remove_file(self.path_of(descriptor)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != ErrorKind::NotFound {
            log::warn!("Failed to remove {}: {e}", path.display());
        }
    }
}
