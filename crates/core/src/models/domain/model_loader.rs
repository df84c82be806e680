use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
#[error("native runtime rejected model {path}: {reason}")]
pub struct LoadError {
    pub path: PathBuf,
    pub reason: String,
}

impl LoadError {
    pub fn new(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Domain interface for the native landmark runtime's model loader.
///
/// A successful load replaces whatever model the runtime held before; there
/// is no separate unload step. Called only while the swap lock is held.
pub trait ModelLoader: Send + Sync {
    fn load_model(&self, path: &Path) -> Result<(), LoadError>;
}
