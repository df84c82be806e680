use thiserror::Error;

use crate::detection::domain::landmarks::LandmarkSet;
use crate::shared::frame::{Frame, FrameGeometry};
use crate::shared::recovery::Recovery;
use crate::shared::region::Region;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("native analysis failed: {0}")]
    Native(String),
    #[error("native analysis returned {0} values, expected x/y pairs")]
    MalformedOutput(usize),
    #[error("native analysis panicked: {0}")]
    Panicked(String),
}

impl AnalysisError {
    pub fn recovery(&self) -> Recovery {
        Recovery::FaceOnlyFallback
    }
}

/// Domain interface for the native landmark runtime.
///
/// Blocking and potentially slow. Called from a background thread, never
/// concurrently with itself, and only while a model is loaded.
pub trait AnalysisPort: Send + Sync {
    fn analyze(
        &self,
        frame: &Frame,
        geometry: FrameGeometry,
        region: &Region,
    ) -> Result<LandmarkSet, AnalysisError>;
}
