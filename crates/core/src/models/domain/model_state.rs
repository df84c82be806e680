use std::fmt;

/// Lifecycle state of one catalogue model.
///
/// `Absent → Downloading → Extracting → Verifying → Loaded | Corrupted`,
/// with `Failed` reachable from any transfer, verify or load stage.
/// `Available` marks a local file that is not (or no longer) loaded in the
/// runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelState {
    Absent,
    Downloading,
    Extracting,
    Verifying,
    Loaded,
    Available,
    Corrupted,
    Failed,
}

impl ModelState {
    /// States during which a background job owns the model's files.
    pub fn is_transferring(self) -> bool {
        matches!(self, ModelState::Downloading | ModelState::Extracting)
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModelState::Absent => "absent",
            ModelState::Downloading => "downloading",
            ModelState::Extracting => "extracting",
            ModelState::Verifying => "verifying",
            ModelState::Loaded => "loaded",
            ModelState::Available => "available",
            ModelState::Corrupted => "corrupted",
            ModelState::Failed => "failed",
        };
        write!(f, "{label}")
    }
}
