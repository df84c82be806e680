use std::fmt;

/// The one user-facing resolution every failure maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Recovery {
    /// Offer to run the same operation again.
    PromptRetry,
    /// Offer to delete the local model file and fetch it again.
    PromptRedownload,
    /// Nothing to ask; keep drawing face boxes without landmarks.
    FaceOnlyFallback,
}

impl fmt::Display for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recovery::PromptRetry => write!(f, "retry"),
            Recovery::PromptRedownload => write!(f, "re-download"),
            Recovery::FaceOnlyFallback => write!(f, "face-only"),
        }
    }
}
