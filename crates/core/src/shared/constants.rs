pub const CATALOGUE_URL: &str =
    "https://github.com/Luca96/dlib-minified-models/raw/master/face_landmarks/models.json";
pub const CATALOGUE_FILE_NAME: &str = "models.json";

/// Face candidates must score strictly above this (0-100 scale).
pub const CONFIDENCE_THRESHOLD: i32 = 30;

/// Camera drivers report face rectangles in `[-1000, 1000]` on both axes.
pub const DRIVER_COORD_MIN: i32 = -1000;
pub const DRIVER_COORD_MAX: i32 = 1000;

/// Capture crops are taken slightly larger than the detected face.
pub const CAPTURE_SCALE: f32 = 1.1;

pub const DIGEST_CHUNK_SIZE: usize = 8192;
pub const DIGEST_HEX_LEN: usize = 32;

/// Suffix of the compressed archive kept next to a model while it downloads.
pub const ARCHIVE_SUFFIX: &str = "download";

pub const DEFAULT_STALL_WARNING_MS: u64 = 5000;
