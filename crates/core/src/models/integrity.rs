//! Content digests for downloaded model files.
//!
//! The catalogue publishes a 32-char lowercase hex MD5 per model. Files are
//! hashed in fixed-size chunks so memory stays bounded for large models.

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

use md5::{Digest, Md5};

use crate::shared::constants::DIGEST_CHUNK_SIZE;

/// Returned by [`digest`] when there is nothing to hash.
pub const MISSING_DIGEST: &str = "";

/// Outcome of comparing a local file against its catalogue digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    Match,
    Mismatch { actual: String },
    Missing,
}

/// Lowercase hex MD5 of the file at `path`, or [`MISSING_DIGEST`] if the
/// file does not exist or cannot be read.
pub fn digest(path: &Path) -> String {
    match try_digest(path) {
        Ok(hex) => hex,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                log::warn!("Failed to hash {}: {e}", path.display());
            }
            MISSING_DIGEST.to_string()
        }
    }
}

/// Like [`digest`], but keeps the read error instead of folding it into
/// the sentinel.
pub fn try_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; DIGEST_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// Compares the file's digest with `expected` (case-insensitive).
///
/// A file that does not exist is [`Verification::Missing`]; any other read
/// failure is returned as an error, since it says nothing about the
/// file's content.
pub fn verify(path: &Path, expected: &str) -> io::Result<Verification> {
    let actual = match try_digest(path) {
        Ok(hex) => hex,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Verification::Missing),
        Err(e) => return Err(e),
    };
    if actual.eq_ignore_ascii_case(expected) {
        Ok(Verification::Match)
    } else {
        Ok(Verification::Mismatch { actual })
    }
}
