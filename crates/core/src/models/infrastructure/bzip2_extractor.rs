use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use bzip2::read::BzDecoder;

use crate::models::domain::transfer::{partial_path, Extractor, TransferError};

/// Decompresses `.bz2` model archives.
///
/// Output is streamed into `<dest>.part` and renamed into place, so a
/// corrupt archive never leaves a truncated model behind.
#[derive(Debug, Default)]
pub struct Bzip2Extractor;

impl Bzip2Extractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for Bzip2Extractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), TransferError> {
        let temp_path = partial_path(dest);
        let result = extract_inner(archive, dest, &temp_path);
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }
}

fn extract_inner(archive: &Path, dest: &Path, temp_path: &Path) -> Result<(), TransferError> {
    let input = fs::File::open(archive).map_err(|e| TransferError::Extract {
        path: archive.to_path_buf(),
        source: e,
    })?;
    let output = fs::File::create(temp_path).map_err(|e| TransferError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    })?;

    let mut decoder = BzDecoder::new(BufReader::new(input));
    let mut writer = BufWriter::new(output);
    // Decoder errors and writer errors both surface as io::Error here;
    // either way the archive could not be unpacked.
    let bytes = io::copy(&mut decoder, &mut writer).map_err(|e| TransferError::Extract {
        path: archive.to_path_buf(),
        source: e,
    })?;
    writer.flush().map_err(|e| TransferError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    })?;
    drop(writer);

    fs::rename(temp_path, dest).map_err(|e| TransferError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;
    log::info!("Extracted {bytes} bytes to {}", dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzip2::write::BzEncoder;
    use bzip2::Compression;
    use tempfile::TempDir;

    fn compress(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_extracts_archive() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("m.dat.download");
        let dest = tmp.path().join("m.dat");
        let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 7) as u8).collect();
        fs::write(&archive, compress(&payload)).unwrap();

        Bzip2Extractor::new().extract(&archive, &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), payload);
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_corrupt_archive_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("m.dat.download");
        let dest = tmp.path().join("m.dat");
        fs::write(&archive, b"definitely not bzip2").unwrap();

        let result = Bzip2Extractor::new().extract(&archive, &dest);

        assert!(matches!(result, Err(TransferError::Extract { .. })));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_extract_leaves_same_stem_sibling_alone() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("models.dat.download");
        let dest = tmp.path().join("models.dat");
        let sibling = tmp.path().join("models.part");
        fs::write(&sibling, b"catalogue in flight").unwrap();
        fs::write(&archive, compress(b"landmarks")).unwrap();

        Bzip2Extractor::new().extract(&archive, &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"landmarks");
        assert_eq!(fs::read(&sibling).unwrap(), b"catalogue in flight");
    }

    #[test]
    fn test_missing_archive_is_extract_error() {
        let tmp = TempDir::new().unwrap();
        let result = Bzip2Extractor::new().extract(&tmp.path().join("nope"), &tmp.path().join("m.dat"));
        assert!(matches!(result, Err(TransferError::Extract { .. })));
    }
}
