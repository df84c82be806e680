//! The catalogue of known landmark models.
//!
//! Built once at startup (from the bundled or cached `models.json`) and
//! replaced wholesale on refresh; never mutated in place.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::domain::model_descriptor::{ModelDescriptor, ModelId};
use crate::models::domain::transfer::{partial_path, BoxError};

#[derive(Error, Debug)]
pub enum CatalogueError {
    #[error("malformed catalogue: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to access catalogue at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch catalogue from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: BoxError,
    },
}

/// What a remote catalogue offers compared to the local one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogueDiff {
    /// Ids the local catalogue does not know about.
    pub new_models: Vec<ModelId>,
    /// Ids whose remote version is strictly higher.
    pub updates: Vec<ModelId>,
}

impl CatalogueDiff {
    pub fn is_empty(&self) -> bool {
        self.new_models.is_empty() && self.updates.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRegistry {
    models: BTreeMap<ModelId, ModelDescriptor>,
}

impl ModelRegistry {
    /// Builds a registry, resolving duplicate ids in favour of the higher
    /// version (the first one seen on a tie). Descriptors whose file would
    /// land outside the model directory are dropped.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ModelDescriptor>) -> Self {
        let mut models: BTreeMap<ModelId, ModelDescriptor> = BTreeMap::new();
        for descriptor in descriptors {
            let id = descriptor.id();
            if !descriptor.has_safe_file_name() {
                log::warn!(
                    "Skipping catalogue id {id}: file {:?} escapes the model directory",
                    descriptor.file_name()
                );
                continue;
            }
            match models.get(&id) {
                Some(existing) if !descriptor.is_newer_than(existing) => {
                    log::warn!(
                        "Duplicate catalogue id {id}: keeping v{} over v{}",
                        existing.version(),
                        descriptor.version()
                    );
                }
                Some(existing) => {
                    log::warn!(
                        "Duplicate catalogue id {id}: v{} supersedes v{}",
                        descriptor.version(),
                        existing.version()
                    );
                    models.insert(id, descriptor);
                }
                None => {
                    models.insert(id, descriptor);
                }
            }
        }
        Self { models }
    }

    /// Decodes a catalogue document (a JSON array of model records).
    ///
    /// Records that fail to decode, carry a malformed hash, or name a file
    /// outside the model directory are skipped;
    /// only a document that is not an array at all is an error.
    pub fn from_json(json: &str) -> Result<Self, CatalogueError> {
        let records: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let descriptors = records
            .into_iter()
            .enumerate()
            .filter_map(|(i, record)| match serde_json::from_value::<ModelDescriptor>(record) {
                Ok(d) if d.has_valid_digest() => Some(d),
                Ok(d) => {
                    log::warn!(
                        "Skipping catalogue record {i} (id {}): malformed hash {:?}",
                        d.id(),
                        d.expected_digest()
                    );
                    None
                }
                Err(e) => {
                    log::warn!("Skipping catalogue record {i}: {e}");
                    None
                }
            });
        Ok(Self::from_descriptors(descriptors))
    }

    pub fn to_json(&self) -> Result<String, CatalogueError> {
        let records: Vec<&ModelDescriptor> = self.models.values().collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, CatalogueError> {
        let json = fs::read_to_string(path).map_err(|e| CatalogueError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&json)
    }

    /// Writes the catalogue via a temp file and rename.
    pub fn save_to_file(&self, path: &Path) -> Result<(), CatalogueError> {
        let io_err = |e: std::io::Error| CatalogueError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let temp_path = partial_path(path);
        fs::write(&temp_path, self.to_json()?).map_err(io_err)?;
        fs::rename(&temp_path, path).map_err(io_err)
    }

    pub fn get(&self, id: ModelId) -> Option<&ModelDescriptor> {
        self.models.get(&id)
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.models.contains_key(&id)
    }

    /// Descriptors in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Compares `remote` against this registry. Ids only present locally
    /// are ignored.
    pub fn diff(&self, remote: &ModelRegistry) -> CatalogueDiff {
        let mut diff = CatalogueDiff::default();
        for candidate in remote.iter() {
            match self.get(candidate.id()) {
                None => diff.new_models.push(candidate.id()),
                Some(local) if candidate.is_newer_than(local) => diff.updates.push(candidate.id()),
                Some(_) => {}
            }
        }
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HASH_A: &str = "0123456789abcdef0123456789abcdef";
    const HASH_B: &str = "fedcba9876543210fedcba9876543210";

    fn descriptor(id: u32, version: f32, hash: &str) -> ModelDescriptor {
        ModelDescriptor::new(
            ModelId(id),
            format!("model {id}"),
            format!("https://example.com/{id}.dat.bz2"),
            hash,
            version,
            format!("{id}.dat"),
        )
    }

    fn record(id: &str, version: &str, hash: &str) -> String {
        record_with_file(id, version, hash, "m.dat")
    }

    fn record_with_file(id: &str, version: &str, hash: &str, file: &str) -> String {
        format!(
            r#"{{"url":"https://example.com/m.bz2","name":"m","hash":"{hash}","id":{id},"version":{version},"file":"{file}"}}"#
        )
    }

    // ── Decoding ────────────────────────────────────────────────────

    #[test]
    fn test_from_json_decodes_records() {
        let json = format!(
            "[{},{}]",
            record("1", "1.0", HASH_A),
            record(r#""2""#, r#""1.5""#, HASH_B)
        );
        let registry = ModelRegistry::from_json(&json).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(ModelId(2)).unwrap().version(), 1.5);
    }

    #[test]
    fn test_from_json_skips_bad_records() {
        let json = format!(
            r#"[{},{},{{"name":"missing fields"}}]"#,
            record("1", "1.0", HASH_A),
            record("2", "1.0", "not-a-hash"),
        );
        let registry = ModelRegistry::from_json(&json).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(ModelId(1)));
        assert!(!registry.contains(ModelId(2)));
    }

    #[test]
    fn test_from_json_skips_files_outside_model_dir() {
        let json = format!(
            "[{},{},{}]",
            record_with_file("1", "1.0", HASH_A, "/etc/x"),
            record_with_file("2", "1.0", HASH_A, "../x"),
            record_with_file("3", "1.0", HASH_A, "sp68.dat"),
        );
        let registry = ModelRegistry::from_json(&json).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(ModelId(3)));
    }

    #[test]
    fn test_escaping_file_does_not_shadow_valid_duplicate() {
        let escaping = ModelDescriptor::new(
            ModelId(1),
            "model 1",
            "https://example.com/1.dat.bz2",
            HASH_B,
            2.0,
            "../../victim.txt",
        );
        let registry = ModelRegistry::from_descriptors([descriptor(1, 1.0, HASH_A), escaping]);
        assert_eq!(registry.get(ModelId(1)).unwrap().file_name(), "1.dat");
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        assert!(matches!(
            ModelRegistry::from_json(r#"{"models":[]}"#),
            Err(CatalogueError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_catalogue_is_valid() {
        assert!(ModelRegistry::from_json("[]").unwrap().is_empty());
    }

    // ── Duplicates ──────────────────────────────────────────────────

    #[test]
    fn test_duplicate_id_keeps_higher_version() {
        let registry = ModelRegistry::from_descriptors([
            descriptor(1, 1.0, HASH_A),
            descriptor(1, 2.0, HASH_B),
            descriptor(1, 1.5, HASH_A),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(ModelId(1)).unwrap().version(), 2.0);
    }

    #[test]
    fn test_duplicate_id_tie_keeps_first_seen() {
        let registry =
            ModelRegistry::from_descriptors([descriptor(1, 1.0, HASH_A), descriptor(1, 1.0, HASH_B)]);
        assert_eq!(registry.get(ModelId(1)).unwrap().expected_digest(), HASH_A);
    }

    // ── Diff ────────────────────────────────────────────────────────

    #[test]
    fn test_diff_reports_new_and_updated() {
        let local = ModelRegistry::from_descriptors([
            descriptor(1, 1.0, HASH_A),
            descriptor(2, 2.0, HASH_A),
            descriptor(3, 1.0, HASH_A),
        ]);
        let remote = ModelRegistry::from_descriptors([
            descriptor(1, 1.1, HASH_B),
            descriptor(2, 1.0, HASH_B),
            descriptor(4, 1.0, HASH_B),
        ]);
        let diff = local.diff(&remote);
        assert_eq!(diff.new_models, vec![ModelId(4)]);
        assert_eq!(diff.updates, vec![ModelId(1)]);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let local = ModelRegistry::from_descriptors([descriptor(1, 1.0, HASH_A)]);
        assert!(local.diff(&local.clone()).is_empty());
    }

    // ── Persistence ─────────────────────────────────────────────────

    #[test]
    fn test_save_and_load_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("models.json");
        let registry =
            ModelRegistry::from_descriptors([descriptor(1, 1.0, HASH_A), descriptor(5, 3.0, HASH_B)]);

        registry.save_to_file(&path).unwrap();
        assert!(!partial_path(&path).exists());
        assert_eq!(ModelRegistry::load_from_file(&path).unwrap(), registry);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = ModelRegistry::load_from_file(&tmp.path().join("models.json")).unwrap_err();
        assert!(matches!(err, CatalogueError::Io { .. }));
    }
}
