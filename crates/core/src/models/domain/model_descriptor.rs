use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Deserializer, Serialize};

use crate::shared::constants::DIGEST_HEX_LEN;

/// Catalogue identifier of a landmark model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub u32);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One entry of the model catalogue. Immutable once decoded.
///
/// Serialises to the catalogue record format:
/// `{"url", "name", "hash", "id", "version", "file"}`. On input, `id` and
/// `version` may be JSON numbers or numeric strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    url: String,
    name: String,
    #[serde(rename = "hash")]
    expected_digest: String,
    #[serde(deserialize_with = "lenient_id")]
    id: ModelId,
    #[serde(deserialize_with = "lenient_version")]
    version: f32,
    #[serde(rename = "file")]
    file_name: String,
}

impl ModelDescriptor {
    pub fn new(
        id: ModelId,
        name: impl Into<String>,
        url: impl Into<String>,
        expected_digest: impl Into<String>,
        version: f32,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            expected_digest: expected_digest.into(),
            id,
            version,
            file_name: file_name.into(),
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn expected_digest(&self) -> &str {
        &self.expected_digest
    }

    pub fn version(&self) -> f32 {
        self.version
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Whether the catalogue hash is a well-formed 32-char hex digest.
    pub fn has_valid_digest(&self) -> bool {
        self.expected_digest.len() == DIGEST_HEX_LEN
            && self.expected_digest.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Whether `file` names a path inside the model directory: relative,
    /// non-empty, and made only of plain components (no `..`, no root).
    pub fn has_safe_file_name(&self) -> bool {
        let path = Path::new(&self.file_name);
        !self.file_name.is_empty()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
    }

    pub fn is_newer_than(&self, other: &ModelDescriptor) -> bool {
        self.version > other.version
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(u64),
    Float(f64),
    Text(String),
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ModelId, D::Error> {
    use serde::de::Error;
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Int(v) => u32::try_from(v)
            .map(ModelId)
            .map_err(|_| D::Error::custom(format!("model id out of range: {v}"))),
        NumberOrString::Float(v) => Err(D::Error::custom(format!("model id must be an integer: {v}"))),
        NumberOrString::Text(s) => s
            .trim()
            .parse::<u32>()
            .map(ModelId)
            .map_err(|e| D::Error::custom(format!("invalid model id {s:?}: {e}"))),
    }
}

fn lenient_version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    use serde::de::Error;
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Int(v) => Ok(v as f32),
        NumberOrString::Float(v) => Ok(v as f32),
        NumberOrString::Text(s) => s
            .trim()
            .parse::<f32>()
            .map_err(|e| D::Error::custom(format!("invalid model version {s:?}: {e}"))),
    }
}
