use serde::{Deserialize, Serialize};

/// 32 intensity bins followed by 16 edge bins.
pub const FEATURE_DIM: usize = 48;
pub const MAX_VECTORS_PER_PERSON: usize = 5;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.8;

fn default_threshold() -> f32 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

/// One known person. The person id is the key this record is stored under.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FaceRecord {
    pub name: String,
    #[serde(default = "default_threshold")]
    pub confidence_threshold: f32,
    /// Oldest first. Serialized under the legacy `face_encodings` key.
    #[serde(rename = "face_encodings", default)]
    pub feature_vectors: Vec<Vec<f32>>,
}

impl FaceRecord {
    pub fn new(name: impl Into<String>, confidence_threshold: f32) -> Self {
        Self {
            name: name.into(),
            confidence_threshold,
            feature_vectors: Vec::new(),
        }
    }
}

/// Row returned by `GET /known-faces`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KnownFace {
    pub id: String,
    pub name: String,
    pub encodings_count: usize,
    pub confidence_threshold: f32,
}
