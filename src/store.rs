use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::face::{FaceRecord, KnownFace, FEATURE_DIM, MAX_VECTORS_PER_PERSON};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize face store: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Derive the stable key for a display name: lowercase, spaces to underscores.
pub fn person_id_for(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// In-memory map of known people, flushed wholesale to a JSON document.
///
/// Records are ordered by person id, which keeps matcher tie-breaking stable
/// across restarts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceStore {
    records: BTreeMap<String, FaceRecord>,
}

impl FaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from `path`. A missing or malformed file yields an empty
    /// store; the cause is logged.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No face store at {:?}, starting empty", path);
                return Self::new();
            }
            Err(e) => {
                warn!("Failed to read face store {:?}: {}", path, e);
                return Self::new();
            }
        };
        match serde_json::from_str::<BTreeMap<String, FaceRecord>>(&raw) {
            Ok(records) => {
                info!("Loaded {} known faces from {:?}", records.len(), path);
                Self { records }
            }
            Err(e) => {
                warn!("Malformed face store {:?}: {}", path, e);
                Self::new()
            }
        }
    }

    /// Rewrite the whole backing file.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(&self.records)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        std::fs::write(path, data).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Append `vector` to the person's list, creating the record when absent,
    /// and evict the oldest vectors past the cap. Returns the new vector count.
    ///
    /// The threshold only applies to a newly created record.
    pub fn upsert(&mut self, person_id: &str, name: &str, vector: Vec<f32>, threshold: f32) -> usize {
        debug_assert_eq!(vector.len(), FEATURE_DIM, "feature vector for {} has the wrong length", person_id);
        let record = self
            .records
            .entry(person_id.to_string())
            .or_insert_with(|| FaceRecord::new(name, threshold));
        record.feature_vectors.push(vector);
        let len = record.feature_vectors.len();
        if len > MAX_VECTORS_PER_PERSON {
            record.feature_vectors.drain(..len - MAX_VECTORS_PER_PERSON);
        }
        record.feature_vectors.len()
    }

    pub fn get(&self, person_id: &str) -> Option<&FaceRecord> {
        self.records.get(person_id)
    }

    pub fn records(&self) -> impl Iterator<Item = (&String, &FaceRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn known_faces(&self) -> Vec<KnownFace> {
        self.records
            .iter()
            .map(|(id, r)| KnownFace {
                id: id.clone(),
                name: r.name.clone(),
                encodings_count: r.feature_vectors.len(),
                confidence_threshold: r.confidence_threshold,
            })
            .collect()
    }
}
