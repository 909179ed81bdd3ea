use crate::store::FaceStore;

/// Detector confidence (0-100 scale) below which a region is never matched.
pub const MIN_DETECTION_CONFIDENCE: f64 = 40.0;
/// Global floor the winning score must clear.
pub const ACCEPTANCE_FLOOR: f32 = 0.5;
/// Scales euclidean distance into a similarity: `1 / (1 + d / DISTANCE_SCALE)`.
const DISTANCE_SCALE: f32 = 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Display name of the accepted person, `None` for no match.
    pub name: Option<String>,
    /// Best combined score seen among candidates that passed their own threshold.
    pub score: f32,
}

impl MatchOutcome {
    fn no_match(score: f32) -> Self {
        Self { name: None, score }
    }

    pub fn is_match(&self) -> bool {
        self.name.is_some()
    }
}

/// Cosine similarity; 0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Mean of cosine similarity and the distance-derived similarity.
/// Vectors of different dimensionality are not comparable and score 0.
pub fn combined_score(query: &[f32], stored: &[f32]) -> f32 {
    if query.len() != stored.len() {
        return 0.0;
    }
    let cosine = cosine_similarity(query, stored);
    let distance = 1.0 / (1.0 + euclidean_distance(query, stored) / DISTANCE_SCALE);
    (cosine + distance) / 2.0
}

/// Best match for `query` among the people in `store`.
///
/// A candidate is considered only when its best score beats its own
/// `confidence_threshold`; the winner must additionally beat
/// [`ACCEPTANCE_FLOOR`]. Ties keep the first candidate in store order.
pub fn find_best_match(query: &[f32], detection_confidence: f64, store: &FaceStore) -> MatchOutcome {
    if store.is_empty() || detection_confidence < MIN_DETECTION_CONFIDENCE {
        return MatchOutcome::no_match(0.0);
    }

    let mut best: Option<(&str, f32)> = None;
    for (_, record) in store.records() {
        let Some(score) = record
            .feature_vectors
            .iter()
            .map(|stored| combined_score(query, stored))
            .reduce(f32::max)
        else {
            continue;
        };
        if score <= record.confidence_threshold {
            continue;
        }
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((record.name.as_str(), score));
        }
    }

    match best {
        Some((name, score)) if score > ACCEPTANCE_FLOOR => MatchOutcome {
            name: Some(name.to_string()),
            score,
        },
        Some((_, score)) => MatchOutcome::no_match(score),
        None => MatchOutcome::no_match(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::face::{DEFAULT_CONFIDENCE_THRESHOLD, FEATURE_DIM};

    fn v() -> Vec<f32> {
        (0..FEATURE_DIM).map(|i| (i % 7) as f32 * 10.0 + 1.0).collect()
    }

    fn store_with(entries: &[(&str, &str, f32, Vec<f32>)]) -> FaceStore {
        let mut store = FaceStore::new();
        for (id, name, threshold, vector) in entries {
            store.upsert(id, name, vector.clone(), *threshold);
        }
        store
    }

    #[test]
    fn test_identical_vector_scores_one() {
        let q = v();
        assert!((combined_score(&q, &q) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_norm_cosine_is_zero() {
        let zeros = vec![0.0; FEATURE_DIM];
        assert_eq!(cosine_similarity(&zeros, &v()), 0.0);
        // distance term alone still contributes
        let s = combined_score(&zeros, &zeros);
        assert!((s - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mismatched_dimensions_score_zero() {
        assert_eq!(combined_score(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_empty_store_never_matches() {
        let outcome = find_best_match(&v(), 99.0, &FaceStore::new());
        assert!(!outcome.is_match());
    }

    #[test]
    fn test_alice_matches_herself() {
        let store = store_with(&[("alice", "Alice", DEFAULT_CONFIDENCE_THRESHOLD, v())]);
        let outcome = find_best_match(&v(), 80.0, &store);
        assert_eq!(outcome.name.as_deref(), Some("Alice"));
        assert!((outcome.score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_negated_vector_does_not_match() {
        let store = store_with(&[("alice", "Alice", DEFAULT_CONFIDENCE_THRESHOLD, v())]);
        let neg: Vec<f32> = v().iter().map(|x| -x).collect();
        assert!((cosine_similarity(&neg, &v()) + 1.0).abs() < 1e-6);
        assert!(combined_score(&neg, &v()) < 0.5);
        assert!(!find_best_match(&neg, 80.0, &store).is_match());
    }

    #[test]
    fn test_low_detection_confidence_short_circuits() {
        let store = store_with(&[("alice", "Alice", DEFAULT_CONFIDENCE_THRESHOLD, v())]);
        assert!(!find_best_match(&v(), 39.9, &store).is_match());
        assert!(find_best_match(&v(), 40.0, &store).is_match());
    }

    #[test]
    fn test_person_without_vectors_is_skipped() {
        let mut store = FaceStore::load(std::path::Path::new("/nonexistent/known_faces.json"));
        store.upsert("alice", "Alice", v(), 0.8);
        let json = r#"{"ghost": {"name": "Ghost", "confidence_threshold": 0.0, "face_encodings": []}}"#;
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("f.json");
        std::fs::write(&path, json).unwrap();
        let ghost_only = FaceStore::load(&path);
        assert!(!find_best_match(&v(), 80.0, &ghost_only).is_match());
        assert!(find_best_match(&v(), 80.0, &store).is_match());
    }

    #[test]
    fn test_below_global_floor_is_rejected() {
        // orthogonal-ish query: cosine 0, distance term tiny
        let stored: Vec<f32> = (0..FEATURE_DIM).map(|i| if i % 2 == 0 { 900.0 } else { 0.0 }).collect();
        let query: Vec<f32> = (0..FEATURE_DIM).map(|i| if i % 2 == 1 { 900.0 } else { 0.0 }).collect();
        let store = store_with(&[("lax", "Lax", 0.0, stored)]);
        let outcome = find_best_match(&query, 80.0, &store);
        assert!(outcome.score > 0.0 && outcome.score < ACCEPTANCE_FLOOR);
        assert!(!outcome.is_match());
    }

    #[test]
    fn test_per_person_threshold_filters_candidate() {
        let mut close = v();
        close[0] += 400.0;
        let score = combined_score(&close, &v());
        assert!(score > 0.5 && score < 0.99);
        let strict = store_with(&[("alice", "Alice", 0.99, v())]);
        assert!(!find_best_match(&close, 80.0, &strict).is_match());
        let lenient = store_with(&[("alice", "Alice", 0.5, v())]);
        assert!(find_best_match(&close, 80.0, &lenient).is_match());
    }

    #[test]
    fn test_best_of_several_people_and_vectors() {
        let mut far = v();
        far[3] += 300.0;
        let store = store_with(&[
            ("alice", "Alice", 0.5, far.clone()),
            ("bob", "Bob", 0.5, far),
            ("bob", "Bob", 0.5, v()),
        ]);
        let outcome = find_best_match(&v(), 80.0, &store);
        assert_eq!(outcome.name.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_tie_keeps_first_in_store_order() {
        let store = store_with(&[("zed", "Zed", 0.5, v()), ("amy", "Amy", 0.5, v())]);
        let outcome = find_best_match(&v(), 80.0, &store);
        assert_eq!(outcome.name.as_deref(), Some("Amy"));
    }
}
