use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::models::face::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::pipeline::{features, FaceDetector};
use crate::store::{person_id_for, FaceStore};

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadReport {
    /// (display name, vectors stored) per person that yielded at least one face.
    pub persons: Vec<(String, usize)>,
    pub images_seen: usize,
    pub images_skipped: usize,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Immediate children of `dir`, sorted by file name.
fn children(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
}

/// Feature vector of the first face in the image at `path`, if any.
fn featurize(path: &Path, detector: &dyn FaceDetector) -> Result<Option<Vec<f32>>> {
    let frame = image::io::Reader::open(path)?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("decoding {}", path.display()))?;
    let regions = detector.detect(&frame)?;
    Ok(regions.first().map(|region| {
        let gray = frame.to_luma8();
        features::extract_features(&features::crop_face(&gray, region))
    }))
}

/// Walk a `<dir>/<person name>/<image>` tree and add every detected face to
/// `store`. Each subdirectory name is the person's display name. Images
/// without a face or that fail to decode are logged and skipped.
pub fn load_face_dir(dir: &Path, detector: &dyn FaceDetector, store: &mut FaceStore) -> Result<LoadReport> {
    if !dir.is_dir() {
        anyhow::bail!("face data directory {} not found", dir.display());
    }

    let mut report = LoadReport::default();
    for person_dir in children(dir).filter(|p| p.is_dir()) {
        let Some(name) = person_dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            warn!("Skipping non UTF-8 directory {:?}", person_dir);
            continue;
        };
        info!("Processing {}...", name);

        let images: Vec<PathBuf> = children(&person_dir).filter(|p| p.is_file() && is_image(p)).collect();
        report.images_seen += images.len();

        let vectors: Vec<Vec<f32>> = images
            .par_iter()
            .map(|path| (path, featurize(path, detector)))
            .collect::<Vec<_>>()
            .into_iter()
            .filter_map(|(path, result)| match result {
                Ok(Some(v)) => Some(v),
                Ok(None) => {
                    warn!("No face detected in {}", path.display());
                    None
                }
                Err(e) => {
                    warn!("Error processing {}: {:#}", path.display(), e);
                    None
                }
            })
            .collect();
        report.images_skipped += images.len() - vectors.len();

        if vectors.is_empty() {
            warn!("No valid faces found for {}", name);
            continue;
        }
        let created = vectors.len();
        let person_id = person_id_for(&name);
        let mut stored = 0;
        for v in vectors {
            stored = store.upsert(&person_id, &name, v, DEFAULT_CONFIDENCE_THRESHOLD);
        }
        info!("{}: {} face encodings created, {} kept", name, created, stored);
        report.persons.push((name, stored));
    }
    Ok(report)
}

/// Build the store file at `output` from `dir`. With `merge` the existing
/// file is loaded first and the new samples appended; otherwise it is
/// replaced. Fails without touching `output` when no face was found.
pub fn load_into_file(dir: &Path, output: &Path, merge: bool, detector: &dyn FaceDetector) -> Result<(FaceStore, LoadReport)> {
    let mut store = if merge { FaceStore::load(output) } else { FaceStore::new() };
    let report = load_face_dir(dir, detector, &mut store)?;
    if report.persons.is_empty() {
        anyhow::bail!("No face data found in {}", dir.display());
    }
    store.save(output).with_context(|| format!("saving {}", output.display()))?;
    Ok((store, report))
}
