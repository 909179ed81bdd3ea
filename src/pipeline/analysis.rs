use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, GrayImage};
use thiserror::Error;
use tracing::debug;

use crate::matcher;
use crate::models::analysis::{Analysis, ImageQuality, ThreatLevel};
use crate::pipeline::{features, FaceRegion};
use crate::store::FaceStore;

const HIGH_SHARPNESS: f64 = 1000.0;
const MEDIUM_SHARPNESS: f64 = 500.0;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid image data")]
    Image(#[from] image::ImageError),
}

/// Decode a base64 frame as sent by the camera. A `data:image/...;base64,`
/// prefix is accepted and stripped, as is whitespace anywhere in the payload.
pub fn decode_frame(payload: &str) -> Result<DynamicImage, FrameError> {
    let encoded = if payload.starts_with("data:image") {
        payload.split_once(',').map(|(_, rest)| rest).unwrap_or("")
    } else {
        payload
    };
    // camera firmware may wrap long payloads
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = general_purpose::STANDARD.decode(compact)?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Mirror an out-of-range index without repeating the edge (`gfedcb|abcdefgh|gfedcba`).
fn reflect_101(i: i64, n: i64) -> u32 {
    if n == 1 {
        return 0;
    }
    let i = if i < 0 {
        -i
    } else if i >= n {
        2 * (n - 1) - i
    } else {
        i
    };
    i as u32
}

/// Variance of the 4-neighbour Laplacian, borders reflected around the edge pixel.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let (wi, hi) = (w as i64, h as i64);
    let px = |x: i64, y: i64| -> f64 { gray.get_pixel(reflect_101(x, wi), reflect_101(y, hi))[0] as f64 };
    let n = (w as f64) * (h as f64);
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let l = px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1) - 4.0 * px(x, y);
            sum += l;
            sum_sq += l * l;
        }
    }
    let mean = sum / n;
    sum_sq / n - mean * mean
}

pub fn quality_from_variance(variance: f64) -> ImageQuality {
    if variance > HIGH_SHARPNESS {
        ImageQuality::High
    } else if variance > MEDIUM_SHARPNESS {
        ImageQuality::Medium
    } else {
        ImageQuality::Low
    }
}

/// Heuristic 0-100 confidence from face size, with a bonus when both eyes
/// were found. Ranges over 60..=105.
pub fn region_confidence(region: &FaceRegion) -> f64 {
    let by_area = (region.area() as f64 / 10_000.0 * 100.0).clamp(60.0, 95.0);
    if region.eye_count >= 2 {
        by_area + 10.0
    } else {
        by_area
    }
}

pub fn threat_level(analysis: &Analysis) -> ThreatLevel {
    if analysis.is_intruder && analysis.confidence > 70.0 {
        ThreatLevel::High
    } else if analysis.has_face && analysis.confidence > 50.0 {
        ThreatLevel::Medium
    } else {
        ThreatLevel::Low
    }
}

pub fn recommendations(analysis: &Analysis) -> Vec<String> {
    let mut out = Vec::new();
    let primary = if !analysis.has_face {
        "No face detected - check camera positioning"
    } else if analysis.confidence < 70.0 {
        "Low confidence detection - manual review recommended"
    } else if analysis.is_intruder {
        "Unknown person detected - security alert"
    } else {
        "Known person detected - access granted"
    };
    out.push(primary.to_string());
    if analysis.image_quality == ImageQuality::Low {
        out.push("Image quality is low - improve lighting".to_string());
    }
    out
}

/// Build the frame summary from detected regions, matching each face against
/// the store. The last region processed decides the reported identity.
pub fn analyze(frame: &DynamicImage, regions: &[FaceRegion], store: &FaceStore) -> Analysis {
    let gray = frame.to_luma8();
    let mut analysis = Analysis {
        has_face: !regions.is_empty(),
        face_count: regions.len(),
        confidence: 0.0,
        person_name: "Unknown".to_string(),
        is_intruder: true,
        image_quality: quality_from_variance(laplacian_variance(&gray)),
        threat_level: ThreatLevel::Low,
        recommendations: Vec::new(),
    };

    for region in regions {
        let confidence = region_confidence(region);
        analysis.confidence = analysis.confidence.max(confidence);

        let roi = features::crop_face(&gray, region);
        let query = features::extract_features(&roi);
        let outcome = matcher::find_best_match(&query, confidence, store);
        debug!("Face at ({}, {}) {}x{}: confidence {:.1}, match score {:.3}",
            region.x, region.y, region.width, region.height, confidence, outcome.score);
        match outcome.name {
            Some(name) => {
                analysis.person_name = name;
                analysis.is_intruder = false;
            }
            None => {
                analysis.person_name = "Intruder".to_string();
                analysis.is_intruder = true;
            }
        }
    }

    analysis.threat_level = threat_level(&analysis);
    analysis.recommendations = recommendations(&analysis);
    analysis
}
