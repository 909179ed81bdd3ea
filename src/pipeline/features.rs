use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::edges::canny;

use crate::models::face::FEATURE_DIM;
use crate::pipeline::FaceRegion;

/// Side of the square canvas a face is resized to before featurizing.
pub const FACE_CANVAS: u32 = 100;
const INTENSITY_BINS: usize = 32;
const EDGE_BINS: usize = 16;
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

/// Cut `region` out of the frame, clamped to the frame bounds and never empty.
pub fn crop_face(gray: &GrayImage, region: &FaceRegion) -> GrayImage {
    let (w, h) = gray.dimensions();
    let x = region.x.min(w.saturating_sub(1));
    let y = region.y.min(h.saturating_sub(1));
    let cw = region.width.min(w - x).max(1);
    let ch = region.height.min(h - y).max(1);
    imageops::crop_imm(gray, x, y, cw, ch).to_image()
}

/// Counts of pixel values in `bins` equal-width buckets over [0, 256).
fn histogram(image: &GrayImage, bins: usize) -> Vec<f32> {
    let mut counts = vec![0f32; bins];
    for p in image.pixels() {
        counts[p[0] as usize * bins / 256] += 1.0;
    }
    counts
}

/// 48-component descriptor of a grayscale face: a 32-bin intensity histogram
/// of the 100x100 resized face, then a 16-bin histogram of its Canny edge map.
pub fn extract_features(face: &GrayImage) -> Vec<f32> {
    let resized = imageops::resize(face, FACE_CANVAS, FACE_CANVAS, FilterType::Triangle);
    let edges = canny(&resized, CANNY_LOW, CANNY_HIGH);

    let mut features = Vec::with_capacity(FEATURE_DIM);
    features.extend(histogram(&resized, INTENSITY_BINS));
    features.extend(histogram(&edges, EDGE_BINS));
    features
}
