use anyhow::{Context, Result};
use image::DynamicImage;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::pipeline::{FaceDetector, FaceRegion};

// Model URLs
const SCRFD_MODEL_URL_HF: &str = "https://huggingface.co/ykk648/face_lib/resolve/main/face_detect/scrfd_onnx/scrfd_500m_bnkps.onnx";
const SCRFD_MODEL_URL_GH: &str = "https://github.com/deepinsight/insightface/releases/download/v0.7/scrfd_500m_bnkps.onnx";
const SCRFD_MODEL_FILE: &str = "scrfd_500m_bnkps.onnx";

const INPUT_SIDE: u32 = 640;
const STRIDES: [u32; 3] = [8, 16, 32];
const MIN_FACE_PX: f32 = 8.0;

#[derive(Debug, Clone)]
pub struct ScrfdSettings {
    pub models_dir: PathBuf,
    pub auto_download: bool,
    pub confidence_threshold: f32,
    pub nms_iou_threshold: f32,
}

#[derive(Debug, Clone)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
    eyes: u8,
}

/// SCRFD face detector running on ONNX Runtime.
pub struct ScrfdDetector {
    settings: ScrfdSettings,
    session: Option<Mutex<Session>>,
}

impl ScrfdDetector {
    pub fn new(settings: ScrfdSettings) -> Self {
        Self { settings, session: None }
    }

    pub fn loaded(&self) -> bool {
        self.session.is_some()
    }

    /// Fetch the model if allowed and missing, then load it.
    pub async fn initialize(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.settings.models_dir)
            .context("Failed to create models directory")?;
        let model_path = self.settings.models_dir.join(SCRFD_MODEL_FILE);

        if self.settings.auto_download && !model_path.exists() {
            info!("Downloading SCRFD face detection model...");
            let client = reqwest::Client::new();
            if let Err(e) = download_file(&client, SCRFD_MODEL_URL_HF, &model_path).await {
                warn!("Failed to download from Hugging Face: {}. Trying GitHub...", e);
                download_file(&client, SCRFD_MODEL_URL_GH, &model_path).await?;
            }
        } else if !self.settings.auto_download {
            info!("Face model auto-download disabled by config.");
        }

        self.load(&model_path)
    }

    fn load(&mut self, model_path: &Path) -> Result<()> {
        if !model_path.exists() {
            anyhow::bail!("SCRFD model missing; expected it at {:?}", model_path);
        }
        let session = Session::builder()?
            .commit_from_file(model_path)
            .context("Failed to create SCRFD session")?;
        self.session = Some(Mutex::new(session));
        info!("Face detection model loaded from {:?}", model_path);
        Ok(())
    }

    /// Letterbox to 640x640 (NCHW, BGR, normalized to [-1, 1]).
    /// Returns the tensor data and the scale applied to the original image.
    fn preprocess(image: &DynamicImage) -> (Vec<f32>, f32) {
        let side = INPUT_SIDE as f32;
        let (ow, oh) = (image.width() as f32, image.height() as f32);
        let scale = side / ow.max(oh);
        let nw = ((ow * scale) as u32).max(1);
        let nh = ((oh * scale) as u32).max(1);
        let resized = image.resize_exact(nw, nh, image::imageops::FilterType::Triangle);
        let mut padded = DynamicImage::new_rgb8(INPUT_SIDE, INPUT_SIDE);
        image::imageops::overlay(&mut padded, &resized, 0, 0);
        let rgb = padded.to_rgb8();

        let plane = (INPUT_SIDE * INPUT_SIDE) as usize;
        let mut data = vec![0f32; 3 * plane];
        for (i, p) in rgb.pixels().enumerate() {
            // InsightFace models expect BGR
            data[i] = (p[2] as f32 - 127.5) / 128.0;
            data[plane + i] = (p[1] as f32 - 127.5) / 128.0;
            data[2 * plane + i] = (p[0] as f32 - 127.5) / 128.0;
        }
        (data, scale)
    }
}

impl FaceDetector for ScrfdDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        let mut session = self
            .session
            .as_ref()
            .context("Detection model not loaded")?
            .lock();
        let (data, scale) = Self::preprocess(image);
        let img_w = image.width() as f32;
        let img_h = image.height() as f32;

        let input_name = session.inputs[0].name.clone();
        let shape = vec![1i64, 3, INPUT_SIDE as i64, INPUT_SIDE as i64];
        let input = Value::from_array((shape, data))
            .context("Failed to create SCRFD input tensor")?;
        let outputs = session
            .run(ort::inputs![input_name => input])
            .context("SCRFD inference failed")?;

        let mut layout = named_outputs();
        let named_present = layout.iter().any(|(_, names)| {
            names.score.as_deref().is_some_and(|n| outputs.get(n).is_some())
                && names.bbox.as_deref().is_some_and(|n| outputs.get(n).is_some())
        });
        if !named_present {
            let shapes: Vec<(String, Vec<i64>)> = outputs
                .iter()
                .filter_map(|(key, value)| {
                    value
                        .try_extract_tensor::<f32>()
                        .ok()
                        .map(|(shape, _)| (key.to_string(), shape.iter().copied().collect()))
                })
                .collect();
            debug!("SCRFD: standard output names not found, shapes {:?}", shapes);
            layout = outputs_by_shape(&shapes).into_iter().collect();
        }

        let mut raw = Vec::new();
        let mut decoded_strides = 0;
        for (stride, names) in &layout {
            let stride = *stride;
            let (Some(sv), Some(bv)) = (
                names.score.as_deref().and_then(|n| outputs.get(n)),
                names.bbox.as_deref().and_then(|n| outputs.get(n)),
            ) else {
                debug!("SCRFD: no outputs for stride {}", stride);
                continue;
            };
            let (Ok((_, scores)), Ok((_, boxes))) =
                (sv.try_extract_tensor::<f32>(), bv.try_extract_tensor::<f32>())
            else {
                continue;
            };
            let kps = names
                .kps
                .as_deref()
                .and_then(|n| outputs.get(n))
                .and_then(|kv| kv.try_extract_tensor::<f32>().ok())
                .map(|(_, k)| k);

            let grid = (INPUT_SIDE / stride) as usize;
            let points = grid * grid;
            if scores.len() % points != 0 {
                warn!("SCRFD stride {}: score len {} not divisible by grid {}", stride, scores.len(), points);
                continue;
            }
            let anchors = scores.len() / points;
            let s = stride as f32;
            decoded_strides += 1;

            for i in 0..points {
                let cy = (i / grid) as f32 * s;
                let cx = (i % grid) as f32 * s;
                for a in 0..anchors {
                    let idx = i * anchors + a;
                    let confidence = scores[idx];
                    if confidence < self.settings.confidence_threshold {
                        continue;
                    }
                    let b = idx * 4;
                    let Some(deltas) = boxes.get(b..b + 4) else { continue };
                    let x1 = ((cx - deltas[0] * s) / scale).clamp(0.0, img_w);
                    let y1 = ((cy - deltas[1] * s) / scale).clamp(0.0, img_h);
                    let x2 = ((cx + deltas[2] * s) / scale).clamp(0.0, img_w);
                    let y2 = ((cy + deltas[3] * s) / scale).clamp(0.0, img_h);
                    if x2 - x1 < MIN_FACE_PX || y2 - y1 < MIN_FACE_PX {
                        continue;
                    }

                    // first two of five keypoints are the eyes
                    let eyes = kps
                        .and_then(|k| k.get(idx * 10..idx * 10 + 4))
                        .map(|k| {
                            [(k[0], k[1]), (k[2], k[3])]
                                .iter()
                                .filter(|(dx, dy)| {
                                    let ex = (cx + dx * s) / scale;
                                    let ey = (cy + dy * s) / scale;
                                    ex >= x1 && ex <= x2 && ey >= y1 && ey <= y2
                                })
                                .count() as u8
                        })
                        .unwrap_or(0);

                    raw.push(Candidate { x1, y1, x2, y2, confidence, eyes });
                }
            }
        }

        if decoded_strides == 0 {
            let keys: Vec<String> = outputs.keys().map(|k| k.to_string()).collect();
            warn!("SCRFD: no valid score/bbox outputs found (outputs: {:?})", keys);
        }

        let keep = nms(&raw, self.settings.nms_iou_threshold);
        debug!("SCRFD: {} candidates, {} after NMS", raw.len(), keep.len());
        Ok(keep
            .into_iter()
            .map(|i| {
                let c = &raw[i];
                FaceRegion {
                    x: c.x1 as u32,
                    y: c.y1 as u32,
                    width: (c.x2 - c.x1) as u32,
                    height: (c.y2 - c.y1) as u32,
                    score: c.confidence,
                    eye_count: c.eyes,
                }
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "scrfd"
    }
}

/// Output names for one stride.
#[derive(Debug, Default, Clone, PartialEq)]
struct StrideOutputs {
    score: Option<String>,
    bbox: Option<String>,
    kps: Option<String>,
}

/// The `score_<stride>` / `bbox_<stride>` / `kps_<stride>` names of the
/// reference SCRFD export.
fn named_outputs() -> Vec<(u32, StrideOutputs)> {
    STRIDES
        .into_iter()
        .map(|stride| {
            let names = StrideOutputs {
                score: Some(format!("score_{}", stride)),
                bbox: Some(format!("bbox_{}", stride)),
                kps: Some(format!("kps_{}", stride)),
            };
            (stride, names)
        })
        .collect()
}

/// Stride whose anchor grid has `rows` entries (one or two anchors per cell).
fn stride_for_rows(rows: usize) -> Option<u32> {
    STRIDES.into_iter().find(|&stride| {
        let cells = ((INPUT_SIDE / stride) * (INPUT_SIDE / stride)) as usize;
        rows == cells || rows == cells * 2
    })
}

/// Group outputs of an export with unknown names by their shapes. The last
/// dimension identifies scores (1), boxes (4) and keypoints (10); the number
/// of rows identifies the stride.
fn outputs_by_shape(shapes: &[(String, Vec<i64>)]) -> BTreeMap<u32, StrideOutputs> {
    let mut layout: BTreeMap<u32, StrideOutputs> = BTreeMap::new();
    for (name, shape) in shapes {
        let Some((&last, rest)) = shape.split_last() else { continue };
        let rows = rest.iter().map(|&d| d.max(0) as usize).product::<usize>();
        let Some(stride) = stride_for_rows(rows) else { continue };
        let entry = layout.entry(stride).or_default();
        let slot = match last {
            1 => &mut entry.score,
            4 => &mut entry.bbox,
            10 => &mut entry.kps,
            _ => continue,
        };
        slot.get_or_insert_with(|| name.clone());
    }
    layout
}

async fn download_file(client: &reqwest::Client, url: &str, path: &Path) -> Result<()> {
    let response = client
        .get(url)
        .send()
        .await
        .context(format!("Failed to download model from {}", url))?;
    if !response.status().is_success() {
        anyhow::bail!("Failed to download model: HTTP {}", response.status());
    }
    let bytes = response.bytes().await.context("Failed to read response body")?;
    // ONNX files should be at least a few KB
    if bytes.len() < 1024 {
        anyhow::bail!("Downloaded file is suspiciously small ({} bytes), may be corrupted", bytes.len());
    }
    std::fs::write(path, &bytes).context(format!("Failed to write file: {:?}", path))?;
    info!("Downloaded model to {:?} ({} bytes)", path, bytes.len());
    Ok(())
}

/// Greedy non-maximum suppression; returns kept indices, best first.
fn nms(boxes: &[Candidate], iou_threshold: f32) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..boxes.len()).collect();
    indices.sort_by(|&a, &b| {
        boxes[b]
            .confidence
            .partial_cmp(&boxes[a].confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];
    for (pos, &ia) in indices.iter().enumerate() {
        if suppressed[ia] {
            continue;
        }
        keep.push(ia);
        for &ib in indices.iter().skip(pos + 1) {
            if !suppressed[ib] && iou(&boxes[ia], &boxes[ib]) > iou_threshold {
                suppressed[ib] = true;
            }
        }
    }
    keep
}

fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);
    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }
    let intersection = (x2 - x1) * (y2 - y1);
    let union = (a.x2 - a.x1) * (a.y2 - a.y1) + (b.x2 - b.x1) * (b.y2 - b.y1) - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}
