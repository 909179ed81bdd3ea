use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use gatewatch::loader;
use gatewatch::pipeline::FaceDetector;
use gatewatch::utils::{config::Config, logging};
use tracing::info;

/// Build known_faces.json from a directory of labeled face images.
#[derive(Parser)]
#[command(name = "load-faces", version)]
struct Cli {
    /// Directory with one subdirectory of images per person
    #[arg(short, long, default_value = "face_data")]
    dir: PathBuf,
    /// Store file to write (defaults to GATEWATCH_FACES_PATH)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Append to the existing store instead of replacing it
    #[arg(long)]
    merge: bool,
}

#[cfg(feature = "facial-recognition")]
async fn build_detector(cfg: &Config) -> Result<Arc<dyn FaceDetector>> {
    use anyhow::Context;
    use gatewatch::pipeline::face::{ScrfdDetector, ScrfdSettings};

    let mut detector = ScrfdDetector::new(ScrfdSettings {
        models_dir: cfg.models_dir.clone(),
        auto_download: cfg.face_auto_download,
        confidence_threshold: cfg.face_confidence_threshold,
        nms_iou_threshold: cfg.face_nms_iou_threshold,
    });
    detector.initialize().await.context("Failed to initialize face detector")?;
    Ok(Arc::new(detector))
}

#[cfg(not(feature = "facial-recognition"))]
async fn build_detector(_cfg: &Config) -> Result<Arc<dyn FaceDetector>> {
    anyhow::bail!("load-faces requires the facial-recognition feature")
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");
    let cli = Cli::parse();
    let cfg = Config::from_env();
    let output = cli.output.unwrap_or_else(|| cfg.faces_path.clone());

    let detector = build_detector(&cfg).await?;
    let (dir, merge, target) = (cli.dir, cli.merge, output.clone());
    let (store, report) = tokio::task::spawn_blocking(move || {
        loader::load_into_file(&dir, &target, merge, detector.as_ref())
    })
    .await??;

    info!("Saved {} known faces to {}", store.len(), output.display());
    info!("Images: {} seen, {} skipped", report.images_seen, report.images_skipped);
    for (name, count) in &report.persons {
        info!("  - {}: {} encodings", name, count);
    }
    Ok(())
}
