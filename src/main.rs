use std::net::SocketAddr;
use std::sync::Arc;

use gatewatch::pipeline::FaceDetector;
use gatewatch::store::FaceStore;
use gatewatch::upstream::Upstream;
use gatewatch::utils::config::Config;
use gatewatch::utils::logging;
use gatewatch::AppState;
use tracing::info;

#[cfg(feature = "facial-recognition")]
async fn build_detector(cfg: &Config) -> Arc<dyn FaceDetector> {
    use gatewatch::pipeline::face::{ScrfdDetector, ScrfdSettings};

    let mut detector = ScrfdDetector::new(ScrfdSettings {
        models_dir: cfg.models_dir.clone(),
        auto_download: cfg.face_auto_download,
        confidence_threshold: cfg.face_confidence_threshold,
        nms_iou_threshold: cfg.face_nms_iou_threshold,
    });
    // Keep serving without a model; detection requests fail until it is provided.
    if let Err(e) = detector.initialize().await {
        tracing::error!("Failed to initialize face detector: {:#}", e);
    }
    Arc::new(detector)
}

#[cfg(not(feature = "facial-recognition"))]
async fn build_detector(_cfg: &Config) -> Arc<dyn FaceDetector> {
    tracing::warn!("Built without facial-recognition; frames will be rejected");
    Arc::new(gatewatch::pipeline::DisabledDetector)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("info");
    let cfg = Config::from_env();

    let store = FaceStore::load(&cfg.faces_path);
    let upstream = Upstream::new(&cfg.upstream_url, cfg.forward_timeout)?;
    let detector = build_detector(&cfg).await;

    info!("Main website URL: {}", upstream.base_url());
    let state = Arc::new(AppState::new(cfg.faces_path.clone(), store, detector, upstream));
    let app = gatewatch::api::routes::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Image processor listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
