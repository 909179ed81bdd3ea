#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::{serve, Json, Router};
use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, GrayImage, Luma};
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

use gatewatch::api::routes;
use gatewatch::pipeline::{FaceDetector, FaceRegion};
use gatewatch::store::FaceStore;
use gatewatch::upstream::Upstream;
use gatewatch::AppState;

/// Detector that reports the same regions for every frame.
pub struct FixedDetector(pub Vec<FaceRegion>);

impl FaceDetector for FixedDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

pub struct FailingDetector;

impl FaceDetector for FailingDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<FaceRegion>> {
        anyhow::bail!("model exploded")
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// One large face with both eyes, inside a 128x128 frame.
pub fn face_region() -> FaceRegion {
    FaceRegion { x: 10, y: 10, width: 100, height: 100, score: 0.95, eye_count: 2 }
}

pub fn face_detector() -> Arc<dyn FaceDetector> {
    Arc::new(FixedDetector(vec![face_region()]))
}

pub fn no_face_detector() -> Arc<dyn FaceDetector> {
    Arc::new(FixedDetector(vec![]))
}

/// Deterministic textured frame.
pub fn frame() -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(128, 128, |x, y| {
        Luma([((x / 4) * 37 + (y / 6) * 91) as u8])
    }))
}

pub fn png_base64(img: &DynamicImage) -> String {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .unwrap();
    general_purpose::STANDARD.encode(bytes)
}

type Captured = Arc<Mutex<Vec<(String, Value)>>>;

/// Stand-in for the main website: records every JSON POST it receives and
/// answers with a settable status.
#[derive(Clone)]
pub struct MockUpstream {
    pub url: String,
    received: Captured,
    status: Arc<AtomicU16>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let received: Captured = Arc::new(Mutex::new(Vec::new()));
        let status = Arc::new(AtomicU16::new(200));
        let app = Router::new()
            .fallback(capture)
            .with_state((received.clone(), status.clone()));
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            serve(listener, app.into_make_service()).await.unwrap();
        });
        Self { url: format!("http://127.0.0.1:{}", port), received, status }
    }

    pub fn respond_with(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn paths(&self) -> Vec<String> {
        self.received.lock().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn body_for(&self, path: &str) -> Option<Value> {
        self.received
            .lock()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, b)| b.clone())
    }
}

async fn capture(
    State((received, status)): State<(Captured, Arc<AtomicU16>)>,
    uri: Uri,
    Json(body): Json<Value>,
) -> StatusCode {
    received.lock().push((uri.path().to_string(), body));
    StatusCode::from_u16(status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK)
}

/// An address nothing listens on.
pub fn dead_upstream_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// Helper to make HTTP requests to test server
pub struct TestClient {
    pub base_url: String,
    pub client: reqwest::Client,
    pub state: Arc<AppState>,
    pub faces_path: PathBuf,
    _tmp: TempDir,
}

impl TestClient {
    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(format!("{}{}", self.base_url, path)).send().await
    }

    pub async fn post(&self, path: &str, json: &Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(json)
            .send()
            .await
    }

    /// POST a body verbatim with a JSON content type.
    pub async fn post_raw(&self, path: &str, body: impl Into<reqwest::Body>) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
    }
}

pub async fn spawn_app_with_store(detector: Arc<dyn FaceDetector>, upstream_url: &str, store: FaceStore) -> TestClient {
    let tmp = TempDir::new().unwrap();
    let faces_path = tmp.path().join("known_faces.json");
    let upstream = Upstream::new(upstream_url, Duration::from_secs(2)).unwrap();
    let state = Arc::new(AppState::new(faces_path.clone(), store, detector, upstream));
    let app = routes::router(state.clone());

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        serve(listener, app.into_make_service()).await.unwrap();
    });

    TestClient {
        base_url: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        state,
        faces_path,
        _tmp: tmp,
    }
}

pub async fn spawn_app(detector: Arc<dyn FaceDetector>, upstream_url: &str) -> TestClient {
    spawn_app_with_store(detector, upstream_url, FaceStore::new()).await
}
