pub mod api;
pub mod loader;
pub mod matcher;
pub mod models;
pub mod pipeline;
pub mod stats;
pub mod store;
pub mod upstream;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;
use parking_lot::Mutex;

use crate::pipeline::FaceDetector;
use crate::store::FaceStore;
use crate::upstream::Upstream;

/// Everything a request handler needs. Cloned per request through `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub faces_path: PathBuf,
    pub store: Arc<Mutex<FaceStore>>,
    pub detector: Arc<dyn FaceDetector>,
    pub upstream: Upstream,
    pub stats: Arc<stats::Stats>,
}

impl AppState {
    pub fn new(faces_path: PathBuf, store: FaceStore, detector: Arc<dyn FaceDetector>, upstream: Upstream) -> Self {
        Self {
            faces_path,
            store: Arc::new(Mutex::new(store)),
            detector,
            upstream,
            stats: Arc::new(stats::Stats::new()),
        }
    }
}
