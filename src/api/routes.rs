use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::{routing::{get, post}, Router};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use crate::api::{handlers, handlers_face};
use crate::AppState;

/// Camera frames arrive base64-encoded inside JSON.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(vec![axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/process-image", post(handlers::process_image))
        .route("/ml-data", post(handlers::ml_data))
        .route("/evacuation-update", post(handlers::evacuation_update))
        .route("/train-face", post(handlers_face::train_face))
        .route("/known-faces", get(handlers_face::known_faces))
        // one limit for every route, answered with 413 before extraction
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}
