use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::api::error::ApiError;
use crate::api::handlers::{require_object, string_field};
use crate::models::face::{KnownFace, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::pipeline::{analysis, features};
use crate::store::person_id_for;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TrainFaceResp {
    pub status: &'static str,
    pub message: String,
    pub person_id: String,
    pub encodings_count: usize,
}

#[derive(Debug, Serialize)]
pub struct KnownFacesResp {
    pub status: &'static str,
    pub faces: Vec<KnownFace>,
    pub total_faces: usize,
}

/// Add one sample of a named person's face to the store and persist it.
pub async fn train_face(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let data = require_object(payload)?;
    let (Some(name), Some(image_data)) = (string_field(&data, "name"), string_field(&data, "image")) else {
        return Err(ApiError::bad_request("Name and image are required"));
    };

    let resp = tokio::task::spawn_blocking(move || -> Result<TrainFaceResp, ApiError> {
        let frame = analysis::decode_frame(&image_data).map_err(|e| {
            error!("Error decoding training image for {}: {}", name, e);
            ApiError::InvalidImage
        })?;
        let regions = state.detector.detect(&frame)?;
        let Some(region) = regions.first() else {
            return Err(ApiError::bad_request("No face detected in image"));
        };
        let gray = frame.to_luma8();
        let vector = features::extract_features(&features::crop_face(&gray, region));

        let person_id = person_id_for(&name);
        let mut store = state.store.lock();
        let encodings_count = store.upsert(&person_id, &name, vector, DEFAULT_CONFIDENCE_THRESHOLD);
        // the in-memory sample stays even when the flush fails
        if let Err(e) = store.save(&state.faces_path) {
            error!("Error saving known faces to {:?}: {}", state.faces_path, e);
        }
        drop(store);
        state.stats.inc_trained();

        info!("Trained face for {} ({} encodings)", name, encodings_count);
        Ok(TrainFaceResp {
            status: "success",
            message: format!("Face trained successfully for {}", name),
            person_id,
            encodings_count,
        })
    })
    .await??;

    Ok((StatusCode::OK, Json(resp)))
}

pub async fn known_faces(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let faces = state.store.lock().known_faces();
    let total_faces = faces.len();
    (StatusCode::OK, Json(KnownFacesResp { status: "success", faces, total_faces }))
}
