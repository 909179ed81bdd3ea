use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::api::error::ApiError;
use crate::models::analysis::{Analysis, UploadReport};
use crate::pipeline::analysis::{self, FrameError};
use crate::upstream::{EVACUATION_PATH, ML_DATA_PATH, UPLOAD_IMAGE_PATH};
use crate::AppState;

fn timestamp() -> String {
    chrono::Local::now().to_rfc3339()
}

/// Non-empty JSON object body, or the standard 400.
pub(crate) fn require_object(payload: Option<Json<Value>>) -> Result<Map<String, Value>, ApiError> {
    match payload {
        Some(Json(Value::Object(map))) if !map.is_empty() => Ok(map),
        _ => Err(ApiError::bad_request("No data provided")),
    }
}

/// `data[key]` when the key is present (even if null), otherwise `default`.
fn field_or(data: &Map<String, Value>, key: &str, default: Value) -> Value {
    data.get(key).cloned().unwrap_or(default)
}

pub(crate) fn string_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let known_faces = state.store.lock().len();
    let body = json!({
        "status": "healthy",
        "timestamp": timestamp(),
        "service": "image-processor",
        "version": env!("CARGO_PKG_VERSION"),
        "detector": state.detector.name(),
        "known_faces": known_faces,
        "stats": state.stats.snapshot(),
    });
    (StatusCode::OK, Json(body))
}

pub async fn process_image(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let data = require_object(payload)?;
    let image_data = string_field(&data, "image").ok_or_else(|| ApiError::bad_request("No image data provided"))?;
    let gate = field_or(&data, "gate", json!(1));
    let floor = field_or(&data, "floor", gate.clone());

    info!("Processing image from Gate {}, Floor {}", gate, floor);

    let analysis = {
        let state = state.clone();
        let image_data = image_data.clone();
        tokio::task::spawn_blocking(move || -> Result<Analysis, ApiError> {
            let frame = analysis::decode_frame(&image_data).map_err(|e: FrameError| {
                error!("Error processing image: {}", e);
                ApiError::InvalidImage
            })?;
            let regions = state.detector.detect(&frame)?;
            let store = state.store.lock();
            Ok(analysis::analyze(&frame, &regions, &store))
        })
        .await??
    };
    state.stats.record_frame(analysis.face_count, analysis.has_face && analysis.is_intruder);

    let report = UploadReport {
        floor: floor.clone(),
        gate: gate.clone(),
        intruder_image: image_data,
        name: analysis.person_name.clone(),
        confidence: analysis.confidence,
        is_intruder: analysis.is_intruder,
        threat_level: analysis.threat_level,
        image_quality: analysis.image_quality,
        recommendations: analysis.recommendations.clone(),
        timestamp: timestamp(),
    };
    if !state.upstream.forward(UPLOAD_IMAGE_PATH, &report, "analysis").await {
        state.stats.inc_forward_failures();
    }

    // an empty frame also reports isIntruder; only an unmatched face raises the alert
    if analysis.has_face && analysis.is_intruder {
        let alert = json!({
            "floor": floor,
            "node": gate,
            "dataType": "intruder_alert",
            "prediction": "intruder",
            "confidence": analysis.confidence,
            "evacuationRoute": null,
            "threatLevel": analysis.threat_level,
        });
        if !state.upstream.forward(ML_DATA_PATH, &alert, "intruder alert").await {
            state.stats.inc_forward_failures();
        }
    }

    let person_name = analysis.person_name.clone();
    Ok((StatusCode::OK, Json(json!({
        "status": "success",
        "analysis": analysis,
        "gate": gate,
        "floor": floor,
        "personName": person_name,
        "timestamp": timestamp(),
    }))))
}

/// Forward `payload` and translate the upstream verdict into our response.
async fn relay(state: &AppState, path: &str, payload: &Value, ok_message: &str, fail_message: &str) -> Result<impl IntoResponse, ApiError> {
    match state.upstream.post_json(path, payload).await {
        Ok(status) if status == reqwest::StatusCode::OK => {
            info!("Successfully forwarded to {} for Floor {}", path, payload["floor"]);
            Ok((StatusCode::OK, Json(json!({"status": "success", "message": ok_message}))))
        }
        Ok(status) => {
            error!("Upstream {} answered {}", path, status);
            state.stats.inc_forward_failures();
            Err(ApiError::Internal(fail_message.to_string()))
        }
        Err(e) => {
            state.stats.inc_forward_failures();
            Err(ApiError::from(e))
        }
    }
}

pub async fn ml_data(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let data = require_object(payload)?;
    let forwarded = json!({
        "floor": field_or(&data, "floor", Value::Null),
        "node": field_or(&data, "node", json!(1)),
        "dataType": field_or(&data, "dataType", json!("prediction")),
        "prediction": field_or(&data, "prediction", json!("normal")),
        "confidence": field_or(&data, "confidence", json!(0.95)),
        "evacuationRoute": field_or(&data, "evacuationRoute", Value::Null),
        "threatLevel": field_or(&data, "threatLevel", json!("low")),
    });
    relay(&state, ML_DATA_PATH, &forwarded, "ML data forwarded", "Failed to forward ML data").await
}

pub async fn evacuation_update(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let data = require_object(payload)?;
    let forwarded = json!({
        "floor": field_or(&data, "floor", Value::Null),
        "status": field_or(&data, "status", json!("safe")),
        "threats": field_or(&data, "threats", json!([])),
        "evacuationTime": field_or(&data, "evacuationTime", json!(3)),
        "capacity": field_or(&data, "capacity", json!(50)),
        "routes": field_or(&data, "routes", json!(["main", "secondary", "emergency"])),
    });
    relay(&state, EVACUATION_PATH, &forwarded, "Evacuation updated", "Failed to update evacuation").await
}
