mod common;

use common::*;
use serde_json::Value;

#[tokio::test]
async fn test_health_reports_service_and_detector() {
    let app = spawn_app(face_detector(), &dead_upstream_url()).await;

    let resp = app.get("/health").await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "image-processor");
    assert_eq!(body["detector"], "fixed");
    assert_eq!(body["known_faces"], 0);
    assert!(body["timestamp"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["stats"]["frames_processed"], 0);
}

#[tokio::test]
async fn test_health_counts_frames_after_processing() {
    let upstream = MockUpstream::start().await;
    let app = spawn_app(face_detector(), &upstream.url).await;

    let payload = serde_json::json!({"image": png_base64(&frame()), "gate": 2});
    assert_eq!(app.post("/process-image", &payload).await.unwrap().status(), 200);

    let body: Value = app.get("/health").await.unwrap().json().await.unwrap();
    assert_eq!(body["stats"]["frames_processed"], 1);
    assert_eq!(body["stats"]["faces_detected"], 1);
    assert_eq!(body["stats"]["intruders_flagged"], 1);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = spawn_app(face_detector(), &dead_upstream_url()).await;
    assert_eq!(app.get("/nope").await.unwrap().status(), 404);
}
