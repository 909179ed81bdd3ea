use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    High,
    Medium,
    Low,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
}

/// Summary of a single camera frame, as reported to the device and upstream.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub has_face: bool,
    pub face_count: usize,
    pub confidence: f64,
    pub person_name: String,
    pub is_intruder: bool,
    pub image_quality: ImageQuality,
    pub threat_level: ThreatLevel,
    pub recommendations: Vec<String>,
}

/// Payload posted to the main website's `/api/upload-image`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub floor: serde_json::Value,
    pub gate: serde_json::Value,
    pub intruder_image: String,
    pub name: String,
    pub confidence: f64,
    pub is_intruder: bool,
    pub threat_level: ThreatLevel,
    pub image_quality: ImageQuality,
    pub recommendations: Vec<String>,
    pub timestamp: String,
}
