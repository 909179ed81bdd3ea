use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub upstream_url: String,
    pub faces_path: PathBuf,
    pub models_dir: PathBuf,
    pub forward_timeout: Duration,
    pub face_auto_download: bool,
    pub face_confidence_threshold: f32,
    pub face_nms_iou_threshold: f32,
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| !matches!(v.as_str(), "0" | "false" | "FALSE"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("GATEWATCH_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(5000);
        let upstream_url = env::var("MAIN_WEBSITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let faces_path = env::var("GATEWATCH_FACES_PATH").unwrap_or_else(|_| "known_faces.json".to_string());
        let models_dir = env::var("GATEWATCH_MODELS").unwrap_or_else(|_| "models".to_string());
        let timeout_secs = env::var("GATEWATCH_FORWARD_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(10);
        let face_auto_download = env_flag("GATEWATCH_FACE_AUTO_DOWNLOAD", true);
        let face_confidence_threshold = env::var("GATEWATCH_FACE_CONFIDENCE_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(0.5);
        let face_nms_iou_threshold = env::var("GATEWATCH_FACE_NMS_IOU_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(0.4);
        Self {
            port,
            upstream_url,
            faces_path: PathBuf::from(faces_path),
            models_dir: PathBuf::from(models_dir),
            forward_timeout: Duration::from_secs(timeout_secs),
            face_auto_download,
            face_confidence_threshold,
            face_nms_iou_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "GATEWATCH_PORT",
        "MAIN_WEBSITE_URL",
        "GATEWATCH_FACES_PATH",
        "GATEWATCH_MODELS",
        "GATEWATCH_FORWARD_TIMEOUT_SECS",
        "GATEWATCH_FACE_AUTO_DOWNLOAD",
        "GATEWATCH_FACE_CONFIDENCE_THRESHOLD",
        "GATEWATCH_FACE_NMS_IOU_THRESHOLD",
    ];

    fn clear_vars(vars: &[&str]) -> Vec<(String, Option<String>)> {
        let mut saved = Vec::new();
        for &k in vars {
            let prev = env::var(k).ok();
            saved.push((k.to_string(), prev));
            env::remove_var(k);
        }
        saved
    }

    fn restore_vars(saved: Vec<(String, Option<String>)>) {
        for (k, v) in saved {
            if let Some(val) = v {
                env::set_var(k, val);
            } else {
                env::remove_var(k);
            }
        }
    }

    // Both cases share one test: the process environment is global and
    // tests run in parallel.
    #[test]
    fn test_config_defaults_and_overrides() {
        let saved = clear_vars(VARS);

        let config = Config::from_env();
        assert_eq!(config.port, 5000);
        assert_eq!(config.upstream_url, "http://localhost:3000");
        assert_eq!(config.faces_path, PathBuf::from("known_faces.json"));
        assert_eq!(config.models_dir, PathBuf::from("models"));
        assert_eq!(config.forward_timeout, Duration::from_secs(10));
        assert!(config.face_auto_download);
        assert_eq!(config.face_confidence_threshold, 0.5);
        assert_eq!(config.face_nms_iou_threshold, 0.4);

        env::set_var("GATEWATCH_PORT", "8081");
        env::set_var("MAIN_WEBSITE_URL", "http://site:4000");
        env::set_var("GATEWATCH_FACES_PATH", "/data/faces.json");
        env::set_var("GATEWATCH_MODELS", "/data/models");
        env::set_var("GATEWATCH_FORWARD_TIMEOUT_SECS", "3");
        env::set_var("GATEWATCH_FACE_AUTO_DOWNLOAD", "0");
        env::set_var("GATEWATCH_FACE_CONFIDENCE_THRESHOLD", "0.35");
        env::set_var("GATEWATCH_FACE_NMS_IOU_THRESHOLD", "bogus");

        let config = Config::from_env();
        assert_eq!(config.port, 8081);
        assert_eq!(config.upstream_url, "http://site:4000");
        assert_eq!(config.faces_path, PathBuf::from("/data/faces.json"));
        assert_eq!(config.models_dir, PathBuf::from("/data/models"));
        assert_eq!(config.forward_timeout, Duration::from_secs(3));
        assert!(!config.face_auto_download);
        assert_eq!(config.face_confidence_threshold, 0.35);
        assert_eq!(config.face_nms_iou_threshold, 0.4);

        restore_vars(saved);
    }
}
