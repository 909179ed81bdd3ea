use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{error, info};

pub const UPLOAD_IMAGE_PATH: &str = "/api/upload-image";
pub const ML_DATA_PATH: &str = "/api/ml-data";
pub const EVACUATION_PATH: &str = "/api/evacuation-update";

/// Client for the main website that receives analysis results.
#[derive(Clone, Debug)]
pub struct Upstream {
    base_url: String,
    client: reqwest::Client,
}

impl Upstream {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create upstream HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST `payload` as JSON and return the upstream status.
    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, payload: &T) -> Result<StatusCode> {
        let url = self.url(path);
        let resp = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;
        Ok(resp.status())
    }

    /// POST and log the outcome; failures never reach the caller.
    /// Returns whether upstream answered 200.
    pub async fn forward<T: Serialize + ?Sized>(&self, path: &str, payload: &T, what: &str) -> bool {
        match self.post_json(path, payload).await {
            Ok(status) if status == StatusCode::OK => {
                info!("Forwarded {} to {}", what, path);
                true
            }
            Ok(status) => {
                error!("Upstream rejected {} at {}: {}", what, path, status);
                false
            }
            Err(e) => {
                error!("Error sending {} upstream: {:#}", what, e);
                false
            }
        }
    }
}
