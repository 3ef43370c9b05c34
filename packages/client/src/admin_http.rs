//! HTTP client for the backend's configuration and container endpoints.

use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;

use crate::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AdminApi {
    client: Client,
    base_url: String,
}

impl AdminApi {
    /// `base_url` is the backend origin, e.g. `http://127.0.0.1:8000`
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch the host configuration document
    pub async fn load_config(&self) -> Result<Value, ClientError> {
        let response = self.client.get(self.url("/config")).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    /// Validate `text` as JSON and store it as the host configuration
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] when `text` is not JSON; no request is
    /// made in that case.
    pub async fn save_config(&self, text: &str) -> Result<(), ClientError> {
        let config: Value =
            serde_json::from_str(text).map_err(|e| ClientError::Validation(e.to_string()))?;
        self.post_json("/config", &config).await
    }

    pub async fn update_world_properties(&self, properties: &Value) -> Result<(), ClientError> {
        self.post_json("/api/world-properties", properties).await
    }

    pub async fn restart_container(&self) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url("/api/restart-container"))
            .send()
            .await?;
        ensure_success(response).await?;
        tracing::info!("Container restart requested");
        Ok(())
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<(), ClientError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        ensure_success(response).await?;
        tracing::debug!("POST {} succeeded", path);
        Ok(())
    }
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = error_detail(&body);
    tracing::warn!("Backend answered {}: {}", status, detail);
    Err(ClientError::Http {
        status: status.as_u16(),
        detail,
    })
}

/// The `detail` field of an error body, or the raw body
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("detail").map(detail_text))
        .unwrap_or_else(|| body.trim().to_string())
}

fn detail_text(detail: &Value) -> String {
    match detail {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
