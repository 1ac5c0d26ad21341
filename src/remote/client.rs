use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::remote::latency::ProbeLatency;
use crate::remote::status::BackendStatus;

/// Handle on the remote content service. Constructed once and shared; holds
/// the last-known status instead of process globals.
pub struct BackendClient {
    base_url: Option<String>,
    http: reqwest::Client,
    status: BackendStatus,
    latency: ProbeLatency,
}

impl BackendClient {
    /// `base_url` is expected normalized (see `config::normalize_url`).
    /// None means no backend: every read serves sample data.
    pub fn new(base_url: Option<String>) -> Result<Arc<Self>> {
        let http = reqwest::Client::builder().build()?;
        Ok(Arc::new(Self {
            base_url,
            http,
            status: BackendStatus::new(),
            latency: ProbeLatency::new(),
        }))
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> Result<String> {
        let base = self.base_url.as_deref().ok_or(AppError::BackendNotConfigured)?;
        Ok(format!("{base}{path}"))
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn status(&self) -> &BackendStatus {
        &self.status
    }

    pub fn latency(&self) -> &ProbeLatency {
        &self.latency
    }

    /// Single GET attempt, no retry. Non-2xx is an error.
    pub async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.url(path)?;
        debug!(%url, params = query.len(), "GET");
        let value = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(value)
    }
}
