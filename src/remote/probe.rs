use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{NUDGE_TIMEOUT_SECS, PROBE_TIMEOUT_SECS};
use crate::remote::client::BackendClient;
use crate::types::HealthResult;

pub const HEALTH_PATH: &str = "/api/health";
/// Query pair that marks a wake-up request apart from a health probe.
pub const NUDGE_QUERY: (&str, &str) = ("wake", "1");

pub const MSG_CONNECTED: &str = "Backend API connected successfully.";
pub const MSG_UNREACHABLE: &str = "Backend not available. Loaded sample data.";
pub const MSG_NOT_CONFIGURED: &str = "Backend URL not configured. Loaded sample data.";

/// Bounded health check against the remote service. Keeps only the result of
/// the most recently completed probe.
pub struct HealthProber {
    client: Arc<BackendClient>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    last: Mutex<Option<HealthResult>>,
}

impl HealthProber {
    pub fn new(client: Arc<BackendClient>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Self::with_timeout(client, clock, Duration::from_secs(PROBE_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        client: Arc<BackendClient>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            clock,
            timeout,
            last: Mutex::new(None),
        })
    }

    pub fn client(&self) -> &Arc<BackendClient> {
        &self.client
    }

    /// Probe `GET /api/health`. Never fails: transport errors and timeouts
    /// come back as unhealthy results.
    pub async fn probe(&self) -> HealthResult {
        let url = match self.client.url(HEALTH_PATH) {
            Ok(url) => url,
            Err(_) => {
                let result = HealthResult::unhealthy(MSG_NOT_CONFIGURED);
                self.remember(&result);
                return result;
            }
        };

        let started = Instant::now();
        let outcome = self
            .client
            .http()
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await;

        let result = match outcome {
            Ok(resp) => {
                self.client.latency().record(started.elapsed());
                let content_type = resp
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                classify(resp.status(), content_type)
            }
            Err(e) => {
                warn!(timeout = e.is_timeout(), "health probe failed: {e}");
                HealthResult::unhealthy(MSG_UNREACHABLE)
            }
        };

        self.client
            .status()
            .record_check(result.is_healthy, self.clock.now_ms());
        debug!(
            healthy = result.is_healthy,
            rtt_ms = started.elapsed().as_millis() as u64,
            "{}",
            result.message
        );
        self.remember(&result);
        result
    }

    /// Result of the most recently completed probe.
    pub fn last_status(&self) -> Option<HealthResult> {
        self.last.lock().ok().and_then(|g| g.clone())
    }

    /// Best-effort request that only exists to get a sleeping backend booting.
    /// Failure is the normal case and is only logged at debug.
    pub async fn nudge(&self) {
        let Ok(url) = self.client.url(HEALTH_PATH) else {
            return;
        };
        info!("sending wake-up request to backend");
        match self
            .client
            .http()
            .get(&url)
            .query(&[NUDGE_QUERY])
            .timeout(Duration::from_secs(NUDGE_TIMEOUT_SECS))
            .send()
            .await
        {
            Ok(resp) => debug!(status = %resp.status(), "wake-up request answered"),
            Err(e) => debug!("wake-up request sent, backend still starting (expected): {e}"),
        }
    }

    fn remember(&self, result: &HealthResult) {
        if let Ok(mut last) = self.last.lock() {
            *last = Some(result.clone());
        }
    }
}

/// Health depends on the status code alone; content type only picks the message.
pub fn classify(status: StatusCode, content_type: &str) -> HealthResult {
    if !status.is_success() {
        return HealthResult::unhealthy(format!(
            "Backend returned {}. Loaded sample data.",
            status.as_u16()
        ));
    }
    if content_type.contains("application/json") {
        HealthResult::healthy(MSG_CONNECTED)
    } else {
        HealthResult::healthy(format!(
            "Backend returned {} (non-JSON), but is reachable.",
            status.as_u16()
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
