use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Fixed period during which the backend is assumed to be cold-starting.
pub const WAKE_WINDOW_SECS: u64 = 60;

/// Countdown resolution. Remaining time is recomputed from the shared start
/// time on every tick, never decremented.
pub const COUNTDOWN_TICK_MS: u64 = 100;

/// A new wake-up message is shown every this many seconds.
pub const MESSAGE_ROTATION_SECS: u64 = 5;

/// Health probe deadline; past this the request is aborted and counted unhealthy.
pub const PROBE_TIMEOUT_SECS: u64 = 3;

/// Deadline for the fire-and-forget nudge request.
pub const NUDGE_TIMEOUT_SECS: u64 = 5;

/// Delay between mount and the first health check.
pub const INITIAL_CHECK_DELAY_MS: u64 = 1_000;

/// Default period of follow-up health probes.
pub const HEALTH_RECHECK_SECS: u64 = 15;

/// How often the file store looks for writes made by other processes.
pub const STORE_POLL_MS: u64 = 250;

/// Validity of an access grant.
pub const ACCESS_GRANT_TTL_HOURS: u64 = 24;

/// Capacity of the store and monitor broadcast channels.
pub const CHANNEL_CAPACITY: usize = 64;

/// Shared-store key of the wake-up record.
pub const WAKE_UP_KEY: &str = "backend-wake-up";

/// Shared-store key of the access grant.
pub const ACCESS_GRANT_KEY: &str = "access_grant";

/// Scheduling periods of the availability runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorTimings {
    pub tick: Duration,
    pub initial_check_delay: Duration,
    pub recheck_interval: Duration,
}

impl Default for MonitorTimings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(COUNTDOWN_TICK_MS),
            initial_check_delay: Duration::from_millis(INITIAL_CHECK_DELAY_MS),
            recheck_interval: Duration::from_secs(HEALTH_RECHECK_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Remote content service (RECIPES_API_URL). None selects sample data for good.
    pub api_url: Option<String>,
    /// Shared secret of the access gate (ACCESS_SECRET). None disables the gate.
    pub access_secret: Option<String>,
    pub log_level: String,
    /// Directory backing the shared store (STATE_DIR).
    pub state_dir: PathBuf,
    pub log_file: PathBuf,
    pub timings: MonitorTimings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let state_dir = PathBuf::from(
            std::env::var("STATE_DIR").unwrap_or_else(|_| ".recipe-browser".to_string()),
        );
        let log_file = std::env::var("LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| state_dir.join("recipe-browser.log"));

        let recheck_secs = std::env::var("HEALTH_RECHECK_SECS")
            .unwrap_or_else(|_| HEALTH_RECHECK_SECS.to_string())
            .parse::<u64>()
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| {
                AppError::Config("HEALTH_RECHECK_SECS must be a positive integer".to_string())
            })?;

        Ok(Self {
            api_url: normalize_url(std::env::var("RECIPES_API_URL").ok().as_deref()),
            access_secret: std::env::var("ACCESS_SECRET").ok().filter(|s| !s.is_empty()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            state_dir,
            log_file,
            timings: MonitorTimings {
                recheck_interval: Duration::from_secs(recheck_secs),
                ..MonitorTimings::default()
            },
        })
    }
}

/// Normalize a configured base URL: add `https://` when no scheme is given and
/// drop trailing slashes. Blank input counts as unset.
pub fn normalize_url(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let url = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw.trim_start_matches('/'))
    };
    Some(url.trim_end_matches('/').to_string())
}
