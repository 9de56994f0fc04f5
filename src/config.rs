use std::{env, time::Duration};

use crate::app_constants::{
    BACKEND_CMD_ENV, BACKEND_READY_POLL_INTERVAL_ENV, BACKEND_READY_POLL_INTERVAL_MAX_MS,
    BACKEND_READY_POLL_INTERVAL_MIN_MS, BACKEND_TIMEOUT_ENV, DEFAULT_BACKEND_READY_POLL_INTERVAL_MS,
    DEV_BACKEND_TIMEOUT_MS, DEV_FLAG_ENV, NODE_ENV, PACKAGED_BACKEND_TIMEOUT_FALLBACK_MS,
    PYTHON_OVERRIDE_ENV,
};

/// Settings read once from the process environment at shell startup.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub development: bool,
    pub platform: String,
    pub python_override: Option<String>,
    pub backend_cmd: Option<String>,
    pub backend_timeout: Option<Duration>,
    pub ready_poll_interval: Duration,
}

impl ShellConfig {
    pub fn from_env() -> Self {
        let development = is_development(
            env::var(NODE_ENV).ok().as_deref(),
            env::var(DEV_FLAG_ENV).ok().as_deref(),
        );
        Self {
            development,
            platform: env::consts::OS.to_string(),
            python_override: non_empty_env(PYTHON_OVERRIDE_ENV),
            backend_cmd: non_empty_env(BACKEND_CMD_ENV),
            backend_timeout: resolve_backend_timeout(
                env::var(BACKEND_TIMEOUT_ENV).ok().as_deref(),
                !development,
            ),
            ready_poll_interval: resolve_ready_poll_interval(
                env::var(BACKEND_READY_POLL_INTERVAL_ENV).ok().as_deref(),
            ),
        }
    }

    pub fn packaged_mode(&self) -> bool {
        !self.development
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn is_development(node_env: Option<&str>, dev_flag: Option<&str>) -> bool {
    if node_env.map(str::trim) == Some("development") {
        return true;
    }
    matches!(
        dev_flag.map(|value| value.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

pub fn resolve_backend_timeout(raw: Option<&str>, packaged_mode: bool) -> Option<Duration> {
    let default_timeout_ms = if packaged_mode {
        0_u64
    } else {
        DEV_BACKEND_TIMEOUT_MS
    };
    let parsed_timeout_ms = raw
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default_timeout_ms);

    if parsed_timeout_ms > 0 {
        return Some(Duration::from_millis(parsed_timeout_ms));
    }
    if packaged_mode {
        return Some(Duration::from_millis(PACKAGED_BACKEND_TIMEOUT_FALLBACK_MS));
    }
    None
}

pub fn resolve_ready_poll_interval(raw: Option<&str>) -> Duration {
    let interval_ms = raw
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_BACKEND_READY_POLL_INTERVAL_MS)
        .clamp(
            BACKEND_READY_POLL_INTERVAL_MIN_MS,
            BACKEND_READY_POLL_INTERVAL_MAX_MS,
        );
    Duration::from_millis(interval_ms)
}
