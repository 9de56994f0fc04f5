use std::{env, fmt};

use crate::{
    app_constants::{
        BACKEND_LOOPBACK_URL, DESKTOP_SHELL_ENV, DESKTOP_USER_AGENT_MARKER, DEV_FLAG_ENV,
        NODE_ENV, WEB_API_PREFIX,
    },
    config,
};

/// Where the HTTP client is running, as far as base URL selection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeEnv {
    pub desktop_shell: bool,
    pub development: bool,
}

impl RuntimeEnv {
    pub fn new(desktop_shell: bool, development: bool) -> Self {
        Self {
            desktop_shell,
            development,
        }
    }

    pub fn from_user_agent(user_agent: &str, development: bool) -> Self {
        Self::new(is_desktop_user_agent(user_agent), development)
    }

    pub fn current() -> Self {
        Self::from_env_values(
            env::var(NODE_ENV).ok().as_deref(),
            env::var(DEV_FLAG_ENV).ok().as_deref(),
            env::var(DESKTOP_SHELL_ENV).ok().as_deref(),
        )
    }

    pub fn from_env_values(
        node_env: Option<&str>,
        dev_flag: Option<&str>,
        desktop_shell_flag: Option<&str>,
    ) -> Self {
        Self::new(
            is_desktop_shell_flag(desktop_shell_flag),
            config::is_development(node_env, dev_flag),
        )
    }
}

/// Unset, empty, `0` and `false` mean "not the desktop shell".
pub fn is_desktop_shell_flag(raw: Option<&str>) -> bool {
    match raw.map(str::trim) {
        None | Some("" | "0") => false,
        Some(value) => !value.eq_ignore_ascii_case("false"),
    }
}

pub fn is_desktop_user_agent(user_agent: &str) -> bool {
    let lowered = user_agent.to_ascii_lowercase();
    lowered.contains(&DESKTOP_USER_AGENT_MARKER.to_ascii_lowercase()) || lowered.contains("electron")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiBase {
    Absolute(String),
    Relative(String),
}

impl ApiBase {
    pub fn as_str(&self) -> &str {
        match self {
            ApiBase::Absolute(base) | ApiBase::Relative(base) => base,
        }
    }
}

impl fmt::Display for ApiBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn resolve_api_base(runtime: &RuntimeEnv) -> ApiBase {
    if runtime.desktop_shell || runtime.development {
        ApiBase::Absolute(BACKEND_LOOPBACK_URL.to_string())
    } else {
        ApiBase::Relative(WEB_API_PREFIX.to_string())
    }
}
