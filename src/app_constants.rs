use std::time::Duration;

pub const BACKEND_PORT: u16 = 5000;
pub const BACKEND_LOOPBACK_URL: &str = "http://localhost:5000";
pub const WEB_API_PREFIX: &str = "/api";
pub const CORS_TEST_PATH: &str = "/cors-test";

pub const DEV_SERVER_URL: &str = "http://localhost:5173";
pub const PACKAGED_INDEX_FILE: &str = "index.html";
pub const MAIN_WINDOW_LABEL: &str = "main";
pub const MAIN_WINDOW_TITLE: &str = "QuestDM";
pub const MAIN_WINDOW_WIDTH: f64 = 1200.0;
pub const MAIN_WINDOW_HEIGHT: f64 = 800.0;
pub const DESKTOP_USER_AGENT_MARKER: &str = "QuestDM-Desktop";

pub const BACKEND_DIR_NAME: &str = "Backend";
pub const PACKAGED_BACKEND_DIR_NAME: &str = "backend";
pub const BACKEND_SCRIPT_NAME: &str = "app.py";
pub const WINDOWS_PYTHON_EXECUTABLE: &str = "python";
pub const UNIX_PYTHON_EXECUTABLE: &str = "python3";

pub const DEV_FLAG_ENV: &str = "QUESTDM_DEV";
pub const NODE_ENV: &str = "NODE_ENV";
pub const DESKTOP_SHELL_ENV: &str = "QUESTDM_DESKTOP_SHELL";
pub const PYTHON_OVERRIDE_ENV: &str = "QUESTDM_PYTHON";
pub const BACKEND_CMD_ENV: &str = "QUESTDM_BACKEND_CMD";
pub const BACKEND_DIR_ENV: &str = "QUESTDM_BACKEND_DIR";
pub const BACKEND_TIMEOUT_ENV: &str = "QUESTDM_BACKEND_TIMEOUT_MS";
pub const BACKEND_READY_POLL_INTERVAL_ENV: &str = "QUESTDM_BACKEND_READY_POLL_INTERVAL_MS";
pub const LOG_FILTER_ENV: &str = "QUESTDM_LOG";

pub const PORT_RECLAIM_SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(5);
pub const BACKEND_EXIT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEV_BACKEND_TIMEOUT_MS: u64 = 20_000;
pub const PACKAGED_BACKEND_TIMEOUT_FALLBACK_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_BACKEND_READY_POLL_INTERVAL_MS: u64 = 300;
pub const BACKEND_READY_POLL_INTERVAL_MIN_MS: u64 = 50;
pub const BACKEND_READY_POLL_INTERVAL_MAX_MS: u64 = 10_000;
pub const BACKEND_PING_TIMEOUT: Duration = Duration::from_millis(800);

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 1.5;
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

pub const DESKTOP_LOG_FILE: &str = "desktop.log";
pub const APP_ROOT_DIR_NAME: &str = ".questdm";

pub const PYTHON_NOT_FOUND_TITLE: &str = "Python Not Found";
pub const PYTHON_NOT_FOUND_MESSAGE: &str =
    "QuestDM requires Python to run. Please install Python and make sure it's in your PATH.";
pub const BACKEND_ERROR_TITLE: &str = "Backend Error";
