use std::{fs, io, path::Path};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::app_constants::{DESKTOP_LOG_FILE, LOG_FILTER_ENV};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the console subscriber and, when `log_dir` is usable, a
/// non-blocking `desktop.log` writer. Keep the returned guard alive until exit
/// or buffered file lines are lost.
pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let console = fmt::layer().with_writer(io::stderr).with_filter(env_filter());
    let registry = tracing_subscriber::registry().with(console);

    let Some(dir) = log_dir else {
        let _ = registry.try_init();
        return None;
    };
    if let Err(error) = fs::create_dir_all(dir) {
        let _ = registry.try_init();
        tracing::warn!(directory = %dir.display(), "failed to create log directory: {error}");
        return None;
    }

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, DESKTOP_LOG_FILE));
    let file = fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(env_filter());
    let _ = registry.with(file).try_init();
    Some(guard)
}

pub fn append_desktop_log(message: &str) {
    tracing::info!(category = "desktop", "{message}");
}

pub fn append_startup_log(message: &str) {
    tracing::info!(category = "startup", "{message}");
}

pub fn append_shutdown_log(message: &str) {
    tracing::info!(category = "shutdown", "{message}");
}
