//! Backend supervision and HTTP client for the QuestDM desktop shell.
//!
//! The Tauri shell in `main.rs` is built with the `desktop` feature; everything
//! here runs headless.

pub mod app_constants;
pub mod backend_readiness;
pub mod config;
pub mod error;
pub mod http_client;
pub mod http_retry;
pub mod launch_plan;
pub mod logging;
pub mod notifier;
pub mod port_reclaim;
pub mod process_control;
pub mod questdm_api;
pub mod runtime_env;
pub mod runtime_paths;
pub mod supervisor;

pub use config::ShellConfig;
pub use error::{ApiError, SupervisorError};
pub use http_client::{ApiClient, CorsReport};
pub use http_retry::RetryPolicy;
pub use logging::{append_desktop_log, append_shutdown_log, append_startup_log};
pub use notifier::{LogNotifier, Notifier};
pub use port_reclaim::ReclaimReport;
pub use process_control::StopOutcome;
pub use runtime_env::{ApiBase, RuntimeEnv};
pub use supervisor::{Supervisor, SupervisorConfig};
