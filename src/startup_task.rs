use questdm_desktop::{ApiClient, RuntimeEnv, SupervisorError};
use tauri::{AppHandle, Manager};

use crate::{main_window, BackendState};

/// Starts the backend, waits for it, then opens the main window.
///
/// The window opens even when the backend failed; the user has already seen
/// the error dialog by then.
pub(crate) fn spawn_startup_task<F>(app_handle: AppHandle, log: F)
where
    F: Fn(&str) + Send + Sync + 'static,
{
    tauri::async_runtime::spawn(async move {
        let Some(state) = app_handle.try_state::<BackendState>() else {
            log("backend state is not managed, skipping startup");
            return;
        };
        let supervisor = state.supervisor.clone();
        let cancel = state.startup_cancel.clone();
        let development = state.shell_config.development;

        let ready = match supervisor.start_backend().await {
            Ok(pid) => {
                log(&format!("backend spawned with pid {pid}, waiting for readiness"));
                match supervisor.wait_until_ready(&cancel).await {
                    Ok(()) => {
                        log("backend is ready");
                        true
                    }
                    Err(SupervisorError::Cancelled) => {
                        log("startup cancelled while waiting for backend");
                        return;
                    }
                    Err(error) => {
                        log(&format!("backend did not become ready: {error}"));
                        false
                    }
                }
            }
            Err(error) => {
                log(&format!("backend launch failed: {error}"));
                false
            }
        };

        if cancel.is_cancelled() || state.is_cleaning_up() {
            return;
        }
        if let Err(error) = main_window::create_main_window(&app_handle, development, &log) {
            log(&error);
        }

        if ready {
            log_cors_check(development, &log).await;
        }
    });
}

async fn log_cors_check<F>(development: bool, log: &F)
where
    F: Fn(&str),
{
    let client = match ApiClient::new(RuntimeEnv::new(true, development)) {
        Ok(client) => client,
        Err(error) => {
            log(&format!("failed to build API client: {error}"));
            return;
        }
    };
    let report = client.test_cors().await;
    log(&format!(
        "cors check: ok={} status={:?} detail={}",
        report.ok, report.status, report.detail
    ));
}
