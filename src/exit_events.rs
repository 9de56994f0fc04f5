use questdm_desktop::append_shutdown_log;
use tauri::{AppHandle, ExitRequestApi, Manager};

use crate::BackendState;

pub(crate) fn handle_exit_requested(
    app_handle: &AppHandle,
    api: &ExitRequestApi,
    code: Option<i32>,
) {
    // No code means the last window closed; macOS apps stay alive for Reopen.
    #[cfg(target_os = "macos")]
    {
        if code.is_none() {
            append_shutdown_log("all windows closed, keeping app alive");
            api.prevent_exit();
            return;
        }
    }
    #[cfg(not(target_os = "macos"))]
    let _ = api;

    let reason = match code {
        Some(code) => format!("exit requested with code {code}"),
        None => "all windows closed".to_string(),
    };
    stop_backend_once(app_handle, &reason);
}

pub(crate) fn handle_exit_event(app_handle: &AppHandle) {
    stop_backend_once(app_handle, "application exiting");
}

fn stop_backend_once(app_handle: &AppHandle, reason: &str) {
    let Some(state) = app_handle.try_state::<BackendState>() else {
        return;
    };
    if !state.begin_cleanup() {
        return;
    }

    append_shutdown_log(&format!("{reason}, stopping backend"));
    state.startup_cancel.cancel();
    let outcome = tauri::async_runtime::block_on(state.supervisor.stop_backend());
    append_shutdown_log(&format!("backend cleanup finished: {outcome:?}"));
}
