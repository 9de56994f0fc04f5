use std::sync::Arc;

use questdm_desktop::{
    append_startup_log, logging, runtime_paths, ShellConfig, Supervisor, SupervisorConfig,
};
use tauri::{Manager, RunEvent};

use crate::{
    bridge_commands, dialog_notifier::DialogNotifier, exit_events, fault_handler, startup_task,
    BackendState,
};

pub(crate) fn run() {
    let log_dir = runtime_paths::default_log_dir();
    let _log_guard = logging::init(log_dir.as_deref());

    append_startup_log("desktop process starting");
    if let Some(dir) = &log_dir {
        append_startup_log(&format!("desktop log directory: {}", dir.display()));
    }

    let shell_config = ShellConfig::from_env();
    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![bridge_commands::some_action])
        .setup(move |app| {
            let app_handle = app.handle().clone();
            let resource_dir = app_handle.path().resource_dir().ok();
            let config =
                SupervisorConfig::from_shell(shell_config.clone(), resource_dir.as_deref());
            append_startup_log(&format!(
                "backend directory: {}",
                config.backend_dir.display()
            ));

            let notifier = Arc::new(DialogNotifier::new(app_handle.clone()));
            let supervisor = Arc::new(Supervisor::new(config, notifier));
            fault_handler::install_panic_hook(Arc::clone(&supervisor));
            app.manage(BackendState::new(supervisor, shell_config));

            startup_task::spawn_startup_task(app_handle, append_startup_log);
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| match event {
            RunEvent::ExitRequested { code, api, .. } => {
                exit_events::handle_exit_requested(app_handle, &api, code);
            }
            RunEvent::Exit => {
                exit_events::handle_exit_event(app_handle);
            }
            #[cfg(target_os = "macos")]
            RunEvent::Reopen {
                has_visible_windows: false,
                ..
            } => {
                use questdm_desktop::append_desktop_log;

                let state = app_handle.state::<BackendState>();
                if state.is_cleaning_up() {
                    return;
                }
                if let Err(error) = crate::main_window::create_main_window(
                    app_handle,
                    state.shell_config.development,
                    append_desktop_log,
                ) {
                    append_desktop_log(&error);
                }
            }
            _ => {}
        });
}
