/// Placeholder IPC command exposed to the frontend as `some_action`.
#[tauri::command]
pub(crate) async fn some_action() -> String {
    questdm_desktop::append_desktop_log("bridge command some_action invoked");
    "result".to_string()
}
