use questdm_desktop::app_constants::{
    DESKTOP_USER_AGENT_MARKER, DEV_SERVER_URL, MAIN_WINDOW_HEIGHT, MAIN_WINDOW_LABEL,
    MAIN_WINDOW_TITLE, MAIN_WINDOW_WIDTH, PACKAGED_INDEX_FILE,
};
use tauri::{AppHandle, Manager, WebviewUrl, WebviewWindowBuilder};

fn desktop_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible) {DESKTOP_USER_AGENT_MARKER}/{}",
        env!("CARGO_PKG_VERSION")
    )
}

fn main_window_url(development: bool) -> Result<WebviewUrl, String> {
    if development {
        let url = DEV_SERVER_URL
            .parse()
            .map_err(|error| format!("Invalid dev server URL {DEV_SERVER_URL}: {error}"))?;
        Ok(WebviewUrl::External(url))
    } else {
        Ok(WebviewUrl::App(PACKAGED_INDEX_FILE.into()))
    }
}

/// Opens the main window, or focuses it when it already exists.
pub(crate) fn create_main_window<F>(
    app_handle: &AppHandle,
    development: bool,
    log: F,
) -> Result<(), String>
where
    F: Fn(&str),
{
    if let Some(window) = app_handle.get_webview_window(MAIN_WINDOW_LABEL) {
        if let Err(error) = window.show().and_then(|()| window.set_focus()) {
            log(&format!("failed to focus existing main window: {error}"));
        }
        return Ok(());
    }

    let url = main_window_url(development)?;
    log(&format!("creating main window: {url:?}"));
    WebviewWindowBuilder::new(app_handle, MAIN_WINDOW_LABEL, url)
        .title(MAIN_WINDOW_TITLE)
        .inner_size(MAIN_WINDOW_WIDTH, MAIN_WINDOW_HEIGHT)
        .user_agent(&desktop_user_agent())
        .build()
        .map(|_| ())
        .map_err(|error| format!("Failed to create main window: {error}"))
}
