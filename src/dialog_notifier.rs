use questdm_desktop::Notifier;
use tauri::AppHandle;
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};

/// Shows supervisor errors as modal error dialogs.
///
/// Only called from async tasks; `blocking_show` would deadlock the main thread.
pub(crate) struct DialogNotifier {
    app_handle: AppHandle,
}

impl DialogNotifier {
    pub(crate) fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }
}

impl Notifier for DialogNotifier {
    fn show_error(&self, title: &str, message: &str) {
        tracing::error!(title, "{message}");
        self.app_handle
            .dialog()
            .message(message)
            .title(title)
            .kind(MessageDialogKind::Error)
            .blocking_show();
    }
}
