use crate::app_constants::{BACKEND_ERROR_TITLE, PYTHON_NOT_FOUND_MESSAGE, PYTHON_NOT_FOUND_TITLE};

/// Surface for user-visible error dialogs raised by the supervisor.
///
/// `show_error` returns once the user has dismissed the dialog.
pub trait Notifier: Send + Sync {
    fn show_error(&self, title: &str, message: &str);
}

/// Logs instead of showing dialogs; used when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_error(&self, title: &str, message: &str) {
        tracing::error!(title, "{message}");
    }
}

pub fn notify_python_missing(notifier: &dyn Notifier) {
    notifier.show_error(PYTHON_NOT_FOUND_TITLE, PYTHON_NOT_FOUND_MESSAGE);
}

pub fn notify_launch_failure(notifier: &dyn Notifier, reason: &str) {
    notifier.show_error(
        BACKEND_ERROR_TITLE,
        &format!("Failed to start the QuestDM backend: {reason}"),
    );
}

pub fn notify_backend_crash(notifier: &dyn Notifier, code: i32) {
    notifier.show_error(
        BACKEND_ERROR_TITLE,
        &format!(
            "The QuestDM backend crashed with code {code}. Please check the logs for details."
        ),
    );
}
