use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use questdm_desktop::{ShellConfig, Supervisor};
use tokio_util::sync::CancellationToken;

/// Shell state managed by Tauri for the lifetime of the app.
pub(crate) struct BackendState {
    pub(crate) supervisor: Arc<Supervisor>,
    pub(crate) shell_config: ShellConfig,
    pub(crate) startup_cancel: CancellationToken,
    cleanup_started: AtomicBool,
}

impl BackendState {
    pub(crate) fn new(supervisor: Arc<Supervisor>, shell_config: ShellConfig) -> Self {
        Self {
            supervisor,
            shell_config,
            startup_cancel: CancellationToken::new(),
            cleanup_started: AtomicBool::new(false),
        }
    }

    /// Returns true only for the first caller.
    pub(crate) fn begin_cleanup(&self) -> bool {
        !self.cleanup_started.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_cleaning_up(&self) -> bool {
        self.cleanup_started.load(Ordering::Acquire)
    }
}
