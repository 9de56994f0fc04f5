use std::{panic, process, sync::Arc};

use questdm_desktop::Supervisor;

/// Stops the backend and exits with status 1 on any panic in the shell.
pub(crate) fn install_panic_hook(supervisor: Arc<Supervisor>) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        tracing::error!(category = "fault", "desktop shell panicked: {info}");
        previous(info);
        supervisor.emergency_stop();
        process::exit(1);
    }));
}
