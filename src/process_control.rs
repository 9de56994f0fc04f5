use std::{
    process::{Command, ExitStatus, Stdio},
    time::Duration,
};

use tokio::process::Child;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    AlreadyExited,
    Exited(Option<i32>),
    ForceKilled,
}

#[cfg(not(target_os = "windows"))]
pub fn request_graceful_termination(pid: u32) -> Result<(), String> {
    let status = Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|error| format!("Failed to run 'kill': {error}"))?;
    ensure_success("kill -TERM", pid, status)
}

#[cfg(target_os = "windows")]
pub fn request_graceful_termination(pid: u32) -> Result<(), String> {
    let status = Command::new("taskkill")
        .args(["/pid", &pid.to_string(), "/t"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|error| format!("Failed to run 'taskkill': {error}"))?;
    ensure_success("taskkill", pid, status)
}

fn ensure_success(tool: &str, pid: u32, status: ExitStatus) -> Result<(), String> {
    if status.success() {
        Ok(())
    } else {
        Err(format!("'{tool}' for pid {pid} exited with {status}"))
    }
}

#[cfg(target_os = "windows")]
pub fn force_kill(child: &mut Child) -> Result<(), String> {
    if let Some(pid) = child.id() {
        // Flask's reloader runs a second python process; kill the whole tree.
        let _ = Command::new("taskkill")
            .args(["/pid", &pid.to_string(), "/t", "/f"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    child
        .start_kill()
        .map_err(|error| format!("Failed to kill backend process: {error}"))
}

#[cfg(not(target_os = "windows"))]
pub fn force_kill(child: &mut Child) -> Result<(), String> {
    child
        .start_kill()
        .map_err(|error| format!("Failed to kill backend process: {error}"))
}

/// Asks `child` to exit through `request_termination`, escalating to a
/// forceful kill when the request cannot be delivered or the child outlives
/// `grace`.
pub async fn stop_child<F>(
    child: &mut Child,
    grace: Duration,
    request_termination: F,
) -> StopOutcome
where
    F: Fn(u32) -> Result<(), String>,
{
    let Some(pid) = child.id() else {
        return StopOutcome::AlreadyExited;
    };

    if let Err(error) = request_termination(pid) {
        tracing::warn!(pid, "graceful termination request failed, killing: {error}");
        if let Err(error) = force_kill(child) {
            tracing::warn!(pid, "{error}");
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => StopOutcome::Exited(status.code()),
        Ok(Err(error)) => {
            tracing::warn!(pid, "failed to wait for backend exit: {error}");
            StopOutcome::AlreadyExited
        }
        Err(_) => {
            tracing::warn!(
                pid,
                grace_ms = grace.as_millis() as u64,
                "backend ignored termination request, killing"
            );
            if let Err(error) = force_kill(child) {
                tracing::warn!(pid, "{error}");
            }
            let _ = child.wait().await;
            StopOutcome::ForceKilled
        }
    }
}
