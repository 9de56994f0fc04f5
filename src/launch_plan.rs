use std::path::{Path, PathBuf};

use crate::{
    app_constants::{
        BACKEND_CMD_ENV, BACKEND_SCRIPT_NAME, UNIX_PYTHON_EXECUTABLE, WINDOWS_PYTHON_EXECUTABLE,
    },
    config::ShellConfig,
    error::SupervisorError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub cmd: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub packaged_mode: bool,
}

pub fn python_executable_for_platform(platform: &str) -> &'static str {
    if platform.eq_ignore_ascii_case("windows") || platform.eq_ignore_ascii_case("win32") {
        WINDOWS_PYTHON_EXECUTABLE
    } else {
        UNIX_PYTHON_EXECUTABLE
    }
}

pub fn resolve_launch_plan(
    config: &ShellConfig,
    backend_dir: &Path,
) -> Result<LaunchPlan, SupervisorError> {
    if let Some(custom_cmd) = config.backend_cmd.as_deref() {
        return resolve_custom_launch(custom_cmd, backend_dir, config.packaged_mode());
    }

    let cmd = config
        .python_override
        .clone()
        .unwrap_or_else(|| python_executable_for_platform(&config.platform).to_string());
    let script_path = backend_dir.join(BACKEND_SCRIPT_NAME);

    Ok(LaunchPlan {
        cmd,
        args: vec![script_path.to_string_lossy().to_string()],
        cwd: backend_dir.to_path_buf(),
        packaged_mode: config.packaged_mode(),
    })
}

fn resolve_custom_launch(
    custom_cmd: &str,
    backend_dir: &Path,
    packaged_mode: bool,
) -> Result<LaunchPlan, SupervisorError> {
    let mut pieces = shlex::split(custom_cmd).ok_or_else(|| SupervisorError::InvalidCommand {
        env: BACKEND_CMD_ENV,
        value: custom_cmd.to_string(),
    })?;
    if pieces.is_empty() {
        return Err(SupervisorError::InvalidCommand {
            env: BACKEND_CMD_ENV,
            value: custom_cmd.to_string(),
        });
    }

    let cmd = pieces.remove(0);
    // A custom command may not need the Flask checkout at all.
    let cwd = if backend_dir.is_dir() {
        backend_dir.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_else(|_| backend_dir.to_path_buf())
    };

    Ok(LaunchPlan {
        cmd,
        args: pieces,
        cwd,
        packaged_mode,
    })
}

pub fn build_debug_command(plan: &LaunchPlan) -> Vec<String> {
    let mut parts = vec![plan.cmd.clone()];
    parts.extend(plan.args.clone());
    parts
}
