use std::{
    env,
    path::{Path, PathBuf},
};

use crate::app_constants::{
    APP_ROOT_DIR_NAME, BACKEND_DIR_ENV, BACKEND_DIR_NAME, PACKAGED_BACKEND_DIR_NAME,
};

pub fn default_packaged_root_dir() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(APP_ROOT_DIR_NAME))
}

pub fn default_log_dir() -> Option<PathBuf> {
    default_packaged_root_dir().map(|root| root.join("logs"))
}

/// Directory that holds the Flask sources next to this crate in a checkout.
pub fn workspace_backend_dir() -> PathBuf {
    let candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(BACKEND_DIR_NAME);
    candidate.canonicalize().unwrap_or(candidate)
}

pub fn packaged_backend_dir(resource_dir: &Path) -> PathBuf {
    resource_dir.join(PACKAGED_BACKEND_DIR_NAME)
}

pub fn backend_dir_override() -> Option<PathBuf> {
    env::var(BACKEND_DIR_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

pub fn resolve_backend_dir(development: bool, resource_dir: Option<&Path>) -> PathBuf {
    if let Some(path) = backend_dir_override() {
        return path;
    }
    match resource_dir {
        Some(resource_dir) if !development => packaged_backend_dir(resource_dir),
        _ => workspace_backend_dir(),
    }
}
