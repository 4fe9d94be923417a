use std::{env, io, path::PathBuf};

use anyhow::{Context, Result};

const APPLICATION_DIR_NAME: &str = "daylog";

pub fn create_application_default_path() -> Result<PathBuf> {
    let mut path = base_state_dir()?;
    path.push(APPLICATION_DIR_NAME);
    ensure_dir(path)
}

/// Creates the directory if needed. Used both for the default location and for `--dir`.
pub fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v).with_context(|| format!("Can't create application directory {path:?}")),
    }
}

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        fn base_state_dir() -> Result<PathBuf> {
            env::var("APPDATA")
                .map(PathBuf::from)
                .context("APPDATA should be present on Windows")
        }
    } else {
        fn base_state_dir() -> Result<PathBuf> {
            env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| {
                        let mut path = PathBuf::from(home);
                        path.push(".local/state");
                        path
                    })
                })
                .context("Couldn't find neither XDG_STATE_HOME nor HOME")
        }
    }
}
