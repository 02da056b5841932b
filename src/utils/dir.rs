use std::{env, io, path::PathBuf};

use anyhow::{Context, Result};

pub const DATA_DIR_ENV: &str = "JUJU_DATA_DIR";

/// Resolves the directory holding session files and registries, creating it when missing.
/// `JUJU_DATA_DIR` wins over the platform default.
pub fn create_application_default_path() -> Result<PathBuf> {
    let path = match env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => platform_data_path()?,
    };

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v).with_context(|| format!("Couldn't create data directory {path:?}")),
    }
}

fn platform_data_path() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let mut path = PathBuf::from(
            env::var("APPDATA").context("APPDATA should be present on Windows")?,
        );
        path.push("juju");
        Ok(path)
    }
    #[cfg(target_os = "macos")]
    {
        let mut path = PathBuf::from(env::var("HOME").context("Couldn't find HOME")?);
        path.push("Library/Application Support/juju");
        Ok(path)
    }
    #[cfg(not(any(windows, target_os = "macos")))]
    {
        let mut path = env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|_| {
                env::var("HOME").map(|home| {
                    let mut path = PathBuf::from(home);
                    path.push(".local/share");
                    path
                })
            })
            .context("Couldn't find neither XDG_DATA_HOME nor HOME")?;
        path.push("juju");
        Ok(path)
    }
}
