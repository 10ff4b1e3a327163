use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Config file name looked up in the working directory first.
pub const CONFIG_FILE_NAME: &str = "grokrefactor.json";

/// User-level config directory (~/.config/grokrefactor/, %APPDATA%\grokrefactor on Windows)
pub fn user_config_dir() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("grokrefactor"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("grokrefactor"))
    }
}

/// Resolves which config file to load: an explicit path wins, then
/// `./grokrefactor.json`, then the user-level file.
pub fn config_file(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(raw) = explicit {
        return expand(raw, "config");
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(local);
    }

    Ok(user_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expands `~` and `$VAR` references in a configured path.
pub fn expand(raw: &str, key: &str) -> Result<PathBuf> {
    shellexpand::full(raw)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| Error::config_invalid_value(key, Some(raw.to_string()), e.to_string()))
}

/// Joins `relative` under `root` unless it is already absolute.
pub fn join_under(root: &Path, relative: &str) -> PathBuf {
    let trimmed = relative.trim_start_matches('/');
    if Path::new(relative).is_absolute() && root.as_os_str().is_empty() {
        PathBuf::from(relative)
    } else {
        root.join(trimmed)
    }
}
