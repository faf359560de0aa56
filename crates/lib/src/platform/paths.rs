use crate::consts::APP_NAME;
use std::path::PathBuf;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  let userprofile = std::env::var("USERPROFILE").expect("USERPROFILE not set");
  PathBuf::from(userprofile)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  let home = std::env::var("HOME").expect("HOME not set");
  PathBuf::from(home)
}

/// Returns the directory for persistent data (execution history).
///
/// `STINT_HOME` overrides the platform default.
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  if let Ok(path) = std::env::var("STINT_HOME") {
    return PathBuf::from(path);
  }
  let appdata = std::env::var("APPDATA").expect("APPDATA not set");
  PathBuf::from(appdata).join(APP_NAME)
}

/// Returns the directory for persistent data (execution history).
///
/// `STINT_HOME` overrides the platform default.
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  if let Ok(path) = std::env::var("STINT_HOME") {
    return PathBuf::from(path);
  }
  let data_home = std::env::var("XDG_DATA_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".local").join("share"));
  data_home.join(APP_NAME)
}

/// Returns the directory for cache files for the application
#[cfg(windows)]
pub fn cache_dir() -> PathBuf {
  if let Ok(path) = std::env::var("STINT_HOME") {
    return PathBuf::from(path).join("cache");
  }
  let local_appdata = std::env::var("LOCALAPPDATA").expect("LOCALAPPDATA not set");
  PathBuf::from(local_appdata).join(APP_NAME).join("Cache")
}

/// Returns the directory for cache files for the application
#[cfg(not(windows))]
pub fn cache_dir() -> PathBuf {
  if let Ok(path) = std::env::var("STINT_HOME") {
    return PathBuf::from(path).join("cache");
  }
  let cache_home = std::env::var("XDG_CACHE_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".cache"));
  cache_home.join(APP_NAME)
}

/// Root under which identity-scoped workspaces are created.
pub fn workspaces_dir() -> PathBuf {
  if let Ok(path) = std::env::var("STINT_WORKSPACES") {
    return PathBuf::from(path);
  }
  cache_dir().join("workspaces")
}

/// Directory holding one execution history record per identity.
pub fn history_dir() -> PathBuf {
  if let Ok(path) = std::env::var("STINT_HISTORY") {
    return PathBuf::from(path);
  }
  data_dir().join("history")
}
