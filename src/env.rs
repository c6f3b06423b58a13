//! Environment constants and path utilities for speechrelay.
//!
//! Centralizes the directory and file names used for configuration discovery
//! and the default logging filter.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .vscode)
pub const APP_DIR_NAME: &str = ".speechrelay";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Stand-alone configuration file name looked up in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "speechrelay.toml";

/// System-wide configuration directory (Unix-like systems)
pub const SYSTEM_CONFIG_DIR: &str = "/etc/speechrelay";

/// Logging filters used by the binary when `RUST_LOG` is not set
pub mod logging {
    pub const DEFAULT_FILTER: &str = "speechrelay=info";
    pub const VERBOSE_FILTER: &str = "speechrelay=debug";
}

/// Build the .speechrelay directory path from a root directory
pub fn app_dir_path(root: &Path) -> PathBuf {
    root.join(APP_DIR_NAME)
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    app_dir_path(home_dir)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build the stand-alone config file path in the current directory
pub fn local_file_config_path(current_dir: &Path) -> PathBuf {
    current_dir.join(LOCAL_CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    app_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

/// Build the system-wide config file path
pub fn system_config_file_path() -> PathBuf {
    Path::new(SYSTEM_CONFIG_DIR).join(CONFIG_FILE_NAME)
}
