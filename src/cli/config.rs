//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./speechrelay.toml or ./.speechrelay/config.toml
//! 2. User config: ~/.speechrelay/config.toml
//! 3. System config: /etc/speechrelay/config.toml
//! 4. Built-in defaults

use crate::{ResilienceConfig, env};
use anyhow::{Context, Result};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<ResilienceConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return ResilienceConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(ResilienceConfig::default())
    }

    /// Load `config_override` if given, otherwise discover
    pub fn load(config_override: Option<&Path>) -> Result<ResilienceConfig> {
        match config_override {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                ResilienceConfig::from_toml_file(path)
            }
            None => Self::discover_config(),
        }
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = Self::get_config_candidates();

        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        // 1. Current directory: ./speechrelay.toml, ./.speechrelay/config.toml
        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(env::local_file_config_path(&current_dir));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        // 2. User config: ~/.speechrelay/config.toml
        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        // 3. System config: /etc/speechrelay/config.toml (Unix-like systems)
        #[cfg(unix)]
        candidates.push(env::system_config_file_path());

        // Windows system config: C:\ProgramData\speechrelay\config.toml
        #[cfg(windows)]
        if let Ok(program_data) = std_env::var("PROGRAMDATA") {
            candidates.push(
                PathBuf::from(program_data)
                    .join("speechrelay")
                    .join(env::CONFIG_FILE_NAME),
            );
        }

        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Write `config` to `path`, refusing to overwrite unless `force` is set.
    pub fn write_config(config: &ResilienceConfig, path: &Path, force: bool) -> Result<PathBuf> {
        if path.exists() && !force {
            warn!("Configuration file already exists: {:?}", path);
            anyhow::bail!(
                "Configuration file already exists: {} (use --force to overwrite)",
                path.display()
            );
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            info!("Created configuration directory: {:?}", parent);
        }

        config.to_toml_file(path)?;
        info!("Created configuration file: {:?}", path);
        Ok(path.to_path_buf())
    }

    /// Path `init-config` writes to when none is given
    pub fn default_user_config_path() -> Result<PathBuf> {
        let home_dir = Self::get_home_dir().context("Could not determine home directory")?;
        Ok(env::user_config_file_path(&home_dir))
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        let candidates = Self::get_config_candidates();
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        if let Some(found) = Self::find_config_file() {
            println!("Active configuration: {:?}", found);
        } else {
            println!("Active configuration: Built-in defaults");
        }
    }
}
