//! Minimal configuration loading for Huddle.
//!
//! This crate provides configuration loading with minimal dependencies so
//! that every Huddle crate can import it without dependency cycles.
//!
//! Configuration is split into two categories:
//!
//! - **Infrastructure** (`PathsConfig`, `ChatConfig`): things that do not
//!   change at runtime - the data directory holding the store document and
//!   the chat poll interval.
//!
//! - **Bootstrap** (`BootstrapConfig`): the admin identity used to seed a
//!   brand-new store. After the first save, the store document is the
//!   source of truth.
//!
//! # Usage
//!
//! ```rust,no_run
//! use huddleconf::HuddleConfig;
//!
//! let config = HuddleConfig::load().expect("Failed to load config");
//! println!("store: {}", config.paths.store_file().display());
//! println!("poll every {}s", config.chat.poll_interval_secs);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `~/.config/huddle/config.toml` (user)
//! 2. `./huddle.toml` (local override)
//! 3. Environment variables (`HUDDLE_*`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! data_dir = "~/.local/share/huddle"
//!
//! [chat]
//! poll_interval_secs = 3
//!
//! [bootstrap]
//! admin_account = "admin"
//! admin_password = "password"
//! admin_name = "Admin User"
//! ```

pub mod loader;

pub use loader::{discover_config_files, discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// File name of the serialized store document inside the data directory.
pub const STORE_FILE_NAME: &str = "app_db.json";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Filesystem paths for Huddle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the store document.
    /// Default: ~/.local/share/huddle
    #[serde(default = "PathsConfig::default_data_dir")]
    pub data_dir: PathBuf,
}

impl PathsConfig {
    fn default_data_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/huddle"))
            .unwrap_or_else(|| PathBuf::from(".local/share/huddle"))
    }

    /// Full path of the store document.
    pub fn store_file(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
        }
    }
}

/// Chat behaviour that cannot change at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Seconds between chat polls. The store has no push channel; clients
    /// re-read the document and diff locally.
    /// Default: 3
    #[serde(default = "ChatConfig::default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl ChatConfig {
    fn default_poll_interval_secs() -> u64 {
        3
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: Self::default_poll_interval_secs(),
        }
    }
}

/// Admin identity used to seed a brand-new store document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Display account id for the seed admin.
    /// Default: admin
    #[serde(default = "BootstrapConfig::default_admin_account")]
    pub admin_account: String,

    /// Password for the seed admin, stored as plaintext like every other
    /// credential in the document.
    /// Default: password
    #[serde(default = "BootstrapConfig::default_admin_password")]
    pub admin_password: String,

    /// Display name for the seed admin.
    /// Default: Admin User
    #[serde(default = "BootstrapConfig::default_admin_name")]
    pub admin_name: String,
}

impl BootstrapConfig {
    fn default_admin_account() -> String {
        "admin".to_string()
    }

    fn default_admin_password() -> String {
        "password".to_string()
    }

    fn default_admin_name() -> String {
        "Admin User".to_string()
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_account: Self::default_admin_account(),
            admin_password: Self::default_admin_password(),
            admin_name: Self::default_admin_name(),
        }
    }
}

/// Complete Huddle configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HuddleConfig {
    /// Filesystem paths.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Chat polling.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Seed identity for a fresh store.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl HuddleConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `~/.config/huddle/config.toml`
    /// 3. `./huddle.toml`
    /// 4. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./huddle.toml` override. The user config still loads first.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about sources.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_sources_from(None)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = HuddleConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }
}
