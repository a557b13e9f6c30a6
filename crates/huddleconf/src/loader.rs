//! Config file discovery, loading, and environment variable overlay.

use crate::{BootstrapConfig, ChatConfig, ConfigError, HuddleConfig, PathsConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (user, local). Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("huddle/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    // Local override (current directory)
    let local = PathBuf::from("huddle.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<HuddleConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Parse config from TOML string.
fn parse_toml(contents: &str, path: &Path) -> Result<HuddleConfig, ConfigError> {
    let mut config: HuddleConfig =
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    // Paths in config files may use ~ or $VAR prefixes
    config.paths.data_dir = expand_path(&config.paths.data_dir.to_string_lossy());

    Ok(config)
}

/// Merge two configs, with `overlay` taking precedence.
///
/// A field wins from the overlay only when it differs from the compiled
/// default, so a partial file does not clobber earlier sources.
pub fn merge_configs(base: HuddleConfig, overlay: HuddleConfig) -> HuddleConfig {
    HuddleConfig {
        paths: PathsConfig {
            data_dir: if overlay.paths.data_dir != PathsConfig::default().data_dir {
                overlay.paths.data_dir
            } else {
                base.paths.data_dir
            },
        },
        chat: ChatConfig {
            poll_interval_secs: if overlay.chat.poll_interval_secs
                != ChatConfig::default().poll_interval_secs
            {
                overlay.chat.poll_interval_secs
            } else {
                base.chat.poll_interval_secs
            },
        },
        bootstrap: BootstrapConfig {
            admin_account: if overlay.bootstrap.admin_account
                != BootstrapConfig::default().admin_account
            {
                overlay.bootstrap.admin_account
            } else {
                base.bootstrap.admin_account
            },
            admin_password: if overlay.bootstrap.admin_password
                != BootstrapConfig::default().admin_password
            {
                overlay.bootstrap.admin_password
            } else {
                base.bootstrap.admin_password
            },
            admin_name: if overlay.bootstrap.admin_name != BootstrapConfig::default().admin_name {
                overlay.bootstrap.admin_name
            } else {
                base.bootstrap.admin_name
            },
        },
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut HuddleConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("HUDDLE_DATA_DIR") {
        config.paths.data_dir = expand_path(&v);
        sources.env_overrides.push("HUDDLE_DATA_DIR".to_string());
    }

    if let Ok(v) = env::var("HUDDLE_POLL_INTERVAL") {
        if let Ok(secs) = v.parse() {
            config.chat.poll_interval_secs = secs;
            sources.env_overrides.push("HUDDLE_POLL_INTERVAL".to_string());
        }
    }

    if let Ok(v) = env::var("HUDDLE_ADMIN_ACCOUNT") {
        config.bootstrap.admin_account = v;
        sources.env_overrides.push("HUDDLE_ADMIN_ACCOUNT".to_string());
    }
    if let Ok(v) = env::var("HUDDLE_ADMIN_PASSWORD") {
        config.bootstrap.admin_password = v;
        sources.env_overrides.push("HUDDLE_ADMIN_PASSWORD".to_string());
    }
    if let Ok(v) = env::var("HUDDLE_ADMIN_NAME") {
        config.bootstrap.admin_name = v;
        sources.env_overrides.push("HUDDLE_ADMIN_NAME".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
