//! Precedence resolution for settings and the `servers.json` location.
//!
//! ## Location
//!
//! - workspace mode: `<workspace>/.vscode/servers.json`
//! - global mode: `<home>/.totvsls/servers.json`
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags
//! 2. Environment variables (`TDS_WORKSPACE_SERVER_CONFIG`)
//! 3. `config.kdl`
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use crate::config::{OutputFormat, UserSettings};
use crate::{Error, Result};

/// Environment variable forcing workspace (`true`) or global (`false`) mode.
pub const WORKSPACE_SERVER_CONFIG_ENV: &str = "TDS_WORKSPACE_SERVER_CONFIG";

/// Environment variable overriding the settings directory.
pub const CONFIG_DIR_ENV: &str = "TDS_CONFIG_DIR";

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "TDS_HOME";

pub const SERVERS_FILE_NAME: &str = "servers.json";
pub const SETTINGS_FILE_NAME: &str = "config.kdl";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    CliFlag,
    EnvVar(String),
    Settings,
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::Settings => write!(f, "settings"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workspace_server_config: Option<bool>,
    pub output_format: Option<OutputFormat>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub workspace_server_config: Resolved<bool>,
    pub reconnect_last_server: Resolved<bool>,
    pub output_format: Resolved<OutputFormat>,
}

/// Parse the usual spellings of a boolean environment value.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Combine CLI overrides, the environment and stored settings.
///
/// `env` looks up environment variables; tests pass a closure instead of
/// touching the process environment.
pub fn resolve_settings<F>(
    overrides: &ConfigOverrides,
    settings: &UserSettings,
    env: F,
) -> ResolvedSettings
where
    F: Fn(&str) -> Option<String>,
{
    let workspace_server_config = if let Some(value) = overrides.workspace_server_config {
        Resolved::new(value, ValueSource::CliFlag)
    } else if let Some(value) = env(WORKSPACE_SERVER_CONFIG_ENV).as_deref().and_then(parse_bool)
    {
        Resolved::new(
            value,
            ValueSource::EnvVar(WORKSPACE_SERVER_CONFIG_ENV.to_string()),
        )
    } else if let Some(value) = settings.workspace_server_config {
        Resolved::new(value, ValueSource::Settings)
    } else {
        Resolved::new(false, ValueSource::Default)
    };

    let reconnect_last_server = match settings.reconnect_last_server {
        Some(value) => Resolved::new(value, ValueSource::Settings),
        None => Resolved::new(true, ValueSource::Default),
    };

    let output_format = if let Some(format) = overrides.output_format {
        Resolved::new(format, ValueSource::CliFlag)
    } else if let Some(format) = settings.output_format {
        Resolved::new(format, ValueSource::Settings)
    } else {
        Resolved::new(OutputFormat::Json, ValueSource::Default)
    };

    ResolvedSettings {
        workspace_server_config,
        reconnect_last_server,
        output_format,
    }
}

/// Directory holding `config.kdl`.
pub fn settings_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|dir| dir.join("tds-servers"))
        .ok_or_else(|| Error::Other("could not determine the config directory".to_string()))
}

pub fn settings_file() -> Result<PathBuf> {
    Ok(settings_dir()?.join(SETTINGS_FILE_NAME))
}

pub fn home_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir().ok_or_else(|| Error::Other("could not determine the home directory".to_string()))
}

/// Path of `servers.json` for the chosen mode.
pub fn server_config_file(workspace_root: &Path, home: &Path, workspace_server_config: bool) -> PathBuf {
    if workspace_server_config {
        workspace_root.join(".vscode").join(SERVERS_FILE_NAME)
    } else {
        home.join(".totvsls").join(SERVERS_FILE_NAME)
    }
}
