//! Runtime configuration for the command-line tool. The file only ever names
//! where the password lives; the password itself is read from the
//! environment and kept out of `Debug` output.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::otp::uri::DEFAULT_SCHEME;

/// Environment variable consulted when no config names one.
pub const DEFAULT_PASSWORD_ENV: &str = "OTPAUTH_PASSWORD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file unreadable: {0}")]
    Io(String),
    #[error("config parse failed: {0}")]
    Parse(String),
    #[error("environment variable {0} is not set")]
    MissingPassword(String),
}

#[derive(Debug, Deserialize)]
pub struct RawConfig {
    #[serde(rename = "backupPath")]
    pub backup_path: Option<PathBuf>,
    #[serde(rename = "passwordEnv")]
    pub password_env: Option<String>,
    #[serde(rename = "uriScheme")]
    pub uri_scheme: Option<String>,
    #[serde(rename = "logLevel")]
    pub log_level: Option<String>,
}

pub struct RuntimeConfig {
    pub backup_path: Option<PathBuf>,
    pub password: Option<Zeroizing<String>>,
    pub uri_scheme: String,
    pub log_level: Option<String>,
}

impl RuntimeConfig {
    /// Settings used without a config file: default scheme, password from
    /// [`DEFAULT_PASSWORD_ENV`] when set.
    pub fn from_env() -> Self {
        Self {
            backup_path: None,
            password: password_from_env(DEFAULT_PASSWORD_ENV),
            uri_scheme: DEFAULT_SCHEME.to_string(),
            log_level: None,
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("backup_path", &self.backup_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("uri_scheme", &self.uri_scheme)
            .field("log_level", &self.log_level)
            .finish()
    }
}

pub fn password_from_env(var: &str) -> Option<Zeroizing<String>> {
    env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .map(Zeroizing::new)
}

/// Loads the JSON configuration file. A `passwordEnv` that names an unset
/// variable is an error; without one the default variable is tried.
pub fn load_config(path: impl AsRef<Path>) -> Result<RuntimeConfig, ConfigError> {
    let raw_json = fs::read_to_string(&path).map_err(|e| ConfigError::Io(format!("{e}")))?;
    let raw_config: RawConfig =
        serde_json::from_str(&raw_json).map_err(|e| ConfigError::Parse(format!("{e}")))?;

    let password = match &raw_config.password_env {
        Some(var) => Some(password_from_env(var).ok_or_else(|| ConfigError::MissingPassword(var.clone()))?),
        None => password_from_env(DEFAULT_PASSWORD_ENV),
    };

    Ok(RuntimeConfig {
        backup_path: raw_config.backup_path,
        password,
        uri_scheme: raw_config
            .uri_scheme
            .unwrap_or_else(|| DEFAULT_SCHEME.to_string()),
        log_level: raw_config.log_level,
    })
}
