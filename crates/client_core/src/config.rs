use std::{collections::HashMap, fs, io, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::endpoint::{ApiEndpoint, EndpointError, DEFAULT_API_URL};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Resolves raw settings into the immutable controller configuration.
    pub fn resolve(&self) -> Result<ClientConfig, EndpointError> {
        let request_timeout = if self.request_timeout_secs == 0 {
            warn!("request timeout of 0s is unusable; using default");
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.request_timeout_secs)
        };

        Ok(ClientConfig {
            endpoint: ApiEndpoint::parse(&self.api_url)?,
            request_timeout,
        })
    }
}

/// Configuration read once at startup and fixed for the controller's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: ApiEndpoint,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: ApiEndpoint, request_timeout: Duration) -> Self {
        Self {
            endpoint,
            request_timeout,
        }
    }
}

/// Loads settings from `settings_file`, or from `client.toml` when none is given.
///
/// Only the implicit `client.toml` may be absent; an explicit file must be readable.
pub fn load_settings(settings_file: Option<&Path>) -> Result<Settings> {
    let raw = match settings_file {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))?,
        ),
        None => match fs::read_to_string(DEFAULT_SETTINGS_FILE) {
            Ok(raw) => Some(raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(error = %err, file = DEFAULT_SETTINGS_FILE, "ignoring unreadable settings file");
                None
            }
        },
    };
    let settings = load_settings_from(raw.as_deref(), |key| std::env::var(key).ok());
    info!(api_url = %settings.api_url, timeout_secs = settings.request_timeout_secs, "loaded client settings");
    Ok(settings)
}

/// Layers defaults, an optional TOML document, then environment values.
pub fn load_settings_from(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("api_url").and_then(toml::Value::as_str) {
                    settings.api_url = v.to_string();
                }
                if let Some(v) = file_cfg
                    .get("request_timeout_secs")
                    .and_then(toml::Value::as_integer)
                {
                    if let Ok(parsed) = u64::try_from(v) {
                        settings.request_timeout_secs = parsed;
                    }
                }
            }
            Err(err) => warn!(error = %err, "ignoring malformed settings file"),
        }
    }

    if let Some(v) = env("API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
