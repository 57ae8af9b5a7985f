//! Resolution of the personalization API base URL into request URLs.

use shared::protocol::{HEALTH_PATH, PERSONALIZE_PATH};
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("invalid API base url '{raw}': {reason}")]
    Invalid { raw: String, reason: String },
    #[error("unsupported scheme '{scheme}' in API base url '{raw}'; expected http or https")]
    UnsupportedScheme { raw: String, scheme: String },
}

/// Normalized API base URL. `base` never ends with a slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    base: String,
    personalize: Url,
    health: Url,
}

impl ApiEndpoint {
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        let trimmed = raw.trim();
        let base = if trimmed.is_empty() {
            DEFAULT_API_URL
        } else {
            trimmed
        };
        let base = collapse_path_slashes(base.trim_end_matches('/'));

        let parsed = Url::parse(&base).map_err(|err| EndpointError::Invalid {
            raw: raw.to_string(),
            reason: err.to_string(),
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(EndpointError::UnsupportedScheme {
                    raw: raw.to_string(),
                    scheme: scheme.to_string(),
                })
            }
        }
        if parsed.host_str().is_none() {
            return Err(EndpointError::Invalid {
                raw: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        let personalize = join(&base, PERSONALIZE_PATH, raw)?;
        let health = join(&base, HEALTH_PATH, raw)?;
        Ok(Self {
            base,
            personalize,
            health,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn personalize_url(&self) -> &Url {
        &self.personalize
    }

    pub fn health_url(&self) -> &Url {
        &self.health
    }
}

fn join(base: &str, path: &str, raw: &str) -> Result<Url, EndpointError> {
    let joined = format!("{base}/{}", path.trim_start_matches('/'));
    Url::parse(&joined).map_err(|err| EndpointError::Invalid {
        raw: raw.to_string(),
        reason: err.to_string(),
    })
}

/// Collapses runs of `/` after the scheme separator, keeping `scheme://`.
fn collapse_path_slashes(raw: &str) -> String {
    let (scheme, rest) = match raw.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, raw),
    };

    let mut collapsed = String::with_capacity(raw.len());
    let mut previous_slash = false;
    for ch in rest.chars() {
        if ch == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        collapsed.push(ch);
    }

    match scheme {
        Some(scheme) => format!("{scheme}://{collapsed}"),
        None => collapsed,
    }
}
