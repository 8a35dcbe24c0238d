//! Client configuration.
//!
//! Defaults target a local development backend. `ClientConfig::from_env`
//! overlays `BANDPORTAL_*` environment variables.

use serde::{Deserialize, Serialize};

use crate::credentials::StorageKeys;

pub const ENV_API_URL: &str = "BANDPORTAL_API_URL";
pub const ENV_PROTECTED_PREFIXES: &str = "BANDPORTAL_PROTECTED_PREFIXES";
pub const ENV_STORAGE_NAMESPACE: &str = "BANDPORTAL_STORAGE_NAMESPACE";
pub const ENV_ENVELOPE: &str = "BANDPORTAL_ENVELOPE";

/// Shape in which the backend wraps its JSON payloads.
///
/// The network boundary unwraps exactly the configured shape; anything else
/// is a malformed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseEnvelope {
    /// Payload is the whole body.
    Bare,
    /// Payload sits under `data` (`{ message, statusCode, data }`).
    #[default]
    Data,
}

impl core::str::FromStr for ResponseEnvelope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bare" => Ok(Self::Bare),
            "data" => Ok(Self::Data),
            other => Err(format!("unknown envelope '{other}' (expected bare or data)")),
        }
    }
}

/// Where the guard sends denied navigations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationPaths {
    pub login_path: String,
    pub unauthorized_path: String,
    /// Query parameter carrying the originally requested destination.
    pub return_param: String,
}

impl Default for NavigationPaths {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            unauthorized_path: "/unauthorized".to_string(),
            return_param: "returnUrl".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the first-party API, without trailing slash.
    pub api_base_url: String,

    /// URL prefixes whose requests receive bearer credentials.
    pub protected_prefixes: Vec<String>,

    /// Namespace for the persisted credential keys.
    pub storage_namespace: String,

    pub envelope: ResponseEnvelope,

    pub navigation: NavigationPaths,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let api_base_url = "http://localhost:8080/api".to_string();
        Self {
            protected_prefixes: vec![format!("{api_base_url}/")],
            api_base_url,
            storage_namespace: "blasmusik".to_string(),
            envelope: ResponseEnvelope::default(),
            navigation: NavigationPaths::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `BANDPORTAL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup` (blank values are ignored).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        match get(ENV_API_URL) {
            Some(url) => {
                config.api_base_url = url.trim_end_matches('/').to_string();
                config.protected_prefixes = vec![format!("{}/", config.api_base_url)];
            }
            None => tracing::debug!("{ENV_API_URL} not set; using {}", config.api_base_url),
        }

        if let Some(prefixes) = get(ENV_PROTECTED_PREFIXES) {
            config.protected_prefixes = prefixes
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(ns) = get(ENV_STORAGE_NAMESPACE) {
            config.storage_namespace = ns;
        }

        if let Some(raw) = get(ENV_ENVELOPE) {
            match raw.parse() {
                Ok(envelope) => config.envelope = envelope,
                Err(err) => tracing::warn!("ignoring {ENV_ENVELOPE}: {err}"),
            }
        }

        config
    }

    /// Absolute URL for an API path such as `/auth/login`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub fn storage_keys(&self) -> StorageKeys {
        StorageKeys::namespaced(&self.storage_namespace)
    }
}
