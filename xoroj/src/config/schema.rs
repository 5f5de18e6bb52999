//! Configuration schema.
//!
//! Every section and field has a default, so an empty document (or no
//! file at all) yields a usable local configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default backend address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest accepted skew margin.
pub const MAX_SKEW_MARGIN: Duration = Duration::from_secs(1);

/// Root client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Backend connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Phase controller tunables
    #[serde(default)]
    pub controller: ControllerConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL of the `XorOJ` backend, without the `/api` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent on `/api/` requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Per-request timeout (humantime, e.g. `"10s"`)
    #[serde(default = "default_timeout", with = "humantime_duration")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Phase controller tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    /// Margin added past each boundary (humantime, e.g. `"20ms"`)
    #[serde(default = "default_skew_margin", with = "humantime_duration")]
    pub skew_margin: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            skew_margin: default_skew_margin(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

const fn default_skew_margin() -> Duration {
    crate::phase::DEFAULT_SKEW_MARGIN
}

/// Serde adapter for humantime duration strings.
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim())
            .map_err(|e| serde::de::Error::custom(format!("invalid duration '{raw}': {e}")))
    }
}
