use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use snafu::{OptionExt, ResultExt};
use url::Url;

use crate::error::{ApplicationError, ConfigLoadSnafu, MissingRemoteConfigSnafu};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "host_address")]
    pub host: SocketAddr,

    #[serde(rename = "store_backend", default)]
    pub backend: StoreBackend,

    #[serde(flatten)]
    pub remote: Option<RemoteConfig>,

    #[serde(rename = "log_dir", default = "default_log_dir")]
    pub log_dir: String,

    /// Comma-separated origin allowlist; unset means permissive CORS.
    #[serde(rename = "allowed_origins", default)]
    pub allowed_origins: Option<Vec<String>>,

    /// Requests a caller may make per window. 0 disables the throttle.
    #[serde(rename = "rate_limit_max", default = "default_rate_limit_max")]
    pub rate_limit_max: usize,

    #[serde(
        rename = "rate_limit_window_secs",
        default = "default_rate_limit_window_secs"
    )]
    pub rate_limit_window_secs: u64,
}

impl Config {
    pub fn load() -> Result<Config, ApplicationError> {
        envy::from_env::<Config>().context(ConfigLoadSnafu)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// The remote store settings, required when the backend is `remote`.
    pub fn remote(&self) -> Result<&RemoteConfig, ApplicationError> {
        self.remote.as_ref().context(MissingRemoteConfigSnafu)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Remote,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(rename = "surreal_url")]
    pub url: Url,
    #[serde(rename = "surreal_ns", default = "default_namespace")]
    pub namespace: String,
    #[serde(rename = "surreal_db", default = "default_database")]
    pub database: String,

    #[serde(flatten)]
    pub credentials: Option<RemoteCredentials>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteCredentials {
    #[serde(rename = "surreal_name")]
    pub username: String,
    #[serde(rename = "surreal_pass")]
    pub password: String,
}

fn default_log_dir() -> String {
    "logs".to_owned()
}

fn default_namespace() -> String {
    "tally".to_owned()
}

fn default_database() -> String {
    "tally".to_owned()
}

fn default_rate_limit_max() -> usize {
    120
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

#[cfg(test)]
impl RemoteConfig {
    /// Settings for the embedded in-memory engine, used by tests.
    pub(crate) fn in_memory() -> Self {
        RemoteConfig {
            url: Url::parse("mem://").expect("static url"),
            namespace: "test".to_owned(),
            database: "test".to_owned(),
            credentials: None,
        }
    }
}
