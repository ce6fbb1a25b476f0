//! didlogin HTTP configuration types and utilities.
use clap::Parser;
use didlogin_core::{
    DEFAULT_REQUEST_VALIDITY_SECS, DEFAULT_SESSION_IDLE_SECS, DIDLOGIN_CONFIG,
    MAX_REQUEST_VALIDITY_SECS, MAX_SESSION_IDLE_SECS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;
use url::Url;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_DATA_DIR: &str = "~/.didlogin";

/// An error relating to server configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Public host URL is not set.
    #[error("Environment variable HOST not set.")]
    MissingHost,
    /// Listening port is not set.
    #[error("Environment variable PORT not set.")]
    MissingPort,
    /// Public host is not an absolute http(s) URL.
    #[error("Invalid public host URL: {0}")]
    InvalidHost(String),
    /// Login request validity window is outside `1..=MAX_REQUEST_VALIDITY_SECS`.
    #[error("Login request validity must be between 1 and 86400 seconds, got {0}.")]
    InvalidRequestValidity(i64),
    /// Session idle timeout is outside `1..=MAX_SESSION_IDLE_SECS`.
    #[error("Session idle timeout must be between 1 and 2592000 seconds, got {0}.")]
    InvalidSessionIdle(i64),
    /// Config file could not be read.
    #[error("Failed to read config file {0}: {1}")]
    FailedToRead(String, String),
    /// Config file content is invalid.
    #[error("Failed to parse config: {0}")]
    FailedToParse(String),
    /// A request reached a session-aware handler without the session layer.
    #[error("Session not configured.")]
    SessionNotConfigured,
}

/// HTTP configuration.
#[derive(Parser, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HTTPConfig {
    /// Public base URL of the service, e.g. `https://didlogin.example.com`. Used for wallet
    /// links and the published messaging service endpoint.
    #[arg(long, env = "HOST")]
    pub host: Option<String>,
    /// Port for server.
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,
    /// Address the server binds to.
    #[arg(long, default_value = DEFAULT_BIND_ADDRESS)]
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// Directory holding the service signing key.
    #[arg(long, env = "DIDLOGIN_DATA", default_value = DEFAULT_DATA_DIR)]
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Seconds an issued login request stays valid.
    #[arg(long, default_value_t = DEFAULT_REQUEST_VALIDITY_SECS)]
    #[serde(default = "default_request_validity_secs")]
    pub request_validity_secs: i64,
    /// Seconds a session may stay unused before it is evicted.
    #[arg(long, default_value_t = DEFAULT_SESSION_IDLE_SECS)]
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: i64,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_data_dir() -> String {
    DEFAULT_DATA_DIR.to_string()
}

fn default_request_validity_secs() -> i64 {
    DEFAULT_REQUEST_VALIDITY_SECS
}

fn default_session_idle_secs() -> i64 {
    DEFAULT_SESSION_IDLE_SECS
}

/// `secs` as a duration if it lies in `1..=max`.
fn bounded_seconds(secs: i64, max: i64) -> Option<chrono::Duration> {
    if (1..=max).contains(&secs) {
        chrono::Duration::try_seconds(secs)
    } else {
        None
    }
}

impl std::fmt::Display for HTTPConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:?}", self)
    }
}

impl Default for HTTPConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            bind_address: default_bind_address(),
            data_dir: default_data_dir(),
            request_validity_secs: DEFAULT_REQUEST_VALIDITY_SECS,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
        }
    }
}

impl HTTPConfig {
    /// Checks every setting the server needs to start.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.base_url()?;
        self.listen_port()?;
        self.request_validity()?;
        self.session_idle()?;
        Ok(())
    }

    /// Public base URL without a trailing slash.
    pub fn base_url(&self) -> Result<&str, ConfigurationError> {
        let host = self
            .host
            .as_deref()
            .filter(|host| !host.is_empty())
            .ok_or(ConfigurationError::MissingHost)?;
        let url = Url::parse(host).map_err(|_| ConfigurationError::InvalidHost(host.to_owned()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigurationError::InvalidHost(host.to_owned()));
        }
        Ok(host.trim_end_matches('/'))
    }

    pub fn listen_port(&self) -> Result<u16, ConfigurationError> {
        self.port.ok_or(ConfigurationError::MissingPort)
    }

    /// Absolute public URL of `path`.
    pub fn endpoint(&self, path: &str) -> Result<String, ConfigurationError> {
        Ok(format!("{}{}", self.base_url()?, path))
    }

    /// Provides `SocketAddr` of server config address.
    pub fn to_socket_address(&self) -> Result<SocketAddr, ConfigurationError> {
        Ok(SocketAddr::new(self.bind_address, self.listen_port()?))
    }

    pub fn request_validity(&self) -> Result<chrono::Duration, ConfigurationError> {
        bounded_seconds(self.request_validity_secs, MAX_REQUEST_VALIDITY_SECS).ok_or(
            ConfigurationError::InvalidRequestValidity(self.request_validity_secs),
        )
    }

    pub fn session_idle(&self) -> Result<chrono::Duration, ConfigurationError> {
        bounded_seconds(self.session_idle_secs, MAX_SESSION_IDLE_SECS)
            .ok_or(ConfigurationError::InvalidSessionIdle(self.session_idle_secs))
    }
}

/// Wrapper struct for parsing the `http` config table.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct Config {
    /// HTTP configuration data.
    http: HTTPConfig,
}

/// Parses the `[http]` table of a TOML config.
pub fn parse_toml(toml_str: &str) -> Result<HTTPConfig, ConfigurationError> {
    toml::from_str::<Config>(toml_str)
        .map(|config| config.http)
        .map_err(|err| ConfigurationError::FailedToParse(err.to_string()))
}

/// Reads configuration from a TOML file.
pub fn read_config_file(path: &str) -> Result<HTTPConfig, ConfigurationError> {
    let content = fs::read_to_string(path)
        .map_err(|err| ConfigurationError::FailedToRead(path.to_owned(), err.to_string()))?;
    parse_toml(&content)
}

/// Loads configuration from the file named by `DIDLOGIN_CONFIG` if set, otherwise from
/// command line arguments and environment variables.
pub fn load_config() -> Result<HTTPConfig, ConfigurationError> {
    match std::env::var(DIDLOGIN_CONFIG) {
        Ok(path) => read_config_file(&path),
        Err(_) => Ok(HTTPConfig::parse()),
    }
}
