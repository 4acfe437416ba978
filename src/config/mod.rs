pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;

use self::validation::validate_config;

const MAINNET_RELAY_URL: &str = "wss://relay.inferencegrid.ai/consumer/ws";
const REGTEST_RELAY_URL: &str = "wss://regtest.inferencegrid.ai/consumer/ws";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid key material: {0}")]
    Key(String),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Relay network the identity is registered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Regtest,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Regtest => write!(f, "regtest"),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub base_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
}

fn default_port() -> u16 {
    3031
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            base_path: String::new(),
            runtime_worker_threads: None,
        }
    }
}

/// Relay connection settings and the metadata sent during registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub network: Network,
    /// Overrides the network's default relay endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub verify_on_startup: bool,
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_client_url")]
    pub client_url: String,
    #[serde(default = "default_client_logo_url")]
    pub client_logo_url: String,
    #[serde(default)]
    pub client_description: String,
}

fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_client_name() -> String {
    "Spark OpenAI Adapter".to_string()
}
fn default_client_url() -> String {
    "https://spark.info".to_string()
}
fn default_client_logo_url() -> String {
    "https://spark.info/favicon.ico".to_string()
}

impl RelayConfig {
    /// The WebSocket endpoint to dial.
    #[must_use]
    pub fn ws_url(&self) -> &str {
        if let Some(url) = self.url.as_deref() {
            return url;
        }
        match self.network {
            Network::Mainnet => MAINNET_RELAY_URL,
            Network::Regtest => REGTEST_RELAY_URL,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            url: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            verify_on_startup: true,
            client_name: default_client_name(),
            client_url: default_client_url(),
            client_logo_url: default_client_logo_url(),
            client_description: String::new(),
        }
    }
}

/// Hex-encoded Ed25519 key pair.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub public_key: String,
    pub private_key: String,
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Where completed-request invoices are sent for payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Invoices are POSTed here as `{"invoice": "..."}`; unset means log only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] / [`ConfigError::Key`]
/// when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}
