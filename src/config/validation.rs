use super::{AppConfig, ConfigError};
use crate::auth::Ed25519Identity;

const VALID_LOG_LEVELS: &[&str] = &[
    "DEBUG", "INFO", "WARN", "WARNING", "ERROR", "CRITICAL", "TRACE", "DISABLED",
];

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated,
/// or [`ConfigError::Key`] when the identity keys are malformed or mismatched.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_relay_config(config)?;
    validate_payment_config(config)?;
    validate_log_level(config)?;
    Ed25519Identity::from_config(&config.identity)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.port == 0 {
        return Err(validation_err("server.port must be greater than 0"));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_relay_config(config: &AppConfig) -> Result<(), ConfigError> {
    let relay = &config.relay;
    if relay.connect_timeout_secs == 0 {
        return Err(validation_err(
            "relay.connect_timeout_secs must be greater than 0",
        ));
    }
    let url = url::Url::parse(relay.ws_url())
        .map_err(|e| validation_err(format!("relay.url '{}' is invalid: {e}", relay.ws_url())))?;
    if url.scheme() != "ws" && url.scheme() != "wss" {
        return Err(validation_err(format!(
            "relay.url must use ws:// or wss://, got '{}'",
            url.scheme()
        )));
    }
    if relay.client_name.trim().is_empty() {
        return Err(validation_err("relay.client_name cannot be empty"));
    }
    Ok(())
}

fn validate_payment_config(config: &AppConfig) -> Result<(), ConfigError> {
    let Some(webhook_url) = config.payment.webhook_url.as_deref() else {
        return Ok(());
    };
    if !webhook_url.starts_with("http://") && !webhook_url.starts_with("https://") {
        return Err(validation_err(
            "payment.webhook_url must start with http:// or https://",
        ));
    }
    url::Url::parse(webhook_url)
        .map_err(|e| validation_err(format!("payment.webhook_url is invalid: {e}")))?;
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let level = config.features.log_level.to_uppercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(validation_err(format!(
            "features.log_level '{}' is invalid. Must be one of: {}",
            config.features.log_level,
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}
