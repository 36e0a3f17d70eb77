use crate::config::parser::{Config, ServerConfig};
use crate::config::render::{PORT_KEY, UNIXSOCKET_KEY};
use crate::error::{Error, Result};

/// Validates the server options.
///
/// Only the line format is checked: keys must be non-empty tokens without
/// whitespace, and neither keys nor values may span lines. Whether the
/// server accepts an option is left to the server.
pub fn validate_server_config(config: &ServerConfig) -> Result<()> {
    for (key, value) in config.iter() {
        if key.is_empty() {
            return Err(Error::ConfigInvalid("Option with empty name".to_string()));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(Error::ConfigInvalid(format!(
                "Option '{}' contains whitespace in its name",
                key.escape_debug()
            )));
        }
        if value.to_string().contains(['\n', '\r']) {
            return Err(Error::ConfigInvalid(format!(
                "Option '{}' has a multi-line value",
                key
            )));
        }
    }

    Ok(())
}

/// Checks that merged options give the server somewhere to listen.
pub fn validate_endpoint(merged: &ServerConfig) -> Result<()> {
    let has_port = merged
        .get(PORT_KEY)
        .and_then(|v| v.as_integer())
        .is_some_and(|port| port > 0);
    let has_socket = merged.is_set(UNIXSOCKET_KEY);

    if !has_port && !has_socket {
        return Err(Error::ConfigInvalid(
            "Neither a positive port nor a unix socket is configured".to_string(),
        ));
    }

    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &Config) -> Result<()> {
    if config.executable.is_empty() {
        return Err(Error::ConfigInvalid("Empty executable".to_string()));
    }
    if config.readiness_marker.is_empty() {
        return Err(Error::ConfigInvalid("Empty readiness marker".to_string()));
    }
    if config.timeout.is_zero() {
        return Err(Error::ConfigInvalid("Timeout must be positive".to_string()));
    }
    if config.poll_interval.is_zero() {
        return Err(Error::ConfigInvalid(
            "Poll interval must be positive".to_string(),
        ));
    }

    validate_server_config(&config.server)
}
