//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, RuntimeConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &RuntimeConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    if let Some(names) = &config.route_parameters {
        validate_route_parameters(names)?;
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }

    if let Some(module) = logging.filters.keys().find(|module| module.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid log filter target: {module:?}"
        )));
    }

    Ok(())
}

fn validate_route_parameters(names: &[String]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(ConfigError::validation("Route parameter names must not be empty"));
        }
        // Route values are matched case-insensitively.
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(ConfigError::validation(format!(
                "Duplicate route parameter: {name}"
            )));
        }
    }
    Ok(())
}
