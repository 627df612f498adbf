//! # Observability Configuration
//!
//! Environment-specific settings for logging output.

use std::env;

use crate::errors::{AppError, AppResult};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Observability configuration for different environments
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityConfig {
    /// Environment name (development, staging, production)
    pub environment: String,
    /// Log level for this crate's targets
    pub log_level: String,
    /// Output format override: "pretty" or "json"
    pub log_format: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: None,
        }
    }
}

impl ObservabilityConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: lookup("LOG_FORMAT"),
        }
    }

    /// Check if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Pretty output in development unless JSON is asked for explicitly
    pub fn use_pretty_format(&self) -> bool {
        match self.log_format.as_deref() {
            Some(format) => format == "pretty",
            None => self.is_development(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "Invalid log level: {}. Expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        if let Some(format) = &self.log_format {
            if format != "pretty" && format != "json" {
                return Err(AppError::Config(format!(
                    "Invalid LOG_FORMAT: {}. Expected 'pretty' or 'json'",
                    format
                )));
            }
        }

        Ok(())
    }
}
