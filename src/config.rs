//! Session configuration.
//!
//! Settings are plain JSON; every field is optional and falls back to its
//! default.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Largest page size the GraphQL API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Items requested per "fetch more" (`first:` argument).
    pub page_size: u32,

    /// Capacity of the session command channel.
    pub command_buffer: usize,

    /// Capacity of the session event broadcast.
    pub event_buffer: usize,

    /// Never decrement a counter below zero.
    pub clamp_counters: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            command_buffer: 16,
            event_buffer: 64,
            clamp_counters: true,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AppError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, using defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::info!("[config] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(AppError::invalid_input_field(
                format!("page_size must be between 1 and {}", MAX_PAGE_SIZE),
                "page_size",
            ));
        }
        if self.command_buffer == 0 {
            return Err(AppError::invalid_input_field(
                "command_buffer must be positive",
                "command_buffer",
            ));
        }
        if self.event_buffer == 0 {
            return Err(AppError::invalid_input_field(
                "event_buffer must be positive",
                "event_buffer",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.page_size, 5);
        assert!(config.clamp_counters);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SessionConfig::from_json_str(r#"{"page_size": 20}"#).unwrap();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.command_buffer, 16);
        assert_eq!(config.event_buffer, 64);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SessionConfig::from_json_str(r#"{"page_size": 0}"#).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));

        let err = SessionConfig::from_json_str(r#"{"page_size": 101}"#).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));

        let err = SessionConfig::from_json_str(r#"{"event_buffer": 0}"#).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
    }

    #[test]
    fn test_unparsable_json() {
        let err = SessionConfig::from_json_str("page_size = 5").unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }
}
