//! Application error types.
//!
//! These errors are serializable so a host UI can receive them as
//! structured JSON and decide how to render them.

use serde::Serialize;
use thiserror::Error;

/// Application-level errors returned by the merger, the cache reconciler
/// and the session task.
///
/// All variants serialize to a structured JSON object for frontend consumption.
#[derive(Debug, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Reconciliation targeted an identity that is not in the cache.
    #[error("Entity not found: {entity_id}")]
    EntityNotFound { entity_id: String },

    /// A fetched page is missing required pagination metadata.
    #[error("Malformed page: {message}")]
    MalformedPage {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// A counter or flag field is missing or has the wrong type.
    #[error("Invalid field: {message}")]
    InvalidField {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Configuration could not be loaded.
    #[error("Config error: {message}")]
    Config { message: String },

    /// The background session is not running.
    #[error("Session error: {message}")]
    Session { message: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create an entity not found error.
    pub fn entity_not_found(entity_id: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity_id: entity_id.into(),
        }
    }

    /// Create a malformed page error.
    pub fn malformed_page(message: impl Into<String>) -> Self {
        Self::MalformedPage {
            message: message.into(),
            field: None,
        }
    }

    /// Create a malformed page error naming the offending field.
    pub fn malformed_page_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MalformedPage {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an invalid field error for a path on an entity.
    pub fn invalid_field(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::InvalidField {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a session error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is an entity not found error.
    pub fn is_entity_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound { .. })
    }

    /// Check if this is a malformed page error.
    pub fn is_malformed_page(&self) -> bool {
        matches!(self, Self::MalformedPage { .. })
    }
}

// Conversions from common error types

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::config(err.to_string())
    }
}
