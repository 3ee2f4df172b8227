//! Error types.
//!
//! Interactive edits never fail: disabled or out-of-range operations return
//! `false`. Only deserialization and configuration loading surface errors.

use thiserror::Error;

/// Errors raised while (de)serializing elements and scenes.
#[derive(Debug, Error)]
pub enum ElementError {
    #[error("Unknown element class: {0}")]
    UnknownClass(String),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for element operations.
pub type ElementResult<T> = Result<T, ElementError>;

/// Errors raised while loading [`Settings`](crate::settings::Settings).
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
