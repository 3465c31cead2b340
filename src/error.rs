//! Error types for Wrist Flux
//!
//! The per-frame core never fails; these errors belong to the outer surfaces
//! (frame record parsing, configuration, snapshot encoding, FFI).

use thiserror::Error;

/// Errors that can occur outside the per-frame core
#[derive(Debug, Error)]
pub enum FluxError {
    #[error("Failed to parse frame record: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Invalid frame record: {0}")]
    InvalidFrame(#[from] crate::frame::ValidationError),
}
