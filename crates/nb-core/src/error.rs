//! # AppError
//!
//! Centralized error handling for the noticeboard.
//! Each variant is one failure kind the transport can answer differently.

use thiserror::Error;

/// The primary error type for all nb-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Row not found (e.g., Post 42, Attachment 7)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Input rejected at the boundary (e.g., blank title, broken multipart body)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Declared content type is not one of the accepted image types
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Filesystem failure while writing attachments
    #[error("storage error: {0}")]
    Storage(String),

    /// Database failure
    #[error("repository error: {0}")]
    Repository(String),

    /// Anything else (e.g., template rendering)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn post_not_found(id: i64) -> Self {
        AppError::NotFound("Post".to_string(), id.to_string())
    }

    pub fn attachment_not_found(id: i64) -> Self {
        AppError::NotFound("Attachment".to_string(), id.to_string())
    }
}

/// A specialized Result type for noticeboard logic.
pub type Result<T> = std::result::Result<T, AppError>;
