//! Unified error handling for Fluente
//!
//! Module-level failures (`GenerationError`, `StoreError`, `StreamFailure`,
//! `TutorError`) are `thiserror` enums close to where they occur. This module
//! provides the crate-wide error that callers outside the library see.

use std::fmt;

use crate::caching::StoreError;
use crate::generation::GenerationError;
use crate::tutor::{StreamFailure, TutorError};

/// Main error type for Fluente
#[derive(Debug)]
pub enum FluenteError {
    /// Configuration-related errors
    Config {
        /// Error message
        message: String,
    },

    /// I/O errors from file operations
    Io(std::io::Error),

    /// Serde JSON errors
    SerdeJson(serde_json::Error),

    /// Content generation failed
    Generation(GenerationError),

    /// Durable store could not be written
    Store(StoreError),

    /// Tutor conversation errors
    Tutor(TutorError),

    /// Validation errors
    Validation {
        /// Error message
        message: String,
    },
}

impl fmt::Display for FluenteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FluenteError::Config { message } => {
                write!(
                    f,
                    "Configuration error: {message}. \
                          Solution: Check your config file or start from Config::default()"
                )
            },
            FluenteError::Io(err) => {
                write!(
                    f,
                    "I/O error: {err}. \
                          Solution: Check file permissions and that the cache directory exists"
                )
            },
            FluenteError::SerdeJson(err) => {
                write!(
                    f,
                    "JSON serialization error: {err}. \
                          Solution: Verify data structure compatibility"
                )
            },
            FluenteError::Generation(err) => {
                write!(f, "{err}. Solution: {}", err.classification.hint())
            },
            FluenteError::Store(err) => {
                write!(
                    f,
                    "{err}. \
                          Solution: Check free disk space and write access to the store directory"
                )
            },
            FluenteError::Tutor(err) => {
                let hint = match err {
                    TutorError::StreamInProgress => {
                        "Wait for the current reply to finish, then resend your message"
                    },
                    TutorError::Stream(StreamFailure::Generation(e)) => e.classification.hint(),
                    TutorError::Stream(_) => "Resend your message",
                };
                write!(f, "{err}. Solution: {hint}")
            },
            FluenteError::Validation { message } => {
                write!(
                    f,
                    "Validation error: {message}. \
                          Solution: Check input format and required fields"
                )
            },
        }
    }
}

impl std::error::Error for FluenteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FluenteError::Io(err) => Some(err),
            FluenteError::SerdeJson(err) => Some(err),
            FluenteError::Generation(err) => Some(err),
            FluenteError::Store(err) => Some(err),
            FluenteError::Tutor(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FluenteError {
    fn from(err: std::io::Error) -> Self {
        FluenteError::Io(err)
    }
}

impl From<serde_json::Error> for FluenteError {
    fn from(err: serde_json::Error) -> Self {
        FluenteError::SerdeJson(err)
    }
}

impl From<GenerationError> for FluenteError {
    fn from(err: GenerationError) -> Self {
        FluenteError::Generation(err)
    }
}

impl From<StoreError> for FluenteError {
    fn from(err: StoreError) -> Self {
        FluenteError::Store(err)
    }
}

impl From<TutorError> for FluenteError {
    fn from(err: TutorError) -> Self {
        FluenteError::Tutor(err)
    }
}

impl From<StreamFailure> for FluenteError {
    fn from(err: StreamFailure) -> Self {
        FluenteError::Tutor(TutorError::Stream(err))
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, FluenteError>;

/// Trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn with_context(self, context: &str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<FluenteError>,
{
    fn with_context(self, context: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            FluenteError::Config { message } => FluenteError::Config {
                message: format!("{context}: {message}"),
            },
            FluenteError::Validation { message } => FluenteError::Validation {
                message: format!("{context}: {message}"),
            },
            FluenteError::Io(err) => FluenteError::Config {
                message: format!("{context}: {err}"),
            },
            other => other,
        })
    }
}
