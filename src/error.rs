//! Error types for Leadflow.
//!
//! All errors in Leadflow are represented by the `LeadflowError` enum,
//! which provides specific variants for different error categories.
//! Editor-side validation is reported separately through
//! [`SaveError`](crate::SaveError), which never travels through this type.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Leadflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum LeadflowError {
    /// Engine-level errors (startup, shutdown, runtime wiring).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML, wire enums).
    #[error("{0}")]
    Convert(String),

    /// Sequence definition errors.
    #[error("{0}")]
    Sequence(String),

    /// Step definition or execution errors.
    #[error("{0}")]
    Step(String),

    /// Enrollment lifecycle errors.
    #[error("{0}")]
    Enrollment(String),

    /// Lead directory errors.
    #[error("{0}")]
    Lead(String),

    /// Message gateway errors.
    #[error("{0}")]
    Gateway(String),

    /// Response classifier errors.
    #[error("{0}")]
    Classifier(String),

    /// Storage operation errors.
    #[error("{0}")]
    Store(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Runtime execution errors.
    #[error("{0}")]
    Runtime(String),
}

impl From<LeadflowError> for String {
    fn from(val: LeadflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for LeadflowError {
    fn from(error: std::io::Error) -> Self {
        LeadflowError::IoError(error.to_string())
    }
}

impl From<LeadflowError> for std::io::Error {
    fn from(val: LeadflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for LeadflowError {
    fn from(_: FromUtf8Error) -> Self {
        LeadflowError::Runtime("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for LeadflowError {
    fn from(error: serde_json::Error) -> Self {
        LeadflowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for LeadflowError {
    fn from(error: toml::de::Error) -> Self {
        LeadflowError::Config(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for LeadflowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        LeadflowError::Convert(error.to_string())
    }
}

impl From<reqwest::Error> for LeadflowError {
    fn from(error: reqwest::Error) -> Self {
        LeadflowError::Gateway(error.to_string())
    }
}
