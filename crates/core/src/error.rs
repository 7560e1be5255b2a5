use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is not valid UTF-8 text: {}", .0.display())]
    NotUtf8(PathBuf),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("no text documents found: {0}")]
    NoDocuments(String),
}

/// Failure kinds surfaced by every pipeline component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidRequest,
    Configuration,
    Authentication,
    ProviderUnavailable,
    ContextTooLarge,
    EmptyIndex,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidRequest => "InvalidRequestError",
            Self::Configuration => "ConfigurationError",
            Self::Authentication => "AuthenticationError",
            Self::ProviderUnavailable => "ProviderUnavailableError",
            Self::ContextTooLarge => "ContextTooLargeError",
            Self::EmptyIndex => "EmptyIndexError",
            Self::Cancelled => "CancelledError",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum QaError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("embedding dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{provider} rejected the credential: {details}")]
    Authentication { provider: String, details: String },

    #[error("{provider} is unavailable: {details}")]
    ProviderUnavailable { provider: String, details: String },

    #[error("context too large: {0}")]
    ContextTooLarge(String),

    #[error("search against an empty index")]
    EmptyIndex,

    #[error("cancelled by caller")]
    Cancelled,
}

impl QaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Configuration(_) | Self::DimensionMismatch { .. } => ErrorKind::Configuration,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            Self::ContextTooLarge(_) => ErrorKind::ContextTooLarge,
            Self::EmptyIndex => ErrorKind::EmptyIndex,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn unavailable(provider: &str, details: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.to_string(),
            details: details.into(),
        }
    }
}

pub type Result<T, E = QaError> = std::result::Result<T, E>;
