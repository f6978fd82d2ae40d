//! Error types for gemway.

use std::io;

use serde::Serialize;

/// Errors produced by the gemway crates.
#[derive(Debug, thiserror::Error)]
pub enum GemwayError {
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("too many requests")]
    RateLimited,

    #[error("{status} {message}")]
    Protocol { status: u8, message: String },

    #[error("too many redirects (limit {limit})")]
    TooManyRedirects { limit: u8 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("a navigation is already in flight")]
    Busy,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a [`GemwayError`], stable enough for a
/// presentation layer to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidReference,
    Forbidden,
    RateLimited,
    ProtocolError,
    TooManyRedirects,
    TransportError,
    Busy,
    Config,
    Internal,
}

impl GemwayError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GemwayError::InvalidReference(_) => ErrorKind::InvalidReference,
            GemwayError::Forbidden(_) => ErrorKind::Forbidden,
            GemwayError::RateLimited => ErrorKind::RateLimited,
            GemwayError::Protocol { .. } => ErrorKind::ProtocolError,
            GemwayError::TooManyRedirects { .. } => ErrorKind::TooManyRedirects,
            GemwayError::Transport(_) => ErrorKind::TransportError,
            GemwayError::Busy => ErrorKind::Busy,
            GemwayError::Config(_) | GemwayError::TomlParse(_) => ErrorKind::Config,
            GemwayError::Io(_) | GemwayError::Json(_) => ErrorKind::Internal,
        }
    }

    /// The Gemini status code carried by a protocol error, if any.
    pub fn status(&self) -> Option<u8> {
        match self {
            GemwayError::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, GemwayError>;
