//! Error types for spacegate.
//!
//! Defines the error taxonomy shared by the connection, schema and query layers.

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Target unreachable, authentication rejected, or connect timeout.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Protocol failure after the connection was established.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The engine accepted the call but the statement failed.
    /// Carries the engine's own message.
    #[error("Engine error: {0}")]
    Engine(String),

    /// The response did not match any recognized shape.
    #[error("Format error: {0}")]
    Format(String),

    /// Configuration errors (invalid config file, unresolved target, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates an engine error carrying the engine's message.
    pub fn engine(detail: impl Into<String>) -> Self {
        Self::Engine(detail.into())
    }

    /// Creates a format error with the given message.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Transport(_) => "Transport Error",
            Self::Engine(_) => "Engine Error",
            Self::Format(_) => "Format Error",
            Self::Config(_) => "Configuration Error",
        }
    }

    /// Native engine text, present only for engine statement errors.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Engine(detail) => Some(detail),
            _ => None,
        }
    }
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
