//! Unified error type for all Agendum crates.

use thiserror::Error;

/// Errors that can occur across the Agendum service.
#[derive(Error, Debug)]
pub enum AgendumError {
    /// Data store (SQLite) error.
    #[error("Store error: {0}")]
    Store(String),

    /// Delivery channel error (push, email).
    #[error("Channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Gateway/HTTP error.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgendumError {
    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, AgendumError>;
