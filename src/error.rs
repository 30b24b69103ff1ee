//! Error types for the arena steward
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific steward scenarios
#[derive(Debug, thiserror::Error)]
pub enum StewardError {
    #[error("no suitable opponent for matchmaking type: {type_name}")]
    NoOpponent { type_name: String },

    #[error("arena event stream disconnected: {message}")]
    StreamDisconnected { message: String },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },
}
