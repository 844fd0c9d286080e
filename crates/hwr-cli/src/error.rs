//! Error - CLI Error Types
//!
//! Defines error types for CLI operations.
//!
//! @version 0.1.0

use hwr_console::{ApiError, ChannelError, ConfigError, SessionError, TransportError};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// REST service error
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Training channel command error
    #[error("Training channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Training channel setup error
    #[error("Training channel error: {0}")]
    Transport(#[from] TransportError),

    /// Session store error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Captcha image could not be decoded
    #[error("Invalid captcha image: {0}")]
    Captcha(#[from] base64::DecodeError),

    /// Command needs a logged-in session
    #[error("Not logged in. Run `hwr login` first")]
    NotLoggedIn,

    /// Training service unreachable or the run failed
    #[error("Training error: {0}")]
    Training(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
