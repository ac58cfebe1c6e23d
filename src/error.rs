//! Custom error types for Overseer.
//!
//! This module provides structured error types that separate fatal setup
//! failures from the recoverable conditions a supervision session is
//! expected to ride through.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Overseer operations
#[derive(Error, Debug)]
pub enum OverseerError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Unknown supervision mode name
    #[error("Unknown supervision mode '{0}' (expected strict, balanced, permissive or auto)")]
    UnknownMode(String),

    // =========================================================================
    // Setup Errors
    // =========================================================================
    /// Monitored executable could not be found
    #[error("Monitored executable not found: {name} ({detail})")]
    MissingExecutable { name: String, detail: String },

    /// Monitored process could not be spawned
    #[error("Failed to spawn monitored process '{command}': {message}")]
    Spawn { command: String, message: String },

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// Session is no longer accepting work
    #[error("Session {session_id} is not active")]
    SessionInactive { session_id: String },

    /// Response could not be delivered to the monitored session
    #[error("Delivery failed: {message}")]
    Delivery { message: String },

    // =========================================================================
    // Context Errors
    // =========================================================================
    /// Writing the project-instruction file failed
    #[error("Failed to write instruction file {path}: {message}")]
    InstructionWrite { path: PathBuf, message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OverseerError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid-configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a delivery error
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }

    /// Create a spawn error
    pub fn spawn(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Spawn {
            command: command.into(),
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error is recoverable without ending the session
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Delivery { .. } | Self::InstructionWrite { .. } | Self::Io(_)
        )
    }

    /// Check if this error is fatal for a supervision session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingExecutable { .. }
                | Self::Spawn { .. }
                | Self::InvalidConfig { .. }
                | Self::UnknownMode(_)
        )
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingExecutable { .. } | Self::Spawn { .. } => 6,
            Self::Config { .. } | Self::InvalidConfig { .. } | Self::UnknownMode(_) => 7,
            Self::InstructionWrite { .. } => 4,
            _ => 1,
        }
    }
}

/// Type alias for Overseer results
pub type Result<T> = std::result::Result<T, OverseerError>;
