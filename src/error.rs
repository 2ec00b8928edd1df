use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the trading bot
#[derive(Error, Debug)]
pub enum TraderError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Environment errors
    #[error("Invalid action {action}: expected 0 (hold), 1 (buy) or 2 (sell)")]
    InvalidAction { action: usize },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Data errors
    #[error("Insufficient data: {rows} rows available, need at least {required}")]
    InsufficientData { rows: usize, required: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Learning errors
    #[error("Insufficient samples: buffer holds {available}, batch needs {requested}")]
    InsufficientSamples { available: usize, requested: usize },

    // Persistence errors
    #[error("Persistence error for {path:?}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for TraderError
pub type Result<T> = std::result::Result<T, TraderError>;
