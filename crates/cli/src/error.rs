//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A camera or the audio output could not be acquired
    #[error("Startup failed: {0}")]
    Startup(#[from] contracts::ContractError),

    /// A landmark worker could not be started
    #[error("Worker startup failed: {0}")]
    Worker(#[from] ingestion::IngestionError),

    /// The session directory could not be created
    #[error("Recorder startup failed: {0}")]
    Recorder(#[from] recorder::RecorderError),

    /// The run stopped on an unrecoverable error (after a full shutdown)
    #[error("Pipeline execution failed: {message}")]
    PipelineExecution { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn pipeline_execution(message: impl Into<String>) -> Self {
        Self::PipelineExecution {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
