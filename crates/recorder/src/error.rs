//! Recorder error types

use contracts::ContractError;
use thiserror::Error;

/// Recorder-specific errors
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Session directory could not be created
    #[error("failed to create session directory '{path}': {source}")]
    SessionDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Image or animation encoding failed
    #[error("failed to encode '{resource}': {message}")]
    Encode { resource: String, message: String },

    /// Frame does not match the stream it is written to
    #[error("frame {width}x{height} does not fit stream '{resource}' ({expected_width}x{expected_height})")]
    FrameMismatch {
        resource: String,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecorderError {
    pub fn encode(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Degrade to the shared taxonomy: every recorder failure affects one output only
    pub fn into_contract(self, resource: &str) -> ContractError {
        ContractError::resource_write(resource, self.to_string())
    }
}

/// Recorder Result 类型别名
pub type Result<T> = std::result::Result<T, RecorderError>;
