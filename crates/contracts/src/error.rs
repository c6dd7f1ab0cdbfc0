//! Layered error definitions
//!
//! Categorized by source: config / device / frame / resource / backend

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Device Errors =====
    /// Camera, detector or audio device could not be acquired (fatal at startup)
    #[error("device '{device}' unavailable: {message}")]
    DeviceUnavailable { device: String, message: String },

    /// Capture stream ended (normal termination trigger)
    #[error("stream from '{device}' ended")]
    StreamEnded { device: String },

    // ===== Per-frame Errors =====
    /// Detection or processing failed for a single frame
    #[error("transient frame error in '{stage}': {message}")]
    TransientFrame { stage: String, message: String },

    // ===== Output Errors =====
    /// Video/CSV/plot write failure
    #[error("resource '{resource}' write error: {message}")]
    ResourceWrite { resource: String, message: String },

    /// Audio backend failure (device gone, write error)
    #[error("audio backend '{backend}' failure: {message}")]
    BackendFailure { backend: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create device unavailable error
    pub fn device_unavailable(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create stream ended error
    pub fn stream_ended(device: impl Into<String>) -> Self {
        Self::StreamEnded {
            device: device.into(),
        }
    }

    /// Create transient frame error
    pub fn transient_frame(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientFrame {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create resource write error
    pub fn resource_write(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceWrite {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create audio backend failure
    pub fn backend_failure(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendFailure {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort the run.
    ///
    /// Only acquisition and configuration failures are fatal; everything else
    /// is handled by the component that owns it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DeviceUnavailable { .. } | Self::ConfigParse { .. } | Self::ConfigValidation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_classification() {
        assert!(ContractError::device_unavailable("cam0", "busy").is_fatal());
        assert!(!ContractError::stream_ended("cam0").is_fatal());
        assert!(!ContractError::transient_frame("hand", "bad buffer").is_fatal());
        assert!(!ContractError::resource_write("plot", "disk full").is_fatal());
        assert!(!ContractError::backend_failure("midi", "gone").is_fatal());
    }

    #[test]
    fn test_display_includes_context() {
        let err = ContractError::device_unavailable("hand_cam", "no such device");
        assert_eq!(
            err.to_string(),
            "device 'hand_cam' unavailable: no such device"
        );
    }
}
