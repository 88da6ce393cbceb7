use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::SourceRole;

/// Errors raised by the compositing and recording pipeline.
///
/// All of them are scoped to the current session; none leaves the process
/// unable to arm a new one.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{role} source unavailable: {reason}")]
    SourceUnavailable { role: SourceRole, reason: String },

    #[error("unsupported recording configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("{0} source stopped producing frames")]
    SourceLost(SourceRole),

    #[error("no recording is active")]
    RecordingNotActive,

    #[error("recording {0} has not been saved yet")]
    UnsavedRecording(String),

    #[error("failed to write recording to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CaptureError {
    pub fn source_unavailable(role: SourceRole, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            role,
            reason: reason.into(),
        }
    }

    /// Whether the invoking layer should show this error to the user.
    ///
    /// Stop requests without an active recording are silently ignored.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, CaptureError::RecordingNotActive)
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            CaptureError::UnsupportedConfiguration(_) => "UNSUPPORTED_CONFIGURATION",
            CaptureError::SourceLost(_) => "SOURCE_LOST",
            CaptureError::RecordingNotActive => "RECORDING_NOT_ACTIVE",
            CaptureError::UnsavedRecording(_) => "UNSAVED_RECORDING",
            CaptureError::Io { .. } => "IO_ERROR",
            CaptureError::Encoder(_) => "ENCODER_ERROR",
            CaptureError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Error payload handed to a UI collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&CaptureError> for ErrorResponse {
    fn from(error: &CaptureError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_names_role() {
        let err = CaptureError::source_unavailable(SourceRole::Secondary, "no camera");
        assert_eq!(err.to_string(), "secondary source unavailable: no camera");
        assert_eq!(err.code(), "SOURCE_UNAVAILABLE");
    }

    #[test]
    fn test_recording_not_active_is_silent() {
        assert!(!CaptureError::RecordingNotActive.is_user_visible());
        assert!(CaptureError::SourceLost(SourceRole::Primary).is_user_visible());
        assert!(CaptureError::UnsupportedConfiguration("vp9".into()).is_user_visible());
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = CaptureError::Io {
            path: PathBuf::from("/tmp/out.webm"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/tmp/out.webm"));

        let response = ErrorResponse::from(&err);
        assert_eq!(response.code, "IO_ERROR");
    }
}
