//! Error types for the temporal annotation engine.
//!
//! Model-layer errors ([`EditError`]) are raised synchronously by every
//! mutation. Tracking and persistence errors are produced on background
//! workers and delivered asynchronously.

use thiserror::Error;

use crate::format::FormatError;

/// Errors raised by keyframe and visibility mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// The referenced frame or segment does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// What was looked up
        message: String,
    },

    /// The operation would break a sequence invariant or used invalid bounds.
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation was rejected
        message: String,
    },

    /// The target frame is already occupied, or the item is in a conflicting state.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },
}

impl EditError {
    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an invalid-operation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Error for a frame that carries no keyframe.
    pub fn no_keyframe(frame: u32) -> Self {
        Self::not_found(format!("no keyframe at frame {frame}"))
    }

    /// Error for a frame past the end of the video.
    pub fn frame_out_of_range(frame: u32, total_frames: u32) -> Self {
        Self::invalid(format!(
            "frame {frame} is outside [0, {total_frames})"
        ))
    }
}

/// Errors reported by the external tracking service integration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// The service could not be reached or refused the request.
    #[error("Tracking service unavailable: {0}")]
    ServiceUnavailable(String),

    /// No response arrived within the configured timeout.
    #[error("Tracking request timed out after {elapsed_ms} ms")]
    Timeout {
        /// Time waited before giving up
        elapsed_ms: u64,
    },

    /// The request was cancelled before a result was applied.
    #[error("Tracking request cancelled")]
    Cancelled,
}

/// Errors raised by a persistence backend.
#[derive(Error, Debug)]
pub enum PersistError {
    /// I/O error while writing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization of the record failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend-specific failure
    #[error("Store rejected write: {0}")]
    Rejected(String),
}

/// Umbrella error for callers that do not care which layer failed.
#[derive(Error, Debug)]
pub enum Error {
    /// Model mutation error
    #[error(transparent)]
    Edit(#[from] EditError),

    /// Tracking error
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    /// Persistence error
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Import/export error
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_error_messages() {
        assert_eq!(
            EditError::no_keyframe(12).to_string(),
            "Not found: no keyframe at frame 12"
        );
        assert_eq!(
            EditError::frame_out_of_range(100, 100).to_string(),
            "Invalid operation: frame 100 is outside [0, 100)"
        );
        assert!(matches!(
            EditError::conflict("x"),
            EditError::Conflict { .. }
        ));
    }

    #[test]
    fn test_umbrella_conversion() {
        let err: Error = TrackingError::Cancelled.into();
        assert!(matches!(err, Error::Tracking(TrackingError::Cancelled)));
        assert_eq!(err.to_string(), "Tracking request cancelled");
    }
}
