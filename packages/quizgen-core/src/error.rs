//! Error types shared across the pipeline crates

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Upload has no fragments
    NotFound,
    /// Aggregated document is blank after trimming
    InsufficientContent,
    /// Generator strategy could not produce a valid question
    GenerationFailed,
    /// Question references a non-existent upload
    WriteConflict,
    /// Transient store error (retryable during persistence)
    StoreUnavailable,
    /// Run was cancelled by the caller
    Cancelled,
    /// Guarded state machine rejected a transition
    InvalidTransition,
    /// Stored value could not be decoded
    Parse,
    /// Configuration errors
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InsufficientContent => "insufficient_content",
            ErrorKind::GenerationFailed => "generation_failed",
            ErrorKind::WriteConflict => "write_conflict",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Parse => "parse",
            ErrorKind::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline error type
///
/// Store-layer failures are wrapped with the originating upload id and
/// surfaced unchanged up to the orchestrator, which is the sole decision
/// point for retry.
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct PipelineError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub upload_id: Option<String>,
    pub message: String,
}

impl PipelineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            upload_id: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_upload_id(mut self, upload_id: impl Into<String>) -> Self {
        self.upload_id = Some(upload_id.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Only transient store errors are eligible for automatic retry.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::StoreUnavailable
    }

    // Convenience constructors

    pub fn not_found(upload_id: impl Into<String>) -> Self {
        let upload_id = upload_id.into();
        Self::new(
            ErrorKind::NotFound,
            format!("no fragments for upload: {}", upload_id),
        )
        .with_upload_id(upload_id)
    }

    pub fn insufficient_content(upload_id: impl Into<String>) -> Self {
        let upload_id = upload_id.into();
        Self::new(
            ErrorKind::InsufficientContent,
            format!("document is blank for upload: {}", upload_id),
        )
        .with_upload_id(upload_id)
    }

    pub fn generation_failed(upload_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::GenerationFailed, message).with_upload_id(upload_id)
    }

    pub fn write_conflict(upload_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WriteConflict, message).with_upload_id(upload_id)
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StoreUnavailable, message)
    }

    pub fn cancelled(upload_id: impl Into<String>, step: &str) -> Self {
        let upload_id = upload_id.into();
        Self::new(
            ErrorKind::Cancelled,
            format!("run cancelled before step: {}", step),
        )
        .with_upload_id(upload_id)
    }

    pub fn invalid_transition(from: &str, to: &str) -> Self {
        Self::new(
            ErrorKind::InvalidTransition,
            format!("invalid state transition: {} -> {}", from, to),
        )
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = PipelineError::not_found("u2");
        let msg = format!("{}", err);
        assert!(msg.contains("not_found"));
        assert!(msg.contains("u2"));
    }

    #[test]
    fn test_error_carries_upload_id() {
        let err = PipelineError::write_conflict("u1", "upload does not exist");
        assert_eq!(err.kind, ErrorKind::WriteConflict);
        assert_eq!(err.upload_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_only_store_unavailable_is_retryable() {
        assert!(PipelineError::store_unavailable("pool timeout").is_retryable());
        assert!(!PipelineError::not_found("u1").is_retryable());
        assert!(!PipelineError::write_conflict("u1", "fk").is_retryable());
        assert!(!PipelineError::generation_failed("u1", "empty").is_retryable());
        assert!(!PipelineError::insufficient_content("u1").is_retryable());
    }

    #[test]
    fn test_with_source() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err = PipelineError::store_unavailable("query failed").with_source(io_err);

        assert_eq!(err.kind, ErrorKind::StoreUnavailable);
        let source = err.source().unwrap();
        assert!(source.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_kind_as_str() {
        assert_eq!(ErrorKind::NotFound.as_str(), "not_found");
        assert_eq!(
            ErrorKind::InsufficientContent.as_str(),
            "insufficient_content"
        );
        assert_eq!(ErrorKind::GenerationFailed.as_str(), "generation_failed");
        assert_eq!(ErrorKind::WriteConflict.as_str(), "write_conflict");
        assert_eq!(ErrorKind::StoreUnavailable.as_str(), "store_unavailable");
        assert_eq!(ErrorKind::Cancelled.as_str(), "cancelled");
    }

    #[test]
    fn test_result_propagation() {
        fn inner() -> Result<()> {
            Err(PipelineError::not_found("u9"))
        }

        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
