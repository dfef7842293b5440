//! Error taxonomy for the grading engine.

use enough::StopReason;

/// Result alias used throughout the crate.
pub type GradeResult<T> = Result<T, GradeError>;

#[derive(Debug, thiserror::Error)]
pub enum GradeError {
    /// Unknown color space, profile, LUT format or unsupported document version.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Singular matrix, zero divisor, or a log of a non-positive value.
    #[error("numerical error: {0}")]
    Numerical(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed file content.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    /// Out-of-range parameters or mismatched dimensions.
    #[error("validation error: {0}")]
    Validation(String),
    /// A cache detected inconsistent internal state and refuses service until cleared.
    #[error("cache corrupted: {0}")]
    CacheCorrupted(String),
    /// A long-running job observed its [`enough::Stop`] and bailed out.
    #[error("operation stopped: {0}")]
    Cancelled(StopReason),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StopReason> for GradeError {
    fn from(reason: StopReason) -> Self {
        GradeError::Cancelled(reason)
    }
}

impl GradeError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// A serde_json failure reported against the offending document line.
    pub(crate) fn malformed_json(e: serde_json::Error) -> Self {
        Self::parse(e.line(), e.to_string())
    }
}
