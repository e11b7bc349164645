//! Error types for certprep-core.

use thiserror::Error;

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Invalid input to the scheduling functions.
///
/// Aggregations (mastery, prediction, ROI) never fail; they degrade to
/// zero-valued results instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("invalid rating {0}: expected 1-4")]
    InvalidRating(i64),

    #[error("invalid elapsed time {0} days: must be finite and non-negative")]
    InvalidElapsed(f64),

    #[error("invalid desired retention {0}: must be between 0 and 1 (exclusive)")]
    InvalidRetention(f64),
}
