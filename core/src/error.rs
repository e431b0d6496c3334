//! Error types for reading specifications.

use thiserror::Error;

/// Errors raised while turning raw input into a [`Specification`].
///
/// Semantic problems are never reported through this type; they are
/// returned as [`Issue`](crate::Issue) data by the validator.
///
/// [`Specification`]: crate::Specification
#[derive(Debug, Error)]
pub enum SpecError {
    /// Input is not a well-shaped specification object.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
