//! # Engine Errors
//!
//! Error taxonomy for the intent-matching engine. Every variant carries owned
//! data only so the error can be cloned and handed to each caller waiting on
//! a shared initialization attempt.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The backend produced a tensor shape the engine cannot reduce to one vector.
    #[error("malformed embedding output: {0}")]
    MalformedEmbeddingOutput(String),

    /// Two vectors of different length were compared. Usually means the
    /// catalogue was embedded by a different model than the input.
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// The backend failed to embed a single text.
    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    /// The backend could not be warmed up.
    #[error("embedding backend unavailable: {0}")]
    BackendUnavailable(String),

    /// No catalogue phrase could be embedded, so nothing can ever match.
    #[error("catalogue embedding produced no entries")]
    EmptyCatalogue,

    /// The catalogue definition itself is unusable.
    #[error("invalid catalogue: {0}")]
    InvalidCatalogue(String),
}

impl EngineError {
    /// Errors after which the engine cannot serve any request until `init()`
    /// succeeds.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, EngineError::BackendUnavailable(_) | EngineError::EmptyCatalogue)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::DimensionMismatch { left: 384, right: 768 };
        assert_eq!(err.to_string(), "embedding dimension mismatch: 384 vs 768");

        let err = EngineError::BackendUnavailable("model files missing".into());
        assert!(err.to_string().contains("model files missing"));
    }

    #[test]
    fn test_unavailable_classification() {
        assert!(EngineError::EmptyCatalogue.is_unavailable());
        assert!(EngineError::BackendUnavailable("x".into()).is_unavailable());
        assert!(!EngineError::EmbeddingFailed("x".into()).is_unavailable());
        assert!(!EngineError::DimensionMismatch { left: 1, right: 2 }.is_unavailable());
    }
}
