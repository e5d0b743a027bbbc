//! Error taxonomy for the question-answering pipeline
//!
//! Propagation policy: only `Validation`, `Authorization`, `Retrieval`
//! and `Internal` may terminate a request with an explicit error.
//! Classification and generation faults are absorbed into degraded
//! responses inside their stages; their variants exist for logging and
//! for collaborator crates converting into this taxonomy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable error-type tag carried in API error payloads
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Validation(_) => "ValidationError",
            Error::Authorization(_) => "AuthorizationError",
            Error::Classification(_) => "ClassificationError",
            Error::Retrieval(_) => "RetrievalError",
            Error::Generation(_) => "GenerationError",
            Error::Store(_) => "StoreError",
            Error::Llm(_) => "LlmError",
            Error::Internal(_) => "InternalError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_tags() {
        assert_eq!(
            Error::Validation("too short".into()).error_type(),
            "ValidationError"
        );
        assert_eq!(Error::Retrieval("down".into()).error_type(), "RetrievalError");
        assert_eq!(Error::Internal("boom".into()).error_type(), "InternalError");
    }
}
