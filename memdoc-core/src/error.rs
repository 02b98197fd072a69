// error.rs
use thiserror::Error;

/// Errors produced by the document engine
#[derive(Error, Debug)]
pub enum MemDocError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Invalid projection: {0}")]
    InvalidProjection(String),

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unsupported expression operator: {0}")]
    UnsupportedExpression(String),

    #[error("Unsupported accumulator: {0}")]
    UnsupportedAccumulator(String),

    #[error("Unsupported stage: {0}")]
    UnsupportedStage(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Division by zero")]
    DivideByZero,

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid connection URI: {0}")]
    InvalidUri(String),

    #[error("Database connection is closed")]
    ConnectionClosed,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemDocError {
    /// True for the malformed-argument family (bad pipeline, projection,
    /// update, query or path shape).
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            MemDocError::InvalidArgument(_)
                | MemDocError::InvalidUpdate(_)
                | MemDocError::InvalidProjection(_)
                | MemDocError::InvalidPipeline(_)
                | MemDocError::InvalidQuery(_)
                | MemDocError::InvalidPath(_)
        )
    }

    /// True for recognized operators the engine does not implement.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            MemDocError::UnsupportedExpression(_)
                | MemDocError::UnsupportedAccumulator(_)
                | MemDocError::UnsupportedStage(_)
        )
    }
}

impl From<serde_json::Error> for MemDocError {
    fn from(err: serde_json::Error) -> Self {
        MemDocError::Serialization(err.to_string())
    }
}

impl From<bson::ser::Error> for MemDocError {
    fn from(err: bson::ser::Error) -> Self {
        MemDocError::Serialization(err.to_string())
    }
}

impl From<bson::de::Error> for MemDocError {
    fn from(err: bson::de::Error) -> Self {
        MemDocError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MemDocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_family() {
        assert!(MemDocError::InvalidPipeline("x".into()).is_invalid_argument());
        assert!(MemDocError::InvalidProjection("x".into()).is_invalid_argument());
        assert!(MemDocError::InvalidUpdate("x".into()).is_invalid_argument());
        assert!(!MemDocError::DivideByZero.is_invalid_argument());
        assert!(!MemDocError::TypeMismatch("x".into()).is_invalid_argument());
    }

    #[test]
    fn test_unsupported_family() {
        assert!(MemDocError::UnsupportedAccumulator("$accumulator".into()).is_unsupported());
        assert!(MemDocError::UnsupportedExpression("$foo".into()).is_unsupported());
        assert!(!MemDocError::InvalidPipeline("x".into()).is_unsupported());
    }

    #[test]
    fn test_error_messages() {
        let err = MemDocError::UnsupportedExpression("$pow".into());
        assert_eq!(err.to_string(), "Unsupported expression operator: $pow");
        assert_eq!(MemDocError::DivideByZero.to_string(), "Division by zero");
    }
}
