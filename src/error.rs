//! Error types for repository operations

use thiserror::Error;

/// Errors that can occur while building or executing repository commands
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Malformed condition: {0}")]
    MalformedCondition(String),

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Logic operator required to join {0} condition terms")]
    MissingLogicOperator(usize),

    #[error("Wrong logic operator count: expected {expected}, got {actual}")]
    WrongLogicOperatorCount { expected: usize, actual: usize },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Row mapping error: {0}")]
    Mapping(String),

    #[error("{error} (rollback failed: {rollback})")]
    RollbackFailed {
        error: Box<RepositoryError>,
        rollback: Box<RepositoryError>,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl RepositoryError {
    pub fn invalid_column(name: impl Into<String>) -> Self {
        Self::InvalidColumn(name.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedCondition(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }

    /// True for errors raised before any statement reaches the data store
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidColumn(_)
                | Self::MalformedCondition(_)
                | Self::InvalidOperator(_)
                | Self::MissingLogicOperator(_)
                | Self::WrongLogicOperatorCount { .. }
                | Self::Validation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(RepositoryError::invalid_column("Nope").is_validation());
        assert!(RepositoryError::MissingLogicOperator(2).is_validation());
        assert!(
            RepositoryError::WrongLogicOperatorCount {
                expected: 1,
                actual: 3
            }
            .is_validation()
        );
        assert!(!RepositoryError::execution("constraint violated").is_validation());
        assert!(!RepositoryError::mapping("bad row").is_validation());
    }

    #[test]
    fn test_rollback_failed_message() {
        let err = RepositoryError::RollbackFailed {
            error: Box::new(RepositoryError::execution("duplicate key")),
            rollback: Box::new(RepositoryError::Connection("reset by peer".to_string())),
        };
        let msg = err.to_string();
        assert!(msg.contains("duplicate key"));
        assert!(msg.contains("rollback failed"));
    }
}
