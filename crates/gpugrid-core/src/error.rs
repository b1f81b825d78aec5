//! Error types for gpugrid

use thiserror::Error;

/// Main error type for gpugrid
#[derive(Error, Debug)]
pub enum GridError {
    /// Task request rejected at admission
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Execution attempted on a node that is not idle
    #[error("Node {node_id} is not available for task execution (state: {state})")]
    ResourceUnavailable { node_id: u32, state: String },

    /// Node ID outside the grid
    #[error("Node not found: {0}")]
    NodeNotFound(u32),

    /// Unknown task ID
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// A running task was aborted before its natural completion
    #[error("Task {task_id} interrupted on node {node_id}")]
    ExecutionInterrupted { task_id: String, node_id: u32 },

    /// Task exists but is no longer pending
    #[error("Task cannot be cancelled: {0}")]
    TaskNotCancellable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for gpugrid operations
pub type GridResult<T> = Result<T, GridError>;

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for GridError {
    fn from(err: toml::de::Error) -> Self {
        GridError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GridError::ResourceUnavailable {
            node_id: 3,
            state: "busy".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Node 3 is not available for task execution (state: busy)"
        );
        assert_eq!(GridError::NodeNotFound(9).to_string(), "Node not found: 9");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GridError = io_err.into();
        assert!(matches!(err, GridError::Io(_)));
    }

    #[test]
    fn test_error_from_toml() {
        let err: GridError = toml::from_str::<toml::Value>("= broken").unwrap_err().into();
        assert!(matches!(err, GridError::Config(_)));
    }
}
