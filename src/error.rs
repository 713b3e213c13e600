//! Error types for the AppFleet operator

use std::fmt;

/// Result type alias for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Errors that can occur during operator operations
#[derive(Debug)]
pub enum OperatorError {
    /// Kubernetes API error
    KubeApi(String),
    /// Configuration error, surfaced at startup
    Configuration(String),
    /// Reconciliation error
    Reconciliation(String),
    /// Application store error
    Persistence(String),
    /// Notification dispatch error
    Notification(String),
    /// Node metrics and node capacities could not be paired
    MetricsMismatch { metrics: usize, capacities: usize },
    /// Serialization error
    Serialization(String),
    /// Resource not found
    NotFound(String),
    /// Application spec failed validation
    InvalidSpec(String),
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorError::KubeApi(msg) => write!(f, "Kubernetes API error: {}", msg),
            OperatorError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            OperatorError::Reconciliation(msg) => write!(f, "Reconciliation error: {}", msg),
            OperatorError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            OperatorError::Notification(msg) => write!(f, "Notification error: {}", msg),
            OperatorError::MetricsMismatch {
                metrics,
                capacities,
            } => write!(
                f,
                "Metrics mismatch: {} node metrics for {} node capacities",
                metrics, capacities
            ),
            OperatorError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            OperatorError::NotFound(msg) => write!(f, "Resource not found: {}", msg),
            OperatorError::InvalidSpec(msg) => write!(f, "Invalid application spec: {}", msg),
        }
    }
}

impl std::error::Error for OperatorError {}

impl From<kube::Error> for OperatorError {
    fn from(err: kube::Error) -> Self {
        OperatorError::KubeApi(err.to_string())
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for OperatorError {
    fn from(err: reqwest::Error) -> Self {
        OperatorError::Notification(err.to_string())
    }
}
