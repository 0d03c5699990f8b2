//! Topology store errors

/// Topology store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopoError {
    #[error("node doesn't exist: {0}")]
    NoNode(String),
    #[error("node already exists: {0}")]
    NodeExists(String),
    #[error("timed out waiting for lock: {0}")]
    Timeout(String),
    #[error("interrupted while waiting for lock: {0}")]
    Interrupted(String),
    #[error("topology server for cell '{cell}' is unavailable")]
    Unavailable { cell: String },
    #[error("unknown cell: {0}")]
    UnknownCell(String),
    #[error("lock path mismatch: {path} is not the current lock")]
    BadLockPath { path: String },
    #[error("topology backend error: {0}")]
    Backend(String),
}

impl TopoError {
    /// Whether the error reports a missing record
    pub fn is_no_node(&self) -> bool {
        matches!(self, TopoError::NoNode(_))
    }
}

pub type Result<T> = std::result::Result<T, TopoError>;
