//! Error types for document model operations

use crate::{BoxId, LineId, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocModelError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Table not found: {0}")]
    TableNotFound(NodeId),

    #[error("Line not found: {0}")]
    LineNotFound(LineId),

    #[error("Box not found: {0}")]
    BoxNotFound(BoxId),

    #[error("Invalid node index: {0}")]
    InvalidIndex(usize),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Tree structure error: {0}")]
    TreeStructureError(String),
}

pub type Result<T> = std::result::Result<T, DocModelError>;
