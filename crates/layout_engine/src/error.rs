//! Error types for layout engine

use crate::FrameId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Layout failed: {0}")]
    LayoutFailed(String),

    #[error("Frame not found: {0}")]
    FrameNotFound(FrameId),

    #[error("Invalid frame insertion: {0}")]
    InvalidInsertion(String),

    #[error("Frame tree broken: {0}")]
    BrokenTree(String),

    #[error("Document model error: {0}")]
    DocModel(#[from] doc_model::DocModelError),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
