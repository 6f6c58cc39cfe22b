//! Error types for editing operations

use thiserror::Error;

/// Why an operation declined to run.
///
/// These are expected outcomes the command layer reports to the user; the
/// document is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("linked tables cannot be edited")]
    DdeTable,

    #[error("tables cannot be placed inside a footnote")]
    InsideFootnote,

    #[error("range does not consist of paragraphs only")]
    NotTextRange,

    #[error("no boxes selected")]
    NoSelection,

    #[error("selection is too complex")]
    TooComplex,

    #[error("selection spans several tables")]
    MixedTables,

    #[error("tables are not adjacent")]
    NotAdjacent,

    #[error("nothing to split")]
    NothingToSplit,
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Refused: {0}")]
    Refused(#[from] Refusal),

    #[error("Document model error: {0}")]
    DocModel(#[from] doc_model::DocModelError),

    #[error("Layout error: {0}")]
    Layout(#[from] layout_engine::LayoutError),

    #[error("Revision error: {0}")]
    Revision(#[from] revisions::RevisionError),

    #[error("Undo stack is empty")]
    UndoStackEmpty,

    #[error("Redo stack is empty")]
    RedoStackEmpty,
}

impl EditError {
    /// The refusal, if the operation declined to run
    pub fn refusal(&self) -> Option<Refusal> {
        match self {
            EditError::Refused(r) => Some(*r),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EditError>;
