//! Command layer over the table operations
//!
//! Commands are plain serializable values that name one table operation
//! and its arguments. Box-based commands act on their own selection when
//! they carry one, otherwise on the engine's current selection.

use crate::{
    DeleteMode, EditingEngine, InsertTableOptions, Result, Separator, SplitMode,
};
use doc_model::{BoxId, BoxSelection, LineId, NodeId, Twips};
use serde::{Deserialize, Serialize};

/// What a command produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A table was created or survived the edit
    Table(NodeId),
    Boxes(Vec<BoxId>),
    Lines(Vec<LineId>),
    Paragraphs(Vec<NodeId>),
    Removed,
    Unchanged,
}

/// Trait for all editing commands
pub trait Command: std::fmt::Debug {
    /// Run the command against an engine
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome>;

    /// Get a display name for this command
    fn display_name(&self) -> &str;
}

fn selection_or_current(boxes: &Option<BoxSelection>, engine: &EditingEngine) -> BoxSelection {
    boxes.clone().unwrap_or_else(|| engine.selection().clone())
}

// =============================================================================
// Whole tables
// =============================================================================

/// Insert a new table before a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertTable {
    /// Node index the table goes in front of
    pub at: usize,
    pub rows: usize,
    pub cols: usize,
    #[serde(default)]
    pub options: InsertTableOptions,
}

impl InsertTable {
    pub fn new(at: usize, rows: usize, cols: usize) -> Self {
        Self {
            at,
            rows,
            cols,
            options: InsertTableOptions::default(),
        }
    }

    pub fn with_options(mut self, options: InsertTableOptions) -> Self {
        self.options = options;
        self
    }
}

impl Command for InsertTable {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        let table = engine.insert_table(self.at, self.rows, self.cols, &self.options)?;
        Ok(CommandOutcome::Table(table))
    }

    fn display_name(&self) -> &str {
        "Insert Table"
    }
}

/// Delete a whole table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTable {
    pub table: NodeId,
}

impl Command for DeleteTable {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        engine.delete_table(self.table)?;
        Ok(CommandOutcome::Removed)
    }

    fn display_name(&self) -> &str {
        "Delete Table"
    }
}

/// Split a table in front of the top-level line holding a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitTable {
    pub position: usize,
    pub mode: SplitMode,
    pub recalc_size: bool,
}

impl Command for SplitTable {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        let table = engine.split_table(self.position, self.mode, self.recalc_size)?;
        Ok(CommandOutcome::Table(table))
    }

    fn display_name(&self) -> &str {
        "Split Table"
    }
}

/// Merge the table holding a node with its neighbour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeTables {
    pub position: usize,
    /// Merge with the table in front instead of the one behind
    pub with_previous: bool,
}

impl Command for MergeTables {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        let table = engine.merge_tables(self.position, self.with_previous)?;
        Ok(CommandOutcome::Table(table))
    }

    fn display_name(&self) -> &str {
        "Merge Tables"
    }
}

// =============================================================================
// Rows and columns
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertColumns {
    #[serde(default)]
    pub boxes: Option<BoxSelection>,
    pub count: usize,
    pub behind: bool,
}

impl Command for InsertColumns {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        let boxes = selection_or_current(&self.boxes, engine);
        let created = engine.insert_columns(&boxes, self.count, self.behind)?;
        Ok(if created.is_empty() {
            CommandOutcome::Unchanged
        } else {
            CommandOutcome::Boxes(created)
        })
    }

    fn display_name(&self) -> &str {
        "Insert Columns"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertRows {
    #[serde(default)]
    pub boxes: Option<BoxSelection>,
    pub count: usize,
    pub behind: bool,
}

impl Command for InsertRows {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        let boxes = selection_or_current(&self.boxes, engine);
        let created = engine.insert_rows(&boxes, self.count, self.behind)?;
        Ok(if created.is_empty() {
            CommandOutcome::Unchanged
        } else {
            CommandOutcome::Lines(created)
        })
    }

    fn display_name(&self) -> &str {
        "Insert Rows"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRowsCols {
    #[serde(default)]
    pub boxes: Option<BoxSelection>,
    pub mode: DeleteMode,
}

impl Command for DeleteRowsCols {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        let boxes = selection_or_current(&self.boxes, engine);
        engine.delete_rows_cols(&boxes, self.mode)?;
        Ok(CommandOutcome::Removed)
    }

    fn display_name(&self) -> &str {
        match self.mode {
            DeleteMode::Rows => "Delete Rows",
            DeleteMode::Columns => "Delete Columns",
        }
    }
}

// =============================================================================
// Cells
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitCells {
    #[serde(default)]
    pub boxes: Option<BoxSelection>,
    pub vertical: bool,
    /// Number of new boxes per selected box
    pub count: usize,
    pub same_height: bool,
}

impl Command for SplitCells {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        let boxes = selection_or_current(&self.boxes, engine);
        let created = engine.split_cells(&boxes, self.vertical, self.count, self.same_height)?;
        Ok(CommandOutcome::Boxes(created))
    }

    fn display_name(&self) -> &str {
        "Split Cells"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeCells {
    #[serde(default)]
    pub boxes: Option<BoxSelection>,
}

impl Command for MergeCells {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        let boxes = selection_or_current(&self.boxes, engine);
        let merged = engine.merge_cells(&boxes)?;
        Ok(CommandOutcome::Boxes(vec![merged]))
    }

    fn display_name(&self) -> &str {
        "Merge Cells"
    }
}

/// Replace the text of one box
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetBoxText {
    pub id: BoxId,
    pub text: String,
}

impl Command for SetBoxText {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        engine.set_box_text(self.id, &self.text)?;
        Ok(CommandOutcome::Boxes(vec![self.id]))
    }

    fn display_name(&self) -> &str {
        "Typing"
    }
}

/// Move the box edges of a line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetColumnWidths {
    pub table: NodeId,
    pub line: LineId,
    pub widths: Vec<Twips>,
}

impl Command for SetColumnWidths {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        engine.set_column_widths(self.table, self.line, &self.widths)?;
        Ok(CommandOutcome::Table(self.table))
    }

    fn display_name(&self) -> &str {
        "Column Widths"
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// Turn the paragraphs `start..=end` into a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextToTable {
    pub start: usize,
    pub end: usize,
    pub separator: Separator,
    #[serde(default)]
    pub options: InsertTableOptions,
}

impl Command for TextToTable {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        let table = engine.text_to_table(self.start, self.end, self.separator, &self.options)?;
        Ok(CommandOutcome::Table(table))
    }

    fn display_name(&self) -> &str {
        "Convert Text to Table"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableToText {
    pub table: NodeId,
    pub separator: char,
}

impl Command for TableToText {
    fn execute(&self, engine: &mut EditingEngine) -> Result<CommandOutcome> {
        let paragraphs = engine.table_to_text(self.table, self.separator)?;
        Ok(CommandOutcome::Paragraphs(paragraphs))
    }

    fn display_name(&self) -> &str {
        "Convert Table to Text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_table_command() {
        let mut engine = EditingEngine::new();
        let outcome = engine.execute(&InsertTable::new(1, 2, 3)).unwrap();
        let CommandOutcome::Table(table) = outcome else {
            panic!("expected a table, got {:?}", outcome);
        };
        assert_eq!(engine.document().leaf_boxes(table).unwrap().len(), 6);
    }

    #[test]
    fn test_box_commands_fall_back_to_engine_selection() {
        let mut engine = EditingEngine::new();
        let table = engine.insert_table(1, 2, 2, &InsertTableOptions::default()).unwrap();
        let first = engine.document().leaf_boxes(table).unwrap()[0];
        engine.set_selection([first].into_iter().collect());

        let command = InsertRows {
            boxes: None,
            count: 1,
            behind: true,
        };
        let outcome = engine.execute(&command).unwrap();
        assert!(matches!(outcome, CommandOutcome::Lines(ref lines) if lines.len() == 1));
        assert_eq!(engine.document().table(table).unwrap().row_count(), 3);

        let none = InsertColumns {
            boxes: Some(BoxSelection::new()),
            count: 1,
            behind: false,
        };
        let err = engine.execute(&none).unwrap_err();
        assert_eq!(err.refusal(), Some(crate::Refusal::NoSelection));
    }

    #[test]
    fn test_command_deserializes() {
        let json = r#"{"start": 1, "end": 2, "separator": "Tab"}"#;
        let command: TextToTable = serde_json::from_str(json).unwrap();
        assert_eq!(command.separator, Separator::Tab);
        assert!(command.options.default_border);
        assert_eq!(command.display_name(), "Convert Text to Table");
    }
}
