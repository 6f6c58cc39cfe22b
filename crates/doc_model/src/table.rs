//! Table content model - tables, lines (rows) and boxes (cells)
//!
//! A table is an ordered list of lines; a line is an ordered list of boxes.
//! A box either owns a content section in the node array or a list of
//! nested lines, never both. Boxes and lines live in document-wide maps and
//! refer to each other by id:
//!
//! - `TableBox::upper` names the line holding the box
//! - `TableLine::upper` names the box holding a nested line
//!
//! Row spans (new model only): a master box carries `row_span > 1`, every
//! box it covers below carries `row_span == -1`, ordinary boxes carry `1`.

use crate::{BoxFormat, BoxId, LineFormat, LineId, NodeId, TabSortBoxes, TableFormat};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum nesting depth of lines inside boxes
pub const MAX_TABLE_NESTING_DEPTH: usize = 10;

/// Row span of a box covered by a master above it
pub const COVERED_ROW_SPAN: i32 = -1;

// =============================================================================
// Table kind
// =============================================================================

/// Source of an externally linked table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdeLink {
    pub server: String,
    pub topic: String,
    pub item: String,
}

/// Ordinary tables can be edited structurally, linked ones cannot
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableKind {
    #[default]
    Ordinary,
    Linked(DdeLink),
}

// =============================================================================
// Table Box
// =============================================================================

/// What a box holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoxContent {
    /// Start node of the box's content section
    Section(NodeId),
    /// Nested lines
    Lines(Vec<LineId>),
}

/// A table cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableBox {
    id: BoxId,
    /// Line holding this box
    pub upper: LineId,
    pub content: BoxContent,
    pub format: Arc<BoxFormat>,
    pub row_span: i32,
}

impl TableBox {
    pub fn new(id: BoxId, upper: LineId, content: BoxContent, format: Arc<BoxFormat>) -> Self {
        Self {
            id,
            upper,
            content,
            format,
            row_span: 1,
        }
    }

    pub fn id(&self) -> BoxId {
        self.id
    }

    /// Start node of the content section, for leaf boxes
    pub fn start_node(&self) -> Option<NodeId> {
        match &self.content {
            BoxContent::Section(start) => Some(*start),
            BoxContent::Lines(_) => None,
        }
    }

    /// Nested lines (empty for leaf boxes)
    pub fn lines(&self) -> &[LineId] {
        match &self.content {
            BoxContent::Section(_) => &[],
            BoxContent::Lines(lines) => lines,
        }
    }

    pub fn lines_mut(&mut self) -> Option<&mut Vec<LineId>> {
        match &mut self.content {
            BoxContent::Section(_) => None,
            BoxContent::Lines(lines) => Some(lines),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.content, BoxContent::Section(_))
    }

    pub fn width(&self) -> i64 {
        self.format.width
    }

    /// Covered by a master box above
    pub fn is_covered(&self) -> bool {
        self.row_span < 0
    }

    /// Master of a span over several rows
    pub fn is_master(&self) -> bool {
        self.row_span > 1
    }
}

// =============================================================================
// Table Line
// =============================================================================

/// A table row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableLine {
    id: LineId,
    /// Box holding this line, for nested lines
    pub upper: Option<BoxId>,
    pub boxes: Vec<BoxId>,
    pub format: Arc<LineFormat>,
}

impl TableLine {
    pub fn new(id: LineId, upper: Option<BoxId>, format: Arc<LineFormat>) -> Self {
        Self {
            id,
            upper,
            boxes: Vec::new(),
            format,
        }
    }

    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn box_count(&self) -> usize {
        self.boxes.len()
    }

    pub fn position_of(&self, id: BoxId) -> Option<usize> {
        self.boxes.iter().position(|b| *b == id)
    }
}

// =============================================================================
// Table
// =============================================================================

/// A table; owned by its table node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    node: NodeId,
    /// Top-level lines
    pub lines: Vec<LineId>,
    pub format: Arc<TableFormat>,
    /// Heading rows repeated on every page
    pub rows_to_repeat: u16,
    /// Row-span model (arbitrary box counts per line)
    pub new_model: bool,
    pub kind: TableKind,
    pub sort_boxes: TabSortBoxes,
    #[serde(skip)]
    modify_lock: u32,
}

impl Table {
    pub fn new(node: NodeId, format: Arc<TableFormat>, new_model: bool) -> Self {
        Self {
            node,
            lines: Vec::new(),
            format,
            rows_to_repeat: 0,
            new_model,
            kind: TableKind::Ordinary,
            sort_boxes: TabSortBoxes::new(),
            modify_lock: 0,
        }
    }

    /// The table node owning this table
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub(crate) fn set_node(&mut self, node: NodeId) {
        self.node = node;
    }

    pub fn row_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.kind, TableKind::Linked(_))
    }

    pub fn line_index(&self, line: LineId) -> Option<usize> {
        self.lines.iter().position(|l| *l == line)
    }

    /// Suppress format change notifications while a structural edit runs
    pub fn lock_modify(&mut self) {
        self.modify_lock += 1;
    }

    pub fn unlock_modify(&mut self) {
        debug_assert!(self.modify_lock > 0, "unbalanced unlock_modify");
        self.modify_lock = self.modify_lock.saturating_sub(1);
    }

    pub fn is_modify_locked(&self) -> bool {
        self.modify_lock > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_content_is_exclusive() {
        let line = LineId::new();
        let leaf = TableBox::new(
            BoxId::new(),
            line,
            BoxContent::Section(NodeId::new()),
            Arc::new(BoxFormat::with_width(100)),
        );
        assert!(leaf.is_leaf());
        assert!(leaf.lines().is_empty());

        let nested = vec![LineId::new()];
        let branch = TableBox::new(
            BoxId::new(),
            line,
            BoxContent::Lines(nested.clone()),
            Arc::new(BoxFormat::with_width(100)),
        );
        assert!(branch.start_node().is_none());
        assert_eq!(branch.lines(), nested.as_slice());
    }

    #[test]
    fn test_row_span_states() {
        let mut b = TableBox::new(
            BoxId::new(),
            LineId::new(),
            BoxContent::Section(NodeId::new()),
            Arc::new(BoxFormat::default()),
        );
        assert!(!b.is_master() && !b.is_covered());
        b.row_span = 3;
        assert!(b.is_master());
        b.row_span = COVERED_ROW_SPAN;
        assert!(b.is_covered());
    }

    #[test]
    fn test_modify_lock_nests() {
        let mut t = Table::new(NodeId::new(), Arc::new(TableFormat::default()), true);
        t.lock_modify();
        t.lock_modify();
        t.unlock_modify();
        assert!(t.is_modify_locked());
        t.unlock_modify();
        assert!(!t.is_modify_locked());
    }
}
