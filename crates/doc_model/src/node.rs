//! Nodes of the document node array
//!
//! The document body is a flat sequence of nodes. Structure is expressed by
//! bracketing: every section (the body, a table, the content of a table box,
//! a footnote) is a start node followed by its content and a matching end
//! node. Start and end reference each other by id.

use crate::{BoxId, NodeId, StyleId};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// What kind of section a start node opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartKind {
    /// The document body
    Body,
    /// A table; its data lives in `Document::tables` keyed by this node's id
    Table,
    /// The content section of a leaf table box
    Box(BoxId),
    /// A footnote text section
    Footnote,
    /// A section with text columns
    Section { columns: u16, balanced: bool },
}

/// Where a page break sits relative to a paragraph or table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageBreak {
    Before,
    After,
}

/// Paragraph attributes the table engine moves around
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParaAttrs {
    pub page_break: Option<PageBreak>,
    /// Page style that starts at this paragraph
    pub page_desc: Option<String>,
    pub keep_with_next: bool,
}

impl ParaAttrs {
    pub fn is_empty(&self) -> bool {
        self.page_break.is_none() && self.page_desc.is_none() && !self.keep_with_next
    }
}

/// A paragraph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    pub style: StyleId,
    pub attrs: ParaAttrs,
    /// Level in the outline numbering tree; only set through
    /// `Document::set_paragraph_style`
    pub outline_level: Option<u8>,
}

impl TextNode {
    pub fn new(text: impl Into<String>, style: StyleId) -> Self {
        Self {
            text: text.into(),
            style,
            attrs: ParaAttrs::default(),
            outline_level: None,
        }
    }

    /// Length in grapheme clusters
    pub fn len(&self) -> usize {
        self.text.graphemes(true).count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Byte index of a grapheme offset (clamped to the end)
    fn byte_index(&self, offset: usize) -> usize {
        self.text
            .grapheme_indices(true)
            .nth(offset)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    /// Split off everything from `offset` and return it
    pub fn split_off(&mut self, offset: usize) -> String {
        let at = self.byte_index(offset);
        self.text.split_off(at)
    }

    /// Insert text at a grapheme offset
    pub fn insert_text(&mut self, offset: usize, text: &str) {
        let at = self.byte_index(offset);
        self.text.insert_str(at, text);
    }
}

/// The payload of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Start { kind: StartKind, end: NodeId },
    End { start: NodeId },
    Text(TextNode),
}

/// A node of the document node array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self { id, kind }
    }

    pub fn text(text: TextNode) -> Self {
        Self::new(NodeId::new(), NodeKind::Text(text))
    }

    /// Create a start/end pair for a section
    pub fn section(kind: StartKind) -> (Node, Node) {
        let start = NodeId::new();
        let end = NodeId::new();
        (
            Node::new(start, NodeKind::Start { kind, end }),
            Node::new(end, NodeKind::End { start }),
        )
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match &self.kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextNode> {
        match &mut self.kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }

    pub fn start_kind(&self) -> Option<&StartKind> {
        match &self.kind {
            NodeKind::Start { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn is_table_start(&self) -> bool {
        matches!(self.start_kind(), Some(StartKind::Table))
    }

    /// Box owning this start node, if it opens a box section
    pub fn box_id(&self) -> Option<BoxId> {
        match self.start_kind() {
            Some(StartKind::Box(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, NodeKind::End { .. })
    }
}
