//! Layout frames
//!
//! A frame is one node of the layout tree. Frames are stored in an arena
//! owned by [`crate::FrameLayout`] and refer to each other by [`FrameId`].

use crate::{Insets, Rect};
use doc_model::{BoxId, LineId, NodeId, Twips};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a frame in the layout arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub(crate) usize);

impl FrameId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// What a frame lays out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    Root,
    Page,
    Header,
    Footer,
    /// The main text area of a page or column
    Body,
    FootnoteContainer,
    /// Section with text columns
    Section {
        node: NodeId,
        columns: u16,
        balanced: bool,
    },
    Column,
    Table(NodeId),
    Row(LineId),
    Cell { table_box: BoxId, row_span: i32 },
    /// A paragraph; `chars` is its length in graphemes
    Text { node: NodeId, chars: usize },
}

impl FrameKind {
    pub fn is_text(&self) -> bool {
        matches!(self, FrameKind::Text { .. })
    }

    pub fn is_cell(&self) -> bool {
        matches!(self, FrameKind::Cell { .. })
    }

    pub fn is_row(&self) -> bool {
        matches!(self, FrameKind::Row(_))
    }

    /// Header, footer and footnote area: sized by their content but carved
    /// out of the body of the same page
    pub fn is_fixed_region(&self) -> bool {
        matches!(
            self,
            FrameKind::Header | FrameKind::Footer | FrameKind::FootnoteContainer
        )
    }

    /// Frames owning a body plus fixed regions
    pub fn is_footnote_boss(&self) -> bool {
        matches!(self, FrameKind::Page | FrameKind::Column)
    }

    /// Height follows the content
    pub fn is_content_sized(&self) -> bool {
        matches!(
            self,
            FrameKind::Text { .. }
                | FrameKind::Table(_)
                | FrameKind::Row(_)
                | FrameKind::Cell { .. }
                | FrameKind::Section { .. }
        )
    }

    /// Document node the frame represents
    pub fn node(&self) -> Option<NodeId> {
        match self {
            FrameKind::Text { node, .. } | FrameKind::Table(node) | FrameKind::Section { node, .. } => {
                Some(*node)
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FrameKind::Root => "root",
            FrameKind::Page => "page",
            FrameKind::Header => "header",
            FrameKind::Footer => "footer",
            FrameKind::Body => "body",
            FrameKind::FootnoteContainer => "footnote container",
            FrameKind::Section { .. } => "section",
            FrameKind::Column => "column",
            FrameKind::Table(_) => "table",
            FrameKind::Row(_) => "row",
            FrameKind::Cell { .. } => "cell",
            FrameKind::Text { .. } => "text",
        }
    }
}

/// Which cached values of a frame can be trusted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub size: bool,
    pub pos: bool,
    pub print: bool,
}

impl Validity {
    pub fn all() -> Self {
        Self {
            size: true,
            pos: true,
            print: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.size && self.pos && self.print
    }
}

/// A node of the layout tree
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub(crate) upper: Option<FrameId>,
    pub(crate) prev: Option<FrameId>,
    pub(crate) next: Option<FrameId>,
    pub(crate) first_lower: Option<FrameId>,
    pub(crate) last_lower: Option<FrameId>,
    /// Outer rectangle in document coordinates
    pub area: Rect,
    pub insets: Insets,
    pub valid: Validity,
    /// Some lower frame needs formatting
    pub(crate) lowers_dirty: bool,
    /// Minimum height along the variable axis
    pub min_height: Twips,
    /// Height may not differ from `min_height`
    pub exact_height: bool,
    /// Preferred width in document units (table and box widths)
    pub pref_width: Option<Twips>,
}

impl Frame {
    pub fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            upper: None,
            prev: None,
            next: None,
            first_lower: None,
            last_lower: None,
            area: Rect::default(),
            insets: Insets::default(),
            valid: Validity::default(),
            lowers_dirty: true,
            min_height: 0,
            exact_height: false,
            pref_width: None,
        }
    }

    pub fn with_insets(mut self, insets: Insets) -> Self {
        self.insets = insets;
        self
    }

    pub fn with_min_height(mut self, height: Twips, exact: bool) -> Self {
        self.min_height = height;
        self.exact_height = exact;
        self
    }

    pub fn with_pref_width(mut self, width: Twips) -> Self {
        self.pref_width = Some(width);
        self
    }

    pub fn upper(&self) -> Option<FrameId> {
        self.upper
    }

    pub fn prev(&self) -> Option<FrameId> {
        self.prev
    }

    pub fn next(&self) -> Option<FrameId> {
        self.next
    }

    pub fn first_lower(&self) -> Option<FrameId> {
        self.first_lower
    }

    pub fn last_lower(&self) -> Option<FrameId> {
        self.last_lower
    }

    /// Not linked into any tree
    pub fn is_detached(&self) -> bool {
        self.upper.is_none() && self.prev.is_none() && self.next.is_none()
    }

    pub fn print_rect(&self) -> Rect {
        self.insets.print_rect(&self.area)
    }

    /// Insets along the variable axis
    pub(crate) fn flow_insets(&self, vertical: bool) -> Twips {
        if vertical {
            self.insets.left + self.insets.right
        } else {
            self.insets.top + self.insets.bottom
        }
    }
}
