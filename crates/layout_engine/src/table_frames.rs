//! Binding between the content model and the frame tree
//!
//! Every paragraph, table and column section of the document body gets a
//! frame. Tables are mirrored by a table frame holding one row frame per
//! line and one cell frame per box. Structural table edits throw the frames
//! of the table away and build them again.

use crate::{FlowRelationEvent, Frame, FrameId, FrameKind, FrameLayout, LayoutConfig, LayoutError, Result};
use doc_model::{BoxContent, BoxId, DocModelError, Document, HeightRule, LineId, NodeId, NodeKind, StartKind};

/// A node that gets its own frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowItem {
    Text(NodeId),
    Table(NodeId),
    Section(NodeId),
}

/// Direct content of the node range `start..end`, skipping footnotes
fn flow_items(doc: &Document, start: usize, end: usize) -> Result<Vec<FlowItem>> {
    let mut items = Vec::new();
    let mut index = start;
    while index < end {
        let node = doc.nodes.node_at(index).ok_or(DocModelError::InvalidIndex(index))?;
        let id = node.id();
        match &node.kind {
            NodeKind::Text(_) => {
                items.push(FlowItem::Text(id));
                index += 1;
            }
            NodeKind::Start { kind, .. } => {
                match kind {
                    StartKind::Table => items.push(FlowItem::Table(id)),
                    StartKind::Section { .. } => items.push(FlowItem::Section(id)),
                    _ => {}
                }
                let (_, section_end) = doc.nodes.section_indices(id)?;
                index = section_end + 1;
            }
            NodeKind::End { .. } => index += 1,
        }
    }
    Ok(items)
}

impl FrameLayout {
    /// Lay out a whole document
    pub fn build(doc: &Document, config: LayoutConfig) -> Result<Self> {
        let mut layout = Self::new(config);
        let body = layout.main_body()?;
        let (start, end) = doc.nodes.section_indices(doc.body())?;
        for frame in layout.make_content_frames(doc, start + 1, end)? {
            layout.insert_before(frame, body, None)?;
        }
        layout.format()?;
        tracing::debug!("layout built: {} frames", layout.len());
        Ok(layout)
    }

    /// Detached frames for the content of `start..end`
    fn make_content_frames(&mut self, doc: &Document, start: usize, end: usize) -> Result<Vec<FrameId>> {
        let mut frames = Vec::new();
        for item in flow_items(doc, start, end)? {
            let frame = match item {
                FlowItem::Text(node) => self.make_text_frame(doc, node)?,
                FlowItem::Table(node) => self.make_table_frames(doc, node)?,
                FlowItem::Section(node) => self.make_section_frames(doc, node)?,
            };
            frames.push(frame);
        }
        Ok(frames)
    }

    fn make_text_frame(&mut self, doc: &Document, node: NodeId) -> Result<FrameId> {
        let chars = doc.nodes.text(node).map(|t| t.len()).unwrap_or(0);
        let frame = self.alloc(Frame::new(FrameKind::Text { node, chars }));
        self.node_frames.insert(node, frame);
        Ok(frame)
    }

    fn make_section_frames(&mut self, doc: &Document, node: NodeId) -> Result<FrameId> {
        let (columns, balanced) = match doc.nodes.get(node).and_then(|n| n.start_kind()) {
            Some(StartKind::Section { columns, balanced }) => (*columns, *balanced),
            _ => (1, false),
        };
        let section = self.alloc(Frame::new(FrameKind::Section { node, columns, balanced }));
        self.node_frames.insert(node, section);
        let (start, end) = doc.nodes.section_indices(node)?;
        let content = self.make_content_frames(doc, start + 1, end)?;
        if columns <= 1 {
            for frame in content {
                self.insert_before(frame, section, None)?;
            }
            return Ok(section);
        }
        let mut first_body = None;
        for _ in 0..columns {
            let column = self.alloc(Frame::new(FrameKind::Column));
            let body = self.alloc(Frame::new(FrameKind::Body));
            self.insert_before(body, column, None)?;
            self.insert_before(column, section, None)?;
            first_body.get_or_insert(body);
        }
        if let Some(body) = first_body {
            for frame in content {
                self.insert_before(frame, body, None)?;
            }
        }
        Ok(section)
    }

    /// Detached table frame with rows, cells and cell content
    fn make_table_frames(&mut self, doc: &Document, node: NodeId) -> Result<FrameId> {
        let table = doc.table(node)?;
        let frame = self.alloc(Frame::new(FrameKind::Table(node)).with_pref_width(table.format.width));
        self.node_frames.insert(node, frame);
        for line in table.lines.clone() {
            let row = self.make_row_frames(doc, line)?;
            self.insert_before(row, frame, None)?;
        }
        Ok(frame)
    }

    fn make_row_frames(&mut self, doc: &Document, id: LineId) -> Result<FrameId> {
        let line = doc.line(id)?;
        let (min, exact) = match line.format.height_rule {
            HeightRule::Auto => (0, false),
            HeightRule::AtLeast => (line.format.height, false),
            HeightRule::Exact => (line.format.height, true),
        };
        let row = self.alloc(Frame::new(FrameKind::Row(id)).with_min_height(min, exact));
        for b in line.boxes.clone() {
            let cell = self.make_cell_frames(doc, b)?;
            self.insert_before(cell, row, None)?;
        }
        Ok(row)
    }

    fn make_cell_frames(&mut self, doc: &Document, id: BoxId) -> Result<FrameId> {
        let b = doc.table_box(id)?;
        let cell = self.alloc(
            Frame::new(FrameKind::Cell {
                table_box: id,
                row_span: b.row_span,
            })
            .with_pref_width(b.width()),
        );
        match b.content.clone() {
            BoxContent::Section(start) => {
                let (s, e) = doc.nodes.section_indices(start)?;
                for frame in self.make_content_frames(doc, s + 1, e)? {
                    self.insert_before(frame, cell, None)?;
                }
            }
            BoxContent::Lines(lines) => {
                for line in lines {
                    let row = self.make_row_frames(doc, line)?;
                    self.insert_before(row, cell, None)?;
                }
            }
        }
        Ok(cell)
    }

    // =========================================================================
    // Keeping Frames In Sync
    // =========================================================================

    /// Frame to put new content into and the frame to put it before, for
    /// content that is to appear right before node index `at`
    fn anchor_at(&self, doc: &Document, at: usize) -> Result<(FrameId, Option<FrameId>)> {
        let container = doc
            .nodes
            .enclosing_start(at, |k| !matches!(k, StartKind::Table))
            .ok_or_else(|| LayoutError::LayoutFailed(format!("node index {} is outside the body", at)))?;
        let (_, container_end) = doc.nodes.section_indices(container)?;
        for item in flow_items(doc, at, container_end)? {
            let node = match item {
                FlowItem::Text(n) | FlowItem::Table(n) | FlowItem::Section(n) => n,
            };
            if let Some(frame) = self.frame_of(node) {
                if let Some(upper) = self.upper(frame)? {
                    return Ok((upper, Some(frame)));
                }
            }
        }
        let parent = match doc.nodes.get(container).and_then(|n| n.start_kind()) {
            Some(StartKind::Body) => self.main_body()?,
            Some(StartKind::Box(b)) => self.cell_frame_of(*b)?,
            Some(StartKind::Section { columns, .. }) => {
                let section = self
                    .frame_of(container)
                    .ok_or_else(|| LayoutError::LayoutFailed(format!("section {} has no frame", container)))?;
                if *columns > 1 {
                    let last = self
                        .get(section)?
                        .last_lower()
                        .ok_or_else(|| LayoutError::BrokenTree(format!("{} has no columns", section)))?;
                    self.body_of(last)?
                } else {
                    section
                }
            }
            _ => return Err(LayoutError::LayoutFailed(format!("no frame for content of {}", container))),
        };
        Ok((parent, None))
    }

    /// Cell frame showing a box
    pub fn cell_frame_of(&self, id: BoxId) -> Result<FrameId> {
        for frame in self.subtree(self.root())? {
            if let FrameKind::Cell { table_box, .. } = self.kind(frame)? {
                if *table_box == id {
                    return Ok(frame);
                }
            }
        }
        Err(LayoutError::LayoutFailed(format!("box {} has no cell frame", id)))
    }

    /// Create and link frames for the content of `start..end`; existing
    /// frames of that range must have been removed
    pub fn insert_frames_for_range(&mut self, doc: &Document, start: usize, end: usize) -> Result<Vec<FrameId>> {
        let (parent, before) = self.anchor_at(doc, end)?;
        let frames = self.make_content_frames(doc, start, end)?;
        for frame in &frames {
            self.insert_before(*frame, parent, before)?;
        }
        for frame in &frames {
            if matches!(self.kind(*frame)?, FrameKind::Table(_)) {
                let event = self.flow_neighbours(*frame)?;
                self.notify_flow(event);
            }
        }
        Ok(frames)
    }

    /// Build and link the frames of a table that has none yet
    pub fn insert_table_frames(&mut self, doc: &Document, table: NodeId) -> Result<FrameId> {
        let (_, end) = doc.table_range(table)?;
        let (parent, before) = self.anchor_at(doc, end + 1)?;
        let frame = self.make_table_frames(doc, table)?;
        self.insert_before(frame, parent, before)?;
        let event = self.flow_neighbours(frame)?;
        self.notify_flow(event);
        tracing::debug!("table frames inserted for {}", table);
        Ok(frame)
    }

    /// Remove the frames of a table; false if it had none
    pub fn del_table_frames(&mut self, table: NodeId) -> Result<bool> {
        let Some(frame) = self.frame_of(table) else {
            return Ok(false);
        };
        let event = self.flow_neighbours(frame)?;
        self.delete_frame(frame)?;
        self.notify_flow(event);
        tracing::debug!("table frames deleted for {}", table);
        Ok(true)
    }

    /// Throw away the frames of a table and build them again in place
    pub fn rebuild_table_frames(&mut self, doc: &Document, table: NodeId) -> Result<FrameId> {
        let Some(old) = self.frame_of(table) else {
            return self.insert_table_frames(doc, table);
        };
        let (parent, before) = {
            let frame = self.get(old)?;
            (frame.upper(), frame.next())
        };
        let Some(parent) = parent else {
            self.delete_frame(old)?;
            return self.insert_table_frames(doc, table);
        };
        self.delete_frame(old)?;
        let frame = self.make_table_frames(doc, table)?;
        self.insert_before(frame, parent, before)?;
        Ok(frame)
    }

    /// Drop the frames showing any of `nodes`
    pub fn remove_node_frames(&mut self, nodes: impl IntoIterator<Item = NodeId>) -> Result<()> {
        for node in nodes {
            let Some(frame) = self.frame_of(node) else {
                continue;
            };
            if !self.contains(frame) {
                continue;
            }
            if matches!(self.kind(frame)?, FrameKind::Table(_)) {
                self.del_table_frames(node)?;
            } else {
                self.delete_frame(frame)?;
            }
        }
        Ok(())
    }

    /// Pick up a changed paragraph length
    pub fn update_text_frame(&mut self, doc: &Document, node: NodeId) -> Result<()> {
        let Some(frame) = self.frame_of(node) else {
            return Ok(());
        };
        let len = doc.nodes.text(node).map(|t| t.len()).unwrap_or(0);
        if let FrameKind::Text { chars, .. } = &mut self.get_mut(frame)?.kind {
            *chars = len;
        }
        self.invalidate_size(frame)
    }

    /// Text frames before and after `frame` in flow order
    pub fn flow_neighbours(&self, frame: FrameId) -> Result<FlowRelationEvent> {
        let order = self.subtree(self.root())?;
        let Some(pos) = order.iter().position(|f| *f == frame) else {
            return Ok(FlowRelationEvent { prev: None, next: None });
        };
        let inside = self.subtree(frame)?.len();
        let mut prev = None;
        for f in order[..pos].iter().rev() {
            if self.kind(*f)?.is_text() {
                prev = Some(*f);
                break;
            }
        }
        let mut next = None;
        for f in &order[pos + inside..] {
            if self.kind(*f)?.is_text() {
                next = Some(*f);
                break;
            }
        }
        Ok(FlowRelationEvent { prev, next })
    }

    // =========================================================================
    // Checks
    // =========================================================================

    /// Verify that the frames of a table mirror its lines and boxes
    pub fn check_table_frames(&self, doc: &Document, table: NodeId) -> Result<()> {
        let frame = self
            .frame_of(table)
            .ok_or_else(|| LayoutError::BrokenTree(format!("table {} has no frame", table)))?;
        if *self.kind(frame)? != FrameKind::Table(table) {
            return Err(LayoutError::BrokenTree(format!("{} does not show table {}", frame, table)));
        }
        let lines = doc.table(table)?.lines.clone();
        self.check_rows(doc, frame, &lines)
    }

    fn check_rows(&self, doc: &Document, parent: FrameId, lines: &[LineId]) -> Result<()> {
        let broken = |msg: String| Err(LayoutError::BrokenTree(msg));
        let rows = self.lowers(parent)?;
        if rows.len() != lines.len() {
            return broken(format!("{} has {} rows for {} lines", parent, rows.len(), lines.len()));
        }
        for (row, line) in rows.iter().zip(lines) {
            if *self.kind(*row)? != FrameKind::Row(*line) {
                return broken(format!("{} does not show line {}", row, line));
            }
            let boxes = &doc.line(*line)?.boxes;
            let cells = self.lowers(*row)?;
            if cells.len() != boxes.len() {
                return broken(format!("{} has {} cells for {} boxes", row, cells.len(), boxes.len()));
            }
            for (cell, b) in cells.iter().zip(boxes) {
                let table_box = doc.table_box(*b)?;
                let expected = FrameKind::Cell {
                    table_box: *b,
                    row_span: table_box.row_span,
                };
                if *self.kind(*cell)? != expected {
                    return broken(format!("{} does not show box {}", cell, b));
                }
                match &table_box.content {
                    BoxContent::Lines(nested) => self.check_rows(doc, *cell, nested)?,
                    BoxContent::Section(start) => {
                        let (s, e) = doc.nodes.section_indices(*start)?;
                        let items = flow_items(doc, s + 1, e)?;
                        let lowers = self.lowers(*cell)?;
                        if items.len() != lowers.len() {
                            return broken(format!("{} has {} frames for {} paragraphs", cell, lowers.len(), items.len()));
                        }
                        for (item, lower) in items.iter().zip(&lowers) {
                            let node = match item {
                                FlowItem::Text(n) | FlowItem::Table(n) | FlowItem::Section(n) => *n,
                            };
                            if self.kind(*lower)?.node() != Some(node) {
                                return broken(format!("{} is out of order in {}", lower, cell));
                            }
                            if let FlowItem::Table(nested) = item {
                                self.check_table_frames(doc, *nested)?;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
