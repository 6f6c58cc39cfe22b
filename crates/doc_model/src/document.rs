//! Document - the node array together with the table content model

use crate::{
    claim, BoxFormat, BoxId, DocModelError, DocumentSettings, LineFormat, LineId, Node, NodeArray,
    NodeId, NodeKind, Result, StartKind, StyleId, StylePool, Table, TableBox, TableFormat,
    TableLine, TextNode, Twips, COVERED_ROW_SPAN, MAX_TABLE_NESTING_DEPTH,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A format change the layout side has to pick up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeNotice {
    TableFormat(NodeId),
    LineFormat(LineId),
    BoxFormat(BoxId),
}

/// The document
#[derive(Debug, Clone)]
pub struct Document {
    pub nodes: NodeArray,
    /// Tables keyed by their table node
    pub tables: HashMap<NodeId, Table>,
    pub lines: HashMap<LineId, TableLine>,
    pub boxes: HashMap<BoxId, TableBox>,
    pub styles: StylePool,
    pub settings: DocumentSettings,
    body: NodeId,
    notices: Vec<ChangeNotice>,
}

impl Document {
    /// Create an empty document: a body holding one empty paragraph
    pub fn new() -> Self {
        Self::with_settings(DocumentSettings::default())
    }

    pub fn with_settings(settings: DocumentSettings) -> Self {
        let styles = StylePool::new();
        let (start, end) = Node::section(StartKind::Body);
        let body = start.id();
        let para = Node::text(TextNode::new("", styles.default_style().clone()));
        let mut nodes = NodeArray::new();
        // Inserting at 0 into an empty array cannot fail
        let _ = nodes.insert_many(0, vec![start, para, end]);
        Self {
            nodes,
            tables: HashMap::new(),
            lines: HashMap::new(),
            boxes: HashMap::new(),
            styles,
            settings,
            body,
            notices: Vec::new(),
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Index of the body's end node
    pub fn body_end_index(&self) -> Result<usize> {
        self.nodes.section_indices(self.body).map(|(_, end)| end)
    }

    // =========================================================================
    // Paragraphs
    // =========================================================================

    /// Append a paragraph with the default style at the end of the body
    pub fn append_paragraph(&mut self, text: &str) -> Result<NodeId> {
        let at = self.body_end_index()?;
        let style = self.styles.default_style().clone();
        self.insert_paragraph(at, text, &style)
    }

    /// Insert a paragraph before `index`.
    ///
    /// A style assigned to an outline level is applied after the paragraph
    /// exists, so the outline level is set through `set_paragraph_style`.
    pub fn insert_paragraph(&mut self, index: usize, text: &str, style: &StyleId) -> Result<NodeId> {
        if self.styles.is_assigned_to_outline(style) {
            let default = self.styles.default_style().clone();
            let id = self.nodes.insert(index, Node::text(TextNode::new(text, default)))?;
            self.set_paragraph_style(id, style)?;
            Ok(id)
        } else {
            self.nodes.insert(index, Node::text(TextNode::new(text, style.clone())))
        }
    }

    /// Assign a paragraph style, keeping the outline level in step with it
    pub fn set_paragraph_style(&mut self, node: NodeId, style: &StyleId) -> Result<()> {
        let level = self.styles.outline_level(style);
        let para = self.nodes.text_mut(node).ok_or(DocModelError::NodeNotFound(node))?;
        para.style = style.clone();
        para.outline_level = level;
        Ok(())
    }

    pub fn paragraph_text(&self, node: NodeId) -> Option<&str> {
        self.nodes.text(node).map(|t| t.text.as_str())
    }

    /// Texts of all paragraphs of the body, tables included
    pub fn paragraph_texts(&self) -> Vec<String> {
        self.nodes
            .ids()
            .iter()
            .filter_map(|id| self.nodes.text(*id))
            .map(|t| t.text.clone())
            .collect()
    }

    // =========================================================================
    // Table accessors
    // =========================================================================

    pub fn table(&self, node: NodeId) -> Result<&Table> {
        self.tables.get(&node).ok_or(DocModelError::TableNotFound(node))
    }

    pub fn table_mut(&mut self, node: NodeId) -> Result<&mut Table> {
        self.tables.get_mut(&node).ok_or(DocModelError::TableNotFound(node))
    }

    pub fn line(&self, id: LineId) -> Result<&TableLine> {
        self.lines.get(&id).ok_or(DocModelError::LineNotFound(id))
    }

    pub fn line_mut(&mut self, id: LineId) -> Result<&mut TableLine> {
        self.lines.get_mut(&id).ok_or(DocModelError::LineNotFound(id))
    }

    pub fn table_box(&self, id: BoxId) -> Result<&TableBox> {
        self.boxes.get(&id).ok_or(DocModelError::BoxNotFound(id))
    }

    pub fn box_mut(&mut self, id: BoxId) -> Result<&mut TableBox> {
        self.boxes.get_mut(&id).ok_or(DocModelError::BoxNotFound(id))
    }

    /// Tables in document order
    pub fn table_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .ids()
            .iter()
            .copied()
            .filter(|id| self.tables.contains_key(id))
            .collect()
    }

    /// Table node at or enclosing the node at `index`
    pub fn table_node_at(&self, index: usize) -> Option<NodeId> {
        match self.nodes.node_at(index) {
            Some(node) if node.is_table_start() => Some(node.id()),
            _ => self.nodes.find_table_node(index),
        }
    }

    /// Start and end index of a table's node range
    pub fn table_range(&self, table: NodeId) -> Result<(usize, usize)> {
        self.nodes.section_indices(table)
    }

    /// Leaf box whose content section holds the node at `index`
    pub fn box_at_index(&self, index: usize) -> Option<BoxId> {
        let start = match self.nodes.node_at(index) {
            Some(node) if node.box_id().is_some() => node.id(),
            _ => self.nodes.enclosing_start(index, |k| matches!(k, StartKind::Box(_)))?,
        };
        self.nodes.get(start).and_then(Node::box_id)
    }

    /// First leaf box below (or equal to) `id`
    pub fn first_leaf(&self, id: BoxId) -> Result<BoxId> {
        let mut current = id;
        for _ in 0..=MAX_TABLE_NESTING_DEPTH {
            let table_box = self.table_box(current)?;
            let Some(line) = table_box.lines().first() else {
                return Ok(current);
            };
            current = *self
                .line(*line)?
                .boxes
                .first()
                .ok_or_else(|| DocModelError::TreeStructureError(format!("empty line {}", line)))?;
        }
        Err(DocModelError::TreeStructureError(format!("nesting too deep below {}", id)))
    }

    /// Last leaf box below (or equal to) `id`
    pub fn last_leaf(&self, id: BoxId) -> Result<BoxId> {
        let mut current = id;
        for _ in 0..=MAX_TABLE_NESTING_DEPTH {
            let table_box = self.table_box(current)?;
            let Some(line) = table_box.lines().last() else {
                return Ok(current);
            };
            current = *self
                .line(*line)?
                .boxes
                .last()
                .ok_or_else(|| DocModelError::TreeStructureError(format!("empty line {}", line)))?;
        }
        Err(DocModelError::TreeStructureError(format!("nesting too deep below {}", id)))
    }

    /// Table node owning a box
    pub fn table_of_box(&self, id: BoxId) -> Result<NodeId> {
        let leaf = self.first_leaf(id)?;
        let start = self
            .table_box(leaf)?
            .start_node()
            .ok_or(DocModelError::BoxNotFound(leaf))?;
        let index = self.nodes.try_index_of(start)?;
        self.nodes
            .find_table_node(index)
            .ok_or_else(|| DocModelError::TreeStructureError(format!("box {} outside any table", id)))
    }

    /// Top-level line a box belongs to
    pub fn top_line_of(&self, id: BoxId) -> Result<LineId> {
        let mut current = id;
        for _ in 0..=MAX_TABLE_NESTING_DEPTH {
            let line = self.table_box(current)?.upper;
            match self.line(line)?.upper {
                Some(upper) => current = upper,
                None => return Ok(line),
            }
        }
        Err(DocModelError::TreeStructureError(format!("nesting too deep above {}", id)))
    }

    /// Number of boxes above `id` (0 for a box of a top-level line)
    pub fn nesting_depth(&self, id: BoxId) -> Result<usize> {
        let mut depth = 0;
        let mut line = self.table_box(id)?.upper;
        while let Some(upper) = self.line(line)?.upper {
            depth += 1;
            if depth > MAX_TABLE_NESTING_DEPTH {
                return Err(DocModelError::TreeStructureError(format!("nesting too deep above {}", id)));
            }
            line = self.table_box(upper)?.upper;
        }
        Ok(depth)
    }

    /// All leaf boxes of a table in document order
    pub fn leaf_boxes(&self, table: NodeId) -> Result<Vec<BoxId>> {
        Ok(self.leaf_boxes_of(&self.table(table)?.lines))
    }

    /// Paragraphs of a leaf box
    pub fn box_paragraphs(&self, id: BoxId) -> Result<Vec<NodeId>> {
        let Some(start) = self.table_box(id)?.start_node() else {
            return Ok(Vec::new());
        };
        let (s, e) = self.nodes.section_indices(start)?;
        Ok(self.nodes.text_ids_in(s + 1, e))
    }

    /// First paragraph of a leaf box
    pub fn first_box_paragraph(&self, id: BoxId) -> Result<NodeId> {
        self.box_paragraphs(id)?
            .first()
            .copied()
            .ok_or_else(|| DocModelError::InvalidOperation(format!("box {} has no paragraph", id)))
    }

    /// Text of a leaf box, paragraphs joined with newlines
    pub fn box_text(&self, id: BoxId) -> Result<String> {
        let texts: Vec<&str> = self
            .box_paragraphs(id)?
            .into_iter()
            .filter_map(|p| self.paragraph_text(p))
            .collect();
        Ok(texts.join("\n"))
    }

    /// Index of the first node of a box's content (its first leaf's start)
    pub fn box_start_index(&self, id: BoxId) -> Result<usize> {
        let leaf = self.first_leaf(id)?;
        let start = self.table_box(leaf)?.start_node().ok_or(DocModelError::BoxNotFound(leaf))?;
        self.nodes.try_index_of(start)
    }

    /// Index of the last node of a box's content (its last leaf's end)
    pub fn box_end_index(&self, id: BoxId) -> Result<usize> {
        let leaf = self.last_leaf(id)?;
        let start = self.table_box(leaf)?.start_node().ok_or(DocModelError::BoxNotFound(leaf))?;
        self.nodes.section_indices(start).map(|(_, end)| end)
    }

    // =========================================================================
    // Geometry in table units
    // =========================================================================

    /// Left edge of a box relative to the table's left edge
    pub fn box_left(&self, id: BoxId) -> Result<Twips> {
        let mut left = 0;
        let mut current = id;
        for _ in 0..=MAX_TABLE_NESTING_DEPTH {
            let line = self.line(self.table_box(current)?.upper)?;
            for sibling in &line.boxes {
                if *sibling == current {
                    break;
                }
                left += self.table_box(*sibling)?.width();
            }
            match line.upper {
                Some(upper) => current = upper,
                None => return Ok(left),
            }
        }
        Err(DocModelError::TreeStructureError(format!("nesting too deep above {}", id)))
    }

    /// Box edges of a line: left edge of each box plus the right edge of the last
    pub fn line_positions(&self, id: LineId) -> Result<Vec<Twips>> {
        let line = self.line(id)?;
        let mut pos = match line.upper {
            Some(upper) => self.box_left(upper)?,
            None => 0,
        };
        let mut out = Vec::with_capacity(line.boxes.len() + 1);
        out.push(pos);
        for b in &line.boxes {
            pos += self.table_box(*b)?.width();
            out.push(pos);
        }
        Ok(out)
    }

    pub fn line_width(&self, id: LineId) -> Result<Twips> {
        self.line(id)?
            .boxes
            .iter()
            .map(|b| self.table_box(*b).map(TableBox::width))
            .sum()
    }

    // =========================================================================
    // Format mutation and change notices
    // =========================================================================

    fn notify(&mut self, table: Option<NodeId>, notice: ChangeNotice) {
        let locked = table
            .and_then(|t| self.tables.get(&t))
            .is_some_and(Table::is_modify_locked);
        if !locked && !self.notices.contains(&notice) {
            self.notices.push(notice);
        }
    }

    /// Private, mutable table format
    pub fn table_format_mut(&mut self, table: NodeId) -> Result<&mut TableFormat> {
        self.table(table)?;
        self.notify(Some(table), ChangeNotice::TableFormat(table));
        let table = self.table_mut(table)?;
        Ok(claim(&mut table.format))
    }

    pub fn set_table_format(&mut self, table: NodeId, format: TableFormat) -> Result<()> {
        *self.table_format_mut(table)? = format;
        Ok(())
    }

    /// Private, mutable box format; claims a copy if the format is shared
    pub fn box_format_mut(&mut self, id: BoxId) -> Result<&mut BoxFormat> {
        let table = self.table_of_box(id).ok();
        self.notify(table, ChangeNotice::BoxFormat(id));
        Ok(claim(&mut self.box_mut(id)?.format))
    }

    /// Private, mutable line format; claims a copy if the format is shared
    pub fn line_format_mut(&mut self, id: LineId) -> Result<&mut LineFormat> {
        let table = match self.line(id)?.boxes.first() {
            Some(b) => self.table_of_box(*b).ok(),
            None => None,
        };
        self.notify(table, ChangeNotice::LineFormat(id));
        Ok(claim(&mut self.line_mut(id)?.format))
    }

    /// Rebind a box to a (possibly shared) format
    pub fn set_box_format(&mut self, id: BoxId, format: Arc<BoxFormat>) -> Result<()> {
        let table = self.table_of_box(id).ok();
        self.box_mut(id)?.format = format;
        self.notify(table, ChangeNotice::BoxFormat(id));
        Ok(())
    }

    pub fn notices(&self) -> &[ChangeNotice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<ChangeNotice> {
        std::mem::take(&mut self.notices)
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    /// Every top-level line holds the same number of boxes
    pub fn is_balanced(&self, table: NodeId) -> Result<bool> {
        let table = self.table(table)?;
        let mut counts = table.lines.iter().map(|l| self.line(*l).map(TableLine::box_count));
        let Some(first) = counts.next().transpose()? else {
            return Ok(true);
        };
        for count in counts {
            if count? != first {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Verify the structural invariants of a table
    pub fn check_table(&self, node: NodeId) -> Result<()> {
        let broken = |msg: String| Err(DocModelError::TreeStructureError(msg));
        let table = self.table(node)?;
        let Some(n) = self.nodes.get(node) else {
            return Err(DocModelError::NodeNotFound(node));
        };
        if !n.is_table_start() {
            return broken(format!("{} is not a table node", node));
        }
        let (table_start, table_end) = self.table_range(node)?;

        let subtree = self.subtree_of(&table.lines);
        if subtree.max_depth > MAX_TABLE_NESTING_DEPTH {
            return broken(format!("table {} nested {} deep", node, subtree.max_depth));
        }
        for line_id in &table.lines {
            if self.line(*line_id)?.upper.is_some() {
                return broken(format!("top-level line {} has an upper box", line_id));
            }
        }
        for line_id in &subtree.lines {
            let line = self.line(*line_id)?;
            for b in &line.boxes {
                if self.table_box(*b)?.upper != *line_id {
                    return broken(format!("box {} does not point back to line {}", b, line_id));
                }
            }
        }

        let mut leaves = Vec::new();
        for box_id in &subtree.boxes {
            let table_box = self.table_box(*box_id)?;
            for l in table_box.lines() {
                if self.line(*l)?.upper != Some(*box_id) {
                    return broken(format!("line {} does not point back to box {}", l, box_id));
                }
            }
            if let Some(start) = table_box.start_node() {
                let Some(NodeKind::Start { kind: StartKind::Box(owner), .. }) =
                    self.nodes.get(start).map(|n| &n.kind)
                else {
                    return broken(format!("box {} has no box section", box_id));
                };
                if owner != box_id {
                    return broken(format!("section of box {} belongs to {}", box_id, owner));
                }
                let index = self.nodes.try_index_of(start)?;
                if index <= table_start || index >= table_end {
                    return broken(format!("box {} lies outside table {}", box_id, node));
                }
                leaves.push(*box_id);
            } else if table_box.lines().is_empty() {
                return broken(format!("box {} has neither content nor lines", box_id));
            }
        }

        let indexed: Vec<BoxId> = table.sort_boxes.ids().collect();
        if indexed != leaves {
            return broken(format!(
                "sorted index of {} holds {} boxes, tree walk finds {}",
                node,
                indexed.len(),
                leaves.len()
            ));
        }

        if table.new_model {
            self.check_row_spans(table)
        } else if subtree.boxes.iter().any(|b| self.boxes[b].row_span != 1) {
            broken(format!("legacy table {} carries row spans", node))
        } else {
            Ok(())
        }
    }

    /// Every master's span is matched by covered boxes below it at the same
    /// left edge, and every covered box has a master.
    fn check_row_spans(&self, table: &Table) -> Result<()> {
        let mut pending: HashMap<Twips, i32> = HashMap::new();
        for (row, line_id) in table.lines.iter().enumerate() {
            let positions = self.line_positions(*line_id)?;
            let line = self.line(*line_id)?;
            let mut expected: HashSet<Twips> =
                pending.iter().filter(|(_, n)| **n > 0).map(|(x, _)| *x).collect();
            for (i, b) in line.boxes.iter().enumerate() {
                let x = positions[i];
                let span = self.table_box(*b)?.row_span;
                if expected.remove(&x) {
                    if span != COVERED_ROW_SPAN {
                        return Err(DocModelError::TreeStructureError(format!(
                            "row {}: box {} should be covered, span {}",
                            row, b, span
                        )));
                    }
                    if let Some(n) = pending.get_mut(&x) {
                        *n -= 1;
                    }
                } else if span < 1 {
                    return Err(DocModelError::TreeStructureError(format!(
                        "row {}: covered box {} has no master",
                        row, b
                    )));
                } else if span > 1 {
                    pending.insert(x, span - 1);
                }
            }
            if let Some(x) = expected.into_iter().next() {
                return Err(DocModelError::TreeStructureError(format!(
                    "row {}: no covered box at {}",
                    row, x
                )));
            }
        }
        if pending.values().any(|n| *n > 0) {
            return Err(DocModelError::TreeStructureError(
                "row span runs past the last row".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PoolStyle, StartKind};

    #[test]
    fn test_new_document_has_one_paragraph() {
        let doc = Document::new();
        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.paragraph_texts(), vec![String::new()]);
        assert_eq!(doc.body_end_index().unwrap(), 2);
    }

    #[test]
    fn test_outline_style_sets_level() {
        let mut doc = Document::new();
        let heading = doc.styles.get_or_create(PoolStyle::Heading(1));
        let para = doc.insert_paragraph(1, "Title", &heading).unwrap();
        let text = doc.nodes.text(para).unwrap();
        assert_eq!(text.style, heading);
        assert_eq!(text.outline_level, Some(1));
    }

    #[test]
    fn test_locked_table_suppresses_notices() {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let table = doc.create_table(1, 2, &[1000, 1000], &style, true).unwrap();
        doc.take_notices();

        doc.table_mut(table).unwrap().lock_modify();
        doc.table_format_mut(table).unwrap().shadow = true;
        assert!(doc.notices().is_empty());
        doc.table_mut(table).unwrap().unlock_modify();

        doc.table_format_mut(table).unwrap().shadow = false;
        assert_eq!(doc.notices(), &[ChangeNotice::TableFormat(table)]);
    }

    #[test]
    fn test_box_format_claim_leaves_siblings() {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let table = doc.create_table(1, 1, &[500, 500], &style, false).unwrap();
        let leaves = doc.leaf_boxes(table).unwrap();
        doc.box_format_mut(leaves[0]).unwrap().width = 300;
        assert_eq!(doc.table_box(leaves[0]).unwrap().width(), 300);
        assert_eq!(doc.table_box(leaves[1]).unwrap().width(), 500);
    }

    #[test]
    fn test_check_table_catches_stale_index() {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let table = doc.create_table(1, 2, &[400, 400], &style, false).unwrap();
        doc.check_table(table).unwrap();
        let first = doc.leaf_boxes(table).unwrap()[0];
        doc.table_mut(table).unwrap().sort_boxes.remove(first);
        assert!(doc.check_table(table).is_err());
    }

    #[test]
    fn test_box_geometry() {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let table = doc.create_table(1, 1, &[100, 200, 300], &style, false).unwrap();
        let line = doc.table(table).unwrap().lines[0];
        assert_eq!(doc.line_positions(line).unwrap(), vec![0, 100, 300, 600]);
        let third = doc.line(line).unwrap().boxes[2];
        assert_eq!(doc.box_left(third).unwrap(), 300);
        let start = doc.box_start_index(third).unwrap();
        assert_eq!(doc.box_at_index(start + 1), Some(third));
        assert!(matches!(
            doc.nodes.node_at(start).and_then(|n| n.start_kind()),
            Some(StartKind::Box(_))
        ));
    }
}
