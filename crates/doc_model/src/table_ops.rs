//! Structural primitives on the table content model
//!
//! These keep the node array, the line/box maps and the sorted box index in
//! step. Undo, redlining and layout are the caller's business.

use crate::visit::{walk_lines, TableVisitor};
use crate::{
    BoxContent, BoxFormat, BoxId, DocModelError, Document, LineFormat, LineId, Node, NodeId,
    Result, StartKind, StyleId, TabSortBoxes, Table, TableBox, TableFormat, TableLine,
    Twips, COVERED_ROW_SPAN, MAX_TABLE_NESTING_DEPTH,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Lines and leaf boxes in document order
#[derive(Default)]
struct OrderCollector {
    order: Vec<Visited>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visited {
    Line(LineId),
    Leaf(BoxId),
}

impl TableVisitor for OrderCollector {
    fn visit_line(&mut self, _doc: &Document, line: &TableLine, _depth: usize) {
        self.order.push(Visited::Line(line.id()));
    }

    fn visit_box(&mut self, _doc: &Document, table_box: &TableBox, _depth: usize) {
        if table_box.is_leaf() {
            self.order.push(Visited::Leaf(table_box.id()));
        }
    }
}

impl Document {
    // =========================================================================
    // Creation
    // =========================================================================

    /// Insert a box content section (start, one paragraph, end) before `at`
    pub fn make_box_section(&mut self, at: usize, id: BoxId, style: &StyleId, text: &str) -> Result<NodeId> {
        let (start, end) = Node::section(StartKind::Box(id));
        let start_id = start.id();
        self.nodes.insert_many(at, vec![start, end])?;
        self.insert_paragraph(at + 1, text, style)?;
        Ok(start_id)
    }

    /// Hook a new leaf box into a line and the sorted index
    fn attach_leaf(
        &mut self,
        table: NodeId,
        line: LineId,
        pos: usize,
        id: BoxId,
        start: NodeId,
        format: Arc<BoxFormat>,
    ) -> Result<()> {
        self.boxes
            .insert(id, TableBox::new(id, line, BoxContent::Section(start), format));
        self.line_mut(line)?.boxes.insert(pos, id);
        let nodes = &self.nodes;
        let table = self.tables.get_mut(&table).ok_or(DocModelError::TableNotFound(table))?;
        table.sort_boxes.insert(nodes, start, id);
        Ok(())
    }

    /// Create a table of `rows` lines with one box per entry of `widths`,
    /// inserted before node `at`. Boxes of equal width share one format.
    pub fn create_table(
        &mut self,
        at: usize,
        rows: usize,
        widths: &[Twips],
        style: &StyleId,
        new_model: bool,
    ) -> Result<NodeId> {
        if rows == 0 || widths.is_empty() {
            return Err(DocModelError::InvalidOperation(format!(
                "table needs rows and columns, got {}x{}",
                rows,
                widths.len()
            )));
        }
        let (start, end) = Node::section(StartKind::Table);
        let node = start.id();
        self.nodes.insert_many(at, vec![start, end])?;
        let format = TableFormat {
            width: widths.iter().sum(),
            ..Default::default()
        };
        self.tables.insert(node, Table::new(node, Arc::new(format), new_model));

        let line_format = Arc::new(LineFormat::default());
        let mut box_formats: HashMap<Twips, Arc<BoxFormat>> = HashMap::new();
        let mut cursor = at + 1;
        for _ in 0..rows {
            let line = LineId::new();
            self.lines
                .insert(line, TableLine::new(line, None, Arc::clone(&line_format)));
            self.table_mut(node)?.lines.push(line);
            for (col, width) in widths.iter().enumerate() {
                let format = box_formats
                    .entry(*width)
                    .or_insert_with(|| Arc::new(BoxFormat::with_width(*width)));
                let format = Arc::clone(format);
                let id = BoxId::new();
                let start = self.make_box_section(cursor, id, style, "")?;
                cursor += 3;
                self.attach_leaf(node, line, col, id, start, format)?;
            }
        }
        tracing::debug!("created table {} with {}x{} boxes", node, rows, widths.len());
        Ok(node)
    }

    // =========================================================================
    // Box insertion
    // =========================================================================

    /// Node index where content for a box inserted at `pos` in `line` goes
    fn insertion_index(&self, table: NodeId, line: LineId, pos: usize) -> Result<usize> {
        let boxes = &self.line(line)?.boxes;
        if pos > boxes.len() {
            return Err(DocModelError::InvalidIndex(pos));
        }
        if pos > 0 {
            return Ok(self.box_end_index(boxes[pos - 1])? + 1);
        }
        if let Some(first) = boxes.first() {
            return self.box_start_index(*first);
        }
        // Empty line: go before the first leaf that follows it in document
        // order, else before the table's end node.
        let mut collector = OrderCollector::default();
        walk_lines(self, &self.table(table)?.lines, &mut collector);
        let here = collector
            .order
            .iter()
            .position(|v| *v == Visited::Line(line))
            .ok_or(DocModelError::LineNotFound(line))?;
        let next = collector.order[here..].iter().find_map(|v| match v {
            Visited::Leaf(b) => Some(*b),
            Visited::Line(_) => None,
        });
        match next {
            Some(leaf) => self.box_start_index(leaf),
            None => self.table_range(table).map(|(_, end)| end),
        }
    }

    /// Insert `count` empty boxes at `insert_pos` of `line`, all sharing `format`
    pub fn ins_boxen(
        &mut self,
        table: NodeId,
        line: LineId,
        format: Arc<BoxFormat>,
        style: &StyleId,
        insert_pos: usize,
        count: usize,
    ) -> Result<Vec<BoxId>> {
        let mut at = self.insertion_index(table, line, insert_pos)?;
        let mut created = Vec::with_capacity(count);
        for i in 0..count {
            let id = BoxId::new();
            let start = self.make_box_section(at, id, style, "")?;
            at += 3;
            self.attach_leaf(table, line, insert_pos + i, id, start, Arc::clone(&format))?;
            created.push(id);
        }
        Ok(created)
    }

    // =========================================================================
    // Line copies
    // =========================================================================

    /// Index of the first node of a line's content
    pub fn line_start_index(&self, line: LineId) -> Result<usize> {
        let first = self
            .line(line)?
            .boxes
            .first()
            .ok_or_else(|| DocModelError::TreeStructureError(format!("empty line {}", line)))?;
        self.box_start_index(*first)
    }

    /// Index of the last node of a line's content
    pub fn line_end_index(&self, line: LineId) -> Result<usize> {
        let last = self
            .line(line)?
            .boxes
            .last()
            .ok_or_else(|| DocModelError::TreeStructureError(format!("empty line {}", line)))?;
        self.box_end_index(*last)
    }

    /// Insert a copy of `template`'s structure next to it.
    ///
    /// Formats are shared with the template. With `copy_content` the
    /// paragraphs are duplicated, otherwise each box gets one empty
    /// paragraph in the style of the template box's first paragraph.
    pub fn insert_line_copy(
        &mut self,
        table: NodeId,
        template: LineId,
        behind: bool,
        copy_content: bool,
    ) -> Result<LineId> {
        let mut cursor = if behind {
            self.line_end_index(template)? + 1
        } else {
            self.line_start_index(template)?
        };
        let upper = self.line(template)?.upper;
        let new_line = self.copy_line_at(table, template, upper, &mut cursor, copy_content, 0)?;
        let container = self.line_container_mut(table, template)?;
        let pos = container
            .iter()
            .position(|l| *l == template)
            .ok_or(DocModelError::LineNotFound(template))?;
        container.insert(if behind { pos + 1 } else { pos }, new_line);
        Ok(new_line)
    }

    /// Insert a copy of `template` right before `before`. The template may
    /// live in another table; `table` is the one holding `before`.
    pub fn insert_line_copy_before(
        &mut self,
        table: NodeId,
        template: LineId,
        before: LineId,
        copy_content: bool,
    ) -> Result<LineId> {
        let mut cursor = self.line_start_index(before)?;
        let upper = self.line(before)?.upper;
        let new_line = self.copy_line_at(table, template, upper, &mut cursor, copy_content, 0)?;
        let container = self.line_container_mut(table, before)?;
        let pos = container
            .iter()
            .position(|l| *l == before)
            .ok_or(DocModelError::LineNotFound(before))?;
        container.insert(pos, new_line);
        Ok(new_line)
    }

    /// The list holding a line: the table's lines or its upper box's lines
    pub fn line_container_mut(&mut self, table: NodeId, line: LineId) -> Result<&mut Vec<LineId>> {
        match self.line(line)?.upper {
            Some(upper) => self
                .box_mut(upper)?
                .lines_mut()
                .ok_or_else(|| DocModelError::TreeStructureError(format!("{} holds no lines", upper))),
            None => Ok(&mut self.table_mut(table)?.lines),
        }
    }

    fn copy_line_at(
        &mut self,
        table: NodeId,
        template: LineId,
        upper: Option<BoxId>,
        cursor: &mut usize,
        copy_content: bool,
        depth: usize,
    ) -> Result<LineId> {
        if depth > MAX_TABLE_NESTING_DEPTH {
            return Err(DocModelError::TreeStructureError(format!(
                "nesting too deep copying {}",
                template
            )));
        }
        let source = self.line(template)?.clone();
        let id = LineId::new();
        self.lines
            .insert(id, TableLine::new(id, upper, Arc::clone(&source.format)));
        for (pos, src_id) in source.boxes.iter().enumerate() {
            let src = self.table_box(*src_id)?.clone();
            let new_box = BoxId::new();
            if src.is_leaf() {
                let (start, len) = self.copy_box_section(*cursor, new_box, *src_id, copy_content)?;
                *cursor += len;
                self.attach_leaf(table, id, pos, new_box, start, Arc::clone(&src.format))?;
            } else {
                self.boxes.insert(
                    new_box,
                    TableBox::new(new_box, id, BoxContent::Lines(Vec::new()), Arc::clone(&src.format)),
                );
                self.line_mut(id)?.boxes.push(new_box);
                for nested in src.lines() {
                    let copy = self.copy_line_at(table, *nested, Some(new_box), cursor, copy_content, depth + 1)?;
                    if let Some(lines) = self.box_mut(new_box)?.lines_mut() {
                        lines.push(copy);
                    }
                }
            }
        }
        Ok(id)
    }

    /// Create the section for `id` at `at` modelled on `source`'s section.
    /// Returns the start node and the number of nodes inserted.
    fn copy_box_section(
        &mut self,
        at: usize,
        id: BoxId,
        source: BoxId,
        copy_content: bool,
    ) -> Result<(NodeId, usize)> {
        let paragraphs = self.box_paragraphs(source)?;
        let (start, end) = Node::section(StartKind::Box(id));
        let start_id = start.id();
        if copy_content && !paragraphs.is_empty() {
            let mut nodes = vec![start];
            for p in &paragraphs {
                if let Some(text) = self.nodes.text(*p) {
                    nodes.push(Node::text(text.clone()));
                }
            }
            nodes.push(end);
            let len = nodes.len();
            self.nodes.insert_many(at, nodes)?;
            return Ok((start_id, len));
        }
        let style = paragraphs
            .first()
            .and_then(|p| self.nodes.text(*p))
            .map(|t| t.style.clone())
            .unwrap_or_else(|| self.styles.default_style().clone());
        self.nodes.insert_many(at, vec![start, end])?;
        self.insert_paragraph(at + 1, "", &style)?;
        Ok((start_id, 3))
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Drop the table data of a table node that left the node array
    pub fn remove_table_data(&mut self, node: NodeId) -> Option<Table> {
        let table = self.tables.remove(&node)?;
        let subtree = self.subtree_of(&table.lines);
        for line in subtree.lines {
            self.lines.remove(&line);
        }
        for b in subtree.boxes {
            self.boxes.remove(&b);
        }
        Some(table)
    }

    /// Remove nodes `start..end` along with the data of any table they held
    pub fn remove_nodes(&mut self, start: usize, end: usize) -> Vec<Node> {
        let removed = self.nodes.remove_range(start, end);
        for node in &removed {
            if node.is_table_start() {
                self.remove_table_data(node.id());
            }
        }
        removed
    }

    /// Delete a box with its content and nested lines
    pub fn delete_box(&mut self, table: NodeId, id: BoxId) -> Result<()> {
        let (leaves, subtree) = {
            let table_box = self.table_box(id)?;
            if table_box.is_leaf() {
                (vec![id], None)
            } else {
                let lines = table_box.lines().to_vec();
                (self.leaf_boxes_of(&lines), Some(self.subtree_of(&lines)))
            }
        };
        for leaf in &leaves {
            if let Some(start) = self.table_box(*leaf)?.start_node() {
                let (s, e) = self.nodes.section_indices(start)?;
                self.remove_nodes(s, e + 1);
            }
            self.table_mut(table)?.sort_boxes.remove(*leaf);
        }
        if let Some(subtree) = subtree {
            for line in subtree.lines {
                self.lines.remove(&line);
            }
            for b in subtree.boxes {
                self.boxes.remove(&b);
            }
        }
        if let Some(removed) = self.boxes.remove(&id) {
            if let Some(line) = self.lines.get_mut(&removed.upper) {
                line.boxes.retain(|b| *b != id);
            }
        }
        Ok(())
    }

    /// Delete a line with all its boxes
    pub fn delete_line(&mut self, table: NodeId, line: LineId) -> Result<()> {
        for b in self.line(line)?.boxes.clone() {
            self.delete_box(table, b)?;
        }
        self.line_container_mut(table, line)?.retain(|l| *l != line);
        self.lines.remove(&line);
        Ok(())
    }

    /// Rebuild a table's sorted box index from a tree walk
    pub fn rebuild_sort_index(&mut self, table: NodeId) -> Result<()> {
        let leaves = self.leaf_boxes(table)?;
        let mut index = TabSortBoxes::new();
        for leaf in leaves {
            if let Some(start) = self.table_box(leaf)?.start_node() {
                index.insert(&self.nodes, start, leaf);
            }
        }
        self.table_mut(table)?.sort_boxes = index;
        Ok(())
    }

    // =========================================================================
    // Balancing and lookup
    // =========================================================================

    /// Square up short top-level lines with empty boxes.
    ///
    /// Returns whether the first line needed padding.
    pub fn balance_table(&mut self, table: NodeId, style: &StyleId) -> Result<bool> {
        let lines = self.table(table)?.lines.clone();
        let mut widest = 0;
        for line in &lines {
            widest = widest.max(self.line(*line)?.box_count());
        }
        let mut first_short = false;
        for (i, line) in lines.iter().enumerate() {
            let count = self.line(*line)?.box_count();
            if count >= widest {
                continue;
            }
            if i == 0 {
                first_short = true;
            }
            let format = match self.line(*line)?.boxes.last() {
                Some(last) => Arc::clone(&self.table_box(*last)?.format),
                None => Arc::new(BoxFormat::default()),
            };
            self.ins_boxen(table, *line, format, style, count, widest - count)?;
        }
        if first_short {
            tracing::debug!("balancing padded the first line of {}", table);
        }
        Ok(first_short)
    }

    /// Box of `line` whose horizontal extent holds `pos`, scanning left to
    /// right; positions past the right edge yield the last box.
    pub fn box_of_pos(&self, line: LineId, pos: Twips) -> Result<Option<BoxId>> {
        let positions = self.line_positions(line)?;
        let boxes = &self.line(line)?.boxes;
        for (i, b) in boxes.iter().enumerate() {
            if pos < positions[i + 1] {
                return Ok(Some(*b));
            }
        }
        Ok(boxes.last().copied())
    }

    /// Box of `line` whose left edge is exactly `left`
    pub fn box_with_left(&self, line: LineId, left: Twips) -> Result<Option<BoxId>> {
        let positions = self.line_positions(line)?;
        let boxes = &self.line(line)?.boxes;
        Ok(positions
            .iter()
            .zip(boxes)
            .find(|(x, _)| **x == left)
            .map(|(_, b)| *b))
    }

    // =========================================================================
    // Row spans
    // =========================================================================

    /// Master box of a covered box, searching upwards at the same left edge
    pub fn row_span_master(&self, table: NodeId, id: BoxId) -> Result<Option<BoxId>> {
        let table_ref = self.table(table)?;
        let line = self.table_box(id)?.upper;
        let Some(row) = table_ref.line_index(line) else {
            return Ok(None);
        };
        let left = self.box_left(id)?;
        for above in table_ref.lines[..row].iter().rev() {
            match self.box_with_left(*above, left)? {
                Some(b) if self.table_box(b)?.is_covered() => continue,
                Some(b) if self.table_box(b)?.is_master() => return Ok(Some(b)),
                _ => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Covered boxes in the first line lose their master: each becomes the
    /// master of whatever run of covered boxes follows it.
    pub fn clean_up_top_row_span(&mut self, table: NodeId) -> Result<()> {
        let lines = self.table(table)?.lines.clone();
        let Some(first) = lines.first() else {
            return Ok(());
        };
        let positions = self.line_positions(*first)?;
        for (i, b) in self.line(*first)?.boxes.clone().iter().enumerate() {
            if !self.table_box(*b)?.is_covered() {
                continue;
            }
            let mut run = 0;
            for below in &lines[1..] {
                match self.box_with_left(*below, positions[i])? {
                    Some(c) if self.table_box(c)?.is_covered() => run += 1,
                    _ => break,
                }
            }
            self.box_mut(*b)?.row_span = 1 + run;
        }
        Ok(())
    }

    /// Masters whose span runs past the last line are cut to the rows left
    pub fn clean_up_bottom_row_span(&mut self, table: NodeId) -> Result<()> {
        let lines = self.table(table)?.lines.clone();
        let rows = lines.len();
        for (r, line) in lines.iter().enumerate() {
            for b in self.line(*line)?.boxes.clone() {
                let table_box = self.box_mut(b)?;
                let room = (rows - r) as i32;
                if table_box.row_span > room {
                    table_box.row_span = room;
                }
            }
        }
        Ok(())
    }

    /// Recompute spans after rows were removed or inserted: each master
    /// spans exactly the covered boxes below it, an orphaned covered box
    /// becomes the master of its run.
    pub fn normalize_row_spans(&mut self, table: NodeId) -> Result<()> {
        let lines = self.table(table)?.lines.clone();
        let mut open: HashMap<Twips, BoxId> = HashMap::new();
        for line in &lines {
            let positions = self.line_positions(*line)?;
            let boxes = self.line(*line)?.boxes.clone();
            let mut seen: Vec<Twips> = Vec::new();
            for (i, b) in boxes.iter().enumerate() {
                let x = positions[i];
                seen.push(x);
                if self.table_box(*b)?.is_covered() {
                    match open.get(&x).copied() {
                        Some(master) => self.box_mut(master)?.row_span += 1,
                        None => {
                            self.box_mut(*b)?.row_span = 1;
                            open.insert(x, *b);
                        }
                    }
                } else {
                    self.box_mut(*b)?.row_span = 1;
                    open.insert(x, *b);
                }
            }
            open.retain(|x, _| seen.contains(x));
        }
        Ok(())
    }

    /// Number of rows a box covers (1 for ordinary and covered boxes)
    pub fn row_span_of(&self, id: BoxId) -> Result<usize> {
        let span = self.table_box(id)?.row_span;
        Ok(if span > 1 { span as usize } else { 1 })
    }

    /// Mark `id` as the master of `rows` rows and the boxes below it as covered
    pub fn set_row_span(&mut self, table: NodeId, id: BoxId, rows: usize) -> Result<()> {
        let table_ref = self.table(table)?;
        let line = self.table_box(id)?.upper;
        let row = table_ref.line_index(line).ok_or(DocModelError::LineNotFound(line))?;
        if row + rows > table_ref.lines.len() {
            return Err(DocModelError::InvalidOperation(format!(
                "span of {} rows from row {} leaves the table",
                rows, row
            )));
        }
        let below: Vec<LineId> = table_ref.lines[row + 1..row + rows].to_vec();
        let left = self.box_left(id)?;
        for l in below {
            let covered = self
                .box_with_left(l, left)?
                .ok_or_else(|| DocModelError::TreeStructureError(format!("no box at {} in {}", left, l)))?;
            self.box_mut(covered)?.row_span = COVERED_ROW_SPAN;
        }
        self.box_mut(id)?.row_span = rows as i32;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PoolStyle;
    use proptest::prelude::*;

    fn doc_with_table(rows: usize, widths: &[Twips], new_model: bool) -> (Document, NodeId) {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let table = doc.create_table(1, rows, widths, &style, new_model).unwrap();
        (doc, table)
    }

    #[test]
    fn test_create_table_shares_formats() {
        let (doc, table) = doc_with_table(3, &[1000, 1000, 1000], false);
        doc.check_table(table).unwrap();
        let leaves = doc.leaf_boxes(table).unwrap();
        assert_eq!(leaves.len(), 9);
        let a = &doc.table_box(leaves[0]).unwrap().format;
        let b = &doc.table_box(leaves[8]).unwrap().format;
        assert!(Arc::ptr_eq(a, b));
        // body start, table start, 9 * 3 box nodes, table end, paragraph, body end
        assert_eq!(doc.nodes.len(), 1 + 1 + 27 + 1 + 1 + 1);
    }

    #[test]
    fn test_ins_boxen_in_middle_keeps_order() {
        let (mut doc, table) = doc_with_table(2, &[500, 500], false);
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let line = doc.table(table).unwrap().lines[0];
        let format = Arc::new(BoxFormat::with_width(200));
        let new = doc.ins_boxen(table, line, format, &style, 1, 2).unwrap();
        assert_eq!(doc.line(line).unwrap().boxes[1..3], new[..]);
        doc.check_table(table).unwrap();
        let indices: Vec<usize> = doc
            .line(line)
            .unwrap()
            .boxes
            .iter()
            .map(|b| doc.box_start_index(*b).unwrap())
            .collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_ins_boxen_into_empty_line() {
        let (mut doc, table) = doc_with_table(2, &[500], false);
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let second = doc.table(table).unwrap().lines[1];
        let only = doc.line(second).unwrap().boxes[0];
        doc.delete_box(table, only).unwrap();
        assert_eq!(doc.line(second).unwrap().box_count(), 0);
        doc.ins_boxen(table, second, Arc::new(BoxFormat::with_width(500)), &style, 0, 1)
            .unwrap();
        doc.check_table(table).unwrap();
    }

    #[test]
    fn test_outline_style_in_new_box() {
        let (mut doc, table) = doc_with_table(1, &[500], false);
        let heading = doc.styles.get_or_create(PoolStyle::Heading(2));
        let line = doc.table(table).unwrap().lines[0];
        let new = doc
            .ins_boxen(table, line, Arc::new(BoxFormat::with_width(100)), &heading, 1, 1)
            .unwrap();
        let para = doc.box_paragraphs(new[0]).unwrap()[0];
        assert_eq!(doc.nodes.text(para).unwrap().outline_level, Some(2));
    }

    #[test]
    fn test_balance_reports_short_first_line() {
        let (mut doc, table) = doc_with_table(2, &[500, 500], false);
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let first = doc.table(table).unwrap().lines[0];
        let victim = doc.line(first).unwrap().boxes[1];
        doc.delete_box(table, victim).unwrap();
        assert!(!doc.is_balanced(table).unwrap());
        assert!(doc.balance_table(table, &style).unwrap());
        assert!(doc.is_balanced(table).unwrap());
        assert!(!doc.balance_table(table, &style).unwrap());
    }

    #[test]
    fn test_box_of_pos_nearest_below() {
        let (doc, table) = doc_with_table(1, &[100, 100, 100], false);
        let line = doc.table(table).unwrap().lines[0];
        let boxes = doc.line(line).unwrap().boxes.clone();
        assert_eq!(doc.box_of_pos(line, 0).unwrap(), Some(boxes[0]));
        assert_eq!(doc.box_of_pos(line, 150).unwrap(), Some(boxes[1]));
        assert_eq!(doc.box_of_pos(line, 200).unwrap(), Some(boxes[2]));
        assert_eq!(doc.box_of_pos(line, 9999).unwrap(), Some(boxes[2]));
    }

    #[test]
    fn test_insert_line_copy_behind() {
        let (mut doc, table) = doc_with_table(2, &[300, 300], false);
        let first = doc.table(table).unwrap().lines[0];
        let b = doc.line(first).unwrap().boxes[0];
        let para = doc.box_paragraphs(b).unwrap()[0];
        doc.nodes.text_mut(para).unwrap().text = "x".into();

        let copy = doc.insert_line_copy(table, first, true, true).unwrap();
        assert_eq!(doc.table(table).unwrap().lines[1], copy);
        let copied = doc.line(copy).unwrap().boxes[0];
        assert_eq!(doc.box_text(copied).unwrap(), "x");
        let empty = doc.insert_line_copy(table, first, false, false).unwrap();
        assert_eq!(doc.table(table).unwrap().lines[0], empty);
        assert_eq!(doc.box_text(doc.line(empty).unwrap().boxes[0]).unwrap(), "");
        doc.check_table(table).unwrap();
    }

    #[test]
    fn test_insert_line_copy_before_other_line() {
        let (mut doc, table) = doc_with_table(3, &[300, 300], false);
        let lines = doc.table(table).unwrap().lines.clone();
        let b = doc.line(lines[0]).unwrap().boxes[1];
        let para = doc.box_paragraphs(b).unwrap()[0];
        doc.nodes.text_mut(para).unwrap().text = "head".into();

        let copy = doc.insert_line_copy_before(table, lines[0], lines[2], true).unwrap();
        assert_eq!(doc.table(table).unwrap().lines[2], copy);
        assert_eq!(doc.box_text(doc.line(copy).unwrap().boxes[1]).unwrap(), "head");
        doc.check_table(table).unwrap();
    }

    #[test]
    fn test_row_span_clean_up() {
        let (mut doc, table) = doc_with_table(3, &[400, 400], true);
        let lines = doc.table(table).unwrap().lines.clone();
        let master = doc.line(lines[0]).unwrap().boxes[0];
        doc.set_row_span(table, master, 3).unwrap();
        doc.check_table(table).unwrap();
        let covered = doc.line(lines[2]).unwrap().boxes[0];
        assert_eq!(doc.row_span_master(table, covered).unwrap(), Some(master));

        // Cut the first row away: the covered box on top becomes a master
        doc.table_mut(table).unwrap().lines.remove(0);
        doc.clean_up_top_row_span(table).unwrap();
        let top = doc.line(lines[1]).unwrap().boxes[0];
        assert_eq!(doc.table_box(top).unwrap().row_span, 2);
    }

    #[test]
    fn test_bottom_clean_up_cuts_span() {
        let (mut doc, table) = doc_with_table(3, &[400], true);
        let lines = doc.table(table).unwrap().lines.clone();
        let master = doc.line(lines[0]).unwrap().boxes[0];
        doc.set_row_span(table, master, 3).unwrap();
        doc.table_mut(table).unwrap().lines.truncate(2);
        doc.clean_up_bottom_row_span(table).unwrap();
        assert_eq!(doc.table_box(master).unwrap().row_span, 2);
    }

    #[test]
    fn test_normalize_after_row_removal() {
        let (mut doc, table) = doc_with_table(3, &[400, 400], true);
        let lines = doc.table(table).unwrap().lines.clone();
        let master = doc.line(lines[0]).unwrap().boxes[0];
        doc.set_row_span(table, master, 3).unwrap();
        doc.delete_line(table, lines[1]).unwrap();
        doc.normalize_row_spans(table).unwrap();
        assert_eq!(doc.table_box(master).unwrap().row_span, 2);
        doc.check_table(table).unwrap();
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, failure_persistence: None, ..ProptestConfig::default() })]

        #[test]
        fn balance_squares_every_line(
            removals in proptest::collection::vec((0usize..4, 0usize..4), 0..10),
        ) {
            let (mut doc, table) = doc_with_table(4, &[250, 250, 250, 250], false);
            let style = doc.styles.get_or_create(PoolStyle::Table);
            let lines = doc.table(table).unwrap().lines.clone();
            for (row, col) in removals {
                let boxes = doc.line(lines[row]).unwrap().boxes.clone();
                // keep at least one box per line
                if boxes.len() > 1 {
                    doc.delete_box(table, boxes[col % boxes.len()]).unwrap();
                }
            }
            let first_short = doc.line(lines[0]).unwrap().box_count()
                < lines.iter().map(|l| doc.line(*l).unwrap().box_count()).max().unwrap();
            prop_assert_eq!(doc.balance_table(table, &style).unwrap(), first_short);
            prop_assert!(doc.is_balanced(table).unwrap());
            prop_assert!(doc.check_table(table).is_ok());
        }
    }
}
