//! Traversal of table line/box trees
//!
//! Walks use an explicit stack so deeply nested tables cannot exhaust the
//! call stack. Visitors are accumulators: they collect what a later
//! mutating pass needs, the walk itself never mutates.

use crate::{BoxId, Document, LineId, TableBox, TableLine};

/// Callbacks for [`walk_lines`]; both default to doing nothing
pub trait TableVisitor {
    fn visit_line(&mut self, _doc: &Document, _line: &TableLine, _depth: usize) {}
    fn visit_box(&mut self, _doc: &Document, _table_box: &TableBox, _depth: usize) {}
}

enum Item {
    Line(LineId, usize),
    Box(BoxId, usize),
}

/// Visit `lines` and everything below them in document order.
///
/// Ids missing from the document are skipped with a warning.
pub fn walk_lines<V: TableVisitor + ?Sized>(doc: &Document, lines: &[LineId], visitor: &mut V) {
    let mut stack: Vec<Item> = lines.iter().rev().map(|l| Item::Line(*l, 0)).collect();
    while let Some(item) = stack.pop() {
        match item {
            Item::Line(id, depth) => {
                let Some(line) = doc.lines.get(&id) else {
                    tracing::warn!("walk: dangling line {}", id);
                    continue;
                };
                visitor.visit_line(doc, line, depth);
                stack.extend(line.boxes.iter().rev().map(|b| Item::Box(*b, depth)));
            }
            Item::Box(id, depth) => {
                let Some(table_box) = doc.boxes.get(&id) else {
                    tracing::warn!("walk: dangling box {}", id);
                    continue;
                };
                visitor.visit_box(doc, table_box, depth);
                stack.extend(table_box.lines().iter().rev().map(|l| Item::Line(*l, depth + 1)));
            }
        }
    }
}

/// Collects leaf boxes in document order
#[derive(Debug, Default)]
pub struct LeafCollector {
    pub leaves: Vec<BoxId>,
}

impl TableVisitor for LeafCollector {
    fn visit_box(&mut self, _doc: &Document, table_box: &TableBox, _depth: usize) {
        if table_box.is_leaf() {
            self.leaves.push(table_box.id());
        }
    }
}

/// Collects every line and box below a set of lines
#[derive(Debug, Default)]
pub struct SubtreeCollector {
    pub lines: Vec<LineId>,
    pub boxes: Vec<BoxId>,
    pub max_depth: usize,
}

impl TableVisitor for SubtreeCollector {
    fn visit_line(&mut self, _doc: &Document, line: &TableLine, depth: usize) {
        self.lines.push(line.id());
        self.max_depth = self.max_depth.max(depth);
    }

    fn visit_box(&mut self, _doc: &Document, table_box: &TableBox, _depth: usize) {
        self.boxes.push(table_box.id());
    }
}

impl Document {
    /// Leaf boxes below `lines` in document order
    pub fn leaf_boxes_of(&self, lines: &[LineId]) -> Vec<BoxId> {
        let mut collector = LeafCollector::default();
        walk_lines(self, lines, &mut collector);
        collector.leaves
    }

    /// Lines and boxes below `lines`, including the lines themselves
    pub fn subtree_of(&self, lines: &[LineId]) -> SubtreeCollector {
        let mut collector = SubtreeCollector::default();
        walk_lines(self, lines, &mut collector);
        collector
    }
}
