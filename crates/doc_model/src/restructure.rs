//! Restructuring primitives: splitting and joining tables, nesting box
//! content and moving boxes between lines
//!
//! Like the other primitives these only keep the model consistent; callers
//! take care of undo, redlines and frames.

use crate::{
    BoxContent, BoxFormat, BoxId, DocModelError, Document, LineFormat, LineId, Node, NodeId,
    NodeKind, Result, StartKind, Table, TableBox, TableLine,
};
use std::collections::HashMap;
use std::sync::Arc;

impl Document {
    /// Point a start node at a new end node
    fn relink_start(&mut self, start: NodeId, end: NodeId) -> Result<()> {
        match self.nodes.get_mut(start).map(|n| &mut n.kind) {
            Some(NodeKind::Start { end: e, .. }) => {
                *e = end;
                Ok(())
            }
            _ => Err(DocModelError::TreeStructureError(format!("{} is not a start node", start))),
        }
    }

    /// Point an end node at a new start node
    fn relink_end(&mut self, end: NodeId, start: NodeId) -> Result<()> {
        match self.nodes.get_mut(end).map(|n| &mut n.kind) {
            Some(NodeKind::End { start: s }) => {
                *s = start;
                Ok(())
            }
            _ => Err(DocModelError::TreeStructureError(format!("{} is not an end node", end))),
        }
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Move the top-level lines from index `at` on into a new table right
    /// behind `table`. The new table shares the old table's format.
    ///
    /// Returns the new table node.
    pub fn split_table_at(&mut self, table: NodeId, at: usize) -> Result<NodeId> {
        let old = self.table(table)?;
        if at == 0 || at >= old.lines.len() {
            return Err(DocModelError::InvalidOperation(format!(
                "cannot split a table of {} lines at {}",
                old.lines.len(),
                at
            )));
        }
        let (format, new_model, kind) = (Arc::clone(&old.format), old.new_model, old.kind.clone());
        let cut = self.line_start_index(old.lines[at])?;
        let old_end = self
            .nodes
            .end_of_section(table)
            .ok_or(DocModelError::TableNotFound(table))?;

        let mid_end = NodeId::new();
        let new_start = NodeId::new();
        self.nodes.insert_many(
            cut,
            vec![
                Node::new(mid_end, NodeKind::End { start: table }),
                Node::new(
                    new_start,
                    NodeKind::Start {
                        kind: StartKind::Table,
                        end: old_end,
                    },
                ),
            ],
        )?;
        self.relink_start(table, mid_end)?;
        self.relink_end(old_end, new_start)?;

        let moved = self.table_mut(table)?.lines.split_off(at);
        let mut new_table = Table::new(new_start, format, new_model);
        new_table.lines = moved;
        new_table.kind = kind;
        self.tables.insert(new_start, new_table);
        self.rebuild_sort_index(table)?;
        self.rebuild_sort_index(new_start)?;
        tracing::debug!("split {} at line {} into {}", table, at, new_start);
        Ok(new_start)
    }

    /// Append the lines of `second` to `first`; the two tables must be
    /// direct neighbours in the node array. `second`'s table data is gone
    /// afterwards, its lines and boxes now belong to `first`.
    pub fn join_tables(&mut self, first: NodeId, second: NodeId) -> Result<()> {
        let (_, first_end) = self.table_range(first)?;
        let (second_start, second_end) = self.table_range(second)?;
        if first_end + 1 != second_start {
            return Err(DocModelError::InvalidOperation(format!(
                "tables {} and {} are not adjacent",
                first, second
            )));
        }
        let end_node = self.nodes.at(second_end).ok_or(DocModelError::InvalidIndex(second_end))?;
        self.nodes.remove_range(first_end, first_end + 2);
        self.relink_start(first, end_node)?;
        self.relink_end(end_node, first)?;

        let absorbed = self
            .tables
            .remove(&second)
            .ok_or(DocModelError::TableNotFound(second))?;
        self.table_mut(first)?.lines.extend(absorbed.lines);
        self.rebuild_sort_index(first)?;
        tracing::debug!("joined {} into {}", second, first);
        Ok(())
    }

    /// Rearrange the box sections of a table so node order follows the
    /// tree walk again after boxes moved between lines
    pub fn reorder_box_sections(&mut self, table: NodeId) -> Result<()> {
        let (start, end) = self.table_range(table)?;
        let mut order: Vec<NodeId> = Vec::with_capacity(end - start);
        for leaf in self.leaf_boxes(table)? {
            let section = self
                .table_box(leaf)?
                .start_node()
                .ok_or(DocModelError::BoxNotFound(leaf))?;
            let (s, e) = self.nodes.section_indices(section)?;
            order.extend(self.nodes.ids()[s..=e].iter().copied());
        }
        if order.len() != end - start - 1 {
            return Err(DocModelError::TreeStructureError(format!(
                "table {} holds {} nodes outside box sections",
                table,
                (end - start - 1).abs_diff(order.len())
            )));
        }
        let mut removed: HashMap<NodeId, Node> = self
            .nodes
            .remove_range(start + 1, end)
            .into_iter()
            .map(|n| (n.id(), n))
            .collect();
        let nodes: Vec<Node> = order.iter().filter_map(|id| removed.remove(id)).collect();
        self.nodes.insert_many(start + 1, nodes)?;
        self.rebuild_sort_index(table)
    }

    // =========================================================================
    // Boxes
    // =========================================================================

    /// Turn a leaf box into a branch holding one nested line with one leaf
    /// that takes over the content section.
    ///
    /// Returns the nested line and the new leaf.
    pub fn nest_box_content(&mut self, table: NodeId, id: BoxId) -> Result<(LineId, BoxId)> {
        let source = self.table_box(id)?;
        let start = source
            .start_node()
            .ok_or_else(|| DocModelError::InvalidOperation(format!("{} holds nested lines", id)))?;
        let format = Arc::clone(&source.format);

        let line = LineId::new();
        let leaf = BoxId::new();
        self.lines
            .insert(line, TableLine::new(line, Some(id), Arc::new(LineFormat::default())));
        self.boxes
            .insert(leaf, TableBox::new(leaf, line, BoxContent::Section(start), format));
        self.line_mut(line)?.boxes.push(leaf);
        if let Some(NodeKind::Start { kind, .. }) = self.nodes.get_mut(start).map(|n| &mut n.kind) {
            *kind = StartKind::Box(leaf);
        }
        self.box_mut(id)?.content = BoxContent::Lines(vec![line]);

        let nodes = &self.nodes;
        let table = self.tables.get_mut(&table).ok_or(DocModelError::TableNotFound(table))?;
        table.sort_boxes.remove(id);
        table.sort_boxes.insert(nodes, start, leaf);
        Ok((line, leaf))
    }

    /// Create a branch box at `pos` of `host` whose nested lines hold the
    /// given groups of boxes, one line per group. The boxes leave their
    /// current lines; node order is not touched, see
    /// [`Document::reorder_box_sections`].
    pub fn make_branch_box(
        &mut self,
        host: LineId,
        pos: usize,
        groups: Vec<Vec<BoxId>>,
        format: Arc<BoxFormat>,
    ) -> Result<BoxId> {
        let branch = BoxId::new();
        let mut nested = Vec::with_capacity(groups.len());
        for group in groups {
            let line = LineId::new();
            let line_format = match group.first() {
                Some(b) => Arc::clone(&self.line(self.table_box(*b)?.upper)?.format),
                None => Arc::new(LineFormat::default()),
            };
            self.lines.insert(line, TableLine::new(line, Some(branch), line_format));
            for b in &group {
                let old = self.table_box(*b)?.upper;
                self.line_mut(old)?.boxes.retain(|x| x != b);
                self.box_mut(*b)?.upper = line;
            }
            self.line_mut(line)?.boxes = group;
            nested.push(line);
        }
        self.boxes
            .insert(branch, TableBox::new(branch, host, BoxContent::Lines(nested), format));
        let line = self.line_mut(host)?;
        let pos = pos.min(line.boxes.len());
        line.boxes.insert(pos, branch);
        Ok(branch)
    }

    /// Move the content of box `from` to the end of box `to`. Returns the
    /// number of paragraphs moved; a lone empty paragraph stays behind.
    pub fn move_box_content(&mut self, from: BoxId, to: BoxId) -> Result<usize> {
        let paragraphs = self.box_paragraphs(from)?;
        if paragraphs.len() == 1 && self.nodes.text(paragraphs[0]).is_some_and(|t| t.is_empty()) {
            return Ok(0);
        }
        let source = self.table_box(from)?.start_node().ok_or(DocModelError::BoxNotFound(from))?;
        let target = self.table_box(to)?.start_node().ok_or(DocModelError::BoxNotFound(to))?;
        let (s, e) = self.nodes.section_indices(source)?;
        let (_, dest) = self.nodes.section_indices(target)?;
        self.nodes.move_range(s + 1, e, dest)?;
        Ok(e - s - 1)
    }
}
