//! Range snapshots for undo
//!
//! A snapshot captures a contiguous node range together with the table data
//! of every table starting inside it. Restoring one snapshot in place of
//! another swaps the document between two states of the same range. Ids are
//! kept, so anything else referring to nodes, lines or boxes stays valid.

use crate::{DocModelError, Document, Node, NodeId, Result, Table, TableBox, TableLine};

/// A captured node range
#[derive(Debug, Clone)]
pub struct RangeSnapshot {
    nodes: Vec<Node>,
    tables: Vec<Table>,
    lines: Vec<TableLine>,
    boxes: Vec<TableBox>,
    /// The node right after the range; it must exist in every state the
    /// snapshot is restored into
    next: NodeId,
}

impl RangeSnapshot {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(Node::id)
    }

    /// Table nodes held by the snapshot
    pub fn table_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.tables.iter().map(Table::node)
    }

    pub fn next(&self) -> NodeId {
        self.next
    }
}

impl Document {
    /// Capture the nodes `start..end`
    pub fn snapshot_range(&self, start: usize, end: usize) -> Result<RangeSnapshot> {
        let next = self.nodes.at(end).ok_or(DocModelError::InvalidIndex(end))?;
        let mut snapshot = RangeSnapshot {
            nodes: Vec::with_capacity(end.saturating_sub(start)),
            tables: Vec::new(),
            lines: Vec::new(),
            boxes: Vec::new(),
            next,
        };
        for index in start..end {
            let node = self.nodes.node_at(index).ok_or(DocModelError::InvalidIndex(index))?;
            snapshot.nodes.push(node.clone());
            if let Some(table) = self.tables.get(&node.id()) {
                let subtree = self.subtree_of(&table.lines);
                snapshot.tables.push(table.clone());
                for line in subtree.lines {
                    snapshot.lines.push(self.line(line)?.clone());
                }
                for b in subtree.boxes {
                    snapshot.boxes.push(self.table_box(b)?.clone());
                }
            }
        }
        Ok(snapshot)
    }

    /// Capture the node range of a table
    pub fn snapshot_table(&self, table: NodeId) -> Result<RangeSnapshot> {
        let (start, end) = self.table_range(table)?;
        self.snapshot_range(start, end + 1)
    }

    /// Replace the range `current` describes by the content of `target`.
    ///
    /// `current` must describe the range as it is now (its nodes may be
    /// gone entirely); `target` goes in before its `next` node.
    pub fn restore_range(&mut self, current: &RangeSnapshot, target: &RangeSnapshot) -> Result<()> {
        let indices: Vec<usize> = current
            .node_ids()
            .filter_map(|id| self.nodes.index_of(id))
            .collect();
        if let (Some(first), Some(last)) = (indices.iter().min(), indices.iter().max()) {
            if last - first + 1 != indices.len() {
                return Err(DocModelError::TreeStructureError(
                    "restored range is no longer contiguous".to_string(),
                ));
            }
            self.remove_nodes(*first, last + 1);
        }
        for table in current.table_nodes() {
            self.remove_table_data(table);
        }

        let at = self.nodes.try_index_of(target.next)?;
        self.nodes.insert_many(at, target.nodes.clone())?;
        for line in &target.lines {
            self.lines.insert(line.id(), line.clone());
        }
        for b in &target.boxes {
            self.boxes.insert(b.id(), b.clone());
        }
        for table in &target.tables {
            let mut table = table.clone();
            table.sort_boxes.resort(&self.nodes);
            self.tables.insert(table.node(), table);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PoolStyle;

    #[test]
    fn test_restore_swaps_table_states() {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let table = doc.create_table(1, 2, &[500, 500], &style, false).unwrap();
        let before = doc.snapshot_table(table).unwrap();

        let line = doc.table(table).unwrap().lines[1];
        doc.delete_line(table, line).unwrap();
        let after = doc.snapshot_table(table).unwrap();
        assert_eq!(doc.table(table).unwrap().row_count(), 1);

        doc.restore_range(&after, &before).unwrap();
        assert_eq!(doc.table(table).unwrap().row_count(), 2);
        assert!(doc.lines.contains_key(&line));
        doc.check_table(table).unwrap();

        doc.restore_range(&before, &after).unwrap();
        assert_eq!(doc.table(table).unwrap().row_count(), 1);
        assert!(!doc.lines.contains_key(&line));
        doc.check_table(table).unwrap();
    }

    #[test]
    fn test_restore_from_empty_range() {
        let mut doc = Document::new();
        let para = doc.nodes.at(1).unwrap();
        let empty = doc.snapshot_range(1, 1).unwrap();
        assert_eq!(empty.next(), para);

        let style = doc.styles.get_or_create(PoolStyle::Table);
        let table = doc.create_table(1, 1, &[500], &style, true).unwrap();
        let with_table = doc.snapshot_table(table).unwrap();

        doc.restore_range(&with_table, &empty).unwrap();
        assert!(doc.tables.is_empty());
        assert!(doc.boxes.is_empty());
        assert_eq!(doc.nodes.len(), 3);
    }
}
