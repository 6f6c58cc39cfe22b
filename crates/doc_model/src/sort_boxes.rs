//! Index of a table's leaf boxes ordered by document position

use crate::{BoxId, NodeArray, NodeId};
use serde::{Deserialize, Serialize};

/// Leaf boxes of a table, sorted by the position of their start node.
///
/// Relative node order never changes when unrelated nodes are inserted or
/// removed, so entries stay sorted without rekeying; lookups resolve the
/// current index through the node array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabSortBoxes {
    entries: Vec<(NodeId, BoxId)>,
}

impl TabSortBoxes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn slot(&self, nodes: &NodeArray, index: usize) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by_key(&index, |(start, _)| {
            nodes.index_of(*start).unwrap_or(usize::MAX)
        })
    }

    /// Add a box whose content section starts at `start`
    pub fn insert(&mut self, nodes: &NodeArray, start: NodeId, id: BoxId) {
        let Some(index) = nodes.index_of(start) else {
            tracing::warn!("sorted box index: start node {} is not in the node array", start);
            return;
        };
        match self.slot(nodes, index) {
            Ok(at) => self.entries[at] = (start, id),
            Err(at) => self.entries.insert(at, (start, id)),
        }
    }

    pub fn remove(&mut self, id: BoxId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(_, b)| *b != id);
        before != self.entries.len()
    }

    pub fn contains(&self, id: BoxId) -> bool {
        self.entries.iter().any(|(_, b)| *b == id)
    }

    /// Box whose start node sits exactly at `index`
    pub fn find_by_start(&self, nodes: &NodeArray, index: usize) -> Option<BoxId> {
        self.slot(nodes, index).ok().map(|at| self.entries[at].1)
    }

    /// Box whose content section contains the node at `index`
    pub fn find_containing(&self, nodes: &NodeArray, index: usize) -> Option<BoxId> {
        let at = match self.slot(nodes, index) {
            Ok(at) => at,
            Err(0) => return None,
            Err(at) => at - 1,
        };
        let (start, id) = self.entries[at];
        let end = nodes.end_of_section(start).and_then(|e| nodes.index_of(e))?;
        (index <= end).then_some(id)
    }

    /// Boxes in document order
    pub fn ids(&self) -> impl Iterator<Item = BoxId> + '_ {
        self.entries.iter().map(|(_, b)| *b)
    }

    pub fn first(&self) -> Option<BoxId> {
        self.entries.first().map(|(_, b)| *b)
    }

    /// Re-sort after a bulk change; drops entries whose start node is gone
    pub fn resort(&mut self, nodes: &NodeArray) {
        self.entries.retain(|(start, _)| nodes.contains(*start));
        self.entries
            .sort_by_key(|(start, _)| nodes.index_of(*start).unwrap_or(usize::MAX));
    }

    /// Move every entry of `other` into this index
    pub fn absorb(&mut self, nodes: &NodeArray, other: &mut TabSortBoxes) {
        self.entries.append(&mut other.entries);
        self.resort(nodes);
    }

    /// Split off every entry whose start node is at or after `index`
    pub fn split_off_from(&mut self, nodes: &NodeArray, index: usize) -> TabSortBoxes {
        let at = match self.slot(nodes, index) {
            Ok(at) | Err(at) => at,
        };
        TabSortBoxes {
            entries: self.entries.split_off(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Node, StartKind, StyleId, TextNode};

    fn box_section(nodes: &mut NodeArray, at: usize, id: BoxId) -> NodeId {
        let (s, e) = Node::section(StartKind::Box(id));
        let start = s.id();
        nodes
            .insert_many(at, vec![s, Node::text(TextNode::new("", StyleId::new("Standard"))), e])
            .unwrap();
        start
    }

    #[test]
    fn test_insert_out_of_order_stays_sorted() {
        let mut nodes = NodeArray::new();
        let (a, b) = (BoxId::new(), BoxId::new());
        let sb = box_section(&mut nodes, 0, b);
        let sa = box_section(&mut nodes, 0, a);
        let mut index = TabSortBoxes::new();
        index.insert(&nodes, sb, b);
        index.insert(&nodes, sa, a);
        assert_eq!(index.ids().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(index.find_by_start(&nodes, 3), Some(b));
        assert_eq!(index.find_containing(&nodes, 1), Some(a));
        assert_eq!(index.find_containing(&nodes, 5), Some(b));
    }

    #[test]
    fn test_split_off_from_position() {
        let mut nodes = NodeArray::new();
        let ids: Vec<BoxId> = (0..3).map(|_| BoxId::new()).collect();
        let mut index = TabSortBoxes::new();
        for (i, id) in ids.iter().enumerate() {
            let start = box_section(&mut nodes, i * 3, *id);
            index.insert(&nodes, start, *id);
        }
        let tail = index.split_off_from(&nodes, 3);
        assert_eq!(index.ids().collect::<Vec<_>>(), vec![ids[0]]);
        assert_eq!(tail.ids().collect::<Vec<_>>(), vec![ids[1], ids[2]]);
    }
}
