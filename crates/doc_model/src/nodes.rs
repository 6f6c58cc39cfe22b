//! The flat node array holding the document body in reading order

use crate::{DocModelError, Node, NodeId, NodeKind, Result, StartKind, TextNode};
use std::collections::HashMap;

/// Ordered node storage with O(1) id -> index lookup
#[derive(Debug, Clone, Default)]
pub struct NodeArray {
    order: Vec<NodeId>,
    nodes: HashMap<NodeId, Node>,
    positions: HashMap<NodeId, usize>,
}

impl NodeArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Index of a node in reading order
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn try_index_of(&self, id: NodeId) -> Result<usize> {
        self.index_of(id).ok_or(DocModelError::NodeNotFound(id))
    }

    /// Id of the node at an index
    pub fn at(&self, index: usize) -> Option<NodeId> {
        self.order.get(index).copied()
    }

    pub fn node_at(&self, index: usize) -> Option<&Node> {
        self.at(index).and_then(|id| self.nodes.get(&id))
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.order
    }

    pub fn text(&self, id: NodeId) -> Option<&TextNode> {
        self.nodes.get(&id).and_then(Node::as_text)
    }

    pub fn text_mut(&mut self, id: NodeId) -> Option<&mut TextNode> {
        self.nodes.get_mut(&id).and_then(Node::as_text_mut)
    }

    /// Insert a node before `index` (`index == len` appends)
    pub fn insert(&mut self, index: usize, node: Node) -> Result<NodeId> {
        if index > self.order.len() {
            return Err(DocModelError::InvalidIndex(index));
        }
        let id = node.id();
        self.order.insert(index, id);
        self.nodes.insert(id, node);
        self.reindex_from(index);
        Ok(id)
    }

    /// Insert a run of nodes before `index`, keeping their order
    pub fn insert_many(&mut self, index: usize, nodes: Vec<Node>) -> Result<()> {
        if index > self.order.len() {
            return Err(DocModelError::InvalidIndex(index));
        }
        let ids: Vec<NodeId> = nodes.iter().map(Node::id).collect();
        self.order.splice(index..index, ids);
        for node in nodes {
            self.nodes.insert(node.id(), node);
        }
        self.reindex_from(index);
        Ok(())
    }

    /// Remove the nodes in `start..end` and return them in order
    pub fn remove_range(&mut self, start: usize, end: usize) -> Vec<Node> {
        let end = end.min(self.order.len());
        if start >= end {
            return Vec::new();
        }
        let removed: Vec<NodeId> = self.order.drain(start..end).collect();
        let mut out = Vec::with_capacity(removed.len());
        for id in removed {
            self.positions.remove(&id);
            if let Some(node) = self.nodes.remove(&id) {
                out.push(node);
            }
        }
        self.reindex_from(start);
        out
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let index = self.index_of(id)?;
        self.remove_range(index, index + 1).pop()
    }

    /// Move the nodes in `start..end` so they begin at `dest` (an index in
    /// the array as it is before the move)
    pub fn move_range(&mut self, start: usize, end: usize, dest: usize) -> Result<()> {
        if dest >= start && dest <= end {
            return Ok(());
        }
        let count = end - start;
        let nodes = self.remove_range(start, end);
        let dest = if dest > end { dest - count } else { dest };
        self.insert_many(dest, nodes)
    }

    fn reindex_from(&mut self, index: usize) {
        for (i, id) in self.order.iter().enumerate().skip(index) {
            self.positions.insert(*id, i);
        }
    }

    /// Matching end node of a start node
    pub fn end_of_section(&self, start: NodeId) -> Option<NodeId> {
        match &self.nodes.get(&start)?.kind {
            NodeKind::Start { end, .. } => Some(*end),
            _ => None,
        }
    }

    /// Indices of a section's start and end node
    pub fn section_indices(&self, start: NodeId) -> Result<(usize, usize)> {
        let end = self
            .end_of_section(start)
            .ok_or_else(|| DocModelError::TreeStructureError(format!("{} is not a start node", start)))?;
        Ok((self.try_index_of(start)?, self.try_index_of(end)?))
    }

    /// Innermost start node enclosing `index` whose kind matches `pred`.
    ///
    /// A start node at `index` itself does not enclose it.
    pub fn enclosing_start(&self, index: usize, pred: impl Fn(&StartKind) -> bool) -> Option<NodeId> {
        let mut depth = 0usize;
        for i in (0..index.min(self.order.len())).rev() {
            let id = self.order[i];
            match &self.nodes[&id].kind {
                NodeKind::End { .. } => depth += 1,
                NodeKind::Start { kind, .. } => {
                    if depth == 0 {
                        if pred(kind) {
                            return Some(id);
                        }
                    } else {
                        depth -= 1;
                    }
                }
                NodeKind::Text(_) => {}
            }
        }
        None
    }

    /// Table node enclosing the node at `index`
    pub fn find_table_node(&self, index: usize) -> Option<NodeId> {
        self.enclosing_start(index, |k| matches!(k, StartKind::Table))
    }

    pub fn is_in_footnote(&self, index: usize) -> bool {
        self.enclosing_start(index, |k| matches!(k, StartKind::Footnote)).is_some()
    }

    /// Text nodes in `start..end`
    pub fn text_ids_in(&self, start: usize, end: usize) -> Vec<NodeId> {
        let end = end.min(self.order.len());
        self.order[start.min(end)..end]
            .iter()
            .copied()
            .filter(|id| self.nodes[id].is_text())
            .collect()
    }

    /// Next text node at or after `index`
    pub fn next_text(&self, index: usize) -> Option<NodeId> {
        self.order
            .iter()
            .skip(index)
            .copied()
            .find(|id| self.nodes[id].is_text())
    }

    /// Previous text node strictly before `index`
    pub fn prev_text(&self, index: usize) -> Option<NodeId> {
        self.order[..index.min(self.order.len())]
            .iter()
            .rev()
            .copied()
            .find(|id| self.nodes[id].is_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StyleId;

    fn para(text: &str) -> Node {
        Node::text(TextNode::new(text, StyleId::new("Standard")))
    }

    #[test]
    fn test_insert_keeps_positions() {
        let mut nodes = NodeArray::new();
        let a = nodes.insert(0, para("a")).unwrap();
        let c = nodes.insert(1, para("c")).unwrap();
        let b = nodes.insert(1, para("b")).unwrap();
        assert_eq!(nodes.index_of(a), Some(0));
        assert_eq!(nodes.index_of(b), Some(1));
        assert_eq!(nodes.index_of(c), Some(2));
        assert!(nodes.insert(9, para("x")).is_err());
    }

    #[test]
    fn test_enclosing_start_skips_closed_sections() {
        let mut nodes = NodeArray::new();
        let (ts, te) = Node::section(StartKind::Table);
        let table = ts.id();
        let (fs, fe) = Node::section(StartKind::Footnote);
        nodes.insert_many(0, vec![ts, para("in table"), te, fs, para("note"), fe, para("after")]).unwrap();
        assert_eq!(nodes.find_table_node(1), Some(table));
        assert_eq!(nodes.find_table_node(4), None);
        assert!(nodes.is_in_footnote(4));
        assert!(!nodes.is_in_footnote(6));
    }

    #[test]
    fn test_move_range_forward_and_back() {
        let mut nodes = NodeArray::new();
        let ids: Vec<NodeId> = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, t)| nodes.insert(i, para(t)).unwrap())
            .collect();
        nodes.move_range(0, 2, 4).unwrap();
        assert_eq!(nodes.ids(), &[ids[2], ids[3], ids[0], ids[1]]);
        nodes.move_range(2, 4, 0).unwrap();
        assert_eq!(nodes.ids(), ids.as_slice());
    }
}
