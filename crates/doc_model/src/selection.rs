//! Selection model - cursor positions, text ranges and box selections

use crate::{BoxId, NodeArray, NodeId};
use serde::{Deserialize, Serialize};

/// A position in the node array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// The node containing this position
    pub node_id: NodeId,
    /// Character offset within the node (in grapheme clusters)
    pub offset: usize,
}

impl Position {
    pub fn new(node_id: NodeId, offset: usize) -> Self {
        Self { node_id, offset }
    }

    /// Create a position at the start of a node
    pub fn start_of(node_id: NodeId) -> Self {
        Self { node_id, offset: 0 }
    }
}

/// A selection in the document
///
/// A selection has an anchor (where the selection started) and a focus
/// (where the caret is). When anchor == focus the selection is collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Position,
    pub focus: Position,
}

impl Selection {
    pub fn new(anchor: Position, focus: Position) -> Self {
        Self { anchor, focus }
    }

    /// Create a collapsed selection (caret only)
    pub fn collapsed(position: Position) -> Self {
        Self {
            anchor: position,
            focus: position,
        }
    }

    pub fn at_start_of(node_id: NodeId) -> Self {
        Self::collapsed(Position::start_of(node_id))
    }

    /// Selection spanning whole nodes from `first` to `last`
    pub fn nodes(first: NodeId, last: NodeId) -> Self {
        Self::new(Position::start_of(first), Position::new(last, usize::MAX))
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Start and end position in document order
    pub fn ordered(&self, nodes: &NodeArray) -> (Position, Position) {
        let a = nodes.index_of(self.anchor.node_id);
        let f = nodes.index_of(self.focus.node_id);
        let forward = match (a, f) {
            (Some(a), Some(f)) if a != f => a < f,
            _ => self.anchor.offset <= self.focus.offset,
        };
        if forward {
            (self.anchor, self.focus)
        } else {
            (self.focus, self.anchor)
        }
    }

    /// Node indices covered by the selection, inclusive
    pub fn index_range(&self, nodes: &NodeArray) -> Option<(usize, usize)> {
        let (start, end) = self.ordered(nodes);
        Some((nodes.index_of(start.node_id)?, nodes.index_of(end.node_id)?))
    }
}

/// A set of selected table boxes, in selection order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxSelection {
    boxes: Vec<BoxId>,
}

impl BoxSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a box; duplicates are ignored
    pub fn push(&mut self, id: BoxId) {
        if !self.boxes.contains(&id) {
            self.boxes.push(id);
        }
    }

    pub fn contains(&self, id: BoxId) -> bool {
        self.boxes.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn ids(&self) -> &[BoxId] {
        &self.boxes
    }

    /// Sort the boxes by the position of their content in the node array
    pub fn sort_by_position(&mut self, position: impl Fn(BoxId) -> usize) {
        self.boxes.sort_by_key(|b| position(*b));
    }
}

impl FromIterator<BoxId> for BoxSelection {
    fn from_iter<I: IntoIterator<Item = BoxId>>(iter: I) -> Self {
        let mut selection = BoxSelection::new();
        for id in iter {
            selection.push(id);
        }
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Node, StyleId, TextNode};

    #[test]
    fn test_ordered_follows_document_order() {
        let mut nodes = NodeArray::new();
        let a = nodes.insert(0, Node::text(TextNode::new("a", StyleId::new("Standard")))).unwrap();
        let b = nodes.insert(1, Node::text(TextNode::new("b", StyleId::new("Standard")))).unwrap();
        let sel = Selection::new(Position::new(b, 1), Position::new(a, 0));
        let (start, end) = sel.ordered(&nodes);
        assert_eq!(start.node_id, a);
        assert_eq!(end.node_id, b);
        assert_eq!(sel.index_range(&nodes), Some((0, 1)));
    }

    #[test]
    fn test_box_selection_dedups() {
        let id = BoxId::new();
        let sel: BoxSelection = [id, id, BoxId::new()].into_iter().collect();
        assert_eq!(sel.len(), 2);
        assert!(sel.contains(id));
    }
}
