//! Redline model - tracked changes bound to node ranges

use chrono::{DateTime, Utc};
use doc_model::{NodeArray, NodeId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a redline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionId(pub Uuid);

impl RevisionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RevisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inclusive range of nodes, first to last
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedlineRange {
    pub first: NodeId,
    pub last: NodeId,
}

impl RedlineRange {
    pub fn new(first: NodeId, last: NodeId) -> Self {
        Self { first, last }
    }

    /// A range covering a single node
    pub fn single(node: NodeId) -> Self {
        Self { first: node, last: node }
    }

    /// Range covering node indices `start..=end`
    pub fn from_indices(nodes: &NodeArray, start: usize, end: usize) -> Option<Self> {
        Some(Self {
            first: nodes.at(start)?,
            last: nodes.at(end)?,
        })
    }

    /// Current indices of the range, or `None` once a bound node is gone
    pub fn indices(&self, nodes: &NodeArray) -> Option<(usize, usize)> {
        let a = nodes.index_of(self.first)?;
        let b = nodes.index_of(self.last)?;
        Some((a.min(b), a.max(b)))
    }

    /// Whether the range shares a node with `start..=end`
    pub fn overlaps(&self, nodes: &NodeArray, start: usize, end: usize) -> bool {
        self.indices(nodes).is_some_and(|(a, b)| a <= end && start <= b)
    }

    /// Whether the range lies entirely inside `start..=end`
    pub fn is_inside(&self, nodes: &NodeArray, start: usize, end: usize) -> bool {
        self.indices(nodes).is_some_and(|(a, b)| start <= a && b <= end)
    }
}

/// What a redline records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedlineKind {
    Insert,
    Delete,
    Format,
}

impl RedlineKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            RedlineKind::Insert => "Inserted",
            RedlineKind::Delete => "Deleted",
            RedlineKind::Format => "Formatted",
        }
    }
}

/// Current state of a redline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RevisionStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

/// A single tracked change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redline {
    pub id: RevisionId,
    pub kind: RedlineKind,
    pub range: RedlineRange,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub status: RevisionStatus,
    pub comment: Option<String>,
}

impl Redline {
    pub fn new(kind: RedlineKind, author: impl Into<String>, range: RedlineRange) -> Self {
        Self {
            id: RevisionId::new(),
            kind,
            range,
            author: author.into(),
            timestamp: Utc::now(),
            status: RevisionStatus::Pending,
            comment: None,
        }
    }

    pub fn insert(author: impl Into<String>, range: RedlineRange) -> Self {
        Self::new(RedlineKind::Insert, author, range)
    }

    pub fn delete(author: impl Into<String>, range: RedlineRange) -> Self {
        Self::new(RedlineKind::Delete, author, range)
    }

    pub fn is_pending(&self) -> bool {
        self.status == RevisionStatus::Pending
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set a specific timestamp (useful for testing)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
