//! Recording helpers used by structural edits
//!
//! An edit describes the node range it produced or is about to remove; the
//! helpers record a redline for it only while tracking is on.

use crate::{RedlineKind, RedlineRange, RedlineTable, Result, RevisionId, RevisionStatus};
use doc_model::NodeArray;
use serde::{Deserialize, Serialize};

/// A tracked change over a node range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedRange {
    pub kind: RedlineKind,
    pub range: RedlineRange,
    /// Redline id, once recorded
    pub revision_id: Option<RevisionId>,
}

impl TrackedRange {
    pub fn insert(range: RedlineRange) -> Self {
        Self {
            kind: RedlineKind::Insert,
            range,
            revision_id: None,
        }
    }

    pub fn delete(range: RedlineRange) -> Self {
        Self {
            kind: RedlineKind::Delete,
            range,
            revision_id: None,
        }
    }

    /// Tracked change over node indices `start..=end`
    pub fn from_indices(kind: RedlineKind, nodes: &NodeArray, start: usize, end: usize) -> Option<Self> {
        Some(Self {
            kind,
            range: RedlineRange::from_indices(nodes, start, end)?,
            revision_id: None,
        })
    }

    /// Record the change; a no-op while tracking is off
    pub fn record(&mut self, table: &mut RedlineTable) -> Result<()> {
        if !table.is_tracking() {
            return Ok(());
        }
        self.revision_id = Some(table.append_redline(self.kind, self.range)?);
        Ok(())
    }
}

/// Counts of the redlines in a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedlineSummary {
    pub total: usize,
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub insertions: usize,
    pub deletions: usize,
    pub format_changes: usize,
    /// Unique authors, sorted
    pub authors: Vec<String>,
}

impl RedlineSummary {
    pub fn from_table(table: &RedlineTable) -> Self {
        let mut summary = Self::default();
        for redline in table.all() {
            summary.total += 1;
            match redline.status {
                RevisionStatus::Pending => summary.pending += 1,
                RevisionStatus::Accepted => summary.accepted += 1,
                RevisionStatus::Rejected => summary.rejected += 1,
            }
            match redline.kind {
                RedlineKind::Insert => summary.insertions += 1,
                RedlineKind::Delete => summary.deletions += 1,
                RedlineKind::Format => summary.format_changes += 1,
            }
            if !summary.authors.contains(&redline.author) {
                summary.authors.push(redline.author.clone());
            }
        }
        summary.authors.sort();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{Node, StyleId, TextNode};

    #[test]
    fn test_tracked_range_without_tracking() {
        let mut nodes = NodeArray::new();
        nodes
            .insert(0, Node::text(TextNode::new("a", StyleId::new("Standard"))))
            .unwrap();
        let mut table = RedlineTable::new();
        let mut change = TrackedRange::from_indices(RedlineKind::Insert, &nodes, 0, 0).unwrap();
        change.record(&mut table).unwrap();
        assert!(change.revision_id.is_none());
        assert!(table.is_empty());

        table.enable_tracking().unwrap();
        change.record(&mut table).unwrap();
        assert!(change.revision_id.is_some());
    }

    #[test]
    fn test_summary_counts() {
        let mut nodes = NodeArray::new();
        let id = nodes
            .insert(0, Node::text(TextNode::new("a", StyleId::new("Standard"))))
            .unwrap();
        let mut table = RedlineTable::with_author("Bo");
        table.enable_tracking().unwrap();
        let first = table.append_redline(RedlineKind::Insert, RedlineRange::single(id)).unwrap();
        table.append_redline(RedlineKind::Delete, RedlineRange::single(id)).unwrap();
        table.accept(first).unwrap();

        let summary = RedlineSummary::from_table(&table);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.deletions, 1);
        assert_eq!(summary.authors, vec!["Bo".to_string()]);
    }
}
