//! Redline table - all tracked changes of a document

use crate::{Redline, RedlineKind, RedlineRange, Result, RevisionError, RevisionId, RevisionStatus};
use doc_model::NodeArray;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tracking switch plus the redlines recorded so far
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedlineTable {
    /// Whether tracking is currently enabled
    pub tracking_enabled: bool,
    redlines: HashMap<RevisionId, Redline>,
    /// Redlines in recording order
    order: Vec<RevisionId>,
    /// Author of new redlines
    pub current_author: String,
    /// Prevent changes to the tracking switch
    pub tracking_locked: bool,
}

impl Default for RedlineTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RedlineTable {
    pub fn new() -> Self {
        Self {
            tracking_enabled: false,
            redlines: HashMap::new(),
            order: Vec::new(),
            current_author: "Unknown".to_string(),
            tracking_locked: false,
        }
    }

    pub fn with_author(author: impl Into<String>) -> Self {
        let mut table = Self::new();
        table.current_author = author.into();
        table
    }

    // =========================================================================
    // Tracking Control
    // =========================================================================

    pub fn enable_tracking(&mut self) -> Result<()> {
        self.set_tracking(true)
    }

    pub fn disable_tracking(&mut self) -> Result<()> {
        self.set_tracking(false)
    }

    fn set_tracking(&mut self, on: bool) -> Result<()> {
        if self.tracking_locked {
            return Err(RevisionError::InvalidOperation("Tracking is locked".to_string()));
        }
        self.tracking_enabled = on;
        Ok(())
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking_enabled
    }

    pub fn lock_tracking(&mut self) {
        self.tracking_locked = true;
    }

    pub fn unlock_tracking(&mut self) {
        self.tracking_locked = false;
    }

    pub fn set_current_author(&mut self, author: impl Into<String>) -> Result<()> {
        let author = author.into();
        if author.trim().is_empty() {
            return Err(RevisionError::InvalidAuthor(
                "Author name cannot be empty".to_string(),
            ));
        }
        self.current_author = author;
        Ok(())
    }

    pub fn current_author(&self) -> &str {
        &self.current_author
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Append a redline over a node range
    pub fn append_redline(&mut self, kind: RedlineKind, range: RedlineRange) -> Result<RevisionId> {
        if !self.tracking_enabled {
            return Err(RevisionError::TrackingDisabled);
        }
        let redline = Redline::new(kind, &self.current_author, range);
        let id = redline.id;
        tracing::debug!("redline {} {} recorded", id, kind.display_name());
        self.add(redline);
        Ok(id)
    }

    /// Add a redline regardless of the tracking switch (loading, undo)
    pub fn add(&mut self, redline: Redline) {
        self.order.push(redline.id);
        self.redlines.insert(redline.id, redline);
    }

    /// Drop a redline entirely
    pub fn remove(&mut self, id: RevisionId) -> Option<Redline> {
        self.order.retain(|r| *r != id);
        self.redlines.remove(&id)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, id: RevisionId) -> Option<&Redline> {
        self.redlines.get(&id)
    }

    /// Redlines in recording order
    pub fn all(&self) -> impl Iterator<Item = &Redline> {
        self.order.iter().filter_map(|id| self.redlines.get(id))
    }

    pub fn pending(&self) -> impl Iterator<Item = &Redline> {
        self.all().filter(|r| r.is_pending())
    }

    pub fn len(&self) -> usize {
        self.redlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redlines.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Pending redlines sharing a node with `start..=end`
    pub fn overlapping(&self, nodes: &NodeArray, start: usize, end: usize) -> Vec<RevisionId> {
        self.pending()
            .filter(|r| r.range.overlaps(nodes, start, end))
            .map(|r| r.id)
            .collect()
    }

    /// Pending redlines lying entirely inside `start..=end`
    pub fn inside(&self, nodes: &NodeArray, start: usize, end: usize) -> Vec<RevisionId> {
        self.pending()
            .filter(|r| r.range.is_inside(nodes, start, end))
            .map(|r| r.id)
            .collect()
    }

    // =========================================================================
    // Accept/Reject
    // =========================================================================

    pub fn accept(&mut self, id: RevisionId) -> Result<()> {
        self.finish(id, RevisionStatus::Accepted)
    }

    pub fn reject(&mut self, id: RevisionId) -> Result<()> {
        self.finish(id, RevisionStatus::Rejected)
    }

    fn finish(&mut self, id: RevisionId, status: RevisionStatus) -> Result<()> {
        let redline = self
            .redlines
            .get_mut(&id)
            .ok_or(RevisionError::RevisionNotFound(id.as_uuid()))?;
        if !redline.is_pending() {
            return Err(RevisionError::RevisionAlreadyProcessed(id.as_uuid()));
        }
        redline.status = status;
        Ok(())
    }

    /// Accept every pending redline inside `start..=end`; redlines that
    /// straddle a bound are split so only the part inside is accepted.
    pub fn accept_in_range(&mut self, nodes: &NodeArray, start: usize, end: usize) -> Vec<RevisionId> {
        let mut accepted = Vec::new();
        for id in self.overlapping(nodes, start, end) {
            let Some(redline) = self.redlines.get(&id).cloned() else {
                continue;
            };
            let Some((a, b)) = redline.range.indices(nodes) else {
                continue;
            };
            if start <= a && b <= end {
                if self.accept(id).is_ok() {
                    accepted.push(id);
                }
                continue;
            }
            // Keep the outside parts pending, accept the middle
            let inner = RedlineRange::from_indices(nodes, a.max(start), b.min(end));
            let before = (a < start).then(|| RedlineRange::from_indices(nodes, a, start - 1)).flatten();
            let after = (b > end).then(|| RedlineRange::from_indices(nodes, end + 1, b)).flatten();
            let Some(inner) = inner else { continue };

            if let Some(r) = self.redlines.get_mut(&id) {
                r.range = inner;
                r.status = RevisionStatus::Accepted;
                accepted.push(id);
            }
            for outside in [before, after].into_iter().flatten() {
                let mut part = redline.clone();
                part.id = RevisionId::new();
                part.range = outside;
                self.add(part);
            }
            tracing::debug!("redline {} split at accepted range", id);
        }
        accepted
    }

    /// Drop redlines whose nodes left the document
    pub fn drop_dangling(&mut self, nodes: &NodeArray) -> usize {
        let dangling: Vec<RevisionId> = self
            .all()
            .filter(|r| r.range.indices(nodes).is_none())
            .map(|r| r.id)
            .collect();
        for id in &dangling {
            self.remove(*id);
        }
        dangling.len()
    }

    /// Remove accepted and rejected redlines
    pub fn clear_processed(&mut self) {
        self.redlines.retain(|_, r| r.is_pending());
        let redlines = &self.redlines;
        self.order.retain(|id| redlines.contains_key(id));
    }
}
