//! Undo/redo history of table edits
//!
//! A record keeps snapshots of the node range an edit touched, taken before
//! and after it ran, together with the redline table on both sides. Undo
//! puts the "before" range back in place of the "after" range, redo does
//! the reverse. The box bookkeeping (`save_new_boxes`, `renew_boxes`,
//! `save_formula`) is filled in by the operations while they run.

use crate::{EditError, Result};
use chrono::{DateTime, Utc};
use doc_model::{BoxId, RangeSnapshot};
use revisions::RedlineTable;
use serde::{Deserialize, Serialize};

/// What a record undoes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UndoKind {
    InsertTable,
    DeleteTable,
    InsertColumns,
    InsertRows,
    DeleteRowCol,
    SplitTable,
    MergeTables,
    SplitCells,
    MergeCells,
    TextToTable,
    TableToText,
    SetColumnWidths,
    SetBoxText,
}

impl UndoKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            UndoKind::InsertTable => "Insert Table",
            UndoKind::DeleteTable => "Delete Table",
            UndoKind::InsertColumns => "Insert Columns",
            UndoKind::InsertRows => "Insert Rows",
            UndoKind::DeleteRowCol => "Delete Rows/Columns",
            UndoKind::SplitTable => "Split Table",
            UndoKind::MergeTables => "Merge Tables",
            UndoKind::SplitCells => "Split Cells",
            UndoKind::MergeCells => "Merge Cells",
            UndoKind::TextToTable => "Convert Text to Table",
            UndoKind::TableToText => "Convert Table to Text",
            UndoKind::SetColumnWidths => "Column Widths",
            UndoKind::SetBoxText => "Typing",
        }
    }
}

/// Inverse of one table edit
#[derive(Debug, Clone)]
pub struct TableUndo {
    kind: UndoKind,
    before: RangeSnapshot,
    after: Option<RangeSnapshot>,
    redlines_before: RedlineTable,
    redlines_after: Option<RedlineTable>,
    /// Leaf boxes of the touched tables before the edit
    old_boxes: Vec<BoxId>,
    new_boxes: Vec<BoxId>,
    removed_boxes: Vec<BoxId>,
    /// Formulas in their external form, as they were before the edit
    formulas: Vec<(BoxId, String)>,
    timestamp: DateTime<Utc>,
}

impl TableUndo {
    pub fn new(kind: UndoKind, before: RangeSnapshot, redlines: RedlineTable, old_boxes: Vec<BoxId>) -> Self {
        Self {
            kind,
            before,
            after: None,
            redlines_before: redlines,
            redlines_after: None,
            old_boxes,
            new_boxes: Vec::new(),
            removed_boxes: Vec::new(),
            formulas: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> UndoKind {
        self.kind
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn before(&self) -> &RangeSnapshot {
        &self.before
    }

    /// The range after the edit; `None` until the edit finished
    pub fn after(&self) -> Option<&RangeSnapshot> {
        self.after.as_ref()
    }

    pub fn redlines_before(&self) -> &RedlineTable {
        &self.redlines_before
    }

    pub fn redlines_after(&self) -> Option<&RedlineTable> {
        self.redlines_after.as_ref()
    }

    pub(crate) fn finish(&mut self, after: RangeSnapshot, redlines: RedlineTable) {
        self.after = Some(after);
        self.redlines_after = Some(redlines);
    }

    pub fn is_finished(&self) -> bool {
        self.after.is_some()
    }

    // =========================================================================
    // Box bookkeeping
    // =========================================================================

    /// Note which of `leaves` the edit created
    pub fn save_new_boxes(&mut self, leaves: &[BoxId]) {
        for leaf in leaves {
            if !self.old_boxes.contains(leaf) && !self.new_boxes.contains(leaf) {
                self.new_boxes.push(*leaf);
            }
        }
    }

    /// Note boxes the edit is about to delete
    pub fn renew_boxes(&mut self, removed: &[BoxId]) {
        for b in removed {
            if !self.removed_boxes.contains(b) {
                self.removed_boxes.push(*b);
            }
        }
    }

    /// Keep the external form of a formula that is about to be re-anchored.
    /// Only the first form seen for a box is kept.
    pub fn save_formula(&mut self, id: BoxId, formula: &str) {
        if !self.formulas.iter().any(|(b, _)| *b == id) {
            self.formulas.push((id, formula.to_string()));
        }
    }

    pub fn old_boxes(&self) -> &[BoxId] {
        &self.old_boxes
    }

    pub fn new_boxes(&self) -> &[BoxId] {
        &self.new_boxes
    }

    pub fn removed_boxes(&self) -> &[BoxId] {
        &self.removed_boxes
    }

    pub fn formulas(&self) -> &[(BoxId, String)] {
        &self.formulas
    }

    /// Leaf boxes the touched range holds once the edit is (re)done
    pub fn expected_boxes(&self) -> Vec<BoxId> {
        self.old_boxes
            .iter()
            .filter(|b| !self.removed_boxes.contains(b))
            .chain(self.new_boxes.iter())
            .copied()
            .collect()
    }
}

/// Manages undo and redo stacks
#[derive(Debug)]
pub struct UndoManager {
    undo_stack: Vec<TableUndo>,
    redo_stack: Vec<TableUndo>,
    max_entries: usize,
    /// Nesting depth of scopes that suppress recording
    disabled: u32,
}

impl UndoManager {
    pub fn new() -> Self {
        Self::with_limit(100)
    }

    pub fn with_limit(max_entries: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_entries: max_entries.max(1),
            disabled: 0,
        }
    }

    /// Whether edits are recorded right now
    pub fn does_undo(&self) -> bool {
        self.disabled == 0
    }

    pub(crate) fn disable(&mut self) {
        self.disabled += 1;
    }

    pub(crate) fn enable(&mut self) {
        debug_assert!(self.disabled > 0, "unbalanced undo enable");
        self.disabled = self.disabled.saturating_sub(1);
    }

    /// Record a finished edit; clears the redo stack
    pub fn push(&mut self, entry: TableUndo) {
        debug_assert!(entry.is_finished(), "unfinished undo record");
        self.redo_stack.clear();
        self.push_undo(entry);
    }

    fn push_undo(&mut self, entry: TableUndo) {
        self.undo_stack.push(entry);
        while self.undo_stack.len() > self.max_entries {
            self.undo_stack.remove(0);
        }
    }

    /// Take the last record for undo
    pub fn pop_undo(&mut self) -> Result<TableUndo> {
        self.undo_stack.pop().ok_or(EditError::UndoStackEmpty)
    }

    /// Take the last undone record for redo
    pub fn pop_redo(&mut self) -> Result<TableUndo> {
        self.redo_stack.pop().ok_or(EditError::RedoStackEmpty)
    }

    /// Park a record that was just undone
    pub(crate) fn push_undone(&mut self, entry: TableUndo) {
        self.redo_stack.push(entry);
    }

    /// Return a record that was just redone, keeping the redo stack
    pub(crate) fn push_redone(&mut self, entry: TableUndo) {
        self.push_undo(entry);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Most recent record
    pub fn last(&self) -> Option<&TableUndo> {
        self.undo_stack.last()
    }

    /// Names of the undoable edits, most recent first
    pub fn undo_names(&self) -> Vec<&'static str> {
        self.undo_stack.iter().rev().map(|e| e.kind.display_name()).collect()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::Document;

    fn record(kind: UndoKind) -> TableUndo {
        let doc = Document::new();
        let snapshot = doc.snapshot_range(1, 2).unwrap();
        let mut entry = TableUndo::new(kind, snapshot.clone(), RedlineTable::new(), Vec::new());
        entry.finish(snapshot, RedlineTable::new());
        entry
    }

    #[test]
    fn test_push_clears_redo() {
        let mut manager = UndoManager::new();
        manager.push(record(UndoKind::InsertTable));
        let entry = manager.pop_undo().unwrap();
        manager.push_undone(entry);
        assert!(manager.can_redo());
        manager.push(record(UndoKind::InsertRows));
        assert!(!manager.can_redo());
        assert_eq!(manager.undo_names(), vec!["Insert Rows"]);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut manager = UndoManager::with_limit(2);
        manager.push(record(UndoKind::InsertTable));
        manager.push(record(UndoKind::InsertRows));
        manager.push(record(UndoKind::InsertColumns));
        assert_eq!(manager.undo_count(), 2);
        assert_eq!(manager.undo_names(), vec!["Insert Columns", "Insert Rows"]);
    }

    #[test]
    fn test_empty_stacks() {
        let mut manager = UndoManager::new();
        assert!(matches!(manager.pop_undo(), Err(EditError::UndoStackEmpty)));
        assert!(matches!(manager.pop_redo(), Err(EditError::RedoStackEmpty)));
    }

    #[test]
    fn test_disable_nests() {
        let mut manager = UndoManager::new();
        manager.disable();
        manager.disable();
        manager.enable();
        assert!(!manager.does_undo());
        manager.enable();
        assert!(manager.does_undo());
    }

    #[test]
    fn test_box_bookkeeping() {
        let doc = Document::new();
        let snapshot = doc.snapshot_range(1, 2).unwrap();
        let (a, b, c) = (BoxId::new(), BoxId::new(), BoxId::new());
        let mut entry = TableUndo::new(UndoKind::DeleteRowCol, snapshot, RedlineTable::new(), vec![a, b]);
        entry.renew_boxes(&[b]);
        entry.save_new_boxes(&[a, c]);
        entry.save_formula(a, "<A1>+1");
        entry.save_formula(a, "<B1>");
        assert_eq!(entry.new_boxes(), &[c]);
        assert_eq!(entry.expected_boxes(), vec![a, c]);
        assert_eq!(entry.formulas(), &[(a, "<A1>+1".to_string())]);
    }
}
