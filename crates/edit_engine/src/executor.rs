//! The editing engine
//!
//! [`EditingEngine`] bundles the document with the services table edits
//! need: redline table, frame layout, undo history and number formatter.
//! Every structural table operation runs through [`EditingEngine::run_recorded`],
//! which snapshots the touched node range, runs the edit with undo
//! recording suppressed, syncs the layout and finally appends the undo
//! record. A failing edit puts the snapshot back.

use crate::{
    recognize_content, Command, CommandOutcome, EditError, LocaleNumberFormatter, NumberFormatter,
    Recognized, Refusal, Result, TableUndo, UndoDisabled, UndoKind, UndoManager,
};
use doc_model::{
    BoxId, BoxSelection, ChangeNotice, Document, NodeId, PoolStyle, RangeSnapshot, StyleId, Twips,
};
use layout_engine::{FrameLayout, LayoutConfig};
use revisions::RedlineTable;

/// The main editing engine: document state plus the services edits use
#[derive(Debug)]
pub struct EditingEngine {
    pub(crate) doc: Document,
    pub(crate) redlines: RedlineTable,
    pub(crate) layout: FrameLayout,
    pub(crate) undo: UndoManager,
    pub(crate) number_formatter: Box<dyn NumberFormatter>,
    selection: BoxSelection,
    /// Undo record of the edit that is running right now
    pub(crate) pending: Option<TableUndo>,
}

impl EditingEngine {
    /// Create a new editing engine with an empty document
    pub fn new() -> Self {
        let doc = Document::new();
        let config = LayoutConfig::from_settings(&doc.settings);
        let layout = match FrameLayout::build(&doc, config.clone()) {
            Ok(layout) => layout,
            Err(e) => {
                tracing::warn!("layout of empty document failed: {}", e);
                FrameLayout::new(config)
            }
        };
        Self::assemble(doc, layout)
    }

    /// Create an editing engine for an existing document
    pub fn with_document(doc: Document) -> Result<Self> {
        let layout = FrameLayout::build(&doc, LayoutConfig::from_settings(&doc.settings))?;
        Ok(Self::assemble(doc, layout))
    }

    fn assemble(doc: Document, layout: FrameLayout) -> Self {
        let undo = UndoManager::with_limit(doc.settings.max_undo_entries);
        Self {
            doc,
            redlines: RedlineTable::new(),
            layout,
            undo,
            number_formatter: Box::new(LocaleNumberFormatter::default()),
            selection: BoxSelection::new(),
            pending: None,
        }
    }

    /// Use another number formatter for content recognition
    pub fn with_number_formatter(mut self, formatter: Box<dyn NumberFormatter>) -> Self {
        self.number_formatter = formatter;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Direct access to the document. Changes made here bypass undo and
    /// the layout; call [`EditingEngine::relayout`] afterwards.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Lay the whole document out from scratch. A flow listener has to be
    /// set again afterwards.
    pub fn relayout(&mut self) -> Result<()> {
        self.doc.take_notices();
        self.layout = FrameLayout::build(&self.doc, LayoutConfig::from_settings(&self.doc.settings))?;
        Ok(())
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut FrameLayout {
        &mut self.layout
    }

    pub fn redlines(&self) -> &RedlineTable {
        &self.redlines
    }

    pub fn redlines_mut(&mut self) -> &mut RedlineTable {
        &mut self.redlines
    }

    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    pub fn selection(&self) -> &BoxSelection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: BoxSelection) {
        self.selection = selection;
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Execute a command
    pub fn execute(&mut self, command: &dyn Command) -> Result<CommandOutcome> {
        tracing::debug!("execute {}", command.display_name());
        command.execute(self)
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Run a structural edit over the node range `start..end`.
    ///
    /// The nodes right before and right after the range must survive the
    /// edit; whatever lies between them afterwards is the "after" state of
    /// the undo record.
    pub(crate) fn run_recorded<T>(
        &mut self,
        kind: UndoKind,
        start: usize,
        end: usize,
        op: impl FnOnce(&mut EditingEngine) -> Result<T>,
    ) -> Result<T> {
        if start == 0 {
            return Err(EditError::InvalidCommand("edit range starts at the document start".to_string()));
        }
        let prev = self
            .doc
            .nodes
            .at(start - 1)
            .ok_or(doc_model::DocModelError::InvalidIndex(start - 1))?;
        let before = self.doc.snapshot_range(start, end)?;
        let recording = self.undo.does_undo();
        if recording {
            let mut old_boxes = Vec::new();
            for table in before.table_nodes() {
                old_boxes.extend(self.doc.leaf_boxes(table)?);
            }
            self.pending = Some(TableUndo::new(kind, before.clone(), self.redlines.clone(), old_boxes));
        }

        let result = {
            let mut guard = UndoDisabled::new(self);
            op(&mut guard)
        };

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                if recording {
                    self.pending = None;
                }
                tracing::warn!("{} failed, restoring: {}", kind.display_name(), e);
                match self.current_range(prev, &before) {
                    Ok(current) => {
                        if let Err(restore) = self.replace_range(&current, &before) {
                            tracing::warn!("restoring after failed {} failed: {}", kind.display_name(), restore);
                        }
                    }
                    Err(lost) => tracing::warn!("edited range lost: {}", lost),
                }
                return Err(e);
            }
        };

        self.sync_notices();
        if let Err(e) = self.layout.format() {
            tracing::warn!("format after {} failed: {}", kind.display_name(), e);
        }
        let after = self.current_range(prev, &before)?;
        for table in after.table_nodes() {
            self.debug_check_table(table);
        }
        if recording {
            if let Some(mut entry) = self.pending.take() {
                entry.finish(after, self.redlines.clone());
                self.undo.push(entry);
            }
        }
        tracing::debug!("{} done", kind.display_name());
        Ok(value)
    }

    /// Snapshot of whatever now lies between `prev` and the node that
    /// followed the range of `before`
    fn current_range(&self, prev: NodeId, before: &RangeSnapshot) -> Result<RangeSnapshot> {
        let start = self.doc.nodes.try_index_of(prev)? + 1;
        let end = self.doc.nodes.try_index_of(before.next())?;
        Ok(self.doc.snapshot_range(start, end)?)
    }

    /// Swap the range `current` describes for `target`, frames included
    fn replace_range(&mut self, current: &RangeSnapshot, target: &RangeSnapshot) -> Result<()> {
        let stale: Vec<NodeId> = current.node_ids().chain(target.node_ids()).collect();
        self.layout.remove_node_frames(stale)?;
        self.doc.restore_range(current, target)?;
        self.doc.take_notices();
        let end = self.doc.nodes.try_index_of(target.next())?;
        let start = end - target.node_count();
        if start < end {
            self.layout.insert_frames_for_range(&self.doc, start, end)?;
        }
        self.layout.format()?;
        Ok(())
    }

    /// Undo the last table edit
    pub fn undo(&mut self) -> Result<()> {
        let entry = self.undo.pop_undo()?;
        let Some(after) = entry.after() else {
            return Err(EditError::InvalidCommand("undo record was never finished".to_string()));
        };
        if let Err(e) = self.replace_range(after, entry.before()) {
            tracing::warn!("undo of {} failed, dropping history: {}", entry.kind().display_name(), e);
            self.undo.clear();
            return Err(e);
        }
        self.redlines = entry.redlines_before().clone();
        self.prune_selection();
        tracing::debug!("undid {}", entry.kind().display_name());
        self.undo.push_undone(entry);
        Ok(())
    }

    /// Redo the last undone table edit
    pub fn redo(&mut self) -> Result<()> {
        let entry = self.undo.pop_redo()?;
        let (Some(after), Some(redlines)) = (entry.after(), entry.redlines_after()) else {
            return Err(EditError::InvalidCommand("undo record was never finished".to_string()));
        };
        if let Err(e) = self.replace_range(entry.before(), after) {
            tracing::warn!("redo of {} failed, dropping history: {}", entry.kind().display_name(), e);
            self.undo.clear();
            return Err(e);
        }
        self.redlines = redlines.clone();
        self.prune_selection();
        tracing::debug!("redid {}", entry.kind().display_name());
        self.undo.push_redone(entry);
        Ok(())
    }

    fn prune_selection(&mut self) {
        let boxes = &self.doc.boxes;
        self.selection = self.selection.ids().iter().copied().filter(|b| boxes.contains_key(b)).collect();
    }

    // =========================================================================
    // Layout sync
    // =========================================================================

    /// Turn pending format change notices into frame invalidation
    pub(crate) fn sync_notices(&mut self) {
        for notice in self.doc.take_notices() {
            let frame = match notice {
                ChangeNotice::TableFormat(table) => self.layout.frame_of(table),
                ChangeNotice::BoxFormat(b) => self.layout.cell_frame_of(b).ok(),
                ChangeNotice::LineFormat(line) => self
                    .doc
                    .line(line)
                    .ok()
                    .and_then(|l| l.boxes.first().copied())
                    .and_then(|b| self.doc.table_of_box(b).ok())
                    .and_then(|t| self.layout.frame_of(t)),
            };
            if let Some(frame) = frame {
                if let Err(e) = self.layout.invalidate_all(frame) {
                    tracing::warn!("invalidating {} failed: {}", frame, e);
                }
            }
        }
    }

    fn debug_check_table(&self, table: NodeId) {
        let checked = self.doc.check_table(table);
        debug_assert!(checked.is_ok(), "table {} broken: {:?}", table, checked);
        if let Err(e) = checked {
            tracing::warn!("table {} left inconsistent: {}", table, e);
        }
    }

    // =========================================================================
    // Helpers shared by the operations
    // =========================================================================

    /// The one table all selected boxes belong to
    pub(crate) fn table_of_selection(&self, boxes: &BoxSelection) -> Result<NodeId> {
        let mut found: Option<NodeId> = None;
        for b in boxes.ids() {
            let table = self.doc.table_of_box(*b)?;
            match found {
                Some(t) if t != table => return Err(Refusal::MixedTables.into()),
                _ => found = Some(table),
            }
        }
        found.ok_or_else(|| Refusal::NoSelection.into())
    }

    /// Refuse structural edits of linked tables
    pub(crate) fn ensure_editable(&self, table: NodeId) -> Result<()> {
        if self.doc.table(table)?.is_linked() {
            tracing::warn!("refusing to edit linked table {}", table);
            return Err(Refusal::DdeTable.into());
        }
        Ok(())
    }

    /// Node range `start..end` of a table, for recording
    pub(crate) fn table_span(&self, table: NodeId) -> Result<(usize, usize)> {
        let (start, end) = self.doc.table_range(table)?;
        Ok((start, end + 1))
    }

    pub(crate) fn table_style(&mut self) -> StyleId {
        self.doc.styles.get_or_create(PoolStyle::Table)
    }

    /// Record the leaf boxes of `table` the running edit created
    pub(crate) fn note_new_boxes(&mut self, table: NodeId) -> Result<()> {
        if self.pending.is_none() {
            return Ok(());
        }
        let leaves = self.doc.leaf_boxes(table)?;
        if let Some(pending) = self.pending.as_mut() {
            pending.save_new_boxes(&leaves);
        }
        Ok(())
    }

    pub(crate) fn note_removed_boxes(&mut self, removed: &[BoxId]) {
        if let Some(pending) = self.pending.as_mut() {
            pending.renew_boxes(removed);
        }
    }

    pub(crate) fn note_formula(&mut self, id: BoxId, formula: &str) {
        if let Some(pending) = self.pending.as_mut() {
            pending.save_formula(id, formula);
        }
    }

    /// "Table<n>" with the smallest n no table uses yet
    pub(crate) fn unique_table_name(&self) -> String {
        let names: Vec<&str> = self.doc.tables.values().map(|t| t.format.name.as_str()).collect();
        (1..)
            .map(|n| format!("Table{}", n))
            .find(|name| !names.contains(&name.as_str()))
            .unwrap_or_default()
    }

    /// Widest top-level line of a table
    pub(crate) fn table_content_width(&self, table: NodeId) -> Result<Twips> {
        let mut widest = 0;
        for line in &self.doc.table(table)?.lines {
            widest = widest.max(self.doc.line_width(*line)?);
        }
        Ok(widest)
    }

    /// Set the table format width to the widest line
    pub(crate) fn recalc_table_width(&mut self, table: NodeId) -> Result<()> {
        let width = self.table_content_width(table)?;
        if self.doc.table(table)?.format.width != width {
            self.doc.table_format_mut(table)?.width = width;
        }
        Ok(())
    }

    /// Re-run number recognition on a box after its content changed
    pub(crate) fn recognize_box(&mut self, id: BoxId) -> Result<()> {
        if !self.doc.settings.number_recognition {
            return Ok(());
        }
        let text = self.doc.box_text(id)?;
        let current = self.doc.table_box(id)?.format.as_ref().clone();
        let mut next = current.clone();
        match recognize_content(self.number_formatter.as_ref(), &text) {
            Recognized::Number { format, value } => {
                next.num_format = Some(format);
                next.value = Some(value);
                next.formula = None;
            }
            Recognized::Formula(formula) => {
                next.num_format = None;
                next.value = None;
                next.formula = Some(formula);
            }
            Recognized::Text => next.reset_value(),
        }
        if next != current {
            *self.doc.box_format_mut(id)? = next;
        }
        Ok(())
    }
}

impl Default for EditingEngine {
    fn default() -> Self {
        Self::new()
    }
}
