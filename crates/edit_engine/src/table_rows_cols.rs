//! Inserting and deleting rows and columns
//!
//! Columns are located by position: the anchor is the left edge of the
//! leftmost selected box (or the right edge of the rightmost one when
//! inserting behind), and every top-level line gets its new boxes at that
//! edge. Formulas are switched to their internal form around every edit so
//! box references survive the renumbering.

use crate::{EditingEngine, LockModify, Refusal, Result, UndoKind};
use doc_model::{
    BoxFormat, BoxId, BoxSelection, LineId, NodeId, Twips, COVERED_ROW_SPAN, MAX_TABLE_NESTING_DEPTH,
};
use revisions::{RedlineKind, TrackedRange};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Widest table the engine lets columns grow to
pub const MAX_TABLE_WIDTH: Twips = u16::MAX as Twips;

/// Where a line takes the new boxes of a column insert
enum ColumnSlot {
    Insert { pos: usize, neighbour: BoxId },
    Widen(BoxId),
}

/// What `delete_rows_cols` removes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteMode {
    Rows,
    Columns,
}

impl EditingEngine {
    /// Box of a top-level line holding `id`
    pub(crate) fn top_box_of(&self, id: BoxId) -> Result<BoxId> {
        let mut current = id;
        for _ in 0..=MAX_TABLE_NESTING_DEPTH {
            let line = self.doc.table_box(current)?.upper;
            match self.doc.line(line)?.upper {
                Some(upper) => current = upper,
                None => return Ok(current),
            }
        }
        Err(doc_model::DocModelError::TreeStructureError(format!("nesting too deep above {}", id)).into())
    }

    fn leaves_under(&self, id: BoxId) -> Result<Vec<BoxId>> {
        let table_box = self.doc.table_box(id)?;
        Ok(if table_box.is_leaf() {
            vec![id]
        } else {
            self.doc.leaf_boxes_of(table_box.lines())
        })
    }

    /// Clear cached values and formulas, keeping boxes that shared a
    /// format on one shared copy
    fn reset_box_values(&mut self, boxes: &[BoxId]) -> Result<()> {
        let mut claimed: Vec<(Arc<BoxFormat>, Arc<BoxFormat>)> = Vec::new();
        for b in boxes {
            let current = Arc::clone(&self.doc.table_box(*b)?.format);
            if current.value.is_none() && current.formula.is_none() && current.num_format.is_none() {
                continue;
            }
            let format = match claimed.iter().find(|(old, _)| Arc::ptr_eq(old, &current)) {
                Some((_, new)) => Arc::clone(new),
                None => {
                    let mut fresh = current.as_ref().clone();
                    fresh.reset_value();
                    let fresh = Arc::new(fresh);
                    claimed.push((current, Arc::clone(&fresh)));
                    fresh
                }
            };
            self.doc.set_box_format(*b, format)?;
        }
        Ok(())
    }

    // =========================================================================
    // Columns
    // =========================================================================

    /// Insert `count` columns in front of or behind the selected boxes.
    ///
    /// New boxes copy the format of their neighbour without its cached
    /// value, all at the narrowest neighbour width. A merged box of a
    /// row-span table that lies across the insertion edge grows instead.
    /// A table growing wider than [`MAX_TABLE_WIDTH`] is scaled back to it.
    pub fn insert_columns(&mut self, boxes: &BoxSelection, count: usize, behind: bool) -> Result<Vec<BoxId>> {
        let table = self.table_of_selection(boxes)?;
        self.ensure_editable(table)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut edge: Option<Twips> = None;
        for b in boxes.ids() {
            let top = self.top_box_of(*b)?;
            let left = self.doc.box_left(top)?;
            let x = if behind {
                left + self.doc.table_box(top)?.width()
            } else {
                left
            };
            edge = Some(match edge {
                None => x,
                Some(e) if behind => e.max(x),
                Some(e) => e.min(x),
            });
        }
        let edge = edge.ok_or(Refusal::NoSelection)?;

        let (start, end) = self.table_span(table)?;
        self.run_recorded(UndoKind::InsertColumns, start, end, |e| {
            e.formulas_to_internal(table)?;
            let created = {
                let mut locked = LockModify::new(e, table)?;
                locked.insert_column_boxes(table, edge, count, behind)?
            };
            if e.table_content_width(table)? > MAX_TABLE_WIDTH {
                e.scale_table_widths(table, MAX_TABLE_WIDTH)?;
            } else {
                e.recalc_table_width(table)?;
            }
            if e.doc.table(table)?.new_model {
                e.doc.normalize_row_spans(table)?;
            }
            e.formulas_to_external(table)?;
            e.note_new_boxes(table)?;
            e.layout.rebuild_table_frames(&e.doc, table)?;
            tracing::debug!("inserted {} columns into {} at {}", count, table, edge);
            Ok(created)
        })
    }

    fn insert_column_boxes(&mut self, table: NodeId, edge: Twips, count: usize, behind: bool) -> Result<Vec<BoxId>> {
        let lines = self.doc.table(table)?.lines.clone();
        let table_style = self.table_style();
        let new_model = self.doc.table(table)?.new_model;

        // Row-span tables widen a merged box lying across `edge`
        let mut plan = Vec::with_capacity(lines.len());
        for line in lines {
            let boxes = self.doc.line(line)?.boxes.clone();
            if boxes.is_empty() {
                continue;
            }
            let positions = self.doc.line_positions(line)?;
            let slot = match positions.iter().position(|x| *x == edge) {
                Some(pos) => {
                    let neighbour = if (behind && pos > 0) || pos == boxes.len() {
                        boxes[pos - 1]
                    } else {
                        boxes[pos]
                    };
                    ColumnSlot::Insert { pos, neighbour }
                }
                None if positions.last().is_some_and(|last| edge > *last) => ColumnSlot::Insert {
                    pos: boxes.len(),
                    neighbour: boxes[boxes.len() - 1],
                },
                None => match self.doc.box_of_pos(line, edge)? {
                    Some(b) if new_model => ColumnSlot::Widen(b),
                    // Legacy lines keep their box counts equal
                    Some(b) => {
                        let i = self.doc.line(line)?.position_of(b).unwrap_or(boxes.len() - 1);
                        let pos = if behind { i + 1 } else { i };
                        ColumnSlot::Insert { pos, neighbour: b }
                    }
                    None => continue,
                },
            };
            plan.push((line, slot));
        }
        // Every new box gets the same width so the rows stay equally wide
        let mut each: Option<Twips> = None;
        for (_, slot) in &plan {
            if let ColumnSlot::Insert { neighbour, .. } = slot {
                let w = self.doc.table_box(*neighbour)?.width();
                each = Some(each.map_or(w, |e| e.min(w)));
            }
        }
        let Some(each) = each else {
            return Ok(Vec::new());
        };
        let added = each * count as Twips;

        let mut formats: Vec<(Arc<BoxFormat>, Arc<BoxFormat>)> = Vec::new();
        let mut widened = Vec::new();
        let mut created = Vec::new();
        for (line, slot) in plan {
            let (pos, neighbour) = match slot {
                ColumnSlot::Insert { pos, neighbour } => (pos, neighbour),
                ColumnSlot::Widen(b) => {
                    self.widen_across(b, edge, added, &mut widened)?;
                    continue;
                }
            };

            let current = Arc::clone(&self.doc.table_box(neighbour)?.format);
            let format = match formats.iter().find(|(old, _)| Arc::ptr_eq(old, &current)) {
                Some((_, new)) => Arc::clone(new),
                None => {
                    let mut fresh = current.as_ref().clone();
                    fresh.reset_value();
                    fresh.width = each;
                    let fresh = Arc::new(fresh);
                    formats.push((current, Arc::clone(&fresh)));
                    fresh
                }
            };
            let leaf = self.doc.first_leaf(neighbour)?;
            let style = self
                .doc
                .box_paragraphs(leaf)?
                .first()
                .and_then(|p| self.doc.nodes.text(*p))
                .map(|t| t.style.clone())
                .unwrap_or_else(|| table_style.clone());
            created.extend(self.doc.ins_boxen(table, line, format, &style, pos, count)?);
        }
        self.set_box_widths(&widened)?;
        Ok(created)
    }

    /// Collect width changes that grow `id` by `extra` where it crosses
    /// `edge`, together with the box crossing it in every nested line
    fn widen_across(&self, id: BoxId, edge: Twips, extra: Twips, out: &mut Vec<(BoxId, Twips)>) -> Result<()> {
        let mut pending = vec![id];
        while let Some(b) = pending.pop() {
            let table_box = self.doc.table_box(b)?;
            out.push((b, table_box.width() + extra));
            for line in table_box.lines() {
                let positions = self.doc.line_positions(*line)?;
                let boxes = &self.doc.line(*line)?.boxes;
                // A nested boundary at the edge gets the extra width on its left box
                let inner = match positions.iter().position(|x| *x == edge) {
                    Some(i) if i > 0 => boxes.get(i - 1).copied(),
                    Some(_) => boxes.first().copied(),
                    None => self.doc.box_of_pos(*line, edge)?,
                };
                pending.extend(inner);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Rows
    // =========================================================================

    /// Insert `count` empty rows in front of or behind the selected rows.
    ///
    /// The new rows copy the structure and formats of the row next to
    /// them. In row-span tables a new row that lands inside a span is
    /// covered by it.
    pub fn insert_rows(&mut self, boxes: &BoxSelection, count: usize, behind: bool) -> Result<Vec<LineId>> {
        let table = self.table_of_selection(boxes)?;
        self.ensure_editable(table)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut row: Option<usize> = None;
        for b in boxes.ids() {
            let top = self.top_box_of(*b)?;
            let line = self.doc.table_box(top)?.upper;
            let Some(index) = self.doc.table(table)?.line_index(line) else {
                continue;
            };
            let r = if behind {
                index + self.doc.row_span_of(top)? - 1
            } else {
                index
            };
            row = Some(match row {
                None => r,
                Some(current) if behind => current.max(r),
                Some(current) => current.min(r),
            });
        }
        let row = row.ok_or(Refusal::NoSelection)?;

        let (start, end) = self.table_span(table)?;
        self.run_recorded(UndoKind::InsertRows, start, end, |e| {
            e.formulas_to_internal(table)?;
            let created = {
                let mut locked = LockModify::new(e, table)?;
                locked.insert_line_copies(table, row, count, behind)?
            };
            e.formulas_to_external(table)?;
            e.note_new_boxes(table)?;

            let lines = e.doc.table(table)?.lines.clone();
            let rows: Vec<usize> = created
                .iter()
                .filter_map(|c| lines.iter().position(|l| l == c))
                .collect();
            if let (Some(first), Some(last)) = (rows.iter().min(), rows.iter().max()) {
                let s = e.doc.line_start_index(lines[*first])?;
                let t = e.doc.line_end_index(lines[*last])?;
                if let Some(mut tracked) = TrackedRange::from_indices(RedlineKind::Insert, &e.doc.nodes, s, t) {
                    tracked.record(&mut e.redlines)?;
                }
            }
            e.layout.rebuild_table_frames(&e.doc, table)?;
            tracing::debug!("inserted {} rows into {} next to row {}", count, table, row);
            Ok(created)
        })
    }

    fn insert_line_copies(&mut self, table: NodeId, row: usize, count: usize, behind: bool) -> Result<Vec<LineId>> {
        let template = *self
            .doc
            .table(table)?
            .lines
            .get(row)
            .ok_or(doc_model::DocModelError::InvalidIndex(row))?;
        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            created.push(self.doc.insert_line_copy(table, template, behind, false)?);
        }
        let new_boxes = self.doc.leaf_boxes_of(&created);
        self.reset_box_values(&new_boxes)?;

        if self.doc.table(table)?.new_model {
            let below = if behind { row + count + 1 } else { row + count };
            if let Some(below) = self.doc.table(table)?.lines.get(below).copied() {
                for line in &created {
                    let positions = self.doc.line_positions(*line)?;
                    for (i, b) in self.doc.line(*line)?.boxes.clone().iter().enumerate() {
                        let covered = match self.doc.box_with_left(below, positions[i])? {
                            Some(c) => self.doc.table_box(c)?.is_covered(),
                            None => false,
                        };
                        if covered {
                            self.doc.box_mut(*b)?.row_span = COVERED_ROW_SPAN;
                        }
                    }
                }
            }
            self.doc.normalize_row_spans(table)?;
        }

        let repeat = self.doc.table(table)?.rows_to_repeat as usize;
        let inside_heading = if behind { row + 1 < repeat } else { row < repeat };
        if inside_heading {
            let grown = (repeat + count).min(u16::MAX as usize) as u16;
            self.doc.table_mut(table)?.rows_to_repeat = grown;
        }
        Ok(created)
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Rows to delete: the rows of the selection plus the rows spanned by
    /// selected masters
    fn find_superfluous_rows(&self, table: NodeId, tops: &[BoxId]) -> Result<BTreeSet<usize>> {
        let table_ref = self.doc.table(table)?;
        let mut rows = BTreeSet::new();
        for b in tops {
            let line = self.doc.table_box(*b)?.upper;
            if let Some(row) = table_ref.line_index(line) {
                let span = self.doc.row_span_of(*b)?;
                rows.extend(row..(row + span).min(table_ref.lines.len()));
            }
        }
        Ok(rows)
    }

    /// Horizontal range covered by the selected columns, widened until no
    /// box of the table straddles its edges
    fn expand_column_selection(&self, table: NodeId, tops: &[BoxId]) -> Result<(Twips, Twips)> {
        let mut left = Twips::MAX;
        let mut right = Twips::MIN;
        for b in tops {
            let l = self.doc.box_left(*b)?;
            left = left.min(l);
            right = right.max(l + self.doc.table_box(*b)?.width());
        }
        let lines = self.doc.table(table)?.lines.clone();
        loop {
            let mut changed = false;
            for line in &lines {
                let positions = self.doc.line_positions(*line)?;
                for w in positions.windows(2) {
                    let (l, r) = (w[0], w[1]);
                    if l < right && r > left && (l < left || r > right) {
                        left = left.min(l);
                        right = right.max(r);
                        changed = true;
                    }
                }
            }
            if !changed {
                return Ok((left, right));
            }
        }
    }

    /// Delete the selected rows or columns.
    ///
    /// A selection that takes every box deletes the whole table. While
    /// tracking changes deleted rows stay and are marked deleted.
    pub fn delete_rows_cols(&mut self, boxes: &BoxSelection, mode: DeleteMode) -> Result<()> {
        let table = self.table_of_selection(boxes)?;
        self.ensure_editable(table)?;
        let mut tops = Vec::new();
        for b in boxes.ids() {
            let top = self.top_box_of(*b)?;
            if !tops.contains(&top) {
                tops.push(top);
            }
        }
        let lines = self.doc.table(table)?.lines.clone();

        // Top-level boxes going away, line by line
        let mut doomed: Vec<(LineId, Vec<BoxId>)> = Vec::new();
        match mode {
            DeleteMode::Rows => {
                for row in self.find_superfluous_rows(table, &tops)? {
                    doomed.push((lines[row], self.doc.line(lines[row])?.boxes.clone()));
                }
            }
            DeleteMode::Columns => {
                let (left, right) = self.expand_column_selection(table, &tops)?;
                for line in &lines {
                    let positions = self.doc.line_positions(*line)?;
                    let boxes = self.doc.line(*line)?.boxes.clone();
                    let gone: Vec<BoxId> = boxes
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| positions[*i] >= left && positions[i + 1] <= right)
                        .map(|(_, b)| *b)
                        .collect();
                    if !gone.is_empty() {
                        doomed.push((*line, gone));
                    }
                }
            }
        }
        let mut everything = true;
        for line in &lines {
            let all = self.doc.line(*line)?.boxes.len();
            let gone = doomed.iter().find(|(l, _)| l == line).map_or(0, |(_, g)| g.len());
            everything &= gone == all;
        }
        if everything {
            tracing::debug!("every box of {} selected, deleting the table", table);
            return self.delete_table(table);
        }

        let (start, end) = self.table_span(table)?;
        self.run_recorded(UndoKind::DeleteRowCol, start, end, |e| {
            if mode == DeleteMode::Rows && e.redlines.is_tracking() {
                for (line, _) in &doomed {
                    let s = e.doc.line_start_index(*line)?;
                    let t = e.doc.line_end_index(*line)?;
                    if let Some(mut tracked) = TrackedRange::from_indices(RedlineKind::Delete, &e.doc.nodes, s, t) {
                        tracked.record(&mut e.redlines)?;
                    }
                }
                return Ok(());
            }

            e.formulas_to_internal(table)?;
            {
                let mut locked = LockModify::new(e, table)?;
                match mode {
                    DeleteMode::Rows => locked.delete_doomed_rows(table, &doomed)?,
                    DeleteMode::Columns => locked.delete_doomed_columns(table, &doomed)?,
                }
                if locked.doc.table(table)?.new_model {
                    locked.doc.normalize_row_spans(table)?;
                } else {
                    let style = locked.table_style();
                    locked.doc.balance_table(table, &style)?;
                }
                locked.recalc_table_width(table)?;
            }
            e.note_new_boxes(table)?;
            e.formulas_to_external(table)?;
            e.redlines.drop_dangling(&e.doc.nodes);
            e.layout.rebuild_table_frames(&e.doc, table)?;
            tracing::debug!("deleted {:?} from {}", mode, table);
            Ok(())
        })
    }

    fn delete_doomed_rows(&mut self, table: NodeId, doomed: &[(LineId, Vec<BoxId>)]) -> Result<()> {
        let repeat = self.doc.table(table)?.rows_to_repeat as usize;
        let mut heading_rows = 0;
        for (line, _) in doomed {
            if self.doc.table(table)?.line_index(*line).is_some_and(|r| r < repeat) {
                heading_rows += 1;
            }
            let leaves = self.doc.leaf_boxes_of(&[*line]);
            self.note_removed_boxes(&leaves);
            self.doc.delete_line(table, *line)?;
        }
        if heading_rows > 0 {
            self.doc.table_mut(table)?.rows_to_repeat = (repeat - heading_rows) as u16;
        }
        Ok(())
    }

    /// Delete boxes column-wise; their width goes to the nearest surviving
    /// box on the left, or on the right at the line start
    fn delete_doomed_columns(&mut self, table: NodeId, doomed: &[(LineId, Vec<BoxId>)]) -> Result<()> {
        let mut grown: HashMap<BoxId, Twips> = HashMap::new();
        for (line, gone) in doomed {
            let boxes = self.doc.line(*line)?.boxes.clone();
            for (i, b) in boxes.iter().enumerate() {
                if !gone.contains(b) {
                    continue;
                }
                let left = boxes[..i].iter().rev().find(|x| !gone.contains(x));
                let right = boxes[i + 1..].iter().find(|x| !gone.contains(x));
                if let Some(heir) = left.or(right) {
                    let width = self.doc.table_box(*b)?.width();
                    *grown.entry(*heir).or_insert(0) += width;
                }
            }
        }
        let mut changes = Vec::with_capacity(grown.len());
        for (heir, extra) in grown {
            changes.push((heir, self.doc.table_box(heir)?.width() + extra));
        }
        self.set_box_widths(&changes)?;

        for (line, gone) in doomed {
            for b in gone {
                let leaves = self.leaves_under(*b)?;
                self.note_removed_boxes(&leaves);
                self.doc.delete_box(table, *b)?;
            }
            if self.doc.line(*line)?.boxes.is_empty() {
                self.doc.delete_line(table, *line)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EditError, UndoKind};
    use doc_model::{DdeLink, Document, PoolStyle, TableKind};

    fn engine_with_table(rows: usize, cols: usize, new_model: bool) -> (EditingEngine, NodeId) {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let table = doc.create_table(1, rows, &vec![1000; cols], &style, new_model).unwrap();
        (EditingEngine::with_document(doc).unwrap(), table)
    }

    fn box_at(engine: &EditingEngine, table: NodeId, row: usize, col: usize) -> BoxId {
        let doc = engine.document();
        let line = doc.table(table).unwrap().lines[row];
        doc.line(line).unwrap().boxes[col]
    }

    fn select(boxes: &[BoxId]) -> BoxSelection {
        boxes.iter().copied().collect()
    }

    fn counts(engine: &EditingEngine, table: NodeId) -> Vec<usize> {
        let doc = engine.document();
        doc.table(table)
            .unwrap()
            .lines
            .iter()
            .map(|l| doc.line(*l).unwrap().box_count())
            .collect()
    }

    fn check(engine: &EditingEngine, table: NodeId) {
        engine.document().check_table(table).unwrap();
        engine.layout().check_table_frames(engine.document(), table).unwrap();
    }

    #[test]
    fn test_insert_columns_behind() {
        let (mut engine, table) = engine_with_table(2, 2, false);
        let starts: Vec<usize> = engine
            .document()
            .leaf_boxes(table)
            .unwrap()
            .iter()
            .map(|b| engine.document().box_start_index(*b).unwrap())
            .collect();
        let sel = select(&[box_at(&engine, table, 0, 0)]);
        let created = engine.insert_columns(&sel, 1, true).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(counts(&engine, table), vec![3, 3]);
        assert_eq!(engine.document().table(table).unwrap().format.width, 3000);
        let line = engine.document().table(table).unwrap().lines[1];
        assert_eq!(engine.document().line(line).unwrap().boxes[1], created[1]);
        check(&engine, table);

        engine.undo().unwrap();
        assert_eq!(counts(&engine, table), vec![2, 2]);
        let after: Vec<usize> = engine
            .document()
            .leaf_boxes(table)
            .unwrap()
            .iter()
            .map(|b| engine.document().box_start_index(*b).unwrap())
            .collect();
        assert_eq!(after, starts);
        check(&engine, table);
    }

    #[test]
    fn test_insert_zero_columns_is_noop() {
        let (mut engine, table) = engine_with_table(2, 2, false);
        let sel = select(&[box_at(&engine, table, 0, 0)]);
        assert!(engine.insert_columns(&sel, 0, false).unwrap().is_empty());
        assert!(!engine.can_undo());
        assert_eq!(counts(&engine, table), vec![2, 2]);
    }

    #[test]
    fn test_insert_columns_before_middle() {
        let (mut engine, table) = engine_with_table(2, 3, false);
        let sel = select(&[box_at(&engine, table, 1, 1)]);
        let created = engine.insert_columns(&sel, 2, false).unwrap();
        assert_eq!(counts(&engine, table), vec![5, 5]);
        assert_eq!(box_at(&engine, table, 0, 1), created[0]);
        assert_eq!(box_at(&engine, table, 0, 2), created[1]);
        check(&engine, table);
    }

    #[test]
    fn test_insert_column_widens_merged_box() {
        let (mut engine, table) = engine_with_table(2, 3, true);
        let merge = select(&[box_at(&engine, table, 1, 0), box_at(&engine, table, 1, 1)]);
        let merged = engine.merge_cells(&merge).unwrap();
        let sel = select(&[box_at(&engine, table, 0, 0)]);
        let created = engine.insert_columns(&sel, 1, true).unwrap();

        let doc = engine.document();
        let lines = doc.table(table).unwrap().lines.clone();
        assert_eq!(doc.line_positions(lines[0]).unwrap(), vec![0, 1000, 2000, 3000, 4000]);
        assert_eq!(doc.line_positions(lines[1]).unwrap(), vec![0, 3000, 4000]);
        assert_eq!(created.len(), 1);
        assert_eq!(doc.table_box(merged).unwrap().width(), 3000);
        check(&engine, table);
    }

    #[test]
    fn test_insert_column_behind_merged_box_uses_one_width() {
        let (mut engine, table) = engine_with_table(2, 3, true);
        let merge = select(&[box_at(&engine, table, 1, 0), box_at(&engine, table, 1, 1)]);
        let merged = engine.merge_cells(&merge).unwrap();
        engine.insert_columns(&select(&[merged]), 1, true).unwrap();

        let doc = engine.document();
        let lines = doc.table(table).unwrap().lines.clone();
        assert_eq!(doc.line_positions(lines[0]).unwrap(), vec![0, 1000, 2000, 3000, 4000]);
        assert_eq!(doc.line_positions(lines[1]).unwrap(), vec![0, 2000, 3000, 4000]);
        check(&engine, table);
    }

    #[test]
    fn test_wide_table_is_scaled_back() {
        let mut engine = EditingEngine::new();
        let table = engine
            .insert_table(1, 2, 3, &crate::InsertTableOptions::default())
            .unwrap();
        let sel = select(&[box_at(&engine, table, 0, 2)]);
        engine.insert_columns(&sel, 1, true).unwrap();
        let width = engine.document().table(table).unwrap().format.width;
        assert!(width <= MAX_TABLE_WIDTH, "width {}", width);
        assert_eq!(counts(&engine, table), vec![4, 4]);
    }

    #[test]
    fn test_insert_rows() {
        let (mut engine, table) = engine_with_table(2, 2, false);
        engine.document_mut().table_mut(table).unwrap().rows_to_repeat = 1;
        let sel = select(&[box_at(&engine, table, 0, 1)]);
        let created = engine.insert_rows(&sel, 2, false).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(counts(&engine, table), vec![2, 2, 2, 2]);
        // Rows inserted in front of a heading row are heading rows too
        assert_eq!(engine.document().table(table).unwrap().rows_to_repeat, 3);
        check(&engine, table);

        let last = box_at(&engine, table, 3, 0);
        engine.insert_rows(&select(&[last]), 1, true).unwrap();
        assert_eq!(engine.document().table(table).unwrap().row_count(), 5);
        assert_eq!(engine.document().table(table).unwrap().rows_to_repeat, 3);
    }

    #[test]
    fn test_insert_row_inside_span_is_covered() {
        let (mut engine, table) = engine_with_table(2, 2, true);
        let master = box_at(&engine, table, 0, 0);
        engine.document_mut().set_row_span(table, master, 2).unwrap();
        engine.relayout().unwrap();

        let sel = select(&[box_at(&engine, table, 0, 1)]);
        engine.insert_rows(&sel, 1, true).unwrap();
        let doc = engine.document();
        assert_eq!(doc.table_box(master).unwrap().row_span, 3);
        assert!(doc.table_box(box_at(&engine, table, 1, 0)).unwrap().is_covered());
        check(&engine, table);
    }

    #[test]
    fn test_delete_rows() {
        let (mut engine, table) = engine_with_table(3, 2, false);
        let gone = box_at(&engine, table, 1, 0);
        engine.delete_rows_cols(&select(&[gone]), DeleteMode::Rows).unwrap();
        assert_eq!(counts(&engine, table), vec![2, 2]);
        assert!(!engine.document().boxes.contains_key(&gone));
        check(&engine, table);

        engine.undo().unwrap();
        assert_eq!(counts(&engine, table), vec![2, 2, 2]);
        check(&engine, table);
    }

    #[test]
    fn test_delete_column_widens_left_neighbour() {
        let (mut engine, table) = engine_with_table(2, 3, false);
        let sel = select(&[box_at(&engine, table, 0, 1)]);
        engine.delete_rows_cols(&sel, DeleteMode::Columns).unwrap();
        let doc = engine.document();
        for line in &doc.table(table).unwrap().lines {
            assert_eq!(doc.line_positions(*line).unwrap(), vec![0, 2000, 3000]);
        }
        assert_eq!(doc.table(table).unwrap().format.width, 3000);
        check(&engine, table);

        // The first column hands its width to the right
        let sel = select(&[box_at(&engine, table, 1, 0)]);
        engine.delete_rows_cols(&sel, DeleteMode::Columns).unwrap();
        assert_eq!(counts(&engine, table), vec![1, 1]);
        assert_eq!(engine.document().table(table).unwrap().format.width, 3000);
    }

    #[test]
    fn test_delete_everything_deletes_table() {
        let (mut engine, table) = engine_with_table(2, 2, false);
        let all: BoxSelection = engine.document().leaf_boxes(table).unwrap().into_iter().collect();
        engine.delete_rows_cols(&all, DeleteMode::Rows).unwrap();
        assert!(engine.document().tables.is_empty());
        assert_eq!(engine.undo_manager().last().map(|u| u.kind()), Some(UndoKind::DeleteTable));
    }

    #[test]
    fn test_tracked_row_delete_marks_rows() {
        let (mut engine, table) = engine_with_table(2, 2, false);
        engine.redlines_mut().enable_tracking().unwrap();
        let sel = select(&[box_at(&engine, table, 0, 0)]);
        engine.delete_rows_cols(&sel, DeleteMode::Rows).unwrap();
        assert_eq!(counts(&engine, table), vec![2, 2]);
        assert!(engine.redlines().all().any(|r| r.kind == RedlineKind::Delete));
    }

    #[test]
    fn test_linked_table_refused() {
        let (mut engine, table) = engine_with_table(2, 2, false);
        engine.document_mut().table_mut(table).unwrap().kind = TableKind::Linked(DdeLink {
            server: "calc".to_string(),
            topic: "sheet".to_string(),
            item: "A1:B2".to_string(),
        });
        let sel = select(&[box_at(&engine, table, 0, 0)]);
        let err = engine.insert_rows(&sel, 1, true).unwrap_err();
        assert_eq!(err.refusal(), Some(Refusal::DdeTable));
        let err = engine.delete_rows_cols(&sel, DeleteMode::Columns).unwrap_err();
        assert!(matches!(err, EditError::Refused(Refusal::DdeTable)));
    }

    #[test]
    fn test_formulas_follow_deleted_rows() {
        let (mut engine, table) = engine_with_table(2, 2, false);
        let target = box_at(&engine, table, 1, 1);
        engine.document_mut().box_format_mut(target).unwrap().formula = Some("<A2>+1".to_string());
        let sel = select(&[box_at(&engine, table, 0, 0)]);
        engine.delete_rows_cols(&sel, DeleteMode::Rows).unwrap();
        let formula = engine.document().table_box(target).unwrap().format.formula.clone();
        assert_eq!(formula.as_deref(), Some("<A1>+1"));
    }

    #[test]
    fn test_delete_spanned_row_keeps_spans_consistent() {
        let (mut engine, table) = engine_with_table(3, 2, true);
        let master = box_at(&engine, table, 0, 0);
        engine.document_mut().set_row_span(table, master, 3).unwrap();
        engine.relayout().unwrap();
        let sel = select(&[box_at(&engine, table, 1, 1)]);
        engine.delete_rows_cols(&sel, DeleteMode::Rows).unwrap();
        assert_eq!(engine.document().table_box(master).unwrap().row_span, 2);
        check(&engine, table);
    }
}
