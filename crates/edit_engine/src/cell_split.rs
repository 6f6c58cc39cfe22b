//! Splitting and merging table cells

use crate::{
    EditError, EditingEngine, LockModify, Refusal, Result, TableAutoFormat, TrackingSuspended, UndoKind,
};
use doc_model::{
    BoxFormat, BoxId, BoxSelection, LineId, NodeId, StyleId, Twips, COVERED_ROW_SPAN, MAX_TABLE_NESTING_DEPTH,
};
use std::sync::Arc;

/// Boxes that move into branch boxes when rows of a legacy table merge
#[derive(Debug)]
struct FoldGroups {
    lines: Vec<LineId>,
    before: Vec<Vec<BoxId>>,
    after: Vec<Vec<BoxId>>,
    tail_width: Twips,
}

/// Selected boxes of a merge, checked to form a rectangle
#[derive(Debug)]
struct MergePlan {
    /// Selected boxes per row, left to right
    rows: Vec<Vec<BoxId>>,
    first_row: usize,
    left: Twips,
    right: Twips,
    target: BoxId,
}

impl EditingEngine {
    /// Style of the first paragraph of a box
    fn box_style(&mut self, id: BoxId) -> Result<StyleId> {
        let style = self
            .doc
            .box_paragraphs(id)?
            .first()
            .and_then(|p| self.doc.nodes.text(*p))
            .map(|t| t.style.clone());
        Ok(match style {
            Some(style) => style,
            None => self.table_style(),
        })
    }

    fn row_of(&self, table: NodeId, id: BoxId) -> Result<usize> {
        let line = self.doc.table_box(id)?.upper;
        Ok(self
            .doc
            .table(table)?
            .line_index(line)
            .ok_or(doc_model::DocModelError::LineNotFound(line))?)
    }

    // =========================================================================
    // Split
    // =========================================================================

    /// Split each selected box into `count + 1` pieces, side by side when
    /// `vertical`, stacked otherwise. Returns the boxes created.
    ///
    /// Boxes of the row-span model that cover rows split their covered
    /// boxes along. Stacked pieces of a box outside the row-span model live
    /// in lines nested inside it.
    pub fn split_cells(
        &mut self,
        boxes: &BoxSelection,
        vertical: bool,
        count: usize,
        same_height: bool,
    ) -> Result<Vec<BoxId>> {
        let table = self.table_of_selection(boxes)?;
        self.ensure_editable(table)?;
        if count == 0 {
            tracing::warn!("split cells needs at least one new box");
            return Err(EditError::InvalidCommand("split count is zero".to_string()));
        }
        let new_model = self.doc.table(table)?.new_model;
        let mut targets: Vec<BoxId> = Vec::new();
        for id in boxes.ids() {
            if !self.doc.table_box(*id)?.is_leaf() {
                return Err(EditError::InvalidCommand(format!("{} is not a leaf box", id)));
            }
            let id = if new_model && self.doc.table_box(*id)?.is_covered() {
                self.doc.row_span_master(table, *id)?.unwrap_or(*id)
            } else {
                *id
            };
            if targets.contains(&id) {
                continue;
            }
            if vertical && self.doc.table_box(id)?.width() < (count + 1) as Twips {
                return Err(EditError::InvalidCommand(format!("{} is too narrow to split", id)));
            }
            if self.doc.nesting_depth(id)? + 1 > MAX_TABLE_NESTING_DEPTH {
                return Err(Refusal::TooComplex.into());
            }
            targets.push(id);
        }

        let (start, end) = self.table_span(table)?;
        self.run_recorded(UndoKind::SplitCells, start, end, |e| {
            let mut created = Vec::new();
            {
                let mut locked = LockModify::new(e, table)?;
                for id in &targets {
                    let pieces = if vertical {
                        locked.split_box_vertical(table, *id, count)?
                    } else {
                        locked.split_box_horizontal(table, *id, count, same_height)?
                    };
                    created.extend(pieces);
                }
                if locked.doc.table(table)?.new_model {
                    locked.doc.normalize_row_spans(table)?;
                }
                locked.recalc_table_width(table)?;
            }
            e.note_new_boxes(table)?;
            e.layout.rebuild_table_frames(&e.doc, table)?;
            tracing::debug!("split {} boxes of {} into {} more", targets.len(), table, created.len());
            Ok(created)
        })
    }

    /// Narrow `id` and put `count` boxes of the same width next to it.
    /// Returns the new boxes, covered ones below a master included.
    fn split_box_vertical(&mut self, table: NodeId, id: BoxId, count: usize) -> Result<Vec<BoxId>> {
        let new_model = self.doc.table(table)?.new_model;
        let top_level = self.doc.line(self.doc.table_box(id)?.upper)?.upper.is_none();

        let mut rows = vec![id];
        if new_model && top_level {
            let span = self.doc.row_span_of(id)?;
            let row = self.row_of(table, id)?;
            let left = self.doc.box_left(id)?;
            let lines = self.doc.table(table)?.lines.clone();
            for line in lines.iter().skip(row + 1).take(span - 1) {
                if let Some(covered) = self.doc.box_with_left(*line, left)? {
                    rows.push(covered);
                }
            }
        }

        let mut created = Vec::new();
        for (i, b) in rows.into_iter().enumerate() {
            let (base, line) = if !new_model && top_level {
                let (line, leaf) = self.doc.nest_box_content(table, b)?;
                (leaf, line)
            } else {
                (b, self.doc.table_box(b)?.upper)
            };
            let width = self.doc.table_box(base)?.width();
            let n = (count + 1) as Twips;
            let piece = width / n;
            let last = width - piece * (n - 1);

            let mut format = self.doc.table_box(base)?.format.as_ref().clone();
            format.width = piece;
            format.reset_value();
            let style = self.box_style(base)?;
            let pos = self
                .doc
                .line(line)?
                .position_of(base)
                .ok_or(doc_model::DocModelError::BoxNotFound(base))?;
            let pieces = self.doc.ins_boxen(table, line, Arc::new(format), &style, pos + 1, count)?;

            let mut widths = vec![(base, piece)];
            if let Some(tail) = pieces.last() {
                if last != piece {
                    widths.push((*tail, last));
                }
            }
            self.set_box_widths(&widths)?;
            if i > 0 {
                for p in &pieces {
                    self.doc.box_mut(*p)?.row_span = COVERED_ROW_SPAN;
                }
            }
            created.extend(pieces);
        }
        Ok(created)
    }

    /// Stack `count` empty boxes below the content of `id`
    fn split_box_horizontal(&mut self, table: NodeId, id: BoxId, count: usize, same_height: bool) -> Result<Vec<BoxId>> {
        let upper = self.doc.table_box(id)?.upper;
        let row_height = self.doc.line(upper)?.format.clone();
        let n = (count + 1) as Twips;
        let mut created = Vec::new();
        let mut stacked: Vec<LineId>;

        let plain_row = self.doc.table(table)?.new_model
            && self.doc.line(upper)?.upper.is_none()
            && self.doc.row_span_of(id)? == 1
            && !self.doc.table_box(id)?.is_covered();
        if plain_row {
            // New rows; the other boxes of the row extend over them
            let left = self.doc.box_left(id)?;
            let row = self.row_of(table, id)?;
            stacked = vec![upper];
            for _ in 0..count {
                let line = self.doc.insert_line_copy(table, upper, true, false)?;
                let positions = self.doc.line_positions(line)?;
                for (i, b) in self.doc.line(line)?.boxes.clone().into_iter().enumerate() {
                    if positions[i] == left {
                        created.push(b);
                    } else {
                        self.doc.box_mut(b)?.row_span = COVERED_ROW_SPAN;
                    }
                }
                stacked.push(line);
            }
            let repeat = self.doc.table(table)?.rows_to_repeat as usize;
            if row + 1 < repeat {
                self.doc.table_mut(table)?.rows_to_repeat += count as u16;
            }
        } else {
            let (line, _) = self.doc.nest_box_content(table, id)?;
            stacked = vec![line];
            for _ in 0..count {
                let copy = self.doc.insert_line_copy(table, line, true, false)?;
                created.extend(self.doc.line(copy)?.boxes.iter().copied());
                stacked.push(copy);
            }
        }

        if same_height && row_height.height > 0 {
            let height = row_height.height / n;
            for line in stacked {
                let format = self.doc.line_format_mut(line)?;
                format.height = height;
                format.height_rule = row_height.height_rule;
            }
        }
        Ok(created)
    }

    // =========================================================================
    // Merge
    // =========================================================================

    /// Merge a rectangle of top-level boxes into its top-left box, which
    /// takes over the content of the others in reading order. Returns the
    /// merged box.
    pub fn merge_cells(&mut self, boxes: &BoxSelection) -> Result<BoxId> {
        if boxes.len() < 2 {
            tracing::warn!("merge needs at least two boxes");
            return Err(EditError::InvalidCommand("merge needs at least two boxes".to_string()));
        }
        let table = self.table_of_selection(boxes)?;
        self.ensure_editable(table)?;
        let plan = self.merge_plan(table, boxes)?;

        let (start, end) = self.table_span(table)?;
        self.run_recorded(UndoKind::MergeCells, start, end, |e| {
            {
                let mut suspended = TrackingSuspended::new(e);
                let mut locked = LockModify::new(&mut suspended, table)?;
                locked.apply_merge(table, &plan)?;
                locked.recalc_table_width(table)?;
            }
            e.note_new_boxes(table)?;
            e.layout.rebuild_table_frames(&e.doc, table)?;
            tracing::debug!("merged {} rows into {}", plan.rows.len(), plan.target);
            Ok(plan.target)
        })
    }

    fn merge_plan(&self, table: NodeId, boxes: &BoxSelection) -> Result<MergePlan> {
        let t = self.doc.table(table)?;
        let new_model = t.new_model;
        let lines = t.lines.clone();

        let mut selected: Vec<BoxId> = Vec::new();
        for id in boxes.ids() {
            let table_box = self.doc.table_box(*id)?;
            if !table_box.is_leaf() || self.doc.line(table_box.upper)?.upper.is_some() {
                return Err(Refusal::TooComplex.into());
            }
            if new_model && table_box.is_covered() {
                match self.doc.row_span_master(table, *id)? {
                    Some(master) if boxes.contains(master) => {}
                    _ => return Err(Refusal::TooComplex.into()),
                }
            }
            if !selected.contains(id) {
                selected.push(*id);
            }
            // Boxes a selected master covers belong to the merge as well
            let span = self.doc.row_span_of(*id)?;
            if new_model && span > 1 {
                let row = self.row_of(table, *id)?;
                let left = self.doc.box_left(*id)?;
                for line in lines.iter().skip(row + 1).take(span - 1) {
                    if let Some(covered) = self.doc.box_with_left(*line, left)? {
                        if !selected.contains(&covered) {
                            selected.push(covered);
                        }
                    }
                }
            }
        }

        let mut first_row = usize::MAX;
        let mut last_row = 0;
        let mut left = Twips::MAX;
        let mut right = 0;
        for id in &selected {
            let row = self.row_of(table, *id)?;
            let x = self.doc.box_left(*id)?;
            first_row = first_row.min(row);
            last_row = last_row.max(row);
            left = left.min(x);
            right = right.max(x + self.doc.table_box(*id)?.width());
        }

        let mut rows = Vec::new();
        let mut in_window = 0;
        let mut right_free: Option<bool> = None;
        for line in &lines[first_row..=last_row] {
            let positions = self.doc.line_positions(*line)?;
            if !positions.contains(&left) || !positions.contains(&right) {
                return Err(Refusal::TooComplex.into());
            }
            let mut row = Vec::new();
            for (i, b) in self.doc.line(*line)?.boxes.iter().enumerate() {
                if positions[i] >= left && positions[i + 1] <= right {
                    if !selected.contains(b) {
                        return Err(Refusal::TooComplex.into());
                    }
                    row.push(*b);
                }
            }
            // Outside the row-span model every row needs the same kind of tail
            let free = positions.last().is_some_and(|end| *end == right);
            if !new_model && *right_free.get_or_insert(free) != free {
                return Err(Refusal::TooComplex.into());
            }
            in_window += row.len();
            rows.push(row);
        }
        if in_window != selected.len() || rows.iter().any(|r| r.is_empty()) {
            return Err(Refusal::TooComplex.into());
        }

        let missing = || EditError::Refused(Refusal::TooComplex);
        let target = *rows.first().and_then(|r| r.first()).ok_or_else(missing)?;
        Ok(MergePlan {
            rows,
            first_row,
            left,
            right,
            target,
        })
    }

    fn apply_merge(&mut self, table: NodeId, plan: &MergePlan) -> Result<()> {
        // The merged box looks like the merged area did from outside
        let template = TableAutoFormat::collect(&self.doc, "merge", &plan.rows)?;
        let cols = plan.rows.first().map_or(1, Vec::len);
        let mut format: BoxFormat = self.doc.table_box(plan.target)?.format.as_ref().clone();
        template.merged_box(plan.rows.len(), cols).apply_to(&mut format);
        format.width = plan.right - plan.left;
        format.reset_value();

        let new_model = self.doc.table(table)?.new_model;
        let folds = if !new_model && plan.rows.len() > 1 {
            Some(self.fold_groups(table, plan)?)
        } else {
            None
        };

        // Content first, in reading order
        let target_paragraphs = self.doc.box_paragraphs(plan.target)?;
        let target_empty = target_paragraphs.len() == 1
            && self.doc.nodes.text(target_paragraphs[0]).is_some_and(|t| t.is_empty());
        let mut moved = 0;
        for b in plan.rows.iter().flatten() {
            if *b != plan.target {
                moved += self.doc.move_box_content(*b, plan.target)?;
            }
        }
        if target_empty && moved > 0 {
            let index = self.doc.nodes.try_index_of(target_paragraphs[0])?;
            self.doc.remove_nodes(index, index + 1);
        }

        let mut removed = Vec::new();
        if new_model {
            // Lower rows keep their leftmost box as the covered part
            let mut keep = Vec::new();
            for (r, row) in plan.rows.iter().enumerate() {
                for (i, b) in row.iter().enumerate() {
                    if i == 0 && r > 0 {
                        keep.push((*b, plan.right - plan.left));
                    } else if *b != plan.target {
                        removed.push(*b);
                    }
                }
            }
            for b in &removed {
                self.doc.delete_box(table, *b)?;
            }
            // Covered boxes gave their content away but keep a paragraph
            let style = self.box_style(plan.target)?;
            for (b, _) in &keep {
                if self.doc.box_paragraphs(*b)?.is_empty() {
                    let end = self.doc.box_end_index(*b)?;
                    self.doc.insert_paragraph(end, "", &style)?;
                }
            }
            self.set_box_widths(&keep)?;
            self.set_box_formats(vec![(plan.target, format)])?;
            if plan.rows.len() > 1 {
                self.doc.set_row_span(table, plan.target, plan.rows.len())?;
            }
            self.doc.normalize_row_spans(table)?;
        } else {
            for b in plan.rows.iter().flatten() {
                if *b != plan.target {
                    self.doc.delete_box(table, *b)?;
                    removed.push(*b);
                }
            }
            self.set_box_formats(vec![(plan.target, format)])?;
            if let Some(folds) = folds {
                self.fold_rows(table, plan, folds)?;
            }
        }
        self.note_removed_boxes(&removed);
        Ok(())
    }

    /// Boxes left and right of the merge window, per merged row
    fn fold_groups(&self, table: NodeId, plan: &MergePlan) -> Result<FoldGroups> {
        let lines: Vec<LineId> =
            self.doc.table(table)?.lines[plan.first_row..plan.first_row + plan.rows.len()].to_vec();
        let mut groups = FoldGroups {
            lines: lines.clone(),
            before: Vec::new(),
            after: Vec::new(),
            tail_width: 0,
        };
        for line in &lines {
            let positions = self.doc.line_positions(*line)?;
            let mut left_group = Vec::new();
            let mut right_group = Vec::new();
            for (i, b) in self.doc.line(*line)?.boxes.iter().enumerate() {
                if positions[i + 1] <= plan.left {
                    left_group.push(*b);
                } else if positions[i] >= plan.right {
                    right_group.push(*b);
                }
            }
            let end = positions.last().copied().unwrap_or(plan.right);
            groups.tail_width = groups.tail_width.max(end - plan.right);
            groups.before.push(left_group);
            groups.after.push(right_group);
        }
        Ok(groups)
    }

    /// Fold the merged rows into the first one: the boxes left and right
    /// of the merged box move into branch boxes holding one nested line per
    /// row.
    fn fold_rows(&mut self, table: NodeId, plan: &MergePlan, folds: FoldGroups) -> Result<()> {
        let FoldGroups {
            lines,
            before,
            after,
            tail_width,
        } = folds;
        let host = lines[0];

        if before.iter().all(|g| !g.is_empty()) {
            self.doc
                .make_branch_box(host, 0, before, Arc::new(BoxFormat::with_width(plan.left)))?;
        }
        if after.iter().all(|g| !g.is_empty()) {
            let pos = self
                .doc
                .line(host)?
                .position_of(plan.target)
                .ok_or(doc_model::DocModelError::BoxNotFound(plan.target))?;
            self.doc
                .make_branch_box(host, pos + 1, after, Arc::new(BoxFormat::with_width(tail_width)))?;
        }
        for line in &lines[1..] {
            self.doc.delete_line(table, *line)?;
        }
        let repeat = self.doc.table(table)?.rows_to_repeat as usize;
        if plan.first_row < repeat {
            let folded = (plan.first_row + plan.rows.len()).min(repeat) - plan.first_row - 1;
            self.doc.table_mut(table)?.rows_to_repeat -= folded as u16;
        }
        self.doc.reorder_box_sections(table)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{BorderLine, Document, HeightRule, LineFormat, PoolStyle};

    fn engine_with_table(rows: usize, cols: usize, new_model: bool) -> (EditingEngine, NodeId) {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let table = doc.create_table(1, rows, &vec![1000; cols], &style, new_model).unwrap();
        for (i, leaf) in doc.leaf_boxes(table).unwrap().into_iter().enumerate() {
            let para = doc.box_paragraphs(leaf).unwrap()[0];
            doc.nodes.text_mut(para).unwrap().text = format!("c{}", i);
        }
        (EditingEngine::with_document(doc).unwrap(), table)
    }

    fn cell(engine: &EditingEngine, table: NodeId, row: usize, col: usize) -> BoxId {
        let doc = engine.document();
        let line = doc.table(table).unwrap().lines[row];
        doc.line(line).unwrap().boxes[col]
    }

    fn select(ids: &[BoxId]) -> BoxSelection {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_vertical_split_legacy_nests() {
        let (mut engine, table) = engine_with_table(2, 2, false);
        let target = cell(&engine, table, 0, 0);
        let created = engine.split_cells(&select(&[target]), true, 2, false).unwrap();
        assert_eq!(created.len(), 2);

        let doc = engine.document();
        // Top-level lines keep their box count
        assert!(doc.is_balanced(table).unwrap());
        assert!(!doc.table_box(target).unwrap().is_leaf());
        let nested = doc.table_box(target).unwrap().lines()[0];
        let widths: Vec<Twips> = doc
            .line(nested)
            .unwrap()
            .boxes
            .iter()
            .map(|b| doc.table_box(*b).unwrap().width())
            .collect();
        assert_eq!(widths, vec![333, 333, 334]);
        assert_eq!(doc.box_text(doc.line(nested).unwrap().boxes[0]).unwrap(), "c0");
        assert_eq!(doc.leaf_boxes(table).unwrap().len(), 6);
        doc.check_table(table).unwrap();
        engine.layout().check_table_frames(doc, table).unwrap();
    }

    #[test]
    fn test_vertical_split_master_splits_covered() {
        let (mut engine, table) = engine_with_table(3, 2, true);
        let master = cell(&engine, table, 0, 1);
        engine.document_mut().set_row_span(table, master, 2).unwrap();

        let created = engine.split_cells(&select(&[master]), true, 1, false).unwrap();
        assert_eq!(created.len(), 2);
        let doc = engine.document();
        assert_eq!(doc.line(doc.table(table).unwrap().lines[0]).unwrap().box_count(), 3);
        let lower = doc.line(doc.table(table).unwrap().lines[1]).unwrap();
        assert_eq!(lower.box_count(), 3);
        assert!(lower.boxes[1..].iter().all(|b| doc.table_box(*b).unwrap().is_covered()));
        assert_eq!(doc.row_span_of(created[0]).unwrap(), 2);
        doc.check_table(table).unwrap();
    }

    #[test]
    fn test_horizontal_split_row_span_model() {
        let (mut engine, table) = engine_with_table(2, 2, true);
        let line = engine.document().table(table).unwrap().lines[0];
        *engine.document_mut().line_format_mut(line).unwrap() = LineFormat::with_height(900, HeightRule::Exact);
        let target = cell(&engine, table, 0, 0);

        let created = engine.split_cells(&select(&[target]), false, 2, true).unwrap();
        assert_eq!(created.len(), 2);
        let doc = engine.document();
        assert_eq!(doc.table(table).unwrap().row_count(), 4);
        let neighbour = cell(&engine, table, 0, 1);
        assert_eq!(doc.row_span_of(neighbour).unwrap(), 3);
        for row in 0..3 {
            let line = doc.table(table).unwrap().lines[row];
            assert_eq!(doc.line(line).unwrap().format.height, 300);
        }
        doc.check_table(table).unwrap();
        engine.layout().check_table_frames(doc, table).unwrap();
    }

    #[test]
    fn test_horizontal_split_legacy_stacks_nested_lines() {
        let (mut engine, table) = engine_with_table(1, 2, false);
        let target = cell(&engine, table, 0, 1);
        let created = engine.split_cells(&select(&[target]), false, 1, false).unwrap();
        let doc = engine.document();
        assert_eq!(doc.table(table).unwrap().row_count(), 1);
        assert_eq!(doc.table_box(target).unwrap().lines().len(), 2);
        assert_eq!(doc.table_box(created[0]).unwrap().width(), 1000);
        assert_eq!(doc.box_text(created[0]).unwrap(), "");
        doc.check_table(table).unwrap();
    }

    #[test]
    fn test_split_preconditions() {
        let (mut engine, table) = engine_with_table(1, 2, false);
        let target = cell(&engine, table, 0, 0);
        let err = engine.split_cells(&select(&[target]), true, 0, false).unwrap_err();
        assert!(matches!(err, EditError::InvalidCommand(_)));
        let err = engine.split_cells(&BoxSelection::new(), true, 1, false).unwrap_err();
        assert_eq!(err.refusal(), Some(Refusal::NoSelection));
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_merge_single_row() {
        let (mut engine, table) = engine_with_table(2, 3, false);
        let red = BorderLine::solid(20, "#FF0000");
        let right = cell(&engine, table, 0, 1);
        engine.document_mut().box_format_mut(right).unwrap().borders.right = Some(red.clone());
        let first = cell(&engine, table, 0, 0);

        let merged = engine.merge_cells(&select(&[first, right])).unwrap();
        assert_eq!(merged, first);
        let doc = engine.document();
        assert_eq!(doc.box_text(merged).unwrap(), "c0\nc1");
        assert_eq!(doc.table_box(merged).unwrap().width(), 2000);
        assert_eq!(doc.table_box(merged).unwrap().format.borders.right, Some(red));
        assert_eq!(doc.line(doc.table(table).unwrap().lines[0]).unwrap().box_count(), 2);
        doc.check_table(table).unwrap();
        engine.layout().check_table_frames(doc, table).unwrap();
    }

    #[test]
    fn test_merge_rectangle_row_span_model() {
        let (mut engine, table) = engine_with_table(3, 3, true);
        let picked = [
            cell(&engine, table, 0, 0),
            cell(&engine, table, 0, 1),
            cell(&engine, table, 1, 0),
            cell(&engine, table, 1, 1),
        ];
        let merged = engine.merge_cells(&select(&picked)).unwrap();
        let doc = engine.document();
        assert_eq!(doc.row_span_of(merged).unwrap(), 2);
        assert_eq!(doc.box_text(merged).unwrap(), "c0\nc1\nc3\nc4");
        let lower = doc.line(doc.table(table).unwrap().lines[1]).unwrap();
        assert_eq!(lower.box_count(), 2);
        assert!(doc.table_box(lower.boxes[0]).unwrap().is_covered());
        assert_eq!(doc.table_box(lower.boxes[0]).unwrap().width(), 2000);
        doc.check_table(table).unwrap();

        engine.undo().unwrap();
        let doc = engine.document();
        assert_eq!(doc.leaf_boxes(table).unwrap().len(), 9);
        assert_eq!(doc.box_text(cell(&engine, table, 1, 1)).unwrap(), "c4");
    }

    #[test]
    fn test_merge_keeps_outer_box_attributes() {
        let (mut engine, table) = engine_with_table(3, 3, true);
        let picked = [
            cell(&engine, table, 0, 0),
            cell(&engine, table, 0, 1),
            cell(&engine, table, 1, 0),
            cell(&engine, table, 1, 1),
        ];
        let blue = BorderLine::solid(10, "#0000FF");
        let red = BorderLine::solid(20, "#FF0000");
        {
            let doc = engine.document_mut();
            let top_left = doc.box_format_mut(picked[0]).unwrap();
            top_left.shading = Some("#FFFF00".to_string());
            top_left.vert_orient = doc_model::VertOrient::Bottom;
            top_left.borders.left = Some(blue.clone());
            top_left.value = Some(3.0);
            doc.box_format_mut(picked[1]).unwrap().borders.right = Some(red.clone());
            doc.box_format_mut(picked[2]).unwrap().borders.bottom = Some(blue.clone());
            // Inner boxes do not show through
            doc.box_format_mut(picked[3]).unwrap().shading = Some("#00FF00".to_string());
        }

        let merged = engine.merge_cells(&select(&picked)).unwrap();
        let format = &engine.document().table_box(merged).unwrap().format;
        assert_eq!(format.shading.as_deref(), Some("#FFFF00"));
        assert_eq!(format.vert_orient, doc_model::VertOrient::Bottom);
        assert_eq!(format.borders.left, Some(blue.clone()));
        assert_eq!(format.borders.right, Some(red));
        assert_eq!(format.borders.bottom, Some(blue));
        assert_eq!(format.value, None);
        assert_eq!(format.width, 2000);
    }

    #[test]
    fn test_merge_rows_legacy_folds_neighbours() {
        let (mut engine, table) = engine_with_table(3, 3, false);
        let picked = [cell(&engine, table, 0, 1), cell(&engine, table, 1, 1)];
        let merged = engine.merge_cells(&select(&picked)).unwrap();
        let doc = engine.document();
        assert_eq!(doc.table(table).unwrap().row_count(), 2);
        let host = doc.line(doc.table(table).unwrap().lines[0]).unwrap();
        assert_eq!(host.box_count(), 3);
        assert_eq!(host.boxes[1], merged);
        let branch = doc.table_box(host.boxes[0]).unwrap();
        assert_eq!(branch.lines().len(), 2);
        assert_eq!(doc.box_text(merged).unwrap(), "c1\nc4");
        // Node order still follows the tree
        doc.check_table(table).unwrap();
        engine.layout().check_table_frames(doc, table).unwrap();
    }

    #[test]
    fn test_merge_refusals() {
        let (mut engine, table) = engine_with_table(3, 3, false);
        let first = cell(&engine, table, 0, 0);
        let err = engine.merge_cells(&select(&[first])).unwrap_err();
        assert!(matches!(err, EditError::InvalidCommand(_)));

        // An L shape is no rectangle
        let picked = [first, cell(&engine, table, 0, 1), cell(&engine, table, 1, 0)];
        let err = engine.merge_cells(&select(&picked)).unwrap_err();
        assert_eq!(err.refusal(), Some(Refusal::TooComplex));
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_merge_suspends_tracking() {
        let (mut engine, table) = engine_with_table(1, 2, false);
        engine.redlines_mut().enable_tracking().unwrap();
        let picked = [cell(&engine, table, 0, 0), cell(&engine, table, 0, 1)];
        engine.merge_cells(&select(&picked)).unwrap();
        assert!(engine.redlines().is_empty());
        assert!(engine.redlines().is_tracking());
    }
}
