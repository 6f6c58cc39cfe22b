//! Splitting a table in two and merging neighbouring tables

use crate::{EditError, EditingEngine, LockModify, Refusal, Result, UndoKind};
use doc_model::{BoxFormat, LineId, NodeId, NodeKind};
use serde::{Deserialize, Serialize};

/// What the first line of the new table takes over when a table is split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitMode {
    /// Bottom borders of the line above the cut become top borders
    BorderCopy,
    /// Box attributes of the old first line
    BoxAttrCopy,
    /// Box attributes plus the paragraph style of single-paragraph boxes
    BoxAttrAllCopy,
    /// Copies of the heading rows, content included
    ContentCopy,
    #[default]
    Default,
}

impl EditingEngine {
    /// Innermost table holding the node at `position`
    fn table_at(&self, position: usize) -> Result<NodeId> {
        if let Some(node) = self.doc.nodes.node_at(position) {
            if node.is_table_start() {
                return Ok(node.id());
            }
        }
        self.doc
            .nodes
            .find_table_node(position)
            .ok_or_else(|| EditError::InvalidCommand(format!("no table at node {}", position)))
    }

    /// Split the table holding `position` in front of the top-level line
    /// holding it. Returns the new table, which follows the old one
    /// directly.
    pub fn split_table(&mut self, position: usize, mode: SplitMode, recalc_size: bool) -> Result<NodeId> {
        let table = self.table_at(position)?;
        self.ensure_editable(table)?;
        let leaf = self
            .doc
            .box_at_index(position)
            .ok_or_else(|| EditError::InvalidCommand(format!("node {} lies in no box", position)))?;
        let top = self.top_box_of(leaf)?;
        let line = self.doc.table_box(top)?.upper;
        let row = self
            .doc
            .table(table)?
            .line_index(line)
            .ok_or(doc_model::DocModelError::LineNotFound(line))?;
        if row == 0 {
            return Err(Refusal::NothingToSplit.into());
        }

        let (start, end) = self.table_span(table)?;
        self.run_recorded(UndoKind::SplitTable, start, end, |e| {
            let repeat = e.doc.table(table)?.rows_to_repeat as usize;
            let old_lines = e.doc.table(table)?.lines.clone();
            let new_table = {
                let mut locked = LockModify::new(e, table)?;
                let new_table = locked.doc.split_table_at(table, row)?;
                if locked.doc.table(table)?.new_model {
                    locked.doc.clean_up_bottom_row_span(table)?;
                    locked.doc.clean_up_top_row_span(new_table)?;
                }
                let name = locked.unique_table_name();
                locked.doc.table_format_mut(new_table)?.name = name;
                new_table
            };

            let first_new = line;
            let old_last = *old_lines[..row]
                .last()
                .ok_or(doc_model::DocModelError::InvalidIndex(row))?;
            match mode {
                SplitMode::BorderCopy => e.copy_borders_across(old_last, first_new)?,
                SplitMode::BoxAttrCopy => e.copy_box_attrs(old_lines[0], first_new, false)?,
                SplitMode::BoxAttrAllCopy => e.copy_box_attrs(old_lines[0], first_new, true)?,
                SplitMode::ContentCopy => {
                    let headings = if repeat > 0 { &old_lines[..repeat.min(row)] } else { &old_lines[..1] };
                    for heading in headings {
                        e.doc.insert_line_copy_before(new_table, *heading, first_new, true)?;
                    }
                    if repeat > 0 {
                        e.doc.table_mut(new_table)?.rows_to_repeat = headings.len() as u16;
                    }
                }
                SplitMode::Default => {}
            }

            if recalc_size {
                e.recalc_table_width(table)?;
                e.recalc_table_width(new_table)?;
            }
            e.note_new_boxes(new_table)?;
            e.layout.rebuild_table_frames(&e.doc, table)?;
            e.layout.insert_table_frames(&e.doc, new_table)?;
            tracing::debug!("split {} at row {} into {} ({:?})", table, row, new_table, mode);
            Ok(new_table)
        })
    }

    /// Bottom borders of `above` become the top borders of `below`
    fn copy_borders_across(&mut self, above: LineId, below: LineId) -> Result<()> {
        let positions = self.doc.line_positions(below)?;
        let mut changes = Vec::new();
        for (i, b) in self.doc.line(below)?.boxes.clone().iter().enumerate() {
            let Some(source) = self.doc.box_of_pos(above, positions[i])? else {
                continue;
            };
            let bottom = self.doc.table_box(source)?.format.borders.bottom.clone();
            let mut format = self.doc.table_box(*b)?.format.as_ref().clone();
            format.borders.top = bottom;
            changes.push((*b, format));
        }
        self.set_box_formats(changes)
    }

    /// Box attributes of the boxes of `source` at the same position go to
    /// the boxes of `target`, widths and values aside
    fn copy_box_attrs(&mut self, source: LineId, target: LineId, with_style: bool) -> Result<()> {
        let positions = self.doc.line_positions(target)?;
        let mut changes = Vec::new();
        for (i, b) in self.doc.line(target)?.boxes.clone().iter().enumerate() {
            let Some(src) = self.doc.box_of_pos(source, positions[i])? else {
                continue;
            };
            let mut format: BoxFormat = self.doc.table_box(src)?.format.as_ref().clone();
            format.width = self.doc.table_box(*b)?.width();
            format.reset_value();
            changes.push((*b, format));

            if with_style {
                let paragraphs = self.doc.box_paragraphs(*b)?;
                let style = self
                    .doc
                    .box_paragraphs(src)?
                    .first()
                    .and_then(|p| self.doc.nodes.text(*p))
                    .map(|t| t.style.clone());
                if let (&[para], Some(style)) = (paragraphs.as_slice(), style) {
                    self.doc.set_paragraph_style(para, &style)?;
                }
            }
        }
        self.set_box_formats(changes)
    }

    /// Merge the table holding `position` with the table right in front
    /// of it (`with_previous`) or right behind it.
    ///
    /// The first table survives. Merging with the previous table hands the
    /// second table's format and width to the survivor; otherwise the first
    /// table's width wins. Returns the surviving table.
    pub fn merge_tables(&mut self, position: usize, with_previous: bool) -> Result<NodeId> {
        let table = self.table_at(position)?;
        let (table_start, table_end) = self.doc.table_range(table)?;
        let neighbour = if with_previous {
            match table_start.checked_sub(1).and_then(|i| self.doc.nodes.node_at(i)) {
                Some(node) => match &node.kind {
                    NodeKind::End { start } if self.doc.tables.contains_key(start) => Some(*start),
                    _ => None,
                },
                None => None,
            }
        } else {
            self.doc
                .nodes
                .node_at(table_end + 1)
                .filter(|n| n.is_table_start())
                .map(|n| n.id())
        };
        let Some(neighbour) = neighbour else {
            tracing::debug!("no table next to {} to merge with", table);
            return Err(Refusal::NotAdjacent.into());
        };
        let (first, second) = if with_previous { (neighbour, table) } else { (table, neighbour) };
        self.ensure_editable(first)?;
        self.ensure_editable(second)?;

        let (start, _) = self.doc.table_range(first)?;
        let (_, end) = self.table_span(second)?;
        self.run_recorded(UndoKind::MergeTables, start, end, |e| {
            let (authority, follower) = if with_previous { (second, first) } else { (first, second) };
            let width = e.table_content_width(authority)?;
            e.scale_table_widths(follower, width)?;
            let second_format = e.doc.table(second)?.format.as_ref().clone();
            e.layout.del_table_frames(second)?;
            {
                let mut locked = LockModify::new(e, first)?;
                locked.doc.join_tables(first, second)?;
                if with_previous {
                    let name = locked.doc.table(first)?.format.name.clone();
                    locked.doc.set_table_format(first, doc_model::TableFormat { name, ..second_format })?;
                }
                if locked.doc.table(first)?.new_model {
                    locked.doc.normalize_row_spans(first)?;
                } else {
                    let lines = locked.doc.table(first)?.lines.clone();
                    for b in locked.doc.subtree_of(&lines).boxes {
                        locked.doc.box_mut(b)?.row_span = 1;
                    }
                    let style = locked.table_style();
                    locked.doc.balance_table(first, &style)?;
                }
                locked.recalc_table_width(first)?;
            }
            e.note_new_boxes(first)?;
            e.layout.rebuild_table_frames(&e.doc, first)?;
            tracing::debug!("merged {} into {}", second, first);
            Ok(first)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{BorderLine, Document, PoolStyle, TableAdjust};
    use std::sync::Arc;

    fn doc_with_table(rows: usize, cols: usize, new_model: bool) -> (Document, NodeId) {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let table = doc.create_table(1, rows, &vec![1000; cols], &style, new_model).unwrap();
        for (i, leaf) in doc.leaf_boxes(table).unwrap().into_iter().enumerate() {
            let para = doc.box_paragraphs(leaf).unwrap()[0];
            doc.nodes.text_mut(para).unwrap().text = format!("c{}", i);
        }
        (doc, table)
    }

    fn row_position(engine: &EditingEngine, table: NodeId, row: usize) -> usize {
        let doc = engine.document();
        let line = doc.table(table).unwrap().lines[row];
        doc.box_start_index(doc.line(line).unwrap().boxes[0]).unwrap() + 1
    }

    #[test]
    fn test_split_border_copy() {
        let (mut doc, table) = doc_with_table(4, 2, false);
        let line = doc.table(table).unwrap().lines[1];
        let red = BorderLine::solid(30, "#FF0000");
        for b in doc.line(line).unwrap().boxes.clone() {
            doc.box_format_mut(b).unwrap().borders.bottom = Some(red.clone());
        }
        doc.table_mut(table).unwrap().rows_to_repeat = 1;
        let mut engine = EditingEngine::with_document(doc).unwrap();

        let at = row_position(&engine, table, 2);
        let second = engine.split_table(at, SplitMode::BorderCopy, false).unwrap();
        let doc = engine.document();
        assert_eq!(doc.table(table).unwrap().row_count(), 2);
        assert_eq!(doc.table(second).unwrap().row_count(), 2);
        assert_eq!(doc.table(second).unwrap().rows_to_repeat, 0);
        let first_new = doc.table(second).unwrap().lines[0];
        let formats: Vec<Arc<BoxFormat>> = doc
            .line(first_new)
            .unwrap()
            .boxes
            .iter()
            .map(|b| Arc::clone(&doc.table_box(*b).unwrap().format))
            .collect();
        assert!(formats.iter().all(|f| f.borders.top == Some(red.clone())));
        assert!(Arc::ptr_eq(&formats[0], &formats[1]));
        assert_ne!(doc.table(second).unwrap().format.name, doc.table(table).unwrap().format.name);
        doc.check_table(table).unwrap();
        doc.check_table(second).unwrap();
        engine.layout().check_table_frames(doc, second).unwrap();
    }

    #[test]
    fn test_split_first_row_refused() {
        let (doc, table) = doc_with_table(2, 2, false);
        let mut engine = EditingEngine::with_document(doc).unwrap();
        let at = row_position(&engine, table, 0);
        let err = engine.split_table(at, SplitMode::Default, false).unwrap_err();
        assert_eq!(err.refusal(), Some(Refusal::NothingToSplit));
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_split_content_copy_repeats_headings() {
        let (mut doc, table) = doc_with_table(3, 2, false);
        doc.table_mut(table).unwrap().rows_to_repeat = 1;
        let mut engine = EditingEngine::with_document(doc).unwrap();
        let at = row_position(&engine, table, 1);
        let second = engine.split_table(at, SplitMode::ContentCopy, false).unwrap();
        let doc = engine.document();
        assert_eq!(doc.table(second).unwrap().row_count(), 3);
        assert_eq!(doc.table(second).unwrap().rows_to_repeat, 1);
        let copy = doc.table(second).unwrap().lines[0];
        let text = doc.box_text(doc.line(copy).unwrap().boxes[1]).unwrap();
        assert_eq!(text, "c1");
        doc.check_table(second).unwrap();
    }

    #[test]
    fn test_split_box_attr_all_copy() {
        let (mut doc, table) = doc_with_table(2, 2, false);
        let first = doc.table(table).unwrap().lines[0];
        let heading = doc.styles.get_or_create(PoolStyle::TableHeading);
        for b in doc.line(first).unwrap().boxes.clone() {
            doc.box_format_mut(b).unwrap().shading = Some("#CCCCCC".to_string());
            let para = doc.box_paragraphs(b).unwrap()[0];
            doc.set_paragraph_style(para, &heading).unwrap();
        }
        let mut engine = EditingEngine::with_document(doc).unwrap();
        let at = row_position(&engine, table, 1);
        let second = engine.split_table(at, SplitMode::BoxAttrAllCopy, false).unwrap();
        let doc = engine.document();
        let line = doc.table(second).unwrap().lines[0];
        for b in &doc.line(line).unwrap().boxes {
            assert_eq!(doc.table_box(*b).unwrap().format.shading.as_deref(), Some("#CCCCCC"));
            let para = doc.box_paragraphs(*b).unwrap()[0];
            assert_eq!(doc.nodes.text(para).unwrap().style, heading);
        }
    }

    #[test]
    fn test_split_then_merge_restores_sequence() {
        let (doc, table) = doc_with_table(4, 2, true);
        let texts = doc.paragraph_texts();
        let mut engine = EditingEngine::with_document(doc).unwrap();
        let at = row_position(&engine, table, 2);
        let second = engine.split_table(at, SplitMode::Default, false).unwrap();

        let merged = engine.merge_tables(row_position(&engine, table, 0), false).unwrap();
        assert_eq!(merged, table);
        let doc = engine.document();
        assert!(!doc.tables.contains_key(&second));
        assert_eq!(doc.table(table).unwrap().row_count(), 4);
        assert_eq!(doc.paragraph_texts(), texts);
        doc.check_table(table).unwrap();
        engine.layout().check_table_frames(doc, table).unwrap();

        engine.undo().unwrap();
        assert_eq!(engine.document().tables.len(), 2);
        engine.layout().check_table_frames(engine.document(), second).unwrap();
    }

    #[test]
    fn test_merge_width_and_format_rules() {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let first = doc.create_table(1, 1, &[1000, 1000], &style, false).unwrap();
        let at = doc.table_range(first).unwrap().1 + 1;
        let second = doc.create_table(at, 1, &[1000, 1000, 1000], &style, false).unwrap();
        doc.table_format_mut(first).unwrap().name = "First".to_string();
        doc.table_format_mut(second).unwrap().adjust = TableAdjust::Center;
        let mut engine = EditingEngine::with_document(doc).unwrap();

        let position = engine.document().table_range(second).unwrap().0 + 1;
        let merged = engine.merge_tables(position, true).unwrap();
        assert_eq!(merged, first);
        let doc = engine.document();
        let format = &doc.table(first).unwrap().format;
        assert_eq!(format.name, "First");
        assert_eq!(format.adjust, TableAdjust::Center);
        // The second table's width wins and legacy lines are balanced
        assert_eq!(format.width, 3000);
        assert!(doc.is_balanced(first).unwrap());
        doc.check_table(first).unwrap();
    }

    #[test]
    fn test_merge_needs_adjacent_table() {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let first = doc.create_table(1, 1, &[1000], &style, false).unwrap();
        let at = doc.body_end_index().unwrap();
        doc.create_table(at, 1, &[1000], &style, false).unwrap();
        let mut engine = EditingEngine::with_document(doc).unwrap();

        // A paragraph lies between the two tables
        let position = engine.document().table_range(first).unwrap().0 + 1;
        let err = engine.merge_tables(position, false).unwrap_err();
        assert_eq!(err.refusal(), Some(Refusal::NotAdjacent));
        let err = engine.merge_tables(position, true).unwrap_err();
        assert_eq!(err.refusal(), Some(Refusal::NotAdjacent));
    }
}
