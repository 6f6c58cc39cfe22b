//! Box widths and box text
//!
//! Width changes go through [`EditingEngine::set_box_widths`], which claims
//! one new format per old format and width so boxes that shared a format
//! before still share one afterwards.

use crate::{EditError, EditingEngine, LockModify, Result, UndoKind};
use doc_model::{BoxFormat, BoxId, LineId, NodeId, Twips};
use std::sync::Arc;

/// Map `x` from the old edges onto the new ones, linearly between edges.
/// Positions right of the last edge move with it.
fn map_edge(x: Twips, old: &[Twips], new: &[Twips]) -> Twips {
    for i in 0..old.len().saturating_sub(1) {
        let (o0, o1) = (old[i], old[i + 1]);
        if x <= o1 {
            if x <= o0 || o1 == o0 {
                return new[i] + (x - o0);
            }
            let (n0, n1) = (new[i], new[i + 1]);
            return n0 + ((x - o0) as i128 * (n1 - n0) as i128 / (o1 - o0) as i128) as Twips;
        }
    }
    match (old.last(), new.last()) {
        (Some(o), Some(n)) => x - o + n,
        _ => x,
    }
}

impl EditingEngine {
    /// Give boxes new widths
    pub(crate) fn set_box_widths(&mut self, changes: &[(BoxId, Twips)]) -> Result<()> {
        let mut claimed: Vec<(Arc<BoxFormat>, Twips, Arc<BoxFormat>)> = Vec::new();
        for (id, width) in changes {
            let current = Arc::clone(&self.doc.table_box(*id)?.format);
            if current.width == *width {
                continue;
            }
            let format = match claimed.iter().find(|(old, w, _)| Arc::ptr_eq(old, &current) && w == width) {
                Some((_, _, new)) => Arc::clone(new),
                None => {
                    let new = Arc::new(BoxFormat {
                        width: *width,
                        ..current.as_ref().clone()
                    });
                    claimed.push((current, *width, Arc::clone(&new)));
                    new
                }
            };
            self.doc.set_box_format(*id, format)?;
        }
        Ok(())
    }

    /// Give boxes new formats; equal formats end up as one shared instance
    pub(crate) fn set_box_formats(&mut self, changes: Vec<(BoxId, BoxFormat)>) -> Result<()> {
        let mut pool: Vec<Arc<BoxFormat>> = Vec::new();
        for (id, format) in changes {
            if *self.doc.table_box(id)?.format == format {
                continue;
            }
            let shared = match pool.iter().find(|f| ***f == format) {
                Some(f) => Arc::clone(f),
                None => {
                    let f = Arc::new(format);
                    pool.push(Arc::clone(&f));
                    f
                }
            };
            self.doc.set_box_format(id, shared)?;
        }
        Ok(())
    }

    /// Scale every box of a table so its widest line becomes `width` wide
    pub(crate) fn scale_table_widths(&mut self, table: NodeId, width: Twips) -> Result<()> {
        let old = self.table_content_width(table)?;
        if old <= 0 || old == width {
            return Ok(());
        }
        let lines = self.doc.table(table)?.lines.clone();
        let mut changes = Vec::new();
        for b in self.doc.subtree_of(&lines).boxes {
            let w = self.doc.table_box(b)?.width();
            let scaled = (w as i128 * width as i128 / old as i128) as Twips;
            changes.push((b, scaled.max(1)));
        }
        self.set_box_widths(&changes)?;
        self.recalc_table_width(table)?;
        tracing::debug!("scaled {} from {} to {}", table, old, width);
        Ok(())
    }

    /// Move the box edges of `line` so its boxes get `widths`.
    ///
    /// Legacy tables move the matching edges of every line along; row-span
    /// tables only touch `line` and the lines nested in it.
    pub fn set_column_widths(&mut self, table: NodeId, line: LineId, widths: &[Twips]) -> Result<()> {
        self.ensure_editable(table)?;
        let boxes = self.doc.line(line)?.boxes.clone();
        let Some(first) = boxes.first() else {
            return Err(EditError::InvalidCommand(format!("line {} holds no boxes", line)));
        };
        if self.doc.table_of_box(*first)? != table {
            return Err(EditError::InvalidCommand(format!("line {} is not part of {}", line, table)));
        }
        if widths.len() != boxes.len() || widths.iter().any(|w| *w <= 0) {
            tracing::warn!("set_column_widths: {} widths for {} boxes", widths.len(), boxes.len());
            return Err(EditError::InvalidCommand(format!(
                "need {} positive widths, got {:?}",
                boxes.len(),
                widths
            )));
        }

        let old_edges = self.doc.line_positions(line)?;
        let mut new_edges = Vec::with_capacity(old_edges.len());
        let mut x = old_edges[0];
        new_edges.push(x);
        for w in widths {
            x += w;
            new_edges.push(x);
        }

        let affected = if self.doc.table(table)?.new_model {
            self.doc.subtree_of(&[line]).lines
        } else {
            let lines = self.doc.table(table)?.lines.clone();
            self.doc.subtree_of(&lines).lines
        };
        // All positions are read before the first width changes
        let mut changes = Vec::new();
        for l in affected {
            let positions = self.doc.line_positions(l)?;
            let boxes = self.doc.line(l)?.boxes.clone();
            for (i, b) in boxes.iter().enumerate() {
                let left = map_edge(positions[i], &old_edges, &new_edges);
                let right = map_edge(positions[i + 1], &old_edges, &new_edges);
                changes.push((*b, (right - left).max(1)));
            }
        }

        let (start, end) = self.table_span(table)?;
        self.run_recorded(UndoKind::SetColumnWidths, start, end, |e| {
            {
                let mut locked = LockModify::new(e, table)?;
                locked.set_box_widths(&changes)?;
                locked.recalc_table_width(table)?;
            }
            e.layout.rebuild_table_frames(&e.doc, table)?;
            tracing::debug!("column widths of {} set to {:?}", line, widths);
            Ok(())
        })
    }

    /// Replace the text of a leaf box, one paragraph per line of `text`
    pub fn set_box_text(&mut self, id: BoxId, text: &str) -> Result<()> {
        let table_box = self.doc.table_box(id)?;
        if !table_box.is_leaf() {
            return Err(EditError::InvalidCommand(format!("{} holds nested lines", id)));
        }
        if table_box.format.protected {
            tracing::warn!("box {} is protected", id);
            return Err(EditError::InvalidCommand(format!("{} is protected", id)));
        }
        let table = self.doc.table_of_box(id)?;
        self.ensure_editable(table)?;

        let (start, end) = self.table_span(table)?;
        self.run_recorded(UndoKind::SetBoxText, start, end, |e| {
            let paragraphs = e.doc.box_paragraphs(id)?;
            let lines: Vec<&str> = text.split('\n').collect();
            for (para, line) in paragraphs.iter().zip(&lines) {
                if let Some(node) = e.doc.nodes.text_mut(*para) {
                    node.text = line.to_string();
                }
            }
            let same_count = paragraphs.len() == lines.len();
            if lines.len() > paragraphs.len() {
                let last = *paragraphs
                    .last()
                    .ok_or_else(|| EditError::InvalidCommand(format!("{} has no paragraph", id)))?;
                let style = e
                    .doc
                    .nodes
                    .text(last)
                    .map(|t| t.style.clone())
                    .unwrap_or_else(|| e.doc.styles.default_style().clone());
                let mut at = e.doc.nodes.try_index_of(last)? + 1;
                for line in &lines[paragraphs.len()..] {
                    e.doc.insert_paragraph(at, line, &style)?;
                    at += 1;
                }
            } else {
                for para in &paragraphs[lines.len()..] {
                    e.doc.nodes.remove(*para);
                }
            }

            e.recognize_box(id)?;
            if same_count {
                for para in paragraphs {
                    e.layout.update_text_frame(&e.doc, para)?;
                }
            } else {
                e.layout.rebuild_table_frames(&e.doc, table)?;
            }
            Ok(())
        })
    }
}
