//! Formatting pass
//!
//! Formatting walks the tree top-down and only descends into frames that
//! are invalid or have invalid lowers. Paragraph heights come from the text
//! metrics; growing or shrinking them goes through [`FrameLayout::grow`] and
//! [`FrameLayout::shrink`] so every upper sees the change.

use crate::{lowers::scale, FrameId, FrameKind, FrameLayout, Result, Validity};
use doc_model::Twips;

/// Passes over the tree before giving up on convergence
const MAX_FORMAT_PASSES: usize = 8;

impl FrameLayout {
    /// Format everything that is invalid
    pub fn format(&mut self) -> Result<()> {
        let root = self.root();
        for _ in 0..MAX_FORMAT_PASSES {
            if self.is_formatted(root)? {
                return Ok(());
            }
            self.format_frame(root)?;
        }
        if !self.is_formatted(root)? {
            tracing::warn!("layout did not settle after {} passes", MAX_FORMAT_PASSES);
        }
        Ok(())
    }

    pub fn is_formatted(&self, id: FrameId) -> Result<bool> {
        let frame = self.get(id)?;
        Ok(frame.valid.is_valid() && !frame.lowers_dirty)
    }

    pub fn format_frame(&mut self, id: FrameId) -> Result<()> {
        if self.is_formatted(id)? {
            return Ok(());
        }
        self.stats.frames_formatted += 1;
        let kind = self.kind(id)?.clone();
        match kind {
            FrameKind::Root => self.format_root(id)?,
            FrameKind::Text { chars, .. } => self.format_text(id, chars)?,
            FrameKind::Page | FrameKind::Column => self.format_boss(id)?,
            FrameKind::Row(_) => self.format_row(id)?,
            FrameKind::Section { columns, balanced, .. } if columns > 1 => {
                self.format_columns(id, columns, balanced)?
            }
            FrameKind::Table(_) => {
                self.format_stacked(id)?;
                self.fix_spanning_cells(id)?;
                self.size_to_content(id)?;
            }
            FrameKind::Cell { .. } | FrameKind::Section { .. } => {
                self.format_stacked(id)?;
                self.size_to_content(id)?;
            }
            _ => self.format_stacked(id)?,
        }
        let dirty = self.has_unformatted_lowers(id)?;
        let frame = self.get_mut(id)?;
        frame.valid = Validity::all();
        frame.lowers_dirty = dirty;
        Ok(())
    }

    fn has_unformatted_lowers(&self, id: FrameId) -> Result<bool> {
        for lower in self.lowers(id)? {
            if !self.is_formatted(lower)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Move and resize `id`; a moved subtree is shifted along, a resized
    /// one is formatted again
    pub(crate) fn place(&mut self, id: FrameId, left: Twips, width: Twips, top: Twips) -> Result<()> {
        let fns = self.config.fns();
        let (old_area, old_print) = {
            let frame = self.get(id)?;
            (frame.area, frame.print_rect().size())
        };
        let mut area = old_area;
        fns.set_width(&mut area, width.max(0));
        fns.set_left(&mut area, left);
        fns.set_top(&mut area, top);
        if area == old_area {
            return Ok(());
        }
        let (dx, dy) = (area.x - old_area.x, area.y - old_area.y);
        let resized = area.width != old_area.width || area.height != old_area.height;
        self.get_mut(id)?.area = area;
        if dx != 0 || dy != 0 {
            for lower in self.subtree(id)?.into_iter().skip(1) {
                let frame = self.get_mut(lower)?;
                frame.area.x += dx;
                frame.area.y += dy;
            }
        }
        if resized {
            self.invalidate_size(id)?;
            self.chg_lowers_prop(id, old_print)?;
        }
        Ok(())
    }

    fn format_root(&mut self, id: FrameId) -> Result<()> {
        let mut y = 0;
        for page in self.lowers(id)? {
            let dy = y - self.area(page)?.y;
            if dy != 0 {
                for f in self.subtree(page)? {
                    self.get_mut(f)?.area.y += dy;
                }
            }
            self.format_frame(page)?;
            y += self.area(page)?.height;
        }
        Ok(())
    }

    /// Lowers stacked along the variable axis, each as wide as the print area
    fn format_stacked(&mut self, id: FrameId) -> Result<()> {
        let fns = self.config.fns();
        let print = self.print_rect(id)?;
        let mut cursor = fns.top(&print);
        for lower in self.lowers(id)? {
            self.place(lower, fns.left(&print), fns.width(&print), cursor)?;
            self.format_frame(lower)?;
            cursor = fns.y_inc(cursor, self.height(lower)?);
        }
        Ok(())
    }

    /// Page or column: the body takes what the fixed regions leave
    fn format_boss(&mut self, id: FrameId) -> Result<()> {
        let body = self.body_of(id)?;
        let mut fixed = 0;
        for lower in self.lowers(id)? {
            if self.kind(lower)?.is_fixed_region() {
                fixed += self.height(lower)?;
            }
        }
        let body_h = (self.print_height(id)? - fixed).max(0);
        if self.height(body)? != body_h {
            let old = self.print_rect(body)?.size();
            self.set_height(body, body_h)?;
            self.chg_lowers_prop(body, old)?;
        }
        self.format_stacked(id)
    }

    fn format_text(&mut self, id: FrameId, chars: usize) -> Result<()> {
        let fns = self.config.fns();
        let (width, insets, min, exact) = {
            let frame = self.get(id)?;
            (
                fns.width(&frame.print_rect()),
                frame.flow_insets(self.config.vertical),
                frame.min_height,
                frame.exact_height,
            )
        };
        let need = if exact {
            min
        } else {
            (self.config.metrics.text_height(chars, width) + insets).max(min)
        };
        let height = self.height(id)?;
        if need > height {
            let got = self.grow(id, need - height, false)?;
            if got < need - height {
                tracing::debug!("{} truncated: {} of {} twips missing", id, need - height - got, need);
            }
        } else if need < height {
            self.shrink(id, height - need, false)?;
        }
        Ok(())
    }

    /// Cells side by side, widths proportional to the box widths
    fn format_row(&mut self, id: FrameId) -> Result<()> {
        let fns = self.config.fns();
        let print = self.print_rect(id)?;
        let cells = self.lowers(id)?;
        let mut prefs = Vec::with_capacity(cells.len());
        for cell in &cells {
            prefs.push(self.get(*cell)?.pref_width.unwrap_or(1).max(0));
        }
        let total: Twips = prefs.iter().sum();
        let width = fns.width(&print);
        let mut offset = 0;
        for (cell, pref) in cells.iter().zip(prefs) {
            let left = scale(offset, width, total);
            let right = scale(offset + pref, width, total);
            offset += pref;
            self.place(*cell, fns.left(&print) + left, right - left, fns.top(&print))?;
            // Cells are as tall as their row
            if !matches!(self.kind(*cell)?, FrameKind::Cell { row_span, .. } if *row_span > 1) {
                let row_h = fns.height(&print);
                if self.height(*cell)? != row_h {
                    let old = self.print_rect(*cell)?.size();
                    self.set_height(*cell, row_h)?;
                    self.chg_lowers_prop(*cell, old)?;
                }
            }
            self.format_frame(*cell)?;
        }
        // A cell growing the row re-pinned the ones before it
        for cell in &cells {
            self.format_frame(*cell)?;
        }
        self.size_to_content(id)
    }

    /// Cells spanning rows cover the height of all of them
    fn fix_spanning_cells(&mut self, table: FrameId) -> Result<()> {
        for row in self.lowers(table)? {
            for cell in self.lowers(row)? {
                let FrameKind::Cell { row_span, .. } = *self.kind(cell)? else {
                    continue;
                };
                if row_span <= 1 {
                    continue;
                }
                let rows = self.spanned_rows(cell, row_span)?;
                let mut spanned = 0;
                for r in &rows {
                    spanned += self.height(*r)?;
                }
                let need = self.needed_height(cell)?;
                if need > spanned {
                    if let Some(&end) = rows.last() {
                        spanned += self.grow(end, need - spanned, false)?;
                    }
                }
                if self.height(cell)? != spanned {
                    let old = self.print_rect(cell)?.size();
                    self.set_height(cell, spanned)?;
                    self.chg_lowers_prop(cell, old)?;
                }
            }
        }
        Ok(())
    }

    /// Make a content sized frame exactly as tall as its content
    fn size_to_content(&mut self, id: FrameId) -> Result<()> {
        if let Some(upper) = self.upper(id)? {
            if self.is_side_by_side(upper)? {
                return Ok(());
            }
        }
        let need = self.needed_height(id)?;
        let height = self.height(id)?;
        if need > height {
            self.grow_in_upper(id, need - height, false)?;
        } else if need < height {
            self.fit_to_content(id)?;
        }
        Ok(())
    }
}
