//! Column balancing
//!
//! A section with several columns is formatted by searching for a column
//! height. Content is flowed into the columns at a trial height; if some of
//! it overflows the trial is raised, if everything fits the trial is
//! lowered towards the tallest column. The lower bound only ever rises and
//! the upper bound only ever falls.

use crate::{FrameId, FrameKind, FrameLayout, Result};
use doc_model::Twips;
use std::ops::{Deref, DerefMut};

/// Iterations of the height search before the best fitting height is taken
const MAX_BALANCE_ITERATIONS: usize = 64;

/// Height used while measuring content, large enough to never overflow
const MEASURE_HEIGHT: Twips = i32::MAX as Twips;

/// Switches off wrap influence bookkeeping of a page while alive
pub struct WrapInfluenceGuard<'a> {
    layout: &'a mut FrameLayout,
    page: Option<FrameId>,
}

impl<'a> WrapInfluenceGuard<'a> {
    pub fn new(layout: &'a mut FrameLayout, page: Option<FrameId>) -> Self {
        if let Some(page) = page {
            *layout.wrap_influence_off.entry(page).or_insert(0) += 1;
        }
        Self { layout, page }
    }
}

impl Deref for WrapInfluenceGuard<'_> {
    type Target = FrameLayout;

    fn deref(&self) -> &FrameLayout {
        self.layout
    }
}

impl DerefMut for WrapInfluenceGuard<'_> {
    fn deref_mut(&mut self) -> &mut FrameLayout {
        self.layout
    }
}

impl Drop for WrapInfluenceGuard<'_> {
    fn drop(&mut self) {
        let Some(page) = self.page else {
            return;
        };
        if let Some(depth) = self.layout.wrap_influence_off.get_mut(&page) {
            *depth -= 1;
            if *depth == 0 {
                self.layout.wrap_influence_off.remove(&page);
            }
        }
    }
}

/// Items flowed into columns at one trial height
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFill {
    /// Column index of every item
    pub columns: Vec<usize>,
    /// Height that did not fit
    pub overflow: Twips,
    /// Height used by the fullest column
    pub tallest: Twips,
}

/// Flow items of the given heights into `count` columns of height `height`
pub fn fill_columns(heights: &[Twips], count: usize, height: Twips) -> ColumnFill {
    let mut fill = ColumnFill::default();
    let last = count.max(1) - 1;
    let mut col = 0;
    let mut used = 0;
    for &h in heights {
        if used > 0 && used + h > height && col < last {
            fill.tallest = fill.tallest.max(used);
            col += 1;
            used = 0;
        }
        used += h;
        fill.columns.push(col);
    }
    fill.tallest = fill.tallest.max(used);
    // What the last column cannot hold overflows, as does any single item
    // taller than a column
    let mut per_column = vec![0; last + 1];
    for (h, c) in heights.iter().zip(&fill.columns) {
        per_column[*c] += h;
    }
    fill.overflow = per_column.iter().map(|used| (used - height).max(0)).sum();
    fill
}

impl FrameLayout {
    pub fn is_wrap_influence_suppressed(&self, page: FrameId) -> bool {
        self.wrap_influence_off.contains_key(&page)
    }

    /// Content frames of a column section in flow order
    pub fn column_content(&self, section: FrameId) -> Result<Vec<FrameId>> {
        let mut out = Vec::new();
        for column in self.lowers(section)? {
            out.extend(self.lowers(self.body_of(column)?)?);
        }
        Ok(out)
    }

    /// Lay out a section of `count` columns. Balanced sections get the
    /// lowest column height that holds all content; others fill the room
    /// their upper offers.
    pub(crate) fn format_columns(&mut self, section: FrameId, count: u16, balanced: bool) -> Result<()> {
        let page = self.find_upper(section, |k| *k == FrameKind::Page)?;
        let mut this = WrapInfluenceGuard::new(self, page);
        this.format_width_cols(section, count.max(1) as usize, balanced)
    }

    fn format_width_cols(&mut self, section: FrameId, count: usize, balanced: bool) -> Result<()> {
        let fns = self.config.fns();
        let columns = self.lowers(section)?;
        if columns.is_empty() {
            return Ok(());
        }
        let print = self.print_rect(section)?;
        let width = fns.width(&print);
        let n = columns.len() as Twips;
        for (i, column) in columns.iter().enumerate() {
            let i = i as Twips;
            let left = fns.left(&print) + width * i / n;
            let right = fns.left(&print) + width * (i + 1) / n;
            self.place(*column, left, right - left, fns.top(&print))?;
        }

        // Measure every item at column width in the first column
        let items = self.column_content(section)?;
        let first_body = self.body_of(columns[0])?;
        for item in &items {
            self.remove_from_layout(*item)?;
            self.insert_before(*item, first_body, None)?;
        }
        self.set_column_height(columns[0], MEASURE_HEIGHT)?;
        self.reformat(columns[0])?;
        let mut heights = Vec::with_capacity(items.len());
        for item in &items {
            heights.push(self.height(*item)?);
        }

        let total: Twips = heights.iter().sum();
        let insets = self.get(section)?.flow_insets(self.config.vertical);
        let available = self.print_height(section)? + self.room_in_upper(section)?;
        let target = if balanced {
            self.balance_height(&items, &heights, count, total)?
        } else {
            available
        };

        let fill = fill_columns(&heights, columns.len(), target);
        tracing::trace!(
            "{} columns at {}: tallest {}, overflow {}",
            section,
            target,
            fill.tallest,
            fill.overflow
        );
        for (item, col) in items.iter().zip(&fill.columns) {
            let body = self.body_of(columns[*col])?;
            self.remove_from_layout(*item)?;
            self.insert_before(*item, body, None)?;
        }

        // The section follows the chosen height; columns are pinned to it
        let wanted = target + insets;
        let height = self.height(section)?;
        if wanted > height {
            self.grow_in_upper(section, wanted - height, false)?;
        } else if wanted < height {
            let old = self.print_rect(section)?.size();
            self.set_height(section, wanted)?;
            self.invalidate_next_pos(section)?;
            self.chg_lowers_prop(section, old)?;
        }
        let column_h = self.print_height(section)?;
        for column in &columns {
            self.set_column_height(*column, column_h)?;
            self.reformat(*column)?;
        }
        Ok(())
    }

    /// Bracketing search for the lowest column height holding everything
    fn balance_height(&mut self, items: &[FrameId], heights: &[Twips], count: usize, total: Twips) -> Result<Twips> {
        let mut min_diff = None;
        for item in items {
            let first_line = self.first_line_height(*item)?;
            if first_line > 0 {
                min_diff = Some(min_diff.map_or(first_line, |m: Twips| m.min(first_line)));
            }
        }
        let min_diff = min_diff.unwrap_or(self.config.min_balance_step).max(1);

        let mut minimum = total / count.max(1) as Twips;
        let mut maximum = total.max(minimum);
        let mut trial = minimum;
        for _ in 0..MAX_BALANCE_ITERATIONS {
            self.stats.column_passes += 1;
            let fill = fill_columns(heights, count, trial);
            tracing::trace!(
                "balance trial {} in [{}, {}]: overflow {}",
                trial,
                minimum,
                maximum,
                fill.overflow
            );
            if fill.overflow > 0 {
                minimum = trial + 1;
                let step = (fill.overflow / count as Twips).max(min_diff);
                trial = (trial + step).min(maximum);
            } else {
                maximum = trial;
                let slack = trial - fill.tallest;
                if slack < min_diff {
                    break;
                }
                trial = fill.tallest.max(minimum);
            }
            if minimum >= maximum {
                break;
            }
        }
        Ok(maximum)
    }

    /// Height of the first line of a content frame
    fn first_line_height(&self, item: FrameId) -> Result<Twips> {
        let frame = self.get(item)?;
        Ok(match frame.kind {
            FrameKind::Text { .. } => self.config.metrics.line_height.min(self.height(item)?),
            _ => match frame.first_lower() {
                Some(first) => self.first_line_height(first)?,
                None => self.height(item)?,
            },
        })
    }

    /// Space the upper of `id` could still hand out
    fn room_in_upper(&self, id: FrameId) -> Result<Twips> {
        let Some(upper) = self.upper(id)? else {
            return Ok(0);
        };
        Ok((self.print_height(upper)? - self.content_height(upper)?).max(0))
    }

    fn set_column_height(&mut self, column: FrameId, height: Twips) -> Result<()> {
        if self.height(column)? == height {
            return Ok(());
        }
        let old = self.print_rect(column)?.size();
        self.set_height(column, height)?;
        self.chg_lowers_prop(column, old)?;
        Ok(())
    }

    /// Format a frame again from scratch
    pub(crate) fn reformat(&mut self, id: FrameId) -> Result<()> {
        self.invalidate_all(id)?;
        self.format_frame(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Frame, LayoutConfig};
    use doc_model::NodeId;

    #[test]
    fn test_fill_columns() {
        let fill = fill_columns(&[100, 100, 100, 100], 2, 200);
        assert_eq!(fill.columns, vec![0, 0, 1, 1]);
        assert_eq!(fill.overflow, 0);
        assert_eq!(fill.tallest, 200);

        let fill = fill_columns(&[100, 100, 100], 2, 100);
        assert_eq!(fill.columns, vec![0, 1, 1]);
        assert_eq!(fill.overflow, 100);
    }

    #[test]
    fn test_tall_item_overflows() {
        let fill = fill_columns(&[500], 3, 200);
        assert_eq!(fill.overflow, 300);
    }

    fn section_layout(chars: &[usize], columns: u16, balanced: bool) -> (FrameLayout, FrameId) {
        let mut layout = FrameLayout::new(LayoutConfig::letter());
        let body = layout.main_body().unwrap();
        let section = layout.alloc(Frame::new(FrameKind::Section {
            node: NodeId::new(),
            columns,
            balanced,
        }));
        let mut first_body = None;
        for _ in 0..columns {
            let column = layout.alloc(Frame::new(FrameKind::Column));
            let col_body = layout.alloc(Frame::new(FrameKind::Body));
            layout.insert_before(col_body, column, None).unwrap();
            layout.insert_before(column, section, None).unwrap();
            first_body.get_or_insert(col_body);
        }
        for c in chars {
            let text = layout.alloc(Frame::new(FrameKind::Text {
                node: NodeId::new(),
                chars: *c,
            }));
            layout.insert_before(text, first_body.unwrap(), None).unwrap();
        }
        layout.insert_before(section, body, None).unwrap();
        (layout, section)
    }

    #[test]
    fn test_balanced_columns_share_content() {
        // Four one-line paragraphs in two columns: two lines each
        let (mut layout, section) = section_layout(&[1, 1, 1, 1], 2, true);
        layout.format().unwrap();
        let columns = layout.lowers(section).unwrap();
        let first = layout.lowers(layout.body_of(columns[0]).unwrap()).unwrap();
        let second = layout.lowers(layout.body_of(columns[1]).unwrap()).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(layout.height(section).unwrap(), 480);
        assert!(layout.stats.column_passes > 0);
    }

    #[test]
    fn test_unbalanced_columns_fill_first() {
        let (mut layout, section) = section_layout(&[1, 1, 1, 1], 2, false);
        layout.format().unwrap();
        let columns = layout.lowers(section).unwrap();
        let first = layout.lowers(layout.body_of(columns[0]).unwrap()).unwrap();
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_guard_restores_wrap_influence() {
        let (mut layout, section) = section_layout(&[1], 2, true);
        let page = layout.pages().unwrap()[0];
        {
            let guard = WrapInfluenceGuard::new(&mut layout, Some(page));
            assert!(guard.is_wrap_influence_suppressed(page));
        }
        assert!(!layout.is_wrap_influence_suppressed(page));
        layout.format().unwrap();
        assert!(!layout.is_wrap_influence_suppressed(page));
        assert!(layout.contains(section));
    }
}
