//! Grow and shrink propagation
//!
//! A frame that needs more room asks for it with [`FrameLayout::grow`]. The
//! request is served from the free space of the upper first; what is still
//! missing is requested from the upper in turn. Fixed regions of a page
//! (header, footer, footnote area) take their room from the body next to
//! them instead. In test mode the same code runs and reports what would be
//! granted without changing anything.

use crate::{FrameId, FrameKind, FrameLayout, Result, Size};
use doc_model::Twips;

/// How a footnote boss serves a fixed region that wants to grow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighbourhoodAdjust {
    /// Take the room from the body only
    OnlyAdjust,
    /// Grow the boss first, then take from the body
    GrowAdjust,
    /// Take from the body first, then grow the boss
    AdjustGrow,
}

impl FrameLayout {
    pub fn neighbourhood_policy(&self, boss: FrameId) -> Result<NeighbourhoodAdjust> {
        let policy = match self.kind(boss)? {
            FrameKind::Page if self.config.browse_mode && self.pages()?.len() == 1 => {
                NeighbourhoodAdjust::GrowAdjust
            }
            FrameKind::Column => {
                let balanced = match self.upper(boss)? {
                    Some(section) => matches!(self.kind(section)?, FrameKind::Section { balanced: true, .. }),
                    None => false,
                };
                if balanced {
                    NeighbourhoodAdjust::AdjustGrow
                } else {
                    NeighbourhoodAdjust::OnlyAdjust
                }
            }
            _ => NeighbourhoodAdjust::OnlyAdjust,
        };
        Ok(policy)
    }

    /// Lowers of `id` sit next to each other along the fixed axis
    pub(crate) fn is_side_by_side(&self, id: FrameId) -> Result<bool> {
        Ok(match self.kind(id)? {
            FrameKind::Row(_) => true,
            FrameKind::Section { columns, .. } => *columns > 1,
            _ => false,
        })
    }

    /// Room left in `upper` for `child` to grow into
    fn free_space(&self, upper: FrameId, child: FrameId) -> Result<Twips> {
        let free = if self.is_side_by_side(upper)? {
            self.print_height(upper)? - self.height(child)?
        } else {
            self.print_height(upper)? - self.content_height(upper)?
        };
        Ok(free.max(0))
    }

    fn print_size(&self, id: FrameId) -> Result<Size> {
        Ok(self.print_rect(id)?.size())
    }

    // =========================================================================
    // Grow
    // =========================================================================

    /// Grow `id` by `diff` along the variable axis; returns the amount
    /// granted. With `test` set the layout is left untouched.
    pub fn grow(&mut self, id: FrameId, diff: Twips, test: bool) -> Result<Twips> {
        if diff <= 0 {
            return Ok(0);
        }
        let got = self.grow_frame(id, diff, test)?;
        tracing::trace!("grow {} by {}: granted {} (test: {})", id, diff, got, test);
        Ok(got)
    }

    fn grow_frame(&mut self, id: FrameId, diff: Twips, test: bool) -> Result<Twips> {
        let (kind, exact) = {
            let frame = self.get(id)?;
            (frame.kind.clone(), frame.exact_height)
        };
        match kind {
            FrameKind::Root => Ok(diff),
            FrameKind::Page => self.grow_page(id, diff, test),
            FrameKind::Body => self.grow_body(id, diff, test),
            k if k.is_fixed_region() => self.adjust_neighbourhood(id, diff, test),
            _ if exact => Ok(0),
            FrameKind::Cell { row_span, .. } if row_span > 1 => self.grow_spanning_cell(id, row_span, diff, test),
            _ => self.grow_in_upper(id, diff, test),
        }
    }

    fn grow_page(&mut self, id: FrameId, diff: Twips, test: bool) -> Result<Twips> {
        if self.neighbourhood_policy(id)? != NeighbourhoodAdjust::GrowAdjust {
            return Ok(0);
        }
        if !test {
            self.apply_height(id, self.height(id)? + diff)?;
        }
        Ok(diff)
    }

    fn grow_body(&mut self, id: FrameId, diff: Twips, test: bool) -> Result<Twips> {
        let Some(boss) = self.upper(id)? else {
            return Ok(0);
        };
        if self.neighbourhood_policy(boss)? == NeighbourhoodAdjust::OnlyAdjust {
            return Ok(0);
        }
        let old = self.height(id)?;
        let got = self.grow_frame(boss, diff, test)?;
        if !test && got > 0 {
            // The boss pinned its body already; make sure it holds the full amount
            self.apply_height(id, old + got)?;
        }
        Ok(got)
    }

    pub(crate) fn grow_in_upper(&mut self, id: FrameId, diff: Twips, test: bool) -> Result<Twips> {
        let Some(upper) = self.upper(id)? else {
            return Ok(0);
        };
        let old = self.height(id)?;
        let slack = self.free_space(upper, id)?;
        let got = if slack >= diff {
            diff
        } else {
            slack + self.grow_frame(upper, diff - slack, test)?
        };
        if !test && got > 0 {
            self.apply_height(id, old + got)?;
        }
        Ok(got)
    }

    /// A cell spanning rows grows through the row its span ends in
    fn grow_spanning_cell(&mut self, id: FrameId, row_span: i32, diff: Twips, test: bool) -> Result<Twips> {
        let rows = self.spanned_rows(id, row_span)?;
        let Some(&end_row) = rows.last() else {
            return Ok(0);
        };
        let mut spanned = 0;
        for row in &rows {
            spanned += self.height(*row)?;
        }
        let old = self.height(id)?;
        let slack = (spanned - old).max(0);
        let got = if slack >= diff {
            diff
        } else {
            slack + self.grow_frame(end_row, diff - slack, test)?
        };
        if !test && got > 0 {
            self.apply_height(id, old + got)?;
        }
        Ok(got)
    }

    /// Rows covered by a cell spanning `row_span` rows, starting with its own
    pub fn spanned_rows(&self, cell: FrameId, row_span: i32) -> Result<Vec<FrameId>> {
        let mut rows = Vec::new();
        let mut cur = self.upper(cell)?;
        while let Some(row) = cur {
            if rows.len() as i32 >= row_span.max(1) {
                break;
            }
            rows.push(row);
            cur = self.get(row)?.next();
        }
        Ok(rows)
    }

    /// Set the variable extent of `id` and let the change ripple to its
    /// lowers and following sibling
    fn apply_height(&mut self, id: FrameId, height: Twips) -> Result<()> {
        let old_print = self.print_size(id)?;
        self.set_height(id, height)?;
        self.invalidate_next_pos(id)?;
        self.invalidate_print(id)?;
        if !self.kind(id)?.is_text() {
            self.chg_lowers_prop(id, old_print)?;
        }
        Ok(())
    }

    // =========================================================================
    // Fixed Regions
    // =========================================================================

    fn grow_boss(&mut self, boss: FrameId, diff: Twips, test: bool) -> Result<Twips> {
        match self.kind(boss)? {
            FrameKind::Page => self.grow_page(boss, diff, test),
            _ => self.grow_in_upper(boss, diff, test),
        }
    }

    /// Resize a fixed region by `diff` against the body of its boss.
    /// Returns the change actually made (negative when giving room back).
    pub fn adjust_neighbourhood(&mut self, id: FrameId, diff: Twips, test: bool) -> Result<Twips> {
        if diff == 0 {
            return Ok(0);
        }
        let Some(boss) = self.upper(id)? else {
            return Ok(0);
        };
        let body = self.body_of(boss)?;
        if body == id {
            return Ok(0);
        }
        let own = self.height(id)?;

        if diff < 0 {
            let back = (-diff).min(own);
            if !test && back > 0 {
                self.set_height(id, own - back)?;
                let body_h = self.height(body)?;
                self.set_height(body, body_h + back)?;
                self.after_neighbourhood_change(boss, body)?;
            }
            return Ok(-back);
        }

        let body_h = self.height(body)?;
        let (grown, take) = match self.neighbourhood_policy(boss)? {
            NeighbourhoodAdjust::OnlyAdjust => (0, diff.min(body_h)),
            NeighbourhoodAdjust::GrowAdjust => {
                let grown = self.grow_boss(boss, diff, test)?;
                (grown, (diff - grown).min(body_h))
            }
            NeighbourhoodAdjust::AdjustGrow => {
                let take = diff.min(body_h);
                let grown = if take < diff {
                    self.grow_boss(boss, diff - take, test)?
                } else {
                    0
                };
                (grown, take)
            }
        };
        let total = grown + take;
        if !test && total > 0 {
            self.set_height(id, own + total)?;
            // A grown boss handed its new room to the body
            let body_h = self.height(body)?;
            self.set_height(body, body_h - total)?;
            self.after_neighbourhood_change(boss, body)?;
        }
        Ok(total)
    }

    fn after_neighbourhood_change(&mut self, boss: FrameId, body: FrameId) -> Result<()> {
        for lower in self.lowers(boss)? {
            self.invalidate_pos(lower)?;
        }
        self.invalidate_print(body)?;
        self.invalidate_size(body)
    }

    // =========================================================================
    // Shrink
    // =========================================================================

    /// Shrink `id` by up to `diff`; returns the amount taken
    pub fn shrink(&mut self, id: FrameId, diff: Twips, test: bool) -> Result<Twips> {
        if diff <= 0 {
            return Ok(0);
        }
        let taken = self.shrink_frame(id, diff, test)?;
        tracing::trace!("shrink {} by {}: took {} (test: {})", id, diff, taken, test);
        Ok(taken)
    }

    fn shrink_frame(&mut self, id: FrameId, diff: Twips, test: bool) -> Result<Twips> {
        let kind = self.kind(id)?.clone();
        match kind {
            FrameKind::Root => Ok(0),
            FrameKind::Page => self.shrink_page(id, diff, test),
            FrameKind::Body => match self.upper(id)? {
                Some(boss) if *self.kind(boss)? == FrameKind::Page => self.shrink_page(boss, diff, test),
                _ => Ok(0),
            },
            k if k.is_fixed_region() => Ok(-self.adjust_neighbourhood(id, -diff, test)?),
            _ => {
                // Cells and columns follow their row or section
                if let Some(upper) = self.upper(id)? {
                    if self.is_side_by_side(upper)? {
                        return Ok(0);
                    }
                }
                self.shrink_stacked(id, diff, test)
            }
        }
    }

    fn shrink_page(&mut self, id: FrameId, diff: Twips, test: bool) -> Result<Twips> {
        if self.neighbourhood_policy(id)? != NeighbourhoodAdjust::GrowAdjust {
            return Ok(0);
        }
        let fns = self.config.fns();
        let floor = fns.size_height(&Size::new(self.config.page_width, self.config.page_height));
        let old = self.height(id)?;
        let take = diff.min(old - floor).max(0);
        if !test && take > 0 {
            self.apply_height(id, old - take)?;
        }
        Ok(take)
    }

    fn shrink_stacked(&mut self, id: FrameId, diff: Twips, test: bool) -> Result<Twips> {
        let frame = self.get(id)?;
        if frame.exact_height {
            return Ok(0);
        }
        let floor = if frame.kind.is_text() {
            frame.min_height
        } else {
            self.needed_height(id)?
        };
        let old = self.height(id)?;
        let take = diff.min(old - floor).max(0);
        if take == 0 || test {
            return Ok(take);
        }
        self.apply_height(id, old - take)?;
        if let Some(upper) = self.upper(id)? {
            self.fit_to_content(upper)?;
        }
        Ok(take)
    }

    /// Shrink a content sized frame down to what its lowers need
    pub fn fit_to_content(&mut self, id: FrameId) -> Result<()> {
        if !self.kind(id)?.is_content_sized() {
            return Ok(());
        }
        if let Some(upper) = self.upper(id)? {
            if self.is_side_by_side(upper)? {
                return self.fit_to_content(upper);
            }
        }
        let need = self.needed_height(id)?;
        let height = self.height(id)?;
        if need < height {
            self.shrink_stacked(id, height - need, false)?;
        }
        Ok(())
    }

    /// Height the content of `id` takes
    pub fn needed_height(&self, id: FrameId) -> Result<Twips> {
        let frame = self.get(id)?;
        let insets = frame.flow_insets(self.config.vertical);
        let need = match &frame.kind {
            FrameKind::Text { .. } => self.height(id)?,
            FrameKind::Row(_) => {
                if frame.exact_height {
                    return Ok(frame.min_height);
                }
                let mut tallest = 0;
                for cell in self.lowers(id)? {
                    if let FrameKind::Cell { row_span, .. } = self.kind(cell)? {
                        if *row_span > 1 {
                            continue;
                        }
                    }
                    tallest = tallest.max(self.needed_height(cell)?);
                }
                tallest + insets
            }
            FrameKind::Section { columns, .. } if *columns > 1 => {
                let mut tallest = 0;
                for column in self.lowers(id)? {
                    tallest = tallest.max(self.needed_height(column)?);
                }
                tallest + insets
            }
            FrameKind::Column => {
                let mut sum = 0;
                for lower in self.lowers(id)? {
                    sum += self.needed_height(lower)?;
                }
                sum + insets
            }
            FrameKind::Body
            | FrameKind::Table(_)
            | FrameKind::Cell { .. }
            | FrameKind::Section { .. } => self.content_height(id)? + insets,
            _ => self.height(id)?,
        };
        Ok(need.max(frame.min_height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Frame, LayoutConfig};
    use doc_model::NodeId;
    use proptest::prelude::*;

    fn with_text(config: LayoutConfig, heights: &[Twips]) -> (FrameLayout, Vec<FrameId>) {
        let mut layout = FrameLayout::new(config);
        let body = layout.main_body().unwrap();
        let mut texts = Vec::new();
        for h in heights {
            let mut frame = Frame::new(FrameKind::Text {
                node: NodeId::new(),
                chars: 0,
            });
            layout.config.fns().set_height(&mut frame.area, *h);
            let id = layout.alloc(frame);
            layout.insert_before(id, body, None).unwrap();
            texts.push(id);
        }
        (layout, texts)
    }

    #[test]
    fn test_grow_uses_body_slack() {
        let (mut layout, texts) = with_text(LayoutConfig::letter(), &[1000]);
        let body = layout.main_body().unwrap();
        let slack = layout.print_height(body).unwrap() - 1000;
        assert_eq!(layout.grow(texts[0], 500, false).unwrap(), 500);
        assert_eq!(layout.height(texts[0]).unwrap(), 1500);
        // Body is ONLY_ADJUST: nothing beyond the slack
        assert_eq!(layout.grow(texts[0], slack, false).unwrap(), slack - 500);
        assert_eq!(layout.grow(texts[0], 100, false).unwrap(), 0);
    }

    #[test]
    fn test_grow_in_test_mode_changes_nothing() {
        let (mut layout, texts) = with_text(LayoutConfig::letter(), &[1000, 2000]);
        let before = layout.height(texts[0]).unwrap();
        assert_eq!(layout.grow(texts[0], 700, true).unwrap(), 700);
        assert_eq!(layout.height(texts[0]).unwrap(), before);
    }

    #[test]
    fn test_browse_mode_page_grows() {
        let config = LayoutConfig::letter().with_browse_mode(true);
        let (mut layout, texts) = with_text(config, &[0]);
        let page = layout.pages().unwrap()[0];
        let body = layout.main_body().unwrap();
        let page_h = layout.height(page).unwrap();
        let body_h = layout.height(body).unwrap();
        let got = layout.grow(texts[0], body_h + 5000, false).unwrap();
        assert_eq!(got, body_h + 5000);
        assert_eq!(layout.height(page).unwrap(), page_h + 5000);
        assert_eq!(layout.height(body).unwrap(), body_h + 5000);

        assert_eq!(layout.shrink(texts[0], 5000, false).unwrap(), 5000);
        assert_eq!(layout.shrink(body, 10_000, false).unwrap(), 5000);
        assert_eq!(layout.height(page).unwrap(), page_h);
    }

    #[test]
    fn test_header_takes_from_body() {
        let mut layout = FrameLayout::new(LayoutConfig::letter());
        let page = layout.pages().unwrap()[0];
        let body = layout.main_body().unwrap();
        let header = layout.alloc(Frame::new(FrameKind::Header));
        layout.insert_before(header, page, Some(body)).unwrap();
        let body_h = layout.height(body).unwrap();

        assert_eq!(layout.grow(header, 720, false).unwrap(), 720);
        assert_eq!(layout.height(header).unwrap(), 720);
        assert_eq!(layout.height(body).unwrap(), body_h - 720);

        assert_eq!(layout.shrink(header, 1000, false).unwrap(), 720);
        assert_eq!(layout.height(body).unwrap(), body_h);
    }

    #[test]
    fn test_header_cannot_take_more_than_body() {
        let mut layout = FrameLayout::new(LayoutConfig::letter());
        let page = layout.pages().unwrap()[0];
        let body = layout.main_body().unwrap();
        let footer = layout.alloc(Frame::new(FrameKind::Footer));
        layout.insert_before(footer, page, None).unwrap();
        let body_h = layout.height(body).unwrap();
        assert_eq!(layout.grow(footer, body_h + 100, true).unwrap(), body_h);
    }

    #[test]
    fn test_shrink_respects_min_height() {
        let (mut layout, texts) = with_text(LayoutConfig::letter(), &[1000]);
        layout.get_mut(texts[0]).unwrap().min_height = 240;
        assert_eq!(layout.shrink(texts[0], 5000, false).unwrap(), 760);
        assert_eq!(layout.height(texts[0]).unwrap(), 240);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, failure_persistence: None, .. ProptestConfig::default() })]

        #[test]
        fn grow_test_mode_predicts_real(heights in prop::collection::vec(0i64..3000, 1..5), pick in 0usize..5, diff in 1i64..20_000, browse in any::<bool>()) {
            let config = LayoutConfig::letter().with_browse_mode(browse);
            let (mut layout, texts) = with_text(config, &heights);
            let id = texts[pick % texts.len()];
            let predicted = layout.grow(id, diff, true).unwrap();
            let before = layout.height(id).unwrap();
            let granted = layout.grow(id, diff, false).unwrap();
            prop_assert_eq!(predicted, granted);
            prop_assert_eq!(layout.height(id).unwrap(), before + granted);
        }
    }
}
