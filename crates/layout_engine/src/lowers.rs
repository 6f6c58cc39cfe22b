//! Passing a size change of a frame on to its lowers

use crate::{FrameId, FrameKind, FrameLayout, Result, Size};
use doc_model::Twips;

/// `value * num / den`, switching to floating point when the product could
/// leave the 64 bit range
pub fn scale(value: Twips, num: Twips, den: Twips) -> Twips {
    if den == 0 {
        return value;
    }
    const SAFE: Twips = i32::MAX as Twips;
    if value.abs() < SAFE && num.abs() < SAFE {
        value * num / den
    } else {
        (value as f64 * num as f64 / den as f64).round() as Twips
    }
}

impl FrameLayout {
    /// Adapt the lowers of `id` after its print area changed from
    /// `old_print`. Returns the lowers that were touched.
    pub fn chg_lowers_prop(&mut self, id: FrameId, old_print: Size) -> Result<Vec<FrameId>> {
        let fns = self.config.fns();
        let new_print = self.print_rect(id)?.size();
        let (old_h, new_h) = (fns.size_height(&old_print), fns.size_height(&new_print));
        let (old_w, new_w) = (fns.size_width(&old_print), fns.size_width(&new_print));
        if old_h == new_h && old_w == new_w {
            return Ok(Vec::new());
        }
        let kind = self.kind(id)?.clone();
        let lowers = self.lowers(id)?;

        // Stacked content only cares about the variable axis at its end
        let stacked = match kind {
            FrameKind::Body => true,
            FrameKind::Section { columns, .. } => columns <= 1,
            _ => false,
        };
        if stacked && old_w == new_w {
            let mut touched = Vec::new();
            for lower in lowers.iter().rev() {
                if self.height(*lower)? > 0 {
                    touched.push(*lower);
                    if let Some(next) = self.get(*lower)?.next() {
                        touched.push(next);
                    }
                    break;
                }
            }
            for t in &touched {
                self.invalidate_size(*t)?;
            }
            return Ok(touched);
        }

        let mut fixed_regions = 0;
        if kind.is_footnote_boss() {
            for lower in &lowers {
                if self.kind(*lower)?.is_fixed_region() {
                    fixed_regions += self.height(*lower)?;
                }
            }
        }

        let mut touched = Vec::new();
        for lower in lowers {
            let (lower_kind, old_area, lower_old_print) = {
                let frame = self.get(lower)?;
                (frame.kind.clone(), frame.area, frame.print_rect().size())
            };
            let mut area = old_area;
            if old_w != new_w {
                let w = fns.width(&area);
                fns.set_width(&mut area, scale(w, new_w, old_w));
            }
            if old_h != new_h {
                let h = fns.height(&area);
                match lower_kind {
                    FrameKind::Body if kind.is_footnote_boss() => fns.set_height(&mut area, new_h - fixed_regions),
                    FrameKind::Column => fns.set_height(&mut area, new_h),
                    FrameKind::Cell { row_span, .. } if kind.is_row() && row_span <= 1 => {
                        fns.set_height(&mut area, new_h)
                    }
                    ref k if k.is_fixed_region() || k.is_content_sized() => {}
                    _ => fns.set_height(&mut area, scale(h, new_h, old_h)),
                }
            }
            if area == old_area {
                continue;
            }
            self.get_mut(lower)?.area = area;
            self.invalidate_size(lower)?;
            self.invalidate_pos(lower)?;
            touched.push(lower);
            if !lower_kind.is_text() {
                self.chg_lowers_prop(lower, lower_old_print)?;
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Frame, LayoutConfig};
    use doc_model::NodeId;

    #[test]
    fn test_scale_small_and_huge() {
        assert_eq!(scale(300, 2, 3), 200);
        assert_eq!(scale(0, 5, 0), 0);
        let big: Twips = 1 << 40;
        assert_eq!(scale(big, 2, 4), 1 << 39);
        // The integer product would overflow
        assert_eq!(scale(big, 1 << 30, 1 << 30), big);
    }

    #[test]
    fn test_page_resize_pins_body() {
        let mut layout = FrameLayout::new(LayoutConfig::letter());
        let page = layout.pages().unwrap()[0];
        let body = layout.main_body().unwrap();
        let footer = layout.alloc(Frame::new(FrameKind::Footer));
        layout.insert_before(footer, page, None).unwrap();
        layout.grow(footer, 500, false).unwrap();

        let old = layout.print_rect(page).unwrap().size();
        layout.set_height(page, 20000).unwrap();
        let touched = layout.chg_lowers_prop(page, old).unwrap();
        assert_eq!(touched, vec![body]);
        let print = layout.print_height(page).unwrap();
        assert_eq!(layout.height(body).unwrap(), print - 500);
        assert_eq!(layout.height(footer).unwrap(), 500);
    }

    #[test]
    fn test_width_change_scales_lowers() {
        let mut layout = FrameLayout::new(LayoutConfig::letter());
        let page = layout.pages().unwrap()[0];
        let body = layout.main_body().unwrap();
        let old_w = layout.width(body).unwrap();

        let old = layout.print_rect(page).unwrap().size();
        let mut area = layout.area(page).unwrap();
        area.width += old_w;
        layout.get_mut(page).unwrap().area = area;
        layout.chg_lowers_prop(page, old).unwrap();
        assert_eq!(layout.width(body).unwrap(), 2 * old_w);
    }

    #[test]
    fn test_body_fast_path_touches_last_content() {
        let mut layout = FrameLayout::new(LayoutConfig::letter());
        let body = layout.main_body().unwrap();
        let mut texts = Vec::new();
        for h in [400, 400, 0] {
            let id = layout.alloc(Frame::new(FrameKind::Text {
                node: NodeId::new(),
                chars: 0,
            }));
            layout.insert_before(id, body, None).unwrap();
            layout.set_height(id, h).unwrap();
            texts.push(id);
        }
        let old = layout.print_rect(body).unwrap().size();
        let h = layout.height(body).unwrap();
        layout.set_height(body, h - 1000).unwrap();
        let touched = layout.chg_lowers_prop(body, old).unwrap();
        assert_eq!(touched, vec![texts[1], texts[2]]);
    }
}
