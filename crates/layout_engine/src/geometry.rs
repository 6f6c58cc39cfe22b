//! Frame geometry
//!
//! All layout code talks about the "variable" axis (the direction content
//! flows in) and the "fixed" axis through [`RectFnSet`], so it is written
//! once for horizontal and vertical writing. In horizontal layout the
//! variable axis is y growing downwards. In vertical (right to left) layout
//! it is x growing leftwards: the "top" of a frame is its right edge.

use doc_model::Twips;
use serde::{Deserialize, Serialize};

/// A rectangle in document coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: Twips,
    pub y: Twips,
    pub width: Twips,
    pub height: Twips,
}

impl Rect {
    pub fn new(x: Twips, y: Twips, width: Twips, height: Twips) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> Twips {
        self.x + self.width
    }

    pub fn bottom(&self) -> Twips {
        self.y + self.height
    }

    pub fn contains(&self, x: Twips, y: Twips) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

/// Width and height
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: Twips,
    pub height: Twips,
}

impl Size {
    pub fn new(width: Twips, height: Twips) -> Self {
        Self { width, height }
    }
}

/// Print area: offsets of the content box inside the frame area
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insets {
    pub top: Twips,
    pub bottom: Twips,
    pub left: Twips,
    pub right: Twips,
}

impl Insets {
    pub fn uniform(v: Twips) -> Self {
        Self {
            top: v,
            bottom: v,
            left: v,
            right: v,
        }
    }

    /// Print area of `frame` in absolute coordinates
    pub fn print_rect(&self, frame: &Rect) -> Rect {
        Rect {
            x: frame.x + self.left,
            y: frame.y + self.top,
            width: (frame.width - self.left - self.right).max(0),
            height: (frame.height - self.top - self.bottom).max(0),
        }
    }
}

/// Axis-aware accessors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RectFnSet {
    vertical: bool,
}

impl RectFnSet {
    pub fn new(vertical: bool) -> Self {
        Self { vertical }
    }

    pub fn is_vertical(&self) -> bool {
        self.vertical
    }

    /// Extent along the variable axis
    pub fn height(&self, r: &Rect) -> Twips {
        if self.vertical {
            r.width
        } else {
            r.height
        }
    }

    /// Extent along the fixed axis
    pub fn width(&self, r: &Rect) -> Twips {
        if self.vertical {
            r.height
        } else {
            r.width
        }
    }

    pub fn size_height(&self, s: &Size) -> Twips {
        if self.vertical {
            s.width
        } else {
            s.height
        }
    }

    pub fn size_width(&self, s: &Size) -> Twips {
        if self.vertical {
            s.height
        } else {
            s.width
        }
    }

    /// Start of the frame along the variable axis
    pub fn top(&self, r: &Rect) -> Twips {
        if self.vertical {
            r.right()
        } else {
            r.y
        }
    }

    /// End of the frame along the variable axis
    pub fn bottom(&self, r: &Rect) -> Twips {
        if self.vertical {
            r.x
        } else {
            r.bottom()
        }
    }

    /// Start along the fixed axis
    pub fn left(&self, r: &Rect) -> Twips {
        if self.vertical {
            r.y
        } else {
            r.x
        }
    }

    /// Change the variable extent, keeping the top in place
    pub fn set_height(&self, r: &mut Rect, height: Twips) {
        if self.vertical {
            let right = r.right();
            r.width = height;
            r.x = right - height;
        } else {
            r.height = height;
        }
    }

    pub fn set_width(&self, r: &mut Rect, width: Twips) {
        if self.vertical {
            r.height = width;
        } else {
            r.width = width;
        }
    }

    /// Move the bottom by `diff` (positive grows)
    pub fn add_bottom(&self, r: &mut Rect, diff: Twips) {
        let h = self.height(r);
        self.set_height(r, h + diff);
    }

    /// Move the frame so its top sits at `top`
    pub fn set_top(&self, r: &mut Rect, top: Twips) {
        if self.vertical {
            r.x = top - r.width;
        } else {
            r.y = top;
        }
    }

    pub fn set_left(&self, r: &mut Rect, left: Twips) {
        if self.vertical {
            r.y = left;
        } else {
            r.x = left;
        }
    }

    /// Distance from `a` to `b` along the flow direction
    pub fn y_diff(&self, a: Twips, b: Twips) -> Twips {
        if self.vertical {
            b - a
        } else {
            a - b
        }
    }

    /// Position `flow` twips after `top` in the flow direction
    pub fn y_inc(&self, top: Twips, flow: Twips) -> Twips {
        if self.vertical {
            top - flow
        } else {
            top + flow
        }
    }
}
