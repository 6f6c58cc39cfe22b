//! Table, line and box formats
//!
//! Formats are shared between boxes (and lines) that look the same. They are
//! held in an [`Arc`] and treated as immutable while shared: every mutation
//! goes through [`claim`], which clones the format first when anyone else
//! still holds it.

use crate::PageBreak;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Layout unit (1/20 pt)
pub type Twips = i64;

/// Get a private, mutable copy of a shared format
pub fn claim<T: Clone>(format: &mut Arc<T>) -> &mut T {
    Arc::make_mut(format)
}

/// Whether a format instance is held by more than one owner
pub fn is_shared<T>(format: &Arc<T>) -> bool {
    Arc::strong_count(format) > 1
}

// =============================================================================
// Borders
// =============================================================================

/// Border line style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BorderLineStyle {
    #[default]
    Solid,
    Double,
    Dotted,
    Dashed,
    Thick,
}

/// A single border line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderLine {
    pub style: BorderLineStyle,
    pub width: Twips,
    /// CSS color string
    pub color: String,
}

impl Default for BorderLine {
    fn default() -> Self {
        Self {
            style: BorderLineStyle::Solid,
            width: 10,
            color: "#000000".to_string(),
        }
    }
}

impl BorderLine {
    pub fn solid(width: Twips, color: &str) -> Self {
        Self {
            style: BorderLineStyle::Solid,
            width,
            color: color.to_string(),
        }
    }
}

/// Borders of a box (all four sides)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxBorders {
    pub top: Option<BorderLine>,
    pub bottom: Option<BorderLine>,
    pub left: Option<BorderLine>,
    pub right: Option<BorderLine>,
}

impl BoxBorders {
    pub fn all(line: BorderLine) -> Self {
        Self {
            top: Some(line.clone()),
            bottom: Some(line.clone()),
            left: Some(line.clone()),
            right: Some(line),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.bottom.is_none() && self.left.is_none() && self.right.is_none()
    }
}

// =============================================================================
// Box format
// =============================================================================

/// Vertical alignment of box content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VertOrient {
    #[default]
    Top,
    Center,
    Bottom,
}

/// Formatting of a table box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxFormat {
    /// Width in table units
    pub width: Twips,
    pub borders: BoxBorders,
    /// Background color
    pub shading: Option<String>,
    pub vert_orient: VertOrient,
    /// Content is write-protected
    pub protected: bool,
    /// Number format recognized for the content
    pub num_format: Option<u32>,
    /// Cached numeric value of the content
    pub value: Option<f64>,
    /// Formula computing the content
    pub formula: Option<String>,
}

impl BoxFormat {
    pub fn with_width(width: Twips) -> Self {
        Self {
            width,
            ..Default::default()
        }
    }

    pub fn with_borders(mut self, borders: BoxBorders) -> Self {
        self.borders = borders;
        self
    }

    /// Clear cached computation state
    pub fn reset_value(&mut self) {
        self.num_format = None;
        self.value = None;
        self.formula = None;
    }
}

impl Default for BoxFormat {
    fn default() -> Self {
        Self {
            width: 0,
            borders: BoxBorders::default(),
            shading: None,
            vert_orient: VertOrient::Top,
            protected: false,
            num_format: None,
            value: None,
            formula: None,
        }
    }
}

// =============================================================================
// Line format
// =============================================================================

/// How a row height is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeightRule {
    /// Grows with the content
    #[default]
    Auto,
    /// At least the given height
    AtLeast,
    /// Exactly the given height
    Exact,
}

/// Formatting of a table line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineFormat {
    pub height: Twips,
    pub height_rule: HeightRule,
    /// Row must not be split across pages
    pub cant_split: bool,
}

impl LineFormat {
    pub fn with_height(height: Twips, rule: HeightRule) -> Self {
        Self {
            height,
            height_rule: rule,
            cant_split: false,
        }
    }
}

// =============================================================================
// Table format
// =============================================================================

/// Horizontal adjustment of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableAdjust {
    Left,
    Right,
    Center,
    /// Fills the available width
    #[default]
    Full,
    /// Left aligned with an explicit width
    LeftAndWidth,
    /// Position and width given explicitly
    Manual,
}

impl TableAdjust {
    /// Number of entries an explicit column-position array must have
    pub fn column_positions_len(&self, cols: usize) -> usize {
        match self {
            TableAdjust::Manual => cols + 2,
            _ => cols + 1,
        }
    }
}

/// Formatting of a whole table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFormat {
    pub name: String,
    /// Sum of the box widths of a line, in table units
    pub width: Twips,
    pub adjust: TableAdjust,
    pub left_space: Twips,
    pub right_space: Twips,
    pub borders: BoxBorders,
    pub shadow: bool,
    /// Text runs top to bottom (vertical writing)
    pub vertical: bool,
    pub page_break: Option<PageBreak>,
    pub page_desc: Option<String>,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            name: String::new(),
            width: 0,
            adjust: TableAdjust::Full,
            left_space: 0,
            right_space: 0,
            borders: BoxBorders::default(),
            shadow: false,
            vertical: false,
            page_break: None,
            page_desc: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_clones_shared_format() {
        let shared = Arc::new(BoxFormat::with_width(100));
        let mut a = Arc::clone(&shared);
        let b = Arc::clone(&shared);
        assert!(is_shared(&a));
        claim(&mut a).width = 50;
        assert_eq!(a.width, 50);
        assert_eq!(b.width, 100);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_claim_mutates_private_format_in_place() {
        let mut only = Arc::new(BoxFormat::with_width(100));
        let before = Arc::as_ptr(&only);
        claim(&mut only).width = 70;
        assert_eq!(Arc::as_ptr(&only), before);
    }

    #[test]
    fn test_column_positions_len() {
        assert_eq!(TableAdjust::Full.column_positions_len(3), 4);
        assert_eq!(TableAdjust::Manual.column_positions_len(3), 5);
    }
}
