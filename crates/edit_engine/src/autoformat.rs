//! Table AutoFormat
//!
//! An AutoFormat is a 4x4 template of box attributes. Each box of a table
//! falls into one class by its position: first row, odd body row, even body
//! row or last row, crossed with first column, odd body column, even body
//! column or last column. Applying the template claims one format per class
//! and width, so boxes of the same class and width share it.

use doc_model::{BorderLine, BoxBorders, BoxFormat, BoxId, Document, NodeId, Twips, VertOrient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Attributes an AutoFormat sets on a box
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoFormatBox {
    pub borders: BoxBorders,
    pub shading: Option<String>,
    pub vert_orient: VertOrient,
    pub num_format: Option<u32>,
}

impl AutoFormatBox {
    /// Attributes of an existing box format
    pub fn from_format(format: &BoxFormat) -> Self {
        Self {
            borders: format.borders.clone(),
            shading: format.shading.clone(),
            vert_orient: format.vert_orient,
            num_format: format.num_format,
        }
    }

    pub fn apply_to(&self, format: &mut BoxFormat) {
        format.borders = self.borders.clone();
        format.shading = self.shading.clone();
        format.vert_orient = self.vert_orient;
        if self.num_format.is_some() {
            format.num_format = self.num_format;
        }
    }
}

/// A named 4x4 box attribute template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAutoFormat {
    pub name: String,
    boxes: [AutoFormatBox; 16],
}

impl TableAutoFormat {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boxes: Default::default(),
        }
    }

    /// Set the attributes of one class
    pub fn with_box(mut self, class: u8, attrs: AutoFormatBox) -> Self {
        if let Some(slot) = self.boxes.get_mut(class as usize) {
            *slot = attrs;
        }
        self
    }

    pub fn get(&self, class: u8) -> Option<&AutoFormatBox> {
        self.boxes.get(class as usize)
    }

    /// Class of the box at `row`/`col` of a `rows` x `cols` grid
    pub fn class_of(row: usize, rows: usize, col: usize, cols: usize) -> u8 {
        let row_part = if row == 0 {
            0
        } else if row + 1 == rows {
            12
        } else {
            4 + ((row - 1) % 2) as u8 * 4
        };
        let col_part = if col == 0 {
            0
        } else if col + 1 == cols {
            3
        } else {
            1 + ((col - 1) % 2) as u8
        };
        row_part + col_part
    }

    /// Thin borders everywhere, a shaded heading row and banded body rows
    pub fn classic() -> Self {
        let line = BorderLine::solid(10, "#000000");
        let plain = AutoFormatBox {
            borders: BoxBorders::all(line),
            ..Default::default()
        };
        let heading = AutoFormatBox {
            shading: Some("#D9D9D9".to_string()),
            ..plain.clone()
        };
        let banded = AutoFormatBox {
            shading: Some("#F2F2F2".to_string()),
            ..plain.clone()
        };
        let mut format = Self::new("Classic");
        for class in 0..16u8 {
            let attrs = match class / 4 {
                0 => heading.clone(),
                2 => banded.clone(),
                _ => plain.clone(),
            };
            format = format.with_box(class, attrs);
        }
        format
    }

    /// Read a template back from a grid of boxes, rows top to bottom.
    ///
    /// The first box met in a class supplies its attributes. Boxes holding
    /// nested lines stand for their first leaf.
    pub fn collect(doc: &Document, name: impl Into<String>, grid: &[Vec<BoxId>]) -> doc_model::Result<Self> {
        let mut format = Self::new(name);
        let mut seen = [false; 16];
        let rows = grid.len();
        for (row, boxes) in grid.iter().enumerate() {
            for (col, b) in boxes.iter().enumerate() {
                let class = Self::class_of(row, rows, col, boxes.len());
                if seen[class as usize] {
                    continue;
                }
                seen[class as usize] = true;
                let leaf = doc.first_leaf(*b)?;
                let attrs = AutoFormatBox::from_format(&doc.table_box(leaf)?.format);
                format = format.with_box(class, attrs);
            }
        }
        Ok(format)
    }

    /// Attributes for one box replacing a `rows` x `cols` grid: the top-left
    /// class with the right border of the top-right class and the bottom
    /// border of the bottom-left class
    pub fn merged_box(&self, rows: usize, cols: usize) -> AutoFormatBox {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let mut attrs = self.get(0).cloned().unwrap_or_default();
        if let Some(top_right) = self.get(Self::class_of(0, rows, cols - 1, cols)) {
            attrs.borders.right = top_right.borders.right.clone();
        }
        if let Some(bottom_left) = self.get(Self::class_of(rows - 1, rows, 0, cols)) {
            attrs.borders.bottom = bottom_left.borders.bottom.clone();
        }
        attrs
    }

    /// Apply the template to the top-level boxes of a table
    pub fn apply(&self, doc: &mut Document, table: NodeId) -> doc_model::Result<()> {
        let lines = doc.table(table)?.lines.clone();
        let rows = lines.len();
        // Formats by class and width, only for this pass
        let mut cache: HashMap<(u8, Twips), Arc<BoxFormat>> = HashMap::new();
        for (row, line) in lines.iter().enumerate() {
            let boxes = doc.line(*line)?.boxes.clone();
            let cols = boxes.len();
            for (col, b) in boxes.iter().enumerate() {
                let class = Self::class_of(row, rows, col, cols);
                let Some(attrs) = self.get(class) else {
                    continue;
                };
                let current = Arc::clone(&doc.table_box(*b)?.format);
                let format = cache
                    .entry((class, current.width))
                    .or_insert_with(|| {
                        let mut format = current.as_ref().clone();
                        attrs.apply_to(&mut format);
                        Arc::new(format)
                    })
                    .clone();
                doc.set_box_format(*b, format)?;
            }
        }
        tracing::debug!("autoformat {} applied to {}", self.name, table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::PoolStyle;

    #[test]
    fn test_position_classes() {
        // 4 rows x 4 cols covers every class once
        let mut seen = Vec::new();
        for row in 0..4 {
            for col in 0..4 {
                seen.push(TableAutoFormat::class_of(row, 4, col, 4));
            }
        }
        assert_eq!(seen, (0..16).collect::<Vec<u8>>());
        // Body rows alternate
        assert_eq!(TableAutoFormat::class_of(3, 6, 0, 3), 4);
        assert_eq!(TableAutoFormat::class_of(4, 6, 0, 3), 8);
        // A single column is the first column
        assert_eq!(TableAutoFormat::class_of(0, 1, 0, 1), 0);
    }

    #[test]
    fn test_apply_shares_formats_per_class() {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let table = doc.create_table(1, 5, &[500, 500, 500], &style, false).unwrap();
        TableAutoFormat::classic().apply(&mut doc, table).unwrap();

        let lines = doc.table(table).unwrap().lines.clone();
        let format = |row: usize, col: usize| {
            let b = doc.line(lines[row]).unwrap().boxes[col];
            Arc::clone(&doc.table_box(b).unwrap().format)
        };
        assert_eq!(format(0, 1).shading.as_deref(), Some("#D9D9D9"));
        assert_eq!(format(2, 1).shading.as_deref(), Some("#F2F2F2"));
        assert_eq!(format(1, 1).shading, None);
        assert_eq!(format(0, 1).width, 500);
        // Rows 1 and 3 are both odd body rows
        assert!(Arc::ptr_eq(&format(1, 1), &format(3, 1)));
        assert!(!Arc::ptr_eq(&format(1, 1), &format(2, 1)));
        doc.check_table(table).unwrap();
    }

    #[test]
    fn test_collect_and_merge_attributes() {
        let mut doc = Document::new();
        let style = doc.styles.get_or_create(PoolStyle::Table);
        let table = doc.create_table(1, 2, &[500, 500, 500], &style, false).unwrap();
        let lines = doc.table(table).unwrap().lines.clone();
        let grid: Vec<Vec<BoxId>> = lines.iter().map(|l| doc.line(*l).unwrap().boxes.clone()).collect();

        let blue = BorderLine::solid(10, "#0000FF");
        let red = BorderLine::solid(20, "#FF0000");
        {
            let top_left = doc.box_format_mut(grid[0][0]).unwrap();
            top_left.shading = Some("#FFFF00".to_string());
            top_left.vert_orient = VertOrient::Center;
            top_left.borders.left = Some(blue.clone());
        }
        doc.box_format_mut(grid[0][2]).unwrap().borders.right = Some(red.clone());
        doc.box_format_mut(grid[1][0]).unwrap().borders.bottom = Some(blue.clone());

        let template = TableAutoFormat::collect(&doc, "merge", &grid).unwrap();
        let merged = template.merged_box(2, 3);
        assert_eq!(merged.shading.as_deref(), Some("#FFFF00"));
        assert_eq!(merged.vert_orient, VertOrient::Center);
        assert_eq!(merged.borders.left, Some(blue.clone()));
        assert_eq!(merged.borders.right, Some(red));
        assert_eq!(merged.borders.bottom, Some(blue));
    }
}
