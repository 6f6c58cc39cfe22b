//! Creating and deleting whole tables

use crate::{EditError, EditingEngine, Refusal, Result, TableAutoFormat, UndoKind};
use doc_model::{
    BorderLine, BoxBorders, BoxFormat, NodeId, NodeKind, PoolStyle, StartKind, TableAdjust, Twips,
};
use revisions::{RedlineKind, TrackedRange};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// How a new table is set up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertTableOptions {
    /// Give the first rows the heading style and repeat them on every page
    pub headline: bool,
    /// Number of heading rows when `headline` is set
    pub rows_to_repeat: u16,
    /// Put a thin border around every box
    pub default_border: bool,
    pub adjust: TableAdjust,
    /// Total width; the document default when `None`
    pub width: Option<Twips>,
    /// Explicit box edges; ignored unless they fit the column count
    pub column_positions: Option<Vec<Twips>>,
    pub auto_format: Option<TableAutoFormat>,
    /// Row-span model; the document default when `None`
    pub new_model: Option<bool>,
    pub name: Option<String>,
}

impl Default for InsertTableOptions {
    fn default() -> Self {
        Self {
            headline: false,
            rows_to_repeat: 1,
            default_border: true,
            adjust: TableAdjust::default(),
            width: None,
            column_positions: None,
            auto_format: None,
            new_model: None,
            name: None,
        }
    }
}

impl InsertTableOptions {
    pub fn with_headline(mut self, rows_to_repeat: u16) -> Self {
        self.headline = true;
        self.rows_to_repeat = rows_to_repeat;
        self
    }

    pub fn with_column_positions(mut self, positions: Vec<Twips>) -> Self {
        self.column_positions = Some(positions);
        self
    }

    pub fn with_auto_format(mut self, format: TableAutoFormat) -> Self {
        self.auto_format = Some(format);
        self
    }
}

/// Box widths from explicit edges, if they fit `cols` and `adjust`
fn widths_from_positions(positions: &[Twips], cols: usize, adjust: TableAdjust) -> Option<Vec<Twips>> {
    if positions.len() != adjust.column_positions_len(cols) {
        return None;
    }
    let edges = if adjust == TableAdjust::Manual {
        &positions[1..]
    } else {
        positions
    };
    let widths: Vec<Twips> = edges.windows(2).map(|w| w[1] - w[0]).collect();
    widths.iter().all(|w| *w > 0).then_some(widths)
}

impl EditingEngine {
    /// Insert a `rows` x `cols` table before node `at`.
    ///
    /// Every box gets one empty paragraph in the table body style; with
    /// `headline` the first `rows_to_repeat` rows use the heading style
    /// instead (only for tables of more than one row).
    pub fn insert_table(
        &mut self,
        at: usize,
        rows: usize,
        cols: usize,
        options: &InsertTableOptions,
    ) -> Result<NodeId> {
        if rows == 0 || cols == 0 {
            tracing::warn!("insert_table with {}x{} boxes", rows, cols);
            return Err(EditError::InvalidCommand(format!("table needs rows and columns, got {}x{}", rows, cols)));
        }
        if at == 0 || at >= self.doc.nodes.len() {
            return Err(EditError::InvalidCommand(format!("no insert position at node {}", at)));
        }
        if self.doc.nodes.is_in_footnote(at) {
            tracing::warn!("refusing table inside a footnote");
            return Err(Refusal::InsideFootnote.into());
        }
        let container = self.doc.nodes.enclosing_start(at, |_| true);
        if let Some(start) = container {
            if self.doc.tables.contains_key(&start) {
                return Err(EditError::InvalidCommand("insert position lies between table boxes".to_string()));
            }
        }

        let total = options.width.unwrap_or(self.doc.settings.default_table_width);
        let positions = options.column_positions.as_deref();
        let (widths, left_space) = match positions.and_then(|p| widths_from_positions(p, cols, options.adjust)) {
            Some(widths) => {
                let left = match (options.adjust, positions) {
                    (TableAdjust::Manual, Some(p)) => p[0],
                    _ => 0,
                };
                (widths, left)
            }
            None => {
                if positions.is_some() {
                    tracing::debug!("column positions do not fit {} columns, using equal widths", cols);
                }
                // Rounded down so the widths add up to at most the total
                let width = (total / cols as Twips).max(1);
                (vec![width; cols], 0)
            }
        };
        let new_model = options.new_model.unwrap_or(self.doc.settings.new_table_model);

        self.run_recorded(UndoKind::InsertTable, at, at, |e| {
            let style = e.table_style();
            let table = e.doc.create_table(at, rows, &widths, &style, new_model)?;
            e.dress_new_table(table, rows, left_space, options)?;
            e.note_new_boxes(table)?;

            let (start, end) = e.doc.table_range(table)?;
            if let Some(mut tracked) = TrackedRange::from_indices(RedlineKind::Insert, &e.doc.nodes, start, end) {
                tracked.record(&mut e.redlines)?;
            }
            e.doc.take_notices();
            e.layout.insert_table_frames(&e.doc, table)?;
            tracing::debug!("inserted table {} ({}x{})", table, rows, cols);
            Ok(table)
        })
    }

    /// Name, alignment, heading rows, borders and auto format of a table
    /// built from `options`
    pub(crate) fn dress_new_table(
        &mut self,
        table: NodeId,
        rows: usize,
        left_space: Twips,
        options: &InsertTableOptions,
    ) -> Result<()> {
        let name = match &options.name {
            Some(name) => name.clone(),
            None => self.unique_table_name(),
        };
        {
            let format = self.doc.table_format_mut(table)?;
            format.name = name;
            format.adjust = options.adjust;
            format.left_space = left_space;
        }

        if options.headline && rows > 1 {
            let repeat = (options.rows_to_repeat as usize).clamp(1, rows);
            let heading = self.doc.styles.get_or_create(PoolStyle::TableHeading);
            let lines = self.doc.table(table)?.lines[..repeat].to_vec();
            for leaf in self.doc.leaf_boxes_of(&lines) {
                for para in self.doc.box_paragraphs(leaf)? {
                    self.doc.set_paragraph_style(para, &heading)?;
                }
            }
            self.doc.table_mut(table)?.rows_to_repeat = repeat as u16;
        }

        if options.default_border {
            let border = BoxBorders::all(BorderLine::solid(10, "#000000"));
            let mut cache: HashMap<Twips, Arc<BoxFormat>> = HashMap::new();
            for leaf in self.doc.leaf_boxes(table)? {
                let width = self.doc.table_box(leaf)?.width();
                let format = cache
                    .entry(width)
                    .or_insert_with(|| Arc::new(BoxFormat::with_width(width).with_borders(border.clone())))
                    .clone();
                self.doc.set_box_format(leaf, format)?;
            }
        }
        if let Some(auto_format) = &options.auto_format {
            auto_format.apply(&mut self.doc, table)?;
        }
        Ok(())
    }

    /// Delete a whole table.
    ///
    /// While tracking changes the table stays and is marked deleted. A
    /// section left without content gets an empty paragraph.
    pub fn delete_table(&mut self, table: NodeId) -> Result<()> {
        let (start, end) = self.table_span(table)?;
        self.run_recorded(UndoKind::DeleteTable, start, end, |e| {
            if e.redlines.is_tracking() {
                if let Some(mut tracked) =
                    TrackedRange::from_indices(RedlineKind::Delete, &e.doc.nodes, start, end - 1)
                {
                    tracked.record(&mut e.redlines)?;
                }
                tracing::debug!("table {} marked deleted", table);
                return Ok(());
            }

            let leaves = e.doc.leaf_boxes(table)?;
            e.note_removed_boxes(&leaves);
            e.layout.del_table_frames(table)?;
            e.doc.remove_nodes(start, end);

            let opens_section = matches!(
                e.doc.nodes.node_at(start - 1).map(|n| &n.kind),
                Some(NodeKind::Start { kind, .. }) if !matches!(kind, StartKind::Table)
            );
            let closes_section = e.doc.nodes.node_at(start).is_some_and(|n| n.is_end());
            if opens_section && closes_section {
                let style = e.doc.styles.default_style().clone();
                e.doc.insert_paragraph(start, "", &style)?;
                e.layout.insert_frames_for_range(&e.doc, start, start + 1)?;
            }
            e.redlines.drop_dangling(&e.doc.nodes);
            tracing::debug!("deleted table {}", table);
            Ok(())
        })
    }
}
