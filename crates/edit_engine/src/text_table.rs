//! Converting paragraphs to a table and back

use crate::{EditError, EditingEngine, InsertTableOptions, Refusal, Result, UndoKind};
use doc_model::{Node, NodeId, NodeKind, TableAdjust, Twips};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where paragraph text is cut into boxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Separator {
    Tab,
    /// Tabs, with column edges taken from the tab stops of the first line
    AutoTab,
    Char(char),
}

impl Separator {
    pub fn as_char(self) -> char {
        match self {
            Separator::Tab | Separator::AutoTab => '\t',
            Separator::Char(c) => c,
        }
    }
}

impl EditingEngine {
    /// Column edges of `text` laid out on one line with default tab stops,
    /// closed by `total`
    fn tab_positions(&self, text: &str, sep: char, total: Twips) -> Option<Vec<Twips>> {
        let char_width = self.doc.settings.text_metrics.char_width;
        let tab = self.doc.settings.default_tab_stop;
        if tab <= 0 {
            return None;
        }
        let cells: Vec<&str> = text.split(sep).collect();
        let mut positions = vec![0];
        let mut x: Twips = 0;
        for cell in &cells[..cells.len() - 1] {
            x += cell.chars().count() as Twips * char_width;
            x = (x / tab + 1) * tab;
            positions.push(x);
        }
        positions.push(total);
        positions.windows(2).all(|w| w[0] < w[1]).then_some(positions)
    }

    /// Turn the paragraphs `start..=end` into a table, one row per
    /// paragraph and one box per separated piece of text. Short rows are
    /// padded with empty boxes.
    ///
    /// Redlines lying inside the range are accepted first. The first
    /// paragraph's page break and page style move to the table.
    pub fn text_to_table(
        &mut self,
        start: usize,
        end: usize,
        separator: Separator,
        options: &InsertTableOptions,
    ) -> Result<NodeId> {
        if start == 0 || start > end || end >= self.doc.nodes.len() {
            return Err(EditError::InvalidCommand(format!("no paragraph range {}..={}", start, end)));
        }
        let ids: Vec<NodeId> = (start..=end).filter_map(|i| self.doc.nodes.at(i)).collect();
        if ids.iter().any(|id| !self.doc.nodes.get(*id).is_some_and(Node::is_text)) {
            tracing::warn!("text_to_table over non-paragraph nodes {}..={}", start, end);
            return Err(Refusal::NotTextRange.into());
        }
        if self.doc.nodes.is_in_footnote(start) {
            return Err(Refusal::InsideFootnote.into());
        }
        if let Some(container) = self.doc.nodes.enclosing_start(start, |_| true) {
            if self.doc.tables.contains_key(&container) {
                return Err(Refusal::NotTextRange.into());
            }
        }

        let sep = separator.as_char();
        let rows: Vec<Vec<String>> = ids
            .iter()
            .map(|id| {
                let text = self.doc.nodes.text(*id).map(|t| t.text.as_str()).unwrap_or_default();
                text.split(sep).map(str::to_string).collect()
            })
            .collect();
        let cols = rows.iter().map(Vec::len).max().unwrap_or(1);
        let first_short = rows.first().is_some_and(|r| r.len() < cols);

        let total = options.width.unwrap_or(self.doc.settings.default_table_width);
        let detected = match (separator, ids.first()) {
            (Separator::AutoTab, Some(first)) if !first_short => {
                let text = self.doc.nodes.text(*first).map(|t| t.text.clone()).unwrap_or_default();
                self.tab_positions(&text, sep, total)
            }
            (Separator::AutoTab, _) => {
                tracing::debug!("first line needed padding, dropping tab positions");
                None
            }
            _ => None,
        };
        let widths: Vec<Twips> = match &detected {
            Some(positions) => positions.windows(2).map(|w| w[1] - w[0]).collect(),
            None => vec![(total / cols as Twips).max(1); cols],
        };
        let new_model = options.new_model.unwrap_or(self.doc.settings.new_table_model);

        self.run_recorded(UndoKind::TextToTable, start, end + 1, |e| {
            e.redlines.accept_in_range(&e.doc.nodes, start, end);
            e.layout.remove_node_frames(ids.iter().copied())?;

            let style = e.table_style();
            let table = e.doc.create_table(start, rows.len(), &widths, &style, new_model)?;
            let adjust_options = InsertTableOptions {
                adjust: if detected.is_some() { TableAdjust::LeftAndWidth } else { options.adjust },
                ..options.clone()
            };
            e.dress_new_table(table, rows.len(), 0, &adjust_options)?;

            // The paragraphs now follow the table
            let (_, table_end) = e.doc.table_range(table)?;
            let mut originals: Vec<Node> = e.doc.remove_nodes(table_end + 1, table_end + 1 + ids.len());
            if let Some(first) = originals.first_mut().and_then(Node::as_text_mut) {
                let page_break = first.attrs.page_break.take();
                let page_desc = first.attrs.page_desc.take();
                if page_break.is_some() || page_desc.is_some() {
                    let format = e.doc.table_format_mut(table)?;
                    format.page_break = page_break;
                    format.page_desc = page_desc;
                }
            }

            let lines = e.doc.table(table)?.lines.clone();
            for ((line, cells), mut original) in lines.iter().zip(&rows).zip(originals) {
                let boxes = e.doc.line(*line)?.boxes.clone();
                let para_style = original.as_text().map(|t| t.style.clone());
                for (b, cell) in boxes.iter().zip(cells).skip(1) {
                    let placeholder = e.doc.first_box_paragraph(*b)?;
                    if let Some(style) = &para_style {
                        e.doc.set_paragraph_style(placeholder, style)?;
                    }
                    if let Some(text) = e.doc.nodes.text_mut(placeholder) {
                        text.text = cell.clone();
                    }
                }
                for b in boxes.iter().skip(cells.len()) {
                    if let (Some(style), Some(para)) = (&para_style, e.doc.box_paragraphs(*b)?.first()) {
                        e.doc.set_paragraph_style(*para, style)?;
                    }
                }

                // The paragraph itself moves into the first box
                if let (Some(text), Some(cell)) = (original.as_text_mut(), cells.first()) {
                    text.text = cell.clone();
                }
                let Some(first_box) = boxes.first() else { continue };
                let placeholder = e.doc.first_box_paragraph(*first_box)?;
                let index = e.doc.nodes.try_index_of(placeholder)?;
                e.doc.remove_nodes(index, index + 1);
                e.doc.nodes.insert(index, original)?;
            }

            e.note_new_boxes(table)?;
            for leaf in e.doc.leaf_boxes(table)? {
                e.recognize_box(leaf)?;
            }
            e.doc.take_notices();
            e.layout.insert_table_frames(&e.doc, table)?;
            tracing::debug!("converted {} paragraphs into table {} ({} columns)", rows.len(), table, cols);
            Ok(table)
        })
    }

    /// Turn a table back into paragraphs. Boxes that do not start a line
    /// join the previous paragraph behind `separator`; paragraphs keep
    /// their identity otherwise. Tables nested in boxes move out whole.
    /// Returns the paragraphs in order.
    pub fn table_to_text(&mut self, table: NodeId, separator: char) -> Result<Vec<NodeId>> {
        self.ensure_editable(table)?;
        let (start, end) = self.doc.table_range(table)?;
        let pieces = self.text_pieces(table)?;
        let format = self.doc.table(table)?.format.clone();

        self.run_recorded(UndoKind::TableToText, start, end + 1, |e| {
            let leaves = e.doc.leaf_boxes(table)?;
            e.note_removed_boxes(&leaves);
            e.layout.del_table_frames(table)?;

            // Lift inner tables out first so their data survives
            let mut inner: HashMap<NodeId, Vec<Node>> = HashMap::new();
            for piece in &pieces {
                if let TextPiece::Table(id) = piece {
                    let (s, t) = e.doc.table_range(*id)?;
                    inner.insert(*id, e.doc.nodes.remove_range(s, t + 1));
                }
            }
            let (start, end) = e.doc.table_range(table)?;
            let mut removed: HashMap<NodeId, Node> =
                e.doc.remove_nodes(start, end + 1).into_iter().map(|n| (n.id(), n)).collect();

            let mut nodes = Vec::with_capacity(pieces.len());
            let mut ids = Vec::new();
            for piece in &pieces {
                let group = match piece {
                    TextPiece::Table(id) => {
                        nodes.extend(inner.remove(id).unwrap_or_default());
                        continue;
                    }
                    TextPiece::Paragraphs(group) => group,
                };
                let Some(mut node) = group.first().and_then(|first| removed.remove(first)) else {
                    continue;
                };
                if let Some(text) = node.as_text_mut() {
                    for joined in &group[1..] {
                        if let Some(NodeKind::Text(other)) = removed.remove(joined).map(|n| n.kind) {
                            text.text.push(separator);
                            text.text.push_str(&other.text);
                        }
                    }
                }
                ids.push(node.id());
                nodes.push(node);
            }
            if let Some(first) = nodes.iter_mut().find_map(Node::as_text_mut) {
                if format.page_break.is_some() {
                    first.attrs.page_break = format.page_break;
                }
                if format.page_desc.is_some() {
                    first.attrs.page_desc = format.page_desc.clone();
                }
            }

            let count = nodes.len();
            e.doc.nodes.insert_many(start, nodes)?;
            for piece in &pieces {
                if let TextPiece::Table(id) = piece {
                    e.doc.rebuild_sort_index(*id)?;
                }
            }
            e.redlines.drop_dangling(&e.doc.nodes);
            e.layout.insert_frames_for_range(&e.doc, start, start + count)?;
            tracing::debug!("converted table {} into {} paragraphs", table, ids.len());
            Ok(ids)
        })
    }

    /// Output of a table in reading order: paragraph groups that become one
    /// paragraph each, and inner tables that stay as they are
    fn text_pieces(&self, table: NodeId) -> Result<Vec<TextPiece>> {
        let mut pieces: Vec<TextPiece> = Vec::new();
        let lines = self.doc.table(table)?.lines.clone();
        for leaf in self.doc.leaf_boxes_of(&lines) {
            let line = self.doc.table_box(leaf)?.upper;
            let starts_line = self.doc.line(line)?.position_of(leaf) == Some(0);
            let Some(section) = self.doc.table_box(leaf)?.start_node() else {
                continue;
            };
            let (s, e) = self.doc.nodes.section_indices(section)?;
            let mut first = true;
            let mut index = s + 1;
            while index < e {
                let Some(node) = self.doc.nodes.node_at(index) else {
                    break;
                };
                let id = node.id();
                if node.is_table_start() {
                    pieces.push(TextPiece::Table(id));
                    index = self.doc.table_range(id)?.1 + 1;
                    first = false;
                    continue;
                }
                if node.is_text() {
                    match pieces.last_mut() {
                        Some(TextPiece::Paragraphs(group)) if first && !starts_line => group.push(id),
                        _ => pieces.push(TextPiece::Paragraphs(vec![id])),
                    }
                    first = false;
                }
                index += 1;
            }
        }
        Ok(pieces)
    }
}

/// One step of turning a table into text
enum TextPiece {
    Paragraphs(Vec<NodeId>),
    Table(NodeId),
}
