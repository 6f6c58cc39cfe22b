//! Box references inside formulas
//!
//! Users write formulas against box names: `<A1>` is the first box of the
//! first line, columns count A..Z, AA, AB, ... and rows count from 1. Names
//! only cover boxes of top-level lines. Names shift whenever rows or
//! columns come and go, so around such edits formulas are switched to the
//! internal form `<#uuid>` that names the box itself and switched back
//! afterwards. A reference that cannot be resolved becomes `<?>`.

use crate::{EditingEngine, Result};
use doc_model::{BoxId, Document, NodeId};
use regex_lite::{Captures, Regex};
use std::sync::OnceLock;

/// Placeholder for a reference to a box that does not exist
pub const BROKEN_REFERENCE: &str = "<?>";

fn external_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<([A-Z]+)([0-9]+)>").ok()).as_ref()
}

fn internal_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"<#([0-9a-fA-F-]{36})>").ok())
        .as_ref()
}

/// Column letters of a 0-based column index
pub fn column_name(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().map(|b| *b as char).collect()
}

/// 0-based column index of column letters
pub fn column_index(name: &str) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for c in name.chars() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        index = index.checked_mul(26)?.checked_add((c as u8 - b'A') as usize + 1)?;
    }
    Some(index - 1)
}

/// Name of a box of a top-level line, e.g. `B3`
pub fn box_name(doc: &Document, table: NodeId, id: BoxId) -> Option<String> {
    let table_ref = doc.table(table).ok()?;
    let line = doc.table_box(id).ok()?.upper;
    let row = table_ref.line_index(line)?;
    let col = doc.line(line).ok()?.position_of(id)?;
    Some(format!("{}{}", column_name(col), row + 1))
}

/// Box a name refers to
pub fn box_by_name(doc: &Document, table: NodeId, name: &str) -> Option<BoxId> {
    let split = name.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = name.split_at(split);
    let col = column_index(letters)?;
    let row: usize = digits.parse().ok()?;
    let line = *doc.table(table).ok()?.lines.get(row.checked_sub(1)?)?;
    doc.line(line).ok()?.boxes.get(col).copied()
}

/// Switch `<A1>` references to the position independent `<#uuid>` form
pub fn to_internal(doc: &Document, table: NodeId, formula: &str) -> String {
    let Some(pattern) = external_pattern() else {
        return formula.to_string();
    };
    pattern
        .replace_all(formula, |caps: &Captures<'_>| {
            let name = format!("{}{}", &caps[1], &caps[2]);
            match box_by_name(doc, table, &name) {
                Some(id) => format!("<#{}>", id.as_uuid()),
                None => BROKEN_REFERENCE.to_string(),
            }
        })
        .into_owned()
}

/// Switch `<#uuid>` references back to box names
pub fn to_external(doc: &Document, table: NodeId, formula: &str) -> String {
    let Some(pattern) = internal_pattern() else {
        return formula.to_string();
    };
    pattern
        .replace_all(formula, |caps: &Captures<'_>| {
            BoxId::from_string(&caps[1])
                .and_then(|id| box_name(doc, table, id))
                .map(|name| format!("<{}>", name))
                .unwrap_or_else(|| BROKEN_REFERENCE.to_string())
        })
        .into_owned()
}

impl EditingEngine {
    /// Switch every formula of a table to the internal form, keeping the
    /// external form in the running undo record
    pub(crate) fn formulas_to_internal(&mut self, table: NodeId) -> Result<()> {
        for leaf in self.doc.leaf_boxes(table)? {
            let Some(formula) = self.doc.table_box(leaf)?.format.formula.clone() else {
                continue;
            };
            let internal = to_internal(&self.doc, table, &formula);
            if internal != formula {
                self.note_formula(leaf, &formula);
                self.doc.box_format_mut(leaf)?.formula = Some(internal);
            }
        }
        Ok(())
    }

    /// Switch every formula of a table back to box names
    pub(crate) fn formulas_to_external(&mut self, table: NodeId) -> Result<()> {
        for leaf in self.doc.leaf_boxes(table)? {
            let Some(formula) = self.doc.table_box(leaf)?.format.formula.clone() else {
                continue;
            };
            let external = to_external(&self.doc, table, &formula);
            if external != formula {
                self.doc.box_format_mut(leaf)?.formula = Some(external);
            }
        }
        Ok(())
    }
}
