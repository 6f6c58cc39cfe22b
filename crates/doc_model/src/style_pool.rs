//! Paragraph style pool
//!
//! Table operations only need a handful of well-known paragraph styles
//! (body text inside cells, table heading). They are addressed by a symbolic
//! [`PoolStyle`] and created lazily on first use.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of a paragraph style
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleId(pub String);

impl StyleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StyleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for StyleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Symbolic ids of styles the engine asks the pool for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolStyle {
    /// Default paragraph style
    Standard,
    /// Body text inside table boxes
    Table,
    /// Text of heading rows
    TableHeading,
    /// Outline heading of the given level (1-based)
    Heading(u8),
}

impl PoolStyle {
    fn style_id(&self) -> StyleId {
        match self {
            PoolStyle::Standard => StyleId::new("Standard"),
            PoolStyle::Table => StyleId::new("TableContents"),
            PoolStyle::TableHeading => StyleId::new("TableHeading"),
            PoolStyle::Heading(level) => StyleId::new(format!("Heading{}", level)),
        }
    }

    fn display_name(&self) -> String {
        match self {
            PoolStyle::Standard => "Default Paragraph Style".to_string(),
            PoolStyle::Table => "Table Contents".to_string(),
            PoolStyle::TableHeading => "Table Heading".to_string(),
            PoolStyle::Heading(level) => format!("Heading {}", level),
        }
    }
}

/// A paragraph style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParaStyle {
    pub id: StyleId,
    pub name: String,
    /// Outline level the style is assigned to, if any
    pub outline_level: Option<u8>,
    /// Style the properties are inherited from
    pub based_on: Option<StyleId>,
}

impl ParaStyle {
    pub fn new(id: impl Into<StyleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            outline_level: None,
            based_on: None,
        }
    }

    pub fn with_outline_level(mut self, level: u8) -> Self {
        self.outline_level = Some(level);
        self
    }

    pub fn with_based_on(mut self, base: impl Into<StyleId>) -> Self {
        self.based_on = Some(base.into());
        self
    }
}

impl From<String> for StyleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Registry of paragraph styles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylePool {
    styles: HashMap<StyleId, ParaStyle>,
    default_style: StyleId,
}

impl StylePool {
    pub fn new() -> Self {
        let mut pool = Self {
            styles: HashMap::new(),
            default_style: PoolStyle::Standard.style_id(),
        };
        pool.get_or_create(PoolStyle::Standard);
        pool
    }

    /// Get the style for a symbolic id, creating it on first use
    pub fn get_or_create(&mut self, pool: PoolStyle) -> StyleId {
        let id = pool.style_id();
        if !self.styles.contains_key(&id) {
            let mut style = ParaStyle::new(id.clone(), pool.display_name());
            match pool {
                PoolStyle::Standard => {}
                PoolStyle::Table => style = style.with_based_on(self.default_style.clone()),
                PoolStyle::TableHeading => {
                    style = style.with_based_on(PoolStyle::Table.style_id());
                }
                PoolStyle::Heading(level) => {
                    style = style
                        .with_based_on(self.default_style.clone())
                        .with_outline_level(level);
                }
            }
            self.styles.insert(id.clone(), style);
        }
        id
    }

    /// Register (or replace) a style
    pub fn register(&mut self, style: ParaStyle) {
        self.styles.insert(style.id.clone(), style);
    }

    pub fn get(&self, id: &StyleId) -> Option<&ParaStyle> {
        self.styles.get(id)
    }

    pub fn contains(&self, id: &StyleId) -> bool {
        self.styles.contains_key(id)
    }

    pub fn default_style(&self) -> &StyleId {
        &self.default_style
    }

    /// Outline level of a style, if it is assigned to one
    pub fn outline_level(&self, id: &StyleId) -> Option<u8> {
        self.styles.get(id).and_then(|s| s.outline_level)
    }

    pub fn is_assigned_to_outline(&self, id: &StyleId) -> bool {
        self.outline_level(id).is_some()
    }
}

impl Default for StylePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut pool = StylePool::new();
        let a = pool.get_or_create(PoolStyle::Table);
        let b = pool.get_or_create(PoolStyle::Table);
        assert_eq!(a, b);
        assert_eq!(pool.get(&a).unwrap().based_on.as_ref(), Some(pool.default_style()));
    }

    #[test]
    fn test_heading_is_outline_style() {
        let mut pool = StylePool::new();
        let h = pool.get_or_create(PoolStyle::Heading(2));
        assert_eq!(pool.outline_level(&h), Some(2));
        let t = pool.get_or_create(PoolStyle::TableHeading);
        assert!(!pool.is_assigned_to_outline(&t));
    }
}
