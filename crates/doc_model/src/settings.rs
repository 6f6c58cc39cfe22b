//! Document-wide settings consumed by the table and layout engines
//!
//! Settings are plain data loaded from JSON. Every field has a default so a
//! partial file only overrides what it names.

use crate::Twips;
use serde::{Deserialize, Serialize};

/// Settings container
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocumentSettings {
    /// Width used for new tables when no explicit width is given
    pub default_table_width: Twips,
    /// Run number recognition when box content changes
    pub number_recognition: bool,
    /// New tables use the row-span model
    pub new_table_model: bool,
    /// Distance between default tab stops
    pub default_tab_stop: Twips,
    /// Maximum number of undo entries kept
    pub max_undo_entries: usize,
    /// Fallback adjustment step for column balancing
    pub column_balance_quantum: Twips,
    /// A lone page tracks the viewport height
    pub browse_mode: bool,
    pub text_metrics: TextMetrics,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            default_table_width: u16::MAX as Twips,
            number_recognition: false,
            new_table_model: true,
            default_tab_stop: 709,
            max_undo_entries: 100,
            column_balance_quantum: 240,
            browse_mode: false,
            text_metrics: TextMetrics::default(),
        }
    }
}

/// Simple metrics used to size paragraph frames
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextMetrics {
    pub line_height: Twips,
    pub char_width: Twips,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            line_height: 240,
            char_width: 120,
        }
    }
}

impl TextMetrics {
    /// Number of lines a text of `chars` graphemes takes at `width`
    pub fn line_count(&self, chars: usize, width: Twips) -> usize {
        if chars == 0 || width <= 0 || self.char_width <= 0 {
            return 1;
        }
        let per_line = (width / self.char_width).max(1) as usize;
        chars.div_ceil(per_line)
    }

    /// Height of a text of `chars` graphemes at `width`
    pub fn text_height(&self, chars: usize, width: Twips) -> Twips {
        self.line_count(chars, width) as Twips * self.line_height
    }
}

impl DocumentSettings {
    /// Parse settings from JSON; a malformed document yields the defaults
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<DocumentSettings>(json) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to parse document settings, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = DocumentSettings::from_json(r#"{ "number_recognition": true }"#);
        assert!(settings.number_recognition);
        assert_eq!(settings.default_table_width, 65535);
        assert_eq!(settings.text_metrics.line_height, 240);
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let settings = DocumentSettings::from_json("{ not json");
        assert_eq!(settings, DocumentSettings::default());
    }

    #[test]
    fn test_line_count() {
        let m = TextMetrics::default();
        assert_eq!(m.line_count(0, 1000), 1);
        assert_eq!(m.line_count(8, 1200), 1);
        assert_eq!(m.line_count(11, 1200), 2);
        assert_eq!(m.text_height(11, 1200), 480);
    }
}
