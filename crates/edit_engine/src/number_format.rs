//! Number recognition for box content
//!
//! When a box's text changes, the engine asks a [`NumberFormatter`] whether
//! the text reads as a number. A number caches its format id and value on
//! the box format and drops any formula; text starting with `=` becomes the
//! box formula and drops the numeric cache; anything else clears both.

use regex_lite::Regex;

/// Format id of a plain number
pub const NUMBER_FORMAT_PLAIN: u32 = 0;
/// Format id of a number with digit grouping
pub const NUMBER_FORMAT_GROUPED: u32 = 1;
/// Format id of a percentage
pub const NUMBER_FORMAT_PERCENT: u32 = 2;

/// Decides whether text is a number under some locale's rules
pub trait NumberFormatter: std::fmt::Debug {
    /// Format id and value, if `text` is a number
    fn recognize(&self, text: &str) -> Option<(u32, f64)>;
}

/// What a box's content amounts to
#[derive(Debug, Clone, PartialEq)]
pub enum Recognized {
    Number { format: u32, value: f64 },
    Formula(String),
    Text,
}

/// Classify box text
pub fn recognize_content(formatter: &dyn NumberFormatter, text: &str) -> Recognized {
    let trimmed = text.trim();
    if let Some(formula) = trimmed.strip_prefix('=') {
        return Recognized::Formula(formula.trim().to_string());
    }
    match formatter.recognize(trimmed) {
        Some((format, value)) => Recognized::Number { format, value },
        None => Recognized::Text,
    }
}

/// Numbers with a configurable decimal and grouping separator
#[derive(Debug, Clone)]
pub struct LocaleNumberFormatter {
    decimal: char,
    group: char,
    /// `None` if the separators could not be turned into a pattern
    pattern: Option<Regex>,
}

impl LocaleNumberFormatter {
    pub fn new(decimal: char, group: char) -> Self {
        let d = regex_lite::escape(&decimal.to_string());
        let g = regex_lite::escape(&group.to_string());
        let source = format!(r"^([+-]?)(\d{{1,3}}(?:{g}\d{{3}})+|\d+)(?:{d}(\d+))?(%?)$");
        let pattern = Regex::new(&source).ok();
        if pattern.is_none() {
            tracing::warn!("no number pattern for separators {:?} {:?}", decimal, group);
        }
        Self { decimal, group, pattern }
    }

    pub fn decimal_separator(&self) -> char {
        self.decimal
    }

    pub fn group_separator(&self) -> char {
        self.group
    }
}

impl Default for LocaleNumberFormatter {
    fn default() -> Self {
        Self::new('.', ',')
    }
}

impl NumberFormatter for LocaleNumberFormatter {
    fn recognize(&self, text: &str) -> Option<(u32, f64)> {
        let caps = self.pattern.as_ref()?.captures(text.trim())?;
        let sign = caps.get(1).map_or("", |m| m.as_str());
        let int = caps.get(2)?.as_str();
        let frac = caps.get(3).map_or("", |m| m.as_str());
        let percent = caps.get(4).is_some_and(|m| !m.as_str().is_empty());

        let grouped = int.contains(self.group);
        let digits: String = int.chars().filter(|c| c.is_ascii_digit()).collect();
        let literal = if frac.is_empty() {
            format!("{}{}", sign, digits)
        } else {
            format!("{}{}.{}", sign, digits, frac)
        };
        let value: f64 = literal.parse().ok()?;

        if percent {
            Some((NUMBER_FORMAT_PERCENT, value / 100.0))
        } else if grouped {
            Some((NUMBER_FORMAT_GROUPED, value))
        } else {
            Some((NUMBER_FORMAT_PLAIN, value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_grouped() {
        let f = LocaleNumberFormatter::default();
        assert_eq!(f.recognize("42"), Some((NUMBER_FORMAT_PLAIN, 42.0)));
        assert_eq!(f.recognize("-3.5"), Some((NUMBER_FORMAT_PLAIN, -3.5)));
        assert_eq!(f.recognize("1,234,567"), Some((NUMBER_FORMAT_GROUPED, 1_234_567.0)));
        assert_eq!(f.recognize("12%"), Some((NUMBER_FORMAT_PERCENT, 0.12)));
    }

    #[test]
    fn test_rejects_text() {
        let f = LocaleNumberFormatter::default();
        assert_eq!(f.recognize("abc"), None);
        assert_eq!(f.recognize("1,23"), None);
        assert_eq!(f.recognize("inf"), None);
        assert_eq!(f.recognize(""), None);
    }

    #[test]
    fn test_locale_separators() {
        let f = LocaleNumberFormatter::new(',', '.');
        assert_eq!(f.recognize("1.000,5"), Some((NUMBER_FORMAT_GROUPED, 1000.5)));
        assert_eq!(f.recognize("1.5"), None);
    }

    #[test]
    fn test_content_classes() {
        let f = LocaleNumberFormatter::default();
        assert_eq!(
            recognize_content(&f, " =<A1>+1 "),
            Recognized::Formula("<A1>+1".to_string())
        );
        assert_eq!(recognize_content(&f, "7"), Recognized::Number { format: 0, value: 7.0 });
        assert_eq!(recognize_content(&f, "seven"), Recognized::Text);
    }
}
