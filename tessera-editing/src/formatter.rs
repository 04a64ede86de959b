//! Formatters that constrain a proposed edit before it is committed.
//!
//! ## Usage
//!
//! Build a [`FormatterChain`] once from a [`TextFieldConfig`] and run every
//! proposed value through [`FormatterChain::apply`]. Formatters run in order
//! and each sees the output of the previous one:
//!
//! 1. [`LengthLimitFormatter`] when a maximum length is configured
//! 2. [`SingleLineFormatter`] when the field is limited to one line
//! 3. one [`CharacterClassFormatter`] matching the keyboard type
//!
//! A user supplied [`InputFilter`] runs last and is the only stage whose
//! rejections are reported back to the caller.

use std::fmt;

use regex::Regex;

use crate::{
    config::{KeyboardType, TextFieldConfig},
    error::EditingError,
    value::{EditingValue, TextSelection, slice_utf16, utf16_len},
};

/// Transforms a proposed value in place.
///
/// Implementations must be idempotent: formatting an already valid value
/// leaves it untouched.
pub trait InputFormatter: Send + Sync + fmt::Debug {
    /// Constrains `proposed`, which would replace `previous`.
    fn format(&self, previous: &EditingValue, proposed: &mut EditingValue);
}

/// Truncates text longer than a code-unit limit.
#[derive(Debug, Clone)]
pub struct LengthLimitFormatter {
    max: usize,
}

impl LengthLimitFormatter {
    /// Limits text to `max` UTF-16 code units.
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl InputFormatter for LengthLimitFormatter {
    fn format(&self, _previous: &EditingValue, proposed: &mut EditingValue) {
        if proposed.len() <= self.max {
            return;
        }
        // A surrogate pair straddling the limit is dropped whole.
        let kept = slice_utf16(proposed.text(), 0, self.max).to_string();
        *proposed = EditingValue::new(kept, proposed.selection());
    }
}

/// Removes line breaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleLineFormatter;

impl InputFormatter for SingleLineFormatter {
    fn format(&self, _previous: &EditingValue, proposed: &mut EditingValue) {
        if !proposed.text().contains(['\n', '\r']) {
            return;
        }
        let selection = proposed.selection();
        let (mut removed_before_base, mut removed_before_extent) = (0, 0);
        let mut units = 0;
        let mut text = String::with_capacity(proposed.text().len());
        for ch in proposed.text().chars() {
            if ch == '\n' || ch == '\r' {
                if units < selection.base {
                    removed_before_base += 1;
                }
                if units < selection.extent {
                    removed_before_extent += 1;
                }
            } else {
                text.push(ch);
            }
            units += ch.len_utf16();
        }
        *proposed = EditingValue::new(
            text,
            TextSelection::new(
                selection.base - removed_before_base,
                selection.extent - removed_before_extent,
            ),
        );
    }
}

/// Strips each part of a value separately and rebuilds the selection from
/// the surviving lengths of the text before and inside it.
fn strip_around_selection(
    value: &EditingValue,
    mut keep: impl FnMut(&str) -> String,
) -> EditingValue {
    let selection = value.selection();
    let before = keep(value.before_selection());
    let inside = keep(value.selected_text());
    let after = keep(value.after_selection());
    let before_len = utf16_len(&before);
    let inside_len = utf16_len(&inside);
    let selection = if selection.is_reversed() {
        TextSelection::new(before_len + inside_len, before_len)
    } else {
        TextSelection::new(before_len, before_len + inside_len)
    };
    EditingValue::new(before + &inside + &after, selection)
}

/// The built-in character categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterClass {
    /// ASCII digits only.
    Number,
    /// Digits and dial characters.
    Phone,
    /// Characters valid in an address.
    Email,
    /// Anything but whitespace.
    Url,
}

impl CharacterClass {
    /// Pattern matching the characters this class rejects.
    pub fn disallowed_pattern(self) -> &'static str {
        match self {
            Self::Number => r"[^0-9]+",
            Self::Phone => r"[^0-9\-+*#() ]+",
            Self::Email => r"[^\w.@\-+]+",
            Self::Url => r"\s+",
        }
    }

    fn for_keyboard(keyboard: KeyboardType) -> Option<Self> {
        match keyboard {
            KeyboardType::Number => Some(Self::Number),
            KeyboardType::Phone => Some(Self::Phone),
            KeyboardType::Email => Some(Self::Email),
            KeyboardType::Url => Some(Self::Url),
            KeyboardType::Text | KeyboardType::Multiline | KeyboardType::VisiblePassword => None,
        }
    }
}

/// Silently removes characters outside a [`CharacterClass`].
#[derive(Debug, Clone)]
pub struct CharacterClassFormatter {
    class: CharacterClass,
    disallowed: Regex,
}

impl CharacterClassFormatter {
    /// Creates the formatter for `class`.
    pub fn new(class: CharacterClass) -> Result<Self, EditingError> {
        let pattern = class.disallowed_pattern();
        let disallowed = Regex::new(pattern).map_err(|source| EditingError::InvalidFilter {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { class, disallowed })
    }

    /// The category this formatter enforces.
    pub fn class(&self) -> CharacterClass {
        self.class
    }
}

impl InputFormatter for CharacterClassFormatter {
    fn format(&self, _previous: &EditingValue, proposed: &mut EditingValue) {
        if !self.disallowed.is_match(proposed.text()) {
            return;
        }
        *proposed = strip_around_selection(proposed, |part| {
            self.disallowed.replace_all(part, "").into_owned()
        });
    }
}

/// User supplied allow-pattern. Only text matched by the pattern survives.
#[derive(Debug, Clone)]
pub struct InputFilter {
    allowed: Regex,
}

impl InputFilter {
    /// Compiles `pattern`.
    pub fn new(pattern: &str) -> Result<Self, EditingError> {
        let allowed = Regex::new(pattern).map_err(|source| EditingError::InvalidFilter {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { allowed })
    }

    /// The compiled pattern source.
    pub fn pattern(&self) -> &str {
        self.allowed.as_str()
    }

    /// Filters `proposed` and returns the text that was rejected, if any.
    pub fn apply(&self, proposed: &mut EditingValue) -> Option<String> {
        if proposed.is_empty() {
            return None;
        }
        let mut rejected = String::new();
        *proposed = strip_around_selection(proposed, |part| {
            let mut kept = String::with_capacity(part.len());
            let mut last = 0;
            for found in self.allowed.find_iter(part) {
                rejected.push_str(&part[last..found.start()]);
                kept.push_str(found.as_str());
                last = found.end();
            }
            rejected.push_str(&part[last..]);
            kept
        });
        (!rejected.is_empty()).then_some(rejected)
    }
}

/// Outcome of running a proposed edit through the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatReport {
    /// Text removed by the input filter, if it removed anything.
    pub rejected: Option<String>,
    /// The edit was longer than the length limit before formatting.
    pub exceeded_limit: bool,
    /// Whether committing the formatted value changed the text. Filled in by
    /// whoever commits it.
    pub changed: bool,
}

/// Ordered formatters plus the optional input filter.
#[derive(Debug, Default)]
pub struct FormatterChain {
    formatters: Vec<Box<dyn InputFormatter>>,
    filter: Option<InputFilter>,
    max_length: Option<usize>,
}

impl FormatterChain {
    /// Creates a chain from explicit parts.
    pub fn new(formatters: Vec<Box<dyn InputFormatter>>, filter: Option<InputFilter>) -> Self {
        Self {
            formatters,
            filter,
            max_length: None,
        }
    }

    /// Assembles the chain a field with `config` needs.
    pub fn from_config(config: &TextFieldConfig) -> Result<Self, EditingError> {
        let mut formatters: Vec<Box<dyn InputFormatter>> = Vec::new();
        if let Some(max) = config.max_length {
            formatters.push(Box::new(LengthLimitFormatter::new(max)));
        }
        if config.max_lines == 1 {
            formatters.push(Box::new(SingleLineFormatter));
        }
        if let Some(class) = CharacterClass::for_keyboard(config.keyboard_type) {
            formatters.push(Box::new(CharacterClassFormatter::new(class)?));
        }
        let filter = config
            .input_filter
            .as_deref()
            .map(InputFilter::new)
            .transpose()?;
        Ok(Self {
            formatters,
            filter,
            max_length: config.max_length,
        })
    }

    /// Number of built-in formatters, the filter excluded.
    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    /// Whether the chain has neither formatters nor a filter.
    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty() && self.filter.is_none()
    }

    /// Runs every stage over `proposed`.
    pub fn apply(&self, previous: &EditingValue, proposed: &mut EditingValue) -> FormatReport {
        let exceeded_limit = self.max_length.is_some_and(|max| proposed.len() > max);
        for formatter in &self.formatters {
            formatter.format(previous, proposed);
        }
        let rejected = self
            .filter
            .as_ref()
            .and_then(|filter| filter.apply(proposed));
        FormatReport {
            rejected,
            exceeded_limit,
            changed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatted(formatter: &dyn InputFormatter, value: EditingValue) -> EditingValue {
        let mut proposed = value.clone();
        formatter.format(&EditingValue::default(), &mut proposed);
        proposed
    }

    #[test]
    fn test_length_limit_truncates_and_clamps() {
        let formatter = LengthLimitFormatter::new(3);
        let value = formatted(&formatter, EditingValue::with_caret_at_end("abcdef"));
        assert_eq!(value.text(), "abc");
        assert_eq!(value.selection(), TextSelection::collapsed(3));
    }

    #[test]
    fn test_length_limit_keeps_surrogate_pairs_whole() {
        let formatter = LengthLimitFormatter::new(2);
        let value = formatted(&formatter, EditingValue::with_caret_at_end("a😀"));
        assert_eq!(value.text(), "a");
    }

    #[test]
    fn test_single_line_adjusts_selection() {
        let value = EditingValue::new("ab\ncd\ne", TextSelection::new(4, 7));
        let value = formatted(&SingleLineFormatter, value);
        assert_eq!(value.text(), "abcde");
        assert_eq!(value.selection(), TextSelection::new(3, 5));
    }

    #[test]
    fn test_number_formatter_strips_letters() {
        let formatter = CharacterClassFormatter::new(CharacterClass::Number).expect("pattern");
        let value = formatted(&formatter, EditingValue::new("12a3", TextSelection::collapsed(4)));
        assert_eq!(value.text(), "123");
        assert_eq!(value.selection(), TextSelection::collapsed(3));
    }

    #[test]
    fn test_character_class_three_way_split() {
        let formatter = CharacterClassFormatter::new(CharacterClass::Number).expect("pattern");
        // before "1a", selected "b2c", after "3d", selected backwards
        let value = EditingValue::new("1ab2c3d", TextSelection::new(5, 2));
        let value = formatted(&formatter, value);
        assert_eq!(value.text(), "123");
        assert_eq!(value.selection(), TextSelection::new(2, 1));
    }

    #[test]
    fn test_phone_and_url_classes() {
        let phone = CharacterClassFormatter::new(CharacterClass::Phone).expect("pattern");
        let value = formatted(&phone, EditingValue::with_caret_at_end("+1 (555) 12x3#"));
        assert_eq!(value.text(), "+1 (555) 123#");

        let url = CharacterClassFormatter::new(CharacterClass::Url).expect("pattern");
        let value = formatted(&url, EditingValue::with_caret_at_end("a b\tc"));
        assert_eq!(value.text(), "abc");
    }

    #[test]
    fn test_formatters_are_idempotent() {
        let chain = FormatterChain::from_config(
            &TextFieldConfig::default()
                .keyboard_type(KeyboardType::Email)
                .max_length(10),
        )
        .expect("chain");
        let mut once = EditingValue::with_caret_at_end("me @ex ample.org");
        chain.apply(&EditingValue::default(), &mut once);
        let mut twice = once.clone();
        chain.apply(&once, &mut twice);
        assert_eq!(once, twice);
        assert!(once.len() <= 10);
    }

    #[test]
    fn test_input_filter_reports_rejected_text() {
        let filter = InputFilter::new("[a-z]").expect("pattern");
        let mut value = EditingValue::new("aB1c", TextSelection::collapsed(4));
        let rejected = filter.apply(&mut value);
        assert_eq!(rejected.as_deref(), Some("B1"));
        assert_eq!(value.text(), "ac");
        assert_eq!(value.selection(), TextSelection::collapsed(2));

        let mut clean = EditingValue::with_caret_at_end("abc");
        assert_eq!(filter.apply(&mut clean), None);
    }

    #[test]
    fn test_input_filter_reports_matches_split_by_the_caret() {
        let filter = InputFilter::new("ab").expect("pattern");
        let mut value = EditingValue::new("ab", TextSelection::collapsed(1));
        let rejected = filter.apply(&mut value);
        assert_eq!(value.text(), "");
        assert_eq!(rejected.as_deref(), Some("ab"));

        let mut value = EditingValue::new("xaby", TextSelection::new(1, 3));
        let rejected = filter.apply(&mut value);
        assert_eq!(value.text(), "ab");
        assert_eq!(value.selection(), TextSelection::new(0, 2));
        assert_eq!(rejected.as_deref(), Some("xy"));
    }

    #[test]
    fn test_anchored_filter_reports_every_removed_part() {
        let filter = InputFilter::new("^[0-9]+").expect("pattern");
        let mut value = EditingValue::new("12a34", TextSelection::collapsed(3));
        let rejected = filter.apply(&mut value);
        assert_eq!(value.text(), "1234");
        assert_eq!(value.selection(), TextSelection::collapsed(2));
        assert_eq!(rejected.as_deref(), Some("a"));
    }

    #[test]
    fn test_invalid_filter_is_an_error() {
        let result = FormatterChain::from_config(&TextFieldConfig::default().input_filter("(["));
        assert!(matches!(result, Err(EditingError::InvalidFilter { .. })));
    }

    #[test]
    fn test_chain_order_and_exceeded_flag() {
        let config = TextFieldConfig::default()
            .keyboard_type(KeyboardType::Number)
            .max_length(3);
        let chain = FormatterChain::from_config(&config).expect("chain");
        assert_eq!(chain.len(), 3);

        let mut proposed = EditingValue::with_caret_at_end("12a34");
        let report = chain.apply(&EditingValue::default(), &mut proposed);
        // Truncation happens before the digit filter sees the text.
        assert_eq!(proposed.text(), "12");
        assert!(report.exceeded_limit);
        assert_eq!(report.rejected, None);
    }
}
