//! The committed text value and its undo/redo history.
//!
//! ## Usage
//!
//! Owned by the input session controller. Every mutation replaces the current
//! [`EditingValue`] wholesale; snapshots pushed onto the history stacks share
//! their text with the values they came from.

use tracing::trace;

use crate::{
    formatter::{FormatReport, FormatterChain},
    value::{EditingValue, TextSelection},
};

/// Where a committed value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
    /// Typed, deleted or pasted through this field.
    Local,
    /// Delivered by the platform input method.
    Remote,
    /// Produced by undo or redo. Never pushed back onto history.
    History,
}

/// Current value plus undo/redo stacks.
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    value: EditingValue,
    undo_stack: Vec<EditingValue>,
    redo_stack: Vec<EditingValue>,
    history_limit: Option<usize>,
}

impl TextBuffer {
    /// Creates an empty buffer with unbounded history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer holding `value`.
    pub fn with_value(value: EditingValue) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    /// Caps the undo stack; the oldest snapshot is dropped first.
    pub fn set_history_limit(&mut self, limit: Option<usize>) {
        self.history_limit = limit;
        self.trim_undo();
    }

    /// The committed value.
    pub fn value(&self) -> &EditingValue {
        &self.value
    }

    /// Current selection.
    pub fn selection(&self) -> TextSelection {
        self.value.selection()
    }

    /// Whether [`undo`](Self::undo) would do anything.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Whether [`redo`](Self::redo) would do anything.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Replaces the current value.
    ///
    /// A text change from a non-history origin pushes the previous value onto
    /// the undo stack and clears the redo stack. Returns whether the text
    /// changed.
    pub fn commit(&mut self, value: EditingValue, origin: EditOrigin) -> bool {
        let text_changed = value.text() != self.value.text();
        if text_changed && origin != EditOrigin::History {
            let previous = std::mem::replace(&mut self.value, value);
            self.undo_stack.push(previous);
            self.redo_stack.clear();
            self.trim_undo();
            trace!(
                undo = self.undo_stack.len(),
                ?origin,
                "committed text edit"
            );
        } else {
            self.value = value;
        }
        text_changed
    }

    /// Replaces the selection with `text`, formatted by `formatters`.
    pub fn insert(&mut self, text: &str, formatters: &FormatterChain) -> FormatReport {
        let mut proposed = self.value.insert(text);
        let mut report = formatters.apply(&self.value, &mut proposed);
        report.changed = self.commit(proposed, EditOrigin::Local);
        report
    }

    /// Removes `[start, end)` (clamped) and collapses the caret to `start`.
    ///
    /// Returns whether anything was removed.
    pub fn delete(&mut self, start: usize, end: usize) -> bool {
        let proposed = self.value.delete(start, end);
        if proposed == self.value {
            return false;
        }
        self.commit(proposed, EditOrigin::Local)
    }

    /// Moves the selection without touching text or history.
    pub fn update_selection(&mut self, base: usize, extent: usize) {
        self.value = self.value.with_selection(TextSelection::new(base, extent));
    }

    /// Restores the previous snapshot. No-op on an empty stack.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.value, previous);
        self.redo_stack.push(current);
        true
    }

    /// Re-applies the last undone snapshot. No-op on an empty stack.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.value, next);
        self.undo_stack.push(current);
        self.trim_undo();
        true
    }

    fn trim_undo(&mut self) {
        if let Some(limit) = self.history_limit
            && self.undo_stack.len() > limit
        {
            let excess = self.undo_stack.len() - limit;
            self.undo_stack.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::LengthLimitFormatter;

    #[test]
    fn test_insert_collapses_after_text() {
        let mut buffer = TextBuffer::new();
        let report = buffer.insert("hello", &FormatterChain::default());
        assert!(report.changed);
        assert_eq!(buffer.value().text(), "hello");
        assert_eq!(buffer.selection(), TextSelection::collapsed(5));
    }

    #[test]
    fn test_insert_respects_length_limit() {
        let chain = FormatterChain::new(vec![Box::new(LengthLimitFormatter::new(4))], None);
        let mut buffer = TextBuffer::new();
        buffer.insert("hello world", &chain);
        assert_eq!(buffer.value().text(), "hell");
        buffer.insert("more", &chain);
        assert!(buffer.value().len() <= 4);
    }

    #[test]
    fn test_delete_range_and_noop() {
        let mut buffer = TextBuffer::with_value(EditingValue::new(
            "hello world",
            TextSelection::collapsed(0),
        ));
        assert!(buffer.delete(5, 11));
        assert_eq!(buffer.value().text(), "hello");
        assert_eq!(buffer.selection(), TextSelection::collapsed(5));
        assert!(!buffer.delete(3, 3));
        assert!(!buffer.delete(40, 90));
        assert_eq!(buffer.value().text(), "hello");
    }

    #[test]
    fn test_update_selection_clamps() {
        let mut buffer = TextBuffer::with_value(EditingValue::with_caret_at_end("ab"));
        buffer.update_selection(5, 5);
        assert_eq!(buffer.selection(), TextSelection::collapsed(2));
        buffer.update_selection(9, 1);
        assert_eq!(buffer.selection(), TextSelection::new(2, 1));
        assert!(!buffer.can_undo());
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let chain = FormatterChain::default();
        let mut buffer = TextBuffer::new();
        let initial = buffer.value().clone();
        buffer.insert("one", &chain);
        buffer.insert(" two", &chain);
        buffer.update_selection(0, 3);
        buffer.insert("1", &chain);
        let last = buffer.value().clone();

        for _ in 0..3 {
            assert!(buffer.undo());
        }
        assert_eq!(buffer.value(), &initial);
        assert!(!buffer.undo());

        for _ in 0..3 {
            assert!(buffer.redo());
        }
        assert_eq!(buffer.value(), &last);
        assert!(!buffer.redo());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let chain = FormatterChain::default();
        let mut buffer = TextBuffer::new();
        buffer.insert("a", &chain);
        buffer.undo();
        assert!(buffer.can_redo());
        buffer.insert("b", &chain);
        assert!(!buffer.can_redo());
    }

    #[test]
    fn test_selection_only_commit_skips_history() {
        let mut buffer = TextBuffer::with_value(EditingValue::with_caret_at_end("abc"));
        let moved = buffer.value().with_selection(TextSelection::collapsed(1));
        assert!(!buffer.commit(moved, EditOrigin::Remote));
        assert!(!buffer.can_undo());
    }

    #[test]
    fn test_history_limit_drops_oldest() {
        let chain = FormatterChain::default();
        let mut buffer = TextBuffer::new();
        buffer.set_history_limit(Some(2));
        for word in ["a", "b", "c", "d"] {
            buffer.insert(word, &chain);
        }
        assert!(buffer.undo());
        assert!(buffer.undo());
        assert!(!buffer.undo());
        assert_eq!(buffer.value().text(), "ab");
    }
}
