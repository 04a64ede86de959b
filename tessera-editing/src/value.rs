//! Text + selection snapshots addressed in UTF-16 code units.
//!
//! ## Usage
//!
//! Build proposed edits with [`EditingValue::insert`] and
//! [`EditingValue::delete`], then hand them to the formatter chain and the
//! buffer. Values are immutable; every edit produces a new one.
//!
//! Offsets count UTF-16 code units because that is what platform input
//! methods report. The text itself stays a Rust string; offsets that land in
//! the middle of a surrogate pair round down to the start of the pair.

use std::sync::Arc;

/// Number of UTF-16 code units in `text`.
pub fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Byte index of the character containing UTF-16 `offset`.
///
/// Offsets past the end map to `text.len()`.
pub fn byte_index(text: &str, offset: usize) -> usize {
    let mut units = 0;
    for (index, ch) in text.char_indices() {
        let next = units + ch.len_utf16();
        if next > offset {
            return index;
        }
        units = next;
    }
    text.len()
}

/// UTF-16 offset of byte index `byte`, rounding down to a char boundary.
pub fn utf16_offset(text: &str, byte: usize) -> usize {
    text.char_indices()
        .take_while(|(index, _)| *index < byte)
        .map(|(_, ch)| ch.len_utf16())
        .sum()
}

/// Substring between two UTF-16 offsets. Reversed bounds yield an empty
/// string.
pub fn slice_utf16(text: &str, start: usize, end: usize) -> &str {
    let start_byte = byte_index(text, start);
    let end_byte = byte_index(text, end).max(start_byte);
    &text[start_byte..end_byte]
}

/// Length of the cluster adjacent to `offset`: 2 when that code unit belongs
/// to a character outside the Basic Multilingual Plane, otherwise 1.
///
/// `before` selects the cluster ending at `offset` instead of the one
/// starting there.
pub fn grapheme_cluster_length(text: &str, offset: usize, before: bool) -> usize {
    let probe = if before {
        match offset.checked_sub(1) {
            Some(probe) => probe,
            None => return 1,
        }
    } else {
        offset
    };
    match char_containing(text, probe) {
        Some((_, ch)) => ch.len_utf16(),
        None => 1,
    }
}

// Returns the UTF-16 start offset and the char covering code unit `offset`.
fn char_containing(text: &str, offset: usize) -> Option<(usize, char)> {
    let mut units = 0;
    for ch in text.chars() {
        let next = units + ch.len_utf16();
        if next > offset {
            return Some((units, ch));
        }
        units = next;
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Word,
    Whitespace,
    Other,
}

fn classify(ch: char) -> CharClass {
    if ch.is_alphanumeric() || ch == '_' {
        CharClass::Word
    } else if ch.is_whitespace() {
        CharClass::Whitespace
    } else {
        CharClass::Other
    }
}

/// Range of the run of same-class characters around code unit `index`.
///
/// Characters are classed as word characters, whitespace, or everything
/// else. An index past the end probes the last character; empty text yields
/// an empty range.
pub fn range_of_same_type(text: &str, index: usize) -> TextSelection {
    let chars: Vec<(usize, char)> = {
        let mut units = 0;
        text.chars()
            .map(|ch| {
                let start = units;
                units += ch.len_utf16();
                (start, ch)
            })
            .collect()
    };
    let Some(last) = chars.len().checked_sub(1) else {
        return TextSelection::collapsed(0);
    };
    let center = chars
        .iter()
        .position(|(start, ch)| index < start + ch.len_utf16())
        .unwrap_or(last);
    let class = classify(chars[center].1);

    let mut left = center;
    while left > 0 && classify(chars[left - 1].1) == class {
        left -= 1;
    }
    let mut right = center;
    while right < last && classify(chars[right + 1].1) == class {
        right += 1;
    }
    let (end_start, end_char) = chars[right];
    TextSelection::new(chars[left].0, end_start + end_char.len_utf16())
}

/// Caret or range selection, as a base (anchor) and extent (focus) pair.
///
/// `base` may be greater than `extent`; the direction matters for
/// shift-extend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextSelection {
    /// Anchor of the selection.
    pub base: usize,
    /// Moving end of the selection, where the caret is drawn.
    pub extent: usize,
}

impl TextSelection {
    /// Creates a selection from anchor and focus offsets.
    pub const fn new(base: usize, extent: usize) -> Self {
        Self { base, extent }
    }

    /// Creates a caret at `offset`.
    pub const fn collapsed(offset: usize) -> Self {
        Self {
            base: offset,
            extent: offset,
        }
    }

    /// Lower bound of the range.
    pub fn start(&self) -> usize {
        self.base.min(self.extent)
    }

    /// Upper bound of the range.
    pub fn end(&self) -> usize {
        self.base.max(self.extent)
    }

    /// Whether the selection is a bare caret.
    pub fn is_collapsed(&self) -> bool {
        self.base == self.extent
    }

    /// Whether the anchor sits after the focus.
    pub fn is_reversed(&self) -> bool {
        self.base > self.extent
    }

    /// Number of selected code units.
    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    /// Whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }

    /// Clamps both ends into `[0, len]`, keeping direction.
    pub fn clamped(&self, len: usize) -> Self {
        Self::new(self.base.min(len), self.extent.min(len))
    }
}

/// Immutable snapshot of the text and its selection.
///
/// The text is reference counted so history stacks can keep snapshots
/// without copying strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditingValue {
    text: Arc<str>,
    selection: TextSelection,
}

impl EditingValue {
    /// Creates a value, clamping the selection into the text.
    pub fn new(text: impl Into<Arc<str>>, selection: TextSelection) -> Self {
        let text = text.into();
        let len = utf16_len(&text);
        Self {
            text,
            selection: selection.clamped(len),
        }
    }

    /// Creates a value with the caret after the last character.
    pub fn with_caret_at_end(text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let len = utf16_len(&text);
        Self {
            text,
            selection: TextSelection::collapsed(len),
        }
    }

    /// The text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The selection, always within the text.
    pub fn selection(&self) -> TextSelection {
        self.selection
    }

    /// Text length in UTF-16 code units.
    pub fn len(&self) -> usize {
        utf16_len(&self.text)
    }

    /// Whether the text is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Same text with a new selection, clamped.
    pub fn with_selection(&self, selection: TextSelection) -> Self {
        Self {
            text: Arc::clone(&self.text),
            selection: selection.clamped(self.len()),
        }
    }

    /// Text before the selection start.
    pub fn before_selection(&self) -> &str {
        slice_utf16(&self.text, 0, self.selection.start())
    }

    /// Selected text.
    pub fn selected_text(&self) -> &str {
        slice_utf16(&self.text, self.selection.start(), self.selection.end())
    }

    /// Text after the selection end.
    pub fn after_selection(&self) -> &str {
        slice_utf16(&self.text, self.selection.end(), self.len())
    }

    /// Replaces the selection with `inserted` and puts the caret after it.
    pub fn insert(&self, inserted: &str) -> Self {
        let start = self.selection.start();
        let mut text = String::with_capacity(self.text.len() + inserted.len());
        text.push_str(self.before_selection());
        text.push_str(inserted);
        text.push_str(self.after_selection());
        Self {
            text: text.into(),
            selection: TextSelection::collapsed(start + utf16_len(inserted)),
        }
    }

    /// Removes `[start, end)` and collapses the caret to `start`.
    ///
    /// Bounds are clamped and ordered; an empty range returns the value
    /// unchanged, selection included.
    pub fn delete(&self, start: usize, end: usize) -> Self {
        let len = self.len();
        let (start, end) = (start.min(end).min(len), start.max(end).min(len));
        if start == end {
            return self.clone();
        }
        let start_byte = byte_index(&self.text, start);
        let end_byte = byte_index(&self.text, end);
        let mut text = String::with_capacity(self.text.len() - (end_byte - start_byte));
        text.push_str(&self.text[..start_byte]);
        text.push_str(&self.text[end_byte..]);
        Self {
            text: text.into(),
            selection: TextSelection::collapsed(utf16_offset(&self.text, start_byte)),
        }
    }
}

/// A single contiguous replacement: `[start, end)` of the old text becomes
/// `inserted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDelta {
    /// Start of the replaced range in the old text.
    pub start: usize,
    /// End of the replaced range in the old text.
    pub end: usize,
    /// Replacement text.
    pub inserted: String,
}

impl TextDelta {
    /// Smallest delta turning `old` into `new`, or `None` if they are equal.
    pub fn between(old: &str, new: &str) -> Option<Self> {
        if old == new {
            return None;
        }
        let prefix_bytes: usize = old
            .chars()
            .zip(new.chars())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a.len_utf8())
            .sum();
        let old_rest = &old[prefix_bytes..];
        let new_rest = &new[prefix_bytes..];
        let suffix_bytes: usize = old_rest
            .chars()
            .rev()
            .zip(new_rest.chars().rev())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a.len_utf8())
            .sum();
        let start = utf16_len(&old[..prefix_bytes]);
        let removed = &old_rest[..old_rest.len() - suffix_bytes];
        let inserted = &new_rest[..new_rest.len() - suffix_bytes];
        Some(Self {
            start,
            end: start + utf16_len(removed),
            inserted: inserted.to_string(),
        })
    }

    /// Net change in length, in code units.
    pub fn len_change(&self) -> isize {
        utf16_len(&self.inserted) as isize - (self.end - self.start) as isize
    }

    /// Offset just after the inserted text.
    pub fn inserted_end(&self) -> usize {
        self.start + utf16_len(&self.inserted)
    }

    /// Maps an offset of the old text into the new text.
    pub fn map_offset(&self, offset: usize) -> usize {
        if offset <= self.start {
            offset
        } else if offset >= self.end {
            offset.saturating_add_signed(self.len_change())
        } else {
            self.inserted_end()
        }
    }

    /// Re-expresses this delta, computed against some base text, on top of
    /// `applied`, another delta against the same base that already happened.
    ///
    /// Overlapping replacements keep `applied` and insert this delta's text
    /// right after it, so no typed text is dropped.
    pub fn rebase_over(&self, applied: &TextDelta) -> TextDelta {
        if self.start >= applied.end {
            let shift = applied.len_change();
            TextDelta {
                start: self.start.saturating_add_signed(shift),
                end: self.end.saturating_add_signed(shift),
                inserted: self.inserted.clone(),
            }
        } else if self.end <= applied.start {
            self.clone()
        } else {
            let at = applied.inserted_end();
            TextDelta {
                start: at,
                end: at,
                inserted: self.inserted.clone(),
            }
        }
    }

    /// Applies the delta to `text`, clamping the range into it.
    pub fn apply(&self, text: &str) -> String {
        let len = utf16_len(text);
        let start = byte_index(text, self.start.min(len));
        let end = byte_index(text, self.end.min(len)).max(start);
        let mut out = String::with_capacity(text.len() + self.inserted.len());
        out.push_str(&text[..start]);
        out.push_str(&self.inserted);
        out.push_str(&text[end..]);
        out
    }
}
