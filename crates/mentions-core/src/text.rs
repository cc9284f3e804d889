//! Text input abstraction.
//!
//! The core never owns the text: it reads the buffer and caret on demand and
//! splices through the same interface, so hosts can back it with a DOM
//! textarea, a native widget, or the provided rope implementation.
//!
//! All offsets are in chars (Unicode scalar values), not bytes.

use std::ops::Range;

use smol_str::{SmolStr, ToSmolStr};

/// A mutable text field with a caret/selection.
pub trait TextInput {
    /// Total length in chars.
    fn len_chars(&self) -> usize;

    /// The full field value.
    fn value(&self) -> String;

    /// Character at a char offset. `None` when out of bounds.
    fn char_at(&self, char_offset: usize) -> Option<char>;

    /// Slice of the value. `None` when the range is out of bounds.
    fn slice(&self, char_range: Range<usize>) -> Option<SmolStr>;

    /// Caret position, or the lower end of the active selection.
    fn selection_start(&self) -> usize;

    /// Upper end of the active selection; equals `selection_start` for a
    /// collapsed caret.
    fn selection_end(&self) -> usize;

    /// Replace `char_range` with `text`. The range must be within bounds.
    fn replace(&mut self, char_range: Range<usize>, text: &str);

    /// Move the caret (`start == end`) or set a selection.
    fn set_selection_range(&mut self, start: usize, end: usize);

    /// Whether a non-collapsed selection is active.
    fn has_selection(&self) -> bool {
        self.selection_start() != self.selection_end()
    }
}

/// Ropey-backed text input for tests and native hosts.
///
/// O(log n) editing and offset conversion; selection state is plain fields.
#[derive(Debug, Clone, Default)]
pub struct RopeInput {
    rope: ropey::Rope,
    selection_start: usize,
    selection_end: usize,
}

impl RopeInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from text with the caret at the end.
    pub fn from_str(s: &str) -> Self {
        let rope = ropey::Rope::from_str(s);
        let len = rope.len_chars();
        Self {
            rope,
            selection_start: len,
            selection_end: len,
        }
    }

}

impl TextInput for RopeInput {
    fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    fn value(&self) -> String {
        self.rope.to_string()
    }

    fn char_at(&self, char_offset: usize) -> Option<char> {
        if char_offset >= self.rope.len_chars() {
            return None;
        }
        Some(self.rope.char(char_offset))
    }

    fn slice(&self, char_range: Range<usize>) -> Option<SmolStr> {
        if char_range.start > char_range.end || char_range.end > self.rope.len_chars() {
            return None;
        }
        Some(self.rope.slice(char_range).to_smolstr())
    }

    fn selection_start(&self) -> usize {
        self.selection_start
    }

    fn selection_end(&self) -> usize {
        self.selection_end
    }

    fn replace(&mut self, char_range: Range<usize>, text: &str) {
        self.rope.remove(char_range.clone());
        self.rope.insert(char_range.start, text);
    }

    fn set_selection_range(&mut self, start: usize, end: usize) {
        let len = self.rope.len_chars();
        self.selection_start = start.min(len);
        self.selection_end = end.min(len).max(self.selection_start);
    }
}

impl From<&str> for RopeInput {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}
