//! Caret and selection geometry on top of an external shaping engine.
//!
//! ## Usage
//!
//! Implement [`ParagraphEngine`] for the text stack of the host (the
//! [`glyphon`](crate::layout::glyphon) engine ships behind the `glyphon`
//! feature, [`MonospaceEngine`] works anywhere) and let [`CaretMapper`] turn
//! code-unit offsets into pixel rectangles and back.
//!
//! All mapper inputs and outputs are in field coordinates: the mapper owns
//! the text origin (padding plus scroll offset) and converts to paragraph
//! space internally.

#[cfg(feature = "glyphon")]
pub mod glyphon;
pub mod monospace;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::trace;
use unicode_bidi::{BidiClass, bidi_class};

pub use monospace::MonospaceEngine;

use crate::{
    geometry::{Constraints, Point, Rect, Size},
    value::{grapheme_cluster_length, utf16_len},
};

/// Writing direction of a run or paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextDirection {
    /// Left to right.
    #[default]
    Ltr,
    /// Right to left.
    Rtl,
}

/// Direction of the first strongly directional character, LTR when none.
pub fn detect_direction(text: &str) -> TextDirection {
    for ch in text.chars() {
        match bidi_class(ch) {
            BidiClass::L => return TextDirection::Ltr,
            BidiClass::R | BidiClass::AL => return TextDirection::Rtl,
            _ => {}
        }
    }
    TextDirection::Ltr
}

/// Font metrics passed to the paragraph engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Font size in pixels.
    pub font_size: f32,
    /// Line height in pixels; `None` uses 1.2 times the font size.
    pub line_height: Option<f32>,
}

impl TextStyle {
    /// Effective line height.
    pub fn line_height(&self) -> f32 {
        self.line_height.unwrap_or(self.font_size * 1.2)
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 14.0,
            line_height: None,
        }
    }
}

/// One shaped box covering part of a text range on a single line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBox {
    /// Box bounds.
    pub rect: Rect,
    /// Direction of the run the box belongs to.
    pub direction: TextDirection,
}

/// Boxes for a range, usually one per line.
pub type TextBoxes = SmallVec<[TextBox; 4]>;

/// Where the caret is drawn: a vertical segment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CaretRect {
    /// Horizontal position of the caret line.
    pub x: f32,
    /// Top of the caret.
    pub y: f32,
    /// Caret height, the line height.
    pub height: f32,
}

impl CaretRect {
    /// Rectangle of the caret drawn `width` pixels wide.
    pub fn to_rect(self, width: f32) -> Rect {
        Rect::new(self.x, self.y, width, self.height)
    }

    fn translate(self, delta: Point) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            height: self.height,
        }
    }
}

/// A shaped paragraph produced by a [`ParagraphEngine`].
///
/// Offsets are UTF-16 code units; coordinates are relative to the top-left
/// corner of the paragraph.
pub trait Paragraph: Send + Sync {
    /// Lays the paragraph out for `width`, which may be infinite.
    fn layout(&mut self, width: f32);
    /// Total height after layout.
    fn height(&self) -> f32;
    /// Width of the widest laid out line.
    fn longest_line(&self) -> f32;
    /// Width the paragraph would need to avoid soft wrapping.
    fn max_intrinsic_width(&self) -> f32;
    /// Number of laid out lines.
    fn line_count(&self) -> usize;
    /// Boxes covering `[start, end)`, one per line fragment.
    fn rects_for_range(&self, start: usize, end: usize) -> TextBoxes;
    /// Offset of the caret position nearest to `point`.
    fn glyph_position_at(&self, point: Point) -> usize;
}

/// Builds shaped paragraphs.
pub trait ParagraphEngine: Send + Sync {
    /// Shapes `text` with `style`. Layout happens separately.
    fn build(&self, text: &str, style: &TextStyle) -> Box<dyn Paragraph>;
}

/// Owns the shaped paragraph of a field and answers geometry queries.
pub struct CaretMapper {
    engine: Arc<dyn ParagraphEngine>,
    style: TextStyle,
    multiline: bool,
    paragraph: Option<Box<dyn Paragraph>>,
    shaped: Option<String>,
    text: String,
    showing_placeholder: bool,
    direction: TextDirection,
    content_size: Size,
    viewport: Rect,
    scroll: Point,
    last_caret: Option<CaretRect>,
    revision: u64,
}

impl CaretMapper {
    /// Creates a mapper; nothing is shaped until the first measurement.
    pub fn new(engine: Arc<dyn ParagraphEngine>, style: TextStyle, multiline: bool) -> Self {
        Self {
            engine,
            style,
            multiline,
            paragraph: None,
            shaped: None,
            text: String::new(),
            showing_placeholder: false,
            direction: TextDirection::Ltr,
            content_size: Size::ZERO,
            viewport: Rect::ZERO,
            scroll: Point::ZERO,
            last_caret: None,
            revision: 0,
        }
    }

    /// Replaces the style; the next measurement reshapes.
    pub fn set_style(&mut self, style: TextStyle) {
        if self.style != style {
            self.style = style;
            self.shaped = None;
        }
    }

    /// Switches between single- and multi-line layout.
    pub fn set_multiline(&mut self, multiline: bool) {
        self.multiline = multiline;
    }

    /// Line height of the current style.
    pub fn line_height(&self) -> f32 {
        self.style.line_height()
    }

    /// Direction of the shaped text.
    pub fn direction(&self) -> TextDirection {
        self.direction
    }

    /// Content size from the last measurement.
    pub fn content_size(&self) -> Size {
        self.content_size
    }

    /// Bumped every time the paragraph is rebuilt.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the placeholder is what is currently shaped.
    pub fn showing_placeholder(&self) -> bool {
        self.showing_placeholder
    }

    /// Shapes `text` (or `placeholder` when `text` is empty) if it changed
    /// and lays it out for `constraints`.
    ///
    /// `reserved_width` is kept free for a trailing icon. Returns the content
    /// size clipped to `constraints`.
    pub fn measure_content(
        &mut self,
        text: &str,
        placeholder: &str,
        constraints: Constraints,
        reserved_width: f32,
    ) -> Size {
        self.showing_placeholder = text.is_empty();
        let candidate = if self.showing_placeholder {
            placeholder
        } else {
            text
        };
        self.text.clear();
        self.text.push_str(text);

        if self.shaped.as_deref() != Some(candidate) || self.paragraph.is_none() {
            self.paragraph = Some(self.engine.build(candidate, &self.style));
            self.shaped = Some(candidate.to_string());
            self.direction = detect_direction(candidate);
            self.revision += 1;
            trace!(revision = self.revision, "reshaped paragraph");
        }
        let Some(paragraph) = self.paragraph.as_mut() else {
            return Size::ZERO;
        };

        if self.multiline {
            paragraph.layout((constraints.max_width - reserved_width).max(0.0));
        } else {
            paragraph.layout(f32::INFINITY);
            let intrinsic = paragraph.max_intrinsic_width().ceil();
            paragraph.layout(intrinsic);
        }

        let height = paragraph.height().max(self.style.line_height());
        let size = constraints.constrain(Size::new(
            paragraph.longest_line() + reserved_width,
            height.min(constraints.max_height),
        ));
        self.content_size = Size::new(paragraph.longest_line(), height);
        size
    }

    /// Whether `text` (or `placeholder`) differs from what was last measured.
    pub fn is_stale(&self, text: &str, placeholder: &str) -> bool {
        let candidate = if text.is_empty() { placeholder } else { text };
        self.paragraph.is_none() || self.text != text || self.shaped.as_deref() != Some(candidate)
    }

    /// Sets the rectangle the text is visible in, in field coordinates.
    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
        self.clamp_scroll();
    }

    /// Visible text rectangle.
    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    /// Current scroll offset of the text inside the viewport.
    pub fn scroll(&self) -> Point {
        self.scroll
    }

    /// Scrolls by `delta`, clamped to the content. Returns the applied delta.
    pub fn scroll_by(&mut self, delta: Point) -> Point {
        let before = self.scroll;
        self.scroll = self.scroll + delta;
        self.clamp_scroll();
        self.scroll - before
    }

    /// Largest scroll offset the content allows.
    pub fn max_scroll(&self) -> Point {
        Point::new(
            (self.content_size.width - self.viewport.width).max(0.0),
            (self.content_size.height - self.viewport.height).max(0.0),
        )
    }

    fn clamp_scroll(&mut self) {
        let max = self.max_scroll();
        self.scroll = Point::new(
            self.scroll.x.clamp(0.0, max.x),
            self.scroll.y.clamp(0.0, max.y),
        );
    }

    fn origin(&self) -> Point {
        self.viewport.origin() - self.scroll
    }

    /// Adjusts scrolling so `caret` (field coordinates) is inside the
    /// viewport.
    pub fn scroll_into_view(&mut self, caret: CaretRect) {
        let mut delta = Point::ZERO;
        if caret.x < self.viewport.x {
            delta.x = caret.x - self.viewport.x;
        } else if caret.x > self.viewport.right() {
            delta.x = caret.x - self.viewport.right();
        }
        if caret.y < self.viewport.y {
            delta.y = caret.y - self.viewport.y;
        } else if caret.y + caret.height > self.viewport.bottom() {
            delta.y = caret.y + caret.height - self.viewport.bottom();
        }
        if delta != Point::ZERO {
            self.scroll_by(delta);
        }
    }

    /// Whether `rect` (field coordinates) is inside the viewport. A small
    /// tolerance absorbs rounding from the shaping engine.
    pub fn is_visible(&self, rect: Rect) -> bool {
        self.viewport.inflate(0.5, 0.5).contains_rect(&rect)
    }

    /// Downstream caret geometry for `index`: the leading edge of the glyph
    /// that starts at `index`.
    ///
    /// Fails when `index` is at or past the end of the text or the paragraph
    /// has no box there; callers keep their previous caret in that case.
    pub fn offset_for_position(&self, index: usize) -> Option<CaretRect> {
        let paragraph = self.paragraph.as_ref()?;
        if self.showing_placeholder || index >= utf16_len(&self.text) {
            return None;
        }
        let cluster = grapheme_cluster_length(&self.text, index, false);
        let boxes = paragraph.rects_for_range(index, index + cluster);
        let first = boxes.first()?;
        let x = match first.direction {
            TextDirection::Ltr => first.rect.x,
            TextDirection::Rtl => first.rect.right(),
        };
        Some(
            CaretRect {
                x: x.min(paragraph.longest_line()),
                y: first.rect.y,
                height: first.rect.height,
            }
            .translate(self.origin()),
        )
    }

    fn upstream_caret(&self, index: usize) -> Option<CaretRect> {
        let paragraph = self.paragraph.as_ref()?;
        if self.showing_placeholder || index == 0 || index > utf16_len(&self.text) {
            return None;
        }
        let cluster = grapheme_cluster_length(&self.text, index, true);
        let boxes = paragraph.rects_for_range(index.saturating_sub(cluster), index);
        let last = boxes.last()?;
        let x = match last.direction {
            TextDirection::Ltr => last.rect.right(),
            TextDirection::Rtl => last.rect.x,
        };
        Some(
            CaretRect {
                x,
                y: last.rect.y,
                height: last.rect.height,
            }
            .translate(self.origin()),
        )
    }

    fn leading_edge(&self) -> CaretRect {
        let x = match self.direction {
            TextDirection::Ltr => 0.0,
            TextDirection::Rtl => self.viewport.width,
        };
        CaretRect {
            x,
            y: 0.0,
            height: self.style.line_height(),
        }
        .translate(self.origin())
    }

    /// Caret geometry used for drawing.
    ///
    /// Tries the downstream glyph, then the upstream one (end of text and
    /// line ends), then the last caret that resolved, then the leading edge
    /// of the first line.
    pub fn caret_rect(&mut self, index: usize) -> CaretRect {
        let caret = self
            .offset_for_position(index)
            .or_else(|| self.upstream_caret(index));
        match caret {
            Some(caret) => {
                self.last_caret = Some(caret);
                caret
            }
            None if self.showing_placeholder => self.leading_edge(),
            None => self.last_caret.unwrap_or_else(|| self.leading_edge()),
        }
    }

    /// Code-unit offset nearest to `point` (field coordinates), clamped to
    /// the text.
    pub fn position_for_offset(&self, point: Point) -> usize {
        let len = utf16_len(&self.text);
        let Some(paragraph) = self.paragraph.as_ref() else {
            return 0;
        };
        if self.showing_placeholder {
            return 0;
        }
        let local = point - self.origin();
        if !self.multiline
            && self.direction == TextDirection::Ltr
            && local.x >= paragraph.longest_line()
        {
            return len;
        }
        paragraph.glyph_position_at(local).min(len)
    }

    /// Boxes covering `[start, end)` in field coordinates, one per line.
    pub fn selection_boxes(&self, start: usize, end: usize) -> TextBoxes {
        let Some(paragraph) = self.paragraph.as_ref() else {
            return TextBoxes::new();
        };
        if self.showing_placeholder || start >= end {
            return TextBoxes::new();
        }
        let origin = self.origin();
        paragraph
            .rects_for_range(start, end)
            .into_iter()
            .map(|text_box| TextBox {
                rect: text_box.rect.translate(origin),
                direction: text_box.direction,
            })
            .collect()
    }
}
