//! Paragraph engine backed by glyphon (cosmic-text).
//!
//! The font system is shared behind a mutex and passed in explicitly, so
//! several fields can shape with the same font database.

use std::sync::Arc;

use ::glyphon::{Attrs, Buffer, Cursor, FontSystem, Metrics, Shaping, Wrap};
use parking_lot::Mutex;

use crate::{
    geometry::{Point, Rect},
    layout::{Paragraph, ParagraphEngine, TextBox, TextBoxes, TextDirection, TextStyle},
    value::{byte_index, utf16_len, utf16_offset},
};

/// Shapes paragraphs with a shared [`FontSystem`].
#[derive(Clone)]
pub struct GlyphonEngine {
    font_system: Arc<Mutex<FontSystem>>,
}

impl GlyphonEngine {
    /// Creates an engine over `font_system`.
    pub fn new(font_system: Arc<Mutex<FontSystem>>) -> Self {
        Self { font_system }
    }
}

impl ParagraphEngine for GlyphonEngine {
    fn build(&self, text: &str, style: &TextStyle) -> Box<dyn Paragraph> {
        let mut font_system = self.font_system.lock();
        let mut buffer = Buffer::new(
            &mut font_system,
            Metrics::new(style.font_size, style.line_height()),
        );
        buffer.set_wrap(&mut font_system, Wrap::Glyph);
        buffer.set_text(
            &mut font_system,
            text,
            &Attrs::new().family(::glyphon::fontdb::Family::SansSerif),
            Shaping::Advanced,
            None,
        );
        let mut line_starts = Vec::new();
        let mut units = 0;
        for line in text.split('\n') {
            line_starts.push((units, line.to_string()));
            units += utf16_len(line) + 1;
        }
        drop(font_system);
        Box::new(GlyphonParagraph {
            font_system: Arc::clone(&self.font_system),
            buffer,
            line_starts,
            intrinsic_width: 0.0,
        })
    }
}

struct GlyphonParagraph {
    font_system: Arc<Mutex<FontSystem>>,
    buffer: Buffer,
    // UTF-16 start and text of every hard line
    line_starts: Vec<(usize, String)>,
    intrinsic_width: f32,
}

impl GlyphonParagraph {
    fn cursor_at(&self, offset: usize) -> Cursor {
        let line = self
            .line_starts
            .iter()
            .rposition(|(start, _)| *start <= offset)
            .unwrap_or(0);
        let (start, text) = &self.line_starts[line];
        Cursor::new(line, byte_index(text, offset - start))
    }

    fn offset_of(&self, cursor: Cursor) -> usize {
        self.line_starts
            .get(cursor.line)
            .map(|(start, text)| start + utf16_offset(text, cursor.index))
            .unwrap_or(0)
    }

    fn widest_run(&self) -> f32 {
        self.buffer
            .layout_runs()
            .map(|run| run.line_w)
            .fold(0.0, f32::max)
    }
}

impl Paragraph for GlyphonParagraph {
    fn layout(&mut self, width: f32) {
        let mut font_system = self.font_system.lock();
        self.buffer.set_size(&mut font_system, None, None);
        self.buffer.shape_until_scroll(&mut font_system, false);
        self.intrinsic_width = self.widest_run();
        let width = width.is_finite().then_some(width);
        self.buffer.set_size(&mut font_system, width, None);
        self.buffer.shape_until_scroll(&mut font_system, false);
    }

    fn height(&self) -> f32 {
        self.buffer
            .layout_runs()
            .map(|run| run.line_top + run.line_height)
            .fold(0.0, f32::max)
    }

    fn longest_line(&self) -> f32 {
        self.widest_run()
    }

    fn max_intrinsic_width(&self) -> f32 {
        self.intrinsic_width
    }

    fn line_count(&self) -> usize {
        self.buffer.layout_runs().count()
    }

    fn rects_for_range(&self, start: usize, end: usize) -> TextBoxes {
        let first = self.cursor_at(start);
        let last = self.cursor_at(end);
        let mut boxes = TextBoxes::new();
        for run in self.buffer.layout_runs() {
            if run.line_i < first.line || run.line_i > last.line {
                continue;
            }
            let line_len = self
                .line_starts
                .get(run.line_i)
                .map(|(_, text)| text.len())
                .unwrap_or(0);
            let from = if run.line_i == first.line {
                first
            } else {
                Cursor::new(run.line_i, 0)
            };
            let to = if run.line_i == last.line {
                last
            } else {
                Cursor::new(run.line_i, line_len)
            };
            if let Some((x, width)) = run.highlight(from, to)
                && width > 0.0
            {
                boxes.push(TextBox {
                    rect: Rect::new(x, run.line_top, width, run.line_height),
                    direction: if run.rtl {
                        TextDirection::Rtl
                    } else {
                        TextDirection::Ltr
                    },
                });
            }
        }
        boxes
    }

    fn glyph_position_at(&self, point: Point) -> usize {
        self.buffer
            .hit(point.x, point.y)
            .map(|cursor| self.offset_of(cursor))
            .unwrap_or(0)
    }
}
