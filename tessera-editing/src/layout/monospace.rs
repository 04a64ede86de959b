//! Fixed-pitch paragraph engine.
//!
//! Every character occupies one cell of the same advance, lines break at
//! `'\n'` and wrap per glyph when a width is given. Layout is always left to
//! right. Useful for terminals, tests and headless hosts.

use crate::{
    geometry::{Point, Rect},
    layout::{Paragraph, ParagraphEngine, TextBox, TextBoxes, TextDirection, TextStyle},
};

/// Engine producing [`MonospaceParagraph`]s.
#[derive(Debug, Clone, Copy)]
pub struct MonospaceEngine {
    advance: Option<f32>,
}

impl MonospaceEngine {
    /// Advance derived from the font size (0.6 em).
    pub fn new() -> Self {
        Self { advance: None }
    }

    /// Fixed advance in pixels, independent of the font size.
    pub fn with_advance(advance: f32) -> Self {
        Self {
            advance: Some(advance),
        }
    }
}

impl Default for MonospaceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ParagraphEngine for MonospaceEngine {
    fn build(&self, text: &str, style: &TextStyle) -> Box<dyn Paragraph> {
        let advance = self.advance.unwrap_or(style.font_size * 0.6);
        Box::new(MonospaceParagraph::new(text, advance, style.line_height()))
    }
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    offset: usize,
    units: usize,
}

#[derive(Debug, Clone)]
struct Line {
    start: usize,
    cells: Vec<Cell>,
}

impl Line {
    fn end(&self) -> usize {
        self.cells
            .last()
            .map(|cell| cell.offset + cell.units)
            .unwrap_or(self.start)
    }
}

/// A fixed-pitch shaped paragraph.
#[derive(Debug, Clone)]
pub struct MonospaceParagraph {
    // (offset, units, is_newline) per char
    chars: Vec<(usize, usize, bool)>,
    advance: f32,
    line_height: f32,
    lines: Vec<Line>,
}

impl MonospaceParagraph {
    fn new(text: &str, advance: f32, line_height: f32) -> Self {
        let mut offset = 0;
        let chars = text
            .chars()
            .map(|ch| {
                let units = ch.len_utf16();
                let entry = (offset, units, ch == '\n');
                offset += units;
                entry
            })
            .collect();
        let mut paragraph = Self {
            chars,
            advance,
            line_height,
            lines: Vec::new(),
        };
        paragraph.layout(f32::INFINITY);
        paragraph
    }
}

impl Paragraph for MonospaceParagraph {
    fn layout(&mut self, width: f32) {
        let max_cells = if width.is_finite() && self.advance > 0.0 {
            ((width / self.advance).floor() as usize).max(1)
        } else {
            usize::MAX
        };
        self.lines.clear();
        let mut line = Line {
            start: 0,
            cells: Vec::new(),
        };
        for &(offset, units, newline) in &self.chars {
            if newline {
                let next = Line {
                    start: offset + units,
                    cells: Vec::new(),
                };
                self.lines.push(std::mem::replace(&mut line, next));
                continue;
            }
            if line.cells.len() >= max_cells {
                let next = Line {
                    start: offset,
                    cells: Vec::new(),
                };
                self.lines.push(std::mem::replace(&mut line, next));
            }
            line.cells.push(Cell { offset, units });
        }
        self.lines.push(line);
    }

    fn height(&self) -> f32 {
        self.lines.len() as f32 * self.line_height
    }

    fn longest_line(&self) -> f32 {
        self.lines
            .iter()
            .map(|line| line.cells.len())
            .max()
            .unwrap_or(0) as f32
            * self.advance
    }

    fn max_intrinsic_width(&self) -> f32 {
        let longest = self
            .chars
            .split(|&(_, _, newline)| newline)
            .map(<[_]>::len)
            .max()
            .unwrap_or(0);
        longest as f32 * self.advance
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn rects_for_range(&self, start: usize, end: usize) -> TextBoxes {
        let mut boxes = TextBoxes::new();
        for (row, line) in self.lines.iter().enumerate() {
            let mut covered = line
                .cells
                .iter()
                .enumerate()
                .filter(|(_, cell)| cell.offset < end && cell.offset + cell.units > start)
                .map(|(column, _)| column);
            let Some(first) = covered.next() else {
                continue;
            };
            let last = covered.last().unwrap_or(first);
            boxes.push(TextBox {
                rect: Rect::new(
                    first as f32 * self.advance,
                    row as f32 * self.line_height,
                    (last - first + 1) as f32 * self.advance,
                    self.line_height,
                ),
                direction: TextDirection::Ltr,
            });
        }
        boxes
    }

    fn glyph_position_at(&self, point: Point) -> usize {
        let Some(last_row) = self.lines.len().checked_sub(1) else {
            return 0;
        };
        let row = if self.line_height > 0.0 {
            ((point.y / self.line_height).floor().max(0.0) as usize).min(last_row)
        } else {
            0
        };
        let line = &self.lines[row];
        let column = if self.advance > 0.0 {
            ((point.x / self.advance).round().max(0.0) as usize).min(line.cells.len())
        } else {
            0
        };
        line.cells
            .get(column)
            .map(|cell| cell.offset)
            .unwrap_or_else(|| line.end())
    }
}
