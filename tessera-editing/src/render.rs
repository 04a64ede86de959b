//! Turns a field's editing state into draw primitives.
//!
//! The modifier owns no editing state. Each frame the field hands it a
//! [`PaintInput`] copied out of the session and the caret mapper, and the
//! modifier issues clipped rectangles to a [`Canvas`]. The only state it keeps
//! is the cursor slide animation.

use std::time::{Duration, Instant};

use derive_setters::Setters;

use crate::{
    color::Color,
    geometry::{Point, Rect},
    layout::{CaretRect, TextBoxes},
    session::SelectionMode,
};

/// Drawing backend supplied by the host renderer. Coordinates are field
/// coordinates.
pub trait Canvas {
    /// Pushes the clip state.
    fn save(&mut self);
    /// Pops the clip state.
    fn restore(&mut self);
    /// Intersects the clip with `rect`.
    fn clip_rect(&mut self, rect: Rect);
    /// Fills `rect`.
    fn draw_rect(&mut self, rect: Rect, color: Color);
    /// Strokes a line `width` pixels wide.
    fn draw_line(&mut self, from: Point, to: Point, width: f32, color: Color);
}

/// Colors and sizes of the editing decorations.
#[derive(Debug, Clone, Copy, PartialEq, Setters)]
pub struct RenderStyle {
    /// Caret color.
    pub cursor_color: Color,
    /// Caret width.
    pub cursor_width: f32,
    /// Selection highlight color.
    pub selection_color: Color,
    /// Underline color while unfocused.
    pub underline_color: Color,
    /// Underline color while focused.
    pub focused_underline_color: Color,
    /// Underline thickness. Zero disables the underline.
    pub underline_width: f32,
    /// Scrollbar thumb color.
    pub scrollbar_color: Color,
    /// Scrollbar thumb thickness.
    pub scrollbar_thickness: f32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            cursor_color: Color::from_rgba_u8(0x0a, 0x59, 0xf7, 0xff),
            cursor_width: 2.5,
            selection_color: Color::from_rgba_u8(0x0a, 0x59, 0xf7, 0x33),
            underline_color: Color::from_rgba_u8(0x00, 0x00, 0x00, 0x33),
            focused_underline_color: Color::from_rgba_u8(0x0a, 0x59, 0xf7, 0xff),
            underline_width: 1.0,
            scrollbar_color: Color::from_rgba_u8(0x00, 0x00, 0x00, 0x66),
            scrollbar_thickness: 2.0,
        }
    }
}

/// Everything the modifier reads for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintInput {
    /// Blink phase of the caret.
    pub cursor_visible: bool,
    /// Caret at the selection extent.
    pub cursor: CaretRect,
    /// Current selection mode.
    pub selection_mode: SelectionMode,
    /// Selection boxes, one per line.
    pub selection: TextBoxes,
    /// Visible text rectangle.
    pub content: Rect,
    /// Bounds of the whole field.
    pub frame: Rect,
    /// Current text scroll.
    pub scroll: Point,
    /// Largest scroll the content allows.
    pub max_scroll: Point,
    /// Whether the field is focused.
    pub focused: bool,
}

#[derive(Debug, Clone, Copy)]
struct CursorTween {
    from: f32,
    to: f32,
    started: Instant,
}

/// Paints selection, caret, underline and scrollbar.
#[derive(Debug, Clone)]
pub struct RenderModifier {
    style: RenderStyle,
    tween_duration: Duration,
    tween: Option<CursorTween>,
}

impl RenderModifier {
    /// Creates a modifier. A zero `tween_duration` snaps the caret.
    pub fn new(style: RenderStyle, tween_duration: Duration) -> Self {
        Self {
            style,
            tween_duration,
            tween: None,
        }
    }

    /// Current style.
    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Replaces the style.
    pub fn set_style(&mut self, style: RenderStyle) {
        self.style = style;
    }

    /// Drawn caret x for a caret whose laid out position is `target`.
    ///
    /// A changed target starts a new slide from wherever the caret is drawn
    /// right now.
    pub fn cursor_x(&mut self, target: f32, now: Instant) -> f32 {
        if self.tween_duration.is_zero() {
            self.tween = None;
            return target;
        }
        match self.tween {
            None => {
                self.tween = Some(CursorTween {
                    from: target,
                    to: target,
                    started: now,
                });
                target
            }
            Some(tween) if tween.to == target => self.sample(&tween, now),
            Some(tween) => {
                let from = self.sample(&tween, now);
                self.tween = Some(CursorTween {
                    from,
                    to: target,
                    started: now,
                });
                from
            }
        }
    }

    /// Whether the caret is still sliding at `now`.
    pub fn is_animating(&self, now: Instant) -> bool {
        self.tween.is_some_and(|tween| {
            tween.from != tween.to && now.duration_since(tween.started) < self.tween_duration
        })
    }

    fn sample(&self, tween: &CursorTween, now: Instant) -> f32 {
        let elapsed = now.duration_since(tween.started).as_secs_f32();
        let total = self.tween_duration.as_secs_f32();
        let t = (elapsed / total).clamp(0.0, 1.0);
        // ease-out cubic
        let eased = 1.0 - (1.0 - t).powi(3);
        tween.from + (tween.to - tween.from) * eased
    }

    /// Paints one frame.
    pub fn paint(&mut self, canvas: &mut dyn Canvas, input: &PaintInput, now: Instant) {
        self.paint_selection(canvas, input);
        self.paint_cursor(canvas, input, now);
        self.paint_underline(canvas, input);
        self.paint_scrollbar(canvas, input);
    }

    fn paint_selection(&self, canvas: &mut dyn Canvas, input: &PaintInput) {
        if input.selection.is_empty() {
            return;
        }
        canvas.save();
        canvas.clip_rect(input.content);
        for text_box in &input.selection {
            if let Some(rect) = text_box.rect.intersection(&input.content) {
                canvas.draw_rect(rect, self.style.selection_color);
            }
        }
        canvas.restore();
    }

    fn paint_cursor(&mut self, canvas: &mut dyn Canvas, input: &PaintInput, now: Instant) {
        if !input.focused
            || !input.cursor_visible
            || input.selection_mode == SelectionMode::SelectAll
        {
            return;
        }
        let width = self.style.cursor_width;
        let x = self.cursor_x(input.cursor.x, now);
        let clip = input.content.inflate(width * 2.0, 0.0);
        let rect = Rect::new(x - width / 2.0, input.cursor.y, width, input.cursor.height);
        let Some(rect) = rect.intersection(&clip) else {
            return;
        };
        canvas.save();
        canvas.clip_rect(clip);
        canvas.draw_rect(rect, self.style.cursor_color);
        canvas.restore();
    }

    fn paint_underline(&self, canvas: &mut dyn Canvas, input: &PaintInput) {
        let width = self.style.underline_width;
        if width <= 0.0 {
            return;
        }
        let (color, width) = if input.focused {
            (self.style.focused_underline_color, width * 2.0)
        } else {
            (self.style.underline_color, width)
        };
        let y = input.frame.bottom() - width / 2.0;
        canvas.draw_line(
            Point::new(input.frame.x, y),
            Point::new(input.frame.right(), y),
            width,
            color,
        );
    }

    fn paint_scrollbar(&self, canvas: &mut dyn Canvas, input: &PaintInput) {
        let thickness = self.style.scrollbar_thickness;
        let content = input.content;
        if input.max_scroll.x > 0.0 && content.width > 0.0 {
            let total = content.width + input.max_scroll.x;
            let length = content.width * content.width / total;
            let offset = (content.width - length) * input.scroll.x / input.max_scroll.x;
            canvas.draw_rect(
                Rect::new(
                    content.x + offset,
                    content.bottom() - thickness,
                    length,
                    thickness,
                ),
                self.style.scrollbar_color,
            );
        }
        if input.max_scroll.y > 0.0 && content.height > 0.0 {
            let total = content.height + input.max_scroll.y;
            let length = content.height * content.height / total;
            let offset = (content.height - length) * input.scroll.y / input.max_scroll.y;
            canvas.draw_rect(
                Rect::new(
                    content.right() - thickness,
                    content.y + offset,
                    thickness,
                    length,
                ),
                self.style.scrollbar_color,
            );
        }
    }
}

impl Default for RenderModifier {
    fn default() -> Self {
        Self::new(RenderStyle::default(), Duration::ZERO)
    }
}
