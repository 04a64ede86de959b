//! Small behavior traits a field exposes to the host instead of a base
//! class hierarchy.

use crate::geometry::Point;

/// Something that can hold keyboard focus.
pub trait FocusTarget {
    /// Focus moved onto the target.
    fn on_focus_gained(&mut self);
    /// Focus moved away from the target.
    fn on_focus_lost(&mut self);
    /// Whether the target currently holds focus.
    fn is_focused(&self) -> bool;
}

/// Content that scrolls inside a viewport.
pub trait Scrollable {
    /// Current scroll offset.
    fn scroll_offset(&self) -> Point;
    /// Largest valid scroll offset.
    fn max_scroll_offset(&self) -> Point;
    /// Scrolls by `delta`, clamped. Returns the delta actually applied.
    fn scroll_by(&mut self, delta: Point) -> Point;
}

/// Content that reacts to pointer drags.
pub trait Draggable {
    /// A drag began at `point`.
    fn drag_start(&mut self, point: Point);
    /// The pointer moved to `point` while dragging.
    fn drag_update(&mut self, point: Point);
    /// The drag ended.
    fn drag_end(&mut self);
    /// Whether a drag is in progress.
    fn is_dragging(&self) -> bool;
}
