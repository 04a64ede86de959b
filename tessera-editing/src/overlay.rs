//! Floating selection handles and the context menu.
//!
//! ## Usage
//!
//! The presenter never owns the field. It holds a [`FieldRef`], a weak link
//! to the session's shared state, and reads the geometry snapshot the
//! session publishes after every layout. The actual drawing is done by an
//! [`OverlayHost`] supplied by the embedder; without one the presenter still
//! tracks handle state so hit-testing and focus keep working.
//!
//! Handle rectangles in [`OverlayShowOption`] are in host coordinates.

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    geometry::{Point, Rect},
    layout::CaretRect,
    session::{GeometrySnapshot, InputSessionController, SessionMessage, SessionShared},
};

/// Width of a drawn selection handle.
pub const HANDLE_WIDTH: f32 = 16.0;

/// Context menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MenuAction {
    /// Cut the selection.
    Cut,
    /// Copy the selection.
    Copy,
    /// The copy-all entry: selects the whole text so it can be copied.
    #[serde(rename = "copy-all")]
    SelectAll,
    /// Paste the clipboard.
    Paste,
}

/// Which handle a pointer is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// Handle at the selection start.
    Start,
    /// Handle at the selection end.
    End,
    /// The single caret handle.
    Single,
}

/// What caused the overlay to be shown or updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayTrigger {
    /// A tap placed the caret.
    #[default]
    Tap,
    /// A double tap selected a word.
    DoubleTap,
    /// A long press.
    LongPress,
    /// A secondary mouse click.
    Mouse,
    /// A handle was dragged.
    HandleMove,
}

/// Everything the overlay host needs to draw the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OverlayShowOption {
    /// Show the context menu.
    pub show_menu: bool,
    /// Start handle inside the viewport.
    pub show_start_handle: bool,
    /// End handle inside the viewport.
    pub show_end_handle: bool,
    /// Only the caret handle is shown.
    pub is_single_handle: bool,
    /// Why this option was produced.
    pub trigger: OverlayTrigger,
    /// Start handle bounds, host coordinates.
    pub start_handle: Rect,
    /// End handle bounds, host coordinates. Holds the caret handle in single
    /// handle mode.
    pub end_handle: Rect,
}

impl OverlayShowOption {
    /// Whether the option is a long-press overlay.
    pub fn is_long_press(&self) -> bool {
        self.trigger == OverlayTrigger::LongPress
    }

    /// While shown, a menu or a range selection keeps input focus on the
    /// overlay.
    pub fn holds_focus(&self) -> bool {
        self.show_menu || !self.is_single_handle
    }
}

/// Draws the floating overlay.
pub trait OverlayHost: Send + Sync {
    /// Shows the overlay.
    fn show(&self, option: &OverlayShowOption);
    /// Moves or restyles a shown overlay.
    fn update(&self, option: &OverlayShowOption);
    /// Removes the overlay.
    fn hide(&self);
}

/// Weak link from the overlay to the field it decorates.
#[derive(Clone)]
pub struct FieldRef {
    shared: Weak<SessionShared>,
}

impl FieldRef {
    /// Link to `session`.
    pub fn new(session: &InputSessionController) -> Self {
        Self {
            shared: Arc::downgrade(session.shared()),
        }
    }

    /// Whether the field still exists.
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }

    fn geometry(&self) -> Option<GeometrySnapshot> {
        self.shared.upgrade().map(|shared| shared.geometry())
    }

    fn set_overlay_focus(&self, focused: bool) {
        if let Some(shared) = self.shared.upgrade() {
            shared.set_overlay_focus(focused);
        }
    }

    fn post(&self, message: SessionMessage) -> bool {
        match self.shared.upgrade() {
            Some(shared) => {
                shared.post(message);
                true
            }
            None => false,
        }
    }
}

/// Rectangle of the handle hanging below `caret`, in field coordinates.
pub fn handle_rect(caret: CaretRect) -> Rect {
    Rect::new(
        caret.x - HANDLE_WIDTH / 2.0,
        caret.y,
        HANDLE_WIDTH,
        caret.height + HANDLE_WIDTH,
    )
}

fn caret_visible(viewport: Rect, caret: CaretRect) -> bool {
    viewport.inflate(0.5, 0.5).contains_rect(&caret.to_rect(0.0))
}

/// Shows, moves and hides the selection overlay of one field.
pub struct OverlayPresenter {
    field: FieldRef,
    host: Option<Arc<dyn OverlayHost>>,
    current: Option<OverlayShowOption>,
    hot_zone: f32,
}

impl OverlayPresenter {
    /// Creates a hidden presenter. `hot_zone` widens handles for
    /// hit-testing.
    pub fn new(field: FieldRef, host: Option<Arc<dyn OverlayHost>>, hot_zone: f32) -> Self {
        Self {
            field,
            host,
            current: None,
            hot_zone,
        }
    }

    /// Whether the overlay is shown.
    pub fn is_shown(&self) -> bool {
        self.current.is_some()
    }

    /// The option last pushed to the host.
    pub fn current(&self) -> Option<&OverlayShowOption> {
        self.current.as_ref()
    }

    fn option_from(
        geometry: &GeometrySnapshot,
        is_single_handle: bool,
        show_menu: bool,
        trigger: OverlayTrigger,
    ) -> OverlayShowOption {
        let origin = geometry.frame.origin();
        let (start_caret, end_caret) = (geometry.start_caret, geometry.end_caret);
        OverlayShowOption {
            show_menu,
            show_start_handle: !is_single_handle && caret_visible(geometry.viewport, start_caret),
            show_end_handle: caret_visible(geometry.viewport, end_caret),
            is_single_handle,
            trigger,
            start_handle: handle_rect(start_caret).translate(origin),
            end_handle: handle_rect(end_caret).translate(origin),
        }
    }

    /// Shows the overlay with explicit handle rectangles (host coordinates).
    pub fn show_selection_overlay(
        &mut self,
        start_handle: Rect,
        end_handle: Rect,
        is_single_handle: bool,
        trigger: OverlayTrigger,
    ) {
        let option = OverlayShowOption {
            show_menu: !is_single_handle || trigger == OverlayTrigger::LongPress,
            show_start_handle: !is_single_handle,
            show_end_handle: true,
            is_single_handle,
            trigger,
            start_handle,
            end_handle,
        };
        self.present(option);
    }

    /// Shows the overlay for the field's current selection.
    pub fn show_for_selection(
        &mut self,
        is_single_handle: bool,
        show_menu: bool,
        trigger: OverlayTrigger,
    ) {
        let Some(geometry) = self.field.geometry() else {
            self.close();
            return;
        };
        let single = is_single_handle || geometry.selection.is_collapsed();
        self.present(Self::option_from(&geometry, single, show_menu, trigger));
    }

    /// Shows only the context menu, anchored at the caret.
    pub fn show_menu(&mut self) {
        let Some(geometry) = self.field.geometry() else {
            return;
        };
        let mut option = Self::option_from(
            &geometry,
            geometry.selection.is_collapsed(),
            true,
            OverlayTrigger::Mouse,
        );
        option.show_start_handle = false;
        option.show_end_handle = false;
        self.present(option);
    }

    fn present(&mut self, option: OverlayShowOption) {
        self.field.set_overlay_focus(option.holds_focus());
        match (&self.host, self.current.is_some()) {
            (Some(host), true) => host.update(&option),
            (Some(host), false) => host.show(&option),
            (None, _) => trace!("no overlay host, tracking overlay state only"),
        }
        debug!(trigger = ?option.trigger, single = option.is_single_handle, "overlay shown");
        self.current = Some(option);
    }

    /// Replaces the shown option.
    pub fn update_handles(&mut self, option: OverlayShowOption) {
        if self.current.is_none() {
            self.field.set_overlay_focus(false);
            return;
        }
        self.field.set_overlay_focus(option.holds_focus());
        if self.current.as_ref() != Some(&option) {
            if let Some(host) = &self.host {
                host.update(&option);
            }
            self.current = Some(option);
        }
    }

    /// Hides the overlay and releases input focus.
    pub fn close(&mut self) {
        if self.current.take().is_some() {
            if let Some(host) = &self.host {
                host.hide();
            }
            debug!("overlay closed");
        }
        self.field.set_overlay_focus(false);
    }

    /// The host dismissed the overlay on its own, for example on an outside
    /// tap. Forgets the shown option without calling back into the host.
    pub fn on_host_hidden(&mut self) {
        if self.current.take().is_some() {
            debug!("overlay dismissed by host");
        }
        self.field.set_overlay_focus(false);
    }

    /// Re-derives handle positions and visibility after the field's layout.
    pub fn on_host_layout(&mut self) {
        let Some(current) = self.current else {
            return;
        };
        let Some(geometry) = self.field.geometry() else {
            self.close();
            return;
        };
        let single = current.is_single_handle && geometry.selection.is_collapsed();
        let mut option = Self::option_from(&geometry, single, current.show_menu, current.trigger);
        if current.trigger == OverlayTrigger::Mouse {
            option.show_start_handle = false;
            option.show_end_handle = false;
        }
        self.update_handles(option);
    }

    /// Moves one handle to the glyph-aligned `caret` (field coordinates).
    pub fn move_handle(&mut self, kind: HandleKind, caret: CaretRect) {
        let (Some(mut option), Some(geometry)) = (self.current, self.field.geometry()) else {
            return;
        };
        let rect = handle_rect(caret).translate(geometry.frame.origin());
        let visible = caret_visible(geometry.viewport, caret);
        match kind {
            HandleKind::Start => {
                option.start_handle = rect;
                option.show_start_handle = visible;
            }
            HandleKind::End | HandleKind::Single => {
                option.end_handle = rect;
                option.show_end_handle = visible;
            }
        }
        option.trigger = OverlayTrigger::HandleMove;
        option.show_menu = false;
        self.update_handles(option);
    }

    /// Handle under `point` (field coordinates), with the hot zone applied.
    pub fn hit_handle(&self, point: Point) -> Option<HandleKind> {
        let option = self.current.as_ref()?;
        let origin = self.field.geometry()?.frame.origin();
        let point = point + origin;
        let hit = |rect: Rect| rect.inflate(self.hot_zone, self.hot_zone).contains(point);
        if option.is_single_handle {
            return (option.show_end_handle && hit(option.end_handle)).then_some(HandleKind::Single);
        }
        if option.show_end_handle && hit(option.end_handle) {
            Some(HandleKind::End)
        } else if option.show_start_handle && hit(option.start_handle) {
            Some(HandleKind::Start)
        } else {
            None
        }
    }

    /// Forwards a menu command to the field. It runs on the next
    /// `process_pending`; call [`refresh_after_edit`](Self::refresh_after_edit)
    /// afterwards.
    pub fn select_menu(&mut self, action: MenuAction) {
        if !self.field.post(SessionMessage::Menu(action)) {
            self.close();
        }
    }

    /// Closes the overlay if the edit emptied a range selection, otherwise
    /// refreshes it.
    pub fn refresh_after_edit(&mut self) {
        let Some(current) = self.current else {
            return;
        };
        match self.field.geometry() {
            Some(geometry) if geometry.selection.is_collapsed() && !current.is_single_handle => {
                self.close()
            }
            Some(_) => self.on_host_layout(),
            None => self.close(),
        }
    }
}
