//! Stand-ins for the platform pieces a real host provides: an input method
//! that logs and can type, a host that logs frame requests, an overlay that
//! logs what it would draw and a canvas that logs draw calls.

use parking_lot::Mutex;
use tessera_editing::{
    Canvas, Color, EditingValue, InputMethodBridge, OverlayHost, OverlayShowOption, Point, Rect,
    SessionHandle, SessionId, TextSelection,
    services::{HostSurface, InputConfiguration},
};
use tracing::{debug, info, warn};

/// Input method that logs traffic and can simulate remote typing.
#[derive(Default)]
pub struct ScriptedInputMethod {
    handle: Mutex<Option<SessionHandle>>,
}

impl ScriptedInputMethod {
    /// Sends `text` with the caret at its end, as a soft keyboard would.
    pub fn type_text(&self, text: &str) {
        let handle = self.handle.lock().clone();
        match handle {
            Some(handle) => {
                let caret = text.encode_utf16().count();
                handle.update_editing_value(
                    EditingValue::new(text, TextSelection::collapsed(caret)),
                    true,
                );
            }
            None => warn!("no open connection to type into"),
        }
    }
}

impl InputMethodBridge for ScriptedInputMethod {
    fn attach(&self, handle: SessionHandle, config: InputConfiguration) {
        info!(session = %handle.id(), keyboard = ?config.keyboard_type, action = ?config.action, "keyboard shown");
        *self.handle.lock() = Some(handle);
    }

    fn close(&self, session: SessionId) {
        info!(%session, "keyboard hidden");
        *self.handle.lock() = None;
    }

    fn set_editing_state(&self, session: SessionId, value: &EditingValue) {
        debug!(%session, text = value.text(), selection = ?value.selection(), "editing state mirrored");
    }

    fn on_selection_change(&self, session: SessionId, _text: &str, start: usize, end: usize) {
        debug!(%session, start, end, "selection mirrored");
    }
}

/// Host surface that only logs.
#[derive(Default)]
pub struct LoggingHost;

impl HostSurface for LoggingHost {
    fn request_layout(&self) {
        debug!("layout requested");
    }

    fn request_render(&self) {
        debug!("render requested");
    }
}

/// Overlay host that logs what it would show.
#[derive(Default)]
pub struct LoggingOverlay;

impl OverlayHost for LoggingOverlay {
    fn show(&self, option: &OverlayShowOption) {
        info!(
            menu = option.show_menu,
            single = option.is_single_handle,
            trigger = ?option.trigger,
            "overlay shown"
        );
    }

    fn update(&self, option: &OverlayShowOption) {
        debug!(start = option.show_start_handle, end = option.show_end_handle, "overlay moved");
    }

    fn hide(&self) {
        info!("overlay hidden");
    }
}

/// Canvas that logs every draw call.
#[derive(Default)]
pub struct LogCanvas {
    depth: usize,
}

impl Canvas for LogCanvas {
    fn save(&mut self) {
        self.depth += 1;
    }

    fn restore(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn clip_rect(&mut self, rect: Rect) {
        debug!(depth = self.depth, ?rect, "clip");
    }

    fn draw_rect(&mut self, rect: Rect, color: Color) {
        info!(?rect, alpha = color.a, "fill");
    }

    fn draw_line(&mut self, from: Point, to: Point, width: f32, _color: Color) {
        info!(?from, ?to, width, "line");
    }
}
