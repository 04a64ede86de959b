//! A complete text field behind the host's measure/layout/paint protocol.
//!
//! ## Usage
//!
//! ```
//! use std::{sync::Arc, time::Instant};
//! use tessera_editing::{
//!     config::TextFieldConfig,
//!     field::TextField,
//!     geometry::{Constraints, Rect},
//!     gesture::{KeyEvent, Modifiers},
//!     layout::MonospaceEngine,
//!     services::FieldServices,
//! };
//!
//! let mut field = TextField::new(
//!     TextFieldConfig::default(),
//!     FieldServices::default(),
//!     Arc::new(MonospaceEngine::new()),
//!     None,
//! )
//! .unwrap();
//! let size = field.measure(Constraints::loose(240.0, 48.0));
//! field.layout(Rect::new(0.0, 0.0, size.width.max(240.0), size.height));
//! field.focus();
//! field.handle_key(&KeyEvent::character("hi", Modifiers::NONE));
//! assert_eq!(field.session().text(), "hi");
//! ```

use std::{
    sync::{Arc, Weak},
    time::Instant,
};

use tracing::trace;

use crate::{
    capability::FocusTarget,
    config::TextFieldConfig,
    error::EditingError,
    geometry::{Constraints, Point, Rect, Size},
    gesture::{GestureRouter, KeyEvent, PointerEvent, RouterContext},
    layout::ParagraphEngine,
    overlay::{FieldRef, OverlayHost, OverlayPresenter},
    render::{Canvas, PaintInput, RenderModifier, RenderStyle},
    services::{FieldServices, HostSurface},
    session::{FieldCallbacks, InputSessionController},
};

/// A text field: session, gesture router, overlay and render modifier wired
/// together.
pub struct TextField {
    session: InputSessionController,
    router: GestureRouter,
    overlay: OverlayPresenter,
    render: RenderModifier,
    frame: Rect,
    text_rect: Rect,
    icon_rect: Option<Rect>,
}

impl TextField {
    /// Builds a field. `overlay_host` draws handles and the context menu;
    /// without one the overlay state is still tracked.
    pub fn new(
        config: TextFieldConfig,
        services: FieldServices,
        engine: Arc<dyn ParagraphEngine>,
        overlay_host: Option<Arc<dyn OverlayHost>>,
    ) -> Result<Self, EditingError> {
        let timing = config.timing;
        let session = InputSessionController::new(config, services, engine)?;
        let overlay = OverlayPresenter::new(FieldRef::new(&session), overlay_host, timing.handle_hot_zone);
        Ok(Self {
            session,
            router: GestureRouter::new(timing),
            overlay,
            render: RenderModifier::new(RenderStyle::default(), timing.cursor_tween()),
            frame: Rect::ZERO,
            text_rect: Rect::ZERO,
            icon_rect: None,
        })
    }

    /// Sets the owner callbacks.
    pub fn with_callbacks(mut self, callbacks: FieldCallbacks) -> Self {
        self.session.set_callbacks(callbacks);
        self
    }

    /// Sets the decoration style.
    pub fn with_render_style(mut self, style: RenderStyle) -> Self {
        self.render.set_style(style);
        self
    }

    /// The editing session.
    pub fn session(&self) -> &InputSessionController {
        &self.session
    }

    /// The editing session, mutably.
    pub fn session_mut(&mut self) -> &mut InputSessionController {
        &mut self.session
    }

    /// The overlay presenter.
    pub fn overlay(&self) -> &OverlayPresenter {
        &self.overlay
    }

    /// The gesture router.
    pub fn router(&self) -> &GestureRouter {
        &self.router
    }

    /// Replaces the configuration.
    pub fn set_config(&mut self, config: TextFieldConfig) -> Result<(), EditingError> {
        let timing = config.timing;
        self.session.set_config(config)?;
        self.router.set_timing(timing);
        Ok(())
    }

    /// Links the field to its host surface.
    pub fn on_attach(&mut self, host: Weak<dyn HostSurface>) -> Result<(), EditingError> {
        self.session.on_attach(host)
    }

    /// Unlinks the field: hides the overlay, drops in-flight gestures and
    /// closes the keyboard.
    pub fn on_detach(&mut self) {
        self.overlay.close();
        self.router.reset();
        self.session.on_detach();
    }

    /// Gives the field focus as if focus moved to it programmatically.
    pub fn focus(&mut self) {
        self.session.on_focus_gained();
    }

    /// Removes focus and hides the overlay.
    pub fn blur(&mut self) {
        self.overlay.close();
        self.router.reset();
        self.session.on_focus_lost();
    }

    fn icon_reservation(&self) -> f32 {
        let config = self.session.config();
        if config.reserves_icon() {
            config.icon_size + config.padding
        } else {
            0.0
        }
    }

    /// Measures the text plus padding and the trailing icon reservation.
    pub fn measure(&mut self, constraints: Constraints) -> Size {
        let padding = self.session.config().padding;
        let icon = if self.session.config().reserves_icon() {
            self.session.config().icon_size
        } else {
            0.0
        };
        let reserved = self.icon_reservation();
        let inner = Constraints::loose(
            (constraints.max_width - padding * 2.0).max(0.0),
            (constraints.max_height - padding * 2.0).max(0.0),
        );
        let text = self.session.measure(inner, reserved);
        let size = constraints.constrain(Size::new(
            text.width + padding * 2.0,
            text.height.max(icon) + padding * 2.0,
        ));
        trace!(width = size.width, height = size.height, "measured text field");
        size
    }

    /// Places the text and the trailing icon inside `final_rect` (host
    /// coordinates), keeps the caret visible and refreshes the overlay.
    pub fn layout(&mut self, final_rect: Rect) {
        let config = self.session.config();
        let padding = config.padding;
        let icon_size = config.icon_size;
        let multiline = config.is_multiline();
        let reserves_icon = config.reserves_icon();
        let reserved = self.icon_reservation();

        let (width, height) = (final_rect.width, final_rect.height);
        let inner_height = (height - padding * 2.0).max(0.0);
        let text_width = (width - padding * 2.0 - reserved).max(0.0);
        self.text_rect = if multiline {
            Rect::new(padding, padding, text_width, inner_height)
        } else {
            let text_height = self.session.mapper().line_height().min(inner_height);
            Rect::new(padding, (height - text_height) / 2.0, text_width, text_height)
        };
        self.icon_rect = reserves_icon.then(|| {
            Rect::new(
                width - padding - icon_size,
                (height - icon_size) / 2.0,
                icon_size,
                icon_size,
            )
        });
        self.frame = final_rect;
        self.session.layout_text(self.text_rect, final_rect);
        self.overlay.on_host_layout();
    }

    /// Text viewport from the last layout, in field coordinates.
    pub fn text_rect(&self) -> Rect {
        self.text_rect
    }

    /// Trailing icon bounds from the last layout, in field coordinates.
    pub fn icon_rect(&self) -> Option<Rect> {
        self.icon_rect
    }

    /// Bounds from the last layout, in host coordinates.
    pub fn frame(&self) -> Rect {
        self.frame
    }

    fn context(&mut self) -> (&mut GestureRouter, RouterContext<'_>) {
        (
            &mut self.router,
            RouterContext {
                session: &mut self.session,
                overlay: &mut self.overlay,
                trailing_icon: self.icon_rect,
            },
        )
    }

    /// Routes a pointer event in field coordinates.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> bool {
        let (router, mut ctx) = self.context();
        router.handle_pointer(&mut ctx, event)
    }

    /// Routes a key press.
    pub fn handle_key(&mut self, event: &KeyEvent) -> bool {
        let (router, mut ctx) = self.context();
        router.handle_key(&mut ctx, event)
    }

    /// Resolves pending taps and long presses.
    pub fn poll(&mut self, now: Instant) -> bool {
        let (router, mut ctx) = self.context();
        router.poll(&mut ctx, now)
    }

    /// Earliest time [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.router.next_deadline()
    }

    /// Applies queued input method, clipboard and menu traffic, then closes
    /// or refreshes the overlay.
    pub fn process_pending(&mut self) -> usize {
        let applied = self.session.process_pending();
        if applied > 0 {
            self.overlay.refresh_after_edit();
        }
        applied
    }

    /// Whether the caret is still sliding and more frames are needed.
    pub fn is_animating(&self, now: Instant) -> bool {
        self.render.is_animating(now)
    }

    /// Paints selection, caret and decorations in field coordinates.
    pub fn paint(&mut self, canvas: &mut dyn Canvas, now: Instant) {
        let mapper = self.session.mapper();
        let (scroll, max_scroll) = (mapper.scroll(), mapper.max_scroll());
        let input = PaintInput {
            cursor_visible: self.session.cursor_visible(),
            cursor: self.session.caret_rect(),
            selection_mode: self.session.selection_mode(),
            selection: self.session.selection_boxes(),
            content: self.text_rect,
            frame: Rect::from_origin_size(Point::ZERO, self.frame.size()),
            scroll,
            max_scroll,
            focused: self.session.phase().is_focused(),
        };
        self.render.paint(canvas, &input, now);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::{KeyboardType, TrailingIcon},
        gesture::{Modifiers, NamedKey, PointerPhase},
        layout::MonospaceEngine,
        overlay::MenuAction,
        testing::{
            ManualExecutor, MemoryClipboard, RecordingCanvas, RecordingHost, RecordingInputMethod,
            RecordingOverlayHost,
        },
        value::{EditingValue, TextSelection},
    };

    struct Harness {
        field: TextField,
        bridge: Arc<RecordingInputMethod>,
        clipboard: Arc<MemoryClipboard>,
        overlay_host: Arc<RecordingOverlayHost>,
        host: Arc<RecordingHost>,
    }

    fn harness(config: TextFieldConfig) -> Harness {
        let bridge = Arc::new(RecordingInputMethod::default());
        let clipboard = Arc::new(MemoryClipboard::default());
        let overlay_host = Arc::new(RecordingOverlayHost::default());
        let host = Arc::new(RecordingHost::default());
        let services = FieldServices::default()
            .with_input_method(bridge.clone())
            .with_clipboard(clipboard.clone())
            .with_executor(Arc::new(ManualExecutor::default()));
        let mut field = TextField::new(
            config,
            services,
            Arc::new(MonospaceEngine::with_advance(10.0)),
            Some(overlay_host.clone()),
        )
        .unwrap();
        let host_dyn: Arc<dyn HostSurface> = host.clone();
        field.on_attach(Arc::downgrade(&host_dyn)).unwrap();
        Harness {
            field,
            bridge,
            clipboard,
            overlay_host,
            host,
        }
    }

    fn lay_out(field: &mut TextField) {
        let size = field.measure(Constraints::loose(300.0, 60.0));
        field.layout(Rect::new(0.0, 100.0, 300.0, size.height.max(40.0)));
    }

    #[test]
    fn test_measure_reserves_icon_and_padding() {
        let mut h = harness(TextFieldConfig::default().trailing_icon(TrailingIcon::Clear));
        h.field.session_mut().set_text("abcde");
        let size = h.field.measure(Constraints::loose(300.0, 60.0));
        // 50 text + 32 icon reservation + 16 padding
        assert_eq!(size.width, 98.0);
        assert_eq!(size.height, 24.0 + 16.0);

        let mut plain = harness(TextFieldConfig::default());
        plain.field.session_mut().set_text("abcde");
        let size = plain.field.measure(Constraints::loose(300.0, 60.0));
        assert_eq!(size.width, 66.0);
    }

    #[test]
    fn test_layout_places_text_left_and_icon_right() {
        let mut h = harness(TextFieldConfig::default().trailing_icon(TrailingIcon::Search));
        h.field.measure(Constraints::loose(300.0, 60.0));
        h.field.layout(Rect::new(0.0, 0.0, 300.0, 40.0));
        let text = h.field.text_rect();
        assert_eq!(text.x, 8.0);
        assert_eq!(text.width, 300.0 - 16.0 - 32.0);
        assert!((text.center().y - 20.0).abs() < 0.01);
        let icon = h.field.icon_rect().unwrap();
        assert_eq!(icon, Rect::new(300.0 - 8.0 - 24.0, 8.0, 24.0, 24.0));
    }

    #[test]
    fn test_tap_then_type_through_the_field() {
        let mut h = harness(TextFieldConfig::default());
        h.field.session_mut().set_text("hello");
        lay_out(&mut h.field);
        let start = Instant::now();
        h.field
            .handle_pointer(&PointerEvent::touch(PointerPhase::Down, Point::new(28.0, 20.0), start));
        h.field.handle_pointer(&PointerEvent::touch(
            PointerPhase::Up,
            Point::new(28.0, 20.0),
            start + Duration::from_millis(40),
        ));
        assert!(h.field.next_deadline().is_some());
        assert!(h.field.poll(start + Duration::from_millis(600)));
        assert_eq!(h.field.session().selection(), TextSelection::collapsed(2));
        assert_eq!(h.bridge.attach_count(), 1);
        assert!(h.overlay_host.last().unwrap().is_single_handle);

        h.field
            .handle_key(&KeyEvent::character("y", Modifiers::NONE));
        assert_eq!(h.field.session().text(), "heyllo");
        assert!(!h.field.overlay().is_shown());
        assert!(h.host.layout_requests() > 0);
    }

    #[test]
    fn test_menu_paste_runs_on_process_pending() {
        let mut h = harness(TextFieldConfig::default());
        h.clipboard.set_contents(" world");
        h.field.session_mut().set_text("hello");
        lay_out(&mut h.field);
        h.field.focus();
        h.field.session_mut().select_all();
        h.field.overlay.show_for_selection(false, true, crate::overlay::OverlayTrigger::DoubleTap);

        h.field.overlay.select_menu(MenuAction::Copy);
        assert_eq!(h.field.process_pending(), 1);
        assert_eq!(h.clipboard.contents().as_deref(), Some("hello"));
        assert!(!h.field.overlay().is_shown());

        h.field.handle_key(&KeyEvent::character("v", Modifiers::PRIMARY));
        assert_eq!(h.field.process_pending(), 1);
        assert_eq!(h.field.session().text(), "hellohello");
    }

    #[test]
    fn test_remote_edit_flows_through_the_inbox() {
        let mut h = harness(TextFieldConfig::default().keyboard_type(KeyboardType::Number));
        lay_out(&mut h.field);
        h.field.focus();
        let handle = h.bridge.last_handle().unwrap();
        handle.update_editing_value(EditingValue::new("4x2", TextSelection::collapsed(3)), true);
        assert_eq!(h.field.session().text(), "");
        assert_eq!(h.field.process_pending(), 1);
        assert_eq!(h.field.session().text(), "42");
    }

    #[test]
    fn test_paint_draws_cursor_inside_text_rect() {
        let mut h = harness(TextFieldConfig::default());
        h.field.session_mut().set_text("abc");
        lay_out(&mut h.field);
        h.field.focus();
        let mut canvas = RecordingCanvas::default();
        h.field.paint(&mut canvas, Instant::now());
        let cursor_color = RenderStyle::default().cursor_color;
        let (cursor, _) = canvas
            .rects()
            .into_iter()
            .find(|(_, color)| *color == cursor_color)
            .unwrap();
        assert!((cursor.center().x - 38.0).abs() < 0.01);
        assert!(h.field.text_rect().inflate(5.0, 0.0).contains_rect(&cursor));
    }

    #[test]
    fn test_detach_closes_everything() {
        let mut h = harness(TextFieldConfig::default());
        h.field.session_mut().set_text("abc def");
        lay_out(&mut h.field);
        h.field.focus();
        h.field.session_mut().update_selection(0, 3);
        h.field.overlay.show_for_selection(false, true, crate::overlay::OverlayTrigger::DoubleTap);

        h.field.on_detach();
        assert!(!h.field.overlay().is_shown());
        assert!(!h.field.session().phase().is_focused());
        assert_eq!(h.bridge.close_count(), 1);
        assert!(!h.field.session().is_attached());
    }

    #[test]
    fn test_escape_through_field() {
        let mut h = harness(TextFieldConfig::default());
        h.field.session_mut().set_text("abc");
        lay_out(&mut h.field);
        h.field.focus();
        h.field.session_mut().update_selection(0, 3);
        h.field
            .handle_key(&KeyEvent::named(NamedKey::Escape, Modifiers::NONE));
        assert_eq!(h.field.session().selection(), TextSelection::collapsed(3));
    }
}
