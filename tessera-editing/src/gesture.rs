//! Pointer and key routing for a text field.
//!
//! ## Usage
//!
//! The host feeds raw [`PointerEvent`]s and [`KeyEvent`]s into a
//! [`GestureRouter`] together with a [`RouterContext`] that borrows the
//! field's session and overlay presenter. Touch taps are only committed once
//! the double-tap window has passed, so the host must call
//! [`GestureRouter::poll`] every frame (or at
//! [`next_deadline`](GestureRouter::next_deadline)) to resolve pending taps
//! and long presses.

use std::time::Instant;

use tracing::{debug, trace};

use crate::{
    capability::{Draggable, Scrollable},
    config::{InteractionTiming, TextFieldConfig, TextInputAction, TrailingIcon},
    geometry::{Point, Rect},
    overlay::{HandleKind, OverlayPresenter, OverlayTrigger},
    session::{FocusReason, InputSessionController},
    value::{byte_index, grapheme_cluster_length, range_of_same_type, utf16_len},
};

/// Source of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// A finger or stylus.
    Touch,
    /// A mouse or trackpad.
    Mouse,
}

/// Pointer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    /// Left button, or any touch.
    #[default]
    Primary,
    /// Right button.
    Secondary,
}

/// Stage of a pointer interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    /// Pressed.
    Down,
    /// Moved.
    Move,
    /// Released.
    Up,
    /// Interrupted by the system.
    Cancel,
}

/// A pointer event in field coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Stage.
    pub phase: PointerPhase,
    /// Position relative to the field's top-left corner.
    pub position: Point,
    /// Source.
    pub kind: PointerKind,
    /// Button.
    pub button: PointerButton,
    /// When the event happened.
    pub time: Instant,
}

impl PointerEvent {
    /// A touch event.
    pub fn touch(phase: PointerPhase, position: Point, time: Instant) -> Self {
        Self {
            phase,
            position,
            kind: PointerKind::Touch,
            button: PointerButton::Primary,
            time,
        }
    }

    /// A mouse event.
    pub fn mouse(phase: PointerPhase, position: Point, button: PointerButton, time: Instant) -> Self {
        Self {
            phase,
            position,
            kind: PointerKind::Mouse,
            button,
            time,
        }
    }
}

/// Non-character keys the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    /// Left arrow.
    ArrowLeft,
    /// Right arrow.
    ArrowRight,
    /// Up arrow.
    ArrowUp,
    /// Down arrow.
    ArrowDown,
    /// Home.
    Home,
    /// End.
    End,
    /// Backspace.
    Backspace,
    /// Forward delete.
    Delete,
    /// Enter or return.
    Enter,
    /// Escape.
    Escape,
    /// Tab.
    Tab,
}

/// A logical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// A named key.
    Named(NamedKey),
    /// Text produced by the key.
    Character(String),
}

/// Modifier keys held during a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Shift.
    pub shift: bool,
    /// Control.
    pub ctrl: bool,
    /// Alt or option.
    pub alt: bool,
    /// Command, super or windows.
    pub meta: bool,
}

impl Modifiers {
    /// No modifiers.
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Shift only.
    pub const SHIFT: Self = Self {
        shift: true,
        ..Self::NONE
    };

    /// The platform's primary shortcut modifier alone.
    #[cfg(target_os = "macos")]
    pub const PRIMARY: Self = Self {
        meta: true,
        ..Self::NONE
    };

    /// The platform's primary shortcut modifier alone.
    #[cfg(not(target_os = "macos"))]
    pub const PRIMARY: Self = Self {
        ctrl: true,
        ..Self::NONE
    };

    /// Whether the primary shortcut modifier (command on macOS, control
    /// elsewhere) is held.
    pub fn primary(&self) -> bool {
        if cfg!(target_os = "macos") {
            self.meta
        } else {
            self.ctrl
        }
    }

    /// Adds shift.
    pub fn with_shift(self) -> Self {
        Self {
            shift: true,
            ..self
        }
    }
}

/// A key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key.
    pub key: Key,
    /// Held modifiers.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// A named key press.
    pub fn named(key: NamedKey, modifiers: Modifiers) -> Self {
        Self {
            key: Key::Named(key),
            modifiers,
        }
    }

    /// A character key press.
    pub fn character(text: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: Key::Character(text.into()),
            modifiers,
        }
    }
}

/// Mouse button state as seen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseStatus {
    /// No interaction yet.
    #[default]
    None,
    /// Primary button held.
    Pressed,
    /// Dragging with the primary button held.
    Move,
    /// Button released.
    Released,
}

/// What tapping the trailing icon does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconAction {
    /// Clear the text.
    Clear,
    /// Perform the search action.
    Search,
    /// Flip password obscuring.
    TogglePassword,
}

impl IconAction {
    /// Action of the icon `config` reserves, if any.
    pub fn for_config(config: &TextFieldConfig) -> Option<Self> {
        match config.trailing_icon {
            Some(TrailingIcon::Clear) => Some(Self::Clear),
            Some(TrailingIcon::Search) => Some(Self::Search),
            None if config.reserves_icon() => Some(Self::TogglePassword),
            None => None,
        }
    }
}

/// Borrowed pieces of the field the router drives.
pub struct RouterContext<'a> {
    /// The field's session.
    pub session: &'a mut InputSessionController,
    /// The field's overlay.
    pub overlay: &'a mut OverlayPresenter,
    /// Trailing icon bounds in field coordinates.
    pub trailing_icon: Option<Rect>,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    origin: Point,
    last: Point,
    time: Instant,
    moved: bool,
    long_fired: bool,
    consumed: bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingTap {
    position: Point,
    time: Instant,
}

#[derive(Debug, Clone, Copy)]
struct HandleDrag {
    kind: HandleKind,
    anchor: usize,
    grab: Point,
}

/// Turns raw pointer and key input into editing operations.
#[derive(Debug)]
pub struct GestureRouter {
    timing: InteractionTiming,
    mouse_status: MouseStatus,
    press: Option<Press>,
    pending_tap: Option<PendingTap>,
    last_click: Option<PendingTap>,
    handle_drag: Option<HandleDrag>,
}

impl GestureRouter {
    /// Creates an idle router.
    pub fn new(timing: InteractionTiming) -> Self {
        Self {
            timing,
            mouse_status: MouseStatus::None,
            press: None,
            pending_tap: None,
            last_click: None,
            handle_drag: None,
        }
    }

    /// Replaces the timings.
    pub fn set_timing(&mut self, timing: InteractionTiming) {
        self.timing = timing;
    }

    /// Mouse button state.
    pub fn mouse_status(&self) -> MouseStatus {
        self.mouse_status
    }

    /// Whether a selection handle is being dragged.
    pub fn is_dragging_handle(&self) -> bool {
        self.handle_drag.is_some()
    }

    /// Earliest time [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let tap = self
            .pending_tap
            .map(|tap| tap.time + self.timing.double_click());
        let long_press = self
            .press
            .filter(|press| !press.moved && !press.long_fired && !press.consumed)
            .map(|press| press.time + self.timing.long_press());
        match (tap, long_press) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Forgets in-flight gestures.
    pub fn reset(&mut self) {
        self.press = None;
        self.pending_tap = None;
        self.last_click = None;
        self.handle_drag = None;
        self.mouse_status = MouseStatus::None;
    }

    /// Routes a pointer event. Returns whether it was consumed.
    pub fn handle_pointer(&mut self, ctx: &mut RouterContext<'_>, event: &PointerEvent) -> bool {
        if !ctx.session.config().enabled {
            self.reset();
            return false;
        }
        match event.kind {
            PointerKind::Touch => self.handle_touch(ctx, event),
            PointerKind::Mouse => self.handle_mouse(ctx, event),
        }
    }

    /// Resolves gestures that depend on elapsed time: commits a single tap
    /// once the double-tap window has passed and fires a long press once the
    /// hold threshold is reached. Returns whether anything happened.
    pub fn poll(&mut self, ctx: &mut RouterContext<'_>, now: Instant) -> bool {
        if !ctx.session.config().enabled {
            self.reset();
            return false;
        }
        let mut acted = false;
        if let Some(press) = self.press.as_mut() {
            let held = now.saturating_duration_since(press.time);
            if !press.moved && !press.long_fired && !press.consumed && held >= self.timing.long_press() {
                press.long_fired = true;
                let origin = press.origin;
                self.pending_tap = None;
                self.long_press(ctx, origin);
                acted = true;
            }
        }
        if let Some(tap) = self.pending_tap
            && now.saturating_duration_since(tap.time) >= self.timing.double_click()
        {
            self.pending_tap = None;
            self.tap(ctx, tap.position, PointerKind::Touch);
            acted = true;
        }
        acted
    }

    fn within_slop(&self, a: Point, b: Point) -> bool {
        a.manhattan_distance(b) <= self.timing.click_slop
    }

    fn is_double(&self, previous: Option<PendingTap>, position: Point, time: Instant) -> bool {
        previous.is_some_and(|previous| {
            time.saturating_duration_since(previous.time) <= self.timing.double_click()
                && self.within_slop(previous.position, position)
        })
    }

    fn handle_touch(&mut self, ctx: &mut RouterContext<'_>, event: &PointerEvent) -> bool {
        match event.phase {
            PointerPhase::Down => {
                if let Some(kind) = ctx.overlay.hit_handle(event.position) {
                    self.begin_handle_drag(ctx, kind, event.position);
                    return true;
                }
                let consumed = self.is_double(self.pending_tap, event.position, event.time);
                if let Some(previous) = self.pending_tap.take() {
                    if consumed {
                        self.double_tap(ctx, event.position);
                    } else {
                        self.tap(ctx, previous.position, PointerKind::Touch);
                    }
                }
                self.press = Some(Press {
                    origin: event.position,
                    last: event.position,
                    time: event.time,
                    moved: false,
                    long_fired: false,
                    consumed,
                });
                true
            }
            PointerPhase::Move => {
                if self.handle_drag.is_some() {
                    self.update_handle_drag(ctx, event.position);
                    return true;
                }
                let Some(press) = self.press.as_mut() else {
                    return false;
                };
                if !press.moved && press.origin.manhattan_distance(event.position) > self.timing.click_slop {
                    press.moved = true;
                    trace!("press moved past click slop");
                }
                if press.moved {
                    let delta = press.last - event.position;
                    press.last = event.position;
                    let applied = ctx.session.scroll_by(delta);
                    if applied != Point::ZERO {
                        ctx.overlay.on_host_layout();
                    }
                }
                true
            }
            PointerPhase::Up => {
                if let Some(drag) = self.handle_drag.take() {
                    self.end_handle_drag(ctx, drag);
                    return true;
                }
                let Some(press) = self.press.take() else {
                    return false;
                };
                if press.moved || press.long_fired || press.consumed {
                    return true;
                }
                if let Some(action) = self.icon_hit(ctx, event.position) {
                    self.pending_tap = None;
                    Self::perform_icon(ctx, action);
                    return true;
                }
                self.pending_tap = Some(PendingTap {
                    position: press.origin,
                    time: event.time,
                });
                true
            }
            PointerPhase::Cancel => {
                self.press = None;
                self.pending_tap = None;
                if self.handle_drag.take().is_some() {
                    ctx.overlay.on_host_layout();
                }
                true
            }
        }
    }

    fn handle_mouse(&mut self, ctx: &mut RouterContext<'_>, event: &PointerEvent) -> bool {
        match (event.phase, event.button) {
            (PointerPhase::Down, PointerButton::Secondary) => {
                ctx.session.request_keyboard(FocusReason::Pointer, false);
                ctx.overlay.show_menu();
                true
            }
            (PointerPhase::Down, PointerButton::Primary) => {
                self.mouse_status = MouseStatus::Pressed;
                if self.is_double(self.last_click, event.position, event.time) {
                    self.last_click = None;
                    self.double_tap(ctx, event.position);
                    return true;
                }
                self.last_click = Some(PendingTap {
                    position: event.position,
                    time: event.time,
                });
                if let Some(action) = self.icon_hit(ctx, event.position) {
                    Self::perform_icon(ctx, action);
                    return true;
                }
                if !ctx.session.request_keyboard(FocusReason::Pointer, true) {
                    return false;
                }
                ctx.overlay.close();
                ctx.session.drag_start(event.position);
                true
            }
            (PointerPhase::Move, _) => {
                if !ctx.session.is_dragging() {
                    return false;
                }
                self.mouse_status = MouseStatus::Move;
                ctx.session.drag_update(event.position);
                true
            }
            (PointerPhase::Up, _) | (PointerPhase::Cancel, _) => {
                if self.mouse_status == MouseStatus::None {
                    return false;
                }
                self.mouse_status = MouseStatus::Released;
                if ctx.session.is_dragging() {
                    ctx.session.drag_end();
                }
                true
            }
        }
    }

    fn icon_hit(&self, ctx: &RouterContext<'_>, position: Point) -> Option<IconAction> {
        let rect = ctx.trailing_icon?;
        if !rect.contains(position) {
            return None;
        }
        IconAction::for_config(ctx.session.config())
    }

    fn perform_icon(ctx: &mut RouterContext<'_>, action: IconAction) {
        debug!(?action, "trailing icon tapped");
        match action {
            IconAction::Clear => {
                ctx.overlay.close();
                ctx.session.set_text("");
            }
            IconAction::Search => ctx.session.perform_action(TextInputAction::Search, false),
            IconAction::TogglePassword => ctx.session.toggle_obscure(),
        }
    }

    fn tap(&mut self, ctx: &mut RouterContext<'_>, position: Point, kind: PointerKind) {
        if !ctx.session.request_keyboard(FocusReason::Pointer, true) {
            return;
        }
        let offset = ctx.session.hit_test(position);
        ctx.session.update_selection(offset, offset);
        match kind {
            PointerKind::Touch => ctx
                .overlay
                .show_for_selection(true, false, OverlayTrigger::Tap),
            PointerKind::Mouse => ctx.overlay.close(),
        }
    }

    fn double_tap(&mut self, ctx: &mut RouterContext<'_>, position: Point) {
        if !ctx.session.request_keyboard(FocusReason::Pointer, false) {
            return;
        }
        let hit = ctx.session.hit_test(position);
        let text = ctx.session.text();
        let word = range_of_same_type(text, word_lookup_offset(text, hit));
        ctx.session.update_selection(word.start(), word.end());
        ctx.overlay
            .show_for_selection(false, true, OverlayTrigger::DoubleTap);
    }

    fn long_press(&mut self, ctx: &mut RouterContext<'_>, position: Point) {
        if !ctx.session.request_keyboard(FocusReason::Pointer, false) {
            return;
        }
        let hit = ctx.session.hit_test(position);
        let len = ctx.session.value().len();
        let single = hit >= len
            || ctx.session.config().keyboard_type.is_password()
            || ctx.session.is_obscured();
        if single {
            ctx.session.update_selection(hit, hit);
        } else {
            let word = range_of_same_type(ctx.session.text(), hit);
            ctx.session.update_selection(word.start(), word.end());
        }
        ctx.overlay
            .show_for_selection(single, true, OverlayTrigger::LongPress);
    }

    fn begin_handle_drag(&mut self, ctx: &mut RouterContext<'_>, kind: HandleKind, position: Point) {
        let geometry = ctx.session.geometry();
        let selection = geometry.selection;
        let (anchor, caret) = match kind {
            HandleKind::Start => (selection.end(), geometry.start_caret),
            HandleKind::End | HandleKind::Single => (selection.start(), geometry.end_caret),
        };
        let grab = Point::new(caret.x, caret.y + caret.height / 2.0) - position;
        debug!(?kind, anchor, "handle drag started");
        self.pending_tap = None;
        self.press = None;
        self.handle_drag = Some(HandleDrag { kind, anchor, grab });
    }

    fn update_handle_drag(&mut self, ctx: &mut RouterContext<'_>, position: Point) {
        let Some(drag) = self.handle_drag else {
            return;
        };
        let offset = ctx.session.hit_test(position + drag.grab);
        match drag.kind {
            HandleKind::Single => ctx.session.update_selection(offset, offset),
            HandleKind::End => ctx.session.update_selection(drag.anchor, offset),
            HandleKind::Start => ctx.session.update_selection(offset, drag.anchor),
        }
        let caret = ctx.session.caret_rect_at(offset);
        ctx.overlay.move_handle(drag.kind, caret);
    }

    fn end_handle_drag(&mut self, ctx: &mut RouterContext<'_>, drag: HandleDrag) {
        debug!(kind = ?drag.kind, "handle drag ended");
        match drag.kind {
            HandleKind::Single => ctx
                .overlay
                .show_for_selection(true, false, OverlayTrigger::HandleMove),
            HandleKind::Start | HandleKind::End => ctx
                .overlay
                .show_for_selection(false, true, OverlayTrigger::HandleMove),
        }
    }

    /// Routes a key press. Returns whether it was consumed.
    pub fn handle_key(&mut self, ctx: &mut RouterContext<'_>, event: &KeyEvent) -> bool {
        if !ctx.session.config().enabled || !ctx.session.phase().is_focused() {
            return false;
        }
        let modifiers = event.modifiers;
        match &event.key {
            Key::Character(text) if modifiers.primary() => {
                Self::handle_shortcut(ctx, text, modifiers)
            }
            Key::Character(text) => {
                if modifiers.ctrl || modifiers.meta || text.is_empty() || text.chars().any(char::is_control) {
                    return false;
                }
                ctx.overlay.close();
                ctx.session.insert(text);
                true
            }
            Key::Named(key) => Self::handle_named(ctx, *key, modifiers),
        }
    }

    fn handle_shortcut(ctx: &mut RouterContext<'_>, text: &str, modifiers: Modifiers) -> bool {
        match text.to_lowercase().as_str() {
            "a" => {
                ctx.session.select_all();
                ctx.overlay.on_host_layout();
                return true;
            }
            "c" => {
                ctx.session.copy();
            }
            "v" => ctx.session.paste(),
            "x" => {
                ctx.session.cut();
            }
            "z" if modifiers.shift => ctx.session.redo(),
            "z" => ctx.session.undo(),
            "y" => ctx.session.redo(),
            _ => return false,
        }
        ctx.overlay.close();
        true
    }

    fn handle_named(ctx: &mut RouterContext<'_>, key: NamedKey, modifiers: Modifiers) -> bool {
        let selection = ctx.session.selection();
        let len = ctx.session.value().len();
        let before = grapheme_cluster_length(ctx.session.text(), selection.extent, true);
        let after = grapheme_cluster_length(ctx.session.text(), selection.extent, false);
        let shift = modifiers.shift;
        let target = match key {
            NamedKey::ArrowLeft if !shift && !selection.is_collapsed() => selection.start(),
            NamedKey::ArrowRight if !shift && !selection.is_collapsed() => selection.end(),
            NamedKey::ArrowLeft => selection.extent.saturating_sub(before),
            NamedKey::ArrowRight => (selection.extent + after).min(len),
            NamedKey::ArrowUp | NamedKey::ArrowDown | NamedKey::Home | NamedKey::End => {
                Self::vertical_target(ctx, key)
            }
            NamedKey::Backspace => {
                ctx.overlay.close();
                ctx.session.delete_backward();
                return true;
            }
            NamedKey::Delete => {
                ctx.overlay.close();
                ctx.session.delete_forward();
                return true;
            }
            NamedKey::Enter => {
                ctx.overlay.close();
                if ctx.session.config().is_multiline() {
                    ctx.session.insert("\n");
                } else {
                    let action = ctx.session.config().action;
                    ctx.session.perform_action(action, false);
                }
                return true;
            }
            NamedKey::Escape => {
                ctx.overlay.close();
                ctx.session
                    .update_selection(selection.extent, selection.extent);
                return true;
            }
            NamedKey::Tab => return false,
        };
        ctx.overlay.close();
        if shift {
            ctx.session.update_selection(selection.base, target);
        } else {
            ctx.session.update_selection(target, target);
        }
        true
    }

    fn vertical_target(ctx: &mut RouterContext<'_>, key: NamedKey) -> usize {
        let len = ctx.session.value().len();
        if !ctx.session.config().is_multiline() {
            return match key {
                NamedKey::ArrowUp | NamedKey::Home => 0,
                _ => len,
            };
        }
        let caret = ctx.session.caret_rect();
        let mapper = ctx.session.mapper();
        let line_height = mapper.line_height();
        let text_left = mapper.viewport().x - mapper.scroll().x;
        let middle = caret.y + caret.height / 2.0;
        let probe = match key {
            NamedKey::ArrowUp => Point::new(caret.x, middle - line_height),
            NamedKey::ArrowDown => Point::new(caret.x, middle + line_height),
            NamedKey::Home => Point::new(text_left, middle),
            _ => Point::new(
                text_left + mapper.content_size().width + mapper.viewport().width,
                middle,
            ),
        };
        if probe.y < mapper.viewport().y - mapper.scroll().y {
            return 0;
        }
        if probe.y > mapper.viewport().y - mapper.scroll().y + mapper.content_size().height {
            return len;
        }
        ctx.session.hit_test(probe)
    }
}

impl Default for GestureRouter {
    fn default() -> Self {
        Self::new(InteractionTiming::default())
    }
}

/// Offset whose word a double tap at `hit` selects.
///
/// The character before the caret wins, except at a boundary where it is
/// whitespace and a different run starts at `hit`.
fn word_lookup_offset(text: &str, hit: usize) -> usize {
    let previous = hit.saturating_sub(1);
    if hit == 0 || hit >= utf16_len(text) {
        return previous;
    }
    if range_of_same_type(text, previous).end() != hit {
        return previous;
    }
    let after_space = text[byte_index(text, previous)..]
        .chars()
        .next()
        .is_some_and(char::is_whitespace);
    if after_space { hit } else { previous }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicI32, Ordering},
        },
        time::Duration,
    };

    use super::*;
    use crate::{
        config::KeyboardType,
        geometry::Constraints,
        layout::MonospaceEngine,
        overlay::FieldRef,
        services::FieldServices,
        session::{FieldCallbacks, SelectionMode},
        testing::{ManualExecutor, MemoryClipboard, RecordingInputMethod, RecordingOverlayHost},
        value::TextSelection,
    };

    struct Fixture {
        session: InputSessionController,
        overlay: OverlayPresenter,
        overlay_host: Arc<RecordingOverlayHost>,
        router: GestureRouter,
        icon: Option<Rect>,
        start: Instant,
    }

    impl Fixture {
        fn new(config: TextFieldConfig, text: &str) -> Self {
            let services = FieldServices::default()
                .with_input_method(Arc::new(RecordingInputMethod::default()))
                .with_clipboard(Arc::new(MemoryClipboard::default()))
                .with_executor(Arc::new(ManualExecutor::default()));
            let mut session = InputSessionController::new(
                config,
                services,
                Arc::new(MonospaceEngine::with_advance(10.0)),
            )
            .unwrap();
            session.set_text(text);
            session.measure(Constraints::loose(200.0, 100.0), 0.0);
            session.layout_text(
                Rect::new(0.0, 0.0, 200.0, 20.0),
                Rect::new(0.0, 0.0, 200.0, 20.0),
            );
            let overlay_host = Arc::new(RecordingOverlayHost::default());
            let overlay =
                OverlayPresenter::new(FieldRef::new(&session), Some(overlay_host.clone()), 10.0);
            Self {
                session,
                overlay,
                overlay_host,
                router: GestureRouter::default(),
                icon: None,
                start: Instant::now(),
            }
        }

        fn at(&self, ms: u64) -> Instant {
            self.start + Duration::from_millis(ms)
        }

        fn pointer(&mut self, event: PointerEvent) -> bool {
            let mut ctx = RouterContext {
                session: &mut self.session,
                overlay: &mut self.overlay,
                trailing_icon: self.icon,
            };
            self.router.handle_pointer(&mut ctx, &event)
        }

        fn touch(&mut self, phase: PointerPhase, x: f32, y: f32, ms: u64) -> bool {
            let event = PointerEvent::touch(phase, Point::new(x, y), self.at(ms));
            self.pointer(event)
        }

        fn mouse(&mut self, phase: PointerPhase, button: PointerButton, x: f32, ms: u64) -> bool {
            let event = PointerEvent::mouse(phase, Point::new(x, 8.0), button, self.at(ms));
            self.pointer(event)
        }

        fn tap(&mut self, x: f32, ms: u64) {
            self.touch(PointerPhase::Down, x, 8.0, ms);
            self.touch(PointerPhase::Up, x, 8.0, ms + 50);
        }

        fn poll(&mut self, ms: u64) -> bool {
            let now = self.at(ms);
            let mut ctx = RouterContext {
                session: &mut self.session,
                overlay: &mut self.overlay,
                trailing_icon: self.icon,
            };
            self.router.poll(&mut ctx, now)
        }

        fn key(&mut self, event: KeyEvent) -> bool {
            let mut ctx = RouterContext {
                session: &mut self.session,
                overlay: &mut self.overlay,
                trailing_icon: self.icon,
            };
            self.router.handle_key(&mut ctx, &event)
        }

        fn focus(&mut self) {
            self.session.request_keyboard(FocusReason::Pointer, false);
        }
    }

    #[test]
    fn test_single_tap_commits_after_double_tap_window() {
        let mut f = Fixture::new(TextFieldConfig::default(), "hello world");
        f.tap(31.0, 0);
        assert!(!f.poll(100));
        assert!(!f.session.phase().is_focused());

        assert!(f.poll(600));
        assert!(f.session.phase().is_focused());
        assert_eq!(f.session.selection(), TextSelection::collapsed(3));
        let option = f.overlay_host.last().unwrap();
        assert!(option.is_single_handle);
        assert!(!option.show_menu);
        assert_eq!(option.trigger, OverlayTrigger::Tap);
    }

    #[test]
    fn test_double_tap_selects_word_and_cancels_single_tap() {
        let mut f = Fixture::new(TextFieldConfig::default(), "foo bar baz");
        f.tap(51.0, 0);
        f.tap(52.0, 200);
        assert_eq!(f.session.selection(), TextSelection::new(4, 7));
        let option = f.overlay_host.last().unwrap();
        assert!(!option.is_single_handle);
        assert!(option.show_menu);
        assert_eq!(option.trigger, OverlayTrigger::DoubleTap);

        assert!(!f.poll(1000));
        assert_eq!(f.session.selection(), TextSelection::new(4, 7));
    }

    #[test]
    fn test_double_tap_on_word_start_selects_that_word() {
        let mut f = Fixture::new(TextFieldConfig::default(), "foo bar baz");
        f.tap(40.0, 0);
        f.tap(40.0, 200);
        assert_eq!(f.session.selection(), TextSelection::new(4, 7));
    }

    #[test]
    fn test_double_tap_after_word_end_selects_that_word() {
        let mut f = Fixture::new(TextFieldConfig::default(), "foo bar baz");
        f.tap(70.0, 0);
        f.tap(70.0, 200);
        assert_eq!(f.session.selection(), TextSelection::new(4, 7));
    }

    #[test]
    fn test_taps_far_apart_are_two_single_taps() {
        let mut f = Fixture::new(TextFieldConfig::default(), "foo bar baz");
        f.tap(11.0, 0);
        f.tap(91.0, 200);
        assert!(f.poll(800));
        assert_eq!(f.session.selection(), TextSelection::collapsed(9));
    }

    #[test]
    fn test_long_press_selects_word() {
        let mut f = Fixture::new(TextFieldConfig::default(), "foo bar baz");
        f.touch(PointerPhase::Down, 51.0, 8.0, 0);
        assert_eq!(f.router.next_deadline(), Some(f.at(500)));
        assert!(f.poll(600));
        assert_eq!(f.session.selection(), TextSelection::new(4, 7));
        let option = f.overlay_host.last().unwrap();
        assert!(option.is_long_press());
        assert!(!option.is_single_handle);

        f.touch(PointerPhase::Up, 51.0, 8.0, 700);
        assert!(!f.poll(2000));
        assert_eq!(f.session.selection(), TextSelection::new(4, 7));
    }

    #[test]
    fn test_long_press_past_end_uses_single_handle() {
        let mut f = Fixture::new(TextFieldConfig::default(), "foo bar baz");
        f.touch(PointerPhase::Down, 150.0, 8.0, 0);
        assert!(f.poll(600));
        assert_eq!(f.session.selection(), TextSelection::collapsed(11));
        let option = f.overlay_host.last().unwrap();
        assert!(option.is_single_handle);
        assert!(option.is_long_press());
        assert!(option.show_menu);
    }

    #[test]
    fn test_long_press_on_password_selects_nothing() {
        let config = TextFieldConfig::default().keyboard_type(KeyboardType::VisiblePassword);
        let mut f = Fixture::new(config, "secret");
        f.touch(PointerPhase::Down, 21.0, 8.0, 0);
        assert!(f.poll(600));
        assert_eq!(f.session.selection(), TextSelection::collapsed(2));
        assert!(f.overlay_host.last().unwrap().is_single_handle);
    }

    #[test]
    fn test_moving_touch_scrolls_instead_of_tapping() {
        let mut f = Fixture::new(TextFieldConfig::default(), &"x".repeat(30));
        f.session.update_selection(0, 0);
        f.session.layout_text(
            Rect::new(0.0, 0.0, 100.0, 20.0),
            Rect::new(0.0, 0.0, 100.0, 20.0),
        );
        f.touch(PointerPhase::Down, 80.0, 8.0, 0);
        f.touch(PointerPhase::Move, 40.0, 8.0, 30);
        f.touch(PointerPhase::Up, 40.0, 8.0, 60);
        assert!(!f.poll(1000));
        assert!(!f.session.phase().is_focused());
        assert_eq!(f.session.scroll_offset(), Point::new(40.0, 0.0));
    }

    #[test]
    fn test_mouse_click_places_caret_immediately_without_overlay() {
        let mut f = Fixture::new(TextFieldConfig::default(), "hello world");
        f.mouse(PointerPhase::Down, PointerButton::Primary, 31.0, 0);
        assert_eq!(f.session.selection(), TextSelection::collapsed(3));
        assert_eq!(f.router.mouse_status(), MouseStatus::Pressed);
        f.mouse(PointerPhase::Up, PointerButton::Primary, 31.0, 50);
        assert_eq!(f.router.mouse_status(), MouseStatus::Released);
        assert_eq!(f.overlay_host.shows(), 0);
    }

    #[test]
    fn test_mouse_drag_extends_selection() {
        let mut f = Fixture::new(TextFieldConfig::default(), "hello world");
        f.mouse(PointerPhase::Down, PointerButton::Primary, 11.0, 0);
        f.mouse(PointerPhase::Move, PointerButton::Primary, 51.0, 20);
        assert_eq!(f.router.mouse_status(), MouseStatus::Move);
        assert_eq!(f.session.selection(), TextSelection::new(1, 5));
        f.mouse(PointerPhase::Up, PointerButton::Primary, 51.0, 40);
        assert!(!f.session.is_dragging());

        f.mouse(PointerPhase::Move, PointerButton::Primary, 91.0, 60);
        assert_eq!(f.session.selection(), TextSelection::new(1, 5));
    }

    #[test]
    fn test_mouse_double_click_selects_word() {
        let mut f = Fixture::new(TextFieldConfig::default(), "foo bar baz");
        f.mouse(PointerPhase::Down, PointerButton::Primary, 91.0, 0);
        f.mouse(PointerPhase::Up, PointerButton::Primary, 91.0, 30);
        f.mouse(PointerPhase::Down, PointerButton::Primary, 92.0, 120);
        assert_eq!(f.session.selection(), TextSelection::new(8, 11));
    }

    #[test]
    fn test_secondary_click_opens_menu_without_handles() {
        let mut f = Fixture::new(TextFieldConfig::default(), "hello");
        f.mouse(PointerPhase::Down, PointerButton::Secondary, 21.0, 0);
        let option = f.overlay_host.last().unwrap();
        assert!(option.show_menu);
        assert!(!option.show_start_handle);
        assert!(!option.show_end_handle);
        assert_eq!(option.trigger, OverlayTrigger::Mouse);
    }

    #[test]
    fn test_clear_icon_runs_before_caret_placement() {
        let config = TextFieldConfig::default().trailing_icon(TrailingIcon::Clear);
        let mut f = Fixture::new(config, "hello");
        f.icon = Some(Rect::new(170.0, 0.0, 24.0, 20.0));
        f.tap(180.0, 0);
        assert_eq!(f.session.text(), "");
        assert!(!f.poll(1000));
        assert!(!f.session.phase().is_focused());
    }

    #[test]
    fn test_password_icon_toggles_obscuring() {
        let config = TextFieldConfig::default().keyboard_type(KeyboardType::VisiblePassword);
        let mut f = Fixture::new(config, "hunter2");
        f.icon = Some(Rect::new(170.0, 0.0, 24.0, 20.0));
        assert!(f.session.is_obscured());
        f.mouse(PointerPhase::Down, PointerButton::Primary, 180.0, 0);
        assert!(!f.session.is_obscured());
        assert_eq!(f.session.display_text(), "hunter2");
    }

    #[test]
    fn test_dragging_end_handle_keeps_start_anchor() {
        let mut f = Fixture::new(TextFieldConfig::default(), "foo bar baz qux");
        f.tap(51.0, 0);
        f.tap(51.0, 100);
        assert_eq!(f.session.selection(), TextSelection::new(4, 7));

        // end handle hangs below the caret at x = 70
        assert!(f.touch(PointerPhase::Down, 70.0, 25.0, 1000));
        assert!(f.router.is_dragging_handle());
        f.touch(PointerPhase::Move, 101.0, 25.0, 1050);
        assert_eq!(f.session.selection(), TextSelection::new(4, 10));
        let moved = f.overlay_host.last().unwrap();
        assert_eq!(moved.trigger, OverlayTrigger::HandleMove);
        assert_eq!(moved.end_handle.x, 100.0 - 8.0);
        assert!(!moved.show_menu);

        f.touch(PointerPhase::Up, 101.0, 25.0, 1100);
        assert!(!f.router.is_dragging_handle());
        assert!(f.overlay_host.last().unwrap().show_menu);
    }

    #[test]
    fn test_dragging_start_handle_keeps_end_anchor() {
        let mut f = Fixture::new(TextFieldConfig::default(), "foo bar baz qux");
        f.tap(51.0, 0);
        f.tap(51.0, 100);
        assert!(f.touch(PointerPhase::Down, 40.0, 25.0, 1000));
        f.touch(PointerPhase::Move, 1.0, 25.0, 1050);
        assert_eq!(f.session.selection(), TextSelection::new(0, 7));
    }

    #[test]
    fn test_arrow_keys_move_by_cluster() {
        let mut f = Fixture::new(TextFieldConfig::default(), "a\u{1F600}b");
        f.focus();
        f.session.update_selection(1, 1);
        assert!(f.key(KeyEvent::named(NamedKey::ArrowRight, Modifiers::NONE)));
        assert_eq!(f.session.selection(), TextSelection::collapsed(3));
        f.key(KeyEvent::named(NamedKey::ArrowLeft, Modifiers::SHIFT));
        assert_eq!(f.session.selection(), TextSelection::new(3, 1));
        f.key(KeyEvent::named(NamedKey::ArrowRight, Modifiers::NONE));
        assert_eq!(f.session.selection(), TextSelection::collapsed(3));
    }

    #[test]
    fn test_home_end_in_single_line() {
        let mut f = Fixture::new(TextFieldConfig::default(), "hello");
        f.focus();
        f.key(KeyEvent::named(NamedKey::Home, Modifiers::NONE));
        assert_eq!(f.session.selection(), TextSelection::collapsed(0));
        f.key(KeyEvent::named(NamedKey::End, Modifiers::SHIFT));
        assert_eq!(f.session.selection(), TextSelection::new(0, 5));
    }

    #[test]
    fn test_vertical_keys_in_multiline() {
        let config = TextFieldConfig::default()
            .keyboard_type(KeyboardType::Multiline)
            .max_lines(4);
        let mut f = Fixture::new(config, "abcd\nefgh");
        f.session.layout_text(
            Rect::new(0.0, 0.0, 200.0, 80.0),
            Rect::new(0.0, 0.0, 200.0, 80.0),
        );
        f.focus();
        f.session.update_selection(7, 7);
        f.key(KeyEvent::named(NamedKey::ArrowUp, Modifiers::NONE));
        assert_eq!(f.session.selection(), TextSelection::collapsed(2));
        f.key(KeyEvent::named(NamedKey::End, Modifiers::NONE));
        assert_eq!(f.session.selection(), TextSelection::collapsed(4));
        f.key(KeyEvent::named(NamedKey::ArrowDown, Modifiers::NONE));
        assert_eq!(f.session.selection(), TextSelection::collapsed(9));
    }

    #[test]
    fn test_shortcuts_use_primary_modifier() {
        let mut f = Fixture::new(TextFieldConfig::default(), "hello");
        f.focus();
        assert!(f.key(KeyEvent::character("a", Modifiers::PRIMARY)));
        assert_eq!(f.session.selection(), TextSelection::new(0, 5));
        assert_eq!(f.session.selection_mode(), SelectionMode::SelectAll);

        f.key(KeyEvent::character("x", Modifiers::PRIMARY));
        assert_eq!(f.session.text(), "");
        f.key(KeyEvent::character("z", Modifiers::PRIMARY));
        assert_eq!(f.session.text(), "hello");
        f.key(KeyEvent::character("z", Modifiers::PRIMARY.with_shift()));
        assert_eq!(f.session.text(), "");
    }

    #[test]
    fn test_typing_and_editing_keys() {
        let mut f = Fixture::new(TextFieldConfig::default(), "");
        f.focus();
        f.key(KeyEvent::character("h", Modifiers::NONE));
        f.key(KeyEvent::character("I", Modifiers::SHIFT));
        assert_eq!(f.session.text(), "hI");
        f.key(KeyEvent::named(NamedKey::Backspace, Modifiers::NONE));
        assert_eq!(f.session.text(), "h");
        f.key(KeyEvent::named(NamedKey::Home, Modifiers::NONE));
        f.key(KeyEvent::named(NamedKey::Delete, Modifiers::NONE));
        assert_eq!(f.session.text(), "");
        assert!(!f.key(KeyEvent::character("\u{7}", Modifiers::NONE)));
    }

    #[test]
    fn test_enter_submits_single_line_field() {
        let mut f = Fixture::new(TextFieldConfig::default(), "query");
        let submitted = Arc::new(AtomicI32::new(-1));
        let sink = submitted.clone();
        f.session
            .set_callbacks(FieldCallbacks::default().on_submit(move |code| sink.store(code, Ordering::SeqCst)));
        f.focus();
        assert!(f.key(KeyEvent::named(NamedKey::Enter, Modifiers::NONE)));
        assert_eq!(submitted.load(Ordering::SeqCst), TextInputAction::Done.code());
        assert_eq!(f.session.text(), "query");
        assert!(!f.session.phase().is_focused());
    }

    #[test]
    fn test_enter_inserts_newline_in_multiline_field() {
        let config = TextFieldConfig::default().max_lines(3);
        let mut f = Fixture::new(config, "ab");
        f.focus();
        f.key(KeyEvent::named(NamedKey::Enter, Modifiers::NONE));
        assert_eq!(f.session.text(), "ab\n");
    }

    #[test]
    fn test_escape_collapses_and_closes_overlay() {
        let mut f = Fixture::new(TextFieldConfig::default(), "foo bar");
        f.tap(51.0, 0);
        f.tap(51.0, 100);
        assert!(f.overlay.is_shown());
        f.key(KeyEvent::named(NamedKey::Escape, Modifiers::NONE));
        assert!(!f.overlay.is_shown());
        assert_eq!(f.session.selection(), TextSelection::collapsed(7));
    }

    #[test]
    fn test_disabled_field_ignores_everything() {
        let mut f = Fixture::new(TextFieldConfig::default().enabled(false), "hello");
        assert!(!f.touch(PointerPhase::Down, 21.0, 8.0, 0));
        assert!(!f.poll(1000));
        assert!(!f.mouse(PointerPhase::Down, PointerButton::Primary, 21.0, 0));
        assert!(!f.key(KeyEvent::character("x", Modifiers::NONE)));
        assert!(!f.session.phase().is_focused());
        assert_eq!(f.session.text(), "hello");
    }

    #[test]
    fn test_primary_modifier_is_platform_dependent() {
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        };
        let meta = Modifiers {
            meta: true,
            ..Modifiers::NONE
        };
        if cfg!(target_os = "macos") {
            assert!(meta.primary() && !ctrl.primary());
        } else {
            assert!(ctrl.primary() && !meta.primary());
        }
        assert!(Modifiers::PRIMARY.primary());
    }
}
