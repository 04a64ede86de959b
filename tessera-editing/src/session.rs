//! The input session controller: the state machine behind a focused field.
//!
//! ## Usage
//!
//! A [`InputSessionController`] owns the [`TextBuffer`], the formatter chain
//! and the caret mapper of one field. All mutation goes through `&mut self`
//! on the UI queue. Everything that must be reachable from other threads
//! (the inbox, blink state, the published geometry snapshot and the host
//! link) lives in a small shared block referenced weakly by deferred tasks,
//! [`SessionHandle`]s and the overlay presenter.
//!
//! ```
//! use std::sync::Arc;
//! use tessera_editing::{
//!     config::{KeyboardType, TextFieldConfig},
//!     layout::MonospaceEngine,
//!     services::FieldServices,
//!     session::InputSessionController,
//!     value::{EditingValue, TextSelection},
//! };
//!
//! let config = TextFieldConfig::default().keyboard_type(KeyboardType::Number);
//! let mut session = InputSessionController::new(
//!     config,
//!     FieldServices::default(),
//!     Arc::new(MonospaceEngine::new()),
//! )
//! .unwrap();
//! session.update_editing_value(EditingValue::new("12a3", TextSelection::collapsed(4)), true);
//! assert_eq!(session.text(), "123");
//! assert_eq!(session.selection(), TextSelection::collapsed(3));
//! ```

mod restore;

use std::{
    collections::VecDeque,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use closure::closure;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

pub use restore::RestoreInfo;

use crate::{
    buffer::{EditOrigin, TextBuffer},
    capability::{Draggable, FocusTarget, Scrollable},
    config::{CopyOptions, KeyboardType, TextFieldConfig, TextInputAction},
    error::EditingError,
    formatter::{FormatReport, FormatterChain},
    geometry::{Constraints, Point, Rect, Size},
    layout::{CaretMapper, CaretRect, ParagraphEngine, TextBoxes},
    overlay::MenuAction,
    services::{
        FieldServices, HostSurface, InputConfiguration, SessionHandle, SessionId, TaskExecutor,
        TaskHandle,
    },
    value::{EditingValue, TextDelta, TextSelection, grapheme_cluster_length, utf16_len},
};

/// Messages kept before the oldest undelivered one is dropped.
pub const INBOX_CAPACITY: usize = 64;

/// Focus and connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Not focused; no caret.
    #[default]
    Unfocused,
    /// Focused, but no input method connection is open.
    FocusedNoConnection,
    /// Focused with an open input method connection.
    FocusedConnectionOpen,
}

impl SessionPhase {
    /// Whether the field has focus.
    pub fn is_focused(self) -> bool {
        self != Self::Unfocused
    }
}

/// How much of the text is highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Caret only.
    #[default]
    None,
    /// A range is selected.
    Select,
    /// Everything was selected through select-all.
    SelectAll,
}

/// Why the keyboard is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusReason {
    /// The user tapped or clicked the field.
    Pointer,
    /// Code asked for focus. The caret moves to the end unless it was
    /// restored.
    Programmatic,
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    /// Keyboard layout in use.
    pub keyboard_type: KeyboardType,
    /// Action key in use.
    pub action: TextInputAction,
    /// Whether the text is masked.
    pub obscured: bool,
    /// Whether an input method connection is open.
    pub has_remote_connection: bool,
    /// Whether the caret is currently drawn.
    pub cursor_visible: bool,
    /// Focus state.
    pub phase: SessionPhase,
    /// Highlight state.
    pub selection_mode: SelectionMode,
}

type TextCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callbacks a field reports to its owner.
#[derive(Clone, Default)]
pub struct FieldCallbacks {
    change: Option<TextCallback>,
    error: Option<TextCallback>,
    submit: Option<Arc<dyn Fn(i32) + Send + Sync>>,
    keyboard_close: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl FieldCallbacks {
    /// Called with the new text after every committed text change.
    pub fn on_change(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.change = Some(Arc::new(callback));
        self
    }

    /// Called with the text the input filter rejected.
    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(callback));
        self
    }

    /// Called with the action code whenever an action is performed.
    pub fn on_submit(mut self, callback: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.submit = Some(Arc::new(callback));
        self
    }

    /// Called after the input method connection was closed.
    pub fn on_keyboard_close(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.keyboard_close = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for FieldCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCallbacks")
            .field("change", &self.change.is_some())
            .field("error", &self.error.is_some())
            .field("submit", &self.submit.is_some())
            .field("keyboard_close", &self.keyboard_close.is_some())
            .finish()
    }
}

/// Traffic queued for the UI queue.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SessionMessage {
    UpdateEditingValue {
        value: EditingValue,
        fire_change: bool,
        connection: Option<u64>,
    },
    PerformAction {
        action: TextInputAction,
        force_close: bool,
        connection: Option<u64>,
    },
    ConnectionClosed {
        connection: Option<u64>,
    },
    ClipboardData {
        text: Option<String>,
        target: TextSelection,
    },
    Menu(MenuAction),
}

impl SessionMessage {
    fn connection(&self) -> Option<u64> {
        match self {
            Self::UpdateEditingValue { connection, .. }
            | Self::PerformAction { connection, .. }
            | Self::ConnectionClosed { connection } => *connection,
            Self::ClipboardData { .. } | Self::Menu(_) => None,
        }
    }
}

/// Geometry copied out of the caret mapper after every layout.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeometrySnapshot {
    /// Selection the carets belong to.
    pub selection: TextSelection,
    /// Caret at the selection start, field coordinates.
    pub start_caret: CaretRect,
    /// Caret at the selection end, field coordinates.
    pub end_caret: CaretRect,
    /// Visible text rectangle, field coordinates.
    pub viewport: Rect,
    /// Field bounds in host coordinates.
    pub frame: Rect,
}

#[derive(Debug, Default)]
struct BlinkState {
    cursor_visible: bool,
    obscure_ticks: u32,
}

pub(crate) struct SessionShared {
    id: SessionId,
    inbox: Mutex<VecDeque<SessionMessage>>,
    blink: Mutex<BlinkState>,
    geometry: RwLock<GeometrySnapshot>,
    host: RwLock<Option<Weak<dyn HostSurface>>>,
    overlay_focus: AtomicBool,
}

impl SessionShared {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            inbox: Mutex::new(VecDeque::with_capacity(INBOX_CAPACITY)),
            blink: Mutex::new(BlinkState::default()),
            geometry: RwLock::new(GeometrySnapshot::default()),
            host: RwLock::new(None),
            overlay_focus: AtomicBool::new(false),
        }
    }

    /// Queues `message` and wakes the host.
    pub(crate) fn post(&self, message: SessionMessage) {
        {
            let mut inbox = self.inbox.lock();
            inbox.push_back(message);
            if inbox.len() > INBOX_CAPACITY
                && let Some(dropped) = inbox.pop_front()
            {
                warn!(session = %self.id, ?dropped, "session inbox full, dropped oldest message");
            }
        }
        match self.host() {
            Some(host) => host.request_layout(),
            None => trace!(session = %self.id, "queued message without a host"),
        }
    }

    fn take_messages(&self) -> Vec<SessionMessage> {
        self.inbox.lock().drain(..).collect()
    }

    pub(crate) fn host(&self) -> Option<Arc<dyn HostSurface>> {
        self.host.read().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn geometry(&self) -> GeometrySnapshot {
        *self.geometry.read()
    }

    pub(crate) fn set_overlay_focus(&self, focused: bool) {
        self.overlay_focus.store(focused, Ordering::Release);
    }

    fn overlay_focus(&self) -> bool {
        self.overlay_focus.load(Ordering::Acquire)
    }

    fn twinkle_tick(&self) {
        let reveal_ended = {
            let mut blink = self.blink.lock();
            blink.cursor_visible = !blink.cursor_visible;
            if blink.obscure_ticks > 0 {
                blink.obscure_ticks -= 1;
                blink.obscure_ticks == 0
            } else {
                false
            }
        };
        if let Some(host) = self.host() {
            if reveal_ended {
                host.request_layout();
            } else {
                host.request_render();
            }
        }
    }
}

fn schedule_twinkle(
    shared: Weak<SessionShared>,
    executor: Arc<dyn TaskExecutor>,
    handle: TaskHandle,
    interval: Duration,
) {
    executor.post_delayed(
        interval,
        Box::new(closure!(clone executor, || {
            if handle.is_cancelled() {
                return;
            }
            let Some(strong) = shared.upgrade() else {
                trace!("twinkle fired after its session was dropped");
                return;
            };
            strong.twinkle_tick();
            drop(strong);
            schedule_twinkle(shared, executor, handle, interval);
        })),
    );
}

fn delta_cost(delta: &TextDelta) -> usize {
    delta.end - delta.start + utf16_len(&delta.inserted)
}

/// Coordinates editing, keyboard connection, blinking and clipboard traffic
/// for one field.
pub struct InputSessionController {
    id: SessionId,
    config: TextFieldConfig,
    services: FieldServices,
    callbacks: FieldCallbacks,
    buffer: TextBuffer,
    formatters: FormatterChain,
    mapper: CaretMapper,
    shared: Arc<SessionShared>,
    phase: SessionPhase,
    connected_keyboard: Option<KeyboardType>,
    // bumped every time a connection opens
    connection: u64,
    // last value mirrored to or received from the input method
    last_known_remote: Option<EditingValue>,
    // last value the input method is known to have edited against
    remote_base: Option<EditingValue>,
    obscured: bool,
    selection_mode: SelectionMode,
    twinkle: Option<TaskHandle>,
    exceeded: bool,
    caret_authoritative: bool,
    attached: bool,
    drag_anchor: Option<usize>,
    last_measure: Option<(Constraints, f32)>,
}

impl InputSessionController {
    /// Creates an unfocused session with empty text.
    ///
    /// Fails when the configured input filter does not compile.
    pub fn new(
        config: TextFieldConfig,
        services: FieldServices,
        engine: Arc<dyn ParagraphEngine>,
    ) -> Result<Self, EditingError> {
        let formatters = FormatterChain::from_config(&config)?;
        let mut buffer = TextBuffer::new();
        buffer.set_history_limit(config.history_limit);
        let mapper = CaretMapper::new(engine, config.text_style, config.is_multiline());
        let id = SessionId::next();
        debug!(session = %id, keyboard = ?config.keyboard_type, "created input session");
        Ok(Self {
            id,
            obscured: config.starts_obscured(),
            config,
            services,
            callbacks: FieldCallbacks::default(),
            buffer,
            formatters,
            mapper,
            shared: Arc::new(SessionShared::new(id)),
            phase: SessionPhase::Unfocused,
            connected_keyboard: None,
            connection: 0,
            last_known_remote: None,
            remote_base: None,
            selection_mode: SelectionMode::None,
            twinkle: None,
            exceeded: false,
            caret_authoritative: false,
            attached: false,
            drag_anchor: None,
            last_measure: None,
        })
    }

    /// Installs the owner callbacks.
    pub fn set_callbacks(&mut self, callbacks: FieldCallbacks) {
        self.callbacks = callbacks;
    }

    /// Applies a new configuration.
    ///
    /// The formatter chain is rebuilt; a changed keyboard type reopens an
    /// open connection. On error the previous configuration stays in place.
    pub fn set_config(&mut self, config: TextFieldConfig) -> Result<(), EditingError> {
        self.formatters = FormatterChain::from_config(&config)?;
        self.buffer.set_history_limit(config.history_limit);
        self.mapper.set_style(config.text_style);
        self.mapper.set_multiline(config.is_multiline());
        if config.starts_obscured() != self.config.starts_obscured() {
            self.obscured = config.starts_obscured();
        }
        let reopen = self
            .connected_keyboard
            .is_some_and(|keyboard| keyboard != config.keyboard_type);
        self.config = config;
        if reopen {
            self.request_keyboard(FocusReason::Pointer, self.twinkle.is_some());
        }
        self.request_layout();
        Ok(())
    }

    /// Identifier of this session.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current configuration.
    pub fn config(&self) -> &TextFieldConfig {
        &self.config
    }

    /// The committed value.
    pub fn value(&self) -> &EditingValue {
        self.buffer.value()
    }

    /// The committed text.
    pub fn text(&self) -> &str {
        self.buffer.value().text()
    }

    /// The committed selection.
    pub fn selection(&self) -> TextSelection {
        self.buffer.selection()
    }

    /// Focus and connection state.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Highlight state.
    pub fn selection_mode(&self) -> SelectionMode {
        self.selection_mode
    }

    /// Whether the text is masked.
    pub fn is_obscured(&self) -> bool {
        self.obscured
    }

    /// Whether the caret is drawn this frame.
    pub fn cursor_visible(&self) -> bool {
        self.shared.blink.lock().cursor_visible
    }

    /// Remaining twinkle ticks the last typed character stays legible.
    pub fn obscure_ticks(&self) -> u32 {
        self.shared.blink.lock().obscure_ticks
    }

    /// Whether the blink timer is running.
    pub fn is_twinkling(&self) -> bool {
        self.twinkle.is_some()
    }

    /// Snapshot of the observable state.
    pub fn state(&self) -> SessionState {
        SessionState {
            keyboard_type: self.config.keyboard_type,
            action: self.config.action,
            obscured: self.obscured,
            has_remote_connection: self.connected_keyboard.is_some(),
            cursor_visible: self.cursor_visible(),
            phase: self.phase,
            selection_mode: self.selection_mode,
        }
    }

    /// Whether undo would change anything.
    pub fn can_undo(&self) -> bool {
        self.buffer.can_undo()
    }

    /// Whether redo would change anything.
    pub fn can_redo(&self) -> bool {
        self.buffer.can_redo()
    }

    /// `(len, max)` when a counter is configured.
    pub fn counter(&self) -> Option<(usize, usize)> {
        match (self.config.show_counter, self.config.max_length) {
            (true, Some(max)) => Some((self.buffer.value().len(), max)),
            _ => None,
        }
    }

    /// Whether the last edit was longer than the length limit.
    pub fn is_exceeded(&self) -> bool {
        self.exceeded
    }

    /// Sender for inbound traffic, not bound to any input connection.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.id, Arc::downgrade(&self.shared))
    }

    pub(crate) fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    /// Geometry published by the last layout.
    pub fn geometry(&self) -> GeometrySnapshot {
        self.shared.geometry()
    }

    /// The caret mapper, for hit-testing and geometry queries.
    pub fn mapper(&self) -> &CaretMapper {
        &self.mapper
    }

    // ----- host lifecycle -----

    /// Binds the session to its host surface.
    pub fn on_attach(&mut self, host: Weak<dyn HostSurface>) -> Result<(), EditingError> {
        if self.attached {
            return Err(EditingError::AlreadyAttached);
        }
        if host.strong_count() == 0 {
            return Err(EditingError::HostUnavailable);
        }
        *self.shared.host.write() = Some(host);
        self.attached = true;
        debug!(session = %self.id, "attached to host");
        Ok(())
    }

    /// Tears the session down: closes the connection, cancels blinking and
    /// clears the active target.
    pub fn on_detach(&mut self) {
        if !self.attached {
            return;
        }
        self.close_keyboard(true);
        self.stop_twinkling();
        if let Some(focus) = &self.services.focus {
            focus.set_active_target(None);
        }
        *self.shared.host.write() = None;
        self.attached = false;
        debug!(session = %self.id, "detached from host");
    }

    /// Whether [`on_attach`](Self::on_attach) succeeded and no detach followed.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    fn request_layout(&self) {
        if let Some(host) = self.shared.host() {
            host.request_layout();
        }
    }

    fn request_render(&self) {
        if let Some(host) = self.shared.host() {
            host.request_render();
        }
    }

    // ----- keyboard -----

    /// Focuses the field and opens an input method connection if none is
    /// open. Returns `false` for disabled fields.
    pub fn request_keyboard(&mut self, reason: FocusReason, start_twinkling: bool) -> bool {
        if !self.config.enabled {
            debug!(session = %self.id, "keyboard request on a disabled field");
            return false;
        }
        if !self.phase.is_focused() {
            if reason == FocusReason::Programmatic && !self.caret_authoritative {
                let len = self.buffer.value().len();
                self.buffer.update_selection(len, len);
            }
            self.caret_authoritative = false;
            self.phase = SessionPhase::FocusedNoConnection;
        }
        if let Some(focus) = &self.services.focus {
            focus.set_active_target(Some(self.id));
        }

        let keyboard = self.config.keyboard_type;
        if let Some(open) = self.connected_keyboard
            && open != keyboard
        {
            debug!(session = %self.id, from = ?open, to = ?keyboard, "keyboard type changed, reopening");
            self.close_connection();
        }
        if self.connected_keyboard.is_none() {
            match self.services.input_method.clone() {
                Some(bridge) => {
                    let value = self.buffer.value().clone();
                    self.connection += 1;
                    bridge.attach(
                        SessionHandle::for_connection(
                            self.id,
                            Arc::downgrade(&self.shared),
                            self.connection,
                        ),
                        InputConfiguration {
                            keyboard_type: keyboard,
                            action: self.config.action,
                            obscure: self.obscured,
                            value: value.clone(),
                        },
                    );
                    bridge.set_editing_state(self.id, &value);
                    self.remote_base = Some(value.clone());
                    self.last_known_remote = Some(value);
                    self.connected_keyboard = Some(keyboard);
                    self.phase = SessionPhase::FocusedConnectionOpen;
                    debug!(session = %self.id, ?reason, "opened input connection");
                }
                None => {
                    warn!(session = %self.id, "no input method bridge, keyboard unavailable");
                }
            }
        }

        if start_twinkling {
            self.start_twinkling();
        } else {
            self.shared.blink.lock().cursor_visible = false;
        }
        self.request_layout();
        true
    }

    fn close_connection(&mut self) -> bool {
        if self.connected_keyboard.take().is_none() {
            return false;
        }
        if let Some(bridge) = &self.services.input_method {
            bridge.close(self.id);
        }
        self.last_known_remote = None;
        self.remote_base = None;
        if self.phase == SessionPhase::FocusedConnectionOpen {
            self.phase = SessionPhase::FocusedNoConnection;
        }
        true
    }

    /// Closes the keyboard and blurs the field.
    ///
    /// While the overlay holds input focus this does nothing unless `force`
    /// is set; returns whether the keyboard was closed.
    pub fn close_keyboard(&mut self, force: bool) -> bool {
        if !force && self.shared.overlay_focus() {
            debug!(session = %self.id, "overlay holds focus, keeping keyboard open");
            return false;
        }
        if self.close_connection()
            && let Some(callback) = &self.callbacks.keyboard_close
        {
            callback();
        }
        let end = self.buffer.selection().end();
        self.buffer.update_selection(end, end);
        self.selection_mode = SelectionMode::None;
        self.drag_anchor = None;
        self.stop_twinkling();
        if self.phase.is_focused()
            && let Some(focus) = &self.services.focus
        {
            focus.set_active_target(None);
        }
        self.phase = SessionPhase::Unfocused;
        debug!(session = %self.id, "keyboard closed");
        self.publish_selection();
        self.request_layout();
        true
    }

    /// Handles an action key press.
    ///
    /// `Next` moves focus to the next field when there is one and keeps the
    /// keyboard open; everything else closes it. The submit callback always
    /// fires.
    pub fn perform_action(&mut self, action: TextInputAction, force_close: bool) {
        debug!(session = %self.id, ?action, "perform action");
        let moved = action == TextInputAction::Next
            && match &self.services.focus {
                Some(focus) => focus.focus_next(self.id),
                None => {
                    warn!(session = %self.id, "no focus manager, cannot move to next field");
                    false
                }
            };
        if !moved {
            self.close_keyboard(force_close);
        }
        if let Some(callback) = &self.callbacks.submit {
            callback(action.code());
        }
    }

    /// Applies an edit coming from the input method.
    pub fn update_editing_value(&mut self, remote: EditingValue, fire_change: bool) {
        if !self.config.enabled {
            return;
        }
        let current = self.buffer.value().clone();
        let mut proposed = self.rebase_remote(&current, &remote);
        let report = self.formatters.apply(&current, &mut proposed);
        if self.obscured && proposed.len() == current.len() + 1 {
            self.reveal_last_character();
        }
        let changed = self.buffer.commit(proposed, EditOrigin::Remote);
        trace!(session = %self.id, changed, "remote edit committed");
        self.apply_report(&report);
        self.last_known_remote = Some(remote);
        self.sync_remote();
        self.remote_base = Some(self.buffer.value().clone());
        if changed && fire_change {
            self.notify_change();
        }
        self.after_edit();
    }

    // The input method may have computed `remote` against a value that was
    // edited locally since. Whichever of the current value and the last
    // remote base explains `remote` with the smaller delta is taken as its
    // base; a stale base replays the remote delta over the local one.
    fn rebase_remote(&self, current: &EditingValue, remote: &EditingValue) -> EditingValue {
        let Some(base) = self.remote_base.as_ref() else {
            return remote.clone();
        };
        let Some(local_delta) = TextDelta::between(base.text(), current.text()) else {
            return remote.clone();
        };
        let Some(remote_delta) = TextDelta::between(base.text(), remote.text()) else {
            debug!(session = %self.id, "remote selection against stale text ignored");
            return current.clone();
        };
        let direct_cost = TextDelta::between(current.text(), remote.text())
            .map_or(0, |delta| delta_cost(&delta));
        if direct_cost <= delta_cost(&remote_delta) {
            return remote.clone();
        }
        let rebased = remote_delta.rebase_over(&local_delta);
        debug!(session = %self.id, ?rebased, "rebased stale remote edit");
        let caret = rebased.inserted_end();
        EditingValue::new(rebased.apply(current.text()), TextSelection::collapsed(caret))
    }

    fn sync_remote(&mut self) {
        if self.connected_keyboard.is_none() {
            return;
        }
        let value = self.buffer.value().clone();
        let Some(bridge) = &self.services.input_method else {
            warn!(session = %self.id, "input method bridge went away, cannot sync");
            return;
        };
        match &self.last_known_remote {
            Some(last) if *last == value => return,
            Some(last) if last.text() == value.text() => {
                let selection = value.selection();
                bridge.on_selection_change(
                    self.id,
                    value.text(),
                    selection.start(),
                    selection.end(),
                );
            }
            _ => bridge.set_editing_state(self.id, &value),
        }
        self.last_known_remote = Some(value);
    }

    // ----- local edits -----

    /// Replaces the selection with `text`.
    pub fn insert(&mut self, text: &str) {
        if !self.config.enabled {
            return;
        }
        let previous_len = self.buffer.value().len();
        let report = self.buffer.insert(text, &self.formatters);
        if report.changed && self.obscured && self.buffer.value().len() == previous_len + 1 {
            self.reveal_last_character();
        }
        self.apply_report(&report);
        self.finish_local_edit(report.changed);
    }

    /// Removes `[start, end)`, clamped to the text.
    pub fn delete(&mut self, start: usize, end: usize) {
        if !self.config.enabled {
            return;
        }
        let changed = self.buffer.delete(start, end);
        if changed {
            self.exceeded = false;
        }
        self.finish_local_edit(changed);
    }

    /// Removes the selection, or the cluster before the caret.
    pub fn delete_backward(&mut self) {
        let selection = self.buffer.selection();
        if !selection.is_collapsed() {
            self.delete(selection.start(), selection.end());
            return;
        }
        let caret = selection.extent;
        if caret == 0 {
            return;
        }
        let cluster = grapheme_cluster_length(self.text(), caret, true);
        self.delete(caret.saturating_sub(cluster), caret);
    }

    /// Removes the selection, or the cluster after the caret.
    pub fn delete_forward(&mut self) {
        let selection = self.buffer.selection();
        if !selection.is_collapsed() {
            self.delete(selection.start(), selection.end());
            return;
        }
        let caret = selection.extent;
        if caret >= self.buffer.value().len() {
            return;
        }
        let cluster = grapheme_cluster_length(self.text(), caret, false);
        self.delete(caret, caret + cluster);
    }

    /// Moves the selection, clamped to the text.
    pub fn update_selection(&mut self, base: usize, extent: usize) {
        self.buffer.update_selection(base, extent);
        self.selection_mode = if self.buffer.selection().is_collapsed() {
            SelectionMode::None
        } else {
            SelectionMode::Select
        };
        self.sync_remote();
        self.after_edit();
    }

    /// Selects the whole text.
    pub fn select_all(&mut self) {
        let len = self.buffer.value().len();
        self.update_selection(0, len);
        if len > 0 {
            self.selection_mode = SelectionMode::SelectAll;
        }
    }

    /// Reverts the last text change.
    pub fn undo(&mut self) {
        if self.config.enabled && self.buffer.undo() {
            self.exceeded = false;
            self.finish_local_edit(true);
        }
    }

    /// Re-applies the last undone change.
    pub fn redo(&mut self) {
        if self.config.enabled && self.buffer.redo() {
            self.exceeded = false;
            self.finish_local_edit(true);
        }
    }

    /// Replaces the whole text and puts the caret at the end.
    pub fn set_text(&mut self, text: &str) {
        let current = self.buffer.value().clone();
        let mut proposed = EditingValue::with_caret_at_end(text);
        let report = self.formatters.apply(&current, &mut proposed);
        let changed = self.buffer.commit(proposed, EditOrigin::Local);
        self.apply_report(&report);
        self.finish_local_edit(changed);
    }

    /// Flips between masked and plain text.
    pub fn toggle_obscure(&mut self) {
        self.obscured = !self.obscured;
        self.shared.blink.lock().obscure_ticks = 0;
        debug!(session = %self.id, obscured = self.obscured, "toggled obscure");
        self.request_layout();
    }

    fn reveal_last_character(&self) {
        self.shared.blink.lock().obscure_ticks = self.config.timing.obscure_reveal_ticks;
    }

    fn apply_report(&mut self, report: &FormatReport) {
        self.exceeded = report.exceeded_limit;
        if let Some(rejected) = &report.rejected
            && let Some(callback) = &self.callbacks.error
        {
            callback(rejected);
        }
    }

    fn notify_change(&self) {
        if let Some(callback) = &self.callbacks.change {
            callback(self.buffer.value().text());
        }
    }

    fn finish_local_edit(&mut self, changed: bool) {
        if changed {
            self.notify_change();
        }
        self.selection_mode = match self.selection_mode {
            _ if self.buffer.selection().is_collapsed() => SelectionMode::None,
            SelectionMode::SelectAll => SelectionMode::SelectAll,
            _ => SelectionMode::Select,
        };
        self.sync_remote();
        self.after_edit();
    }

    fn after_edit(&mut self) {
        if self.buffer.selection().is_collapsed() {
            if self.phase.is_focused() && self.twinkle.is_none() {
                self.start_twinkling();
            }
        } else {
            self.stop_twinkling();
        }
        self.publish_selection();
        self.request_layout();
    }

    // ----- clipboard -----

    fn write_clipboard(&self) -> bool {
        if self.config.copy_options == CopyOptions::None || self.obscured {
            debug!(session = %self.id, "copy refused by policy");
            return false;
        }
        let selected = self.buffer.value().selected_text();
        if selected.is_empty() {
            return false;
        }
        let Some(clipboard) = &self.services.clipboard else {
            warn!(session = %self.id, "no clipboard service, copy unavailable");
            return false;
        };
        clipboard.set_data(selected.to_string(), self.config.copy_options);
        true
    }

    /// Copies the selection and collapses the caret to its end.
    pub fn copy(&mut self) -> bool {
        if !self.write_clipboard() {
            return false;
        }
        let end = self.buffer.selection().end();
        self.update_selection(end, end);
        true
    }

    /// Copies the selection, then deletes it.
    pub fn cut(&mut self) -> bool {
        if !self.config.enabled || !self.write_clipboard() {
            return false;
        }
        let selection = self.buffer.selection();
        self.delete(selection.start(), selection.end());
        true
    }

    /// Asks the clipboard for its contents; they are inserted over the
    /// current selection once the response is processed.
    pub fn paste(&mut self) {
        if !self.config.enabled {
            return;
        }
        let Some(clipboard) = self.services.clipboard.clone() else {
            warn!(session = %self.id, "no clipboard service, paste unavailable");
            return;
        };
        let target = self.buffer.selection();
        let shared = Arc::downgrade(&self.shared);
        clipboard.get_data(Box::new(move |text: Option<String>| match shared.upgrade() {
            Some(shared) => shared.post(SessionMessage::ClipboardData { text, target }),
            None => trace!("clipboard answered after its session was dropped"),
        }));
    }

    fn apply_clipboard(&mut self, text: Option<String>, target: TextSelection) {
        let Some(text) = text.filter(|text| !text.is_empty()) else {
            debug!(session = %self.id, "clipboard empty, nothing to paste");
            return;
        };
        let target = target.clamped(self.buffer.value().len());
        self.buffer.update_selection(target.base, target.extent);
        self.insert(&text);
    }

    /// Runs a context-menu command.
    pub fn handle_menu(&mut self, action: MenuAction) {
        match action {
            MenuAction::Cut => {
                self.cut();
            }
            MenuAction::Copy => {
                self.copy();
            }
            MenuAction::SelectAll => self.select_all(),
            MenuAction::Paste => self.paste(),
        }
    }

    /// Applies every queued inbound message in arrival order.
    pub fn process_pending(&mut self) -> usize {
        let messages = self.shared.take_messages();
        let mut applied = 0;
        for message in messages {
            if let Some(connection) = message.connection()
                && !self.is_current_connection(connection)
            {
                debug!(session = %self.id, connection, "dropped message from a closed input connection");
                continue;
            }
            applied += 1;
            match message {
                SessionMessage::UpdateEditingValue {
                    value, fire_change, ..
                } => {
                    self.update_editing_value(value, fire_change);
                }
                SessionMessage::PerformAction {
                    action,
                    force_close,
                    ..
                } => self.perform_action(action, force_close),
                SessionMessage::ConnectionClosed { .. } => {
                    debug!(session = %self.id, "input connection closed by platform");
                    self.connected_keyboard = None;
                    self.last_known_remote = None;
                    self.remote_base = None;
                    if self.phase == SessionPhase::FocusedConnectionOpen {
                        self.phase = SessionPhase::FocusedNoConnection;
                    }
                }
                SessionMessage::ClipboardData { text, target } => {
                    self.apply_clipboard(text, target);
                }
                SessionMessage::Menu(action) => self.handle_menu(action),
            }
        }
        applied
    }

    fn is_current_connection(&self, connection: u64) -> bool {
        self.connected_keyboard.is_some() && connection == self.connection
    }

    // ----- twinkling -----

    /// Starts the caret blink timer and shows the caret.
    pub fn start_twinkling(&mut self) {
        if !self.buffer.selection().is_collapsed() {
            return;
        }
        self.shared.blink.lock().cursor_visible = true;
        if self.twinkle.is_some() {
            return;
        }
        let Some(executor) = self.services.executor.clone() else {
            warn!(session = %self.id, "no task executor, caret will not blink");
            return;
        };
        let handle = TaskHandle::new();
        schedule_twinkle(
            Arc::downgrade(&self.shared),
            executor,
            handle.clone(),
            self.config.timing.twinkle_interval(),
        );
        self.twinkle = Some(handle);
        trace!(session = %self.id, "twinkling started");
    }

    /// Cancels the blink timer, hides the caret and ends any reveal.
    pub fn stop_twinkling(&mut self) {
        if let Some(handle) = self.twinkle.take() {
            handle.cancel();
            trace!(session = %self.id, "twinkling stopped");
        }
        let mut blink = self.shared.blink.lock();
        blink.cursor_visible = false;
        blink.obscure_ticks = 0;
    }

    // ----- display -----

    /// Text as it should be shaped and drawn.
    ///
    /// Obscured fields show one mask character per code unit; while reveal
    /// ticks are pending the character before the caret stays legible.
    pub fn display_text(&self) -> String {
        let value = self.buffer.value();
        if !self.obscured {
            return value.text().to_string();
        }
        let ticks = self.shared.blink.lock().obscure_ticks;
        if ticks > 0 && value.len() == 1 {
            return value.text().to_string();
        }
        let reveal = if ticks > 0 {
            let caret = value.selection().end();
            let cluster = grapheme_cluster_length(value.text(), caret, true);
            caret.checked_sub(cluster).map(|start| start..caret)
        } else {
            None
        };
        let mask = self.config.mask_char;
        let mut display = String::with_capacity(value.text().len());
        let mut offset = 0;
        for ch in value.text().chars() {
            let units = ch.len_utf16();
            if reveal.as_ref().is_some_and(|range| range.contains(&offset)) {
                display.push(ch);
            } else {
                display.extend(std::iter::repeat_n(mask, units));
            }
            offset += units;
        }
        display
    }

    // ----- restore -----

    /// Record to persist across restarts.
    pub fn restore_info(&self) -> RestoreInfo {
        RestoreInfo {
            text: self.text().to_string(),
            caret_position: i64::try_from(self.selection().extent).unwrap_or(i64::MAX),
        }
    }

    /// Restores text and caret; the caret survives the next programmatic
    /// focus.
    pub fn apply_restore_info(&mut self, info: &RestoreInfo) {
        self.set_text(&info.text);
        let caret = info.caret(self.buffer.value().len());
        self.update_selection(caret, caret);
        self.caret_authoritative = true;
    }

    /// Parses and applies a JSON restore record.
    pub fn apply_restore_json(&mut self, json: &str) -> Result<(), EditingError> {
        let info = RestoreInfo::from_json(json)?;
        self.apply_restore_info(&info);
        Ok(())
    }

    // ----- geometry -----

    /// Shapes the display text (or the placeholder) for `constraints`.
    pub fn measure(&mut self, constraints: Constraints, reserved_width: f32) -> Size {
        self.last_measure = Some((constraints, reserved_width));
        let display = self.display_text();
        let placeholder = self.config.placeholder.clone();
        self.mapper
            .measure_content(&display, &placeholder, constraints, reserved_width)
    }

    /// Places the text inside `viewport` (field coordinates) of a field at
    /// `frame` (host coordinates), keeps the caret visible and publishes the
    /// geometry snapshot.
    pub fn layout_text(&mut self, viewport: Rect, frame: Rect) {
        self.mapper.set_viewport(viewport);
        let extent = self.buffer.selection().extent;
        let caret = self.mapper.caret_rect(extent);
        self.mapper.scroll_into_view(caret);
        self.shared.geometry.write().frame = frame;
        self.publish_selection();
    }

    // Edits land between host layouts; reshape against the last constraints
    // so the snapshot never describes the previous text.
    fn reshape_if_stale(&mut self) {
        let Some((constraints, reserved_width)) = self.last_measure else {
            return;
        };
        let display = self.display_text();
        if !self.mapper.is_stale(&display, &self.config.placeholder) {
            return;
        }
        self.mapper
            .measure_content(&display, &self.config.placeholder, constraints, reserved_width);
        let caret = self.mapper.caret_rect(self.buffer.selection().extent);
        self.mapper.scroll_into_view(caret);
    }

    fn publish_selection(&mut self) {
        self.reshape_if_stale();
        let selection = self.buffer.selection();
        let start_caret = self.mapper.caret_rect(selection.start());
        let end_caret = self.mapper.caret_rect(selection.end());
        let viewport = self.mapper.viewport();
        let mut geometry = self.shared.geometry.write();
        geometry.selection = selection;
        geometry.start_caret = start_caret;
        geometry.end_caret = end_caret;
        geometry.viewport = viewport;
    }

    /// Caret geometry at the selection extent.
    pub fn caret_rect(&mut self) -> CaretRect {
        let extent = self.buffer.selection().extent;
        self.mapper.caret_rect(extent)
    }

    /// Caret geometry at an arbitrary offset.
    pub fn caret_rect_at(&mut self, index: usize) -> CaretRect {
        self.mapper.caret_rect(index)
    }

    /// Highlight boxes of the selection, one per line.
    pub fn selection_boxes(&self) -> TextBoxes {
        let selection = self.buffer.selection();
        self.mapper
            .selection_boxes(selection.start(), selection.end())
    }

    /// Offset under `point` (field coordinates).
    pub fn hit_test(&self, point: Point) -> usize {
        self.mapper.position_for_offset(point)
    }
}

impl FocusTarget for InputSessionController {
    fn on_focus_gained(&mut self) {
        self.request_keyboard(FocusReason::Programmatic, true);
    }

    fn on_focus_lost(&mut self) {
        self.close_keyboard(true);
    }

    fn is_focused(&self) -> bool {
        self.phase.is_focused()
    }
}

impl Scrollable for InputSessionController {
    fn scroll_offset(&self) -> Point {
        self.mapper.scroll()
    }

    fn max_scroll_offset(&self) -> Point {
        self.mapper.max_scroll()
    }

    fn scroll_by(&mut self, delta: Point) -> Point {
        let applied = self.mapper.scroll_by(delta);
        if applied != Point::ZERO {
            self.publish_selection();
            self.request_render();
        }
        applied
    }
}

impl Draggable for InputSessionController {
    fn drag_start(&mut self, point: Point) {
        let offset = self.hit_test(point);
        self.drag_anchor = Some(offset);
        self.update_selection(offset, offset);
    }

    fn drag_update(&mut self, point: Point) {
        let Some(anchor) = self.drag_anchor else {
            return;
        };
        let offset = self.hit_test(point);
        self.update_selection(anchor, offset);
    }

    fn drag_end(&mut self) {
        self.drag_anchor = None;
    }

    fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }
}

impl Drop for InputSessionController {
    fn drop(&mut self) {
        if let Some(handle) = self.twinkle.take() {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{InteractionTiming, KeyboardType},
        layout::MonospaceEngine,
        testing::{
            ManualExecutor, MemoryClipboard, RecordingFocusManager, RecordingHost,
            RecordingInputMethod,
        },
    };

    struct Fixture {
        session: InputSessionController,
        bridge: Arc<RecordingInputMethod>,
        clipboard: Arc<MemoryClipboard>,
        executor: Arc<ManualExecutor>,
        focus: Arc<RecordingFocusManager>,
        host: Arc<RecordingHost>,
    }

    fn fixture(config: TextFieldConfig) -> Fixture {
        let bridge = Arc::new(RecordingInputMethod::default());
        let clipboard = Arc::new(MemoryClipboard::default());
        let executor = Arc::new(ManualExecutor::default());
        let focus = Arc::new(RecordingFocusManager::default());
        let host = Arc::new(RecordingHost::default());
        let services = FieldServices::default()
            .with_input_method(bridge.clone())
            .with_clipboard(clipboard.clone())
            .with_executor(executor.clone())
            .with_focus(focus.clone());
        let mut session = InputSessionController::new(
            config,
            services,
            Arc::new(MonospaceEngine::with_advance(10.0)),
        )
        .unwrap();
        let host_dyn: Arc<dyn HostSurface> = host.clone();
        session.on_attach(Arc::downgrade(&host_dyn)).unwrap();
        Fixture {
            session,
            bridge,
            clipboard,
            executor,
            focus,
            host,
        }
    }

    #[test]
    fn test_numeric_remote_edit_is_filtered() {
        let mut f = fixture(TextFieldConfig::default().keyboard_type(KeyboardType::Number));
        f.session
            .update_editing_value(EditingValue::new("12a3", TextSelection::collapsed(4)), true);
        assert_eq!(f.session.text(), "123");
        assert_eq!(f.session.selection(), TextSelection::collapsed(3));
    }

    #[test]
    fn test_disabled_field_never_opens_keyboard() {
        let mut f = fixture(TextFieldConfig::default().enabled(false));
        assert!(!f.session.request_keyboard(FocusReason::Pointer, true));
        assert_eq!(f.session.phase(), SessionPhase::Unfocused);
        assert_eq!(f.bridge.attach_count(), 0);
    }

    #[test]
    fn test_request_keyboard_opens_connection_once() {
        let mut f = fixture(TextFieldConfig::default());
        assert!(f.session.request_keyboard(FocusReason::Pointer, true));
        assert!(f.session.request_keyboard(FocusReason::Pointer, true));
        assert_eq!(f.bridge.attach_count(), 1);
        assert_eq!(f.session.phase(), SessionPhase::FocusedConnectionOpen);
        assert_eq!(f.focus.active(), Some(f.session.id()));
        assert!(f.session.cursor_visible());
    }

    #[test]
    fn test_keyboard_type_change_reopens_connection() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.request_keyboard(FocusReason::Pointer, true);
        f.session
            .set_config(TextFieldConfig::default().keyboard_type(KeyboardType::Email))
            .unwrap();
        assert_eq!(f.bridge.attach_count(), 2);
        assert_eq!(f.bridge.close_count(), 1);
        assert_eq!(
            f.bridge.last_config().map(|config| config.keyboard_type),
            Some(KeyboardType::Email)
        );
    }

    #[test]
    fn test_missing_bridge_degrades_to_no_connection() {
        let mut session = InputSessionController::new(
            TextFieldConfig::default(),
            FieldServices::default(),
            Arc::new(MonospaceEngine::new()),
        )
        .unwrap();
        assert!(session.request_keyboard(FocusReason::Pointer, true));
        assert_eq!(session.phase(), SessionPhase::FocusedNoConnection);
        assert!(!session.is_twinkling());
        session.insert("ok");
        assert_eq!(session.text(), "ok");
    }

    #[test]
    fn test_close_keyboard_collapses_to_selection_end() {
        let closed = Arc::new(AtomicBool::new(false));
        let mut f = fixture(TextFieldConfig::default());
        f.session.set_callbacks(FieldCallbacks::default().on_keyboard_close(
            closure!(clone closed, || closed.store(true, Ordering::SeqCst)),
        ));
        f.session.request_keyboard(FocusReason::Pointer, true);
        f.session.insert("hello");
        f.session.update_selection(1, 3);
        assert!(f.session.close_keyboard(false));
        assert_eq!(f.session.selection(), TextSelection::collapsed(3));
        assert_eq!(f.session.phase(), SessionPhase::Unfocused);
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(f.focus.active(), None);
    }

    #[test]
    fn test_overlay_focus_blocks_unforced_close() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.request_keyboard(FocusReason::Pointer, true);
        f.session.shared().set_overlay_focus(true);
        assert!(!f.session.close_keyboard(false));
        assert_eq!(f.session.phase(), SessionPhase::FocusedConnectionOpen);
        assert!(f.session.close_keyboard(true));
        assert_eq!(f.session.phase(), SessionPhase::Unfocused);
    }

    #[test]
    fn test_next_action_moves_focus_and_submits() {
        let submitted = Arc::new(Mutex::new(Vec::new()));
        let mut f = fixture(TextFieldConfig::default().action(TextInputAction::Next));
        f.focus.set_has_next(true);
        f.session.set_callbacks(
            FieldCallbacks::default()
                .on_submit(closure!(clone submitted, |code| submitted.lock().push(code))),
        );
        f.session.request_keyboard(FocusReason::Pointer, true);
        f.session.perform_action(TextInputAction::Next, false);
        assert_eq!(f.focus.next_requests(), 1);
        assert_eq!(*submitted.lock(), vec![5]);
        assert_eq!(f.session.phase(), SessionPhase::FocusedConnectionOpen);
        assert_eq!(f.bridge.close_count(), 0);

        f.session.request_keyboard(FocusReason::Pointer, true);
        f.session.perform_action(TextInputAction::Done, false);
        assert_eq!(*submitted.lock(), vec![5, 6]);
        assert_eq!(f.session.phase(), SessionPhase::Unfocused);
    }

    #[test]
    fn test_remote_echo_does_not_resync() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.request_keyboard(FocusReason::Pointer, true);
        let states = f.bridge.editing_states().len();
        let value = EditingValue::with_caret_at_end("abc");
        f.session.update_editing_value(value.clone(), true);
        f.session.update_editing_value(value, true);
        assert_eq!(f.bridge.editing_states().len(), states);
        assert_eq!(f.session.text(), "abc");
    }

    #[test]
    fn test_filtered_remote_edit_is_mirrored_back() {
        let mut f = fixture(TextFieldConfig::default().max_length(3));
        f.session.request_keyboard(FocusReason::Pointer, true);
        f.session
            .update_editing_value(EditingValue::with_caret_at_end("abcdef"), true);
        assert_eq!(f.session.text(), "abc");
        assert!(f.session.is_exceeded());
        let states = f.bridge.editing_states();
        assert_eq!(states.last().map(|value| value.text().to_string()), Some("abc".into()));
    }

    #[test]
    fn test_selection_only_change_reports_selection() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.request_keyboard(FocusReason::Pointer, true);
        f.session.insert("hello");
        f.session.update_selection(1, 4);
        assert_eq!(f.bridge.selection_changes().last(), Some(&(1, 4)));
    }

    #[test]
    fn test_stale_remote_edit_is_rebased_over_local_edit() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.request_keyboard(FocusReason::Pointer, true);
        f.session
            .update_editing_value(EditingValue::with_caret_at_end("hello"), true);
        f.session.update_selection(0, 0);
        f.session.insert(">");
        // the input method appended to the text it last saw
        f.session
            .update_editing_value(EditingValue::with_caret_at_end("hello!"), true);
        assert_eq!(f.session.text(), ">hello!");
        assert_eq!(f.session.selection(), TextSelection::collapsed(7));
    }

    #[test]
    fn test_change_callback_only_on_text_change() {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let mut f = fixture(TextFieldConfig::default());
        f.session.set_callbacks(
            FieldCallbacks::default()
                .on_change(closure!(clone changes, |text| changes.lock().push(text.to_string()))),
        );
        f.session.insert("ab");
        f.session.update_selection(0, 1);
        f.session.delete(5, 9);
        assert_eq!(*changes.lock(), vec!["ab".to_string()]);
    }

    #[test]
    fn test_input_filter_reports_rejected_text() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let mut f = fixture(TextFieldConfig::default().input_filter("[a-z]"));
        f.session.set_callbacks(
            FieldCallbacks::default()
                .on_error(closure!(clone errors, |text| errors.lock().push(text.to_string()))),
        );
        f.session.insert("a1b2");
        assert_eq!(f.session.text(), "ab");
        assert_eq!(*errors.lock(), vec!["12".to_string()]);
    }

    #[test]
    fn test_twinkle_toggles_and_stops_on_range_selection() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.request_keyboard(FocusReason::Pointer, true);
        assert!(f.session.cursor_visible());
        f.executor.advance(Duration::from_millis(500));
        assert!(!f.session.cursor_visible());
        f.executor.advance(Duration::from_millis(500));
        assert!(f.session.cursor_visible());
        assert!(f.host.render_requests() >= 2);

        f.session.insert("abc");
        f.session.update_selection(0, 2);
        assert!(!f.session.is_twinkling());
        assert!(!f.session.cursor_visible());
        f.executor.advance(Duration::from_millis(2000));
        assert!(!f.session.cursor_visible());

        f.session.update_selection(1, 1);
        assert!(f.session.is_twinkling());
    }

    #[test]
    fn test_twinkle_after_drop_is_inert() {
        let f = fixture(TextFieldConfig::default());
        let Fixture {
            mut session,
            executor,
            ..
        } = f;
        session.request_keyboard(FocusReason::Pointer, true);
        drop(session);
        assert_eq!(executor.advance(Duration::from_secs(5)), 1);
        assert_eq!(executor.pending(), 0);
    }

    #[test]
    fn test_obscure_reveals_last_typed_character() {
        let mut f = fixture(
            TextFieldConfig::default()
                .keyboard_type(KeyboardType::VisiblePassword)
                .timing(InteractionTiming::default().obscure_reveal_ticks(2)),
        );
        f.session.request_keyboard(FocusReason::Pointer, true);
        f.session.insert("s");
        assert_eq!(f.session.display_text(), "s");
        f.session.insert("e");
        assert_eq!(f.session.display_text(), "\u{2022}e");
        f.executor.advance(Duration::from_millis(500));
        assert_eq!(f.session.display_text(), "\u{2022}e");
        let layouts = f.host.layout_requests();
        f.executor.advance(Duration::from_millis(500));
        assert_eq!(f.session.display_text(), "\u{2022}\u{2022}");
        assert!(f.host.layout_requests() > layouts);
    }

    #[test]
    fn test_obscure_masks_each_code_unit() {
        let mut f = fixture(TextFieldConfig::default().obscure(true));
        f.session.set_text("a😀");
        assert_eq!(f.session.display_text(), "\u{2022}".repeat(3));
        f.session.toggle_obscure();
        assert_eq!(f.session.display_text(), "a😀");
    }

    #[test]
    fn test_copy_respects_policy_and_obscure() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.insert("secret");
        f.session.update_selection(0, 3);
        assert!(f.session.copy());
        assert_eq!(f.clipboard.contents().as_deref(), Some("sec"));
        assert_eq!(f.session.selection(), TextSelection::collapsed(3));

        let mut f = fixture(TextFieldConfig::default().copy_options(CopyOptions::None));
        f.session.insert("secret");
        f.session.select_all();
        assert!(!f.session.copy());
        assert_eq!(f.clipboard.contents(), None);

        let mut f = fixture(TextFieldConfig::default().obscure(true));
        f.session.insert("secret");
        f.session.select_all();
        assert!(!f.session.cut());
        assert_eq!(f.session.text(), "secret");
    }

    #[test]
    fn test_cut_removes_selection() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.insert("hello world");
        f.session.update_selection(5, 11);
        assert!(f.session.cut());
        assert_eq!(f.session.text(), "hello");
        assert_eq!(f.clipboard.contents().as_deref(), Some(" world"));
    }

    #[test]
    fn test_paste_targets_selection_at_request_time() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.insert("ab");
        f.session.update_selection(1, 1);
        f.clipboard.set_contents("XY");
        f.session.paste();
        f.session.update_selection(2, 2);
        assert_eq!(f.session.process_pending(), 1);
        assert_eq!(f.session.text(), "aXYb");
        assert_eq!(f.session.selection(), TextSelection::collapsed(3));
    }

    #[test]
    fn test_paste_past_end_clamps_first() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.insert("ab");
        f.session
            .shared()
            .post(SessionMessage::ClipboardData {
                text: Some("!".to_string()),
                target: TextSelection::collapsed(5),
            });
        f.session.process_pending();
        assert_eq!(f.session.text(), "ab!");
    }

    #[test]
    fn test_select_all_sets_mode() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.insert("abc");
        f.session.select_all();
        assert_eq!(f.session.selection_mode(), SelectionMode::SelectAll);
        assert_eq!(f.session.selection(), TextSelection::new(0, 3));
        f.session.update_selection(1, 1);
        assert_eq!(f.session.selection_mode(), SelectionMode::None);
    }

    #[test]
    fn test_inbox_applies_in_arrival_order_and_drops_oldest() {
        let mut f = fixture(TextFieldConfig::default());
        let handle = f.session.handle();
        for index in 0..(INBOX_CAPACITY + 2) {
            handle.update_editing_value(EditingValue::with_caret_at_end(index.to_string()), true);
        }
        assert_eq!(f.session.process_pending(), INBOX_CAPACITY);
        assert_eq!(f.session.text(), (INBOX_CAPACITY + 1).to_string());
        assert!(f.host.layout_requests() >= INBOX_CAPACITY);
    }

    #[test]
    fn test_handle_from_closed_connection_is_ignored() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.request_keyboard(FocusReason::Pointer, true);
        let stale = f.bridge.last_handle().unwrap();
        f.session.close_keyboard(true);
        f.session.request_keyboard(FocusReason::Pointer, true);
        let current = f.bridge.last_handle().unwrap();
        assert_ne!(stale.connection(), current.connection());

        stale.update_editing_value(EditingValue::with_caret_at_end("old"), true);
        stale.connection_closed();
        assert_eq!(f.session.process_pending(), 0);
        assert_eq!(f.session.text(), "");
        assert_eq!(f.session.phase(), SessionPhase::FocusedConnectionOpen);

        current.update_editing_value(EditingValue::with_caret_at_end("new"), true);
        assert_eq!(f.session.process_pending(), 1);
        assert_eq!(f.session.text(), "new");
    }

    #[test]
    fn test_handle_outliving_session_is_inert() {
        let f = fixture(TextFieldConfig::default());
        let handle = f.session.handle();
        drop(f);
        assert!(!handle.is_alive());
        handle.perform_action(TextInputAction::Done, false);
    }

    #[test]
    fn test_undo_redo_through_controller() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.insert("a");
        f.session.insert("b");
        f.session.undo();
        assert_eq!(f.session.text(), "a");
        f.session.redo();
        assert_eq!(f.session.text(), "ab");
        assert!(!f.session.can_redo());
    }

    #[test]
    fn test_counter_reports_length_and_limit() {
        let mut f = fixture(TextFieldConfig::default().max_length(4).show_counter(true));
        f.session.insert("abcdef");
        assert_eq!(f.session.counter(), Some((4, 4)));
        assert!(f.session.is_exceeded());
        f.session.delete_backward();
        assert!(!f.session.is_exceeded());
    }

    #[test]
    fn test_exceeded_clears_on_undo_and_redo() {
        let mut f = fixture(TextFieldConfig::default().max_length(4).show_counter(true));
        f.session.insert("abcdef");
        assert!(f.session.is_exceeded());
        f.session.undo();
        assert_eq!(f.session.text(), "");
        assert!(!f.session.is_exceeded());

        f.session.insert("abcdef");
        f.session.undo();
        f.session.redo();
        assert_eq!(f.session.text(), "abcd");
        assert!(!f.session.is_exceeded());
    }

    #[test]
    fn test_restore_marks_caret_authoritative() {
        let mut f = fixture(TextFieldConfig::default());
        f.session
            .apply_restore_json(r#"{"text":"hello","caretPosition":2}"#)
            .unwrap();
        f.session.on_focus_gained();
        assert_eq!(f.session.selection(), TextSelection::collapsed(2));
        f.session.on_focus_lost();
        f.session.update_selection(1, 1);
        f.session.on_focus_gained();
        assert_eq!(f.session.selection(), TextSelection::collapsed(5));
        assert_eq!(f.session.restore_info().caret_position, 5);
    }

    #[test]
    fn test_restore_negative_caret_clamps() {
        let mut f = fixture(TextFieldConfig::default());
        f.session
            .apply_restore_json(r#"{"text":"hey","caretPosition":-3}"#)
            .unwrap();
        assert_eq!(f.session.selection(), TextSelection::collapsed(0));
        assert!(f.session.apply_restore_json("not json").is_err());
    }

    #[test]
    fn test_attach_preconditions() {
        let mut f = fixture(TextFieldConfig::default());
        let host_dyn: Arc<dyn HostSurface> = f.host.clone();
        assert!(matches!(
            f.session.on_attach(Arc::downgrade(&host_dyn)),
            Err(EditingError::AlreadyAttached)
        ));
        f.session.on_detach();
        let gone: Weak<dyn HostSurface> = {
            let host: Arc<dyn HostSurface> = Arc::new(RecordingHost::default());
            Arc::downgrade(&host)
        };
        assert!(matches!(
            f.session.on_attach(gone),
            Err(EditingError::HostUnavailable)
        ));
    }

    #[test]
    fn test_detach_closes_connection_and_timer() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.request_keyboard(FocusReason::Pointer, true);
        f.session.on_detach();
        assert_eq!(f.bridge.close_count(), 1);
        assert!(!f.session.is_twinkling());
        assert_eq!(f.focus.active(), None);
        assert!(!f.session.is_attached());
    }

    #[test]
    fn test_drag_selection_keeps_anchor() {
        let mut f = fixture(TextFieldConfig::default());
        f.session.insert("hello world");
        f.session.measure(Constraints::loose(500.0, 100.0), 0.0);
        f.session
            .layout_text(Rect::new(0.0, 0.0, 500.0, 20.0), Rect::new(0.0, 0.0, 500.0, 20.0));
        f.session.drag_start(Point::new(20.0, 5.0));
        f.session.drag_update(Point::new(70.0, 5.0));
        assert_eq!(f.session.selection(), TextSelection::new(2, 7));
        f.session.drag_update(Point::new(0.0, 5.0));
        assert_eq!(f.session.selection(), TextSelection::new(2, 0));
        f.session.drag_end();
        assert!(!f.session.is_dragging());
    }
}
