//! Collaborators a field talks to but does not own.
//!
//! Every service is optional. A field built with [`FieldServices::default`]
//! still edits text; the operations that need a missing service log a warning
//! and do nothing.
//!
//! Outbound calls are fire-and-forget. Anything that comes back (input method
//! edits, clipboard contents, connection loss) goes through a
//! [`SessionHandle`] into the session inbox and is applied the next time the
//! owner calls `process_pending` on the UI queue.

use std::{
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use derive_setters::Setters;
use tracing::trace;

use crate::{
    config::{CopyOptions, KeyboardType, TextInputAction},
    session::{SessionMessage, SessionShared},
    value::EditingValue,
};

/// Identifies one input session for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// What the input method needs to open a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct InputConfiguration {
    /// Keyboard layout to show.
    pub keyboard_type: KeyboardType,
    /// Action key to show.
    pub action: TextInputAction,
    /// Whether the field masks its text.
    pub obscure: bool,
    /// Value at the time the connection opens.
    pub value: EditingValue,
}

/// Bridge to the platform input method.
pub trait InputMethodBridge: Send + Sync {
    /// Opens a connection. Edits come back through `handle`.
    fn attach(&self, handle: SessionHandle, config: InputConfiguration);
    /// Closes the connection of `session`.
    fn close(&self, session: SessionId);
    /// Mirrors a committed value to the input method.
    fn set_editing_state(&self, session: SessionId, value: &EditingValue);
    /// Reports a selection-only change.
    fn on_selection_change(&self, session: SessionId, text: &str, start: usize, end: usize);
}

/// Receives clipboard contents; `None` when the clipboard is empty or
/// unreadable.
pub type ClipboardCallback = Box<dyn FnOnce(Option<String>) + Send>;

/// Asynchronous clipboard access.
pub trait ClipboardService: Send + Sync {
    /// Reads the clipboard and hands the result to `callback`, possibly later
    /// and on another thread.
    fn get_data(&self, callback: ClipboardCallback);
    /// Writes `text` under the given sharing policy.
    fn set_data(&self, text: String, options: CopyOptions);
}

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Runs tasks after a delay.
pub trait TaskExecutor: Send + Sync {
    /// Runs `task` once, no earlier than `delay` from now.
    fn post_delayed(&self, delay: Duration, task: Task);
}

/// Cancellation token shared between a repeating task and its owner.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the task cancelled. Pending runs become no-ops.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Tracks which field receives keyboard input.
pub trait FocusManager: Send + Sync {
    /// Registers `target` as the active input target, or clears it.
    fn set_active_target(&self, target: Option<SessionId>);
    /// Moves focus to the field after `from`. Returns `false` when there is
    /// none.
    fn focus_next(&self, from: SessionId) -> bool;
}

/// The node that hosts a field in the scene graph.
///
/// Held weakly; a field never keeps its host alive.
pub trait HostSurface: Send + Sync {
    /// Asks for a measure and layout pass.
    fn request_layout(&self);
    /// Asks for a repaint without relayout.
    fn request_render(&self);
}

/// The services available to one field.
#[derive(Clone, Default, Setters)]
#[setters(strip_option, prefix = "with_")]
pub struct FieldServices {
    /// Platform input method.
    pub input_method: Option<Arc<dyn InputMethodBridge>>,
    /// Clipboard.
    pub clipboard: Option<Arc<dyn ClipboardService>>,
    /// Executor for the caret blink timer.
    pub executor: Option<Arc<dyn TaskExecutor>>,
    /// Focus bookkeeping.
    pub focus: Option<Arc<dyn FocusManager>>,
}

impl fmt::Debug for FieldServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldServices")
            .field("input_method", &self.input_method.is_some())
            .field("clipboard", &self.clipboard.is_some())
            .field("executor", &self.executor.is_some())
            .field("focus", &self.focus.is_some())
            .finish()
    }
}

/// Sender for traffic coming back into a session from other threads.
///
/// Holds only a weak reference; once the field is gone every call is dropped.
/// Handles given to an input method are bound to that connection: after it
/// closes, their messages are discarded by the session.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    connection: Option<u64>,
    shared: Weak<SessionShared>,
}

impl SessionHandle {
    pub(crate) fn new(id: SessionId, shared: Weak<SessionShared>) -> Self {
        Self {
            id,
            connection: None,
            shared,
        }
    }

    pub(crate) fn for_connection(id: SessionId, shared: Weak<SessionShared>, connection: u64) -> Self {
        Self {
            id,
            connection: Some(connection),
            shared,
        }
    }

    /// Session this handle talks to.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Input connection this handle belongs to, `None` when unbound.
    pub fn connection(&self) -> Option<u64> {
        self.connection
    }

    /// Whether the session still exists.
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }

    /// Delivers an edit made by the input method.
    pub fn update_editing_value(&self, value: EditingValue, fire_change: bool) {
        self.send(SessionMessage::UpdateEditingValue {
            value,
            fire_change,
            connection: self.connection,
        });
    }

    /// Delivers an action key press.
    pub fn perform_action(&self, action: TextInputAction, force_close: bool) {
        self.send(SessionMessage::PerformAction {
            action,
            force_close,
            connection: self.connection,
        });
    }

    /// Reports that the platform closed the connection.
    pub fn connection_closed(&self) {
        self.send(SessionMessage::ConnectionClosed {
            connection: self.connection,
        });
    }

    fn send(&self, message: SessionMessage) {
        match self.shared.upgrade() {
            Some(shared) => shared.post(message),
            None => trace!(session = %self.id, "dropped message for a finished session"),
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("connection", &self.connection)
            .field("alive", &self.is_alive())
            .finish()
    }
}
