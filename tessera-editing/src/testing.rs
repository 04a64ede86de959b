//! In-memory collaborators for tests and headless hosts.
//!
//! Every fake records what it was asked to do so tests can assert on it.
//! [`ManualExecutor`] runs deferred tasks on a virtual clock that only moves
//! when [`ManualExecutor::advance`] is called.

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use parking_lot::Mutex;

use crate::{
    color::Color,
    config::CopyOptions,
    geometry::{Point, Rect},
    overlay::{OverlayHost, OverlayShowOption},
    render::Canvas,
    services::{
        ClipboardCallback, ClipboardService, FocusManager, HostSurface, InputConfiguration,
        InputMethodBridge, SessionHandle, SessionId, Task, TaskExecutor,
    },
    value::EditingValue,
};

#[derive(Default)]
struct Clock {
    now: Duration,
    sequence: u64,
    tasks: Vec<(Duration, u64, Task)>,
}

/// Executor driven by a virtual clock.
#[derive(Default)]
pub struct ManualExecutor {
    clock: Mutex<Clock>,
}

impl ManualExecutor {
    /// Moves the clock forward by `by`, running every task that falls due in
    /// order. Tasks posted while running are picked up if they fall due in
    /// the same window. Returns how many tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.clock.lock().now + by;
        let mut ran = 0;
        loop {
            let task = {
                let mut clock = self.clock.lock();
                let next = clock
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, (due, _, _))| *due <= target)
                    .min_by_key(|(_, (due, sequence, _))| (*due, *sequence))
                    .map(|(index, _)| index);
                match next {
                    Some(index) => {
                        let (due, _, task) = clock.tasks.remove(index);
                        clock.now = due;
                        task
                    }
                    None => break,
                }
            };
            task();
            ran += 1;
        }
        self.clock.lock().now = target;
        ran
    }

    /// Tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.clock.lock().tasks.len()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }
}

impl TaskExecutor for ManualExecutor {
    fn post_delayed(&self, delay: Duration, task: Task) {
        let mut clock = self.clock.lock();
        let due = clock.now + delay;
        let sequence = clock.sequence;
        clock.sequence += 1;
        clock.tasks.push((due, sequence, task));
    }
}

#[derive(Default)]
struct InputMethodLog {
    attached: Vec<(SessionHandle, InputConfiguration)>,
    closed: Vec<SessionId>,
    states: Vec<EditingValue>,
    selections: Vec<(usize, usize)>,
}

/// Input method bridge that records every call.
#[derive(Default)]
pub struct RecordingInputMethod {
    log: Mutex<InputMethodLog>,
}

impl RecordingInputMethod {
    /// Number of `attach` calls.
    pub fn attach_count(&self) -> usize {
        self.log.lock().attached.len()
    }

    /// Number of `close` calls.
    pub fn close_count(&self) -> usize {
        self.log.lock().closed.len()
    }

    /// Configuration of the last `attach`.
    pub fn last_config(&self) -> Option<InputConfiguration> {
        self.log.lock().attached.last().map(|(_, config)| config.clone())
    }

    /// Handle passed to the last `attach`.
    pub fn last_handle(&self) -> Option<SessionHandle> {
        self.log.lock().attached.last().map(|(handle, _)| handle.clone())
    }

    /// Values mirrored through `set_editing_state`.
    pub fn editing_states(&self) -> Vec<EditingValue> {
        self.log.lock().states.clone()
    }

    /// `(start, end)` pairs reported through `on_selection_change`.
    pub fn selection_changes(&self) -> Vec<(usize, usize)> {
        self.log.lock().selections.clone()
    }
}

impl InputMethodBridge for RecordingInputMethod {
    fn attach(&self, handle: SessionHandle, config: InputConfiguration) {
        self.log.lock().attached.push((handle, config));
    }

    fn close(&self, session: SessionId) {
        self.log.lock().closed.push(session);
    }

    fn set_editing_state(&self, _session: SessionId, value: &EditingValue) {
        self.log.lock().states.push(value.clone());
    }

    fn on_selection_change(&self, _session: SessionId, _text: &str, start: usize, end: usize) {
        self.log.lock().selections.push((start, end));
    }
}

/// Clipboard held in memory that answers reads immediately.
#[derive(Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    options: Mutex<Option<CopyOptions>>,
}

impl MemoryClipboard {
    /// Replaces the contents.
    pub fn set_contents(&self, text: impl Into<String>) {
        *self.contents.lock() = Some(text.into());
    }

    /// Current contents.
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().clone()
    }

    /// Policy of the last write.
    pub fn last_options(&self) -> Option<CopyOptions> {
        *self.options.lock()
    }
}

impl ClipboardService for MemoryClipboard {
    fn get_data(&self, callback: ClipboardCallback) {
        let contents = self.contents();
        callback(contents);
    }

    fn set_data(&self, text: String, options: CopyOptions) {
        *self.contents.lock() = Some(text);
        *self.options.lock() = Some(options);
    }
}

/// Focus manager that records the active target.
#[derive(Default)]
pub struct RecordingFocusManager {
    active: Mutex<Option<SessionId>>,
    has_next: AtomicBool,
    next_requests: AtomicUsize,
}

impl RecordingFocusManager {
    /// Whether `focus_next` reports a next field.
    pub fn set_has_next(&self, has_next: bool) {
        self.has_next.store(has_next, Ordering::SeqCst);
    }

    /// The registered active target.
    pub fn active(&self) -> Option<SessionId> {
        *self.active.lock()
    }

    /// Number of `focus_next` calls.
    pub fn next_requests(&self) -> usize {
        self.next_requests.load(Ordering::SeqCst)
    }
}

impl FocusManager for RecordingFocusManager {
    fn set_active_target(&self, target: Option<SessionId>) {
        *self.active.lock() = target;
    }

    fn focus_next(&self, _from: SessionId) -> bool {
        self.next_requests.fetch_add(1, Ordering::SeqCst);
        self.has_next.load(Ordering::SeqCst)
    }
}

/// Host surface that counts requests.
#[derive(Default)]
pub struct RecordingHost {
    layouts: AtomicUsize,
    renders: AtomicUsize,
}

impl RecordingHost {
    /// Number of layout requests.
    pub fn layout_requests(&self) -> usize {
        self.layouts.load(Ordering::SeqCst)
    }

    /// Number of render requests.
    pub fn render_requests(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl HostSurface for RecordingHost {
    fn request_layout(&self) {
        self.layouts.fetch_add(1, Ordering::SeqCst);
    }

    fn request_render(&self) {
        self.renders.fetch_add(1, Ordering::SeqCst);
    }
}

/// One call made to a [`RecordingOverlayHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    /// `show`.
    Show(OverlayShowOption),
    /// `update`.
    Update(OverlayShowOption),
    /// `hide`.
    Hide,
}

/// Overlay host that records calls.
#[derive(Default)]
pub struct RecordingOverlayHost {
    events: Mutex<Vec<OverlayEvent>>,
}

impl RecordingOverlayHost {
    /// Every call so far.
    pub fn events(&self) -> Vec<OverlayEvent> {
        self.events.lock().clone()
    }

    /// Option of the last `show` or `update`.
    pub fn last(&self) -> Option<OverlayShowOption> {
        self.events.lock().iter().rev().find_map(|event| match event {
            OverlayEvent::Show(option) | OverlayEvent::Update(option) => Some(*option),
            OverlayEvent::Hide => None,
        })
    }

    /// Number of `show` calls.
    pub fn shows(&self) -> usize {
        self.count(|event| matches!(event, OverlayEvent::Show(_)))
    }

    /// Number of `hide` calls.
    pub fn hides(&self) -> usize {
        self.count(|event| matches!(event, OverlayEvent::Hide))
    }

    fn count(&self, predicate: impl Fn(&OverlayEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| predicate(event)).count()
    }
}

impl OverlayHost for RecordingOverlayHost {
    fn show(&self, option: &OverlayShowOption) {
        self.events.lock().push(OverlayEvent::Show(*option));
    }

    fn update(&self, option: &OverlayShowOption) {
        self.events.lock().push(OverlayEvent::Update(*option));
    }

    fn hide(&self) {
        self.events.lock().push(OverlayEvent::Hide);
    }
}

/// One draw call recorded by [`RecordingCanvas`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawOp {
    /// `save`.
    Save,
    /// `restore`.
    Restore,
    /// `clip_rect`.
    Clip(Rect),
    /// `draw_rect`.
    Rect(Rect, Color),
    /// `draw_line`.
    Line(Point, Point, f32, Color),
}

/// Canvas that records draw calls.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    /// Every call so far.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Filled rectangles in draw order.
    pub fn rects(&self) -> Vec<(Rect, Color)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Rect(rect, color) => Some((*rect, *color)),
                _ => None,
            })
            .collect()
    }

    /// Forgets every recorded call.
    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl Canvas for RecordingCanvas {
    fn save(&mut self) {
        self.ops.push(DrawOp::Save);
    }

    fn restore(&mut self) {
        self.ops.push(DrawOp::Restore);
    }

    fn clip_rect(&mut self, rect: Rect) {
        self.ops.push(DrawOp::Clip(rect));
    }

    fn draw_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(DrawOp::Rect(rect, color));
    }

    fn draw_line(&mut self, from: Point, to: Point, width: f32, color: Color) {
        self.ops.push(DrawOp::Line(from, to, width, color));
    }
}
