//! tessera-editing is the text input engine behind tessera text fields.
//!
//! It keeps the editable value, filters what may be typed, maps offsets to
//! pixels, talks to the platform input method, recognizes gestures, drives
//! the selection overlay and paints the caret and highlights. Rendering the
//! glyphs themselves and the platform services are left to the embedder.
//!
//! # Pieces
//!
//! - [`buffer::TextBuffer`] holds an [`value::EditingValue`] (text plus
//!   selection, offsets in UTF-16 code units) with undo and redo.
//! - [`formatter::FormatterChain`] rewrites every proposed value: length
//!   limit, single line, keyboard character classes and a custom filter.
//! - [`layout::CaretMapper`] owns the shaped paragraph of a
//!   [`layout::ParagraphEngine`] and answers caret, hit-test and selection
//!   box queries.
//! - [`session::InputSessionController`] is the focus and input method state
//!   machine. Other threads reach it only through a
//!   [`services::SessionHandle`], which queues messages for
//!   [`process_pending`](session::InputSessionController::process_pending).
//! - [`gesture::GestureRouter`] turns pointer and key input into edits.
//! - [`overlay::OverlayPresenter`] shows selection handles and the context
//!   menu through an embedder supplied [`overlay::OverlayHost`].
//! - [`render::RenderModifier`] paints onto an embedder supplied
//!   [`render::Canvas`].
//! - [`field::TextField`] wires all of the above behind a measure, layout
//!   and paint protocol.
//!
//! # Threading
//!
//! Everything that mutates editing state takes `&mut self` and runs on the
//! UI queue. Deferred work (clipboard answers, caret blinking, input method
//! callbacks) holds weak references and is marshaled back through the
//! session's inbox, so it never outlives the field.
//!
//! ```
//! use tessera_editing::{
//!     buffer::TextBuffer,
//!     config::TextFieldConfig,
//!     formatter::FormatterChain,
//! };
//!
//! let chain = FormatterChain::from_config(&TextFieldConfig::default().max_length(5)).unwrap();
//! let mut buffer = TextBuffer::new();
//! buffer.insert("hello world", &chain);
//! assert_eq!(buffer.value().text(), "hello");
//! ```
#![deny(missing_docs, clippy::unwrap_used)]

pub mod buffer;
pub mod capability;
pub mod color;
pub mod config;
pub mod error;
pub mod field;
pub mod formatter;
pub mod geometry;
pub mod gesture;
pub mod layout;
pub mod overlay;
pub mod render;
pub mod services;
pub mod session;
pub mod value;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use crate::{
    buffer::{EditOrigin, TextBuffer},
    capability::{Draggable, FocusTarget, Scrollable},
    color::Color,
    config::{
        CopyOptions, InteractionTiming, KeyboardType, TextFieldConfig, TextInputAction,
        TrailingIcon,
    },
    error::EditingError,
    field::TextField,
    formatter::{FormatReport, FormatterChain, InputFormatter},
    geometry::{Constraints, Point, Rect, Size},
    gesture::{GestureRouter, Key, KeyEvent, Modifiers, NamedKey, PointerEvent, PointerPhase},
    layout::{CaretMapper, CaretRect, MonospaceEngine, Paragraph, ParagraphEngine, TextStyle},
    overlay::{MenuAction, OverlayHost, OverlayPresenter, OverlayShowOption},
    render::{Canvas, RenderModifier, RenderStyle},
    services::{
        ClipboardService, FieldServices, FocusManager, HostSurface, InputMethodBridge,
        SessionHandle, SessionId, TaskExecutor, TaskHandle,
    },
    session::{
        FieldCallbacks, InputSessionController, RestoreInfo, SelectionMode, SessionPhase,
        SessionState,
    },
    value::{EditingValue, TextDelta, TextSelection},
};
