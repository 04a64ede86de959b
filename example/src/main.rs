//! Scripts one email field through a typical editing session and logs what
//! the engine does. Set `RUST_LOG=debug` for the full trace.

mod collaborators;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tessera_editing::{
    Constraints, HostSurface, KeyEvent, KeyboardType, MenuAction, Modifiers, MonospaceEngine,
    NamedKey, Point, PointerEvent, PointerPhase, Rect, TextField, TextFieldConfig,
    TextInputAction, TrailingIcon, session::FieldCallbacks,
};
use tessera_editing_platform::platform_services;
use tracing::{info, warn};

use crate::collaborators::{LogCanvas, LoggingHost, LoggingOverlay, ScriptedInputMethod};

fn init_tracing() {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match tracing_subscriber::EnvFilter::try_new("info,tessera_editing=info") {
            Ok(filter) => filter,
            Err(_) => tracing_subscriber::EnvFilter::new("info"),
        },
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let input_method = Arc::new(ScriptedInputMethod::default());
    let services = platform_services().with_input_method(input_method.clone());
    let config = TextFieldConfig::default()
        .keyboard_type(KeyboardType::Email)
        .action(TextInputAction::Send)
        .max_length(32)
        .show_counter(true)
        .placeholder("you@example.com")
        .trailing_icon(TrailingIcon::Clear);
    let callbacks = FieldCallbacks::default()
        .on_change(|text| info!(text, "changed"))
        .on_error(|rejected| warn!(rejected, "input rejected"))
        .on_submit(|code| info!(code, "submitted"));

    let mut field = TextField::new(
        config,
        services,
        Arc::new(MonospaceEngine::with_advance(9.0)),
        Some(Arc::new(LoggingOverlay)),
    )?
    .with_callbacks(callbacks);
    let host: Arc<dyn HostSurface> = Arc::new(LoggingHost);
    field.on_attach(Arc::downgrade(&host))?;

    let frame = |field: &mut TextField| {
        let size = field.measure(Constraints::loose(320.0, 56.0));
        field.layout(Rect::new(24.0, 120.0, 320.0, size.height.max(48.0)));
    };
    frame(&mut field);

    // Tap into the field; the tap resolves once the double-tap window passes.
    let start = Instant::now();
    let at = |ms: u64| start + Duration::from_millis(ms);
    field.handle_pointer(&PointerEvent::touch(PointerPhase::Down, Point::new(40.0, 24.0), at(0)));
    field.handle_pointer(&PointerEvent::touch(PointerPhase::Up, Point::new(40.0, 24.0), at(60)));
    field.poll(at(600));

    // Hardware keys, with a character the email keyboard strips.
    for key in ["j", "a", "n", "e", " ", "@"] {
        field.handle_key(&KeyEvent::character(key, Modifiers::NONE));
    }
    info!(text = field.session().text(), "after typing");

    // The soft keyboard finishes the address; its edit lands through the inbox.
    input_method.type_text("jane@example.org");
    field.process_pending();
    frame(&mut field);
    info!(counter = ?field.session().counter(), "counter");

    // Select the domain with a double tap and copy it from the menu.
    let x = field.text_rect().x + 9.0 * 7.5;
    field.handle_pointer(&PointerEvent::touch(PointerPhase::Down, Point::new(x, 24.0), at(1000)));
    field.handle_pointer(&PointerEvent::touch(PointerPhase::Up, Point::new(x, 24.0), at(1040)));
    field.handle_pointer(&PointerEvent::touch(PointerPhase::Down, Point::new(x, 24.0), at(1150)));
    field.handle_pointer(&PointerEvent::touch(PointerPhase::Up, Point::new(x, 24.0), at(1190)));
    info!(selection = ?field.session().selection(), "double tap");
    field.session_mut().handle_menu(MenuAction::Copy);
    field.process_pending();

    let mut canvas = LogCanvas::default();
    field.paint(&mut canvas, Instant::now());

    // Persist and restore across a simulated restart.
    let saved = field.session().restore_info().to_json()?;
    info!(%saved, "restore record");
    field.session_mut().set_text("");
    field.session_mut().apply_restore_json(&saved)?;
    info!(text = field.session().text(), caret = ?field.session().selection(), "restored");

    field.handle_key(&KeyEvent::named(NamedKey::End, Modifiers::NONE));
    field.handle_key(&KeyEvent::named(NamedKey::Enter, Modifiers::NONE));
    info!(state = ?field.session().state(), "final state");

    field.on_detach();
    Ok(())
}
