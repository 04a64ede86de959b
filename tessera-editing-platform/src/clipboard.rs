//! System clipboard for copy, cut and paste.
//!
//! ## Usage
//!
//! Pass a [`SystemClipboard`] as the field's clipboard service. On targets
//! without a desktop clipboard every read answers `None` and writes are
//! dropped.

#[cfg(all(not(target_os = "android"), not(target_family = "wasm")))]
use parking_lot::Mutex;
use tessera_editing::{
    config::CopyOptions,
    services::{ClipboardCallback, ClipboardService},
};
use tracing::{trace, warn};

/// Clipboard service backed by the operating system clipboard.
pub struct SystemClipboard {
    #[cfg(all(not(target_os = "android"), not(target_family = "wasm")))]
    manager: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    /// Connects to the system clipboard. A failed connection is logged and
    /// leaves a clipboard that reads nothing.
    #[cfg(all(not(target_os = "android"), not(target_family = "wasm")))]
    pub fn new() -> Self {
        let manager = match arboard::Clipboard::new() {
            Ok(manager) => Some(manager),
            Err(err) => {
                warn!("Failed to initialize clipboard: {err}");
                None
            }
        };
        Self {
            manager: Mutex::new(manager),
        }
    }

    /// Creates a clipboard that reads nothing on this target.
    #[cfg(any(target_os = "android", target_family = "wasm"))]
    pub fn new() -> Self {
        warn!("no system clipboard on this target");
        Self {}
    }

    /// Whether the system clipboard could be opened.
    pub fn is_available(&self) -> bool {
        #[cfg(all(not(target_os = "android"), not(target_family = "wasm")))]
        {
            self.manager.lock().is_some()
        }
        #[cfg(any(target_os = "android", target_family = "wasm"))]
        {
            false
        }
    }

    fn read(&self) -> Option<String> {
        #[cfg(all(not(target_os = "android"), not(target_family = "wasm")))]
        {
            let mut manager = self.manager.lock();
            match manager.as_mut()?.get_text() {
                Ok(text) => Some(text),
                Err(err) => {
                    trace!("clipboard read failed: {err}");
                    None
                }
            }
        }
        #[cfg(any(target_os = "android", target_family = "wasm"))]
        {
            None
        }
    }

    fn write(&self, text: String) {
        #[cfg(all(not(target_os = "android"), not(target_family = "wasm")))]
        {
            let mut manager = self.manager.lock();
            let Some(manager) = manager.as_mut() else {
                warn!("clipboard unavailable, dropping copied text");
                return;
            };
            if let Err(err) = manager.set_text(text) {
                warn!("clipboard write failed: {err}");
            }
        }
        #[cfg(any(target_os = "android", target_family = "wasm"))]
        {
            let _ = text;
            warn!("clipboard unavailable, dropping copied text");
        }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardService for SystemClipboard {
    fn get_data(&self, callback: ClipboardCallback) {
        callback(self.read());
    }

    fn set_data(&self, text: String, options: CopyOptions) {
        if options == CopyOptions::None {
            trace!("copy disabled for this field");
            return;
        }
        self.write(text);
    }
}
