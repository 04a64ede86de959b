//! Platform services for tessera-editing fields.
//!
//! ## Usage
//!
//! Build the services once at startup and hand clones of the bundle to every
//! field.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_editing::services::FieldServices;
//! use tessera_editing_platform::{SystemClipboard, TokioTaskExecutor};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let services = FieldServices::default()
//!     .with_clipboard(Arc::new(SystemClipboard::new()))
//!     .with_executor(Arc::new(TokioTaskExecutor::current().unwrap()));
//! # let _ = services;
//! # }
//! ```
#![deny(missing_docs, clippy::unwrap_used)]

pub mod clipboard;
pub mod executor;

use std::sync::Arc;

use tessera_editing::services::FieldServices;

pub use clipboard::SystemClipboard;
pub use executor::TokioTaskExecutor;

/// Services backed by the system clipboard and, when called inside a tokio
/// runtime, a tokio executor.
pub fn platform_services() -> FieldServices {
    let services = FieldServices::default().with_clipboard(Arc::new(SystemClipboard::new()));
    match TokioTaskExecutor::current() {
        Some(executor) => services.with_executor(Arc::new(executor)),
        None => {
            tracing::warn!("no tokio runtime, caret blinking disabled");
            services
        }
    }
}
