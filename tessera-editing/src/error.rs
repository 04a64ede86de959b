//! Errors reported at the crate boundary.
//!
//! Out-of-range offsets, hit tests past the text and empty history are not
//! errors; they are clamped or ignored where they happen.

use thiserror::Error;

/// Failures a caller can observe.
#[derive(Debug, Error)]
pub enum EditingError {
    /// A filter or character-class pattern failed to compile.
    #[error("invalid input filter pattern `{pattern}`")]
    InvalidFilter {
        /// The offending pattern.
        pattern: String,
        /// Compiler diagnostics.
        #[source]
        source: regex::Error,
    },
    /// A persisted restore record could not be parsed.
    #[error("malformed restore record")]
    RestoreState(#[from] serde_json::Error),
    /// The host surface was dropped before the field could attach to it.
    #[error("host surface is no longer alive")]
    HostUnavailable,
    /// The field is already attached to a host surface.
    #[error("field is already attached to a host surface")]
    AlreadyAttached,
}
