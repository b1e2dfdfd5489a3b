//! Error taxonomy for recording and rendering.
//!
//! Every failure mode maps onto a process exit code, so the CLI can report
//! a single error line and exit with the documented status.

use std::io;
use std::path::PathBuf;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading casts, parsing templates, driving the
/// emulator or writing output.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The cast file is malformed or uses an unsupported version.
    #[error("invalid cast: {0}")]
    InvalidCast(String),

    /// The template is missing a named slot, has duplicate slots, or carries
    /// bad geometry or an unknown animation type.
    #[error("invalid template: {0}")]
    TemplateInvalid(String),

    /// The cast contains no output events, so there is nothing to render.
    #[error("cast contains no output events")]
    EmptyCast,

    /// An I/O operation on a named file failed.
    #[error("{}: {source}", path.display())]
    File {
        /// The file the operation was addressing.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// An I/O operation on a stream (stdin, stdout, PTY) failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The pseudo-terminal layer failed while recording.
    #[error("PTY error: {0}")]
    Pty(String),

    /// SVG serialisation failed.
    #[error("SVG output failed: {0}")]
    Svg(String),

    /// The emulator's reported screen state diverged from the session
    /// geometry. There is no local recovery: a corrupt screen poisons every
    /// subsequent frame.
    #[error("emulator state diverged: {0}")]
    EmulatorOverflow(String),
}

impl Error {
    /// Process exit code for this error.
    ///
    /// `1` is reserved for usage errors (produced by argument parsing, not by
    /// this enum) and `130` for interruption by SIGINT.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidCast(_) | Error::TemplateInvalid(_) | Error::EmptyCast => 2,
            Error::File { .. }
            | Error::Io(_)
            | Error::Pty(_)
            | Error::Svg(_)
            | Error::EmulatorOverflow(_) => 3,
        }
    }
}
