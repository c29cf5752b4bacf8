//! Child process plumbing.
//!
//! - `launcher`: interpreter resolution and spawning with piped stdio.
//! - `codec`: lossy UTF-8 chunk framing for output pipes.
//! - `reader`: one listener task per output stream emitting [`ProcessEvent`]s.
//! - `monitor`: owns the child, reports its exit, and kills it on request.
//! - `writer`: bounded, cancellable writes to the child's stdin.

pub mod codec;
pub mod launcher;
pub mod monitor;
pub mod reader;
pub mod writer;

use crate::models::session::ExitOutcome;

/// Which output pipe a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// Child stdout.
    Stdout,
    /// Child stderr.
    Stderr,
}

impl OutputStream {
    /// Short name used in log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Events produced by the listener and monitor tasks of one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Decoded text read from one of the output pipes.
    Output {
        /// Originating pipe.
        stream: OutputStream,
        /// Decoded chunk, in production order for that pipe.
        text: String,
    },
    /// An output pipe reached EOF or failed.
    StreamClosed {
        /// The pipe that closed.
        stream: OutputStream,
    },
    /// The child exited and has been reaped.
    Exited(ExitOutcome),
}
