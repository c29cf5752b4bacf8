//! Bounded stdin writer.
//!
//! A child that is not reading can leave its stdin pipe full, so every write
//! races a deadline and the session's kill token. Nothing here blocks the
//! caller past the deadline.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{AppError, Result};

/// How a bounded write ended without a pipe error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Every queued byte reached the pipe.
    Written,
    /// The deadline passed first; the unwritten tail stays queued.
    TimedOut,
}

/// Queue `text` plus a line terminator behind any earlier unwritten tail in
/// `pending`, then write the queue to `stdin`.
///
/// Bytes leave `pending` only once the pipe has accepted them, so a timed-out
/// line is completed by the next call before the next line starts.
///
/// # Errors
///
/// Returns `AppError::ProcessIo` when the pipe is broken or closed, or when
/// `cancel` fires before the write completes.
pub async fn write_line<W>(
    session_id: &str,
    stdin: &mut W,
    pending: &mut BytesMut,
    text: &str,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<WriteOutcome>
where
    W: AsyncWrite + Unpin,
{
    if !pending.is_empty() {
        debug!(session_id, bytes = pending.len(), "flushing unwritten input tail");
    }
    pending.reserve(text.len() + 1);
    pending.extend_from_slice(text.as_bytes());
    pending.extend_from_slice(b"\n");

    let write = async {
        while !pending.is_empty() {
            // `write` is cancel-safe: a dropped call has accepted nothing.
            let written = stdin.write(&pending[..]).await?;
            if written == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero));
            }
            pending.advance(written);
        }
        stdin.flush().await
    };

    tokio::select! {
        biased;

        () = cancel.cancelled() => Err(AppError::ProcessIo("session terminated".into())),

        result = tokio::time::timeout_at(deadline, write) => match result {
            Ok(Ok(())) => Ok(WriteOutcome::Written),
            Ok(Err(err)) => {
                warn!(session_id, %err, "write to stdin failed");
                Err(AppError::ProcessIo(format!("write failed: {err}")))
            }
            Err(_elapsed) => {
                warn!(session_id, queued = pending.len(), "write to stdin timed out");
                Ok(WriteOutcome::TimedOut)
            }
        },
    }
}
