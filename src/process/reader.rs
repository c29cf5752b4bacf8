//! Output stream listener task.
//!
//! Drives a [`FramedRead`] with [`LossyUtf8Codec`] over one pipe and forwards
//! each decoded chunk as [`ProcessEvent::Output`]. EOF, an I/O error, or
//! cancellation ends the task with a single [`ProcessEvent::StreamClosed`].

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::codec::LossyUtf8Codec;
use super::{OutputStream, ProcessEvent};

/// Read `pipe` until EOF, emitting output events through `event_tx`.
pub async fn run_reader<R>(
    session_id: String,
    stream: OutputStream,
    pipe: R,
    event_tx: mpsc::Sender<ProcessEvent>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(pipe, LossyUtf8Codec::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(session_id, stream = stream.as_str(), "reader: cancellation received");
                break;
            }

            item = framed.next() => {
                match item {
                    None => {
                        debug!(session_id, stream = stream.as_str(), "reader: EOF");
                        break;
                    }
                    Some(Err(err)) => {
                        warn!(session_id, stream = stream.as_str(), %err, "reader: pipe error, stopping");
                        break;
                    }
                    Some(Ok(text)) => {
                        debug!(session_id, stream = stream.as_str(), bytes = text.len(), "reader: chunk");
                        if event_tx.send(ProcessEvent::Output { stream, text }).await.is_err() {
                            debug!(session_id, "reader: event channel closed, stopping");
                            return;
                        }
                    }
                }
            }
        }
    }

    if event_tx
        .send(ProcessEvent::StreamClosed { stream })
        .await
        .is_err()
    {
        debug!(session_id, "reader: event channel closed before close event");
    }
}
