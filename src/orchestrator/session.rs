//! Live bridged session: one child process, its transcript, and its state.
//!
//! [`Session::spawn`] takes ownership of a launched process and starts:
//! - one reader task per output pipe,
//! - the exit monitor (sole owner of the child handle),
//! - a pump task that appends chunks to the transcript in arrival order,
//!   re-runs the classifier after every chunk, and publishes an
//!   [`Observation`] through a `watch` channel.
//!
//! Waiters never poll; they subscribe to the observation channel.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio::process::ChildStdin;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::classifier::{Classification, InputClassifier, OutputView};
use crate::models::session::{ExitOutcome, SessionState};
use crate::process::launcher::LaunchedProcess;
use crate::process::writer::{self, WriteOutcome};
use crate::process::{monitor, reader, OutputStream, ProcessEvent};
use crate::{AppError, Result};

/// Capacity of the per-session process event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How long output may keep draining after the exit was reaped.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How long `terminate` waits for the kill to be reaped.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Snapshot of what the pump has observed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Incremented for every appended chunk.
    pub revision: u64,
    /// Latest classifier decision.
    pub classification: Classification,
    /// Set once the child is reaped and its pipes are drained.
    pub exit: Option<ExitOutcome>,
    /// Set once the session has been terminated and left the store.
    pub terminated: bool,
}

impl Observation {
    fn initial() -> Self {
        Self {
            revision: 0,
            classification: Classification::Running,
            exit: None,
            terminated: false,
        }
    }

    /// Exit recorded or session terminated.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.terminated || self.exit.is_some()
    }
}

/// Write end of the child's stdin plus bytes it has not accepted yet.
#[derive(Debug)]
struct StdinPipe {
    pipe: ChildStdin,
    pending: BytesMut,
}

#[derive(Debug, Default)]
struct Transcript {
    text: String,
    delivered: usize,
}

/// A child process bridged across requests.
pub struct Session {
    id: String,
    program: String,
    pid: Option<u32>,
    created_at: DateTime<Utc>,
    started: Instant,
    transcript: StdMutex<Transcript>,
    progress: watch::Sender<Observation>,
    stdin: Mutex<Option<StdinPipe>>,
    kill: CancellationToken,
    classifier: Arc<dyn InputClassifier>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("program", &self.program)
            .field("pid", &self.pid)
            .field("created_at", &self.created_at)
            .field("observation", &*self.progress.borrow())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Take ownership of `process` and start its listener, monitor, and
    /// pump tasks.
    #[must_use]
    pub fn spawn(
        id: String,
        process: LaunchedProcess,
        classifier: Arc<dyn InputClassifier>,
    ) -> Arc<Self> {
        let LaunchedProcess {
            program,
            child,
            stdin,
            stdout,
            stderr,
        } = process;

        let (progress, _) = watch::channel(Observation::initial());
        let session = Arc::new(Self {
            id: id.clone(),
            program,
            pid: child.id(),
            created_at: Utc::now(),
            started: Instant::now(),
            transcript: StdMutex::new(Transcript::default()),
            progress,
            stdin: Mutex::new(Some(StdinPipe {
                pipe: stdin,
                pending: BytesMut::new(),
            })),
            kill: CancellationToken::new(),
            classifier,
        });

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let span = info_span!("session", session_id = %id);

        tokio::spawn(
            reader::run_reader(
                id.clone(),
                OutputStream::Stdout,
                stdout,
                event_tx.clone(),
                session.kill.child_token(),
            )
            .instrument(span.clone()),
        );
        tokio::spawn(
            reader::run_reader(
                id.clone(),
                OutputStream::Stderr,
                stderr,
                event_tx.clone(),
                session.kill.child_token(),
            )
            .instrument(span.clone()),
        );
        drop(monitor::monitor_exit(
            id,
            child,
            event_tx,
            session.kill.clone(),
        ));
        tokio::spawn(Arc::clone(&session).pump(event_rx).instrument(span));

        session
    }

    /// Opaque session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Interpreter candidate the process was started with.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// OS process id at spawn time.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wall-clock creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since creation, on the runtime clock.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        let observation = self.observation();
        if observation.terminated {
            SessionState::Terminated
        } else if observation.classification == Classification::AwaitingInput {
            SessionState::AwaitingInput
        } else {
            SessionState::Running
        }
    }

    /// Latest observation.
    #[must_use]
    pub fn observation(&self) -> Observation {
        *self.progress.borrow()
    }

    /// Receiver that wakes on every observation change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Observation> {
        self.progress.subscribe()
    }

    /// Full transcript so far.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.lock_transcript().text.clone()
    }

    /// Text produced since the last delivery, advancing the cursor.
    #[must_use]
    pub fn take_increment(&self) -> String {
        let mut transcript = self.lock_transcript();
        let increment = transcript.text[transcript.delivered..].to_owned();
        transcript.delivered = transcript.text.len();
        increment
    }

    /// Append a bridge-generated diagnostic line to the transcript.
    pub fn append_diagnostic(&self, line: &str) {
        let mut transcript = self.lock_transcript();
        if !transcript.text.is_empty() && !transcript.text.ends_with('\n') {
            transcript.text.push('\n');
        }
        transcript.text.push_str(line);
        transcript.text.push('\n');
    }

    /// Input bytes queued behind a timed-out write.
    pub async fn pending_input(&self) -> usize {
        self.stdin
            .lock()
            .await
            .as_ref()
            .map_or(0, |stdin| stdin.pending.len())
    }

    /// Forget a stale input-wait decision before new input is written.
    pub fn mark_input_sent(&self) {
        self.progress.send_if_modified(|observation| {
            if observation.classification == Classification::AwaitingInput {
                observation.classification = Classification::Running;
                true
            } else {
                false
            }
        });
    }

    /// Write one line of input, bounded by `deadline`.
    ///
    /// A line cut short by an earlier deadline is finished first, so the
    /// child always sees whole lines in order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ProcessIo` when the session is terminated, stdin is
    /// already closed, or the pipe is broken.
    pub async fn write_input(&self, text: &str, deadline: Instant) -> Result<WriteOutcome> {
        if self.kill.is_cancelled() {
            return Err(AppError::ProcessIo("session terminated".into()));
        }

        let mut guard = self.stdin.lock().await;
        let Some(stdin) = guard.as_mut() else {
            return Err(AppError::ProcessIo("stdin already closed".into()));
        };

        let outcome = writer::write_line(
            &self.id,
            &mut stdin.pipe,
            &mut stdin.pending,
            text,
            deadline,
            &self.kill,
        )
        .await;
        if outcome.is_err() {
            // A broken pipe stays broken.
            guard.take();
        }
        outcome
    }

    /// Kill the process (if still running) and mark the session terminated.
    ///
    /// Only the caller that removed the session from the store should call
    /// this. Waits briefly for the kill to be reaped; safe to repeat.
    pub async fn terminate(&self) {
        self.kill.cancel();
        self.progress.send_if_modified(|observation| {
            let changed = !observation.terminated;
            observation.terminated = true;
            changed
        });

        let mut rx = self.subscribe();
        if tokio::time::timeout(KILL_GRACE, rx.wait_for(|o| o.exit.is_some()))
            .await
            .is_err()
        {
            warn!(session_id = %self.id, "process not reaped within kill grace period");
        }

        if let Ok(mut stdin) = self.stdin.try_lock() {
            stdin.take();
        }
        info!(session_id = %self.id, "session terminated");
    }

    fn lock_transcript(&self) -> std::sync::MutexGuard<'_, Transcript> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn append_output(&self, chunk: &str) {
        let classification = {
            let mut transcript = self.lock_transcript();
            transcript.text.push_str(chunk);
            self.classifier.classify(&OutputView {
                transcript: &transcript.text,
                chunk,
                exited: false,
            })
        };

        self.progress.send_modify(|observation| {
            observation.revision += 1;
            if observation.classification != Classification::Done {
                observation.classification = classification;
            }
        });
    }

    fn record_exit(&self, outcome: ExitOutcome) {
        self.progress.send_modify(|observation| {
            observation.exit = Some(outcome);
            observation.classification = Classification::Done;
        });
    }

    /// Serialise process events into the transcript.
    async fn pump(self: Arc<Self>, mut events: mpsc::Receiver<ProcessEvent>) {
        let mut open_streams = 2_u8;
        let mut exit: Option<ExitOutcome> = None;

        loop {
            let event = if exit.is_some() {
                match tokio::time::timeout(DRAIN_GRACE, events.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        debug!(session_id = %self.id, "pipes still open after exit; stop draining");
                        break;
                    }
                }
            } else {
                events.recv().await
            };

            match event {
                None => break,
                Some(ProcessEvent::Output { text, .. }) => self.append_output(&text),
                Some(ProcessEvent::StreamClosed { stream }) => {
                    debug!(session_id = %self.id, stream = stream.as_str(), "stream closed");
                    open_streams = open_streams.saturating_sub(1);
                    if open_streams == 0 && exit.is_some() {
                        break;
                    }
                }
                Some(ProcessEvent::Exited(outcome)) => {
                    exit = Some(outcome);
                    if open_streams == 0 {
                        break;
                    }
                }
            }
        }

        self.record_exit(exit.unwrap_or(ExitOutcome { code: None }));
    }
}
