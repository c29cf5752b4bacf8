//! Request coordinator: the start / continue / terminate contract.
//!
//! Every exchange ends in a structured [`ExecReply`] before the configured
//! ceiling. The steps are:
//!
//! 1. Wait until the published observation is final, `Done`, or
//!    `AwaitingInput`, or the deadline passes.
//! 2. `AwaitingInput` must survive a short settle window with no new output
//!    and no exit. Otherwise re-evaluate, so an exit inside the window wins.
//! 3. `Done` from the end-of-program marker waits a grace period for the
//!    reaped exit so the exit code can be reported.
//!
//! Completed sessions are removed from the store by the call that observes
//! completion.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use super::session::{Observation, Session};
use super::store::SessionStore;
use super::wait::{self, Waited};
use crate::classifier::{Classification, HeuristicClassifier, InputClassifier};
use crate::config::{GlobalConfig, TimeoutConfig};
use crate::models::exchange::{ExecReply, ExecuteRequest};
use crate::models::session::{new_session_id, ExitOutcome};
use crate::process::launcher::{Launcher, END_MARKER};
use crate::process::writer::WriteOutcome;
use crate::{AppError, Result};

/// Where an observation cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    /// Process exited and was reaped.
    Exited(ExitOutcome),
    /// Someone else terminated the session meanwhile.
    Terminated,
    /// Input-wait decision confirmed.
    AwaitingInput,
    /// Deadline passed; carries the last classification guess.
    Pending { waiting_for_input: bool },
}

/// Drives sessions on behalf of incoming requests.
pub struct Coordinator {
    store: Arc<SessionStore>,
    launcher: Launcher,
    classifier: Arc<dyn InputClassifier>,
    timeouts: TimeoutConfig,
}

impl Coordinator {
    /// Assemble a coordinator from explicit parts.
    #[must_use]
    pub fn new(
        store: Arc<SessionStore>,
        launcher: Launcher,
        classifier: Arc<dyn InputClassifier>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            store,
            launcher,
            classifier,
            timeouts,
        }
    }

    /// Assemble a coordinator with the heuristic classifier from `config`.
    #[must_use]
    pub fn from_config(config: &GlobalConfig, store: Arc<SessionStore>) -> Self {
        let classifier = HeuristicClassifier::new(&config.classifier).with_end_marker(END_MARKER);
        Self::new(
            store,
            Launcher::new(&config.interpreter),
            Arc::new(classifier),
            config.timeouts.clone(),
        )
    }

    /// Session store shared with the reaper.
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Dispatch an `execute` request to `resume` or `start`.
    ///
    /// A request naming a live session with input continues it; anything else
    /// starts `source`. A continuation for a vanished session with no source
    /// gets a soft `completed` reply.
    ///
    /// # Errors
    ///
    /// `AppError::BadRequest` when neither source nor input is present, or a
    /// start is needed without source; `AppError::LauncherUnavailable` when
    /// no interpreter can be started.
    pub async fn execute(&self, request: &ExecuteRequest) -> Result<ExecReply> {
        if request.source().is_none() && request.input.is_none() {
            return Err(AppError::BadRequest("Code or input required".into()));
        }

        if let Some((session_id, input)) = request.continuation() {
            match self.resume(session_id, input).await {
                Err(AppError::SessionNotFound(_)) => {
                    if request.source().is_none() {
                        info!(session_id, "continue for unknown session; nothing to resume");
                        return Ok(ExecReply::nothing_to_resume(session_id));
                    }
                }
                other => return other,
            }
        }

        let source = request
            .source()
            .ok_or_else(|| AppError::BadRequest("Code required to start a session".into()))?;
        self.start(source).await
    }

    /// Launch `source` and wait for its first answerable state.
    ///
    /// # Errors
    ///
    /// Returns the launcher's error; no session is created in that case.
    pub async fn start(&self, source: &str) -> Result<ExecReply> {
        let session_id = new_session_id();
        let span = info_span!("start", session_id = %session_id);

        async {
            let deadline = Instant::now() + self.timeouts.response_ceiling();
            let process = self.launcher.launch(source)?;
            let session = Session::spawn(session_id.clone(), process, Arc::clone(&self.classifier));

            if let Err(err) = self.store.put(Arc::clone(&session)).await {
                session.terminate().await;
                return Err(err);
            }
            info!(program = session.program(), "session started");

            let settled = self.settle(&session, deadline).await;
            Ok(self.reply(&session, settled).await)
        }
        .instrument(span)
        .await
    }

    /// Feed `input` to a live session and wait for its next answerable state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionNotFound` if the id is unknown or completed.
    pub async fn resume(&self, session_id: &str, input: &str) -> Result<ExecReply> {
        let span = info_span!("resume", session_id);

        async {
            let session = self.store.get(session_id).await?;
            let deadline = Instant::now() + self.timeouts.response_ceiling();

            if let Some(exit) = session.observation().exit {
                // Exited while nobody was waiting; deliver the rest.
                return Ok(self.reply(&session, Settled::Exited(exit)).await);
            }

            session.mark_input_sent();
            match session.write_input(input, deadline).await {
                Ok(WriteOutcome::Written) => {}
                Ok(WriteOutcome::TimedOut) => {
                    let queued = session.pending_input().await;
                    info!(
                        queued,
                        "input not fully accepted before deadline; tail kept for next call"
                    );
                    return Ok(self
                        .reply(
                            &session,
                            Settled::Pending {
                                waiting_for_input: false,
                            },
                        )
                        .await);
                }
                Err(err) => return Ok(self.fail_io(&session, &err).await),
            }

            let settled = self.settle(&session, deadline).await;
            Ok(self.reply(&session, settled).await)
        }
        .instrument(span)
        .await
    }

    /// Kill and remove a session. Unknown ids are a no-op.
    ///
    /// Returns whether this call removed a session.
    pub async fn terminate(&self, session_id: &str) -> bool {
        let span = info_span!("terminate", session_id);

        async {
            let Some(session) = self.store.remove(session_id).await else {
                info!("terminate for unknown session; nothing to do");
                return false;
            };
            session.terminate().await;
            true
        }
        .instrument(span)
        .await
    }

    /// Terminate every registered session.
    pub async fn shutdown(&self) -> usize {
        let sessions = self.store.drain().await;
        let count = sessions.len();
        for session in sessions {
            session.terminate().await;
        }
        info!(count, "all sessions terminated");
        count
    }

    /// Observe `session` until it settles or `deadline` passes.
    async fn settle(&self, session: &Session, deadline: Instant) -> Settled {
        let mut rx = session.subscribe();

        loop {
            let waited = wait::until(&mut rx, deadline, |o| {
                o.is_final() || o.classification != Classification::Running
            })
            .await;

            let observation = match waited {
                Waited::Ready(observation) => observation,
                Waited::Closed(observation) | Waited::TimedOut(observation) => {
                    return final_or_pending(observation);
                }
            };

            if let Some(settled) = final_state(observation) {
                return settled;
            }

            match observation.classification {
                Classification::Done => return self.await_exit(&mut rx, deadline).await,
                Classification::AwaitingInput => {
                    let revision = observation.revision;
                    let window = wait::clamp(deadline, self.timeouts.settle());
                    let quiet = wait::until(&mut rx, window, |o| {
                        o.is_final()
                            || o.revision != revision
                            || o.classification != Classification::AwaitingInput
                    })
                    .await;

                    match quiet {
                        Waited::TimedOut(_) if Instant::now() < deadline => {
                            return Settled::AwaitingInput;
                        }
                        Waited::TimedOut(observation) | Waited::Closed(observation) => {
                            return final_or_pending(observation);
                        }
                        // More output or an exit arrived; evaluate again.
                        Waited::Ready(_) => {}
                    }
                }
                Classification::Running => {}
            }
        }
    }

    /// The end-of-program marker was seen; give the exit a short grace.
    async fn await_exit(
        &self,
        rx: &mut tokio::sync::watch::Receiver<Observation>,
        deadline: Instant,
    ) -> Settled {
        let grace = wait::clamp(deadline, self.timeouts.exit_grace());
        let observation = wait::until(rx, grace, Observation::is_final)
            .await
            .into_inner();

        final_state(observation).unwrap_or_else(|| {
            warn!("end marker seen but process still running after grace period");
            Settled::Pending {
                waiting_for_input: false,
            }
        })
    }

    /// Build the reply and retire the session when it completed.
    async fn reply(&self, session: &Session, settled: Settled) -> ExecReply {
        let session_id = Some(session.id().to_owned());

        match settled {
            Settled::Exited(exit) => {
                self.retire(session).await;
                info!(exit = %exit.describe(), "session completed");
                ExecReply {
                    output: session.take_increment(),
                    session_id,
                    completed: true,
                    waiting_for_input: Some(false),
                    exit_code: exit.code,
                }
            }
            Settled::Terminated => ExecReply {
                output: session.take_increment(),
                session_id,
                completed: true,
                waiting_for_input: Some(false),
                exit_code: None,
            },
            Settled::AwaitingInput => ExecReply {
                output: session.take_increment(),
                session_id,
                completed: false,
                waiting_for_input: Some(true),
                exit_code: None,
            },
            Settled::Pending { waiting_for_input } => ExecReply {
                output: session.take_increment(),
                session_id,
                completed: false,
                waiting_for_input: Some(waiting_for_input),
                exit_code: None,
            },
        }
    }

    /// Pipe failure: finish the session with a diagnostic line.
    async fn fail_io(&self, session: &Session, err: &AppError) -> ExecReply {
        warn!(%err, "process i/o failed; completing session");
        self.retire(session).await;
        session.append_diagnostic(&format!("--- Process I/O failed: {err} ---"));

        ExecReply {
            output: session.take_increment(),
            session_id: Some(session.id().to_owned()),
            completed: true,
            waiting_for_input: Some(false),
            exit_code: session.observation().exit.and_then(|exit| exit.code),
        }
    }

    /// Remove `session` from the store and terminate it if this call removed it.
    async fn retire(&self, session: &Session) {
        if let Some(removed) = self.store.remove(session.id()).await {
            removed.terminate().await;
        }
    }
}

fn final_state(observation: Observation) -> Option<Settled> {
    if observation.terminated {
        Some(Settled::Terminated)
    } else {
        observation.exit.map(Settled::Exited)
    }
}

fn final_or_pending(observation: Observation) -> Settled {
    final_state(observation).unwrap_or(Settled::Pending {
        waiting_for_input: observation.classification == Classification::AwaitingInput,
    })
}
