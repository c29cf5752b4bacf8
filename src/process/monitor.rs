//! Exit monitor: the sole owner of a child process handle.
//!
//! Waits for the child to exit on its own, or kills it when `kill` fires,
//! and reports the reaped exit exactly once as [`ProcessEvent::Exited`].
//! The child's process group is signalled whenever the child ends, so
//! anything it forked goes with it. Once the child has been reaped the task
//! is gone, so a late kill request can never signal a recycled pid.

use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ProcessEvent;
use crate::models::session::ExitOutcome;

/// Spawn the monitor task for `child`.
#[must_use]
pub fn monitor_exit(
    session_id: String,
    mut child: Child,
    event_tx: mpsc::Sender<ProcessEvent>,
    kill: CancellationToken,
) -> JoinHandle<()> {
    let pgid = child.id();
    tokio::spawn(async move {
        let status = tokio::select! {
            result = child.wait() => {
                // Anything the program forked must not outlive it.
                kill_process_group(&session_id, pgid);
                result
            }
            () = kill.cancelled() => {
                info!(session_id, "killing child process");
                kill_process_group(&session_id, pgid);
                if let Err(err) = child.start_kill() {
                    debug!(session_id, %err, "start_kill failed; child likely already gone");
                }
                child.wait().await
            }
        };

        let outcome = match status {
            Ok(status) => ExitOutcome {
                code: status.code(),
            },
            Err(err) => {
                warn!(session_id, %err, "error waiting for child process");
                ExitOutcome { code: None }
            }
        };
        info!(session_id, exit = %outcome.describe(), "child process reaped");

        if event_tx.send(ProcessEvent::Exited(outcome)).await.is_err() {
            debug!(session_id, "monitor: event channel closed before exit could be delivered");
        }
    })
}

/// Signal the child's whole process group.
#[cfg(unix)]
fn kill_process_group(session_id: &str, pgid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pgid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    // ESRCH just means the group is already empty.
    if let Err(err) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        debug!(session_id, %err, "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_session_id: &str, _pgid: Option<u32>) {}
