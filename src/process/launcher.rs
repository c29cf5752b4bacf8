//! Interpreter process launcher.
//!
//! Starts the program under the first interpreter candidate that can be
//! spawned, with:
//! - stdin/stdout/stderr piped.
//! - unbuffered, UTF-8 output with undecodable characters replaced.
//! - `kill_on_drop(true)` and, on unix, a dedicated process group so a kill
//!   also reaches anything the program forked.
//!
//! A candidate only counts as failed when the OS refuses to create the
//! process. An interpreter that starts and then raises is a successful launch
//! whose output contains the error.

use std::env;
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::config::InterpreterConfig;
use crate::{AppError, Result};

/// Line printed after the program body finishes, completes, or raises.
pub const END_MARKER: &str = "--- Execution completed ---";

/// Line printed when the program is interrupted.
pub const INTERRUPT_MARKER: &str = "--- Execution interrupted ---";

/// Bootstrap passed to `-c`; the user program arrives as `sys.argv[1]`.
const WRAPPER: &str = r#"import sys
for _stream in (sys.stdout, sys.stderr):
    try:
        _stream.reconfigure(encoding="utf-8", errors="replace", line_buffering=True, write_through=True)
    except Exception:
        pass
_source = sys.argv[1]
sys.argv = ["<program>"]
try:
    exec(compile(_source, "<program>", "exec"), {"__name__": "__main__"})
except KeyboardInterrupt:
    print("\n--- Execution interrupted ---")
except Exception as _err:
    print(f"Error: {type(_err).__name__}: {_err}")
finally:
    print("\n--- Execution completed ---")
    sys.stdout.flush()
    sys.stderr.flush()
"#;

/// A freshly spawned child with its three pipe endpoints detached.
#[derive(Debug)]
pub struct LaunchedProcess {
    /// Candidate that was used to start the process.
    pub program: String,
    /// Child handle; the exit monitor becomes its sole owner.
    pub child: Child,
    /// Write end of the child's stdin.
    pub stdin: ChildStdin,
    /// Read end of the child's stdout.
    pub stdout: ChildStdout,
    /// Read end of the child's stderr.
    pub stderr: ChildStderr,
}

impl LaunchedProcess {
    /// Detach the pipes of an already spawned child.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ProcessIo` if any standard stream was not piped.
    pub fn from_child(program: impl Into<String>, mut child: Child) -> Result<Self> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::ProcessIo("failed to capture child stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::ProcessIo("failed to capture child stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::ProcessIo("failed to capture child stderr".into()))?;

        Ok(Self {
            program: program.into(),
            child,
            stdin,
            stdout,
            stderr,
        })
    }
}

/// Resolves an interpreter and starts programs under it.
#[derive(Debug, Clone)]
pub struct Launcher {
    env_var: String,
    candidates: Vec<String>,
}

impl Launcher {
    /// Build a launcher from configuration.
    #[must_use]
    pub fn new(config: &InterpreterConfig) -> Self {
        Self {
            env_var: config.env_var.clone(),
            candidates: config.candidates.clone(),
        }
    }

    /// Ordered, de-duplicated candidate list for the next launch.
    ///
    /// The environment override is read on every call so it can change at
    /// runtime.
    #[must_use]
    pub fn candidates(&self) -> Vec<String> {
        let from_env = if self.env_var.is_empty() {
            None
        } else {
            env::var(&self.env_var)
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let mut ordered: Vec<String> = Vec::with_capacity(self.candidates.len() + 1);
        for candidate in from_env.into_iter().chain(self.candidates.iter().cloned()) {
            if !ordered.contains(&candidate) {
                ordered.push(candidate);
            }
        }
        ordered
    }

    /// Start `source` under the first candidate that can be spawned.
    ///
    /// # Errors
    ///
    /// Returns `AppError::LauncherUnavailable` listing every attempted
    /// candidate when none could be spawned, or `AppError::ProcessIo` if
    /// the pipes of a spawned child cannot be captured.
    pub fn launch(&self, source: &str) -> Result<LaunchedProcess> {
        let candidates = self.candidates();

        for candidate in &candidates {
            match build_command(candidate, source).spawn() {
                Ok(child) => {
                    info!(candidate, pid = child.id(), "interpreter process started");
                    return LaunchedProcess::from_child(candidate.clone(), child);
                }
                Err(err) => {
                    debug!(candidate, %err, "interpreter candidate failed to start");
                }
            }
        }

        warn!(
            attempted = candidates.len(),
            "no interpreter candidate could be started"
        );
        Err(AppError::LauncherUnavailable(candidates))
    }
}

fn build_command(program: &str, source: &str) -> Command {
    let mut cmd = Command::new(program);
    cmd.arg("-u")
        .arg("-c")
        .arg(WRAPPER)
        .arg(source)
        .env("PYTHONUNBUFFERED", "1")
        .env("PYTHONIOENCODING", "utf-8")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}
