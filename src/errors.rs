//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// No interpreter candidate could be started; carries every attempt.
    LauncherUnavailable(Vec<String>),
    /// A session id is unknown, expired, or already completed.
    SessionNotFound(String),
    /// A session id is already registered in the store.
    SessionExists(String),
    /// Pipe read/write failure while talking to a child process.
    ProcessIo(String),
    /// The request body is missing required fields or is malformed.
    BadRequest(String),
    /// HTTP listener or transport failure.
    Http(String),
    /// File-system or other I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::LauncherUnavailable(attempted) => write!(
                f,
                "launcher unavailable: tried {}",
                if attempted.is_empty() {
                    "no candidates".to_owned()
                } else {
                    attempted.join(", ")
                }
            ),
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::SessionExists(id) => write!(f, "session exists: {id}"),
            Self::ProcessIo(msg) => write!(f, "process io: {msg}"),
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Self::Http(msg) => write!(f, "http: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
