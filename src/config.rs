//! Global configuration parsing and validation.
//!
//! Every field carries a serde default, so an empty document (or no file at
//! all) yields a usable configuration.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Interpreter resolution settings for the process launcher.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct InterpreterConfig {
    /// Environment variable consulted before the candidate list.
    #[serde(default = "default_env_var")]
    pub env_var: String,
    /// Ordered interpreter invocations tried after the environment override.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            env_var: default_env_var(),
            candidates: default_candidates(),
        }
    }
}

fn default_env_var() -> String {
    "PYTHON_PATH".into()
}

fn default_candidates() -> Vec<String> {
    let mut candidates: Vec<String> = vec!["python3".into(), "python".into(), "py".into()];

    #[cfg(unix)]
    candidates.extend(
        [
            "/usr/bin/python3",
            "/usr/local/bin/python3",
            "/opt/homebrew/bin/python3",
        ]
        .map(String::from),
    );

    #[cfg(windows)]
    candidates.extend(
        [
            r"C:\Python\python.exe",
            r"C:\Python39\python.exe",
            r"C:\Python310\python.exe",
            r"C:\Python311\python.exe",
            r"C:\Python312\python.exe",
        ]
        .map(String::from),
    );

    candidates
}

/// Wait bounds (milliseconds) applied by the request coordinator.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Ceiling for a single start/continue exchange.
    #[serde(default = "default_response_ceiling_ms")]
    pub response_ceiling_ms: u64,
    /// Quiet window confirming an input-wait decision.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Wait for the exit status after the end-of-program marker.
    #[serde(default = "default_exit_grace_ms")]
    pub exit_grace_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            response_ceiling_ms: default_response_ceiling_ms(),
            settle_ms: default_settle_ms(),
            exit_grace_ms: default_exit_grace_ms(),
        }
    }
}

impl TimeoutConfig {
    /// Per-request wait ceiling.
    #[must_use]
    pub fn response_ceiling(&self) -> Duration {
        Duration::from_millis(self.response_ceiling_ms)
    }

    /// Input-wait confirmation window.
    #[must_use]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Exit-status grace period after the end-of-program marker.
    #[must_use]
    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.exit_grace_ms)
    }
}

fn default_response_ceiling_ms() -> u64 {
    8000
}

fn default_settle_ms() -> u64 {
    150
}

fn default_exit_grace_ms() -> u64 {
    1000
}

/// Age-based eviction settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ReaperConfig {
    /// Seconds between sweeps.
    #[serde(default = "default_reaper_interval")]
    pub interval_seconds: u64,
    /// Sessions older than this are killed regardless of state.
    #[serde(default = "default_max_age")]
    pub max_age_seconds: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_reaper_interval(),
            max_age_seconds: default_max_age(),
        }
    }
}

impl ReaperConfig {
    /// Sweep interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Maximum session lifetime.
    #[must_use]
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }
}

fn default_reaper_interval() -> u64 {
    60
}

fn default_max_age() -> u64 {
    300
}

/// Tuning for the heuristic output classifier.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClassifierConfig {
    /// Substrings that mark a chunk as a prompt.
    #[serde(default = "default_prompt_markers")]
    pub prompt_markers: Vec<String>,
    /// Enable the numbered-menu rule.
    #[serde(default = "default_true")]
    pub menu_detection: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            prompt_markers: default_prompt_markers(),
            menu_detection: true,
        }
    }
}

fn default_prompt_markers() -> Vec<String> {
    ["?", "How many", "Enter", "What is", "Input", "Choose", "Select"]
        .map(String::from)
        .to_vec()
}

fn default_true() -> bool {
    true
}

fn default_http_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_http_port() -> u16 {
    3000
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_http_host")]
    pub http_host: IpAddr,
    /// HTTP port; 0 lets the OS pick one.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Interpreter resolution.
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    /// Per-request wait bounds.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Age-based eviction.
    #[serde(default)]
    pub reaper: ReaperConfig,
    /// Classifier tuning.
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            http_host: default_http_host(),
            http_port: default_http_port(),
            interpreter: InterpreterConfig::default(),
            timeouts: TimeoutConfig::default(),
            reaper: ReaperConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Socket address for the HTTP listener.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http_host, self.http_port)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.timeouts.response_ceiling_ms == 0 {
            return Err(AppError::Config(
                "response_ceiling_ms must be greater than zero".into(),
            ));
        }

        if self.timeouts.settle_ms >= self.timeouts.response_ceiling_ms {
            return Err(AppError::Config(
                "settle_ms must be smaller than response_ceiling_ms".into(),
            ));
        }

        if self.reaper.interval_seconds == 0 || self.reaper.max_age_seconds == 0 {
            return Err(AppError::Config(
                "reaper interval and max age must be greater than zero".into(),
            ));
        }

        if self.interpreter.candidates.is_empty() && self.interpreter.env_var.trim().is_empty() {
            return Err(AppError::Config(
                "interpreter needs at least one candidate or an env_var".into(),
            ));
        }

        Ok(())
    }
}
