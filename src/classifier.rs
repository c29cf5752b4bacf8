//! Output classifier: infers whether a child is blocked on stdin.
//!
//! A parent cannot observe that its child is blocked reading a pipe, so
//! [`HeuristicClassifier`] guesses from output alone. Wrong guesses are
//! expected and bounded by the coordinator's wait ceiling. The coordinator
//! only depends on the [`InputClassifier`] trait, so the rules can be tuned or
//! replaced without touching it.
//!
//! Rules, in precedence order:
//!
//! | Rule | Result |
//! |------|--------|
//! | process exited, or the end-of-program marker appeared | `Done` |
//! | newest chunk contains a prompt marker | `AwaitingInput` |
//! | newest chunk stops mid-line with visible content | `AwaitingInput` |
//! | transcript ends with a numbered menu followed by a newline | `AwaitingInput` |
//! | otherwise | `Running` |

use std::sync::OnceLock;

use regex::Regex;

use crate::config::ClassifierConfig;

/// Decision reached for the current output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Still computing, or nothing conclusive yet.
    Running,
    /// Probably blocked on a read from stdin.
    AwaitingInput,
    /// Finished; exit is authoritative and wins over everything else.
    Done,
}

/// Output observed at one evaluation point.
#[derive(Debug, Clone, Copy)]
pub struct OutputView<'a> {
    /// Entire transcript so far, including `chunk`.
    pub transcript: &'a str,
    /// Most recent chunk.
    pub chunk: &'a str,
    /// Whether the process exit has already been observed.
    pub exited: bool,
}

/// Pluggable decision function over observed output.
pub trait InputClassifier: Send + Sync {
    /// Classify the current output. Must be pure and cheap.
    fn classify(&self, view: &OutputView<'_>) -> Classification;
}

/// Number of trailing transcript lines inspected by the menu rule.
const MENU_WINDOW_LINES: usize = 12;

/// Bytes of transcript tail inspected by the menu rule.
const MENU_WINDOW_BYTES: usize = 2048;

#[allow(clippy::expect_used)] // Literal pattern, exercised by the tests below.
fn menu_item() -> &'static Regex {
    static MENU_ITEM: OnceLock<Regex> = OnceLock::new();
    MENU_ITEM.get_or_init(|| {
        Regex::new(r"^\s*\(?\d{1,2}\s*[.):\]-]\s+\S").expect("menu item pattern is valid")
    })
}

/// Prompt markers, trailing-newline, and numbered-menu rules.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    prompt_markers: Vec<String>,
    menu_detection: bool,
    end_marker: Option<String>,
}

impl HeuristicClassifier {
    /// Build from configuration; no end-of-program marker is set.
    #[must_use]
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            prompt_markers: config
                .prompt_markers
                .iter()
                .filter(|m| !m.is_empty())
                .cloned()
                .collect(),
            menu_detection: config.menu_detection,
            end_marker: None,
        }
    }

    /// Treat a transcript containing `marker` as finished.
    #[must_use]
    pub fn with_end_marker(mut self, marker: impl Into<String>) -> Self {
        self.end_marker = Some(marker.into());
        self
    }

    fn saw_end_marker(&self, view: &OutputView<'_>) -> bool {
        let Some(marker) = self.end_marker.as_deref() else {
            return false;
        };
        // The marker may straddle the previous chunk boundary.
        tail(view.transcript, view.chunk.len() + marker.len()).contains(marker)
    }

    fn has_prompt_marker(&self, chunk: &str) -> bool {
        self.prompt_markers
            .iter()
            .any(|marker| chunk.contains(marker.as_str()))
    }
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl InputClassifier for HeuristicClassifier {
    fn classify(&self, view: &OutputView<'_>) -> Classification {
        if view.exited || self.saw_end_marker(view) {
            return Classification::Done;
        }

        if self.has_prompt_marker(view.chunk) || stops_mid_line(view.chunk) {
            return Classification::AwaitingInput;
        }

        if self.menu_detection && ends_with_menu(view.transcript) {
            return Classification::AwaitingInput;
        }

        Classification::Running
    }
}

/// The writer stopped mid-line: visible content and no trailing newline.
#[must_use]
pub fn stops_mid_line(chunk: &str) -> bool {
    !chunk.ends_with('\n') && !chunk.trim().is_empty()
}

/// The transcript ends with at least two numbered menu lines and the cursor
/// sits on the blank line below them.
#[must_use]
pub fn ends_with_menu(transcript: &str) -> bool {
    let Some(body) = transcript.strip_suffix('\n') else {
        return false;
    };
    let body = body.strip_suffix('\r').unwrap_or(body);

    let window = tail(body, MENU_WINDOW_BYTES);
    let menu_lines = window
        .lines()
        .rev()
        .take(MENU_WINDOW_LINES)
        .take_while(|line| menu_item().is_match(line))
        .count();

    menu_lines >= 2
}

/// Last `max_bytes` of `s`, widened to a char boundary.
fn tail(s: &str, max_bytes: usize) -> &str {
    let mut start = s.len().saturating_sub(max_bytes);
    while !s.is_char_boundary(start) {
        start -= 1;
    }
    &s[start..]
}
