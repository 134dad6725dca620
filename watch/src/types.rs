//! Public types shared between the watcher and its host.
//!
//! The host constructs an [`AnalyzerConfig`], receives [`Diagnostic`]s through
//! a [`crate::DiagnosticsSink`], and reads [`DiagnosticsSnapshot`]s for
//! display.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

fn default_name() -> String {
    String::from("bloc analyzer")
}

fn default_command() -> String {
    String::from("dart")
}

fn default_watch_flag() -> String {
    String::from("--watch")
}

/// Configuration for the external watch-mode analyzer.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    /// Display name, used as the progress title and diagnostic source.
    #[serde(default = "default_name")]
    pub name: String,
    /// Executable command (e.g. "dart"). Resolved via `PATH`.
    #[serde(default = "default_command")]
    pub command: String,
    /// Analyzer entrypoint passed as the first argument.
    #[serde(default)]
    pub entrypoint: Option<PathBuf>,
    /// Flag that puts the analyzer into watch mode.
    #[serde(default = "default_watch_flag")]
    pub watch_flag: String,
    /// Extra arguments appended after the watch flag.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the analyzer process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            command: default_command(),
            entrypoint: None,
            watch_flag: default_watch_flag(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }
}

impl AnalyzerConfig {
    /// Full argument list for a watch over `root`:
    /// `[entrypoint, root, watch_flag, args...]`.
    ///
    /// Returns `None` when no entrypoint is configured.
    #[must_use]
    pub fn watch_args(&self, root: &Path) -> Option<Vec<String>> {
        let entrypoint = self.entrypoint.as_ref()?;
        let mut out = Vec::with_capacity(3 + self.args.len());
        out.push(entrypoint.display().to_string());
        out.push(root.display().to_string());
        out.push(self.watch_flag.clone());
        out.extend(self.args.iter().cloned());
        Some(out)
    }
}

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl DiagnosticSeverity {
    /// Map the analyzer's integer severity code.
    ///
    /// `1 → Warning`, `2 → Information`, `3 → Hint`; every other value,
    /// including 0 and negatives, is an error.
    #[must_use]
    pub fn from_analyzer(code: i64) -> Self {
        match code {
            1 => Self::Warning,
            2 => Self::Information,
            3 => Self::Hint,
            _ => Self::Error,
        }
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "info",
            Self::Hint => "hint",
        }
    }
}

/// A 0-indexed `(line, character)` location in a document.
///
/// `character` counts UTF-16 code units from the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open span between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// A single published diagnostic.
///
/// Fields are private; external consumers read via accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    range: Range,
    message: String,
    severity: DiagnosticSeverity,
    /// Analyzer name this diagnostic came from.
    source: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        range: Range,
        message: String,
        severity: DiagnosticSeverity,
        source: String,
    ) -> Self {
        Self {
            range,
            message,
            severity,
            source,
        }
    }

    #[must_use]
    pub fn range(&self) -> Range {
        self.range
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Format as `path:line:col: severity: [source] message` (1-indexed for display).
    #[must_use]
    pub fn display_with_path(&self, path: &Path) -> String {
        format!(
            "{}:{}:{}: {}: [{}] {}",
            path.display(),
            self.range.start.line + 1,
            self.range.start.character + 1,
            self.severity.label(),
            self.source,
            self.message,
        )
    }
}

/// Why a watch session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The analyzer closed its output and exited.
    Exited(Option<i32>),
    /// Reading the analyzer's output failed.
    Failed(String),
    /// The host shut the session down.
    Shutdown,
}

impl StopReason {
    pub(crate) fn from_status(status: Option<ExitStatus>) -> Self {
        Self::Exited(status.and_then(|s| s.code()))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(Some(code)) => write!(f, "exited with status {code}"),
            Self::Exited(None) => f.write_str("exited"),
            Self::Failed(msg) => write!(f, "failed: {msg}"),
            Self::Shutdown => f.write_str("shut down"),
        }
    }
}

/// State of the relationship with the analyzer process.
///
/// `started` flips once the process is spawned; `first_output_received`
/// flips exactly once, on the first decoded output. Neither ever flips back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    started: bool,
    first_output_received: bool,
    stopped: Option<StopReason>,
}

impl SessionState {
    /// Whether the analyzer process has been spawned.
    #[must_use]
    pub fn started(&self) -> bool {
        self.started
    }

    /// Whether the readiness signal has fired.
    #[must_use]
    pub fn first_output_received(&self) -> bool {
        self.first_output_received
    }

    /// Why the session stopped, once it has.
    #[must_use]
    pub fn stopped(&self) -> Option<&StopReason> {
        self.stopped.as_ref()
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    /// Returns `true` only for the call that flips the flag.
    pub(crate) fn mark_first_output(&mut self) -> bool {
        !mem::replace(&mut self.first_output_received, true)
    }

    pub(crate) fn mark_stopped(&mut self, reason: StopReason) {
        if self.stopped.is_none() {
            self.stopped = Some(reason);
        }
    }
}

/// Immutable snapshot of all diagnostics, suitable for UI rendering.
///
/// Counts are computed from `files`; nothing is cached.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSnapshot {
    /// Per-file diagnostics, sorted with error-containing files first.
    files: Vec<(PathBuf, Vec<Diagnostic>)>,
}

impl DiagnosticsSnapshot {
    pub(crate) fn new(files: Vec<(PathBuf, Vec<Diagnostic>)>) -> Self {
        Self { files }
    }

    /// Per-file diagnostics, sorted with error-containing files first.
    #[must_use]
    pub fn files(&self) -> &[(PathBuf, Vec<Diagnostic>)] {
        &self.files
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Diagnostics for one file, if any.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&[Diagnostic]> {
        self.files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, items)| items.as_slice())
    }

    fn count_by_severity(&self, severity: DiagnosticSeverity) -> usize {
        self.files
            .iter()
            .flat_map(|(_, items)| items)
            .filter(|d| d.severity() == severity)
            .count()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count_by_severity(DiagnosticSeverity::Error)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count_by_severity(DiagnosticSeverity::Warning)
    }

    #[must_use]
    pub fn info_count(&self) -> usize {
        self.count_by_severity(DiagnosticSeverity::Information)
    }

    #[must_use]
    pub fn hint_count(&self) -> usize {
        self.count_by_severity(DiagnosticSeverity::Hint)
    }

    /// Total diagnostic count across all files.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.files.iter().map(|(_, items)| items.len()).sum()
    }

    /// Compact status string like "E:3 W:5".
    #[must_use]
    pub fn status_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("E:{} W:{}", self.error_count(), self.warning_count())
    }
}
