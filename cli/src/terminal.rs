//! Terminal surfaces: diagnostics to stdout, progress to stderr.

use std::io::{self, Write};
use std::path::Path;

use blocwatch_watch::{Diagnostic, DiagnosticsSink, DiagnosticsStore, LogNotifier, Notifier};

/// Sink that keeps the latest diagnostics and prints every file update.
pub struct PrintingSink {
    store: DiagnosticsStore,
}

impl PrintingSink {
    pub fn new() -> Self {
        Self {
            store: DiagnosticsStore::new(),
        }
    }

    pub fn store(&self) -> &DiagnosticsStore {
        &self.store
    }
}

impl DiagnosticsSink for PrintingSink {
    fn set(&self, path: &Path, items: Vec<Diagnostic>) {
        let lines = format_update(path, &items);
        self.store.set(path, items);

        let mut out = io::stdout().lock();
        for line in lines {
            if let Err(e) = writeln!(out, "{line}") {
                tracing::debug!("stdout closed: {e}");
                return;
            }
        }
    }
}

/// One line per diagnostic, or a single "clean" line when the file has none.
fn format_update(path: &Path, items: &[Diagnostic]) -> Vec<String> {
    if items.is_empty() {
        return vec![format!("{}: clean", path.display())];
    }
    items.iter().map(|d| d.display_with_path(path)).collect()
}

/// Notifier that writes progress lines to stderr and mirrors them to the log.
pub struct TerminalNotifier {
    log: LogNotifier,
}

impl TerminalNotifier {
    pub fn new() -> Self {
        Self { log: LogNotifier }
    }
}

impl Notifier for TerminalNotifier {
    fn begin_progress(&self, title: &str) {
        self.log.begin_progress(title);
        eprintln!("{title}...");
    }

    fn end_progress(&self) {
        self.log.end_progress();
    }

    fn status(&self, message: &str) {
        self.log.status(message);
        eprintln!("{message}");
    }

    fn error(&self, message: &str) {
        self.log.error(message);
        eprintln!("error: {message}");
    }
}
