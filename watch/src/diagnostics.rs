//! Diagnostics sink: where published per-file diagnostics land.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::{Diagnostic, DiagnosticsSnapshot};

/// Editor-side collection of diagnostics keyed by file.
///
/// `set` replaces everything previously stored for `path`; it never merges.
/// Implementations must be safe to call concurrently for different files.
pub trait DiagnosticsSink: Send + Sync {
    fn set(&self, path: &Path, items: Vec<Diagnostic>);
}

/// In-memory sink that keeps the latest diagnostics for every file.
#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    data: Mutex<HashMap<PathBuf, Vec<Diagnostic>>>,
}

impl DiagnosticsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Vec<Diagnostic>>> {
        // A panicking reader cannot leave the map half-updated; every write
        // is a single insert or remove.
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current diagnostics for one file.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Vec<Diagnostic>> {
        self.lock().get(path).cloned()
    }

    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let mut files: Vec<(PathBuf, Vec<Diagnostic>)> = self
            .lock()
            .iter()
            .map(|(path, items)| (path.clone(), items.clone()))
            .collect();

        // Sort: files with errors first, then alphabetically
        files.sort_by(|a, b| {
            let a_has_errors = a.1.iter().any(|d| d.severity().is_error());
            let b_has_errors = b.1.iter().any(|d| d.severity().is_error());
            b_has_errors.cmp(&a_has_errors).then_with(|| a.0.cmp(&b.0))
        });

        DiagnosticsSnapshot::new(files)
    }
}

impl DiagnosticsSink for DiagnosticsStore {
    fn set(&self, path: &Path, items: Vec<Diagnostic>) {
        let mut data = self.lock();
        if items.is_empty() {
            data.remove(path);
        } else {
            data.insert(path.to_path_buf(), items);
        }
    }
}
