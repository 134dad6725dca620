//! Publisher: turns decoded batches into per-file sink updates.
//!
//! Every file in a batch is resolved and published concurrently. Each file's
//! update is a full replace, so files may land in any order without ever
//! exposing a partial merge. A file that cannot be resolved is skipped; it
//! never blocks the rest of the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;

use crate::diagnostics::DiagnosticsSink;
use crate::protocol::{self, DiagnosticBatch, RawIssue};
use crate::resolver::DocumentResolver;
use crate::types::Diagnostic;

/// Outcome of publishing one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Files whose sink entry was replaced.
    pub files_published: usize,
    /// Files skipped because their document could not be resolved.
    pub files_skipped: usize,
    /// Diagnostics published across all files.
    pub diagnostics: usize,
}

pub struct Publisher<R> {
    root: PathBuf,
    source: String,
    resolver: Arc<R>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl<R: DocumentResolver> Publisher<R> {
    /// `root` anchors relative batch keys; `source` labels every diagnostic.
    pub fn new(
        root: &Path,
        source: impl Into<String>,
        resolver: Arc<R>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            root: protocol::normalize_path(root),
            source: source.into(),
            resolver,
            sink,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Publish every file in `batch`. Completes once all files are done.
    pub async fn publish(&self, batch: DiagnosticBatch) -> PublishReport {
        let results = join_all(
            batch
                .into_files()
                .map(|(key, issues)| self.publish_file(key, issues)),
        )
        .await;

        let mut report = PublishReport::default();
        for result in results {
            match result {
                Some(count) => {
                    report.files_published += 1;
                    report.diagnostics += count;
                }
                None => report.files_skipped += 1,
            }
        }
        report
    }

    async fn publish_file(&self, key: String, issues: Vec<RawIssue>) -> Option<usize> {
        let path = protocol::resolve_batch_path(&self.root, &key);
        let doc = match self.resolver.open(&path).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(file = %key, "Skipping diagnostics: {e}");
                return None;
            }
        };

        let items: Vec<Diagnostic> = issues
            .iter()
            .map(|issue| issue.to_diagnostic(&doc, &self.source))
            .collect();
        let count = items.len();
        tracing::trace!(path = %doc.path().display(), count, "Publishing diagnostics");
        self.sink.set(doc.path(), items);
        Some(count)
    }
}
