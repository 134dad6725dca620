//! Wire types for the analyzer's JSON output.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::document::TextDocument;
use crate::types::{Diagnostic, DiagnosticSeverity};

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

/// One issue as reported by the analyzer.
///
/// `offset` and `length` count characters from the start of the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawIssue {
    pub file: String,
    pub offset: usize,
    pub length: usize,
    pub message: String,
    pub severity: i64,
}

impl RawIssue {
    /// Position this issue against the live document text.
    pub fn to_diagnostic(&self, doc: &TextDocument, source: &str) -> Diagnostic {
        Diagnostic::new(
            doc.range_at(self.offset, self.length),
            self.message.clone(),
            DiagnosticSeverity::from_analyzer(self.severity),
            source.to_string(),
        )
    }
}

/// One complete analyzer payload: file path → that file's full issue list.
///
/// A batch replaces the diagnostics of every file it mentions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct DiagnosticBatch {
    files: BTreeMap<String, Vec<RawIssue>>,
}

impl DiagnosticBatch {
    /// Validate a decoded JSON value against the batch shape.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[must_use]
    pub fn files(&self) -> &BTreeMap<String, Vec<RawIssue>> {
        &self.files
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn into_files(self) -> impl Iterator<Item = (String, Vec<RawIssue>)> {
        self.files.into_iter()
    }
}

impl FromIterator<(String, Vec<RawIssue>)> for DiagnosticBatch {
    fn from_iter<T: IntoIterator<Item = (String, Vec<RawIssue>)>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Lexically normalize a path, dropping `.` and resolving `..`.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = Vec::new();
    for c in path.components() {
        match c {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Resolve a batch key to an absolute path. Keys may be `file://` URIs,
/// absolute paths, or paths relative to the watch root.
pub(crate) fn resolve_batch_path(root: &Path, key: &str) -> PathBuf {
    if key.starts_with("file:")
        && let Some(path) = file_uri_to_path(key)
    {
        return normalize_path(&path);
    }
    let path = Path::new(key);
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&root.join(path))
    }
}

pub fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}

pub(crate) fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
}
