//! Document resolution: path → live document text.
//!
//! The publisher never reads files itself; it asks a [`DocumentResolver`].
//! [`Workspace`] is the default: an overlay of editor-open documents over
//! the filesystem.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::document::TextDocument;
use crate::protocol::normalize_path;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("cannot open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no document for {}", path.display())]
    NotFound { path: PathBuf },
}

/// Resolves a file to its live in-editor document, opening it if needed.
pub trait DocumentResolver: Send + Sync + 'static {
    fn open(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<Arc<TextDocument>, ResolveError>> + Send;
}

/// Editor-open documents layered over the filesystem.
///
/// Documents opened by the editor (`did_open`/`did_change`) take precedence
/// over disk contents until `did_close`. Anything else is read from disk on
/// every resolution, so each batch maps offsets against the file as it is
/// now.
#[derive(Debug, Default)]
pub struct Workspace {
    documents: RwLock<HashMap<PathBuf, Arc<TextDocument>>>,
}

impl Workspace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Editor opened `path` with `text`. Re-opening bumps the version.
    pub fn did_open(&self, path: &Path, text: &str) -> Arc<TextDocument> {
        self.replace(path, text)
    }

    /// Editor changed the full text of `path`.
    pub fn did_change(&self, path: &Path, text: &str) -> Arc<TextDocument> {
        self.replace(path, text)
    }

    /// Forget `path`. The next resolution reads it from disk again.
    pub fn did_close(&self, path: &Path) -> bool {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize_path(path))
            .is_some()
    }

    /// The editor's copy of `path`, if it has one.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Arc<TextDocument>> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_path(path))
            .cloned()
    }

    #[must_use]
    pub fn is_open(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    fn replace(&self, path: &Path, text: &str) -> Arc<TextDocument> {
        let path = normalize_path(path);
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let version = documents.get(&path).map_or(1, |doc| doc.version() + 1);
        let doc = Arc::new(TextDocument::new(path.clone(), version, text));
        documents.insert(path, Arc::clone(&doc));
        doc
    }
}

impl DocumentResolver for Workspace {
    async fn open(&self, path: &Path) -> Result<Arc<TextDocument>, ResolveError> {
        if let Some(doc) = self.get(path) {
            return Ok(doc);
        }

        let path = normalize_path(path);
        let bytes = tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ResolveError::NotFound { path: path.clone() }
            } else {
                ResolveError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        tracing::trace!(path = %path.display(), bytes = bytes.len(), "Read document from disk");
        let text = String::from_utf8_lossy(&bytes);
        Ok(Arc::new(TextDocument::new(path, 0, &text)))
    }
}
