//! Shared test utilities and fixtures
//!
//! A fake analyzer is a shell script run as `sh <script> <root> --watch`.

#![allow(dead_code)]

use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use blocwatch_watch::{AnalyzerConfig, DiagnosticsStore, Notifier, WatchSession, Workspace};
use tempfile::TempDir;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(10);

/// Keeps the analyzer alive after its output, without holding a shell.
pub const STAY_ALIVE: &str = "exec sleep 30\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Begin(String),
    End,
    Status(String),
    Error(String),
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Error(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Notifier for RecordingNotifier {
    fn begin_progress(&self, title: &str) {
        self.push(Event::Begin(title.to_string()));
    }

    fn end_progress(&self) {
        self.push(Event::End);
    }

    fn status(&self, message: &str) {
        self.push(Event::Status(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(Event::Error(message.to_string()));
    }
}

/// A project directory with a fake analyzer script beside it.
pub struct Fixture {
    dir: TempDir,
    pub store: Arc<DiagnosticsStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("project")).unwrap();
        Self {
            dir,
            store: Arc::new(DiagnosticsStore::new()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    /// Write a project file relative to the root.
    pub fn write(&self, rel: &str, text: &str) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }

    /// Analyzer config that runs `script` through `sh`.
    pub fn analyzer(&self, script: &str) -> AnalyzerConfig {
        let path = self.dir.path().join("analyzer.sh");
        fs::write(&path, script).unwrap();
        AnalyzerConfig {
            name: "fake analyzer".to_string(),
            command: "sh".to_string(),
            entrypoint: Some(path),
            ..AnalyzerConfig::default()
        }
    }

    pub async fn start(&self, config: &AnalyzerConfig) -> anyhow::Result<WatchSession> {
        WatchSession::start(
            config,
            &self.root(),
            Arc::new(Workspace::new()),
            self.store.clone(),
            self.notifier.clone(),
        )
        .await
    }
}

/// Path the session publishes under for `rel`.
pub fn published_path(session: &WatchSession, rel: &str) -> PathBuf {
    session.root().join(rel)
}

/// Poll `check` until it holds or `WAIT` elapses.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut)
        .await
        .expect("timed out waiting")
}

/// One issue object as the analyzer prints it.
pub fn issue_json(file: &str, offset: usize, length: usize, message: &str, severity: i64) -> String {
    format!(
        r#"{{"file":"{file}","offset":{offset},"length":{length},"message":"{message}","severity":{severity}}}"#
    )
}
