//! Watch session: owns the analyzer child process for its whole lifetime.
//!
//! ```text
//! start() ──spawn──▶ child ──stdout──▶ BatchReader ──▶ Publisher ──▶ sink
//!    │                 └──stderr──▶ tracing (debug)
//!    └─▶ progress task: begin_progress … readiness … status/error, end_progress
//! ```
//!
//! One supervisor task drives the output pump and reaps the child. The
//! readiness gate fires on the first decoded document; if the child dies
//! first the gate is rejected instead, so a pending progress indicator never
//! hangs forever.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::codec::BatchReader;
use crate::diagnostics::DiagnosticsSink;
use crate::notify::Notifier;
use crate::publisher::Publisher;
use crate::readiness::{Readiness, ReadinessError, ReadinessGate};
use crate::resolver::DocumentResolver;
use crate::types::{AnalyzerConfig, SessionState, StopReason};

/// A running watch over one root directory.
///
/// Dropping the session kills the analyzer. There is no restart: once the
/// analyzer stops, the session stays stopped.
pub struct WatchSession {
    name: String,
    root: PathBuf,
    readiness: Readiness,
    state: watch::Receiver<SessionState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    supervisor: JoinHandle<()>,
    progress: JoinHandle<()>,
}

impl WatchSession {
    /// Spawn the analyzer in watch mode over `root` and start streaming its
    /// output into `sink`.
    ///
    /// Returns as soon as the process is spawned. Startup failures are shown
    /// through `notifier` and returned as `Err`.
    pub async fn start<R: DocumentResolver>(
        config: &AnalyzerConfig,
        root: &Path,
        resolver: Arc<R>,
        sink: Arc<dyn DiagnosticsSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let name = config.name.clone();
        notifier.begin_progress(&name);

        let spawned = Self::spawn_child(config, root).await;
        let (mut child, root) = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                let err = ReadinessError::StartFailed {
                    name: name.clone(),
                    reason: format!("{e:#}"),
                };
                tracing::warn!("{err}");
                notifier.error(&err.to_string());
                notifier.end_progress();
                return Err(e);
            }
        };
        tracing::info!(root = %root.display(), pid = ?child.id(), "Started {name}");

        let stdout = child.stdout.take().context("no stdout from child")?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(stderr, name.clone()));
        }

        let gate = ReadinessGate::new();
        let readiness = gate.subscribe();
        let mut initial = SessionState::default();
        initial.mark_started();
        let (state_tx, state_rx) = watch::channel(initial);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let progress = tokio::spawn(show_progress(
            readiness.clone(),
            Arc::clone(&notifier),
            name.clone(),
        ));

        let publisher = Publisher::new(&root, name.clone(), resolver, sink);
        let supervisor = tokio::spawn(supervise(
            child,
            stdout,
            publisher,
            Supervision {
                name: name.clone(),
                gate,
                state: state_tx,
                notifier,
                shutdown_rx,
            },
        ));

        Ok(Self {
            name,
            root,
            readiness,
            state: state_rx,
            shutdown_tx: Some(shutdown_tx),
            supervisor,
            progress,
        })
    }

    async fn spawn_child(config: &AnalyzerConfig, root: &Path) -> Result<(Child, PathBuf)> {
        let root = tokio::fs::canonicalize(root)
            .await
            .with_context(|| format!("resolving watch root {}", root.display()))?;
        let args = config
            .watch_args(&root)
            .ok_or_else(|| anyhow!("no analyzer entrypoint configured"))?;
        let resolved_cmd = which::which(&config.command)
            .with_context(|| format!("{} not found in PATH", config.command))?;

        let mut cmd = Command::new(&resolved_cmd);
        cmd.args(&args)
            .envs(&config.env)
            .current_dir(&root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning {}", config.command))?;
        Ok((child, root))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical watch root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// A listener for the readiness signal.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Wait for the first analyzer output, or for the reason it never came.
    pub async fn wait_ready(&self) -> Result<(), ReadinessError> {
        self.readiness.clone().wait().await
    }

    /// Wait until the session stops and return why.
    pub async fn stopped(&self) -> StopReason {
        let mut rx = self.state.clone();
        let state = rx.wait_for(|s| s.stopped().is_some()).await;
        match state {
            Ok(state) => state.stopped().cloned().unwrap_or(StopReason::Shutdown),
            Err(_) => StopReason::Shutdown,
        }
    }

    /// Kill the analyzer and wait for the session's tasks to finish.
    pub async fn shutdown(mut self) {
        tracing::info!("Shutting down {}...", self.name);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.supervisor).await {
            tracing::warn!("{} supervisor task failed: {e}", self.name);
        }
        if let Err(e) = (&mut self.progress).await {
            tracing::warn!("{} progress task failed: {e}", self.name);
        }
    }
}

struct Supervision {
    name: String,
    gate: ReadinessGate,
    state: watch::Sender<SessionState>,
    notifier: Arc<dyn Notifier>,
    shutdown_rx: oneshot::Receiver<()>,
}

async fn supervise<R, O>(mut child: Child, output: O, publisher: Publisher<R>, sup: Supervision)
where
    R: DocumentResolver,
    O: AsyncRead + Unpin + Send,
{
    let Supervision {
        name,
        gate,
        state,
        notifier,
        mut shutdown_rx,
    } = sup;

    // A dropped sender counts as shutdown as well.
    let outcome = tokio::select! {
        result = pump_output(output, &publisher, &gate, &state, &name) => Some(result),
        _ = &mut shutdown_rx => None,
    };

    let reason = match outcome {
        None => {
            kill_child(&mut child, &name).await;
            StopReason::Shutdown
        }
        Some(Err(e)) => {
            tracing::warn!("{name} output error: {e:#}");
            kill_child(&mut child, &name).await;
            StopReason::Failed(format!("{e:#}"))
        }
        Some(Ok(())) => {
            tracing::info!("{name} closed stdout");
            tokio::select! {
                status = child.wait() => StopReason::from_status(status.ok()),
                _ = &mut shutdown_rx => {
                    kill_child(&mut child, &name).await;
                    StopReason::Shutdown
                }
            }
        }
    };

    state.send_modify(|s| s.mark_stopped(reason.clone()));

    if reason == StopReason::Shutdown {
        gate.reject(ReadinessError::Cancelled { name: name.clone() });
        tracing::info!("{name} stopped");
        return;
    }

    tracing::warn!("{name} {reason}");
    let rejected = gate.reject(ReadinessError::Exited {
        name: name.clone(),
        reason: reason.to_string(),
    });
    if !rejected {
        // Already ready: losing the process is the one user-visible failure.
        notifier.error(&format!("{name} {reason}"));
    }
}

/// Decode analyzer output until EOF, publishing each batch.
///
/// Bad documents are logged and skipped. Only a failing read ends the pump
/// early.
async fn pump_output<R, O>(
    output: O,
    publisher: &Publisher<R>,
    gate: &ReadinessGate,
    state: &watch::Sender<SessionState>,
    name: &str,
) -> Result<()>
where
    R: DocumentResolver,
    O: AsyncRead + Unpin,
{
    let mut reader = BatchReader::new(output);
    while let Some(decoded) = reader.read_batch().await? {
        if gate.complete() {
            state.send_modify(|s| {
                s.mark_first_output();
            });
            tracing::info!("{name} is ready");
        }

        match decoded {
            Ok(batch) => {
                let files = batch.len();
                let report = publisher.publish(batch).await;
                tracing::debug!(
                    files,
                    published = report.files_published,
                    skipped = report.files_skipped,
                    diagnostics = report.diagnostics,
                    "Batch published"
                );
            }
            Err(e) => {
                tracing::warn!("{name}: skipping output: {e}");
            }
        }
    }
    Ok(())
}

async fn show_progress(mut readiness: Readiness, notifier: Arc<dyn Notifier>, name: String) {
    match readiness.wait().await {
        Ok(()) => notifier.status(&format!("✓ {name}")),
        Err(ReadinessError::Cancelled { .. }) => {
            tracing::debug!("{name} cancelled before becoming ready");
        }
        Err(e) => notifier.error(&e.to_string()),
    }
    notifier.end_progress();
}

async fn log_stderr(stderr: ChildStderr, name: String) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!("{name} stderr: {line}"),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("{name} stderr read error: {e}");
                break;
            }
        }
    }
}

async fn kill_child(child: &mut Child, name: &str) {
    if let Err(e) = child.kill().await {
        tracing::debug!("{name} kill failed (already exited?): {e}");
    }
}
