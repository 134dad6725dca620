//! Progress and status notifications shown by the host UI.

/// UI surface for session progress.
///
/// A session calls `begin_progress` once at start, then exactly one of
/// `status` (ready) or `error` (startup or readiness failure), then
/// `end_progress`. After readiness, `error` is called again only if the
/// analyzer process is lost.
pub trait Notifier: Send + Sync {
    fn begin_progress(&self, title: &str);
    fn end_progress(&self);
    fn status(&self, message: &str);
    fn error(&self, message: &str);
}

/// Notifier that only logs. For headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn begin_progress(&self, title: &str) {
        tracing::info!("{title}: starting");
    }

    fn end_progress(&self) {}

    fn status(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}
