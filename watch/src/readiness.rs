//! One-shot readiness signal for a watch session.
//!
//! The gate starts pending and settles exactly once: resolved when the
//! analyzer produces its first output, or rejected when it never will.
//! Later attempts to settle are no-ops.

use tokio::sync::watch;

/// Why readiness was never reached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadinessError {
    #[error("failed to start {name}: {reason}")]
    StartFailed { name: String, reason: String },
    #[error("{name} {reason} before producing any output")]
    Exited { name: String, reason: String },
    #[error("watch session was shut down before {name} became ready")]
    Cancelled { name: String },
    #[error("watch session ended without a readiness result")]
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadyState {
    Pending,
    Ready,
    Failed(ReadinessError),
}

/// Write side. Owned by the session.
#[derive(Debug)]
pub struct ReadinessGate {
    tx: watch::Sender<ReadyState>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ReadyState::Pending);
        Self { tx }
    }

    /// Resolve the gate. Returns `true` only for the call that settled it.
    pub fn complete(&self) -> bool {
        self.settle(ReadyState::Ready)
    }

    /// Reject the gate. Returns `true` only for the call that settled it.
    pub fn reject(&self, error: ReadinessError) -> bool {
        self.settle(ReadyState::Failed(error))
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        *self.tx.borrow() == ReadyState::Pending
    }

    /// A new listener. Listeners created after settling see the result.
    #[must_use]
    pub fn subscribe(&self) -> Readiness {
        Readiness {
            rx: self.tx.subscribe(),
        }
    }

    fn settle(&self, outcome: ReadyState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state != ReadyState::Pending {
                return false;
            }
            *state = outcome;
            true
        })
    }
}

/// Read side. Cheap to clone; every clone observes the same outcome.
#[derive(Debug, Clone)]
pub struct Readiness {
    rx: watch::Receiver<ReadyState>,
}

impl Readiness {
    /// Wait until the gate settles. There is no timeout.
    pub async fn wait(&mut self) -> Result<(), ReadinessError> {
        match self.rx.wait_for(|state| *state != ReadyState::Pending).await {
            Ok(state) => match &*state {
                ReadyState::Ready => Ok(()),
                ReadyState::Failed(err) => Err(err.clone()),
                ReadyState::Pending => Err(ReadinessError::Abandoned),
            },
            // Gate dropped while still pending.
            Err(_) => Err(ReadinessError::Abandoned),
        }
    }

    /// Outcome if already settled.
    #[must_use]
    pub fn peek(&self) -> Option<Result<(), ReadinessError>> {
        match &*self.rx.borrow() {
            ReadyState::Pending => None,
            ReadyState::Ready => Some(Ok(())),
            ReadyState::Failed(err) => Some(Err(err.clone())),
        }
    }
}
