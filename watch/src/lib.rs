//! Watch-mode analyzer supervisor that republishes streamed issues as
//! editor diagnostics.

pub mod codec;
pub mod document;
pub mod protocol;
pub mod types;

pub(crate) mod diagnostics;
pub(crate) mod notify;
pub(crate) mod publisher;
pub(crate) mod readiness;
pub(crate) mod resolver;

mod session;

pub use diagnostics::{DiagnosticsSink, DiagnosticsStore};
pub use document::TextDocument;
pub use notify::{LogNotifier, Notifier};
pub use protocol::{DiagnosticBatch, RawIssue};
pub use publisher::{PublishReport, Publisher};
pub use readiness::{Readiness, ReadinessError, ReadinessGate};
pub use resolver::{DocumentResolver, ResolveError, Workspace};
pub use session::WatchSession;
pub use types::{
    AnalyzerConfig, Diagnostic, DiagnosticSeverity, DiagnosticsSnapshot, Position, Range,
    SessionState, StopReason,
};
