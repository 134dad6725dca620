//! Session lifecycle: startup failures, readiness, exits, shutdown.

use std::sync::Arc;
use std::time::Duration;

use blocwatch_watch::{ReadinessError, StopReason, WatchSession, Workspace};

use crate::common::{Event, Fixture, STAY_ALIVE, within};

#[tokio::test]
async fn test_missing_command_fails_start() {
    let fx = Fixture::new();
    let mut config = fx.analyzer(STAY_ALIVE);
    config.command = "blocwatch-no-such-analyzer".to_string();

    let err = fx.start(&config).await.err().unwrap();
    assert!(format!("{err:#}").contains("blocwatch-no-such-analyzer"));

    let events = fx.notifier.events();
    assert_eq!(events.first(), Some(&Event::Begin("fake analyzer".to_string())));
    assert_eq!(events.last(), Some(&Event::End));
    assert_eq!(fx.notifier.errors().len(), 1);
    assert!(fx.notifier.errors()[0].starts_with("failed to start fake analyzer"));
}

#[tokio::test]
async fn test_missing_root_fails_start() {
    let fx = Fixture::new();
    let config = fx.analyzer(STAY_ALIVE);

    let result = WatchSession::start(
        &config,
        &fx.root().join("nope"),
        Arc::new(Workspace::new()),
        fx.store.clone(),
        fx.notifier.clone(),
    )
    .await;
    assert!(result.is_err());
    assert_eq!(fx.notifier.errors().len(), 1);
}

#[tokio::test]
async fn test_ready_reports_status_once() {
    let fx = Fixture::new();
    let script = format!("printf '%s\\n' '{{}}'\nprintf '%s\\n' '{{}}'\n{STAY_ALIVE}");
    let session = fx.start(&fx.analyzer(&script)).await.unwrap();

    within(session.wait_ready()).await.unwrap();
    let state = session.state();
    assert!(state.started());
    assert!(state.first_output_received());
    assert!(state.stopped().is_none());

    let readiness = session.readiness();
    session.shutdown().await;

    assert_eq!(readiness.peek(), Some(Ok(())));
    assert_eq!(
        fx.notifier.events(),
        vec![
            Event::Begin("fake analyzer".to_string()),
            Event::Status("✓ fake analyzer".to_string()),
            Event::End,
        ]
    );
}

#[tokio::test]
async fn test_exit_before_output_rejects_readiness() {
    let fx = Fixture::new();
    let session = fx.start(&fx.analyzer("exit 3\n")).await.unwrap();

    let err = within(session.wait_ready()).await.unwrap_err();
    match &err {
        ReadinessError::Exited { name, reason } => {
            assert_eq!(name, "fake analyzer");
            assert!(reason.contains('3'));
        }
        other => panic!("unexpected readiness error: {other:?}"),
    }
    assert_eq!(within(session.stopped()).await, StopReason::Exited(Some(3)));
    assert!(!session.state().first_output_received());

    session.shutdown().await;
    assert_eq!(fx.notifier.errors(), vec![err.to_string()]);
    assert_eq!(fx.notifier.events().last(), Some(&Event::End));
}

#[tokio::test]
async fn test_exit_after_ready_is_reported() {
    let fx = Fixture::new();
    let session = fx
        .start(&fx.analyzer("printf '%s\\n' '{}'\nexit 0\n"))
        .await
        .unwrap();

    within(session.wait_ready()).await.unwrap();
    assert_eq!(within(session.stopped()).await, StopReason::Exited(Some(0)));

    // Readiness stays resolved after the process is gone.
    assert_eq!(session.readiness().peek(), Some(Ok(())));
    assert!(session.state().first_output_received());

    session.shutdown().await;
    assert_eq!(
        fx.notifier.errors(),
        vec!["fake analyzer exited with status 0".to_string()]
    );
}

#[tokio::test]
async fn test_shutdown_before_output_cancels_quietly() {
    let fx = Fixture::new();
    let session = fx.start(&fx.analyzer(STAY_ALIVE)).await.unwrap();
    let mut readiness = session.readiness();
    assert_eq!(readiness.peek(), None);

    within(session.shutdown()).await;

    assert!(matches!(
        readiness.wait().await,
        Err(ReadinessError::Cancelled { .. })
    ));
    assert!(fx.notifier.errors().is_empty());
    assert_eq!(
        fx.notifier.events(),
        vec![Event::Begin("fake analyzer".to_string()), Event::End]
    );
}

#[tokio::test]
async fn test_silent_analyzer_stays_pending() {
    let fx = Fixture::new();
    let session = fx.start(&fx.analyzer(STAY_ALIVE)).await.unwrap();

    let waited = tokio::time::timeout(Duration::from_millis(200), session.wait_ready()).await;
    assert!(waited.is_err());
    assert!(session.readiness().peek().is_none());
    assert!(session.state().stopped().is_none());

    session.shutdown().await;
}
