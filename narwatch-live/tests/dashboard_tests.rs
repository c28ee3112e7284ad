//! Dashboard and live engine tests
//!
//! The engine runs against an in-memory backend and a manual connector on a
//! paused clock; `settle` lets every spawned task run to idle.

mod helpers;

use helpers::{dated_event, event, ConnectorProbe, FakeBackend, ManualConnector};
use narwatch_common::{CaseRecord, IntakeMetadata, IntakePayload};
use narwatch_live::notice::{self, Tone};
use narwatch_live::{ApiError, ConnectionState, Dashboard, ReconnectPolicy};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn dashboard() -> (Dashboard, Arc<FakeBackend>, ConnectorProbe) {
    let backend = Arc::new(FakeBackend::new());
    let (connector, probe) = ManualConnector::new();
    let dashboard = Dashboard::new(
        backend.clone(),
        Box::new(connector),
        ReconnectPolicy::default(),
        Duration::from_millis(4200),
    );
    (dashboard, backend, probe)
}

fn record(value: serde_json::Value) -> CaseRecord {
    serde_json::from_value(value).unwrap()
}

fn payload() -> IntakePayload {
    IntakePayload::new("Forwarded message claims polling booths moved overnight")
        .with_metadata(IntakeMetadata::for_region("Pune"))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn test_stream_event_is_hydrated_into_full_record() {
    let (dashboard, backend, mut probe) = dashboard();
    backend.put_case(record(json!({
        "intake_id": "abc123",
        "submitted_at": "2024-03-01T10:00:00Z",
        "classification": "high",
        "composite_score": 0.82,
        "summary": "Coordinated amplification"
    })));

    dashboard.start();
    let sink = probe.next_sink().await;
    sink.opened();
    sink.event(event("abc123", 0.82));
    settle().await;

    let cases = dashboard.cases().await;
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].classification.as_deref(), Some("high"));
    assert_eq!(cases[0].detail("summary"), Some(&json!("Coordinated amplification")));
    assert_eq!(backend.fetches(), 1);
    assert_eq!(dashboard.connection_state(), ConnectionState::Connected);

    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_hydration_leaves_partial_record() {
    let (dashboard, backend, mut probe) = dashboard();
    backend.fail_fetch("x");

    dashboard.start();
    let sink = probe.next_sink().await;
    let streamed = event("x", 0.4);
    sink.event(streamed.clone());
    settle().await;

    assert_eq!(dashboard.registry().get("x").await, Some(streamed.to_partial()));
    assert_eq!(backend.fetches(), 1);

    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_submission_and_stream_echo_share_one_entry() {
    let (dashboard, backend, mut probe) = dashboard();
    backend.respond_to_submit(Ok(record(json!({
        "intake_id": "abc123",
        "submitted_at": "2024-03-01T10:00:00Z",
        "classification": "high",
        "composite_score": 0.82
    }))));
    backend.put_case(record(json!({
        "intake_id": "abc123",
        "composite_score": 0.9,
        "breakdown": {"heuristics": ["forwarded"]}
    })));

    dashboard.start();
    let sink = probe.next_sink().await;

    let submitted = dashboard.submit(payload()).await.unwrap();
    assert_eq!(submitted.case_id, "abc123");
    assert_eq!(dashboard.selected_id().as_deref(), Some("abc123"));
    assert_eq!(dashboard.cases().await.len(), 1);
    assert_eq!(
        dashboard.notices().current().map(|n| n.message),
        Some(notice::SUBMIT_OK.to_string())
    );
    assert_eq!(dashboard.submission_for("abc123"), Some(payload()));

    sink.event(event("abc123", 0.9));
    settle().await;

    let cases = dashboard.cases().await;
    assert_eq!(cases.len(), 1);
    let case = &cases[0];
    assert_eq!(case.composite_score, Some(0.9));
    assert_eq!(case.classification.as_deref(), Some("high"));
    assert!(case.submitted_at.is_some());
    assert!(case.detail("breakdown").is_some());
    assert_eq!(dashboard.selected().await.as_ref(), Some(case));

    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_submission_raises_notice_and_changes_nothing() {
    let (dashboard, backend, _probe) = dashboard();
    backend.respond_to_submit(Err(ApiError::Status {
        status: 422,
        body: "Narrative rejected".to_string(),
    }));

    let result = dashboard.submit(payload()).await;

    assert!(matches!(result, Err(ApiError::Status { status: 422, .. })));
    assert!(dashboard.cases().await.is_empty());
    assert_eq!(dashboard.selected_id(), None);

    let current = dashboard.notices().current().unwrap();
    assert_eq!(current.tone, Tone::Error);
    assert_eq!(current.message, "Unable to check narrative: Narrative rejected");
}

#[tokio::test(start_paused = true)]
async fn test_submission_without_id_is_rejected() {
    let (dashboard, backend, _probe) = dashboard();
    backend.respond_to_submit(Ok(record(json!({"classification": "low"}))));

    let result = dashboard.submit(payload()).await;

    assert!(matches!(result, Err(ApiError::MissingCaseId)));
    assert!(dashboard.cases().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_select_case() {
    let (dashboard, backend, _probe) = dashboard();
    backend.put_case(record(json!({"intake_id": "k1", "classification": "medium"})));
    backend.fail_fetch("k2");

    assert_eq!(dashboard.select_case("  ").await.unwrap(), None);
    assert_eq!(backend.fetches(), 0);

    let selected = dashboard.select_case("k1").await.unwrap().unwrap();
    assert_eq!(selected.classification.as_deref(), Some("medium"));
    assert_eq!(dashboard.selected().await, Some(selected));

    assert!(dashboard.select_case("k2").await.is_err());
    assert_eq!(dashboard.selected_id().as_deref(), Some("k2"));
    assert!(dashboard.selected().await.is_none());
    assert_eq!(dashboard.cases().await.len(), 1);
    assert!(dashboard
        .notices()
        .current()
        .unwrap()
        .message
        .starts_with("Unable to load the selected case"));
}

#[tokio::test(start_paused = true)]
async fn test_cases_ordered_newest_first_with_metrics() {
    let (dashboard, backend, mut probe) = dashboard();
    for id in ["old", "new", "undated"] {
        backend.fail_fetch(id);
    }

    dashboard.start();
    let sink = probe.next_sink().await;
    sink.event(dated_event("old", "2024-01-01T00:00:00Z", "low"));
    sink.event(event("undated", 0.75));
    sink.event(dated_event("new", "2024-02-01T00:00:00Z", "high"));
    settle().await;

    let ids: Vec<String> = dashboard.cases().await.into_iter().map(|c| c.case_id).collect();
    assert_eq!(ids, vec!["new", "old", "undated"]);

    let recent: Vec<String> = dashboard.recent(2).await.into_iter().map(|c| c.case_id).collect();
    assert_eq!(recent, vec!["new", "old"]);

    let metrics = dashboard.metrics().await;
    assert_eq!(metrics.total, 3);
    assert_eq!(metrics.high_risk, 2);
    assert_eq!(metrics.average_percent, 25);

    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_engine_reconnects_and_keeps_applying_events() {
    let (dashboard, backend, mut probe) = dashboard();
    backend.fail_fetch("a");
    backend.fail_fetch("b");
    let mut notices = dashboard.notices().subscribe();

    dashboard.start();
    let first = probe.next_sink().await;
    first.opened();
    first.event(event("a", 0.1));
    first.fail("connection reset");
    settle().await;

    assert!(matches!(
        dashboard.connection_state(),
        ConnectionState::AwaitingRetry { attempt: 1 }
    ));
    assert_eq!(notices.try_recv().unwrap().message, notice::RECONNECTING);

    let second = probe.next_sink().await;
    second.opened();
    second.event(event("b", 0.2));
    settle().await;

    assert_eq!(probe.opened(), 2);
    assert_eq!(probe.max_live(), 1);
    assert_eq!(dashboard.cases().await.len(), 2);

    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_opens_one_connection() {
    let (dashboard, _backend, mut probe) = dashboard();

    dashboard.start();
    dashboard.start();
    let _sink = probe.next_sink().await;
    settle().await;

    assert_eq!(probe.opened(), 1);
    dashboard.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_everything() {
    let (dashboard, backend, mut probe) = dashboard();
    backend.put_case(record(json!({"intake_id": "late", "summary": "s"})));

    dashboard.start();
    let sink = probe.next_sink().await;
    sink.fail("dropped");
    settle().await;

    dashboard.shutdown().await;
    let revision = dashboard.registry().revision();

    // Well past the reconnect delay
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(probe.opened(), 1);
    assert_eq!(probe.live(), 0);
    assert_eq!(dashboard.connection_state(), ConnectionState::Stopped);

    // Writers still holding the registry are refused
    dashboard.registry().upsert(CaseRecord::new("late")).await;
    assert_eq!(dashboard.registry().revision(), revision);
    assert!(dashboard.cases().await.is_empty());

    dashboard.shutdown().await;
}
