//! Failure handling: rejected credentials, an unreachable target, and
//! transient navigation failures during the crawl.

#[path = "helpers.rs"]
mod helpers;

use helpers::*;
use surface_scout::{EngineEvent, RunRequest, RunState};

#[tokio::test]
async fn rejected_credentials_fail_the_run() {
    let h = harness(demo_app());
    let run_id = h
        .engine
        .start(RunRequest {
            base_url: BASE.to_string(),
            username: "qa".to_string(),
            password: "wrong".to_string(),
            environment: None,
        })
        .await
        .expect("start");
    let snapshot = h.engine.wait(&run_id).await.expect("wait");

    assert_eq!(snapshot.state, RunState::Failed);
    let reason = snapshot.failure_reason.expect("failure reason recorded");
    assert!(reason.contains("login failed"), "reason was: {reason}");
    assert_eq!(snapshot.pages_discovered, 0);
    assert_eq!(snapshot.test_case_count, 0);

    assert!(h
        .sink
        .events()
        .iter()
        .any(|e| matches!(e, EngineEvent::RunFailed { .. })));
}

#[tokio::test]
async fn unreachable_target_fails_the_run() {
    // An app with no pages at all refuses every navigation.
    let h = harness(surface_scout::ScriptedApp::new(BASE));
    let run_id = h.engine.start(qa_request()).await.expect("start");
    let snapshot = h.engine.wait(&run_id).await.expect("wait");

    assert_eq!(snapshot.state, RunState::Failed);
    let reason = snapshot.failure_reason.expect("failure reason recorded");
    assert!(reason.contains("target unreachable"), "reason was: {reason}");
}

#[tokio::test]
async fn transient_navigation_failure_is_recorded_not_fatal() {
    // The first navigation to /items fails. The crawl releases its claim,
    // and the link from /about re-enqueues the page one level deeper.
    let h = harness(demo_app().fail_first("/items", 1));
    let run_id = h.engine.start(qa_request()).await.expect("start");
    let snapshot = h.engine.wait(&run_id).await.expect("wait");

    assert_eq!(snapshot.state, RunState::Done);
    assert_eq!(snapshot.errors.get("navigation"), Some(&1));

    let stored = h.engine.report(&run_id).await.expect("report");
    let items = stored
        .pages
        .iter()
        .find(|p| p.normalized_url == "https://app.test/items")
        .expect("items page reached on the second path");
    // Reached via /about instead of directly from the dashboard.
    assert_eq!(items.depth, 2);
    // At that depth its own pagination link is no longer followed.
    assert_eq!(snapshot.pages_discovered, 3);
}
