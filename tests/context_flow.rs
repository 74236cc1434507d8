//! Tenant-context detection across the run lifecycle: suspension on an
//! ambiguous switcher, answer validation, and cancellation while suspended.

#[path = "helpers.rs"]
mod helpers;

use helpers::*;
use surface_scout::{EngineError, EngineEvent, RunRequest, RunState};

const PICKER_DASHBOARD: &str = r#"<html><head><title>Home</title></head><body>
    <main>
      <select id="tenant-picker" name="tenant">
        <option value="">Select tenant</option>
        <option value="acme">Acme Corp</option>
        <option value="globex">Globex</option>
        <option value="initech">Initech</option>
      </select>
      <a href="/about">About</a>
    </main>
    </body></html>"#;

const GLOBEX_DASHBOARD: &str = r#"<html><head><title>Globex</title></head><body>
    <main>
      <h1>Globex</h1>
      <a href="/about">About</a>
    </main>
    </body></html>"#;

const TENANT_ABOUT: &str = r#"<html><head><title>About</title></head><body>
    <main>
      <p>Multi-tenant inventory console.</p>
    </main>
    </body></html>"#;

fn picker_app() -> surface_scout::ScriptedApp {
    surface_scout::ScriptedApp::new(BASE)
        .page("/", PICKER_DASHBOARD)
        .page("/?tenant=globex", GLOBEX_DASHBOARD)
        .page("/about", TENANT_ABOUT)
}

fn anonymous_request() -> RunRequest {
    RunRequest {
        base_url: BASE.to_string(),
        username: String::new(),
        password: String::new(),
        environment: None,
    }
}

#[tokio::test]
async fn ambiguous_switcher_suspends_and_resumes_on_answer() {
    let h = harness(picker_app());
    let run_id = h.engine.start(anonymous_request()).await.expect("start");

    let suspended = wait_until(&h.engine, &run_id, |s| {
        s.state == RunState::WaitContextInput
    })
    .await;
    let question = suspended.pending_question.expect("pending question");
    assert_eq!(question.kind, "select_one");
    assert_eq!(question.selector, "#tenant-picker");
    assert_eq!(question.options, vec!["Acme Corp", "Globex", "Initech"]);

    let accepted = h
        .engine
        .answer(&run_id, &question.question_id, "Globex")
        .expect("answer accepted");
    // The returned snapshot already reflects the consumed question.
    assert!(accepted.pending_question.is_none());
    let snapshot = h.engine.wait(&run_id).await.expect("wait");

    assert_eq!(snapshot.state, RunState::Done);
    assert_eq!(snapshot.context.as_deref(), Some("Globex"));
    assert!(snapshot.pending_question.is_none());
    // The crawl starts from the tenant-scoped dashboard, not the picker.
    assert_eq!(snapshot.pages_discovered, 2);

    let events = h.sink.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::ContextQuestionRaised { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::ContextResolved { context: Some(c), .. } if c == "Globex"
    )));
    let to_states: Vec<RunState> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::RunStateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        to_states,
        vec![
            RunState::Login,
            RunState::PostLoginValidate,
            RunState::ContextDetect,
            RunState::WaitContextInput,
            RunState::DiscoveryRun,
            RunState::TestGeneration,
            RunState::Done,
        ]
    );
}

#[tokio::test]
async fn bad_answers_are_rejected_without_resuming() {
    let h = harness(picker_app());
    let run_id = h.engine.start(anonymous_request()).await.expect("start");

    let suspended = wait_until(&h.engine, &run_id, |s| {
        s.state == RunState::WaitContextInput
    })
    .await;
    let question = suspended.pending_question.expect("pending question");

    let err = h
        .engine
        .answer(&run_id, "ctx-nonsense", "Globex")
        .expect_err("wrong question id");
    assert!(matches!(err, EngineError::UnknownQuestion(_)));

    let err = h
        .engine
        .answer(&run_id, &question.question_id, "Umbrella Corp")
        .expect_err("selection not offered");
    assert!(matches!(err, EngineError::InvalidSelection(_)));

    // Still suspended; a valid answer afterwards completes the run.
    assert_eq!(
        h.engine.get_state(&run_id).expect("state").state,
        RunState::WaitContextInput
    );
    h.engine
        .answer(&run_id, &question.question_id, "Globex")
        .expect("valid answer");
    let snapshot = h.engine.wait(&run_id).await.expect("wait");
    assert_eq!(snapshot.state, RunState::Done);
}

#[tokio::test]
async fn answer_on_a_run_that_is_not_suspended_is_rejected() {
    let h = harness(demo_app());
    let run_id = h.engine.start(qa_request()).await.expect("start");
    h.engine.wait(&run_id).await.expect("wait");

    let err = h
        .engine
        .answer(&run_id, "ctx-whatever", "Acme Corp")
        .expect_err("run already finished");
    assert!(matches!(err, EngineError::NotAwaitingInput(_)));

    let err = h
        .engine
        .answer("20000101000000-zzzzzz", "ctx-whatever", "Acme Corp")
        .expect_err("unknown run");
    assert!(matches!(err, EngineError::RunNotFound(_)));
}

#[tokio::test]
async fn single_option_switcher_proceeds_without_input() {
    let html = r#"<html><body><main>
        <select id="tenant-picker" name="tenant">
          <option value="">Select tenant</option>
          <option value="acme">Acme Corp</option>
        </select>
        <a href="/about">About</a>
        </main></body></html>"#;
    let app = surface_scout::ScriptedApp::new(BASE)
        .page("/", html)
        .page("/about", TENANT_ABOUT);
    let h = harness(app);

    let run_id = h.engine.start(anonymous_request()).await.expect("start");
    let snapshot = h.engine.wait(&run_id).await.expect("wait");

    assert_eq!(snapshot.state, RunState::Done);
    assert_eq!(snapshot.context.as_deref(), Some("Acme Corp"));

    let events = h.sink.events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::ContextQuestionRaised { .. })));
    assert!(!events.iter().any(|e| matches!(
        e,
        EngineEvent::RunStateChanged { to: RunState::WaitContextInput, .. }
    )));
}

#[tokio::test]
async fn failing_to_apply_the_chosen_context_is_recoverable() {
    // "Acme Corp" resolves to /?tenant=acme, which the app does not serve;
    // the run falls back to crawling the landing state it already has.
    let h = harness(picker_app());
    let run_id = h.engine.start(anonymous_request()).await.expect("start");

    let suspended = wait_until(&h.engine, &run_id, |s| {
        s.state == RunState::WaitContextInput
    })
    .await;
    let question = suspended.pending_question.expect("pending question");
    h.engine
        .answer(&run_id, &question.question_id, "Acme Corp")
        .expect("answer accepted");
    let snapshot = h.engine.wait(&run_id).await.expect("wait");

    assert_eq!(snapshot.state, RunState::Done);
    assert_eq!(snapshot.context.as_deref(), Some("Acme Corp"));
    assert_eq!(snapshot.pages_discovered, 2);
    assert_eq!(snapshot.errors.get("context_detection"), Some(&1));
}

#[tokio::test]
async fn cancelling_a_suspended_run_fails_it() {
    let h = harness(picker_app());
    let run_id = h.engine.start(anonymous_request()).await.expect("start");

    let suspended = wait_until(&h.engine, &run_id, |s| {
        s.state == RunState::WaitContextInput
    })
    .await;
    let question = suspended.pending_question.expect("pending question");

    h.engine.cancel(&run_id).expect("cancel");
    let snapshot = h.engine.wait(&run_id).await.expect("wait");
    assert_eq!(snapshot.state, RunState::Failed);
    assert_eq!(snapshot.failure_reason.as_deref(), Some("run cancelled"));

    let err = h
        .engine
        .answer(&run_id, &question.question_id, "Globex")
        .expect_err("run no longer suspended");
    assert!(matches!(err, EngineError::NotAwaitingInput(_)));

    assert!(h
        .sink
        .events()
        .iter()
        .any(|e| matches!(e, EngineEvent::RunFailed { .. })));
}
