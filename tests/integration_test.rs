//! End-to-end engine runs against the scripted demo application: login,
//! discovery, validation, test generation, and coverage scoring.

#[path = "helpers.rs"]
mod helpers;

use helpers::*;
use surface_scout::{CheckStatus, EngineEvent, FeatureType, RunState, StepAction};

#[tokio::test]
async fn full_run_discovers_validates_and_scores() {
    let h = harness(demo_app());
    let run_id = h.engine.start(qa_request()).await.expect("start");
    let snapshot = h.engine.wait(&run_id).await.expect("wait");

    assert_eq!(snapshot.state, RunState::Done);
    assert!(snapshot.failure_reason.is_none());
    assert_eq!(snapshot.pages_discovered, 4);
    // The dashboard has no switcher, so no context was chosen.
    assert_eq!(snapshot.context, None);

    let stored = h.engine.report(&run_id).await.expect("report");

    // The login page is never admitted; the four post-login pages are.
    let urls: Vec<&str> = stored
        .pages
        .iter()
        .map(|p| p.normalized_url.as_str())
        .collect();
    assert_eq!(urls.len(), 4);
    assert!(urls.contains(&"https://app.test/dashboard"));
    assert!(urls.contains(&"https://app.test/items"));
    assert!(urls.contains(&"https://app.test/items?page=2"));
    assert!(urls.contains(&"https://app.test/about"));

    let page_of = |url: &str| {
        stored
            .pages
            .iter()
            .find(|p| p.normalized_url == url)
            .unwrap_or_else(|| panic!("page {url} should be recorded"))
    };
    assert_eq!(page_of("https://app.test/dashboard").depth, 0);
    assert_eq!(page_of("https://app.test/items").depth, 1);
    assert_eq!(page_of("https://app.test/items?page=2").depth, 2);

    let items = page_of("https://app.test/items");
    assert!(items.has_feature(&FeatureType::new("search")));
    assert!(items.has_feature(&FeatureType::new("pagination")));
    assert!(items.has_feature(&FeatureType::new("listing")));
    assert!(page_of("https://app.test/about").features.is_empty());
    assert!(page_of("https://app.test/dashboard").features.is_empty());
}

#[tokio::test]
async fn generated_cases_follow_the_catalog() {
    let h = harness(demo_app());
    let run_id = h.engine.start(qa_request()).await.expect("start");
    let snapshot = h.engine.wait(&run_id).await.expect("wait");
    assert_eq!(snapshot.state, RunState::Done);

    let stored = h.engine.report(&run_id).await.expect("report");
    assert_eq!(stored.test_cases.len(), snapshot.test_case_count);

    let count_for = |feature: &str| {
        stored
            .test_cases
            .iter()
            .filter(|c| c.feature == FeatureType::new(feature))
            .count()
    };
    // All six search rules resolve on the items page.
    assert_eq!(count_for("search"), 6);
    // The four next-based pagination rules resolve; the prev rule has no
    // element and becomes a coverage gap instead of a case.
    assert_eq!(count_for("pagination"), 4);
    // Three listing rules resolve on each of the two table pages; the
    // row-detail rule finds no row link on either.
    assert_eq!(count_for("listing"), 6);
    assert_eq!(count_for("sort"), 0);
    assert_eq!(count_for("filter"), 0);

    for case in &stored.test_cases {
        assert!(case.id.starts_with("tc-"), "case id {}", case.id);
        assert_eq!(case.steps.first().map(|s| s.action), Some(StepAction::Navigate));
        assert_eq!(case.steps.last().map(|s| s.action), Some(StepAction::Assert));
    }
    // Fill-driven cases submit the form they typed into.
    let basic = stored
        .test_cases
        .iter()
        .find(|c| c.rule_id == "search-basic-term")
        .expect("basic search case");
    assert!(basic.steps.iter().any(|s| s.action == StepAction::Fill));
    assert!(basic.steps.iter().any(|s| s.action == StepAction::Submit));
}

#[tokio::test]
async fn checks_execute_against_the_live_app() {
    let h = harness(demo_app());
    let run_id = h.engine.start(qa_request()).await.expect("start");
    let snapshot = h.engine.wait(&run_id).await.expect("wait");
    assert_eq!(snapshot.state, RunState::Done);

    let stored = h.engine.report(&run_id).await.expect("report");
    let items_fp = stored
        .pages
        .iter()
        .find(|p| p.normalized_url == "https://app.test/items")
        .expect("items page")
        .fingerprint
        .clone();

    let status_of = |rule: &str| {
        stored
            .results
            .iter()
            .find(|r| r.rule_id == rule && r.fingerprint == items_fp)
            .unwrap_or_else(|| panic!("result for {rule} should exist"))
            .status
    };
    // Scripted result pages make the literal-query checks pass.
    assert_eq!(status_of("search-basic-term"), CheckStatus::Passed);
    assert_eq!(status_of("search-term-in-url"), CheckStatus::Passed);
    assert_eq!(status_of("search-nonsense-term"), CheckStatus::Passed);
    assert_eq!(status_of("search-empty-query"), CheckStatus::Passed);
    assert_eq!(status_of("pagination-next-advances"), CheckStatus::Passed);
    assert_eq!(status_of("pagination-page-param"), CheckStatus::Passed);
    // No prev control and no row links: skipped, not failed.
    assert_eq!(status_of("pagination-prev-disabled-on-first"), CheckStatus::Skipped);
    assert_eq!(status_of("listing-row-opens-detail"), CheckStatus::Skipped);
    // The unicode and max-length queries have no scripted result page, so
    // their submissions fail; the run keeps going regardless.
    assert_eq!(status_of("search-unicode-query"), CheckStatus::Failed);
    assert_eq!(status_of("search-max-length-query"), CheckStatus::Failed);

    // Snapshot tallies agree with the persisted results.
    let count = |status: CheckStatus| {
        stored.results.iter().filter(|r| r.status == status).count()
    };
    assert_eq!(snapshot.checks_passed, count(CheckStatus::Passed));
    assert_eq!(snapshot.checks_failed, count(CheckStatus::Failed));
    assert_eq!(snapshot.checks_skipped, count(CheckStatus::Skipped));
    assert!(snapshot.checks_passed > snapshot.checks_failed);
}

#[tokio::test]
async fn coverage_report_scores_generated_against_expected() {
    let h = harness(demo_app());
    let run_id = h.engine.start(qa_request()).await.expect("start");
    let snapshot = h.engine.wait(&run_id).await.expect("wait");
    assert_eq!(snapshot.state, RunState::Done);

    let stored = h.engine.report(&run_id).await.expect("report");
    let coverage = stored.coverage.expect("coverage report written");
    assert_eq!(coverage.run_id, run_id);

    let feature = |name: &str| {
        coverage
            .features
            .iter()
            .find(|f| f.feature == name)
            .unwrap_or_else(|| panic!("coverage for {name} should exist"))
    };
    let search = feature("search");
    assert_eq!(search.pages_with_feature, 1);
    assert_eq!(search.percent, 100.0);
    assert!(search.unmet_rules.is_empty());

    let pagination = feature("pagination");
    assert!(pagination.percent < 100.0);
    assert_eq!(
        pagination.unmet_rules,
        vec!["pagination-prev-disabled-on-first".to_string()]
    );

    let listing = feature("listing");
    assert_eq!(listing.pages_with_feature, 2);
    assert!(listing
        .unmet_rules
        .contains(&"listing-row-opens-detail".to_string()));

    // Never-seen features carry no expectation and are absent.
    assert!(coverage.features.iter().all(|f| f.feature != "sort"));
    assert!(coverage.features.iter().all(|f| f.feature != "filter"));

    assert!(coverage.overall_percent < 100.0);
    assert!(coverage.overall_percent > 50.0);
}

#[tokio::test]
async fn run_lifecycle_is_narrated_as_events() {
    let h = harness(demo_app());
    let run_id = h.engine.start(qa_request()).await.expect("start");
    h.engine.wait(&run_id).await.expect("wait");

    let events = h.sink.events();
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
            RunState::DiscoveryRun,
            RunState::TestGeneration,
            RunState::Done,
        ]
    );

    let discovered = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::PageDiscovered { .. }))
        .count();
    assert_eq!(discovered, 4);

    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::ContextResolved { context: None, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::CoverageUpdated { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::TestCasesGenerated { .. })));
}

#[tokio::test]
async fn app_without_login_form_runs_unauthenticated() {
    let app = surface_scout::ScriptedApp::new(BASE)
        .page("/", ITEMS_PAGE)
        .page("/items", ITEMS_PAGE)
        .page("/items?page=2", ITEMS_PAGE_2)
        .page("/items?q=widget", SEARCH_HIT)
        .page("/items?q=zzqxjwv-no-such-thing", SEARCH_MISS)
        .page("/items?q=", ITEMS_PAGE);
    let h = harness(app);

    let run_id = h
        .engine
        .start(surface_scout::RunRequest {
            base_url: BASE.to_string(),
            username: String::new(),
            password: String::new(),
            environment: None,
        })
        .await
        .expect("start");
    let snapshot = h.engine.wait(&run_id).await.expect("wait");

    assert_eq!(snapshot.state, RunState::Done);
    assert!(snapshot.pages_discovered >= 1);
}
