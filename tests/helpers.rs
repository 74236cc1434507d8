//! Shared fixtures for the integration tests: a scripted demo application
//! behind a login form, and an engine harness wired to a memory event sink
//! and a temporary run store.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use surface_scout::{
    Engine, EngineSettings, EventSink, FormRoute, MemorySink, RuleRegistry, RunRequest,
    RunSnapshot, RunStore, ScriptedApp, ScriptedBrowser,
};

#[allow(dead_code)] // Used by other test files.
pub const BASE: &str = "https://app.test/";

#[allow(dead_code)]
pub const LOGIN_PAGE: &str = r#"<html><head><title>Sign in</title></head><body>
    <form action="/login" method="post">
      <input type="text" name="username" placeholder="Username">
      <input type="password" name="password" placeholder="Password">
      <button type="submit">Sign in</button>
    </form>
    </body></html>"#;

#[allow(dead_code)]
pub const DASHBOARD: &str = r#"<html><head><title>Dashboard</title></head><body>
    <main>
      <h1>Dashboard</h1>
      <ul>
        <li><a href="/items">Items</a></li>
        <li><a href="/about">About</a></li>
      </ul>
    </main>
    </body></html>"#;

#[allow(dead_code)]
pub const ITEMS_PAGE: &str = r#"<html><head><title>Items</title></head><body>
    <form action="/items" method="get">
      <input type="search" name="q" placeholder="Search items">
      <button type="submit">Search</button>
    </form>
    <table>
      <thead><tr><th>Name</th><th>Status</th></tr></thead>
      <tbody>
        <tr><td>Alpha</td><td>active</td></tr>
        <tr><td>Beta</td><td>active</td></tr>
        <tr><td>Delta</td><td>done</td></tr>
      </tbody>
    </table>
    <nav class="pagination"><a rel="next" href="/items?page=2">Next</a></nav>
    </body></html>"#;

#[allow(dead_code)]
pub const ITEMS_PAGE_2: &str = r#"<html><head><title>Items</title></head><body>
    <table>
      <thead><tr><th>Name</th><th>Status</th></tr></thead>
      <tbody>
        <tr><td>Gamma</td><td>done</td></tr>
      </tbody>
    </table>
    <a rel="prev" href="/items">Previous</a>
    </body></html>"#;

#[allow(dead_code)]
pub const SEARCH_HIT: &str = r#"<html><head><title>Items</title></head><body>
    <table>
      <thead><tr><th>Name</th><th>Status</th></tr></thead>
      <tbody>
        <tr><td>Widget Alpha</td><td>active</td></tr>
      </tbody>
    </table>
    </body></html>"#;

#[allow(dead_code)]
pub const SEARCH_MISS: &str = r#"<html><head><title>Items</title></head><body>
    <table>
      <thead><tr><th>Name</th><th>Status</th></tr></thead>
      <tbody></tbody>
    </table>
    <p>No items matched your query.</p>
    </body></html>"#;

#[allow(dead_code)]
pub const ABOUT_PAGE: &str = r#"<html><head><title>About</title></head><body>
    <main>
      <p>Inventory console for internal QA drills.</p>
      <a href="/items">Items</a>
    </main>
    </body></html>"#;

/// The demo application: a login form in front of a dashboard, a searchable
/// paginated listing, and an inert about page. Search result pages are
/// registered for the queries the built-in catalog submits literally.
#[allow(dead_code)]
pub fn demo_app() -> ScriptedApp {
    ScriptedApp::new(BASE)
        .page("/", LOGIN_PAGE)
        .form(
            "/login",
            FormRoute {
                expect: vec![
                    ("username".to_string(), "qa".to_string()),
                    ("password".to_string(), "secret".to_string()),
                ],
                on_match: "/dashboard".to_string(),
                on_mismatch: "/".to_string(),
            },
        )
        .page("/dashboard", DASHBOARD)
        .page("/items", ITEMS_PAGE)
        .page("/items?page=2", ITEMS_PAGE_2)
        .page("/items?q=widget", SEARCH_HIT)
        .page("/items?q=zzqxjwv-no-such-thing", SEARCH_MISS)
        .page("/items?q=", ITEMS_PAGE)
        .page("/about", ABOUT_PAGE)
}

/// Engine settings tightened for tests: shallow crawl, no settle delay.
#[allow(dead_code)]
pub fn test_settings() -> EngineSettings {
    EngineSettings {
        validation_concurrency: 2,
        max_depth: 2,
        time_budget: Duration::from_secs(30),
        settle: Duration::from_millis(1),
        check_timeout: Duration::from_secs(5),
    }
}

#[allow(dead_code)]
pub fn qa_request() -> RunRequest {
    RunRequest {
        base_url: BASE.to_string(),
        username: "qa".to_string(),
        password: "secret".to_string(),
        environment: Some("test".to_string()),
    }
}

/// An engine over a scripted app, with the event sink and run store exposed
/// for assertions. The temp dir must stay alive for as long as the store is
/// read.
pub struct Harness {
    pub engine: Engine,
    pub sink: Arc<MemorySink>,
    pub data_dir: TempDir,
}

#[allow(dead_code)]
pub fn harness(app: ScriptedApp) -> Harness {
    harness_with(app, RuleRegistry::with_builtin())
}

#[allow(dead_code)]
pub fn harness_with(app: ScriptedApp, registry: RuleRegistry) -> Harness {
    let data_dir = TempDir::new().expect("temp data dir");
    let sink = Arc::new(MemorySink::new());
    let engine = Engine::new(
        Arc::new(ScriptedBrowser::new(app)),
        Arc::new(registry),
        RunStore::new(data_dir.path()),
        Arc::clone(&sink) as Arc<dyn EventSink>,
        test_settings(),
    );
    Harness {
        engine,
        sink,
        data_dir,
    }
}

/// Polls the run until `pred` holds, panicking after five seconds.
#[allow(dead_code)]
pub async fn wait_until<F>(engine: &Engine, run_id: &str, mut pred: F) -> RunSnapshot
where
    F: FnMut(&RunSnapshot) -> bool,
{
    for _ in 0..500 {
        let snapshot = engine.get_state(run_id).expect("run should be known");
        if pred(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let snapshot = engine.get_state(run_id).expect("run should be known");
    panic!(
        "run {run_id} never reached the awaited condition (state {})",
        snapshot.state
    );
}
