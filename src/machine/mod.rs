//! Run lifecycle state machine and the engine's public API.
//!
//! A run walks a fixed sequence of states; every transition is persisted
//! and narrated as an event, so an observer can always tell where a run is
//! and a crashed process leaves a readable trail. `FAILED` is reachable
//! from any non-terminal state.

mod crawl;
mod run;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::browser::BrowserDriver;
use crate::config::constants::{
    DEFAULT_CHECK_TIMEOUT_SECS, DEFAULT_MAX_DEPTH, DEFAULT_SETTLE_MS, DEFAULT_TIME_BUDGET_SECS,
    DEFAULT_VALIDATION_CONCURRENCY,
};
use crate::config::Config;
use crate::context::ContextQuestion;
use crate::coverage::CoverageEngine;
use crate::error_handling::{EngineError, ErrorKind, ErrorStats};
use crate::events::{EngineEvent, EventSink};
use crate::rules::RuleRegistry;
use crate::storage::{RunStore, StoredRun};

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Created, nothing attempted yet.
    Init,
    /// Navigating to the target and submitting credentials.
    Login,
    /// Verifying the post-login landing state.
    PostLoginValidate,
    /// Scanning the landing page for a tenant/workspace switcher.
    ContextDetect,
    /// Suspended until `answer` supplies a context selection.
    WaitContextInput,
    /// Crawling, validating, and generating.
    DiscoveryRun,
    /// Draining validation tasks and computing final coverage.
    TestGeneration,
    /// Finished successfully; artifacts are complete.
    Done,
    /// Finished unsuccessfully; partial artifacts are preserved.
    Failed,
}

impl RunState {
    /// Whether the run can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// Stable SCREAMING_SNAKE_CASE name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Init => "INIT",
            RunState::Login => "LOGIN",
            RunState::PostLoginValidate => "POST_LOGIN_VALIDATE",
            RunState::ContextDetect => "CONTEXT_DETECT",
            RunState::WaitContextInput => "WAIT_CONTEXT_INPUT",
            RunState::DiscoveryRun => "DISCOVERY_RUN",
            RunState::TestGeneration => "TEST_GENERATION",
            RunState::Done => "DONE",
            RunState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a caller may ask about a run, cheap to clone and persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Run identifier.
    pub run_id: String,
    /// Target base URL.
    pub base_url: String,
    /// Operator-supplied environment label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Current lifecycle state.
    pub state: RunState,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Last snapshot change.
    pub updated_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Confirmed unique pages so far.
    pub pages_discovered: usize,
    /// Checks that passed.
    pub checks_passed: usize,
    /// Checks that failed.
    pub checks_failed: usize,
    /// Checks that were skipped.
    pub checks_skipped: usize,
    /// Generated test cases.
    pub test_case_count: usize,
    /// Resolved tenant/workspace context, when one was chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Question the run is suspended on, while in `WAIT_CONTEXT_INPUT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_question: Option<ContextQuestion>,
    /// Recoverable error tallies by category.
    pub errors: BTreeMap<String, u64>,
    /// Why the run failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Parameters for starting a run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Target base URL.
    pub base_url: String,
    /// Login username; empty means attempt no login.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Free-form environment label carried into artifacts.
    pub environment: Option<String>,
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Cap on simultaneous validation sessions.
    pub validation_concurrency: usize,
    /// Maximum crawl depth from the landing page.
    pub max_depth: usize,
    /// Wall-clock budget for the discovery crawl.
    pub time_budget: Duration,
    /// Settle interval after each interaction.
    pub settle: Duration,
    /// Per-check timeout.
    pub check_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            validation_concurrency: DEFAULT_VALIDATION_CONCURRENCY,
            max_depth: DEFAULT_MAX_DEPTH,
            time_budget: Duration::from_secs(DEFAULT_TIME_BUDGET_SECS),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            check_timeout: Duration::from_secs(DEFAULT_CHECK_TIMEOUT_SECS),
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        EngineSettings {
            validation_concurrency: config.validation_concurrency,
            max_depth: config.max_depth,
            time_budget: Duration::from_secs(config.time_budget_seconds),
            settle: Duration::from_millis(config.settle_ms),
            check_timeout: Duration::from_secs(config.check_timeout_seconds),
        }
    }
}

pub(crate) struct EngineInner {
    pub(crate) driver: Arc<dyn BrowserDriver>,
    pub(crate) registry: Arc<RuleRegistry>,
    pub(crate) store: RunStore,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) settings: EngineSettings,
    runs: Mutex<HashMap<String, Arc<RunHandle>>>,
}

/// Shared mutable state of one in-flight run.
pub(crate) struct RunHandle {
    pub(crate) snapshot: Mutex<RunSnapshot>,
    pub(crate) cancel: CancellationToken,
    pub(crate) answer_tx: Mutex<Option<oneshot::Sender<String>>>,
    pub(crate) state_tx: watch::Sender<RunState>,
    pub(crate) error_stats: Arc<ErrorStats>,
}

impl RunHandle {
    /// Applies a mutation to the snapshot and returns the updated copy.
    pub(crate) fn update<F: FnOnce(&mut RunSnapshot)>(&self, f: F) -> RunSnapshot {
        let mut snapshot = self.snapshot.lock().expect("run snapshot lock poisoned");
        f(&mut snapshot);
        snapshot.updated_at = Utc::now();
        snapshot.errors = self.error_stats.snapshot();
        snapshot.clone()
    }

    pub(crate) fn current(&self) -> RunSnapshot {
        self.snapshot
            .lock()
            .expect("run snapshot lock poisoned")
            .clone()
    }
}

/// The discovery, validation, and coverage engine.
///
/// Owns every in-flight run; cheap to clone and share.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Builds an engine over a browser driver, rule registry, store, and
    /// event sink.
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        registry: Arc<RuleRegistry>,
        store: RunStore,
        sink: Arc<dyn EventSink>,
        settings: EngineSettings,
    ) -> Self {
        Engine {
            inner: Arc::new(EngineInner {
                driver,
                registry,
                store,
                sink,
                settings,
                runs: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn handle(&self, run_id: &str) -> Result<Arc<RunHandle>, EngineError> {
        self.inner
            .runs
            .lock()
            .expect("run table lock poisoned")
            .get(run_id)
            .cloned()
            .ok_or_else(|| EngineError::RunNotFound(run_id.to_string()))
    }

    /// Starts a run and returns its id. The run executes on a background
    /// task; observe it with [`Engine::get_state`], [`Engine::wait`], and
    /// the event sink.
    pub async fn start(&self, request: RunRequest) -> Result<String, EngineError> {
        let suffix = Alphanumeric.sample_string(&mut rand::rng(), 6).to_lowercase();
        let run_id = format!("{}-{suffix}", Utc::now().format("%Y%m%d%H%M%S"));
        self.inner.store.init_run(&run_id).await?;

        // Plugin files skipped at registry build time count against every
        // run using that registry.
        let error_stats = Arc::new(ErrorStats::default());
        for _ in 0..self.inner.registry.plugin_load_failures() {
            error_stats.increment(ErrorKind::PluginLoad);
        }

        let now = Utc::now();
        let snapshot = RunSnapshot {
            run_id: run_id.clone(),
            base_url: request.base_url.clone(),
            environment: request.environment.clone(),
            state: RunState::Init,
            started_at: now,
            updated_at: now,
            finished_at: None,
            pages_discovered: 0,
            checks_passed: 0,
            checks_failed: 0,
            checks_skipped: 0,
            test_case_count: 0,
            context: None,
            pending_question: None,
            errors: error_stats.snapshot(),
            failure_reason: None,
        };
        self.inner.store.write_snapshot(&snapshot).await?;

        let (state_tx, _) = watch::channel(RunState::Init);
        let handle = Arc::new(RunHandle {
            snapshot: Mutex::new(snapshot),
            cancel: CancellationToken::new(),
            answer_tx: Mutex::new(None),
            state_tx,
            error_stats,
        });
        self.inner
            .runs
            .lock()
            .expect("run table lock poisoned")
            .insert(run_id.clone(), Arc::clone(&handle));

        log::info!("starting run {run_id} against {}", request.base_url);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(run::drive_run(inner, handle, request));
        Ok(run_id)
    }

    /// The current snapshot of a run.
    pub fn get_state(&self, run_id: &str) -> Result<RunSnapshot, EngineError> {
        Ok(self.handle(run_id)?.current())
    }

    /// Answers the pending context question of a suspended run. Returns the
    /// snapshot as of the accepted answer; the run resumes in the
    /// background.
    pub fn answer(
        &self,
        run_id: &str,
        question_id: &str,
        selection: &str,
    ) -> Result<RunSnapshot, EngineError> {
        let handle = self.handle(run_id)?;
        {
            let snapshot = handle.snapshot.lock().expect("run snapshot lock poisoned");
            if snapshot.state != RunState::WaitContextInput {
                return Err(EngineError::NotAwaitingInput(run_id.to_string()));
            }
            let Some(question) = snapshot.pending_question.as_ref() else {
                return Err(EngineError::NotAwaitingInput(run_id.to_string()));
            };
            if question.question_id != question_id {
                return Err(EngineError::UnknownQuestion(question_id.to_string()));
            }
            if !question.options.iter().any(|o| o == selection) {
                return Err(EngineError::InvalidSelection(selection.to_string()));
            }
        }

        let sender = handle
            .answer_tx
            .lock()
            .expect("answer channel lock poisoned")
            .take();
        match sender {
            Some(tx) => {
                tx.send(selection.to_string())
                    .map_err(|_| EngineError::NotAwaitingInput(run_id.to_string()))?;
                Ok(handle.update(|s| s.pending_question = None))
            }
            None => Err(EngineError::NotAwaitingInput(run_id.to_string())),
        }
    }

    /// Requests cancellation. The run transitions to `FAILED` at its next
    /// cancellation point; partial artifacts are preserved.
    pub fn cancel(&self, run_id: &str) -> Result<(), EngineError> {
        let handle = self.handle(run_id)?;
        log::info!("cancelling run {run_id}");
        handle.cancel.cancel();
        Ok(())
    }

    /// Waits until the run reaches a terminal state and returns the final
    /// snapshot.
    pub async fn wait(&self, run_id: &str) -> Result<RunSnapshot, EngineError> {
        let handle = self.handle(run_id)?;
        let mut rx = handle.state_tx.subscribe();
        loop {
            if rx.borrow_and_update().is_terminal() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
        Ok(handle.current())
    }

    /// Loads everything persisted for a run, including finished ones from
    /// earlier processes. Runs that never reached their final coverage
    /// write get a report recomputed from the pages and cases on disk.
    pub async fn report(&self, run_id: &str) -> Result<StoredRun, EngineError> {
        let mut stored = self.inner.store.load_run(run_id).await?;
        if stored.coverage.is_none() {
            let scorer = CoverageEngine::new(Arc::clone(&self.inner.registry));
            stored.coverage = Some(scorer.report(run_id, &stored.pages, &stored.test_cases));
        }
        Ok(stored)
    }

    /// Drops the in-memory handles of terminal runs, returning how many
    /// were removed. Persisted artifacts stay on disk; [`Engine::report`]
    /// still serves pruned runs from the store.
    pub fn prune_finished(&self) -> usize {
        let mut runs = self.inner.runs.lock().expect("run table lock poisoned");
        let before = runs.len();
        runs.retain(|_, handle| !handle.current().state.is_terminal());
        before - runs.len()
    }
}

pub(crate) fn emit_state_change(
    inner: &EngineInner,
    handle: &RunHandle,
    from: RunState,
    to: RunState,
) {
    let run_id = handle.current().run_id;
    log::info!("run {run_id}: {from} -> {to}");
    inner.sink.emit(&EngineEvent::RunStateChanged { run_id, from, to });
    // The watch send comes last: a waiter woken by a terminal state must
    // already see the persisted snapshot and the emitted events.
    let _ = handle.state_tx.send(to);
}
