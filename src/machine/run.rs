//! The run driver: login, landing validation, context resolution, and the
//! terminal bookkeeping around the crawl.

use std::sync::{Arc, LazyLock};

use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use tokio::sync::oneshot;

use crate::browser::{BrowserSession, PageView};
use crate::config::constants::LOGIN_ATTEMPTS;
use crate::context::{detect_context, ContextDecision};
use crate::coverage::CoverageEngine;
use crate::error_handling::{EngineError, ErrorKind};
use crate::events::EngineEvent;
use crate::page::css_path;
use crate::validator::CheckStatus;

use super::crawl::{self, CrawlOutcome};
use super::{emit_state_change, EngineInner, RunHandle, RunRequest, RunState};

static PASSWORD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[type=password]").expect("static selector"));
static USERNAME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("input[type=email], input[type=text], input:not([type])")
        .expect("static selector")
});
static SUBMIT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("button[type=submit], input[type=submit], button").expect("static selector")
});
static LANDMARK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href], table, form, [role=grid], nav, main").expect("static selector")
});

pub(crate) async fn drive_run(
    inner: Arc<EngineInner>,
    handle: Arc<RunHandle>,
    request: RunRequest,
) {
    let run_id = handle.current().run_id;
    match execute(&inner, &handle, &request, &run_id).await {
        Ok(()) => {
            transition(&inner, &handle, RunState::Done).await;
            log::info!("run {run_id} finished");
        }
        Err(e) => {
            let reason = e.to_string();
            log::error!("run {run_id} failed: {reason}");
            handle.update(|s| s.failure_reason = Some(reason.clone()));
            // The failure event and the persisted terminal snapshot must
            // both be in place before the watch channel wakes waiters.
            inner.sink.emit(&EngineEvent::RunFailed {
                run_id: run_id.clone(),
                reason,
            });
            transition(&inner, &handle, RunState::Failed).await;
        }
    }
}

async fn transition(inner: &EngineInner, handle: &RunHandle, to: RunState) {
    let from = handle.current().state;
    let snapshot = handle.update(|s| {
        s.state = to;
        if to.is_terminal() {
            s.finished_at = Some(Utc::now());
        }
    });
    if let Err(e) = inner.store.write_snapshot(&snapshot).await {
        log::warn!("run {}: could not persist snapshot: {e}", snapshot.run_id);
    }
    emit_state_change(inner, handle, from, to);
}

fn bail_if_cancelled(handle: &RunHandle) -> Result<(), EngineError> {
    if handle.cancel.is_cancelled() {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}

async fn execute(
    inner: &Arc<EngineInner>,
    handle: &Arc<RunHandle>,
    request: &RunRequest,
    run_id: &str,
) -> Result<(), EngineError> {
    transition(inner, handle, RunState::Login).await;
    bail_if_cancelled(handle)?;
    let mut session = inner.driver.open_session().await?;
    let (landing, attempted_login) = login(&mut session, request).await?;

    transition(inner, handle, RunState::PostLoginValidate).await;
    bail_if_cancelled(handle)?;
    validate_landing(&landing, attempted_login)?;

    transition(inner, handle, RunState::ContextDetect).await;
    bail_if_cancelled(handle)?;
    let landing = resolve_context(inner, handle, &mut session, landing, run_id).await?;

    transition(inner, handle, RunState::DiscoveryRun).await;
    let outcome = crawl::discover(inner, handle, &mut session, run_id, &landing).await?;

    transition(inner, handle, RunState::TestGeneration).await;
    finalize(inner, handle, run_id, outcome).await?;
    Ok(())
}

struct LoginForm {
    username: Option<String>,
    password: String,
    submit: Option<String>,
}

fn find_login_form(html: &str) -> Option<LoginForm> {
    let document = Html::parse_document(html);
    let password_el = document.select(&PASSWORD).next()?;
    let password = css_path(password_el);
    let form = password_el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "form");
    let (username, submit) = match form {
        Some(form) => (
            form.select(&USERNAME).next().map(css_path),
            form.select(&SUBMIT).next().map(css_path),
        ),
        None => (
            document.select(&USERNAME).next().map(css_path),
            document.select(&SUBMIT).next().map(css_path),
        ),
    };
    Some(LoginForm {
        username,
        password,
        submit,
    })
}

/// Reaches the target and authenticates when a login form is present.
///
/// Only the initial navigation is retried; rejected credentials never are.
/// Returns the landing view and whether credentials were submitted.
async fn login(
    session: &mut Box<dyn BrowserSession>,
    request: &RunRequest,
) -> Result<(PageView, bool), EngineError> {
    let mut view = None;
    let mut last_error = String::new();
    for attempt in 1..=LOGIN_ATTEMPTS {
        match session.navigate(&request.base_url).await {
            Ok(v) => {
                view = Some(v);
                break;
            }
            Err(e) => {
                log::warn!(
                    "attempt {attempt}/{LOGIN_ATTEMPTS}: could not reach {}: {e}",
                    request.base_url
                );
                last_error = e.to_string();
            }
        }
    }
    let view = view.ok_or(EngineError::TargetUnreachable(last_error))?;

    let Some(form) = find_login_form(&view.html) else {
        log::info!("no login form at {}; proceeding unauthenticated", request.base_url);
        return Ok((view, false));
    };
    if request.username.is_empty() && request.password.is_empty() {
        log::warn!("login form present but no credentials supplied; proceeding unauthenticated");
        return Ok((view, false));
    }

    if let Some(username_selector) = &form.username {
        session
            .fill(username_selector, &request.username)
            .await
            .map_err(|e| EngineError::LoginFailed(format!("filling username: {e}")))?;
    }
    session
        .fill(&form.password, &request.password)
        .await
        .map_err(|e| EngineError::LoginFailed(format!("filling password: {e}")))?;

    let landed = match &form.submit {
        Some(selector) => session.click(selector).await,
        None => session.submit(&form.password).await,
    }
    .map_err(|e| EngineError::LoginFailed(format!("submitting credentials: {e}")))?;
    Ok((landed, true))
}

/// Checks the post-login landing state is something the crawl can work with.
fn validate_landing(view: &PageView, attempted_login: bool) -> Result<(), EngineError> {
    let document = Html::parse_document(&view.html);
    if attempted_login && document.select(&PASSWORD).next().is_some() {
        return Err(EngineError::LoginFailed(
            "still on a login form after submitting credentials".to_string(),
        ));
    }
    if document.select(&LANDMARK).next().is_none() {
        return Err(EngineError::LoginFailed(format!(
            "unrecognized landing page at {}",
            view.final_url
        )));
    }
    log::info!("landed on {}", view.final_url);
    Ok(())
}

/// Detects the tenant/workspace context, suspending the run when the choice
/// is ambiguous.
async fn resolve_context(
    inner: &EngineInner,
    handle: &RunHandle,
    session: &mut Box<dyn BrowserSession>,
    landing: PageView,
    run_id: &str,
) -> Result<PageView, EngineError> {
    match detect_context(&landing.html) {
        ContextDecision::Proceed(context) => {
            if let Some(label) = &context {
                log::info!("single context '{label}' detected; proceeding");
            }
            handle.update(|s| s.context = context.clone());
            inner.sink.emit(&EngineEvent::ContextResolved {
                run_id: run_id.to_string(),
                context,
            });
            Ok(landing)
        }
        ContextDecision::Ask(mut question) => {
            if let Ok(reference) = session.screenshot().await {
                question.screenshot = reference;
            }
            let (tx, rx) = oneshot::channel();
            *handle
                .answer_tx
                .lock()
                .expect("answer channel lock poisoned") = Some(tx);
            handle.update(|s| s.pending_question = Some(question.clone()));
            transition(inner, handle, RunState::WaitContextInput).await;
            inner.sink.emit(&EngineEvent::ContextQuestionRaised {
                run_id: run_id.to_string(),
                question: question.clone(),
            });
            log::info!(
                "run {run_id} suspended: {} ({} options)",
                question.prompt,
                question.options.len()
            );

            let selection = tokio::select! {
                _ = handle.cancel.cancelled() => return Err(EngineError::Cancelled),
                answer = rx => answer.map_err(|_| EngineError::Cancelled)?,
            };
            handle.update(|s| {
                s.pending_question = None;
                s.context = Some(selection.clone());
            });
            inner.sink.emit(&EngineEvent::ContextResolved {
                run_id: run_id.to_string(),
                context: Some(selection.clone()),
            });

            match session.select(&question.selector, &selection).await {
                Ok(view) => Ok(view),
                Err(e) => {
                    // Context application failing is recoverable: crawl the
                    // landing state the application already shows.
                    log::warn!("could not apply context '{selection}': {e}");
                    handle.error_stats.increment(ErrorKind::ContextDetection);
                    Ok(landing)
                }
            }
        }
    }
}

/// Drains validation tasks, tallies check outcomes, and writes the final
/// coverage report.
async fn finalize(
    inner: &EngineInner,
    handle: &RunHandle,
    run_id: &str,
    outcome: CrawlOutcome,
) -> Result<(), EngineError> {
    let CrawlOutcome {
        pages,
        cases,
        gaps,
        mut checks,
    } = outcome;

    while let Some(joined) = checks.join_next().await {
        let results = match joined {
            Ok(results) => results,
            Err(e) => {
                log::warn!("validation task panicked: {e}");
                continue;
            }
        };
        for result in results {
            if let Err(e) = inner.store.append_result(run_id, &result).await {
                log::warn!("could not persist result for {}: {e}", result.rule_id);
            }
            handle.update(|s| match result.status {
                CheckStatus::Passed => s.checks_passed += 1,
                CheckStatus::Failed => s.checks_failed += 1,
                CheckStatus::Skipped => s.checks_skipped += 1,
                CheckStatus::Pending | CheckStatus::Running => {}
            });
        }
    }

    for gap in &gaps {
        log::info!(
            "coverage gap: rule {} on {}: {}",
            gap.rule_id,
            gap.fingerprint,
            gap.reason
        );
    }

    let report = CoverageEngine::new(Arc::clone(&inner.registry)).report(run_id, &pages, &cases);
    inner.store.write_coverage(run_id, &report).await?;
    inner.sink.emit(&EngineEvent::CoverageUpdated {
        run_id: run_id.to_string(),
        overall_percent: report.overall_percent,
    });
    log::info!(
        "run {run_id}: {} pages, {} cases, {:.1}% coverage",
        pages.len(),
        cases.len(),
        report.overall_percent
    );

    let snapshot = handle.update(|s| s.test_case_count = cases.len());
    inner.store.write_snapshot(&snapshot).await?;
    Ok(())
}
