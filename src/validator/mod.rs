//! Parallel validation of detected features.
//!
//! Each discovered page is validated in its own browser session; a semaphore
//! caps how many sessions run at once so the target application is never
//! flooded. Within a page, checks run strictly in catalog order, because a
//! check's interaction can leave residue the next check must not inherit
//! (every check re-navigates first).

mod checks;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::browser::BrowserDriver;
use crate::error_handling::{ErrorKind, ErrorStats};
use crate::events::{EngineEvent, EventSink};
use crate::identity::Fingerprint;
use crate::page::PageRecord;
use crate::rules::{FeatureType, RuleRegistry};

use checks::CheckOutcome;
pub(crate) use checks::resolve_selector;

/// Lifecycle status of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Queued, not yet started.
    Pending,
    /// Currently executing.
    Running,
    /// The assertion held.
    Passed,
    /// The assertion failed, the interaction errored, or the check timed out.
    Failed,
    /// The rule's selector matched nothing, or the rule was not executable
    /// on this page.
    Skipped,
}

/// Outcome of executing one rule against one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Rule that was executed.
    pub rule_id: String,
    /// Feature the rule belongs to.
    pub feature: FeatureType,
    /// Page the rule ran against.
    pub fingerprint: Fingerprint,
    /// Terminal status.
    pub status: CheckStatus,
    /// Wall-clock duration of the check.
    pub duration_ms: u64,
    /// Failure or skip detail, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Screenshot reference captured on failure, when the driver supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    /// When the check completed.
    pub completed_at: DateTime<Utc>,
}

/// Runs validation checks with bounded session concurrency.
pub struct ParallelValidator {
    driver: Arc<dyn BrowserDriver>,
    registry: Arc<RuleRegistry>,
    semaphore: Arc<Semaphore>,
    settle: Duration,
    check_timeout: Duration,
    error_stats: Arc<ErrorStats>,
}

impl ParallelValidator {
    /// Builds a validator capped at `concurrency` simultaneous sessions.
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        registry: Arc<RuleRegistry>,
        concurrency: usize,
        settle: Duration,
        check_timeout: Duration,
        error_stats: Arc<ErrorStats>,
    ) -> Self {
        ParallelValidator {
            driver,
            registry,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            settle,
            check_timeout,
            error_stats,
        }
    }

    /// Validates every rule of every feature detected on a page.
    ///
    /// Waits for a session permit, then executes checks serially within the
    /// page. Browser and timeout failures mark individual checks failed; the
    /// page's remaining checks still run. Cancellation skips whatever has
    /// not started yet.
    pub async fn validate_page(
        &self,
        run_id: &str,
        page: &PageRecord,
        cancel: &CancellationToken,
        sink: &dyn EventSink,
    ) -> Vec<ValidationResult> {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return Vec::new(),
        };

        let rules: Vec<_> = page
            .features
            .iter()
            .filter_map(|feature| self.registry.schema(feature))
            .flat_map(|schema| schema.rules.iter().cloned())
            .collect();
        if rules.is_empty() {
            return Vec::new();
        }

        let mut session = match self.driver.open_session().await {
            Ok(session) => session,
            Err(e) => {
                log::warn!("could not open a validation session for {}: {e}", page.fingerprint);
                self.error_stats.increment(ErrorKind::ValidationCheck);
                return rules
                    .iter()
                    .map(|rule| {
                        self.result(rule, page, CheckStatus::Failed, 0, Some(format!("session: {e}")))
                    })
                    .collect();
            }
        };

        let mut results = Vec::with_capacity(rules.len());
        for rule in &rules {
            if cancel.is_cancelled() {
                results.push(self.result(
                    rule,
                    page,
                    CheckStatus::Skipped,
                    0,
                    Some("run cancelled".to_string()),
                ));
                continue;
            }

            sink.emit(&EngineEvent::CheckStarted {
                run_id: run_id.to_string(),
                rule_id: rule.id.clone(),
                fingerprint: page.fingerprint.clone(),
            });

            let started = std::time::Instant::now();
            let outcome = match tokio::time::timeout(
                self.check_timeout,
                checks::run_check(&mut session, rule, &page.raw_url, self.settle),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => CheckOutcome::Failed(format!(
                    "check exceeded the {}s timeout",
                    self.check_timeout.as_secs()
                )),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            let (status, failure) = match outcome {
                CheckOutcome::Passed => (CheckStatus::Passed, None),
                CheckOutcome::Failed(detail) => {
                    self.error_stats.increment(ErrorKind::ValidationCheck);
                    log::warn!("check {} failed on {}: {detail}", rule.id, page.fingerprint);
                    (CheckStatus::Failed, Some(detail))
                }
                CheckOutcome::Skipped(detail) => {
                    log::debug!("check {} skipped on {}: {detail}", rule.id, page.fingerprint);
                    (CheckStatus::Skipped, Some(detail))
                }
            };

            let mut result = self.result(rule, page, status, duration_ms, failure);
            if status == CheckStatus::Failed {
                if let Ok(reference) = session.screenshot().await {
                    result.screenshot = reference;
                }
            }

            sink.emit(&EngineEvent::CheckCompleted {
                run_id: run_id.to_string(),
                result: result.clone(),
            });
            results.push(result);
        }
        results
    }

    fn result(
        &self,
        rule: &crate::rules::ValidationRule,
        page: &PageRecord,
        status: CheckStatus,
        duration_ms: u64,
        failure: Option<String>,
    ) -> ValidationResult {
        ValidationResult {
            rule_id: rule.id.clone(),
            feature: rule.feature.clone(),
            fingerprint: page.fingerprint.clone(),
            status,
            duration_ms,
            failure,
            screenshot: None,
            completed_at: Utc::now(),
        }
    }
}
