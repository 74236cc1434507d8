//! The discovery crawl.
//!
//! One crawl session walks the application breadth-first from the landing
//! page. Fingerprints are claimed before navigating and released on failure,
//! so redirect chains and click paths converging on one logical page dedupe
//! to a single record. Validation is dispatched as soon as a page is
//! admitted; only the crawl itself is serial.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use url::Url;

use crate::browser::{BrowserSession, PageView};
use crate::error_handling::{EngineError, ErrorKind};
use crate::events::EngineEvent;
use crate::generator::{CoverageGap, TestCase, TestCaseGenerator};
use crate::identity::{page_identity, Fingerprint, VisitedSet};
use crate::page::{analyze_signature, enumerate_interactive, PageRecord};
use crate::validator::{ParallelValidator, ValidationResult};

use super::{EngineInner, RunHandle};

/// Everything the crawl produced, handed to the generation phase.
pub(crate) struct CrawlOutcome {
    pub(crate) pages: Vec<PageRecord>,
    pub(crate) cases: Vec<TestCase>,
    pub(crate) gaps: Vec<CoverageGap>,
    pub(crate) checks: JoinSet<Vec<ValidationResult>>,
}

enum Pending {
    /// A statically-known target; its fingerprint is claimed before the
    /// navigation is attempted.
    Href { url: String, depth: usize },
    /// A click-only element; the destination is unknown until clicked, so
    /// the claim happens after the fact and duplicates are discarded.
    Click {
        source_url: String,
        selector: String,
        label: String,
        depth: usize,
    },
}

struct Crawl<'a> {
    inner: &'a Arc<EngineInner>,
    handle: &'a Arc<RunHandle>,
    run_id: &'a str,
    validator: Arc<ParallelValidator>,
    generator: TestCaseGenerator,
    detection: Vec<String>,
    visited: VisitedSet,
    queue: VecDeque<Pending>,
    outcome: CrawlOutcome,
}

pub(crate) async fn discover(
    inner: &Arc<EngineInner>,
    handle: &Arc<RunHandle>,
    session: &mut Box<dyn BrowserSession>,
    run_id: &str,
    landing: &PageView,
) -> Result<CrawlOutcome, EngineError> {
    let validator = Arc::new(ParallelValidator::new(
        Arc::clone(&inner.driver),
        Arc::clone(&inner.registry),
        inner.settings.validation_concurrency,
        inner.settings.settle,
        inner.settings.check_timeout,
        Arc::clone(&handle.error_stats),
    ));
    let generator = TestCaseGenerator::new(
        Arc::clone(&inner.registry),
        inner.settings.settle.as_millis() as u64,
    );
    let mut crawl = Crawl {
        inner,
        handle,
        run_id,
        validator,
        generator,
        detection: inner.registry.detection_selectors(),
        visited: VisitedSet::new(),
        queue: VecDeque::new(),
        outcome: CrawlOutcome {
            pages: Vec::new(),
            cases: Vec::new(),
            gaps: Vec::new(),
            checks: JoinSet::new(),
        },
    };

    let Some((normalized, fingerprint)) = page_identity(&landing.final_url) else {
        return Err(EngineError::TargetUnreachable(format!(
            "unparseable landing url {}",
            landing.final_url
        )));
    };
    crawl.visited.claim(&fingerprint);
    crawl.visited.confirm(&fingerprint);
    // A login redirect means the requested URL is an alias for the landing
    // page; confirm it so the crawl does not walk back into it.
    if let Some((_, requested)) = page_identity(&landing.requested_url) {
        if requested != fingerprint {
            crawl.visited.confirm(&requested);
        }
    }
    crawl.admit(landing, normalized, fingerprint, 0).await;

    let deadline = Instant::now() + inner.settings.time_budget;
    while let Some(item) = crawl.queue.pop_front() {
        if handle.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if Instant::now() >= deadline {
            log::warn!(
                "run {run_id}: time budget exhausted with {} pending navigations",
                crawl.queue.len() + 1
            );
            break;
        }
        match item {
            Pending::Href { url, depth } => crawl.follow_href(session, &url, depth).await,
            Pending::Click {
                source_url,
                selector,
                label,
                depth,
            } => {
                crawl
                    .follow_click(session, &source_url, &selector, &label, depth)
                    .await
            }
        }
    }
    Ok(crawl.outcome)
}

impl Crawl<'_> {
    async fn follow_href(
        &mut self,
        session: &mut Box<dyn BrowserSession>,
        url: &str,
        depth: usize,
    ) {
        let Some((_, fingerprint)) = page_identity(url) else {
            return;
        };
        if !self.visited.claim(&fingerprint) {
            return;
        }
        let view = match session.navigate(url).await {
            Ok(view) => view,
            Err(e) => {
                self.visited.release(&fingerprint);
                self.handle.error_stats.increment(ErrorKind::Navigation);
                log::warn!("navigation to {url} failed: {e}");
                return;
            }
        };

        let Some((normalized, final_fp)) = page_identity(&view.final_url) else {
            self.visited.release(&fingerprint);
            return;
        };
        if final_fp != fingerprint {
            // Redirected. The requested identity is an alias either way;
            // the redirect target may itself already be known.
            self.visited.confirm(&fingerprint);
            if !self.visited.claim(&final_fp) {
                return;
            }
        }
        self.visited.confirm(&final_fp);
        self.admit(&view, normalized, final_fp, depth).await;
    }

    async fn follow_click(
        &mut self,
        session: &mut Box<dyn BrowserSession>,
        source_url: &str,
        selector: &str,
        label: &str,
        depth: usize,
    ) {
        if let Err(e) = session.navigate(source_url).await {
            self.handle.error_stats.increment(ErrorKind::Navigation);
            log::warn!("could not return to {source_url} for '{label}': {e}");
            return;
        }
        let view = match session.click(selector).await {
            Ok(view) => view,
            Err(e) => {
                self.handle.error_stats.increment(ErrorKind::Navigation);
                log::debug!("click-only element '{label}' on {source_url} failed: {e}");
                return;
            }
        };
        let Some((normalized, fingerprint)) = page_identity(&view.final_url) else {
            return;
        };
        // Destination only known now; a duplicate is simply discarded.
        if !self.visited.claim(&fingerprint) {
            return;
        }
        self.visited.confirm(&fingerprint);
        self.admit(&view, normalized, fingerprint, depth).await;
    }

    /// Records a confirmed page: analyze, persist, dispatch validation,
    /// generate cases, and enqueue its outgoing elements.
    async fn admit(
        &mut self,
        view: &PageView,
        normalized: String,
        fingerprint: Fingerprint,
        depth: usize,
    ) {
        let signature = analyze_signature(&view.html, &self.detection);
        let features = self.inner.registry.detect_features(&signature);
        let record = PageRecord::new(
            fingerprint.clone(),
            view.final_url.clone(),
            normalized.clone(),
            depth,
            signature,
            features.clone(),
            view.html.clone(),
        );
        log::info!(
            "discovered {normalized} (depth {depth}, features: [{}])",
            features
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        if let Err(e) = self.inner.store.append_page(self.run_id, &record).await {
            log::warn!("could not persist page {fingerprint}: {e}");
        }
        let snapshot = self.handle.update(|s| s.pages_discovered += 1);
        if let Err(e) = self.inner.store.write_snapshot(&snapshot).await {
            log::warn!("could not persist snapshot: {e}");
        }
        self.inner.sink.emit(&EngineEvent::PageDiscovered {
            run_id: self.run_id.to_string(),
            fingerprint: fingerprint.clone(),
            normalized_url: normalized,
            depth,
            features: features.clone(),
        });

        if !features.is_empty() {
            let validator = Arc::clone(&self.validator);
            let page = record.clone();
            let cancel = self.handle.cancel.clone();
            let sink = Arc::clone(&self.inner.sink);
            let run_id = self.run_id.to_string();
            self.outcome.checks.spawn(async move {
                validator
                    .validate_page(&run_id, &page, &cancel, sink.as_ref())
                    .await
            });
        }

        let generated = self.generator.generate_for_page(&record);
        if !generated.cases.is_empty() {
            if let Err(e) = self
                .inner
                .store
                .append_test_cases(self.run_id, &generated.cases)
                .await
            {
                log::warn!("could not persist test cases for {fingerprint}: {e}");
            }
            self.inner.sink.emit(&EngineEvent::TestCasesGenerated {
                run_id: self.run_id.to_string(),
                fingerprint,
                count: generated.cases.len(),
            });
        }
        self.outcome.cases.extend(generated.cases);
        self.outcome.gaps.extend(generated.gaps);

        if depth < self.inner.settings.max_depth {
            if let Ok(base) = Url::parse(&view.final_url) {
                for element in enumerate_interactive(&view.html, &base) {
                    let pending = match element.target_url {
                        Some(url) => Pending::Href {
                            url,
                            depth: depth + 1,
                        },
                        None => Pending::Click {
                            source_url: view.final_url.clone(),
                            selector: element.selector,
                            label: element.label,
                            depth: depth + 1,
                        },
                    };
                    self.queue.push_back(pending);
                }
            }
        }
        self.outcome.pages.push(record);
    }
}
