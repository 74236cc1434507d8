//! Single-check execution: resolve, act, settle, assert.

use std::sync::LazyLock;
use std::time::Duration;

use scraper::{Html, Selector};
use url::Url;

use crate::browser::BrowserSession;
use crate::rules::{Assertion, AssertionKind, RuleAction, ValidationRule};

static FIRST_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tbody tr, [role=row]").expect("static selector"));

/// Terminal outcome of one check, before it is stamped into a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CheckOutcome {
    Passed,
    Failed(String),
    Skipped(String),
}

/// Page state captured before and after the interaction.
#[derive(Debug, Clone)]
pub(crate) struct Measurement {
    pub row_count: usize,
    pub first_row: Option<String>,
    pub url: String,
}

pub(crate) fn measure(html: &str, url: &str) -> Measurement {
    let document = Html::parse_document(html);
    let row_count = crate::page::count_rows(&document);
    let first_row = document
        .select(&FIRST_ROW)
        .find(|row| row.select(&th_selector()).next().is_none())
        .map(|row| {
            // Adjacent cells stay space-separated: "Alpha active", not
            // "Alphaactive".
            row.text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty());
    Measurement {
        row_count,
        first_row,
        url: url.to_string(),
    }
}

fn th_selector() -> &'static Selector {
    static TH: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("th").expect("static selector"));
    &TH
}

/// Resolves the rule's selector against the current DOM.
///
/// Candidates are tried in declaration order; the first one that parses and
/// matches wins. Every candidate considered is debug-logged so a surprising
/// resolution can be traced afterwards.
pub(crate) fn resolve_selector(rule: &ValidationRule, html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    for candidate in rule.selector.expanded() {
        let selector = match Selector::parse(&candidate) {
            Ok(selector) => selector,
            Err(e) => {
                log::debug!("rule {}: candidate '{candidate}' unparseable: {e:?}", rule.id);
                continue;
            }
        };
        let hit = document.select(&selector).next().is_some();
        log::debug!(
            "rule {}: candidate '{candidate}' {}",
            rule.id,
            if hit { "matched" } else { "missed" }
        );
        if hit {
            return Some(candidate);
        }
    }
    None
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn element_visible(html: &str, selector: &str) -> Result<bool, String> {
    let parsed = Selector::parse(selector)
        .map_err(|e| format!("assertion selector '{selector}' unparseable: {e:?}"))?;
    let document = Html::parse_document(html);
    Ok(document.select(&parsed).any(|el| {
        if el.value().attr("hidden").is_some() {
            return false;
        }
        let style = el.value().attr("style").unwrap_or("").replace(' ', "");
        !style.contains("display:none") && !style.contains("visibility:hidden")
    }))
}

fn element_disabled(html: &str, selector: &str) -> Result<Option<bool>, String> {
    let parsed = Selector::parse(selector)
        .map_err(|e| format!("assertion selector '{selector}' unparseable: {e:?}"))?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&parsed)
        .next()
        .map(|el| el.value().attr("disabled").is_some()))
}

fn expected_of<'a>(assertion: &'a Assertion) -> Result<&'a str, CheckOutcome> {
    assertion
        .expected
        .as_deref()
        .ok_or_else(|| CheckOutcome::Skipped("assertion is missing its expected value".into()))
}

fn expected_count(assertion: &Assertion) -> Result<usize, CheckOutcome> {
    let raw = expected_of(assertion)?;
    raw.parse().map_err(|_| {
        CheckOutcome::Skipped(format!("expected value '{raw}' is not a row count"))
    })
}

/// Compares the post-interaction page against the rule's assertion.
pub(crate) fn evaluate(
    assertion: &Assertion,
    before: &Measurement,
    after: &Measurement,
    after_html: &str,
) -> CheckOutcome {
    let failed = |detail: String| CheckOutcome::Failed(detail);
    match assertion.kind {
        AssertionKind::RowCountChanged => {
            if after.row_count != before.row_count {
                CheckOutcome::Passed
            } else {
                failed(format!("row count stayed at {}", after.row_count))
            }
        }
        AssertionKind::RowCountEquals => match expected_count(assertion) {
            Ok(n) if after.row_count == n => CheckOutcome::Passed,
            Ok(n) => failed(format!("expected {n} rows, saw {}", after.row_count)),
            Err(outcome) => outcome,
        },
        AssertionKind::RowCountAtLeast => match expected_count(assertion) {
            Ok(n) if after.row_count >= n => CheckOutcome::Passed,
            Ok(n) => failed(format!("expected at least {n} rows, saw {}", after.row_count)),
            Err(outcome) => outcome,
        },
        AssertionKind::RowCountAtMost => match expected_count(assertion) {
            Ok(n) if after.row_count <= n => CheckOutcome::Passed,
            Ok(n) => failed(format!("expected at most {n} rows, saw {}", after.row_count)),
            Err(outcome) => outcome,
        },
        AssertionKind::FirstRowChanged => {
            if after.first_row != before.first_row {
                CheckOutcome::Passed
            } else {
                failed("first row did not change".into())
            }
        }
        AssertionKind::FirstRowContains => match expected_of(assertion) {
            Ok(needle) => {
                let haystack = after.first_row.as_deref().unwrap_or("").to_lowercase();
                if haystack.contains(&needle.to_lowercase()) {
                    CheckOutcome::Passed
                } else {
                    failed(format!("first row does not contain '{needle}'"))
                }
            }
            Err(outcome) => outcome,
        },
        AssertionKind::UrlParamPresent => match expected_of(assertion) {
            Ok(name) => {
                if query_param(&after.url, name).is_some() {
                    CheckOutcome::Passed
                } else {
                    failed(format!("url {} lacks parameter '{name}'", after.url))
                }
            }
            Err(outcome) => outcome,
        },
        AssertionKind::UrlParamEquals => match expected_of(assertion) {
            Ok(pair) => match pair.split_once('=') {
                Some((name, value)) => match query_param(&after.url, name) {
                    Some(actual) if actual == value => CheckOutcome::Passed,
                    Some(actual) => {
                        failed(format!("parameter '{name}' is '{actual}', expected '{value}'"))
                    }
                    None => failed(format!("url {} lacks parameter '{name}'", after.url)),
                },
                None => CheckOutcome::Skipped(format!(
                    "expected value '{pair}' is not of the form name=value"
                )),
            },
            Err(outcome) => outcome,
        },
        AssertionKind::UrlChanged => {
            if after.url != before.url {
                CheckOutcome::Passed
            } else {
                failed(format!("url stayed at {}", after.url))
            }
        }
        AssertionKind::ElementVisible => match expected_of(assertion) {
            Ok(selector) => match element_visible(after_html, selector) {
                Ok(true) => CheckOutcome::Passed,
                Ok(false) => failed(format!("no visible element matches '{selector}'")),
                Err(detail) => CheckOutcome::Skipped(detail),
            },
            Err(outcome) => outcome,
        },
        AssertionKind::ElementHidden => match expected_of(assertion) {
            Ok(selector) => match element_visible(after_html, selector) {
                Ok(false) => CheckOutcome::Passed,
                Ok(true) => failed(format!("a visible element matches '{selector}'")),
                Err(detail) => CheckOutcome::Skipped(detail),
            },
            Err(outcome) => outcome,
        },
        AssertionKind::ElementDisabled => match expected_of(assertion) {
            Ok(selector) => match element_disabled(after_html, selector) {
                Ok(Some(true)) => CheckOutcome::Passed,
                Ok(Some(false)) => failed(format!("element '{selector}' is enabled")),
                Ok(None) => failed(format!("no element matches '{selector}'")),
                Err(detail) => CheckOutcome::Skipped(detail),
            },
            Err(outcome) => outcome,
        },
        AssertionKind::ElementEnabled => match expected_of(assertion) {
            Ok(selector) => match element_disabled(after_html, selector) {
                Ok(Some(false)) => CheckOutcome::Passed,
                Ok(Some(true)) => failed(format!("element '{selector}' is disabled")),
                Ok(None) => failed(format!("no element matches '{selector}'")),
                Err(detail) => CheckOutcome::Skipped(detail),
            },
            Err(outcome) => outcome,
        },
    }
}

/// Executes one rule against a session already holding the page under test.
///
/// The session is re-navigated to `page_url` first, so rules within a page
/// never see each other's residue. Browser errors fail the check, never the
/// run.
pub(crate) async fn run_check(
    session: &mut Box<dyn BrowserSession>,
    rule: &ValidationRule,
    page_url: &str,
    settle: Duration,
) -> CheckOutcome {
    let view = match session.navigate(page_url).await {
        Ok(view) => view,
        Err(e) => return CheckOutcome::Failed(format!("navigation failed: {e}")),
    };

    let Some(selector) = resolve_selector(rule, &view.html) else {
        return CheckOutcome::Skipped("no selector candidate matched the page".into());
    };

    let before = measure(&view.html, &view.final_url);

    let input = rule.test_data.as_ref().map(|t| t.instantiate());
    let action_result = match rule.action {
        RuleAction::Click => session.click(&selector).await.map(|_| ()),
        RuleAction::Fill => {
            let value = input.unwrap_or_default();
            match session.fill(&selector, &value).await {
                Ok(()) => session.submit(&selector).await.map(|_| ()),
                Err(e) => Err(e),
            }
        }
        RuleAction::Select => {
            let Some(value) = input else {
                return CheckOutcome::Skipped("select rule has no test data".into());
            };
            session.select(&selector, &value).await.map(|_| ())
        }
    };
    if let Err(e) = action_result {
        return CheckOutcome::Failed(format!("{:?} on '{selector}' failed: {e}", rule.action));
    }

    tokio::time::sleep(settle).await;

    let after_view = match session.current() {
        Ok(view) => view,
        Err(e) => return CheckOutcome::Failed(format!("no page after interaction: {e}")),
    };
    let after = measure(&after_view.html, &after_view.final_url);

    evaluate(&rule.assertion, &before, &after, &after_view.html)
}
