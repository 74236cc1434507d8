//! Tenant/workspace context detection.
//!
//! After login, many multi-tenant applications present a switcher (tenant,
//! project, workspace, environment) that scopes everything the crawl will
//! see. This module scans the post-login DOM for such a switcher, extracts
//! its option labels, and decides whether the run can proceed on its own or
//! must pause and ask the operator which context to use.

use std::collections::HashSet;
use std::sync::LazyLock;

use rand::distr::{Alphanumeric, SampleString};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::config::constants::{
    CONTEXT_KEYWORDS, CONTEXT_LABEL_MAX_LEN, CONTEXT_LABEL_MIN_LEN, MAX_CONTEXT_OPTIONS,
    PLACEHOLDER_LABELS,
};
use crate::page::css_path;

static SELECT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("select").expect("static selector"));
static MENU: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[role=listbox], [role=menu], nav, ul, div").expect("static selector")
});
static OPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("option").expect("static selector"));
static MENU_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li, a, [role=option], [role=menuitem]").expect("static selector"));

/// A question the engine cannot answer on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextQuestion {
    /// Opaque id the answer must echo back.
    pub question_id: String,
    /// Human-readable prompt.
    pub prompt: String,
    /// Question kind; currently always `select_one`.
    pub kind: String,
    /// Option labels, in page order, deduplicated.
    pub options: Vec<String>,
    /// Screenshot reference of the switcher, when the driver captured one.
    pub screenshot: Option<String>,
    /// CSS selector of the switcher, used to apply the answer.
    pub selector: String,
}

/// Outcome of scanning a page for a context switcher.
#[derive(Debug, Clone)]
pub enum ContextDecision {
    /// No ambiguity: continue, optionally noting the single detected context.
    Proceed(Option<String>),
    /// More than one context is available; the operator must pick.
    Ask(ContextQuestion),
}

fn attr_matches_keywords(element: ElementRef<'_>) -> bool {
    let haystack = ["name", "id", "class", "aria-label", "data-testid"]
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    CONTEXT_KEYWORDS.iter().any(|kw| haystack.contains(kw))
}

fn clean_label(raw: &str) -> Option<String> {
    let label = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let len = label.chars().count();
    if !(CONTEXT_LABEL_MIN_LEN..=CONTEXT_LABEL_MAX_LEN).contains(&len) {
        return None;
    }
    let lowered = label.to_lowercase();
    // "Select", but also "Select tenant" and the like.
    if PLACEHOLDER_LABELS
        .iter()
        .any(|p| lowered == *p || lowered.starts_with(&format!("{p} ")))
    {
        return None;
    }
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return None;
    }
    Some(label)
}

fn extract_options(widget: ElementRef<'_>, item_selector: &Selector) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut options = Vec::new();
    let mut total = 0usize;
    for item in widget.select(item_selector) {
        let text = item.text().collect::<String>();
        let Some(label) = clean_label(&text) else {
            continue;
        };
        if !seen.insert(label.to_lowercase()) {
            continue;
        }
        total += 1;
        if options.len() < MAX_CONTEXT_OPTIONS {
            options.push(label);
        }
    }
    if total > MAX_CONTEXT_OPTIONS {
        log::warn!(
            "context switcher offers {total} options; presenting the first {MAX_CONTEXT_OPTIONS}"
        );
    }
    options
}

fn widget_name(element: ElementRef<'_>) -> String {
    for attr in ["name", "id", "aria-label"] {
        if let Some(value) = element.value().attr(attr) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    element.value().name().to_string()
}

fn question_for(widget: ElementRef<'_>, options: Vec<String>) -> ContextQuestion {
    let suffix = Alphanumeric.sample_string(&mut rand::rng(), 6).to_lowercase();
    ContextQuestion {
        question_id: format!("ctx-{suffix}"),
        prompt: format!(
            "Which context should the run use? ({} offers {} options)",
            widget_name(widget),
            options.len()
        ),
        kind: "select_one".to_string(),
        options,
        screenshot: None,
        selector: css_path(widget),
    }
}

/// Scans a post-login page for a context switcher.
///
/// The first keyword-matching widget with usable options wins; every
/// candidate considered is debug-logged so a surprising pick can be traced.
/// With zero or one option the run proceeds without input. Detection never
/// fails a run: a page this heuristic cannot read yields `Proceed(None)`.
pub fn detect_context(html: &str) -> ContextDecision {
    let document = Html::parse_document(html);

    for widget in document.select(&SELECT) {
        if !attr_matches_keywords(widget) {
            continue;
        }
        log::debug!("context candidate <select>: {}", widget_name(widget));
        let options = extract_options(widget, &OPTION);
        match options.len() {
            0 => continue,
            1 => return ContextDecision::Proceed(Some(options[0].clone())),
            _ => return ContextDecision::Ask(question_for(widget, options)),
        }
    }

    for widget in document.select(&MENU) {
        if !attr_matches_keywords(widget) {
            continue;
        }
        log::debug!(
            "context candidate <{}>: {}",
            widget.value().name(),
            widget_name(widget)
        );
        let options = extract_options(widget, &MENU_ITEM);
        match options.len() {
            0 => continue,
            1 => return ContextDecision::Proceed(Some(options[0].clone())),
            _ => return ContextDecision::Ask(question_for(widget, options)),
        }
    }

    ContextDecision::Proceed(None)
}
