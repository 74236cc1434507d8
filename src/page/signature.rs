//! Structural page signatures.
//!
//! A signature captures what a page *is* (tables, forms, primary actions,
//! row counts, control vocabulary) without retaining the DOM, so feature
//! detection can run against it cheaply and it can be persisted with the
//! page record.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("static selector"));
static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table, [role=grid]").expect("static selector"));
static FORM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form").expect("static selector"));
static BODY_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tbody tr").expect("static selector"));
static ROLE_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[role=row]").expect("static selector"));
static HEADER_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th").expect("static selector"));
static PRIMARY_ACTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("button, input[type=submit], a.btn, a[class*=button]")
        .expect("static selector")
});
static CONTROL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("input, select, textarea, button, a[href]").expect("static selector")
});

/// Structural signature of one page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSignature {
    /// Document title, if present.
    pub title: Option<String>,
    /// Whether the page contains a data table or grid.
    pub has_table: bool,
    /// Whether the page contains at least one form.
    pub has_form: bool,
    /// Number of forms.
    pub form_count: usize,
    /// Number of visible data rows (body rows preferred over raw `tr`s).
    pub row_count: usize,
    /// Visible labels of buttons and button-styled links.
    pub primary_actions: Vec<String>,
    /// Table header cell texts, lowercased.
    pub table_headers: Vec<String>,
    /// Lowercased tokens from control attributes (`id`, `name`, `class`,
    /// `placeholder`, `type`) — the vocabulary keyword detection scans.
    pub control_tokens: Vec<String>,
    /// The subset of the registry's detection selectors that matched this
    /// page's DOM during analysis.
    pub selector_hits: Vec<String>,
}

impl PageSignature {
    /// Whether any signature vocabulary contains the keyword.
    pub fn contains_token(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        self.control_tokens.iter().any(|t| t.contains(&keyword))
            || self.table_headers.iter().any(|t| t.contains(&keyword))
            || self
                .primary_actions
                .iter()
                .any(|t| t.to_lowercase().contains(&keyword))
    }
}

/// Counts visible data rows in a document.
///
/// Table body rows that carry no header cells are counted (the parser
/// inserts an implicit `tbody`, so header rows outside a `thead` must be
/// excluded explicitly); ARIA grids fall back to `[role=row]`.
pub(crate) fn count_rows(document: &Html) -> usize {
    let body_rows = document
        .select(&BODY_ROW)
        .filter(|row| row.select(&HEADER_CELL).next().is_none())
        .count();
    if body_rows > 0 {
        return body_rows;
    }
    document.select(&ROLE_ROW).count()
}

/// Analyzes an HTML document into a [`PageSignature`].
///
/// `detection_selectors` is the union of every registered schema's
/// detection selectors; the ones that match are recorded as hits so
/// providers can detect features from the signature alone.
pub fn analyze_signature(html: &str, detection_selectors: &[String]) -> PageSignature {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let has_table = document.select(&TABLE).next().is_some();
    let form_count = document.select(&FORM).count();
    let row_count = count_rows(&document);

    let mut primary_actions = Vec::new();
    for action in document.select(&PRIMARY_ACTION) {
        let label = action.text().collect::<String>().trim().to_string();
        let label = if label.is_empty() {
            action.value().attr("value").unwrap_or("").trim().to_string()
        } else {
            label
        };
        if !label.is_empty() && !primary_actions.contains(&label) {
            primary_actions.push(label);
        }
    }

    let table_headers: Vec<String> = document
        .select(&HEADER_CELL)
        .map(|th| th.text().collect::<String>().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let mut control_tokens = Vec::new();
    for control in document.select(&CONTROL) {
        for attr in ["id", "name", "class", "placeholder", "type", "rel"] {
            if let Some(value) = control.value().attr(attr) {
                let token = value.trim().to_lowercase();
                if !token.is_empty() && !control_tokens.contains(&token) {
                    control_tokens.push(token);
                }
            }
        }
    }

    let mut selector_hits = Vec::new();
    for raw in detection_selectors {
        match Selector::parse(raw) {
            Ok(selector) => {
                if document.select(&selector).next().is_some() {
                    selector_hits.push(raw.clone());
                }
            }
            Err(e) => {
                log::warn!("ignoring unparseable detection selector '{raw}': {e:?}");
            }
        }
    }

    PageSignature {
        title,
        has_table,
        has_form: form_count > 0,
        form_count,
        row_count,
        primary_actions,
        table_headers,
        control_tokens,
        selector_hits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_PAGE: &str = r#"
        <html><head><title>Items</title></head><body>
        <form action="/items" method="get">
          <input type="search" name="q" placeholder="Search items">
          <button type="submit">Search</button>
        </form>
        <table>
          <thead><tr><th>Name</th><th>Status</th></tr></thead>
          <tbody>
            <tr><td><a href="/items/1">Alpha</a></td><td>active</td></tr>
            <tr><td><a href="/items/2">Beta</a></td><td>done</td></tr>
          </tbody>
        </table>
        <nav class="pagination"><a rel="next" href="/items?page=2">Next</a></nav>
        </body></html>"#;

    #[test]
    fn signature_captures_structure() {
        let sig = analyze_signature(LISTING_PAGE, &[]);
        assert_eq!(sig.title.as_deref(), Some("Items"));
        assert!(sig.has_table);
        assert!(sig.has_form);
        assert_eq!(sig.form_count, 1);
        assert_eq!(sig.row_count, 2);
        assert!(sig.table_headers.contains(&"status".to_string()));
        assert!(sig.primary_actions.iter().any(|a| a == "Search"));
    }

    #[test]
    fn signature_records_detection_selector_hits() {
        let selectors = vec![
            "input[type=search]".to_string(),
            "select[name*=filter]".to_string(),
            "a[rel=next]".to_string(),
        ];
        let sig = analyze_signature(LISTING_PAGE, &selectors);
        assert!(sig.selector_hits.contains(&"input[type=search]".to_string()));
        assert!(sig.selector_hits.contains(&"a[rel=next]".to_string()));
        assert!(!sig.selector_hits.contains(&"select[name*=filter]".to_string()));
    }

    #[test]
    fn contains_token_scans_all_vocabularies() {
        let sig = analyze_signature(LISTING_PAGE, &[]);
        assert!(sig.contains_token("search"));
        assert!(sig.contains_token("status"));
        assert!(!sig.contains_token("tenant"));
    }

    #[test]
    fn row_count_without_tbody_excludes_header_rows() {
        let html = r#"<table>
            <tr><th>Name</th></tr>
            <tr><td>Alpha</td></tr>
            <tr><td>Beta</td></tr>
        </table>"#;
        let sig = analyze_signature(html, &[]);
        assert_eq!(sig.row_count, 2);
    }

    #[test]
    fn empty_page_has_empty_signature() {
        let sig = analyze_signature("<html><body><p>hello</p></body></html>", &[]);
        assert!(!sig.has_table);
        assert!(!sig.has_form);
        assert_eq!(sig.row_count, 0);
        assert!(sig.primary_actions.is_empty());
    }
}
