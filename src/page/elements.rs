//! Interactive-element enumeration.
//!
//! Finds the elements the crawl can act on: links, tabs, context switchers,
//! pagination controls, and row-opening actions. Each element carries a CSS
//! selector usable against the live DOM and, where the target address is
//! statically known, the absolute URL it navigates to.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::constants::UNSAFE_LINK_KEYWORDS;

static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));
static TAB: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[role=tab], .nav-tabs a, .tabs a, ul.tab a").expect("static selector")
});
static PAGINATION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "a[rel=next], a[rel=prev], .pagination a, .pagination button, nav[aria-label*=agination] a",
    )
    .expect("static selector")
});
static ROW_ACTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("table tbody tr a[href], table tbody tr button").expect("static selector")
});

/// Kind of interactive element, in crawl-priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Plain in-application link.
    Link,
    /// Tab within a tabbed view.
    Tab,
    /// Pagination control.
    PaginationControl,
    /// Link or button inside a data row.
    RowAction,
}

/// One actionable element discovered on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveElement {
    /// What the element is.
    pub kind: ElementKind,
    /// CSS selector resolving to the element on the live page.
    pub selector: String,
    /// Visible label, trimmed.
    pub label: String,
    /// Absolute target URL when statically known (href-bearing elements).
    pub target_url: Option<String>,
}

/// Builds a CSS selector addressing `element` on its page.
///
/// Prefers an `#id`; otherwise walks up to the nearest ancestor with an id
/// and emits `tag:nth-of-type` segments below it.
pub(crate) fn css_path(element: ElementRef<'_>) -> String {
    if let Some(id) = element.value().attr("id") {
        if !id.trim().is_empty() && !id.contains(char::is_whitespace) {
            return format!("#{id}");
        }
    }

    let mut segments = Vec::new();
    let mut current = element;
    loop {
        let tag = current.value().name();
        if tag == "html" || tag == "body" {
            segments.push(tag.to_string());
            break;
        }
        let position = current
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .filter(|sib| sib.value().name() == tag)
            .count()
            + 1;
        segments.push(format!("{tag}:nth-of-type({position})"));

        let parent = current.parent().and_then(ElementRef::wrap);
        match parent {
            Some(parent) => {
                if let Some(id) = parent.value().attr("id") {
                    if !id.trim().is_empty() && !id.contains(char::is_whitespace) {
                        segments.push(format!("#{id}"));
                        break;
                    }
                }
                current = parent;
            }
            None => break,
        }
    }

    segments.reverse();
    segments.join(" > ")
}

fn element_label(element: ElementRef<'_>) -> String {
    let text = element.text().collect::<String>().trim().to_string();
    if !text.is_empty() {
        return text;
    }
    element
        .value()
        .attr("aria-label")
        .or_else(|| element.value().attr("title"))
        .or_else(|| element.value().attr("value"))
        .unwrap_or("")
        .trim()
        .to_string()
}

fn is_unsafe_label(label: &str, href: Option<&str>) -> bool {
    let label = label.to_lowercase();
    let href = href.unwrap_or("").to_lowercase();
    UNSAFE_LINK_KEYWORDS
        .iter()
        .any(|kw| label.contains(kw) || href.contains(kw))
}

fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    // Stay on the same host; external links are not part of the surface.
    if resolved.host_str() != base.host_str() {
        return None;
    }
    Some(resolved.to_string())
}

/// Enumerates the interactive elements visible on a page.
///
/// More specific kinds win: an anchor inside a pagination nav is reported
/// once, as a pagination control. Unsafe links (logout, delete) are skipped
/// so the crawl cannot invalidate its own session.
pub fn enumerate_interactive(html: &str, base: &Url) -> Vec<InteractiveElement> {
    let document = Html::parse_document(html);
    let mut elements: Vec<InteractiveElement> = Vec::new();
    let mut seen_selectors = std::collections::HashSet::new();

    let mut push = |kind: ElementKind, el: ElementRef<'_>| {
        let selector = css_path(el);
        if !seen_selectors.insert(selector.clone()) {
            return;
        }
        let label = element_label(el);
        let href = el.value().attr("href");
        if is_unsafe_label(&label, href) {
            log::debug!("skipping unsafe element '{label}'");
            return;
        }
        let target_url = href.and_then(|h| resolve_href(base, h));
        if href.is_some() && target_url.is_none() {
            // Fragment-only, external, or non-http target.
            return;
        }
        elements.push(InteractiveElement {
            kind,
            selector,
            label,
            target_url,
        });
    };

    for el in document.select(&PAGINATION) {
        push(ElementKind::PaginationControl, el);
    }
    for el in document.select(&TAB) {
        push(ElementKind::Tab, el);
    }
    for el in document.select(&ROW_ACTION) {
        push(ElementKind::RowAction, el);
    }
    for el in document.select(&LINK) {
        push(ElementKind::Link, el);
    }

    elements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://app.example.com/items").expect("valid base")
    }

    const PAGE: &str = r##"
        <html><body>
        <nav class="nav-tabs">
          <a href="/items?tab=open">Open</a>
          <a href="/items?tab=closed">Closed</a>
        </nav>
        <table>
          <tbody>
            <tr><td><a href="/items/1">Alpha</a></td></tr>
          </tbody>
        </table>
        <nav class="pagination"><a rel="next" href="?page=2">Next</a></nav>
        <a href="/reports">Reports</a>
        <a href="https://othersite.example.net/away">External</a>
        <a href="/logout">Log out</a>
        <a href="#top">Back to top</a>
        </body></html>"##;

    #[test]
    fn enumerates_by_kind_with_priority() {
        let elements = enumerate_interactive(PAGE, &base());

        let kinds: Vec<ElementKind> = elements.iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&ElementKind::PaginationControl));
        assert!(kinds.contains(&ElementKind::Tab));
        assert!(kinds.contains(&ElementKind::RowAction));
        assert!(kinds.contains(&ElementKind::Link));

        // The pagination anchor is not re-reported as a plain link.
        let next_count = elements
            .iter()
            .filter(|e| e.label == "Next")
            .count();
        assert_eq!(next_count, 1);
    }

    #[test]
    fn resolves_relative_targets_against_base() {
        let elements = enumerate_interactive(PAGE, &base());
        let next = elements
            .iter()
            .find(|e| e.kind == ElementKind::PaginationControl)
            .expect("pagination element");
        assert_eq!(
            next.target_url.as_deref(),
            Some("https://app.example.com/items?page=2")
        );
    }

    #[test]
    fn skips_external_fragment_and_unsafe_links() {
        let elements = enumerate_interactive(PAGE, &base());
        assert!(elements.iter().all(|e| e.label != "External"));
        assert!(elements.iter().all(|e| e.label != "Log out"));
        assert!(elements.iter().all(|e| e.label != "Back to top"));
    }

    #[test]
    fn css_path_prefers_ids() {
        let html = r#"<html><body><div id="toolbar"><button>Go</button></div></body></html>"#;
        let document = Html::parse_document(html);
        let button = document
            .select(&Selector::parse("button").expect("selector"))
            .next()
            .expect("button present");
        let path = css_path(button);
        assert_eq!(path, "#toolbar > button:nth-of-type(1)");
    }

    #[test]
    fn css_path_addresses_unique_element() {
        let elements = enumerate_interactive(PAGE, &base());
        let document = Html::parse_document(PAGE);
        for element in &elements {
            let selector = Selector::parse(&element.selector)
                .unwrap_or_else(|_| panic!("selector '{}' should parse", element.selector));
            assert_eq!(
                document.select(&selector).count(),
                1,
                "selector '{}' should resolve uniquely",
                element.selector
            );
        }
    }
}
