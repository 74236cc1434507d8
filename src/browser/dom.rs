//! Shared DOM interpretation for browser drivers.
//!
//! Both the HTTP-backed and the scripted driver interpret interactions the
//! same way: a click either follows a link or submits the enclosing form; a
//! select stages an option and resubmits its form. This module turns (DOM,
//! selector) into an [`InteractionPlan`] the driver then executes with its
//! own transport.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error_handling::BrowserError;

/// HTTP method of a form submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormMethod {
    /// Serialize fields into the query string.
    Get,
    /// Send fields as a form body.
    Post,
}

/// A transport-independent description of what an interaction does.
#[derive(Debug, Clone)]
pub(crate) enum InteractionPlan {
    /// Fetch an absolute URL.
    FollowLink(String),
    /// Submit a form.
    SubmitForm {
        /// Submission method.
        method: FormMethod,
        /// Absolute action URL.
        action: String,
        /// Serialized fields, staged values already applied.
        fields: Vec<(String, String)>,
    },
}

fn parse_selector(raw: &str) -> Result<Selector, BrowserError> {
    Selector::parse(raw).map_err(|e| BrowserError::InvalidSelector(format!("{raw}: {e}")))
}

fn find_first<'a>(
    document: &'a Html,
    selector: &str,
) -> Result<ElementRef<'a>, BrowserError> {
    let parsed = parse_selector(selector)?;
    document
        .select(&parsed)
        .next()
        .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))
}

fn resolve(base: &Url, href: &str) -> Result<String, BrowserError> {
    base.join(href)
        .map(|u| u.to_string())
        .map_err(|e| BrowserError::Navigation(format!("unresolvable href '{href}': {e}")))
}

fn enclosing_form<'a>(element: ElementRef<'a>) -> Option<ElementRef<'a>> {
    if element.value().name() == "form" {
        return Some(element);
    }
    let mut node = element.parent();
    while let Some(current) = node {
        if let Some(el) = ElementRef::wrap(current) {
            if el.value().name() == "form" {
                return Some(el);
            }
        }
        node = current.parent();
    }
    None
}

/// Key under which a control's staged value is stored: `name`, falling back
/// to `id`.
pub(crate) fn field_key(element: ElementRef<'_>) -> Option<String> {
    element
        .value()
        .attr("name")
        .or_else(|| element.value().attr("id"))
        .map(|s| s.to_string())
}

fn staged_value<'a>(
    staged: &'a HashMap<String, String>,
    element: ElementRef<'_>,
) -> Option<&'a String> {
    let name = element.value().attr("name");
    let id = element.value().attr("id");
    name.and_then(|n| staged.get(n))
        .or_else(|| id.and_then(|i| staged.get(i)))
}

/// Serializes a form's fields, overlaying staged values.
fn collect_form_fields(
    form: ElementRef<'_>,
    staged: &HashMap<String, String>,
) -> Vec<(String, String)> {
    let input_sel = Selector::parse("input[name], textarea[name], select[name]")
        .expect("static selector");
    let option_sel = Selector::parse("option").expect("static selector");

    let mut fields = Vec::new();
    for control in form.select(&input_sel) {
        let name = match control.value().attr("name") {
            Some(name) => name.to_string(),
            None => continue,
        };
        let tag = control.value().name();
        let kind = control.value().attr("type").unwrap_or("text").to_lowercase();

        if matches!(kind.as_str(), "submit" | "button" | "image" | "reset" | "file") {
            continue;
        }

        let value = if let Some(staged) = staged_value(staged, control) {
            staged.clone()
        } else if matches!(kind.as_str(), "checkbox" | "radio") {
            if control.value().attr("checked").is_none() {
                continue;
            }
            control.value().attr("value").unwrap_or("on").to_string()
        } else if tag == "textarea" {
            control.text().collect::<String>()
        } else if tag == "select" {
            let mut options = control.select(&option_sel);
            let selected = control
                .select(&option_sel)
                .find(|o| o.value().attr("selected").is_some());
            match selected.or_else(|| options.next()) {
                Some(option) => option
                    .value()
                    .attr("value")
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| option.text().collect::<String>().trim().to_string()),
                None => String::new(),
            }
        } else {
            control.value().attr("value").unwrap_or("").to_string()
        };

        fields.push((name, value));
    }
    fields
}

fn form_plan(
    form: ElementRef<'_>,
    base: &Url,
    staged: &HashMap<String, String>,
    submitter: Option<ElementRef<'_>>,
) -> Result<InteractionPlan, BrowserError> {
    let method = match form
        .value()
        .attr("method")
        .unwrap_or("get")
        .to_lowercase()
        .as_str()
    {
        "post" => FormMethod::Post,
        _ => FormMethod::Get,
    };
    let action = match form.value().attr("action") {
        Some(action) if !action.trim().is_empty() => resolve(base, action)?,
        _ => {
            // Per the HTML spec, a missing action submits to the current URL.
            let mut current = base.clone();
            current.set_query(None);
            current.to_string()
        }
    };
    let mut fields = collect_form_fields(form, staged);
    if let Some(submitter) = submitter {
        if let (Some(name), Some(value)) = (
            submitter.value().attr("name"),
            submitter.value().attr("value"),
        ) {
            fields.push((name.to_string(), value.to_string()));
        }
    }
    Ok(InteractionPlan::SubmitForm {
        method,
        action,
        fields,
    })
}

/// Plans a click on the first element matching `selector`.
pub(crate) fn plan_click(
    html: &str,
    current_url: &Url,
    selector: &str,
    staged: &HashMap<String, String>,
) -> Result<InteractionPlan, BrowserError> {
    let document = Html::parse_document(html);
    let element = find_first(&document, selector)?;
    let tag = element.value().name();

    if let Some(href) = element.value().attr("href") {
        return Ok(InteractionPlan::FollowLink(resolve(current_url, href)?));
    }

    let kind = element.value().attr("type").unwrap_or("").to_lowercase();
    let is_submitter = tag == "button" || (tag == "input" && kind == "submit");
    if is_submitter {
        if let Some(form) = enclosing_form(element) {
            return form_plan(form, current_url, staged, Some(element));
        }
    }

    // A bare table or row used as a listing probe: clicking it is a no-op
    // that re-reads the current page.
    if matches!(tag, "table" | "tr" | "td" | "div") {
        return Ok(InteractionPlan::FollowLink(current_url.to_string()));
    }

    // Look for a link inside the element (e.g. a row whose cell holds one).
    let inner_link = Selector::parse("a[href]").expect("static selector");
    if let Some(link) = element.select(&inner_link).next() {
        if let Some(href) = link.value().attr("href") {
            return Ok(InteractionPlan::FollowLink(resolve(current_url, href)?));
        }
    }

    Err(BrowserError::NotActionable(format!(
        "<{tag}> matched by '{selector}' has no href and no enclosing form"
    )))
}

/// Plans submitting the form that encloses the element matching `selector`.
pub(crate) fn plan_submit(
    html: &str,
    current_url: &Url,
    selector: &str,
    staged: &HashMap<String, String>,
) -> Result<InteractionPlan, BrowserError> {
    let document = Html::parse_document(html);
    let element = find_first(&document, selector)?;
    let form = enclosing_form(element).ok_or_else(|| {
        BrowserError::NotActionable(format!("'{selector}' is not inside a form"))
    })?;
    form_plan(form, current_url, staged, None)
}

/// Resolves the staging key for the input matching `selector`.
pub(crate) fn plan_fill(html: &str, selector: &str) -> Result<String, BrowserError> {
    let document = Html::parse_document(html);
    let element = find_first(&document, selector)?;
    field_key(element).ok_or_else(|| {
        BrowserError::NotActionable(format!("'{selector}' has neither name nor id"))
    })
}

/// Outcome of planning a select interaction.
#[derive(Debug)]
pub(crate) enum SelectPlan {
    /// Stage `key = value`, then run the submission plan.
    StageAndSubmit {
        /// Staging key of the select control.
        key: String,
        /// The chosen option's submission value.
        value: String,
        /// Submission of the enclosing form with the staged value applied.
        plan: InteractionPlan,
    },
    /// The "select" is a menu; follow the chosen item's link.
    Follow(String),
}

/// Plans choosing `option_label` in the element matching `selector`.
pub(crate) fn plan_select(
    html: &str,
    current_url: &Url,
    selector: &str,
    option_label: &str,
    staged: &HashMap<String, String>,
) -> Result<SelectPlan, BrowserError> {
    let document = Html::parse_document(html);
    let element = find_first(&document, selector)?;
    let wanted = option_label.trim().to_lowercase();

    if element.value().name() == "select" {
        let option_sel = Selector::parse("option").expect("static selector");
        let option = element
            .select(&option_sel)
            .find(|o| o.text().collect::<String>().trim().to_lowercase() == wanted)
            .ok_or_else(|| BrowserError::OptionNotFound(option_label.to_string()))?;
        let value = option
            .value()
            .attr("value")
            .map(|v| v.to_string())
            .unwrap_or_else(|| option.text().collect::<String>().trim().to_string());
        let key = field_key(element).ok_or_else(|| {
            BrowserError::NotActionable(format!("'{selector}' has neither name nor id"))
        })?;

        let mut overlay = staged.clone();
        overlay.insert(key.clone(), value.clone());
        let plan = match enclosing_form(element) {
            Some(form) => form_plan(form, current_url, &overlay, None)?,
            None => {
                // A context switcher outside any form: reload the current
                // page with the selection as a query parameter.
                let mut url = current_url.clone();
                url.query_pairs_mut().append_pair(&key, &value);
                InteractionPlan::FollowLink(url.to_string())
            }
        };
        return Ok(SelectPlan::StageAndSubmit { key, value, plan });
    }

    // Menu-style widget: follow the child item whose text matches.
    let link_sel = Selector::parse("a[href]").expect("static selector");
    let link = element
        .select(&link_sel)
        .find(|a| a.text().collect::<String>().trim().to_lowercase() == wanted)
        .ok_or_else(|| BrowserError::OptionNotFound(option_label.to_string()))?;
    let href = link
        .value()
        .attr("href")
        .ok_or_else(|| BrowserError::OptionNotFound(option_label.to_string()))?;
    Ok(SelectPlan::Follow(resolve(current_url, href)?))
}

/// Builds the final URL of a GET form submission.
pub(crate) fn get_form_url(action: &str, fields: &[(String, String)]) -> Result<String, BrowserError> {
    let mut url = Url::parse(action)
        .map_err(|e| BrowserError::Navigation(format!("bad form action '{action}': {e}")))?;
    url.query_pairs_mut().clear();
    for (name, value) in fields {
        url.query_pairs_mut().append_pair(name, value);
    }
    let mut out = url.to_string();
    // An empty fields list leaves a dangling '?'.
    if out.ends_with('?') {
        out.pop();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://app.example.com/items").expect("base url")
    }

    const FORM_PAGE: &str = r#"
        <html><body>
        <form action="/items" method="get">
          <input type="search" name="q" value="">
          <input type="hidden" name="scope" value="all">
          <button type="submit" name="go" value="1">Search</button>
        </form>
        <a id="report-link" href="/reports?x=1">Reports</a>
        <select name="status_filter">
          <option value="">Any</option>
          <option value="active">Active</option>
        </select>
        </body></html>"#;

    #[test]
    fn click_on_link_follows_href() {
        let plan = plan_click(FORM_PAGE, &base(), "#report-link", &HashMap::new())
            .expect("plan click");
        match plan {
            InteractionPlan::FollowLink(url) => {
                assert_eq!(url, "https://app.example.com/reports?x=1");
            }
            other => panic!("expected FollowLink, got {other:?}"),
        }
    }

    #[test]
    fn click_on_submit_serializes_form_with_staged_values() {
        let mut staged = HashMap::new();
        staged.insert("q".to_string(), "widget".to_string());
        let plan = plan_click(FORM_PAGE, &base(), "button[type=submit]", &staged)
            .expect("plan click");
        match plan {
            InteractionPlan::SubmitForm {
                method,
                action,
                fields,
            } => {
                assert_eq!(method, FormMethod::Get);
                assert_eq!(action, "https://app.example.com/items");
                assert!(fields.contains(&("q".to_string(), "widget".to_string())));
                assert!(fields.contains(&("scope".to_string(), "all".to_string())));
                assert!(fields.contains(&("go".to_string(), "1".to_string())));
            }
            other => panic!("expected SubmitForm, got {other:?}"),
        }
    }

    #[test]
    fn submit_finds_enclosing_form_from_input() {
        let plan = plan_submit(FORM_PAGE, &base(), "input[name=q]", &HashMap::new())
            .expect("plan submit");
        match plan {
            InteractionPlan::SubmitForm { fields, .. } => {
                // The submit button is not part of an implicit submission.
                assert!(!fields.iter().any(|(name, _)| name == "go"));
            }
            other => panic!("expected SubmitForm, got {other:?}"),
        }
    }

    #[test]
    fn select_without_form_reloads_with_query_parameter() {
        let plan = plan_select(
            FORM_PAGE,
            &base(),
            "select[name=status_filter]",
            "Active",
            &HashMap::new(),
        )
        .expect("plan select");
        match plan {
            SelectPlan::StageAndSubmit { key, value, plan } => {
                assert_eq!(key, "status_filter");
                assert_eq!(value, "active");
                match plan {
                    InteractionPlan::FollowLink(url) => {
                        assert!(url.contains("status_filter=active"));
                    }
                    other => panic!("expected FollowLink, got {other:?}"),
                }
            }
            SelectPlan::Follow(_) => panic!("expected StageAndSubmit"),
        }
    }

    #[test]
    fn select_unknown_option_errors() {
        let err = plan_select(
            FORM_PAGE,
            &base(),
            "select[name=status_filter]",
            "Archived",
            &HashMap::new(),
        )
        .expect_err("option should not exist");
        assert!(matches!(err, BrowserError::OptionNotFound(_)));
    }

    #[test]
    fn missing_element_reports_element_not_found() {
        let err = plan_click(FORM_PAGE, &base(), "#no-such-element", &HashMap::new())
            .expect_err("element absent");
        assert!(matches!(err, BrowserError::ElementNotFound(_)));
    }

    #[test]
    fn get_form_url_replaces_query() {
        let url = get_form_url(
            "https://app.example.com/items?old=1",
            &[("q".to_string(), "widget".to_string())],
        )
        .expect("url");
        assert_eq!(url, "https://app.example.com/items?q=widget");
    }
}
