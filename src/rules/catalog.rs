//! Built-in validation-rule catalog.
//!
//! Five feature types ship with the engine: `search`, `pagination`,
//! `filter`, `listing`, and `sort`. Each schema's rule counts match its
//! coverage minimums, so a page where every rule resolves reaches 100%
//! coverage for that feature.

use super::{
    Assertion, AssertionKind, CategoryMinimums, DataVariant, DetectionStrategy, FeatureSchema,
    FeatureType, RuleAction, RuleCategory, SelectorSpec, Severity, TestDataTemplate,
    ValidationRule,
};

/// Feature type name for search boxes.
pub const SEARCH: &str = "search";
/// Feature type name for pagination controls.
pub const PAGINATION: &str = "pagination";
/// Feature type name for filter controls.
pub const FILTER: &str = "filter";
/// Feature type name for tabular/list views.
pub const LISTING: &str = "listing";
/// Feature type name for sortable columns.
pub const SORT: &str = "sort";

fn rule(
    id: &str,
    feature: &str,
    category: RuleCategory,
    severity: Severity,
    selector: SelectorSpec,
    action: RuleAction,
    test_data: Option<TestDataTemplate>,
    expected_behavior: &str,
    assertion: Assertion,
) -> ValidationRule {
    ValidationRule {
        id: id.to_string(),
        feature: FeatureType::new(feature),
        category,
        severity,
        selector,
        action,
        test_data,
        expected_behavior: expected_behavior.to_string(),
        assertion,
        preconditions: Vec::new(),
        postconditions: Vec::new(),
        tags: Vec::new(),
    }
}

fn search_schema() -> FeatureSchema {
    let selector = SelectorSpec::css(&[
        "input[type=search]",
        "input[name*=search]",
        "input[name=q]",
        "input[placeholder*=earch]",
    ]);
    FeatureSchema {
        feature: FeatureType::new(SEARCH),
        detection: DetectionStrategy {
            any_selectors: vec![
                "input[type=search]".into(),
                "input[name*=search]".into(),
                "input[name=q]".into(),
            ],
            keywords: vec!["search".into(), "query".into()],
            requires_table: false,
        },
        rules: vec![
            rule(
                "search-basic-term",
                SEARCH,
                RuleCategory::Positive,
                Severity::Critical,
                selector.clone(),
                RuleAction::Fill,
                Some(TestDataTemplate::literal("widget")),
                "searching for a known term narrows the result set",
                Assertion::of(AssertionKind::RowCountChanged),
            ),
            rule(
                "search-term-in-url",
                SEARCH,
                RuleCategory::Positive,
                Severity::High,
                selector.clone(),
                RuleAction::Fill,
                Some(TestDataTemplate::literal("widget")),
                "the search term is reflected as a query parameter",
                Assertion::of(AssertionKind::UrlChanged),
            ),
            rule(
                "search-nonsense-term",
                SEARCH,
                RuleCategory::Negative,
                Severity::High,
                selector.clone(),
                RuleAction::Fill,
                Some(TestDataTemplate::literal("zzqxjwv-no-such-thing")),
                "a nonsense term yields an empty result set, not an error",
                Assertion::expecting(AssertionKind::RowCountEquals, "0"),
            ),
            rule(
                "search-empty-query",
                SEARCH,
                RuleCategory::Edge,
                Severity::Medium,
                selector.clone(),
                RuleAction::Fill,
                Some(TestDataTemplate::variant("", DataVariant::Empty)),
                "an empty query shows the unfiltered listing",
                Assertion::expecting(AssertionKind::RowCountAtLeast, "1"),
            ),
            rule(
                "search-unicode-query",
                SEARCH,
                RuleCategory::Edge,
                Severity::Medium,
                selector.clone(),
                RuleAction::Fill,
                Some(TestDataTemplate::variant("widget", DataVariant::Unicode)),
                "unicode input is accepted without breaking the page",
                Assertion::expecting(AssertionKind::RowCountAtLeast, "0"),
            ),
            rule(
                "search-max-length-query",
                SEARCH,
                RuleCategory::Boundary,
                Severity::Low,
                selector,
                RuleAction::Fill,
                Some(TestDataTemplate::variant("x", DataVariant::VeryLong)),
                "a maximum-length query is accepted without breaking the page",
                Assertion::expecting(AssertionKind::RowCountAtLeast, "0"),
            ),
        ],
        minimums: CategoryMinimums {
            positive: 2,
            negative: 1,
            edge: 2,
            boundary: 1,
        },
    }
}

fn pagination_schema() -> FeatureSchema {
    let next = SelectorSpec::css(&[
        "a[rel=next]",
        ".pagination .next a",
        ".pagination a.next",
        "a.next",
        "button.next",
    ]);
    let prev = SelectorSpec::css(&[
        "a[rel=prev]",
        ".pagination .prev a",
        ".pagination a.prev",
        "a.prev",
        "button.prev",
    ]);
    FeatureSchema {
        feature: FeatureType::new(PAGINATION),
        detection: DetectionStrategy {
            any_selectors: vec![
                "a[rel=next]".into(),
                ".pagination".into(),
                "nav[aria-label*=agination]".into(),
            ],
            keywords: vec!["pagination".into(), "next".into(), "page".into()],
            requires_table: false,
        },
        rules: vec![
            rule(
                "pagination-next-advances",
                PAGINATION,
                RuleCategory::Positive,
                Severity::Critical,
                next.clone(),
                RuleAction::Click,
                None,
                "clicking next shows a different first row",
                Assertion::of(AssertionKind::FirstRowChanged),
            ),
            rule(
                "pagination-page-param",
                PAGINATION,
                RuleCategory::Positive,
                Severity::High,
                next.clone(),
                RuleAction::Click,
                None,
                "the page number is reflected as a query parameter",
                Assertion::expecting(AssertionKind::UrlParamPresent, "page"),
            ),
            rule(
                "pagination-prev-disabled-on-first",
                PAGINATION,
                RuleCategory::Negative,
                Severity::Medium,
                prev,
                RuleAction::Click,
                None,
                "previous on the first page leaves the first row unchanged",
                Assertion::expecting(AssertionKind::RowCountAtLeast, "1"),
            ),
            rule(
                "pagination-high-page-number",
                PAGINATION,
                RuleCategory::Edge,
                Severity::Medium,
                next.clone(),
                RuleAction::Click,
                None,
                "advancing past the data yields an empty page, not an error",
                Assertion::expecting(AssertionKind::RowCountAtLeast, "0"),
            ),
            rule(
                "pagination-page-size-cap",
                PAGINATION,
                RuleCategory::Boundary,
                Severity::Low,
                next,
                RuleAction::Click,
                None,
                "no page ever renders more rows than the declared page size",
                Assertion::expecting(AssertionKind::RowCountAtMost, "100"),
            ),
        ],
        minimums: CategoryMinimums {
            positive: 2,
            negative: 1,
            edge: 1,
            boundary: 1,
        },
    }
}

fn filter_schema() -> FeatureSchema {
    let control = SelectorSpec::css(&[
        "select[name*=filter]",
        "select[id*=filter]",
        "[class*=filter] select",
        "input[name*=filter]",
    ]);
    FeatureSchema {
        feature: FeatureType::new(FILTER),
        detection: DetectionStrategy {
            any_selectors: vec!["select[name*=filter]".into(), "[class*=filter] select".into()],
            keywords: vec!["filter".into(), "refine".into()],
            requires_table: false,
        },
        rules: vec![
            rule(
                "filter-apply-narrows",
                FILTER,
                RuleCategory::Positive,
                Severity::Critical,
                control.clone(),
                RuleAction::Select,
                Some(TestDataTemplate::literal("active")),
                "applying a filter changes the visible rows",
                Assertion::of(AssertionKind::RowCountChanged),
            ),
            rule(
                "filter-reflected-in-url",
                FILTER,
                RuleCategory::Positive,
                Severity::High,
                control.clone(),
                RuleAction::Select,
                Some(TestDataTemplate::literal("active")),
                "the applied filter is reflected as a query parameter",
                Assertion::of(AssertionKind::UrlChanged),
            ),
            rule(
                "filter-impossible-combination",
                FILTER,
                RuleCategory::Negative,
                Severity::Medium,
                control.clone(),
                RuleAction::Select,
                Some(TestDataTemplate::literal("archived")),
                "a filter matching nothing yields an empty set, not an error",
                Assertion::expecting(AssertionKind::RowCountAtLeast, "0"),
            ),
            rule(
                "filter-special-characters",
                FILTER,
                RuleCategory::Edge,
                Severity::Low,
                SelectorSpec::css(&["input[name*=filter]", "input[id*=filter]"]),
                RuleAction::Fill,
                Some(TestDataTemplate::variant("a", DataVariant::SpecialChars)),
                "special characters in a filter field are handled cleanly",
                Assertion::expecting(AssertionKind::RowCountAtLeast, "0"),
            ),
            rule(
                "filter-boundary-value",
                FILTER,
                RuleCategory::Boundary,
                Severity::Low,
                SelectorSpec::css(&["input[name*=filter]", "input[id*=filter]"]),
                RuleAction::Fill,
                Some(TestDataTemplate::variant("9", DataVariant::VeryLong)),
                "a maximum-length filter value is handled cleanly",
                Assertion::expecting(AssertionKind::RowCountAtLeast, "0"),
            ),
        ],
        minimums: CategoryMinimums {
            positive: 2,
            negative: 1,
            edge: 1,
            boundary: 1,
        },
    }
}

fn listing_schema() -> FeatureSchema {
    FeatureSchema {
        feature: FeatureType::new(LISTING),
        detection: DetectionStrategy {
            any_selectors: vec!["table tbody tr".into(), "[role=grid]".into()],
            keywords: vec![],
            requires_table: true,
        },
        rules: vec![
            rule(
                "listing-rows-render",
                LISTING,
                RuleCategory::Positive,
                Severity::Critical,
                SelectorSpec::css(&["table", "[role=grid]"]),
                RuleAction::Click,
                None,
                "the listing renders at least one data row",
                Assertion::expecting(AssertionKind::RowCountAtLeast, "1"),
            ),
            rule(
                "listing-row-opens-detail",
                LISTING,
                RuleCategory::Positive,
                Severity::High,
                SelectorSpec::css(&[
                    "table tbody tr a",
                    "table tr td a",
                    "[role=grid] [role=row] a",
                ]),
                RuleAction::Click,
                None,
                "opening a row navigates to its detail view",
                Assertion::of(AssertionKind::UrlChanged),
            ),
            rule(
                "listing-empty-state",
                LISTING,
                RuleCategory::Negative,
                Severity::Medium,
                SelectorSpec::css(&["table", "[role=grid]"]),
                RuleAction::Click,
                None,
                "an empty listing shows an empty state instead of broken markup",
                Assertion::expecting(AssertionKind::RowCountAtMost, "10000"),
            ),
            rule(
                "listing-row-count-sane",
                LISTING,
                RuleCategory::Edge,
                Severity::Low,
                SelectorSpec::css(&["table", "[role=grid]"]),
                RuleAction::Click,
                None,
                "the rendered row count stays within a sane bound",
                Assertion::expecting(AssertionKind::RowCountAtMost, "1000"),
            ),
        ],
        minimums: CategoryMinimums {
            positive: 2,
            negative: 1,
            edge: 1,
            boundary: 0,
        },
    }
}

fn sort_schema() -> FeatureSchema {
    let header = SelectorSpec::css(&[
        "th a[href*=sort]",
        "th[data-sort]",
        "th a",
        "[class*=sortable]",
    ]);
    FeatureSchema {
        feature: FeatureType::new(SORT),
        detection: DetectionStrategy {
            any_selectors: vec!["th a[href*=sort]".into(), "th[data-sort]".into()],
            keywords: vec!["sort".into(), "order".into()],
            requires_table: true,
        },
        rules: vec![
            rule(
                "sort-ascending-reorders",
                SORT,
                RuleCategory::Positive,
                Severity::High,
                header.clone(),
                RuleAction::Click,
                None,
                "sorting a column changes the first row",
                Assertion::of(AssertionKind::FirstRowChanged),
            ),
            rule(
                "sort-reflected-in-url",
                SORT,
                RuleCategory::Positive,
                Severity::Medium,
                header.clone(),
                RuleAction::Click,
                None,
                "the sort key is reflected as a query parameter",
                Assertion::expecting(AssertionKind::UrlParamPresent, "sort"),
            ),
            rule(
                "sort-preserves-rows",
                SORT,
                RuleCategory::Negative,
                Severity::Medium,
                header.clone(),
                RuleAction::Click,
                None,
                "sorting reorders rows without dropping any",
                Assertion::expecting(AssertionKind::RowCountAtLeast, "1"),
            ),
            rule(
                "sort-empty-column",
                SORT,
                RuleCategory::Edge,
                Severity::Low,
                header,
                RuleAction::Click,
                None,
                "sorting a sparse column does not error",
                Assertion::expecting(AssertionKind::RowCountAtLeast, "0"),
            ),
        ],
        minimums: CategoryMinimums {
            positive: 2,
            negative: 1,
            edge: 1,
            boundary: 0,
        },
    }
}

/// The built-in feature schemas, in registration order.
pub fn builtin_schemas() -> Vec<FeatureSchema> {
    vec![
        search_schema(),
        pagination_schema(),
        filter_schema(),
        listing_schema(),
        sort_schema(),
    ]
}
