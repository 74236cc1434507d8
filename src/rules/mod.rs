//! Declarative validation rules and feature schemas.
//!
//! A [`FeatureSchema`] bundles everything the engine knows about one feature
//! type: how to detect it on a page, the ordered list of [`ValidationRule`]s
//! to exercise it, and the minimum rule counts per category that constitute
//! adequate coverage. Schemas come from the built-in catalog and from plugin
//! files; both are held by the [`RuleRegistry`].

mod catalog;
mod plugins;
mod registry;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

use crate::page::PageSignature;

pub use catalog::builtin_schemas;
pub use registry::{FeatureProvider, RuleRegistry, SchemaProvider};

/// Open-ended feature type name (`search`, `pagination`, ...).
///
/// A newtype over a string rather than a closed enum so plugin-supplied
/// feature types need no change to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureType(String);

impl FeatureType {
    /// Builds a feature type from any string-like name.
    pub fn new(name: impl Into<String>) -> Self {
        FeatureType(name.into())
    }

    /// The feature type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FeatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureType {
    fn from(s: &str) -> Self {
        FeatureType(s.to_string())
    }
}

/// Test category of a validation rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Expected-path behavior.
    Positive,
    /// Invalid input or impossible action is rejected cleanly.
    Negative,
    /// Unusual but legal input (empty, unicode, special characters).
    Edge,
    /// Behavior at declared limits (lengths, page sizes).
    Boundary,
}

impl RuleCategory {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Positive => "positive",
            RuleCategory::Negative => "negative",
            RuleCategory::Edge => "edge",
            RuleCategory::Boundary => "boundary",
        }
    }
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a validation rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Broken behavior blocks core workflows.
    Critical,
    /// Major feature degradation.
    High,
    /// Noticeable but workaround exists.
    Medium,
    /// Cosmetic or rarely hit.
    Low,
}

impl Severity {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How selector candidates are interpreted during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorStrategy {
    /// Candidates are CSS selectors, tried in order.
    Css,
    /// Candidates are attribute keywords; each expands to CSS selectors
    /// matching elements whose `id`, `name`, or `class` contains the token.
    Keyword,
}

/// Selector strategy plus ordered candidates. The first candidate matching
/// the live DOM wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSpec {
    /// Interpretation of the candidates.
    pub strategy: SelectorStrategy,
    /// Ordered candidate list.
    pub candidates: Vec<String>,
}

impl SelectorSpec {
    /// A CSS selector spec.
    pub fn css(candidates: &[&str]) -> Self {
        SelectorSpec {
            strategy: SelectorStrategy::Css,
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// A keyword selector spec.
    pub fn keyword(tokens: &[&str]) -> Self {
        SelectorSpec {
            strategy: SelectorStrategy::Keyword,
            candidates: tokens.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Expands the spec into concrete CSS selector strings, in candidate
    /// order.
    pub fn expanded(&self) -> Vec<String> {
        match self.strategy {
            SelectorStrategy::Css => self.candidates.clone(),
            SelectorStrategy::Keyword => self
                .candidates
                .iter()
                .map(|token| {
                    format!("[id*=\"{token}\"], [name*=\"{token}\"], [class*=\"{token}\"]")
                })
                .collect(),
        }
    }
}

/// Interaction a check performs against the resolved element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Click the element.
    Click,
    /// Fill the element with instantiated test data, then submit its form.
    Fill,
    /// Select the instantiated test data as an option.
    Select,
}

/// Measured outcome a check compares after the interaction settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    /// The visible row count differs from before the interaction.
    RowCountChanged,
    /// The visible row count equals the expected value.
    RowCountEquals,
    /// The visible row count is at least the expected value.
    RowCountAtLeast,
    /// The visible row count is at most the expected value.
    RowCountAtMost,
    /// The first row's text differs from before the interaction.
    FirstRowChanged,
    /// The first row's text contains the expected value.
    FirstRowContains,
    /// The current URL carries the named query parameter.
    UrlParamPresent,
    /// The named query parameter equals `name=value` in the expected field.
    UrlParamEquals,
    /// The current URL differs from before the interaction.
    UrlChanged,
    /// An element matching the expected selector is present and not hidden.
    ElementVisible,
    /// No visible element matches the expected selector.
    ElementHidden,
    /// The element matching the expected selector is disabled.
    ElementDisabled,
    /// The element matching the expected selector is enabled.
    ElementEnabled,
}

/// Assertion type plus its expected value, where the kind needs one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assertion {
    /// What to measure and how to compare it.
    pub kind: AssertionKind,
    /// Expected value; meaning depends on the kind (a count, a substring, a
    /// `name` or `name=value` parameter, or a CSS selector).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

impl Assertion {
    /// Assertion without an expected value.
    pub fn of(kind: AssertionKind) -> Self {
        Assertion {
            kind,
            expected: None,
        }
    }

    /// Assertion with an expected value.
    pub fn expecting(kind: AssertionKind, expected: impl Into<String>) -> Self {
        Assertion {
            kind,
            expected: Some(expected.into()),
        }
    }
}

/// Variant applied to a test-data template when instantiating input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataVariant {
    /// Use the base value unchanged.
    Literal,
    /// Empty input.
    Empty,
    /// Base value repeated out to 256 characters.
    VeryLong,
    /// Base value with special characters appended.
    SpecialChars,
    /// Base value with alternating character case.
    MixedCase,
    /// Base value with multi-script unicode appended.
    Unicode,
    /// Digits only.
    Numeric,
}

/// Template for the input data a rule feeds into its interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDataTemplate {
    /// Base value the variant transforms.
    pub base: String,
    /// Transformation applied at instantiation time.
    pub variant: DataVariant,
}

impl TestDataTemplate {
    /// A literal template.
    pub fn literal(base: impl Into<String>) -> Self {
        TestDataTemplate {
            base: base.into(),
            variant: DataVariant::Literal,
        }
    }

    /// A template with an explicit variant.
    pub fn variant(base: impl Into<String>, variant: DataVariant) -> Self {
        TestDataTemplate {
            base: base.into(),
            variant,
        }
    }

    /// Produces the concrete input value for this template.
    pub fn instantiate(&self) -> String {
        match self.variant {
            DataVariant::Literal => self.base.clone(),
            DataVariant::Empty => String::new(),
            DataVariant::VeryLong => {
                let unit = if self.base.is_empty() { "x" } else { &self.base };
                let mut out = String::with_capacity(260);
                while out.chars().count() < 256 {
                    out.push_str(unit);
                }
                out.chars().take(256).collect()
            }
            DataVariant::SpecialChars => format!("{}!@#$%^&*()<>\"'", self.base),
            DataVariant::MixedCase => self
                .base
                .chars()
                .enumerate()
                .map(|(i, c)| {
                    if i % 2 == 0 {
                        c.to_uppercase().next().unwrap_or(c)
                    } else {
                        c.to_lowercase().next().unwrap_or(c)
                    }
                })
                .collect(),
            DataVariant::Unicode => format!("{} テスト ünïcødé Ω", self.base),
            DataVariant::Numeric => "1234567890".to_string(),
        }
    }
}

/// One declarative validation rule. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Unique id within the catalog (e.g. `search-basic-term`).
    pub id: String,
    /// Feature type this rule belongs to.
    pub feature: FeatureType,
    /// Test category.
    pub category: RuleCategory,
    /// Severity when the behavior is broken.
    pub severity: Severity,
    /// Selector strategy and candidates for the element under test.
    pub selector: SelectorSpec,
    /// Interaction the check performs.
    pub action: RuleAction,
    /// Input data template, for `fill` and `select` actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_data: Option<TestDataTemplate>,
    /// Human-readable expected behavior.
    pub expected_behavior: String,
    /// The measurable assertion.
    pub assertion: Assertion,
    /// Free-form preconditions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preconditions: Vec<String>,
    /// Free-form postconditions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub postconditions: Vec<String>,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Minimum rule counts per category a feature must satisfy to be considered
/// adequately tested.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CategoryMinimums {
    /// Minimum positive-category test cases.
    #[serde(default)]
    pub positive: usize,
    /// Minimum negative-category test cases.
    #[serde(default)]
    pub negative: usize,
    /// Minimum edge-category test cases.
    #[serde(default)]
    pub edge: usize,
    /// Minimum boundary-category test cases.
    #[serde(default)]
    pub boundary: usize,
}

impl CategoryMinimums {
    /// Minimum for one category.
    pub fn for_category(&self, category: RuleCategory) -> usize {
        match category {
            RuleCategory::Positive => self.positive,
            RuleCategory::Negative => self.negative,
            RuleCategory::Edge => self.edge,
            RuleCategory::Boundary => self.boundary,
        }
    }

    /// Sum across all categories.
    pub fn total(&self) -> usize {
        self.positive + self.negative + self.edge + self.boundary
    }
}

/// Selector/keyword heuristics that decide whether a feature is present on
/// a page, evaluated against its structural signature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionStrategy {
    /// CSS selectors; the feature is present when any of them hit during
    /// signature analysis.
    #[serde(default)]
    pub any_selectors: Vec<String>,
    /// Lowercased keywords matched against the signature's control tokens,
    /// table headers, and primary-action labels.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Additionally require the page to contain a data table.
    #[serde(default)]
    pub requires_table: bool,
}

impl DetectionStrategy {
    /// Whether the page signature exhibits this feature.
    pub fn matches(&self, signature: &PageSignature) -> bool {
        if self.requires_table && !signature.has_table {
            return false;
        }
        let selector_hit = self
            .any_selectors
            .iter()
            .any(|s| signature.selector_hits.iter().any(|hit| hit == s));
        let keyword_hit = self.keywords.iter().any(|kw| signature.contains_token(kw));
        if self.any_selectors.is_empty() && self.keywords.is_empty() {
            // A strategy with only the table requirement.
            self.requires_table && signature.has_table
        } else {
            selector_hit || keyword_hit
        }
    }
}

/// Declarative catalog of validation rules and coverage minimums for one
/// feature type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// The feature type this schema describes.
    pub feature: FeatureType,
    /// Presence heuristics.
    pub detection: DetectionStrategy,
    /// Ordered rule list; checks execute in this order within a page.
    pub rules: Vec<ValidationRule>,
    /// Coverage minimums per category.
    pub minimums: CategoryMinimums,
}

impl FeatureSchema {
    /// Rule count per category, for coverage accounting.
    pub fn rules_by_category(&self) -> BTreeMap<RuleCategory, usize> {
        let mut counts = BTreeMap::new();
        for rule in &self.rules {
            *counts.entry(rule.category).or_insert(0) += 1;
        }
        counts
    }
}
