//! Executable test-case generation.
//!
//! Turns each validation rule that resolved on a page into a replayable
//! [`TestCase`]: a navigation step, the interaction steps with concrete
//! input data, a settle wait, and the final assertion. Rules whose selectors
//! resolve on nothing become [`CoverageGap`]s instead of silently vanishing.

use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};

use crate::identity::Fingerprint;
use crate::page::PageRecord;
use crate::rules::{Assertion, FeatureType, RuleAction, RuleCategory, RuleRegistry, Severity};
use crate::validator::resolve_selector;

/// Action of one test step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Navigate to the target URL.
    Navigate,
    /// Click the target selector.
    Click,
    /// Type the input into the target selector.
    Fill,
    /// Choose the input as an option of the target selector.
    Select,
    /// Submit the form enclosing the target selector.
    Submit,
    /// Wait the input number of milliseconds.
    Wait,
    /// Evaluate the attached assertion.
    Assert,
}

/// One replayable step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestStep {
    /// What to do.
    pub action: StepAction,
    /// URL or CSS selector the action applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Input value (typed text, option label, or wait milliseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Assertion, for `assert` steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<Assertion>,
}

impl TestStep {
    fn navigate(url: &str) -> Self {
        TestStep {
            action: StepAction::Navigate,
            target: Some(url.to_string()),
            input: None,
            assertion: None,
        }
    }

    fn on_target(action: StepAction, target: &str, input: Option<String>) -> Self {
        TestStep {
            action,
            target: Some(target.to_string()),
            input,
            assertion: None,
        }
    }

    fn wait(ms: u64) -> Self {
        TestStep {
            action: StepAction::Wait,
            target: None,
            input: Some(ms.to_string()),
            assertion: None,
        }
    }

    fn assert(assertion: Assertion) -> Self {
        TestStep {
            action: StepAction::Assert,
            target: None,
            input: None,
            assertion: Some(assertion),
        }
    }
}

/// One generated, self-contained test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique id (`tc-` plus a random suffix).
    pub id: String,
    /// Feature under test.
    pub feature: FeatureType,
    /// Category inherited from the source rule.
    pub category: RuleCategory,
    /// Severity inherited from the source rule.
    pub severity: Severity,
    /// Rule the case was generated from.
    pub rule_id: String,
    /// Page the case targets.
    pub fingerprint: Fingerprint,
    /// Human-readable name.
    pub name: String,
    /// Ordered steps.
    pub steps: Vec<TestStep>,
    /// Generation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A rule that could not be turned into a test case on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageGap {
    /// The unconvertible rule.
    pub rule_id: String,
    /// Its feature.
    pub feature: FeatureType,
    /// The page it failed on.
    pub fingerprint: Fingerprint,
    /// Why no case was generated.
    pub reason: String,
}

/// Cases and gaps produced for one page.
#[derive(Debug, Default)]
pub struct GenerationOutcome {
    /// Generated cases.
    pub cases: Vec<TestCase>,
    /// Rules with no resolvable element.
    pub gaps: Vec<CoverageGap>,
}

/// Generates test cases from the rule catalog and discovered pages.
pub struct TestCaseGenerator {
    registry: std::sync::Arc<RuleRegistry>,
    settle_ms: u64,
}

impl TestCaseGenerator {
    /// Builds a generator over a registry.
    pub fn new(registry: std::sync::Arc<RuleRegistry>, settle_ms: u64) -> Self {
        TestCaseGenerator {
            registry,
            settle_ms,
        }
    }

    /// Generates cases for every feature detected on a page.
    ///
    /// Selector resolution runs against the DOM captured at discovery time,
    /// so generation needs no browser.
    pub fn generate_for_page(&self, page: &PageRecord) -> GenerationOutcome {
        let mut outcome = GenerationOutcome::default();
        for feature in &page.features {
            let Some(schema) = self.registry.schema(feature) else {
                continue;
            };
            for rule in &schema.rules {
                let Some(selector) = resolve_selector(rule, &page.html) else {
                    outcome.gaps.push(CoverageGap {
                        rule_id: rule.id.clone(),
                        feature: rule.feature.clone(),
                        fingerprint: page.fingerprint.clone(),
                        reason: "no selector candidate matched the page".to_string(),
                    });
                    continue;
                };

                let input = rule.test_data.as_ref().map(|t| t.instantiate());
                let mut steps = vec![TestStep::navigate(&page.normalized_url)];
                match rule.action {
                    RuleAction::Click => {
                        steps.push(TestStep::on_target(StepAction::Click, &selector, None));
                    }
                    RuleAction::Fill => {
                        steps.push(TestStep::on_target(
                            StepAction::Fill,
                            &selector,
                            Some(input.clone().unwrap_or_default()),
                        ));
                        steps.push(TestStep::on_target(StepAction::Submit, &selector, None));
                    }
                    RuleAction::Select => {
                        steps.push(TestStep::on_target(StepAction::Select, &selector, input));
                    }
                }
                steps.push(TestStep::wait(self.settle_ms));
                steps.push(TestStep::assert(rule.assertion.clone()));

                let suffix = Alphanumeric.sample_string(&mut rand::rng(), 8).to_lowercase();
                outcome.cases.push(TestCase {
                    id: format!("tc-{suffix}"),
                    feature: rule.feature.clone(),
                    category: rule.category,
                    severity: rule.severity,
                    rule_id: rule.id.clone(),
                    fingerprint: page.fingerprint.clone(),
                    name: format!("{}: {}", rule.feature, rule.expected_behavior),
                    steps,
                    created_at: Utc::now(),
                });
            }
        }
        outcome
    }
}
