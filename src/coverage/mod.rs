//! Coverage scoring.
//!
//! Coverage compares what was generated against what the catalog demands:
//! for each feature, the expected case count is the schema's category
//! minimums total multiplied by the number of pages exhibiting the feature.
//! Features never seen during discovery carry no expectation and do not
//! appear in the report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::generator::TestCase;
use crate::page::PageRecord;
use crate::rules::{RuleCategory, RuleRegistry, Severity};

fn percent(actual: usize, expected: usize) -> f64 {
    if expected == 0 {
        return 100.0;
    }
    (actual.min(expected) as f64 / expected as f64) * 100.0
}

/// Coverage of one category within one feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCoverage {
    /// Cases the minimums demand across all pages with the feature.
    pub expected: usize,
    /// Cases actually generated.
    pub actual: usize,
    /// Attainment, capped at 100.
    pub percent: f64,
}

/// Coverage of one feature across the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCoverage {
    /// Feature name.
    pub feature: String,
    /// Pages on which the feature was detected.
    pub pages_with_feature: usize,
    /// Total expected cases.
    pub expected: usize,
    /// Total generated cases.
    pub actual: usize,
    /// Attainment, capped at 100.
    pub percent: f64,
    /// Rules that produced fewer cases than pages exhibiting the feature.
    pub unmet_rules: Vec<String>,
    /// Per-category breakdown.
    pub by_category: BTreeMap<String, CategoryCoverage>,
}

/// Whole-run coverage report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    /// The run being scored.
    pub run_id: String,
    /// When the report was computed.
    pub generated_at: DateTime<Utc>,
    /// Expected-weighted overall attainment.
    pub overall_percent: f64,
    /// Per-feature coverage, sorted by feature name.
    pub features: Vec<FeatureCoverage>,
    /// Generated case counts per severity.
    pub by_severity: BTreeMap<String, usize>,
    /// Missing case counts per severity.
    pub unmet_by_severity: BTreeMap<String, usize>,
}

/// Computes coverage reports from pages and generated cases.
pub struct CoverageEngine {
    registry: std::sync::Arc<RuleRegistry>,
}

impl CoverageEngine {
    /// Builds an engine over a registry.
    pub fn new(registry: std::sync::Arc<RuleRegistry>) -> Self {
        CoverageEngine { registry }
    }

    /// Scores a run.
    pub fn report(
        &self,
        run_id: &str,
        pages: &[PageRecord],
        cases: &[TestCase],
    ) -> CoverageReport {
        let mut features = Vec::new();
        let mut total_expected = 0usize;
        let mut total_counted = 0usize;
        let mut by_severity: BTreeMap<String, usize> = BTreeMap::new();
        let mut unmet_by_severity: BTreeMap<String, usize> = BTreeMap::new();

        for case in cases {
            *by_severity
                .entry(case.severity.as_str().to_string())
                .or_insert(0) += 1;
        }
        for severity in Severity::iter() {
            by_severity.entry(severity.as_str().to_string()).or_insert(0);
            unmet_by_severity
                .entry(severity.as_str().to_string())
                .or_insert(0);
        }

        for feature in self.registry.feature_types() {
            let Some(schema) = self.registry.schema(&feature) else {
                continue;
            };
            let page_count = pages.iter().filter(|p| p.has_feature(&feature)).count();
            if page_count == 0 {
                continue;
            }

            let feature_cases: Vec<&TestCase> =
                cases.iter().filter(|c| c.feature == feature).collect();

            let expected = schema.minimums.total() * page_count;
            let actual = feature_cases.len();
            total_expected += expected;
            total_counted += actual.min(expected);

            let mut by_category = BTreeMap::new();
            for category in RuleCategory::iter() {
                let cat_expected = schema.minimums.for_category(category) * page_count;
                let cat_actual = feature_cases
                    .iter()
                    .filter(|c| c.category == category)
                    .count();
                by_category.insert(
                    category.as_str().to_string(),
                    CategoryCoverage {
                        expected: cat_expected,
                        actual: cat_actual,
                        percent: percent(cat_actual, cat_expected),
                    },
                );
            }

            let mut unmet_rules = Vec::new();
            for rule in &schema.rules {
                let generated = feature_cases
                    .iter()
                    .filter(|c| c.rule_id == rule.id)
                    .count();
                if generated < page_count {
                    unmet_rules.push(rule.id.clone());
                    *unmet_by_severity
                        .entry(rule.severity.as_str().to_string())
                        .or_insert(0) += page_count - generated;
                }
            }

            features.push(FeatureCoverage {
                feature: feature.as_str().to_string(),
                pages_with_feature: page_count,
                expected,
                actual,
                percent: percent(actual, expected),
                unmet_rules,
                by_category,
            });
        }

        features.sort_by(|a, b| a.feature.cmp(&b.feature));

        CoverageReport {
            run_id: run_id.to_string(),
            generated_at: Utc::now(),
            overall_percent: percent(total_counted, total_expected),
            features,
            by_severity,
            unmet_by_severity,
        }
    }
}
