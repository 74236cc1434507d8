//! The validation-rule registry.
//!
//! Feature schemas are exposed through [`FeatureProvider`] — one capability
//! interface, N implementations — so the scheduler never enumerates feature
//! types itself. The registry is an explicitly constructed, injected object
//! scoped to a process, never an ambient global.

use std::collections::HashSet;
use std::path::Path;

use crate::page::PageSignature;

use super::plugins::load_plugin_schemas;
use super::{builtin_schemas, FeatureSchema, FeatureType};

/// A source of one feature type's schema and presence detection.
pub trait FeatureProvider: Send + Sync {
    /// The feature type this provider describes.
    fn feature_type(&self) -> FeatureType;

    /// The full schema: detection strategy, rules, coverage minimums.
    fn schema(&self) -> &FeatureSchema;

    /// Whether the feature is present on a page with this signature.
    fn detect(&self, signature: &PageSignature) -> bool;
}

/// Provider backed by a declarative [`FeatureSchema`]; used for both the
/// built-in catalog and plugin-supplied catalogs.
pub struct SchemaProvider {
    schema: FeatureSchema,
}

impl SchemaProvider {
    /// Wraps a schema as a provider.
    pub fn new(schema: FeatureSchema) -> Self {
        SchemaProvider { schema }
    }
}

impl FeatureProvider for SchemaProvider {
    fn feature_type(&self) -> FeatureType {
        self.schema.feature.clone()
    }

    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn detect(&self, signature: &PageSignature) -> bool {
        self.schema.detection.matches(signature)
    }
}

/// Holds all registered feature providers, in registration order.
pub struct RuleRegistry {
    providers: Vec<Box<dyn FeatureProvider>>,
    plugin_load_failures: usize,
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        RuleRegistry {
            providers: Vec::new(),
            plugin_load_failures: 0,
        }
    }

    /// A registry pre-populated with the built-in catalog.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for schema in builtin_schemas() {
            registry.register(Box::new(SchemaProvider::new(schema)));
        }
        registry
    }

    /// Registers a provider. A provider for an already-registered feature
    /// type replaces the existing one, so plugins can override built-ins.
    pub fn register(&mut self, provider: Box<dyn FeatureProvider>) {
        let feature = provider.feature_type();
        if let Some(existing) = self
            .providers
            .iter()
            .position(|p| p.feature_type() == feature)
        {
            log::warn!("replacing existing schema for feature type '{feature}'");
            self.providers[existing] = provider;
        } else {
            self.providers.push(provider);
        }
    }

    /// Loads plugin catalogs from a directory of JSON files.
    ///
    /// Malformed files are skipped with a warning; they never abort
    /// discovery. Returns the number of schemas registered.
    pub async fn load_plugins(&mut self, dir: &Path) -> usize {
        let scan = load_plugin_schemas(dir).await;
        self.plugin_load_failures += scan.skipped;
        let count = scan.schemas.len();
        for schema in scan.schemas {
            self.register(Box::new(SchemaProvider::new(schema)));
        }
        count
    }

    /// Plugin files skipped as unreadable, malformed, or invalid across all
    /// `load_plugins` calls. Runs seed their `plugin_load` error tally from
    /// this count.
    pub fn plugin_load_failures(&self) -> usize {
        self.plugin_load_failures
    }

    /// The schema for one feature type, if registered.
    pub fn schema(&self, feature: &FeatureType) -> Option<&FeatureSchema> {
        self.providers
            .iter()
            .find(|p| &p.feature_type() == feature)
            .map(|p| p.schema())
    }

    /// All registered feature types, in registration order.
    pub fn feature_types(&self) -> Vec<FeatureType> {
        self.providers.iter().map(|p| p.feature_type()).collect()
    }

    /// Feature types whose detection matches the given page signature.
    pub fn detect_features(&self, signature: &PageSignature) -> Vec<FeatureType> {
        self.providers
            .iter()
            .filter(|p| p.detect(signature))
            .map(|p| p.feature_type())
            .collect()
    }

    /// Union of every provider's detection selectors, deduplicated. Page
    /// signature analysis evaluates exactly these against the DOM.
    pub fn detection_selectors(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut selectors = Vec::new();
        for provider in &self.providers {
            for selector in &provider.schema().detection.any_selectors {
                if seen.insert(selector.clone()) {
                    selectors.push(selector.clone());
                }
            }
        }
        selectors
    }

    /// Total number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{CategoryMinimums, DetectionStrategy};

    fn custom_schema(name: &str) -> FeatureSchema {
        FeatureSchema {
            feature: FeatureType::new(name),
            detection: DetectionStrategy {
                any_selectors: vec![],
                keywords: vec![name.to_string()],
                requires_table: false,
            },
            rules: vec![],
            minimums: CategoryMinimums::default(),
        }
    }

    #[test]
    fn builtin_registry_has_five_features() {
        let registry = RuleRegistry::with_builtin();
        let features = registry.feature_types();
        assert_eq!(features.len(), 5);
        assert!(features.iter().any(|f| f.as_str() == "search"));
        assert!(features.iter().any(|f| f.as_str() == "pagination"));
    }

    #[test]
    fn registering_same_feature_replaces() {
        let mut registry = RuleRegistry::new();
        registry.register(Box::new(SchemaProvider::new(custom_schema("export"))));
        registry.register(Box::new(SchemaProvider::new(custom_schema("export"))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn detection_selectors_deduplicate() {
        let registry = RuleRegistry::with_builtin();
        let selectors = registry.detection_selectors();
        let mut dedup = selectors.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), selectors.len());
        assert!(!selectors.is_empty());
    }
}
