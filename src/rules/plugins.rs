//! Plugin catalog loading.
//!
//! A plugin is a JSON file in the extension directory containing one
//! [`FeatureSchema`]. Files are loaded at startup; a malformed file is
//! skipped and logged, never crashing discovery.

use std::path::Path;

use crate::rules::FeatureSchema;

/// What a scan of the plugin directory produced.
pub(crate) struct PluginScan {
    /// Schemas that parsed and validated.
    pub(crate) schemas: Vec<FeatureSchema>,
    /// `.json` files skipped as unreadable, malformed, or invalid.
    pub(crate) skipped: usize,
}

/// Loads every parseable schema from `dir`.
///
/// Missing directory yields an empty scan (running without plugins is the
/// normal case). Each `.json` file must hold a single schema whose rules
/// all carry the schema's feature type.
pub(crate) async fn load_plugin_schemas(dir: &Path) -> PluginScan {
    let mut scan = PluginScan {
        schemas: Vec::new(),
        skipped: 0,
    };

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("plugin directory {} not readable: {e}", dir.display());
            return scan;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                log::warn!("error listing plugin directory {}: {e}", dir.display());
                break;
            }
        };
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                log::warn!("skipping unreadable plugin {}: {e}", path.display());
                scan.skipped += 1;
                continue;
            }
        };
        match serde_json::from_str::<FeatureSchema>(&content) {
            Ok(schema) => match validate_schema(&schema) {
                Ok(()) => {
                    log::info!(
                        "loaded plugin schema '{}' ({} rules) from {}",
                        schema.feature,
                        schema.rules.len(),
                        path.display()
                    );
                    scan.schemas.push(schema);
                }
                Err(reason) => {
                    log::warn!("skipping invalid plugin {}: {reason}", path.display());
                    scan.skipped += 1;
                }
            },
            Err(e) => {
                log::warn!("skipping malformed plugin {}: {e}", path.display());
                scan.skipped += 1;
            }
        }
    }

    scan
}

fn validate_schema(schema: &FeatureSchema) -> Result<(), String> {
    if schema.feature.as_str().trim().is_empty() {
        return Err("empty feature type".to_string());
    }
    let mut ids = std::collections::HashSet::new();
    for rule in &schema.rules {
        if rule.id.trim().is_empty() {
            return Err("rule with empty id".to_string());
        }
        if !ids.insert(rule.id.as_str()) {
            return Err(format!("duplicate rule id '{}'", rule.id));
        }
        if rule.feature != schema.feature {
            return Err(format!(
                "rule '{}' declares feature '{}' but the schema is for '{}'",
                rule.id, rule.feature, schema.feature
            ));
        }
        if rule.selector.candidates.is_empty() {
            return Err(format!("rule '{}' has no selector candidates", rule.id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VALID_PLUGIN: &str = r#"{
        "feature": "export",
        "detection": { "keywords": ["export", "download"] },
        "minimums": { "positive": 1 },
        "rules": [
            {
                "id": "export-button-works",
                "feature": "export",
                "category": "positive",
                "severity": "medium",
                "selector": { "strategy": "css", "candidates": ["a.export", "button.export"] },
                "action": "click",
                "expected_behavior": "clicking export triggers a download link",
                "assertion": { "kind": "url_changed" }
            }
        ]
    }"#;

    #[tokio::test]
    async fn loads_valid_plugin() {
        let dir = TempDir::new().expect("tempdir");
        tokio::fs::write(dir.path().join("export.json"), VALID_PLUGIN)
            .await
            .expect("write plugin");

        let scan = load_plugin_schemas(dir.path()).await;
        assert_eq!(scan.schemas.len(), 1);
        assert_eq!(scan.skipped, 0);
        assert_eq!(scan.schemas[0].feature.as_str(), "export");
        assert_eq!(scan.schemas[0].minimums.positive, 1);
        assert_eq!(scan.schemas[0].rules.len(), 1);
    }

    #[tokio::test]
    async fn skips_malformed_files_and_keeps_valid_ones() {
        let dir = TempDir::new().expect("tempdir");
        tokio::fs::write(dir.path().join("broken.json"), "{ not json")
            .await
            .expect("write broken");
        tokio::fs::write(dir.path().join("notes.txt"), "not a plugin")
            .await
            .expect("write txt");
        tokio::fs::write(dir.path().join("export.json"), VALID_PLUGIN)
            .await
            .expect("write plugin");

        let scan = load_plugin_schemas(dir.path()).await;
        assert_eq!(scan.schemas.len(), 1);
        // broken.json counts as skipped; notes.txt is not a plugin at all.
        assert_eq!(scan.skipped, 1);
    }

    #[tokio::test]
    async fn rejects_schema_with_mismatched_rule_feature() {
        let dir = TempDir::new().expect("tempdir");
        let mismatched = VALID_PLUGIN.replace(r#""feature": "export","#, r#""feature": "other","#);
        // Only the rule's feature is rewritten; the schema keeps "export".
        let mismatched = mismatched.replacen(r#""feature": "other","#, r#""feature": "export","#, 1);
        tokio::fs::write(dir.path().join("export.json"), mismatched)
            .await
            .expect("write plugin");

        let scan = load_plugin_schemas(dir.path()).await;
        assert!(scan.schemas.is_empty());
        assert_eq!(scan.skipped, 1);
    }

    #[tokio::test]
    async fn missing_directory_yields_empty() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("no-such-dir");
        let scan = load_plugin_schemas(&missing).await;
        assert!(scan.schemas.is_empty());
        assert_eq!(scan.skipped, 0);
    }
}
