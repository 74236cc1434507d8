//! surface_scout library: authenticated UI discovery, feature validation,
//! and test-coverage scoring for web applications.
//!
//! A run logs into a target application, crawls its navigable surface while
//! deduplicating pages by normalized-URL fingerprint, detects features
//! (search, pagination, filtering, listings, sorting) against a declarative
//! rule catalog, executes validation checks with bounded concurrency,
//! generates replayable test cases, and scores coverage against per-feature
//! minimums.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use surface_scout::{
//!     Engine, EngineSettings, HttpBrowser, NullSink, RuleRegistry, RunRequest, RunStore,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(
//!     Arc::new(HttpBrowser::new("surface_scout/dev")?),
//!     Arc::new(RuleRegistry::with_builtin()),
//!     RunStore::new("./surface_scout_runs"),
//!     Arc::new(NullSink),
//!     EngineSettings::default(),
//! );
//!
//! let run_id = engine
//!     .start(RunRequest {
//!         base_url: "https://app.example.com".into(),
//!         username: "qa".into(),
//!         password: "secret".into(),
//!         environment: Some("staging".into()),
//!     })
//!     .await?;
//! let snapshot = engine.wait(&run_id).await?;
//! println!("{}: {} pages, {} cases", snapshot.state, snapshot.pages_discovered,
//!          snapshot.test_case_count);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! The engine requires a Tokio runtime; use `#[tokio::main]` or call into it
//! from an async context.

#![warn(missing_docs)]

pub mod app;
mod browser;
pub mod config;
mod context;
mod coverage;
mod error_handling;
mod events;
mod generator;
mod identity;
mod machine;
mod page;
mod rules;
mod storage;
mod validator;

// Re-export public API
pub use browser::{
    BrowserDriver, BrowserSession, FormRoute, HttpBrowser, PageView, ScriptedApp, ScriptedBrowser,
};
pub use config::{Config, LogFormat, LogLevel};
pub use context::{ContextDecision, ContextQuestion};
pub use coverage::{CategoryCoverage, CoverageEngine, CoverageReport, FeatureCoverage};
pub use error_handling::{BrowserError, EngineError, ErrorKind, ErrorStats, StorageError};
pub use events::{EngineEvent, EventSink, JsonlSink, MemorySink, NullSink};
pub use generator::{CoverageGap, StepAction, TestCase, TestCaseGenerator, TestStep};
pub use identity::{normalize_url, page_identity, Fingerprint, VisitMarker, VisitedSet};
pub use machine::{Engine, EngineSettings, RunRequest, RunSnapshot, RunState};
pub use page::{
    analyze_signature, enumerate_interactive, ElementKind, InteractiveElement, PageRecord,
    PageSignature,
};
pub use rules::{
    builtin_schemas, Assertion, AssertionKind, CategoryMinimums, DataVariant, DetectionStrategy,
    FeatureProvider, FeatureSchema, FeatureType, RuleAction, RuleCategory, RuleRegistry,
    SchemaProvider, SelectorSpec, SelectorStrategy, Severity, TestDataTemplate, ValidationRule,
};
pub use storage::{RunStore, StoredRun};
pub use validator::{CheckStatus, ParallelValidator, ValidationResult};
