//! Run lifecycle events.
//!
//! Everything observable about a run is narrated as [`EngineEvent`]s pushed
//! through an [`EventSink`]. The engine itself never blocks on a sink; sinks
//! must be cheap and infallible from the caller's point of view.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::context::ContextQuestion;
use crate::identity::Fingerprint;
use crate::machine::RunState;
use crate::rules::FeatureType;
use crate::validator::ValidationResult;

/// One observable step of a run, serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The run moved between lifecycle states.
    RunStateChanged {
        run_id: String,
        from: RunState,
        to: RunState,
    },
    /// A page with a previously unseen fingerprint was confirmed.
    PageDiscovered {
        run_id: String,
        fingerprint: Fingerprint,
        normalized_url: String,
        depth: usize,
        features: Vec<FeatureType>,
    },
    /// The run paused on an ambiguous context switcher.
    ContextQuestionRaised {
        run_id: String,
        question: ContextQuestion,
    },
    /// A context was chosen, by the operator or automatically.
    ContextResolved {
        run_id: String,
        context: Option<String>,
    },
    /// A validation check began executing.
    CheckStarted {
        run_id: String,
        rule_id: String,
        fingerprint: Fingerprint,
    },
    /// A validation check finished, in any terminal status.
    CheckCompleted {
        run_id: String,
        result: ValidationResult,
    },
    /// Test cases were generated for a page.
    TestCasesGenerated {
        run_id: String,
        fingerprint: Fingerprint,
        count: usize,
    },
    /// The coverage report was recomputed.
    CoverageUpdated {
        run_id: String,
        overall_percent: f64,
    },
    /// The run reached FAILED.
    RunFailed { run_id: String, reason: String },
}

/// Receives events as the run produces them.
pub trait EventSink: Send + Sync {
    /// Delivers one event. Must not panic; delivery problems are the sink's
    /// to log and swallow.
    fn emit(&self, event: &EngineEvent);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &EngineEvent) {}
}

/// Buffers events in memory; used by tests to assert on run behavior.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<EngineEvent>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().expect("event buffer poisoned").clone()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &EngineEvent) {
        self.events
            .lock()
            .expect("event buffer poisoned")
            .push(event.clone());
    }
}

/// Appends events as JSON lines to a file.
pub struct JsonlSink {
    file: Mutex<File>,
}

impl JsonlSink {
    /// Opens (or creates) the event log in append mode.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(JsonlSink {
            file: Mutex::new(file),
        })
    }
}

impl EventSink for JsonlSink {
    fn emit(&self, event: &EngineEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                log::warn!("failed to serialize event: {e}");
                return;
            }
        };
        let mut file = self.file.lock().expect("event log poisoned");
        if let Err(e) = writeln!(file, "{line}") {
            log::warn!("failed to append event: {e}");
        }
    }
}
