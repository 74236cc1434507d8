//! On-disk run persistence.
//!
//! Each run owns a directory under the store root:
//!
//! ```text
//! <root>/<run_id>/
//!   snapshot.json    current run snapshot (atomically replaced)
//!   pages.jsonl      one line per discovered page
//!   results.jsonl    one line per completed check
//!   testcases.jsonl  one line per generated test case
//!   coverage.json    latest coverage report
//! ```
//!
//! Pages, results, and test cases are appended as they happen, so a failed
//! or cancelled run leaves its partial artifacts behind for inspection.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::coverage::CoverageReport;
use crate::error_handling::StorageError;
use crate::generator::TestCase;
use crate::machine::RunSnapshot;
use crate::page::PageRecord;
use crate::validator::ValidationResult;

const SNAPSHOT_FILE: &str = "snapshot.json";
const PAGES_FILE: &str = "pages.jsonl";
const RESULTS_FILE: &str = "results.jsonl";
const TESTCASES_FILE: &str = "testcases.jsonl";
const COVERAGE_FILE: &str = "coverage.json";

/// Everything persisted for one run, loaded back into memory.
#[derive(Debug)]
pub struct StoredRun {
    /// Last written snapshot.
    pub snapshot: RunSnapshot,
    /// Discovered pages, in discovery order.
    pub pages: Vec<PageRecord>,
    /// Completed check results, in completion order.
    pub results: Vec<ValidationResult>,
    /// Generated test cases.
    pub test_cases: Vec<TestCase>,
    /// Final coverage report, when the run got that far.
    pub coverage: Option<CoverageReport>,
}

/// Filesystem-backed store for run artifacts.
#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    /// Creates a store rooted at `root`. The directory is created lazily on
    /// the first `init_run`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        RunStore { root: root.into() }
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    /// Creates the directory for a new run.
    pub async fn init_run(&self, run_id: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(self.run_dir(run_id)).await?;
        Ok(())
    }

    /// Replaces the run snapshot atomically (write to a temp file, rename).
    pub async fn write_snapshot(&self, snapshot: &RunSnapshot) -> Result<(), StorageError> {
        let dir = self.run_dir(&snapshot.run_id);
        let tmp = dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        let json = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, dir.join(SNAPSHOT_FILE)).await?;
        Ok(())
    }

    async fn append_line<T: Serialize>(
        &self,
        run_id: &str,
        file: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        let mut handle = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.run_dir(run_id).join(file))
            .await?;
        handle.write_all(&line).await?;
        Ok(())
    }

    /// Appends a discovered page.
    pub async fn append_page(&self, run_id: &str, page: &PageRecord) -> Result<(), StorageError> {
        self.append_line(run_id, PAGES_FILE, page).await
    }

    /// Appends a completed check result.
    pub async fn append_result(
        &self,
        run_id: &str,
        result: &ValidationResult,
    ) -> Result<(), StorageError> {
        self.append_line(run_id, RESULTS_FILE, result).await
    }

    /// Appends a batch of generated test cases.
    pub async fn append_test_cases(
        &self,
        run_id: &str,
        cases: &[TestCase],
    ) -> Result<(), StorageError> {
        for case in cases {
            self.append_line(run_id, TESTCASES_FILE, case).await?;
        }
        Ok(())
    }

    /// Writes the coverage report.
    pub async fn write_coverage(
        &self,
        run_id: &str,
        report: &CoverageReport,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(report)?;
        tokio::fs::write(self.run_dir(run_id).join(COVERAGE_FILE), &json).await?;
        Ok(())
    }

    async fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>, StorageError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let mut items = Vec::new();
                for line in contents.lines().filter(|l| !l.trim().is_empty()) {
                    items.push(serde_json::from_str(line)?);
                }
                Ok(items)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads everything persisted for a run.
    pub async fn load_run(&self, run_id: &str) -> Result<StoredRun, StorageError> {
        let dir = self.run_dir(run_id);
        let snapshot_bytes = match tokio::fs::read(dir.join(SNAPSHOT_FILE)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::RunNotFound(run_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot: RunSnapshot = serde_json::from_slice(&snapshot_bytes)?;

        let pages = self.read_jsonl(&dir.join(PAGES_FILE)).await?;
        let results = self.read_jsonl(&dir.join(RESULTS_FILE)).await?;
        let test_cases = self.read_jsonl(&dir.join(TESTCASES_FILE)).await?;

        let coverage = match tokio::fs::read(dir.join(COVERAGE_FILE)).await {
            Ok(bytes) => Some(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(StoredRun {
            snapshot,
            pages,
            results,
            test_cases,
            coverage,
        })
    }

    /// Lists run ids present in the store, sorted ascending. Run ids start
    /// with a timestamp, so this is also chronological order.
    pub async fn list_runs(&self) -> Result<Vec<String>, StorageError> {
        let mut runs = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(runs),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    runs.push(name.to_string());
                }
            }
        }
        runs.sort();
        Ok(runs)
    }
}
