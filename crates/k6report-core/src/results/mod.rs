pub mod compare;
pub mod export;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregator;
use crate::config::{ReportConfig, VerdictThresholds};
use crate::error::ReportError;
use crate::loader::ResultLoader;

/// Aggregated statistics for one test run (one result file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TestSummary {
    /// Test name derived from the file name, hash suffix stripped.
    pub name: String,
    /// File name the summary was read from.
    pub source_file: String,
    /// Number of request-count points.
    pub total_requests: u64,
    /// Number of failure points with a non-zero value.
    pub failed_requests: u64,
    /// Number of duration values the duration statistics were computed from.
    /// For pre-aggregated summaries this is the request count when duration
    /// values were present.
    pub duration_samples: u64,
    /// Mean request duration (ms). Zero when there are no samples.
    pub duration_avg: f64,
    pub duration_min: f64,
    pub duration_max: f64,
    /// Nearest-rank 95th percentile (ms).
    pub duration_p95: f64,
    /// Nearest-rank 99th percentile (ms).
    pub duration_p99: f64,
    /// Failed requests as a percentage in `[0, 100]`.
    pub error_rate: f64,
    /// Requests per second.
    pub throughput: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Records skipped while loading the file.
    #[serde(default)]
    pub malformed_records: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_run_duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vus: Option<u64>,
}

impl TestSummary {
    pub fn verdict(&self, thresholds: &VerdictThresholds) -> TestVerdict {
        TestVerdict::classify(self.error_rate, thresholds)
    }

    /// A test counts as passed in chat summaries only with zero errors.
    pub fn is_error_free(&self) -> bool {
        self.error_rate == 0.0
    }
}

// ---------------------------------------------------------------------------
// TestVerdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestVerdict {
    Pass,
    Warn,
    Fail,
}

impl TestVerdict {
    /// FAIL above `fail_error_rate`, WARN above `warn_error_rate`, else PASS.
    pub fn classify(error_rate: f64, thresholds: &VerdictThresholds) -> Self {
        if error_rate > thresholds.fail_error_rate {
            TestVerdict::Fail
        } else if error_rate > thresholds.warn_error_rate {
            TestVerdict::Warn
        } else {
            TestVerdict::Pass
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TestVerdict::Pass => "PASS",
            TestVerdict::Warn => "WARN",
            TestVerdict::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for TestVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Batch processing
// ---------------------------------------------------------------------------

/// A result file that was skipped entirely.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: ReportError,
}

/// Summaries for every readable file of a results directory.
#[derive(Debug)]
pub struct BatchOutcome {
    pub summaries: Vec<TestSummary>,
    pub skipped: Vec<SkippedFile>,
}

impl BatchOutcome {
    pub fn malformed_records(&self) -> u64 {
        self.summaries.iter().map(|s| s.malformed_records).sum()
    }
}

/// Load and aggregate every result file in `dir`.
///
/// Returns [`ReportError::NoResultsFound`] when the directory holds no
/// readable result files.
pub fn summarize_directory(dir: &Path, config: &ReportConfig) -> Result<BatchOutcome, ReportError> {
    let files = ResultLoader::new(config).discover(dir)?;
    if files.is_empty() {
        return Err(ReportError::NoResultsFound(dir.to_path_buf()));
    }

    let batch = summarize_paths(&files, config);
    if batch.summaries.is_empty() {
        return Err(ReportError::NoResultsFound(dir.to_path_buf()));
    }
    Ok(batch)
}

/// Load and aggregate the given result files in order.
///
/// Files are processed one at a time; a file's events are dropped as soon as
/// its summary is built. Files that fail to load are logged and listed in
/// [`BatchOutcome::skipped`].
pub fn summarize_paths(paths: &[PathBuf], config: &ReportConfig) -> BatchOutcome {
    let loader = ResultLoader::new(config);
    let mut summaries = Vec::with_capacity(paths.len());
    let mut skipped = Vec::new();
    for path in paths {
        match loader.load_file(path) {
            Ok(loaded) => summaries.push(aggregator::summarize(loaded, &config.metrics)),
            Err(error) => {
                tracing::warn!("Skipping {}: {error}", path.display());
                skipped.push(SkippedFile {
                    path: path.clone(),
                    error,
                });
            }
        }
    }
    BatchOutcome { summaries, skipped }
}

/// Load and aggregate a single result file, e.g. a baseline.
pub fn summarize_file(path: &Path, config: &ReportConfig) -> Result<TestSummary, ReportError> {
    let loaded = ResultLoader::new(config).load_file(path)?;
    Ok(aggregator::summarize(loaded, &config.metrics))
}

// ---------------------------------------------------------------------------
// SuiteReport
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SuiteEntry {
    pub test_name: String,
    pub display_name: String,
    pub verdict: TestVerdict,
    /// Run duration reported by a summary document; `null` for streams.
    pub test_run_duration_ms: Option<f64>,
    /// Virtual users reported by a summary document; `null` for streams.
    pub vus: Option<u64>,
    pub summary: TestSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SuiteReport {
    pub report_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub test_suite: String,
    pub results: Vec<SuiteEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedFile>,
}

impl SuiteReport {
    pub fn from_batch(batch: BatchOutcome, config: &ReportConfig) -> Self {
        let results = batch
            .summaries
            .into_iter()
            .map(|summary| SuiteEntry {
                test_name: summary.name.clone(),
                display_name: config.vocabulary.display_name(&summary.name),
                verdict: summary.verdict(&config.verdict),
                test_run_duration_ms: summary.test_run_duration_ms,
                vus: summary.vus,
                summary,
            })
            .collect();
        Self {
            report_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            test_suite: config.suite_title.clone(),
            results,
            skipped: batch.skipped,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
