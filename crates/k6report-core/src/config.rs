use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

// ---------------------------------------------------------------------------
// TestVocabulary
// ---------------------------------------------------------------------------

/// Mapping from canonical test-type keywords (`smoke`, `load`, ...) to the
/// names shown in reports.
///
/// Keywords are matched case-insensitively. Names outside the vocabulary are
/// still reported, just rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct TestVocabulary {
    entries: BTreeMap<String, String>,
}

impl From<BTreeMap<String, String>> for TestVocabulary {
    fn from(map: BTreeMap<String, String>) -> Self {
        let mut vocab = Self::empty();
        for (keyword, display) in map {
            vocab.insert(keyword, display);
        }
        vocab
    }
}

impl From<TestVocabulary> for BTreeMap<String, String> {
    fn from(vocab: TestVocabulary) -> Self {
        vocab.entries
    }
}

impl TestVocabulary {
    /// An empty vocabulary. Every test name falls back to verbatim rendering.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace a keyword.
    pub fn insert(&mut self, keyword: impl Into<String>, display_name: impl Into<String>) {
        self.entries
            .insert(keyword.into().to_lowercase(), display_name.into());
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.entries.contains_key(&keyword.to_lowercase())
    }

    /// Find the keyword that occurs inside `name`.
    ///
    /// When several keywords match, the longest one wins (so `stress` beats a
    /// hypothetical `st`). Ties resolve alphabetically.
    pub fn keyword_in(&self, name: &str) -> Option<&str> {
        let lowered = name.to_lowercase();
        self.entries
            .keys()
            .filter(|k| !k.is_empty() && lowered.contains(k.as_str()))
            .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(String::as_str)
    }

    /// Human-readable name for a test.
    ///
    /// Unknown names are upper-cased; ` TEST` is appended when the name has no
    /// `-`/`_` separator.
    pub fn display_name(&self, name: &str) -> String {
        if let Some(display) = self.entries.get(&name.to_lowercase()) {
            return display.clone();
        }
        let upper = name.to_uppercase();
        if name.contains('-') || name.contains('_') {
            upper
        } else {
            format!("{upper} TEST")
        }
    }
}

impl Default for TestVocabulary {
    fn default() -> Self {
        let mut vocab = Self::empty();
        for (keyword, display) in [
            ("smoke", "Smoke Test"),
            ("load", "Load Test"),
            ("stress", "Stress Test"),
            ("volume", "Volume Test"),
            ("security", "Security Test"),
            ("adaptive", "Adaptive Test"),
        ] {
            vocab.insert(keyword, display);
        }
        vocab
    }
}

// ---------------------------------------------------------------------------
// MetricNames
// ---------------------------------------------------------------------------

/// Names of the metrics the aggregator folds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MetricNames {
    /// One point per issued request.
    pub request_count: String,
    /// One point per request carrying its duration in milliseconds.
    pub duration: String,
    /// One point per request; a non-zero value marks a failed request.
    pub failure: String,
}

impl MetricNames {
    /// Whether points of `metric` feed the aggregator.
    pub fn tracks(&self, metric: &str) -> bool {
        metric == self.request_count || metric == self.duration || metric == self.failure
    }
}

impl Default for MetricNames {
    fn default() -> Self {
        Self {
            request_count: "http_reqs".to_string(),
            duration: "http_req_duration".to_string(),
            failure: "http_req_failed".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// VerdictThresholds
// ---------------------------------------------------------------------------

/// Error-rate percentages separating PASS, WARN and FAIL verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct VerdictThresholds {
    pub warn_error_rate: f64,
    pub fail_error_rate: f64,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            warn_error_rate: 1.0,
            fail_error_rate: 5.0,
        }
    }
}

// ---------------------------------------------------------------------------
// ReportConfig
// ---------------------------------------------------------------------------

/// Configuration shared by the loader, comparator and report emitters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ReportConfig {
    pub vocabulary: TestVocabulary,
    pub metrics: MetricNames,
    /// Percentage change a metric must exceed to count as improved/degraded.
    pub change_threshold_percent: f64,
    pub verdict: VerdictThresholds,
    pub suite_title: String,
    /// Malformed-record samples retained per file.
    pub malformed_sample_limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            vocabulary: TestVocabulary::default(),
            metrics: MetricNames::default(),
            change_threshold_percent: 10.0,
            verdict: VerdictThresholds::default(),
            suite_title: "k6 Load Test Report".to_string(),
            malformed_sample_limit: 5,
        }
    }
}

impl ReportConfig {
    /// Check thresholds for values that would make classification meaningless.
    pub fn validate(&self) -> Result<(), ReportError> {
        let thresholds = [
            ("change_threshold_percent", self.change_threshold_percent),
            ("verdict.warn_error_rate", self.verdict.warn_error_rate),
            ("verdict.fail_error_rate", self.verdict.fail_error_rate),
        ];
        for (field, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(ReportError::Config(format!(
                    "{field} must be a non-negative number (got {value})"
                )));
            }
        }
        if self.verdict.warn_error_rate > self.verdict.fail_error_rate {
            return Err(ReportError::Config(format!(
                "verdict.warn_error_rate ({}) must not exceed verdict.fail_error_rate ({})",
                self.verdict.warn_error_rate, self.verdict.fail_error_rate
            )));
        }
        for (field, name) in [
            ("metrics.request_count", &self.metrics.request_count),
            ("metrics.duration", &self.metrics.duration),
            ("metrics.failure", &self.metrics.failure),
        ] {
            if name.trim().is_empty() {
                return Err(ReportError::Config(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Read a JSON configuration file and validate it.
///
/// Fields missing from the file keep their defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<ReportConfig, ReportError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let config: ReportConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
