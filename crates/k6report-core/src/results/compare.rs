//! Baseline and cross-test comparison of [`TestSummary`] values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TestSummary;
use crate::config::ReportConfig;
use crate::error::ReportError;

/// Minimum number of summaries a cross-test ranking needs.
pub const MIN_CROSS_TEST_SUMMARIES: usize = 2;

// ---------------------------------------------------------------------------
// Metric direction and status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    LowerIsBetter,
    HigherIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Improved,
    Degraded,
    Stable,
}

impl std::fmt::Display for ComparisonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComparisonStatus::Improved => "improved",
            ComparisonStatus::Degraded => "degraded",
            ComparisonStatus::Stable => "stable",
        };
        write!(f, "{s}")
    }
}

/// Metrics tracked by baseline comparison and cross-test ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedMetric {
    ResponseTime,
    ErrorRate,
    Throughput,
}

impl TrackedMetric {
    pub const ALL: [TrackedMetric; 3] = [
        TrackedMetric::ResponseTime,
        TrackedMetric::ErrorRate,
        TrackedMetric::Throughput,
    ];

    pub fn direction(self) -> Direction {
        match self {
            TrackedMetric::ResponseTime | TrackedMetric::ErrorRate => Direction::LowerIsBetter,
            TrackedMetric::Throughput => Direction::HigherIsBetter,
        }
    }

    pub fn value_of(self, summary: &TestSummary) -> f64 {
        match self {
            TrackedMetric::ResponseTime => summary.duration_avg,
            TrackedMetric::ErrorRate => summary.error_rate,
            TrackedMetric::Throughput => summary.throughput,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackedMetric::ResponseTime => "response_time",
            TrackedMetric::ErrorRate => "error_rate",
            TrackedMetric::Throughput => "throughput",
        }
    }
}

impl std::fmt::Display for TrackedMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage change from `baseline` to `current`.
///
/// A zero baseline yields 0 when `current` is also zero and 100 otherwise.
pub fn percentage_change(baseline: f64, current: f64) -> f64 {
    if baseline == 0.0 {
        return if current == 0.0 { 0.0 } else { 100.0 };
    }
    (current - baseline) / baseline * 100.0
}

/// Classify a percentage change. Changes of exactly `threshold` are stable.
pub fn classify(change_percent: f64, direction: Direction, threshold: f64) -> ComparisonStatus {
    let favourable = match direction {
        Direction::LowerIsBetter => -change_percent,
        Direction::HigherIsBetter => change_percent,
    };
    if favourable > threshold {
        ComparisonStatus::Improved
    } else if favourable < -threshold {
        ComparisonStatus::Degraded
    } else {
        ComparisonStatus::Stable
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Change of one metric between a baseline and a current summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ComparisonResult {
    pub metric_name: TrackedMetric,
    pub baseline_value: f64,
    pub current_value: f64,
    pub change_percent: f64,
    pub status: ComparisonStatus,
}

/// All tracked metrics of one current test against the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BaselineComparison {
    pub test_name: String,
    pub metrics_comparison: Vec<ComparisonResult>,
}

impl BaselineComparison {
    pub fn has_degradation(&self) -> bool {
        self.metrics_comparison
            .iter()
            .any(|r| r.status == ComparisonStatus::Degraded)
    }
}

/// Per-metric value of every test, keyed by test name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricTable {
    pub response_times: BTreeMap<String, f64>,
    pub error_rates: BTreeMap<String, f64>,
    pub throughput: BTreeMap<String, f64>,
}

/// Best and worst test per metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RankingAnalysis {
    pub best_response_time: String,
    pub worst_response_time: String,
    pub best_error_rate: String,
    pub worst_error_rate: String,
    pub best_throughput: String,
    pub worst_throughput: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CrossTestRanking {
    pub test_count: usize,
    pub summary: MetricTable,
    pub analysis: RankingAnalysis,
}

// ---------------------------------------------------------------------------
// Comparator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Comparator {
    threshold_percent: f64,
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl Comparator {
    pub fn new(threshold_percent: f64) -> Self {
        Self { threshold_percent }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.change_threshold_percent)
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    /// One [`ComparisonResult`] per tracked metric.
    pub fn compare_to_baseline(
        &self,
        current: &TestSummary,
        baseline: &TestSummary,
    ) -> Vec<ComparisonResult> {
        TrackedMetric::ALL
            .iter()
            .map(|&metric| {
                let baseline_value = metric.value_of(baseline);
                let current_value = metric.value_of(current);
                let change_percent = percentage_change(baseline_value, current_value);
                ComparisonResult {
                    metric_name: metric,
                    baseline_value,
                    current_value,
                    change_percent,
                    status: classify(change_percent, metric.direction(), self.threshold_percent),
                }
            })
            .collect()
    }

    /// Compare every current summary against the same baseline.
    pub fn compare_all_to_baseline(
        &self,
        current: &[TestSummary],
        baseline: &TestSummary,
    ) -> Vec<BaselineComparison> {
        current
            .iter()
            .map(|summary| BaselineComparison {
                test_name: summary.name.clone(),
                metrics_comparison: self.compare_to_baseline(summary, baseline),
            })
            .collect()
    }

    /// Rank tests against each other.
    ///
    /// Fails with [`ReportError::InsufficientData`] for fewer than two
    /// summaries. Ties go to the summary that comes first.
    pub fn rank(&self, summaries: &[TestSummary]) -> Result<CrossTestRanking, ReportError> {
        if summaries.len() < MIN_CROSS_TEST_SUMMARIES {
            return Err(ReportError::InsufficientData {
                required: MIN_CROSS_TEST_SUMMARIES,
                found: summaries.len(),
            });
        }

        let mut table = MetricTable::default();
        for s in summaries {
            if table.response_times.contains_key(&s.name) {
                tracing::warn!(
                    "Duplicate test name '{}' ({}); metric table keeps the later entry",
                    s.name,
                    s.source_file
                );
            }
            table.response_times.insert(s.name.clone(), s.duration_avg);
            table.error_rates.insert(s.name.clone(), s.error_rate);
            table.throughput.insert(s.name.clone(), s.throughput);
        }

        let pick = |metric: TrackedMetric, want_best: bool| -> String {
            let lower_wins = (metric.direction() == Direction::LowerIsBetter) == want_best;
            let mut chosen = &summaries[0];
            for s in &summaries[1..] {
                let (candidate, current) = (metric.value_of(s), metric.value_of(chosen));
                let better = if lower_wins {
                    candidate < current
                } else {
                    candidate > current
                };
                if better {
                    chosen = s;
                }
            }
            chosen.name.clone()
        };

        let analysis = RankingAnalysis {
            best_response_time: pick(TrackedMetric::ResponseTime, true),
            worst_response_time: pick(TrackedMetric::ResponseTime, false),
            best_error_rate: pick(TrackedMetric::ErrorRate, true),
            worst_error_rate: pick(TrackedMetric::ErrorRate, false),
            best_throughput: pick(TrackedMetric::Throughput, true),
            worst_throughput: pick(TrackedMetric::Throughput, false),
        };

        Ok(CrossTestRanking {
            test_count: summaries.len(),
            summary: table,
            analysis,
        })
    }
}

// ---------------------------------------------------------------------------
// ComparisonDocument
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "comparison_type", rename_all = "snake_case")]
pub enum ComparisonBody {
    Baseline {
        baseline: String,
        results: Vec<BaselineComparison>,
    },
    CrossTest(CrossTestRanking),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ComparisonDocument {
    pub report_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: ComparisonBody,
}

impl ComparisonDocument {
    pub fn new(body: ComparisonBody) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            body,
        }
    }

    /// `baseline` or `cross_test`, matching the serialized tag.
    pub fn comparison_type(&self) -> &'static str {
        match self.body {
            ComparisonBody::Baseline { .. } => "baseline",
            ComparisonBody::CrossTest(_) => "cross_test",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
