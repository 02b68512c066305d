use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::MetricNames;

// ---------------------------------------------------------------------------
// MetricEvent
// ---------------------------------------------------------------------------

/// One timestamped observation read from a streamed result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricEvent {
    pub metric_name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Earliest and latest timestamp of every point in a file, including points
/// of metrics that are not kept as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
}

impl TimeSpan {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            first: timestamp,
            last: timestamp,
        }
    }

    pub fn include(&mut self, timestamp: DateTime<Utc>) {
        if timestamp < self.first {
            self.first = timestamp;
        }
        if timestamp > self.last {
            self.last = timestamp;
        }
    }
}

// ---------------------------------------------------------------------------
// Stream records
// ---------------------------------------------------------------------------

/// A single line of k6's `--out json` stream.
///
/// Only `Point` lines carry observations; metric declarations and any other
/// record types are accepted and ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum StreamRecord {
    Point(PointRecord),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PointRecord {
    pub metric: String,
    pub data: PointData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PointData {
    pub time: String,
    pub value: PointValue,
}

/// Point values are numbers, but boolean flags show up for rate metrics in
/// some exporters.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub(crate) enum PointValue {
    Number(f64),
    Flag(bool),
}

impl PointValue {
    pub fn as_f64(self) -> f64 {
        match self {
            PointValue::Number(n) => n,
            PointValue::Flag(true) => 1.0,
            PointValue::Flag(false) => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary documents
// ---------------------------------------------------------------------------

/// Whole-file summary as written by `handleSummary`/`--summary-export`.
#[derive(Debug, Deserialize)]
pub(crate) struct SummaryDocument {
    pub metrics: Map<String, Value>,
    #[serde(default)]
    pub state: SummaryState,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SummaryState {
    #[serde(default, alias = "testRunDuration")]
    pub test_run_duration_ms: Option<f64>,
    #[serde(default)]
    pub vus: Option<u64>,
}

/// The handful of values extracted from a summary document.
///
/// Every field is optional: summaries only contain the metrics and
/// percentiles the test was configured to report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SummaryBlock {
    pub request_count: Option<f64>,
    pub request_rate: Option<f64>,
    pub duration_avg: Option<f64>,
    pub duration_min: Option<f64>,
    pub duration_max: Option<f64>,
    pub duration_p95: Option<f64>,
    pub duration_p99: Option<f64>,
    /// Fraction of failed requests in `[0, 1]`.
    pub failure_rate: Option<f64>,
    pub failed_count: Option<f64>,
    pub test_run_duration_ms: Option<f64>,
    pub vus: Option<u64>,
}

impl SummaryBlock {
    pub(crate) fn from_document(doc: &SummaryDocument, names: &MetricNames) -> Self {
        let lookup = |metric: &str, key: &str| metric_value(&doc.metrics, metric, key);

        Self {
            request_count: lookup(&names.request_count, "count"),
            request_rate: lookup(&names.request_count, "rate"),
            duration_avg: lookup(&names.duration, "avg"),
            duration_min: lookup(&names.duration, "min"),
            duration_max: lookup(&names.duration, "max"),
            duration_p95: lookup(&names.duration, "p(95)"),
            duration_p99: lookup(&names.duration, "p(99)"),
            failure_rate: lookup(&names.failure, "rate")
                .or_else(|| lookup(&names.failure, "value")),
            failed_count: lookup(&names.failure, "passes"),
            test_run_duration_ms: doc.state.test_run_duration_ms,
            vus: doc.state.vus,
        }
    }

    pub fn has_durations(&self) -> bool {
        self.duration_avg.is_some() || self.duration_min.is_some() || self.duration_max.is_some()
    }
}

/// Read `metrics.<metric>.values.<key>`, falling back to the flat
/// `metrics.<metric>.<key>` layout of `--summary-export`.
fn metric_value(metrics: &Map<String, Value>, metric: &str, key: &str) -> Option<f64> {
    let entry = metrics.get(metric)?;
    entry
        .get("values")
        .and_then(|values| values.get(key))
        .or_else(|| entry.get(key))
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}
