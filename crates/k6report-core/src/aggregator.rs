use chrono::{DateTime, Utc};

use crate::config::MetricNames;
use crate::loader::{LoadedFile, MetricEvent, ResultContent, SummaryBlock, TimeSpan};
use crate::results::TestSummary;

// ---------------------------------------------------------------------------
// Percentiles
// ---------------------------------------------------------------------------

/// Nearest-rank percentile over an ascending-sorted slice.
///
/// Indexes directly at `floor(p * n)` (zero-based, clamped to the last
/// element) with no interpolation between neighbours. `p` is a fraction in
/// `[0, 1]`. Returns 0 for an empty slice.
pub fn nearest_rank_percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (p * sorted.len() as f64).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

// ---------------------------------------------------------------------------
// ResultAggregator
// ---------------------------------------------------------------------------

/// Folds the events of one result file into a [`TestSummary`].
///
/// Events may arrive in any time order; the earliest and latest timestamps are
/// tracked while folding.
pub struct ResultAggregator<'a> {
    names: &'a MetricNames,
    total_requests: u64,
    failed_requests: u64,
    /// Every duration value of the file. Needed in full for percentiles.
    durations: Vec<f64>,
    duration_sum: f64,
    min_duration: f64,
    max_duration: f64,
    first_seen: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(names: &'a MetricNames) -> Self {
        Self {
            names,
            total_requests: 0,
            failed_requests: 0,
            durations: Vec::new(),
            duration_sum: 0.0,
            min_duration: f64::INFINITY,
            max_duration: f64::NEG_INFINITY,
            first_seen: None,
            last_seen: None,
        }
    }

    /// Fold a single event.
    pub fn observe(&mut self, event: &MetricEvent) {
        let name = event.metric_name.as_str();
        if name == self.names.request_count {
            self.total_requests += 1;
        } else if name == self.names.duration {
            let value = event.value;
            self.durations.push(value);
            self.duration_sum += value;
            self.min_duration = self.min_duration.min(value);
            self.max_duration = self.max_duration.max(value);
        } else if name == self.names.failure && event.value != 0.0 && !event.value.is_nan() {
            self.failed_requests += 1;
        }

        self.note_time(event.timestamp);
    }

    /// Widen the throughput window to cover points that were not kept as
    /// events.
    pub fn observe_span(&mut self, span: TimeSpan) {
        self.note_time(span.first);
        self.note_time(span.last);
    }

    fn note_time(&mut self, timestamp: DateTime<Utc>) {
        if self.first_seen.map_or(true, |t| timestamp < t) {
            self.first_seen = Some(timestamp);
        }
        if self.last_seen.map_or(true, |t| timestamp > t) {
            self.last_seen = Some(timestamp);
        }
    }

    /// Requests per second across the observed time span.
    pub fn throughput(&self) -> f64 {
        match (self.first_seen, self.last_seen) {
            (Some(first), Some(last)) => {
                let span_secs = (last - first).num_microseconds().unwrap_or(i64::MAX) as f64
                    / 1_000_000.0;
                if span_secs > 0.0 {
                    self.total_requests as f64 / span_secs
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Build the summary for this file.
    pub fn finish(mut self, name: String, source_file: String) -> TestSummary {
        let throughput = self.throughput();
        let samples = self.durations.len();

        let (avg, min, max, p95, p99) = if samples == 0 {
            (0.0, 0.0, 0.0, 0.0, 0.0)
        } else {
            self.durations.sort_unstable_by(f64::total_cmp);
            let min = self.min_duration;
            let max = self.max_duration;
            // Summation rounding can push the mean a hair outside [min, max].
            let avg = (self.duration_sum / samples as f64).clamp(min, max);
            (
                avg,
                min,
                max,
                nearest_rank_percentile(&self.durations, 0.95),
                nearest_rank_percentile(&self.durations, 0.99),
            )
        };

        TestSummary {
            name,
            source_file,
            total_requests: self.total_requests,
            failed_requests: self.failed_requests,
            duration_samples: samples as u64,
            duration_avg: avg,
            duration_min: min,
            duration_max: max,
            duration_p95: p95,
            duration_p99: p99,
            error_rate: error_rate(self.failed_requests, self.total_requests),
            throughput,
            start_time: self.first_seen,
            end_time: self.last_seen,
            malformed_records: 0,
            test_run_duration_ms: None,
            vus: None,
        }
    }
}

/// Failed requests as a percentage of all requests, clamped to `[0, 100]`.
pub fn error_rate(failed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (failed as f64 / total as f64 * 100.0).min(100.0)
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Reduce a loaded file to its summary, consuming its events.
pub fn summarize(loaded: LoadedFile, names: &MetricNames) -> TestSummary {
    let source_file = loaded.file_name();
    let malformed_records = loaded.malformed.count();

    let mut summary = match loaded.content {
        ResultContent::Points(events) => {
            let mut agg = ResultAggregator::new(names);
            for event in &events {
                agg.observe(event);
            }
            if let Some(span) = loaded.time_span {
                agg.observe_span(span);
            }
            agg.finish(loaded.name, source_file)
        }
        ResultContent::SummaryBlock(block) => from_summary_block(&block, loaded.name, source_file),
    };
    summary.malformed_records = malformed_records;

    tracing::debug!(
        "Summarized '{}': {} requests, {:.2}% errors, {:.2} req/s",
        summary.name,
        summary.total_requests,
        summary.error_rate,
        summary.throughput
    );
    summary
}

/// Map a pre-aggregated summary block onto a [`TestSummary`].
///
/// Missing values default to zero. The failure rate is a fraction in the
/// block and a percentage in the summary.
pub fn from_summary_block(block: &SummaryBlock, name: String, source_file: String) -> TestSummary {
    let total_requests = block.request_count.map_or(0, |c| c.max(0.0).round() as u64);

    let error_rate_pct = match block.failure_rate {
        Some(rate) => (rate * 100.0).clamp(0.0, 100.0),
        None => error_rate(
            block.failed_count.map_or(0, |c| c.max(0.0).round() as u64),
            total_requests,
        ),
    };
    let error_rate_pct = if total_requests == 0 { 0.0 } else { error_rate_pct };

    let failed_requests = match block.failed_count {
        Some(count) => count.max(0.0).round() as u64,
        None => (error_rate_pct / 100.0 * total_requests as f64).round() as u64,
    };

    let throughput = match (block.request_rate, block.test_run_duration_ms) {
        (Some(rate), _) => rate.max(0.0),
        (None, Some(ms)) if ms > 0.0 => total_requests as f64 / (ms / 1000.0),
        _ => 0.0,
    };

    let (avg, min, max) = if block.has_durations() {
        let min = block.duration_min.unwrap_or(0.0);
        let max = block.duration_max.unwrap_or(min);
        let avg = block.duration_avg.unwrap_or(0.0);
        let avg = if min <= max { avg.clamp(min, max) } else { avg };
        (avg, min, max)
    } else {
        (0.0, 0.0, 0.0)
    };

    TestSummary {
        name,
        source_file,
        total_requests,
        failed_requests,
        duration_samples: if block.has_durations() { total_requests } else { 0 },
        duration_avg: avg,
        duration_min: min,
        duration_max: max,
        duration_p95: block.duration_p95.unwrap_or(0.0),
        duration_p99: block.duration_p99.unwrap_or(0.0),
        error_rate: error_rate_pct,
        throughput,
        start_time: None,
        end_time: None,
        malformed_records: 0,
        test_run_duration_ms: block.test_run_duration_ms,
        vus: block.vus,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
