//! Directory of k6 result files → summaries → comparison documents.

use std::path::Path;

use chrono::{Duration, TimeZone, Utc};
use k6report_core::results::compare::{
    Comparator, ComparisonBody, ComparisonDocument, ComparisonStatus,
};
use k6report_core::results::{summarize_directory, summarize_file, SuiteReport};
use k6report_core::{ReportConfig, ReportError};

fn point(metric: &str, value: f64, offset_ms: i64) -> String {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let time = (base + Duration::milliseconds(offset_ms)).format("%Y-%m-%dT%H:%M:%S%.9f+00:00");
    format!(
        r#"{{"type":"Point","metric":"{metric}","data":{{"time":"{time}","value":{value},"tags":{{"status":"200"}}}}}}"#
    )
}

/// NDJSON stream with one request/duration/failure triple per request.
fn stream(durations: &[f64], failures: usize, spacing_ms: i64) -> String {
    let mut lines = vec![
        r#"{"type":"Metric","data":{"name":"http_reqs","type":"counter"},"metric":"http_reqs"}"#
            .to_string(),
    ];
    for (i, duration) in durations.iter().enumerate() {
        let at = i as i64 * spacing_ms;
        let failed = if i < failures { 1.0 } else { 0.0 };
        lines.push(point("http_reqs", 1.0, at));
        lines.push(point("http_req_duration", *duration, at));
        lines.push(point("http_req_failed", failed, at));
    }
    lines.join("\n") + "\n"
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).expect("fixture should be written");
}

fn smoke_and_load(dir: &Path) {
    let smoke = [100.0, 120.0, 110.0, 130.0, 90.0, 105.0, 115.0, 95.0, 125.0, 110.0];
    write(dir, "smoke.json", &stream(&smoke, 0, 1000));

    let load: Vec<f64> = (0..1000).map(|i| 200.0 + (i % 50) as f64).collect();
    write(dir, "load.json", &stream(&load, 20, 10));
}

#[test]
fn directory_pipeline_ranks_smoke_and_load() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    smoke_and_load(dir.path());
    let config = ReportConfig::default();

    let batch = summarize_directory(dir.path(), &config).expect("directory should summarize");
    assert!(batch.skipped.is_empty());
    assert_eq!(batch.malformed_records(), 0);

    let smoke = batch
        .summaries
        .iter()
        .find(|s| s.name == "smoke")
        .expect("smoke summary present");
    let load = batch
        .summaries
        .iter()
        .find(|s| s.name == "load")
        .expect("load summary present");

    assert_eq!(smoke.total_requests, 10);
    assert_eq!(smoke.error_rate, 0.0);
    assert!((smoke.duration_avg - 110.0).abs() < 1e-9);
    assert_eq!(smoke.duration_min, 90.0);
    assert_eq!(smoke.duration_max, 130.0);
    // 10 requests between 10:00:00 and 10:00:09.
    assert!((smoke.throughput - 10.0 / 9.0).abs() < 1e-9);

    assert_eq!(load.total_requests, 1000);
    assert_eq!(load.failed_requests, 20);
    assert!((load.error_rate - 2.0).abs() < 1e-9);
    assert!(load.duration_p95 >= load.duration_avg);
    assert!(load.duration_p99 <= load.duration_max);

    let ranking = Comparator::from_config(&config)
        .rank(&batch.summaries)
        .expect("two summaries can be ranked");
    assert_eq!(ranking.test_count, 2);
    assert_eq!(ranking.analysis.best_error_rate, "smoke");
    assert_eq!(ranking.analysis.worst_error_rate, "load");
    assert_eq!(ranking.analysis.best_response_time, "smoke");
    assert_eq!(ranking.analysis.best_throughput, "load");

    let doc = ComparisonDocument::new(ComparisonBody::CrossTest(ranking));
    let json = serde_json::to_value(&doc).expect("document should serialize");
    assert_eq!(json["comparison_type"], "cross_test");
    assert_eq!(json["summary"]["error_rates"]["load"], 2.0);
    assert_eq!(json["analysis"]["worst_error_rate"], "load");
}

#[test]
fn truncated_line_is_skipped_without_failing_the_file() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let mut lines: Vec<String> = (0..8)
        .map(|i| point("http_reqs", 1.0, i * 1000))
        .collect();
    lines[4] = r#"{"type":"Point","metric":"http_reqs","data":{"ti"#.to_string();
    write(dir.path(), "stress-1a2b.json", &lines.join("\n"));

    let batch = summarize_directory(dir.path(), &ReportConfig::default())
        .expect("directory should summarize");
    assert_eq!(batch.summaries.len(), 1);
    let stress = &batch.summaries[0];
    assert_eq!(stress.name, "stress");
    assert_eq!(stress.total_requests, 7);
    assert_eq!(stress.malformed_records, 1);
    assert_eq!(stress.error_rate, 0.0);
    assert!((stress.throughput - 1.0).abs() < 1e-9);
}

#[test]
fn baseline_comparison_flags_regressions() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let baseline_dir = tempfile::tempdir().expect("tempdir should be created");
    let config = ReportConfig::default();

    write(baseline_dir.path(), "baseline.json", &stream(&[100.0; 10], 0, 1000));
    write(dir.path(), "load.json", &stream(&[150.0; 10], 1, 1000));

    let baseline = summarize_file(&baseline_dir.path().join("baseline.json"), &config)
        .expect("baseline should summarize");
    let batch = summarize_directory(dir.path(), &config).expect("directory should summarize");

    let results = Comparator::from_config(&config).compare_all_to_baseline(&batch.summaries, &baseline);
    assert_eq!(results.len(), 1);
    let load = &results[0];
    assert_eq!(load.test_name, "load");
    assert!(load.has_degradation());

    let response = &load.metrics_comparison[0];
    assert!((response.change_percent - 50.0).abs() < 1e-9);
    assert_eq!(response.status, ComparisonStatus::Degraded);

    // Error rate goes from 0 to 10%: a zero baseline reports +100%.
    let errors = &load.metrics_comparison[1];
    assert_eq!(errors.change_percent, 100.0);
    assert_eq!(errors.status, ComparisonStatus::Degraded);

    let throughput = &load.metrics_comparison[2];
    assert_eq!(throughput.status, ComparisonStatus::Stable);

    let doc = ComparisonDocument::new(ComparisonBody::Baseline {
        baseline: baseline.name.clone(),
        results,
    });
    let json = serde_json::to_value(&doc).expect("document should serialize");
    assert_eq!(json["comparison_type"], "baseline");
    assert_eq!(json["results"][0]["metrics_comparison"][0]["metric_name"], "response_time");
}

#[test]
fn single_file_cannot_be_ranked() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    write(dir.path(), "smoke.json", &stream(&[100.0, 110.0], 0, 1000));

    let batch = summarize_directory(dir.path(), &ReportConfig::default())
        .expect("directory should summarize");
    let result = Comparator::default().rank(&batch.summaries);
    assert!(matches!(
        result,
        Err(ReportError::InsufficientData { required: 2, found: 1 })
    ));
}

#[test]
fn file_without_points_summarizes_to_zeros() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    write(
        dir.path(),
        "volume.json",
        r#"{"type":"Metric","data":{"name":"http_reqs","type":"counter"},"metric":"http_reqs"}"#,
    );

    let batch = summarize_directory(dir.path(), &ReportConfig::default())
        .expect("directory should summarize");
    let volume = &batch.summaries[0];
    assert_eq!(volume.total_requests, 0);
    assert_eq!(volume.error_rate, 0.0);
    assert_eq!(volume.throughput, 0.0);
    assert_eq!(volume.duration_avg, 0.0);
    assert_eq!(volume.duration_p95, 0.0);
    assert!(volume.start_time.is_none());
}

#[test]
fn summary_export_and_stream_files_mix_in_one_suite() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    write(dir.path(), "smoke.json", &stream(&[100.0, 110.0], 0, 1000));
    write(
        dir.path(),
        "soak-run.json",
        r#"{
  "metrics": {
    "http_reqs": { "type": "counter", "values": { "count": 600, "rate": 10.0 } },
    "http_req_duration": {
      "type": "trend",
      "values": { "avg": 210.5, "min": 80, "max": 900, "p(95)": 450, "p(99)": 700 }
    },
    "http_req_failed": { "type": "rate", "values": { "rate": 0.03, "passes": 18, "fails": 582 } }
  },
  "state": { "testRunDurationMs": 60000, "vus": 20 }
}"#,
    );

    let config = ReportConfig::default();
    let batch = summarize_directory(dir.path(), &config).expect("directory should summarize");
    let soak = batch
        .summaries
        .iter()
        .find(|s| s.name == "soak")
        .expect("soak summary present");
    assert_eq!(soak.total_requests, 600);
    assert!((soak.error_rate - 3.0).abs() < 1e-9);
    assert_eq!(soak.throughput, 10.0);
    assert_eq!(soak.duration_p95, 450.0);
    assert_eq!(soak.vus, Some(20));

    let report = SuiteReport::from_batch(batch, &config);
    let json = serde_json::to_value(&report).expect("report should serialize");
    assert_eq!(json["results"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["results"][0]["display_name"], "Smoke Test");
    assert_eq!(json["results"][1]["display_name"], "SOAK TEST");
}

#[test]
fn empty_directory_reports_no_results() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let result = summarize_directory(dir.path(), &ReportConfig::default());
    assert!(matches!(result, Err(ReportError::NoResultsFound(_))));
}
