use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::compare::{ComparisonBody, ComparisonDocument, ComparisonStatus};
use super::{SuiteReport, TestSummary, TestVerdict};
use crate::config::ReportConfig;
use crate::error::ReportError;

// ---------------------------------------------------------------------------
// JSON export
// ---------------------------------------------------------------------------

/// Export a suite report as pretty-printed JSON.
pub fn export_suite_json(report: &SuiteReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Export a comparison document as pretty-printed JSON.
pub fn export_comparison_json(doc: &ComparisonDocument) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(doc)
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Export one CSV row per test summary, with a header row.
pub fn export_csv(summaries: &[TestSummary], config: &ReportConfig) -> Result<String, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| ReportError::Export(format!("CSV write failed: {e}"));

    writer
        .write_record([
            "test_name",
            "display_name",
            "source_file",
            "total_requests",
            "failed_requests",
            "error_rate_pct",
            "throughput_rps",
            "duration_avg_ms",
            "duration_min_ms",
            "duration_max_ms",
            "duration_p95_ms",
            "duration_p99_ms",
            "malformed_records",
            "verdict",
        ])
        .map_err(csv_err)?;

    for s in summaries {
        writer
            .write_record([
                s.name.clone(),
                config.vocabulary.display_name(&s.name),
                s.source_file.clone(),
                s.total_requests.to_string(),
                s.failed_requests.to_string(),
                format!("{:.2}", s.error_rate),
                format!("{:.2}", s.throughput),
                format!("{:.2}", s.duration_avg),
                format!("{:.2}", s.duration_min),
                format!("{:.2}", s.duration_max),
                format!("{:.2}", s.duration_p95),
                format!("{:.2}", s.duration_p99),
                s.malformed_records.to_string(),
                s.verdict(&config.verdict).label().to_string(),
            ])
            .map_err(csv_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Export(format!("CSV flush failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ReportError::Export(format!("CSV is not UTF-8: {e}")))
}

// ---------------------------------------------------------------------------
// HTML export
// ---------------------------------------------------------------------------

/// Bar-chart data embedded into the HTML report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ChartDataset {
    pub title: String,
    pub unit: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Average response time per test, labelled with display names.
pub fn response_time_dataset(summaries: &[TestSummary], config: &ReportConfig) -> ChartDataset {
    ChartDataset {
        title: "Average response time".to_string(),
        unit: "ms".to_string(),
        labels: summaries
            .iter()
            .map(|s| config.vocabulary.display_name(&s.name))
            .collect(),
        values: summaries.iter().map(|s| s.duration_avg).collect(),
    }
}

/// Export all summaries as a standalone HTML report with inline CSS.
///
/// The chart dataset is embedded as a JSON `<script>` block for any
/// front-end to pick up; the bars themselves are drawn with plain CSS.
pub fn export_html(
    summaries: &[TestSummary],
    config: &ReportConfig,
    generated_at: DateTime<Utc>,
) -> Result<String, ReportError> {
    let vocab = &config.vocabulary;
    let generated = generated_at.to_rfc3339_opts(SecondsFormat::Secs, true);

    let test_names = summaries
        .iter()
        .map(|s| html_escape(&s.name))
        .collect::<Vec<_>>()
        .join(", ");

    // --- per-test metric cards ---
    let sections: String = summaries
        .iter()
        .map(|s| {
            let error_class = match s.verdict(&config.verdict) {
                TestVerdict::Pass => "good",
                TestVerdict::Warn => "warn",
                TestVerdict::Fail => "bad",
            };
            format!(
                r#"<section class="test-section">
  <h2>{display}</h2>
  <div class="stats-grid">
    <div class="stat-card"><div class="label">Total Requests</div><div class="value">{total}</div></div>
    <div class="stat-card"><div class="label">Avg Response Time</div><div class="value">{avg:.2}<span class="unit">ms</span></div></div>
    <div class="stat-card {error_class}"><div class="label">Error Rate</div><div class="value">{error_rate:.2}<span class="unit">%</span></div></div>
    <div class="stat-card"><div class="label">Req/Sec</div><div class="value">{rps:.1}</div></div>
  </div>
</section>"#,
                display = html_escape(&vocab.display_name(&s.name)),
                total = s.total_requests,
                avg = s.duration_avg,
                error_class = error_class,
                error_rate = s.error_rate,
                rps = s.throughput,
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    // --- response-time comparison chart ---
    let chart = if summaries.len() < 2 {
        "<p class=\"note\">At least two tests are needed for a comparison chart.</p>".to_string()
    } else {
        let dataset = response_time_dataset(summaries, config);
        let max = dataset.values.iter().copied().fold(0.0_f64, f64::max);
        let bars: String = dataset
            .labels
            .iter()
            .zip(&dataset.values)
            .map(|(label, value)| {
                let width = if max > 0.0 { value / max * 100.0 } else { 0.0 };
                format!(
                    "<div class=\"bar-row\"><span class=\"bar-label\">{}</span>\
                     <span class=\"bar\" style=\"width: {:.1}%\"></span>\
                     <span class=\"bar-value\">{:.2} ms</span></div>",
                    html_escape(label),
                    width,
                    value
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        // `</` would end the script element early.
        let data_json = serde_json::to_string(&dataset)?.replace("</", "<\\/");
        format!(
            "<div class=\"chart\">\n{bars}\n</div>\n\
             <script type=\"application/json\" id=\"response-time-data\">{data_json}</script>"
        )
    };

    // --- detailed table ---
    let rows: String = summaries
        .iter()
        .map(|s| {
            let verdict = s.verdict(&config.verdict);
            let row_class = match verdict {
                TestVerdict::Pass => "ok",
                TestVerdict::Warn => "warn",
                TestVerdict::Fail => "err",
            };
            format!(
                "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{:.2}ms</td><td>{:.2}ms</td>\
                 <td>{:.2}%</td><td>{:.1}</td><td>{}</td></tr>",
                row_class,
                html_escape(&s.name),
                s.total_requests,
                s.duration_avg,
                s.duration_p95,
                s.error_rate,
                s.throughput,
                verdict.label(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<style>
  *, *::before, *::after {{ box-sizing: border-box; }}
  body {{
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    margin: 0; padding: 2rem;
    background: #0f172a; color: #e2e8f0;
    line-height: 1.5;
  }}
  h1 {{ font-size: 1.75rem; font-weight: 700; color: #f1f5f9; margin: 0 0 0.25rem; }}
  h2 {{ font-size: 1.125rem; font-weight: 600; color: #94a3b8;
        margin: 2rem 0 0.75rem; border-bottom: 1px solid #1e293b; padding-bottom: 0.5rem; }}
  .meta {{ color: #64748b; font-size: 0.875rem; margin-bottom: 2rem; }}
  .meta span {{ margin-right: 1.5rem; }}
  .stats-grid {{
    display: grid;
    grid-template-columns: repeat(auto-fill, minmax(180px, 1fr));
    gap: 1rem;
  }}
  .stat-card {{
    background: #1e293b; border: 1px solid #334155;
    border-radius: 0.5rem; padding: 1rem 1.25rem;
  }}
  .stat-card .label {{ font-size: 0.75rem; text-transform: uppercase; color: #64748b; }}
  .stat-card .value {{ font-size: 1.5rem; font-weight: 700; color: #f1f5f9; }}
  .stat-card .unit {{ font-size: 0.875rem; color: #94a3b8; margin-left: 0.2rem; }}
  .stat-card.good .value {{ color: #34d399; }}
  .stat-card.warn .value {{ color: #fbbf24; }}
  .stat-card.bad  .value {{ color: #f87171; }}
  .chart {{ background: #1e293b; border-radius: 0.5rem; padding: 1rem; }}
  .bar-row {{ display: flex; align-items: center; gap: 0.75rem; margin: 0.25rem 0; }}
  .bar-label {{ width: 10rem; color: #94a3b8; }}
  .bar {{ height: 1rem; background: #ff8c00; border-radius: 0.25rem; }}
  .bar-value {{ color: #ff8c00; font-size: 0.8125rem; }}
  .note {{ color: #64748b; }}
  table {{
    width: 100%; border-collapse: collapse; font-size: 0.8125rem;
    background: #1e293b; border-radius: 0.5rem; overflow: hidden;
  }}
  thead {{ background: #0f172a; }}
  th {{ padding: 0.625rem 0.875rem; text-align: left; color: #94a3b8; font-size: 0.75rem; }}
  td {{ padding: 0.5rem 0.875rem; border-top: 1px solid #334155; color: #cbd5e1; }}
  tr.ok td:last-child {{ color: #34d399; }}
  tr.warn td:last-child {{ color: #fbbf24; }}
  tr.err td:last-child {{ color: #f87171; }}
  footer {{
    margin-top: 3rem; padding-top: 1rem; border-top: 1px solid #1e293b;
    color: #475569; font-size: 0.8125rem;
  }}
</style>
</head>
<body>
<h1>{title}</h1>
<div class="meta">
  <span>Report ID: {report_id}</span>
  <span>Generated: {generated}</span>
  <span>Total Tests: {test_count}</span>
  <span>Test Types: {test_names}</span>
</div>

{sections}

<h2>Response Time Comparison</h2>
{chart}

<h2>Detailed Results</h2>
<table>
  <thead>
    <tr>
      <th>Test Name</th><th>Total Requests</th><th>Avg Response</th>
      <th>95th Percentile</th><th>Error Rate</th><th>Req/Sec</th><th>Status</th>
    </tr>
  </thead>
  <tbody>
{rows}
  </tbody>
</table>

<footer>Generated by k6report &bull; {generated}</footer>
</body>
</html>
"#,
        title = html_escape(&config.suite_title),
        report_id = Uuid::new_v4(),
        generated = generated,
        test_count = summaries.len(),
        test_names = test_names,
        sections = sections,
        chart = chart,
        rows = rows,
    ))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ---------------------------------------------------------------------------
// Chat summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFormat {
    Plain,
    Markdown,
}

/// Short per-test digest suitable for a chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSummary {
    pub text: String,
    pub passed: usize,
    pub failed: usize,
}

impl ChatSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Render a chat digest. A test passes only when its error rate is zero.
pub fn render_chat_summary(
    summaries: &[TestSummary],
    config: &ReportConfig,
    format: ChatFormat,
    generated_at: DateTime<Utc>,
) -> ChatSummary {
    let bold = |s: &str| match format {
        ChatFormat::Plain => s.to_string(),
        ChatFormat::Markdown => format!("*{s}*"),
    };

    let mut lines = Vec::new();
    lines.push(bold(&format!("📊 {}", config.suite_title)));
    if format == ChatFormat::Plain {
        lines.push("=".repeat(25));
    }
    lines.push(format!("📅 Date: {}", generated_at.format("%Y-%m-%d %H:%M:%S")));
    lines.push(format!("📋 Total tests: {}", summaries.len()));
    lines.push(String::new());
    lines.push(bold("🔹 TEST RESULTS:"));

    let mut passed = 0;
    let mut failed = 0;
    for s in summaries {
        let icon = if s.is_error_free() {
            passed += 1;
            "✅"
        } else {
            failed += 1;
            "❌"
        };
        let name = config.vocabulary.display_name(&s.name);
        let name = match format {
            ChatFormat::Plain => name,
            ChatFormat::Markdown => format!("`{name}`"),
        };
        lines.push(format!("  {icon} {name}:"));
        lines.push(format!("    Requests: {}", s.total_requests));
        lines.push(format!("    Errors: {}", s.failed_requests));
        lines.push(format!("    Error rate: {:.2}%", s.error_rate));
        if s.malformed_records > 0 {
            lines.push(format!("    Skipped records: {}", s.malformed_records));
        }
        lines.push(String::new());
    }

    lines.push("---".to_string());
    lines.push(format!("✅ Passed: {passed}"));
    lines.push(format!("❌ With errors: {failed}"));
    lines.push(String::new());
    if failed == 0 {
        lines.push(bold("✅ OVERALL STATUS: ALL TESTS PASSED"));
    } else {
        lines.push(bold(&format!("❌ OVERALL STATUS: {failed} TEST(S) WITH ERRORS")));
    }

    ChatSummary {
        text: lines.join("\n"),
        passed,
        failed,
    }
}

// ---------------------------------------------------------------------------
// Comparison digest
// ---------------------------------------------------------------------------

fn status_icon(status: ComparisonStatus) -> &'static str {
    match status {
        ComparisonStatus::Improved => "✅",
        ComparisonStatus::Degraded => "❌",
        ComparisonStatus::Stable => "➡️",
    }
}

/// Human-readable digest of a comparison document for terminal output.
pub fn render_comparison_text(doc: &ComparisonDocument) -> String {
    let mut out = String::new();
    match &doc.body {
        ComparisonBody::Baseline { baseline, results } => {
            out.push_str(&format!("Comparison with baseline '{baseline}':\n"));
            out.push_str(&"-".repeat(50));
            out.push('\n');
            for result in results {
                out.push_str(&format!("\n{}:\n", result.test_name));
                for m in &result.metrics_comparison {
                    out.push_str(&format!(
                        "  {}: {} {:.1}% ({:.2} → {:.2})\n",
                        m.metric_name,
                        status_icon(m.status),
                        m.change_percent,
                        m.baseline_value,
                        m.current_value
                    ));
                }
            }
        }
        ComparisonBody::CrossTest(ranking) => {
            let a = &ranking.analysis;
            out.push_str(&format!("Comparison across {} tests:\n", ranking.test_count));
            out.push_str(&"-".repeat(50));
            out.push('\n');
            out.push_str(&format!("Best response time:  {}\n", a.best_response_time));
            out.push_str(&format!("Worst response time: {}\n", a.worst_response_time));
            out.push_str(&format!("Best error rate:     {}\n", a.best_error_rate));
            out.push_str(&format!("Worst error rate:    {}\n", a.worst_error_rate));
            out.push_str(&format!("Best throughput:     {}\n", a.best_throughput));
            out.push_str(&format!("Worst throughput:    {}\n", a.worst_throughput));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::compare::Comparator;
    use crate::results::tests::make_summary;
    use chrono::TimeZone;

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    fn sample() -> Vec<TestSummary> {
        vec![
            make_summary("smoke", 10, 0.0, 110.0, 2.0),
            make_summary("load", 1000, 2.0, 250.0, 80.0),
            make_summary("stress", 5000, 7.5, 900.0, 40.0),
        ]
    }

    // -----------------------------------------------------------------------
    // CSV
    // -----------------------------------------------------------------------

    #[test]
    fn csv_has_header_and_one_row_per_test() {
        let csv = export_csv(&sample(), &ReportConfig::default()).expect("csv should export");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("test_name,display_name,source_file"));
        assert!(lines[1].starts_with("smoke,Smoke Test,smoke.json,10,0,0.00"));
        assert!(lines[3].ends_with("FAIL"));
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let summaries = vec![make_summary("a,b", 1, 0.0, 1.0, 1.0)];
        let csv = export_csv(&summaries, &ReportConfig::default()).expect("csv should export");
        assert!(csv.contains("\"a,b\""));
    }

    // -----------------------------------------------------------------------
    // HTML
    // -----------------------------------------------------------------------

    #[test]
    fn html_is_a_complete_document() {
        let html = export_html(&sample(), &ReportConfig::default(), generated_at())
            .expect("html should export");
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
        assert!(html.contains("k6 Load Test Report"));
        assert!(html.contains("2024-05-01T12:30:00Z"));
        assert!(html.contains("Report ID: "));
    }

    #[test]
    fn html_has_card_per_test_with_display_names() {
        let html = export_html(&sample(), &ReportConfig::default(), generated_at())
            .expect("html should export");
        assert_eq!(html.matches("class=\"test-section\"").count(), 3);
        assert!(html.contains("<h2>Smoke Test</h2>"));
        assert!(html.contains("<h2>Stress Test</h2>"));
    }

    #[test]
    fn html_embeds_chart_dataset() {
        let html = export_html(&sample(), &ReportConfig::default(), generated_at())
            .expect("html should export");
        assert!(html.contains("id=\"response-time-data\""));
        assert!(html.contains("\"labels\":[\"Smoke Test\",\"Load Test\",\"Stress Test\"]"));
    }

    #[test]
    fn html_single_test_has_no_chart() {
        let summaries = vec![make_summary("smoke", 10, 0.0, 110.0, 2.0)];
        let html = export_html(&summaries, &ReportConfig::default(), generated_at())
            .expect("html should export");
        assert!(html.contains("At least two tests are needed"));
        assert!(!html.contains("response-time-data"));
    }

    #[test]
    fn html_table_shows_verdicts() {
        let html = export_html(&sample(), &ReportConfig::default(), generated_at())
            .expect("html should export");
        assert!(html.contains("<td>PASS</td>"));
        assert!(html.contains("<td>WARN</td>"));
        assert!(html.contains("<td>FAIL</td>"));
    }

    #[test]
    fn html_escapes_test_names() {
        let summaries = vec![make_summary("<script>", 1, 0.0, 1.0, 1.0)];
        let html = export_html(&summaries, &ReportConfig::default(), generated_at())
            .expect("html should export");
        assert!(html.contains("&lt;SCRIPT&gt;"));
        assert!(!html.contains("<td><script></td>"));
    }

    #[test]
    fn response_time_dataset_follows_summary_order() {
        let dataset = response_time_dataset(&sample(), &ReportConfig::default());
        assert_eq!(dataset.values, vec![110.0, 250.0, 900.0]);
        assert_eq!(dataset.unit, "ms");
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    #[test]
    fn chat_counts_only_error_free_tests_as_passed() {
        let chat = render_chat_summary(
            &sample(),
            &ReportConfig::default(),
            ChatFormat::Plain,
            generated_at(),
        );
        assert_eq!(chat.passed, 1);
        assert_eq!(chat.failed, 2);
        assert!(!chat.all_passed());
        assert!(chat.text.contains("📅 Date: 2024-05-01 12:30:00"));
        assert!(chat.text.contains("OVERALL STATUS: 2 TEST(S) WITH ERRORS"));
        assert!(chat.text.contains("Error rate: 2.00%"));
    }

    #[test]
    fn chat_all_passed_status() {
        let summaries = vec![make_summary("smoke", 10, 0.0, 110.0, 2.0)];
        let chat = render_chat_summary(
            &summaries,
            &ReportConfig::default(),
            ChatFormat::Markdown,
            generated_at(),
        );
        assert!(chat.all_passed());
        assert!(chat.text.contains("*✅ OVERALL STATUS: ALL TESTS PASSED*"));
        assert!(chat.text.contains("`Smoke Test`"));
    }

    // -----------------------------------------------------------------------
    // Comparison digest
    // -----------------------------------------------------------------------

    #[test]
    fn comparison_text_lists_best_and_worst() {
        let ranking = Comparator::default()
            .rank(&sample())
            .expect("ranking should succeed");
        let doc = ComparisonDocument::new(ComparisonBody::CrossTest(ranking));
        let text = render_comparison_text(&doc);
        assert!(text.contains("Comparison across 3 tests"));
        assert!(text.contains("Best error rate:     smoke"));
        assert!(text.contains("Worst error rate:    stress"));
    }

    #[test]
    fn comparison_text_shows_baseline_changes() {
        let baseline = make_summary("baseline", 100, 0.0, 200.0, 50.0);
        let results = Comparator::default().compare_all_to_baseline(&sample()[..1], &baseline);
        let doc = ComparisonDocument::new(ComparisonBody::Baseline {
            baseline: "baseline".to_string(),
            results,
        });
        let text = render_comparison_text(&doc);
        assert!(text.contains("smoke:"));
        assert!(text.contains("response_time: ✅ -45.0% (200.00 → 110.00)"));
    }

    #[test]
    fn json_exports_are_pretty() {
        let ranking = Comparator::default()
            .rank(&sample())
            .expect("ranking should succeed");
        let doc = ComparisonDocument::new(ComparisonBody::CrossTest(ranking));
        let json = export_comparison_json(&doc).expect("json should export");
        assert!(json.contains('\n'));
        assert!(json.contains("\"comparison_type\": \"cross_test\""));
    }
}
