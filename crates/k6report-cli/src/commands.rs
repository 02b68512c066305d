use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use k6report_core::results::compare::{Comparator, ComparisonBody, ComparisonDocument};
use k6report_core::results::export::{self, ChatFormat};
use k6report_core::results::{summarize_directory, summarize_file, BatchOutcome, SuiteReport};
use k6report_core::{load_config, ReportConfig};

use crate::{Cli, Command};

const SUMMARY_JSON: &str = "summary_report.json";
const SUMMARY_CSV: &str = "summary_report.csv";
const HTML_REPORT: &str = "k6-load-test-report.html";

pub fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ReportConfig::default(),
    };

    match &cli.command {
        Command::Summary { results_dir } => summary(results_dir, &cli.output, &config),
        Command::Compare {
            results_dir,
            baseline,
        } => compare(results_dir, baseline.as_deref(), &cli.output, &config),
        Command::Html { results_dir } => html(results_dir, &cli.output, &config),
        Command::Csv { results_dir } => csv(results_dir, &cli.output, &config),
        Command::Chat {
            results_dir,
            markdown,
        } => chat(results_dir, *markdown, &config),
    }
}

fn load_batch(results_dir: &Path, config: &ReportConfig) -> Result<BatchOutcome> {
    let batch = summarize_directory(results_dir, config)
        .with_context(|| format!("failed to summarize {}", results_dir.display()))?;
    if !batch.skipped.is_empty() {
        tracing::warn!("{} result file(s) could not be read", batch.skipped.len());
    }
    if batch.malformed_records() > 0 {
        tracing::warn!(
            "{} malformed record(s) skipped across all files",
            batch.malformed_records()
        );
    }
    Ok(batch)
}

fn write_report(output_dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let path = output_dir.join(file_name);
    std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!("Wrote {}", path.display());
    Ok(path)
}

fn summary(results_dir: &Path, output_dir: &Path, config: &ReportConfig) -> Result<()> {
    let batch = load_batch(results_dir, config)?;
    let report = SuiteReport::from_batch(batch, config);
    let json = export::export_suite_json(&report).context("failed to serialize suite report")?;
    let path = write_report(output_dir, SUMMARY_JSON, &json)?;

    println!("Summary of {} test(s) written to {}", report.results.len(), path.display());
    for entry in &report.results {
        println!(
            "  {:<20} {:>8} requests  {:>6.2}% errors  {}",
            entry.display_name, entry.summary.total_requests, entry.summary.error_rate, entry.verdict
        );
    }
    Ok(())
}

fn compare(
    results_dir: &Path,
    baseline: Option<&Path>,
    output_dir: &Path,
    config: &ReportConfig,
) -> Result<()> {
    let batch = load_batch(results_dir, config)?;
    let comparator = Comparator::from_config(config);
    let stamp = Local::now().format("%Y%m%d-%H%M%S");

    let baseline = match baseline {
        Some(path) if path.exists() => Some(path),
        Some(path) => {
            tracing::warn!(
                "Baseline {} does not exist; comparing tests against each other",
                path.display()
            );
            None
        }
        None => None,
    };

    let (doc, file_name) = match baseline {
        Some(path) => {
            let baseline = summarize_file(path, config)
                .with_context(|| format!("failed to summarize baseline {}", path.display()))?;
            let results = comparator.compare_all_to_baseline(&batch.summaries, &baseline);
            let body = ComparisonBody::Baseline {
                baseline: baseline.name,
                results,
            };
            (ComparisonDocument::new(body), format!("baseline-comparison-{stamp}.json"))
        }
        None => {
            let ranking = comparator
                .rank(&batch.summaries)
                .context("cross-test comparison needs more results")?;
            (
                ComparisonDocument::new(ComparisonBody::CrossTest(ranking)),
                format!("cross-test-comparison-{stamp}.json"),
            )
        }
    };

    let json = export::export_comparison_json(&doc).context("failed to serialize comparison")?;
    let path = write_report(output_dir, &file_name, &json)?;

    print!("{}", export::render_comparison_text(&doc));
    println!("\nComparison written to {}", path.display());
    Ok(())
}

fn html(results_dir: &Path, output_dir: &Path, config: &ReportConfig) -> Result<()> {
    let batch = load_batch(results_dir, config)?;
    let html = export::export_html(&batch.summaries, config, Utc::now())
        .context("failed to render HTML report")?;
    let path = write_report(output_dir, HTML_REPORT, &html)?;
    println!("HTML report written to {}", path.display());
    Ok(())
}

fn csv(results_dir: &Path, output_dir: &Path, config: &ReportConfig) -> Result<()> {
    let batch = load_batch(results_dir, config)?;
    let csv = export::export_csv(&batch.summaries, config).context("failed to render CSV")?;
    let path = write_report(output_dir, SUMMARY_CSV, &csv)?;
    println!("CSV report written to {}", path.display());
    Ok(())
}

fn chat(results_dir: &Path, markdown: bool, config: &ReportConfig) -> Result<()> {
    let batch = load_batch(results_dir, config)?;
    let format = if markdown {
        ChatFormat::Markdown
    } else {
        ChatFormat::Plain
    };
    let chat = export::render_chat_summary(&batch.summaries, config, format, Utc::now());
    println!("{}", chat.text);
    Ok(())
}
