mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "k6report",
    version,
    about = "Summarize, compare and export k6 load-test results"
)]
pub struct Cli {
    /// JSON configuration file (vocabulary, metric names, thresholds)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory the generated reports are written to
    #[arg(long, short, global = true, default_value = ".")]
    output: PathBuf,

    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Write a JSON suite summary of every result file
    Summary {
        /// Directory holding k6 result files
        results_dir: PathBuf,
    },
    /// Compare against a baseline file, or rank tests against each other
    Compare {
        /// Directory holding k6 result files
        results_dir: PathBuf,
        /// Baseline result file; cross-test ranking is used when omitted or missing
        baseline: Option<PathBuf>,
    },
    /// Write a standalone HTML report
    Html {
        /// Directory holding k6 result files
        results_dir: PathBuf,
    },
    /// Write one CSV row per test
    Csv {
        /// Directory holding k6 result files
        results_dir: PathBuf,
    },
    /// Print a short summary for pasting into chat
    Chat {
        /// Directory holding k6 result files
        results_dir: PathBuf,
        /// Use Markdown emphasis
        #[arg(long)]
        markdown: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match commands::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_summary_with_defaults() {
        let cli = Cli::try_parse_from(["k6report", "summary", "results"]).expect("args should parse");
        assert_eq!(cli.output, PathBuf::from("."));
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
        assert_eq!(
            cli.command,
            Command::Summary {
                results_dir: PathBuf::from("results")
            }
        );
    }

    #[test]
    fn parses_compare_with_optional_baseline() {
        let cli = Cli::try_parse_from(["k6report", "compare", "results", "baseline.json"])
            .expect("args should parse");
        assert_eq!(
            cli.command,
            Command::Compare {
                results_dir: PathBuf::from("results"),
                baseline: Some(PathBuf::from("baseline.json")),
            }
        );

        let cli = Cli::try_parse_from(["k6report", "compare", "results"]).expect("args should parse");
        assert!(matches!(cli.command, Command::Compare { baseline: None, .. }));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "k6report",
            "html",
            "results",
            "--output",
            "reports",
            "--config",
            "k6report.json",
            "-v",
        ])
        .expect("args should parse");
        assert_eq!(cli.output, PathBuf::from("reports"));
        assert_eq!(cli.config, Some(PathBuf::from("k6report.json")));
        assert!(cli.verbose);
    }

    #[test]
    fn parses_chat_markdown_flag() {
        let cli = Cli::try_parse_from(["k6report", "chat", "results", "--markdown"])
            .expect("args should parse");
        assert!(matches!(cli.command, Command::Chat { markdown: true, .. }));
    }

    #[test]
    fn missing_results_dir_is_rejected() {
        assert!(Cli::try_parse_from(["k6report", "csv"]).is_err());
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["k6report", "upload", "results"]).is_err());
    }
}
