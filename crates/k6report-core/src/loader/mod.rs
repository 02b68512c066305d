//! Discovery and parsing of result files.
//!
//! Two shapes are accepted: newline-delimited JSON streams (`k6 run --out
//! json=...`) and whole-file summary documents. The shape is decided once per
//! file; malformed lines are skipped and counted rather than failing the file.

pub mod naming;
pub mod record;
pub mod timestamp;

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use crate::config::ReportConfig;
use crate::error::ReportError;

pub use naming::{test_name_from_file_name, test_name_from_path};
pub use record::{MetricEvent, SummaryBlock, TimeSpan};
pub use timestamp::parse_timestamp;

use record::{StreamRecord, SummaryDocument};

/// Longest prefix of a malformed line that is logged.
const LOG_PREVIEW_LEN: usize = 200;

// ---------------------------------------------------------------------------
// MalformedLog
// ---------------------------------------------------------------------------

/// Accumulates records that could not be parsed.
///
/// Every failure is counted; only the first `sample_limit` are kept as
/// [`ReportError::MalformedRecord`] samples.
#[derive(Debug)]
pub struct MalformedLog {
    count: u64,
    samples: Vec<ReportError>,
    sample_limit: usize,
}

impl MalformedLog {
    pub fn new(sample_limit: usize) -> Self {
        Self {
            count: 0,
            samples: Vec::new(),
            sample_limit,
        }
    }

    pub fn record(&mut self, line: usize, reason: impl Into<String>) {
        self.count += 1;
        if self.samples.len() < self.sample_limit {
            self.samples.push(ReportError::MalformedRecord {
                line,
                reason: reason.into(),
            });
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn samples(&self) -> &[ReportError] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// ---------------------------------------------------------------------------
// LoadedFile
// ---------------------------------------------------------------------------

/// What a result file contained, resolved once at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultContent {
    /// Observations of the aggregated metrics from a streamed file, in file
    /// order.
    Points(Vec<MetricEvent>),
    /// Pre-aggregated values from a summary document.
    SummaryBlock(SummaryBlock),
}

/// One parsed result file.
#[derive(Debug)]
pub struct LoadedFile {
    /// Test name derived from the file name.
    pub name: String,
    pub path: PathBuf,
    pub content: ResultContent,
    /// Earliest and latest valid point of any metric. `None` for summary
    /// documents and files without points.
    pub time_span: Option<TimeSpan>,
    pub malformed: MalformedLog,
}

impl LoadedFile {
    /// Number of point events ingested (zero for summary documents).
    pub fn event_count(&self) -> usize {
        match &self.content {
            ResultContent::Points(events) => events.len(),
            ResultContent::SummaryBlock(_) => 0,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// ResultLoader
// ---------------------------------------------------------------------------

pub struct ResultLoader<'a> {
    config: &'a ReportConfig,
}

impl<'a> ResultLoader<'a> {
    pub fn new(config: &'a ReportConfig) -> Self {
        Self { config }
    }

    /// List the `*.json` files directly inside `dir`, sorted by file name.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ReportError::FileUnreadable {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable directory entry in {}: {e}", dir.display());
                    continue;
                }
            };
            let path = entry.path();
            let is_json = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if is_json && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        tracing::debug!("Discovered {} result files in {}", files.len(), dir.display());
        Ok(files)
    }

    /// Parse one result file.
    ///
    /// Fails only when the file cannot be opened or read; unparseable records
    /// are collected in [`LoadedFile::malformed`].
    pub fn load_file(&self, path: &Path) -> Result<LoadedFile, ReportError> {
        let unreadable = |source: std::io::Error| ReportError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(unreadable)?;
        let mut reader = BufReader::new(file);
        let mut stream = StreamState::new(self.config.malformed_sample_limit);

        // Find the first non-blank line; it decides the file's shape.
        let mut first = Vec::new();
        let mut line_no = 0usize;
        loop {
            first.clear();
            if reader.read_until(b'\n', &mut first).map_err(unreadable)? == 0 {
                break;
            }
            line_no += 1;
            if !is_blank(&first) {
                break;
            }
        }

        let content = if is_blank(&first) {
            ResultContent::Points(Vec::new())
        } else {
            match serde_json::from_slice::<StreamRecord>(&first) {
                Ok(record) => {
                    self.ingest(path, record, line_no, &mut stream);
                    self.ingest_lines(path, &mut reader, line_no, &mut stream)
                        .map_err(unreadable)?;
                    ResultContent::Points(std::mem::take(&mut stream.events))
                }
                Err(first_err) => {
                    let mut whole = first.clone();
                    reader.read_to_end(&mut whole).map_err(unreadable)?;

                    match serde_json::from_slice::<SummaryDocument>(&whole) {
                        Ok(doc) => ResultContent::SummaryBlock(SummaryBlock::from_document(
                            &doc,
                            &self.config.metrics,
                        )),
                        Err(_) => {
                            skip_record(
                                path,
                                line_no,
                                &first,
                                &first_err.to_string(),
                                &mut stream.malformed,
                            );
                            let mut rest = Cursor::new(&whole[first.len()..]);
                            self.ingest_lines(path, &mut rest, line_no, &mut stream)
                                .map_err(unreadable)?;
                            ResultContent::Points(std::mem::take(&mut stream.events))
                        }
                    }
                }
            }
        };

        let loaded = LoadedFile {
            name: naming::test_name_from_path(path, &self.config.vocabulary),
            path: path.to_path_buf(),
            content,
            time_span: stream.span,
            malformed: stream.malformed,
        };
        tracing::info!(
            "Loaded {} as '{}': {} events ingested, {} points of other metrics dropped, {} malformed records skipped",
            path.display(),
            loaded.name,
            loaded.event_count(),
            stream.untracked,
            loaded.malformed.count()
        );
        Ok(loaded)
    }

    /// Parse every remaining line of a stream. `line_no` is the number of
    /// lines already consumed.
    fn ingest_lines<R: BufRead>(
        &self,
        path: &Path,
        reader: &mut R,
        mut line_no: usize,
        stream: &mut StreamState,
    ) -> std::io::Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(());
            }
            line_no += 1;
            if is_blank(&buf) {
                continue;
            }
            match serde_json::from_slice::<StreamRecord>(&buf) {
                Ok(record) => self.ingest(path, record, line_no, stream),
                Err(e) => skip_record(path, line_no, &buf, &e.to_string(), &mut stream.malformed),
            }
        }
    }

    /// Keep a point as an event only when its metric is folded by the
    /// aggregator. Every valid point still widens the file's time span.
    fn ingest(&self, path: &Path, record: StreamRecord, line_no: usize, stream: &mut StreamState) {
        let StreamRecord::Point(point) = record else {
            return;
        };
        let timestamp = match parse_timestamp(&point.data.time) {
            Ok(timestamp) => timestamp,
            Err(e) => {
                tracing::warn!("Skipping point in {} at line {line_no}: {e}", path.display());
                stream.malformed.record(line_no, e.to_string());
                return;
            }
        };

        match &mut stream.span {
            Some(span) => span.include(timestamp),
            None => stream.span = Some(TimeSpan::at(timestamp)),
        }

        if self.config.metrics.tracks(&point.metric) {
            stream.events.push(MetricEvent {
                metric_name: point.metric,
                value: point.data.value.as_f64(),
                timestamp,
            });
        } else {
            stream.untracked += 1;
        }
    }
}

/// Accumulators for one streamed file.
struct StreamState {
    events: Vec<MetricEvent>,
    span: Option<TimeSpan>,
    untracked: u64,
    malformed: MalformedLog,
}

impl StreamState {
    fn new(sample_limit: usize) -> Self {
        Self {
            events: Vec::new(),
            span: None,
            untracked: 0,
            malformed: MalformedLog::new(sample_limit),
        }
    }
}

fn skip_record(path: &Path, line_no: usize, raw: &[u8], reason: &str, malformed: &mut MalformedLog) {
    tracing::warn!(
        "Skipping malformed JSON in {} at line {line_no}: {}... {reason}",
        path.display(),
        preview(raw)
    );
    malformed.record(line_no, reason);
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn preview(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line);
    text.trim_end().chars().take(LOG_PREVIEW_LEN).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
