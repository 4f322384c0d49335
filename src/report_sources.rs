//! Sources of position reports for batch ingestion.
//!
//! A [`ReportSource`] yields reports one at a time; [`replay`] drains one into a
//! [`LiveFlightTracker`]. The file source reads newline-delimited JSON, one
//! report per line:
//!
//! ```text
//! {"user_id":"u1","callsign":"BAW1","aircraft_type":"A388","current_latitude":51.4,"current_longitude":-0.4,"reported_at":"2025-01-15T12:00:00Z"}
//! {"user_id":"u1","callsign":"BAW1","current_latitude":51.5,"current_longitude":-0.6,"reported_at":"2025-01-15T12:00:30Z"}
//! ```
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::live_tracker::{LiveFlightTracker, PositionReport, UpsertOutcome};

/// One item from a source: a parsed report, or a line that couldn't be parsed
#[derive(Debug)]
pub enum SourcedReport {
    Report(PositionReport),
    Malformed { line: usize, error: String },
}

/// Trait for sources of position reports
#[async_trait]
pub trait ReportSource: Send {
    /// Get the next report from the source
    ///
    /// Returns:
    /// - `Ok(Some(report))` - Next report available
    /// - `Ok(None)` - End of stream
    /// - `Err(e)` - Error reading the underlying source
    async fn next_report(&mut self) -> Result<Option<SourcedReport>>;
}

/// Reads newline-delimited JSON reports from a file
pub struct JsonLinesReportSource {
    reader: BufReader<File>,
    line_buffer: String,
    lines_read: usize,
}

impl JsonLinesReportSource {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).await?;
        debug!("Opened report source from: {:?}", path.as_ref());

        Ok(Self {
            reader: BufReader::new(file),
            line_buffer: String::new(),
            lines_read: 0,
        })
    }

    pub fn lines_read(&self) -> usize {
        self.lines_read
    }
}

#[async_trait]
impl ReportSource for JsonLinesReportSource {
    async fn next_report(&mut self) -> Result<Option<SourcedReport>> {
        loop {
            self.line_buffer.clear();
            let bytes_read = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes_read == 0 {
                debug!("Reached end of report file after {} lines", self.lines_read);
                return Ok(None);
            }
            self.lines_read += 1;

            let line = self.line_buffer.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            return Ok(Some(match serde_json::from_str::<PositionReport>(line) {
                Ok(report) => SourcedReport::Report(report),
                Err(e) => SourcedReport::Malformed {
                    line: self.lines_read,
                    error: e.to_string(),
                },
            }));
        }
    }
}

/// Reports held in memory, yielded in order
pub struct VecReportSource {
    reports: std::vec::IntoIter<PositionReport>,
}

impl VecReportSource {
    pub fn new(reports: Vec<PositionReport>) -> Self {
        Self {
            reports: reports.into_iter(),
        }
    }
}

#[async_trait]
impl ReportSource for VecReportSource {
    async fn next_report(&mut self) -> Result<Option<SourcedReport>> {
        Ok(self.reports.next().map(SourcedReport::Report))
    }
}

/// Tally of a replay run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub inserted: usize,
    pub updated: usize,
    pub terminated: usize,
    pub restarted: usize,
    pub superseded: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub malformed: usize,
}

impl ReplaySummary {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Terminated => self.terminated += 1,
            UpsertOutcome::Restarted => self.restarted += 1,
            UpsertOutcome::Superseded => self.superseded += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted
            + self.updated
            + self.terminated
            + self.restarted
            + self.superseded
            + self.unchanged
            + self.rejected
            + self.malformed
    }
}

/// Ingest every report from `source` in order. Bad reports are counted, not fatal.
pub async fn replay(
    tracker: &LiveFlightTracker,
    source: &mut dyn ReportSource,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    while let Some(item) = source.next_report().await? {
        match item {
            SourcedReport::Report(report) => match tracker.ingest(&report).await {
                Ok(receipt) => summary.record(receipt.outcome),
                Err(_) => summary.rejected += 1,
            },
            SourcedReport::Malformed { line, error } => {
                warn!("Skipping malformed report on line {}: {}", line, error);
                summary.malformed += 1;
            }
        }
    }

    info!(
        "Replayed {} reports: {} inserted, {} updated, {} superseded, {} rejected, {} malformed",
        summary.total(),
        summary.inserted,
        summary.updated,
        summary.superseded,
        summary.rejected,
        summary.malformed
    );
    Ok(summary)
}
