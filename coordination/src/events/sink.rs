//! Append-only event sinks.
//!
//! Both subsystems write their records synchronously, at the exact point
//! the state transition happens. Appends are never buffered across events
//! or reordered: downstream consumers rely on log order to reconstruct
//! leadership episodes and flood waves.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use super::types::{AlertRecord, ClusterRecord};

/// Error type for sink operations.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to write event log: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Durable, append-only destination for the two record streams.
pub trait EventSink {
    /// Append one cluster record.
    fn cluster_event(&mut self, record: &ClusterRecord) -> SinkResult<()>;

    /// Append one alert record.
    fn alert_event(&mut self, record: &AlertRecord) -> SinkResult<()>;

    /// Push buffered bytes to the underlying medium. Called once per tick.
    fn flush(&mut self) -> SinkResult<()> {
        Ok(())
    }
}

/// CSV sink writing the two streams to separate files.
///
/// Each file gets its header row at creation. Rows are appended through a
/// `BufWriter`; `flush` forces them out at tick boundaries.
pub struct CsvLogSink {
    cluster_log: BufWriter<File>,
    alert_log: BufWriter<File>,
}

impl CsvLogSink {
    /// Create both log files (truncating any previous run) and write the
    /// header rows.
    pub fn create(cluster_path: &Path, alert_path: &Path) -> SinkResult<Self> {
        let mut cluster_log = BufWriter::new(File::create(cluster_path)?);
        writeln!(cluster_log, "{}", ClusterRecord::CSV_HEADER)?;
        let mut alert_log = BufWriter::new(File::create(alert_path)?);
        writeln!(alert_log, "{}", AlertRecord::CSV_HEADER)?;
        Ok(Self {
            cluster_log,
            alert_log,
        })
    }

    /// Reopen existing logs for appending, without rewriting headers.
    pub fn append(cluster_path: &Path, alert_path: &Path) -> SinkResult<Self> {
        let open = |p: &Path| OpenOptions::new().append(true).create(true).open(p);
        Ok(Self {
            cluster_log: BufWriter::new(open(cluster_path)?),
            alert_log: BufWriter::new(open(alert_path)?),
        })
    }
}

impl EventSink for CsvLogSink {
    fn cluster_event(&mut self, record: &ClusterRecord) -> SinkResult<()> {
        writeln!(self.cluster_log, "{}", record.to_csv_row())?;
        debug!(kind = %record.kind, vehicle = %record.vehicle_id, "cluster event appended");
        Ok(())
    }

    fn alert_event(&mut self, record: &AlertRecord) -> SinkResult<()> {
        writeln!(self.alert_log, "{}", record.to_csv_row())?;
        debug!(action = %record.action, source = %record.source_id, "alert event appended");
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        self.cluster_log.flush()?;
        self.alert_log.flush()?;
        Ok(())
    }
}

/// In-memory sink for tests and status reporting.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub cluster_records: Vec<ClusterRecord>,
    pub alert_records: Vec<AlertRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for MemorySink {
    fn cluster_event(&mut self, record: &ClusterRecord) -> SinkResult<()> {
        self.cluster_records.push(record.clone());
        Ok(())
    }

    fn alert_event(&mut self, record: &AlertRecord) -> SinkResult<()> {
        self.alert_records.push(record.clone());
        Ok(())
    }
}
