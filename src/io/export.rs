//! CSV export of driver iterations.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::CycleRecord;

/// Column header for the cycle log.
const HEADER: &str = "iteration,timestamp,switch_cycle,switched,active,\
                       shutdowns,delivered,failed,skipped";

/// Streaming CSV log with one row per driver iteration.
///
/// Rows are flushed as they are written, so a log of an interrupted
/// real-time run is complete up to the last iteration.
pub struct CycleLog {
    wtr: csv::Writer<Box<dyn Write + Send>>,
}

impl CycleLog {
    /// Creates (or truncates) a log file at `path` and writes the header.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if file creation or writing fails.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Self::new(Box::new(io::BufWriter::new(file)))
    }

    /// Starts a log on any writer and writes the header.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if writing the header fails.
    pub fn new(writer: Box<dyn Write + Send>) -> io::Result<Self> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);
        wtr.write_record(HEADER.split(',').map(str::trim))?;
        wtr.flush()?;
        Ok(Self { wtr })
    }

    /// Appends one iteration.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if writing fails.
    pub fn append(&mut self, r: &CycleRecord) -> io::Result<()> {
        self.wtr.write_record(&[
            r.iteration.to_string(),
            r.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            r.switch_cycle.map(|c| c.to_string()).unwrap_or_default(),
            r.switched.to_string(),
            r.active.to_string(),
            r.shutdowns.to_string(),
            r.delivered.to_string(),
            r.failed.to_string(),
            r.skipped.to_string(),
        ])?;
        self.wtr.flush()?;
        Ok(())
    }
}
