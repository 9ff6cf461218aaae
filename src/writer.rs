//! Chunk writer: splits a record stream into sorted runs.

use std::io;
use std::path::{Path, PathBuf};

use log;

use crate::buffer::{ConfigError, LimitedBuffer};
use crate::chunk::Run;
use crate::record::LogRecord;

/// Buffers records and persists them as sorted runs once the buffer fills up.
///
/// Every record added ends up in exactly one run. Runs are numbered in creation order.
pub struct ChunkWriter {
    buffer: LimitedBuffer<LogRecord>,
    dir: PathBuf,
    rw_buf_size: Option<usize>,
    runs: Vec<Run>,
}

impl ChunkWriter {
    /// Creates a new chunk writer.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of records per run, must be positive
    /// * `dir` - Directory run files are created in
    /// * `rw_buf_size` - Run file write buffer size
    pub fn new(capacity: usize, dir: &Path, rw_buf_size: Option<usize>) -> Result<Self, ConfigError> {
        return Ok(ChunkWriter {
            buffer: LimitedBuffer::new(capacity)?,
            dir: dir.to_path_buf(),
            rw_buf_size,
            runs: Vec::new(),
        });
    }

    /// Adds a record, flushing the buffer into a new run when it reaches capacity.
    pub fn add_record(&mut self, record: LogRecord) -> io::Result<()> {
        self.buffer.push(record);

        if self.buffer.is_full() {
            self.flush()?;
        }

        return Ok(());
    }

    /// Sorts buffered records and persists them as a new run. Does nothing if the buffer is empty.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let id = self.runs.len();

        log::debug!("sorting run {} ({} records) ...", id, self.buffer.len());
        self.buffer.sort_by(LogRecord::cmp_key);

        log::debug!("saving run {}", id);
        let run = Run::build(&self.dir, id, self.buffer.drain(), self.rw_buf_size)?;
        self.runs.push(run);

        return Ok(());
    }

    /// Returns the number of runs created so far.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Returns the number of records waiting in the buffer.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Flushes the remaining records and returns all runs in creation order.
    pub fn close(mut self) -> io::Result<Vec<Run>> {
        self.flush()?;

        log::debug!("chunk writer closed ({} runs)", self.runs.len());

        return Ok(self.runs);
    }
}
