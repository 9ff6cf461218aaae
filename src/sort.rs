//! External log sorter.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::Path;

use crate::buffer::ConfigError;
use crate::chunk::{Run, RunError};
use crate::merger::RunMerger;
use crate::record::{LogRecord, ParseError};
use crate::writer::ChunkWriter;
use crate::LINE_SEPARATOR;

/// Default number of records kept in memory per run.
pub const DEFAULT_CHUNK_CAPACITY: usize = 1_000_000;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Invalid sorter configuration.
    Config(ConfigError),
    /// Temporary directory creation error.
    TempDir(io::Error),
    /// Run file I/O error.
    IO(io::Error),
    /// A run file could not be read back.
    CorruptedRun { run: usize, source: ParseError },
    /// Input data stream error.
    InputError(io::Error),
    /// Output data stream error.
    OutputError(io::Error),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(match &self {
            SortError::Config(err) => err,
            SortError::TempDir(err) => err,
            SortError::IO(err) => err,
            SortError::CorruptedRun { source, .. } => source,
            SortError::InputError(err) => err,
            SortError::OutputError(err) => err,
        })
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::Config(err) => write!(f, "invalid configuration: {}", err),
            SortError::TempDir(err) => write!(f, "temporary directory not created: {}", err),
            SortError::IO(err) => write!(f, "run I/O operation failed: {}", err),
            SortError::CorruptedRun { run, source } => write!(f, "run {} is corrupted: {}", run, source),
            SortError::InputError(err) => write!(f, "input data stream error: {}", err),
            SortError::OutputError(err) => write!(f, "output data stream error: {}", err),
        }
    }
}

impl From<ConfigError> for SortError {
    fn from(err: ConfigError) -> Self {
        SortError::Config(err)
    }
}

impl From<RunError> for SortError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::IO(err) => SortError::IO(err),
            RunError::Corrupted { run, source } => SortError::CorruptedRun { run, source },
        }
    }
}

/// Sorting job phase, tracked for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortPhase {
    Ingesting,
    Merging,
    Done,
    Failed,
}

impl Display for SortPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortPhase::Ingesting => "ingesting",
            SortPhase::Merging => "merging",
            SortPhase::Done => "done",
            SortPhase::Failed => "failed",
        })
    }
}

/// Summary of a completed sort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Number of input lines read.
    pub lines_read: usize,
    /// Number of records written to the output.
    pub records_sorted: usize,
    /// Number of malformed input lines skipped.
    pub lines_skipped: usize,
    /// Number of sorted runs the input was split into.
    pub runs_created: usize,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder {
    /// Maximum number of records per run.
    chunk_capacity: usize,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, ConfigError> {
        ExternalSorter::new(self.chunk_capacity, self.tmp_dir.as_deref(), self.rw_buf_size)
    }

    /// Sets the maximum number of records kept in memory before a run is written.
    ///
    /// Memory usage grows with the capacity, while the number of runs (and so the number of files held open
    /// during the merge) shrinks with it. The capacity should be chosen so that
    /// `input records / capacity` stays well below the process file descriptor limit.
    pub fn with_chunk_capacity(mut self, chunk_capacity: usize) -> ExternalSorterBuilder {
        self.chunk_capacity = chunk_capacity;
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets run file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.rw_buf_size = Some(buf_size);
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            tmp_dir: None,
            rw_buf_size: None,
        }
    }
}

/// External log sorter.
///
/// Splits the input into sorted runs of at most `chunk_capacity` records, then merges the runs into the output.
/// Lines that cannot be parsed are logged and skipped.
pub struct ExternalSorter {
    /// Maximum number of records per run.
    chunk_capacity: usize,
    /// Directory to be used to store temporary data.
    tmp_path: Option<Box<Path>>,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `chunk_capacity` - Maximum number of records per run, must be positive.
    /// * `tmp_path` - Directory to be used to store temporary data. If parameter is [`None`] default OS temporary
    ///   directory will be used.
    /// * `rw_buf_size` - Run file read/write buffer size.
    pub fn new(
        chunk_capacity: usize,
        tmp_path: Option<&Path>,
        rw_buf_size: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if chunk_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        return Ok(ExternalSorter {
            chunk_capacity,
            tmp_path: tmp_path.map(Into::into),
            rw_buf_size,
        });
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    fn init_tmp_directory(&self) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = if let Some(tmp_path) = &self.tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(|err| SortError::TempDir(err))?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Sorts the log file at `input` into a new file at `output`.
    pub fn sort_files(&self, input: &Path, output: &Path) -> Result<SortStats, SortError> {
        let input = fs::File::open(input).map_err(|err| SortError::InputError(err))?;
        let output = fs::File::create(output).map_err(|err| SortError::OutputError(err))?;

        let (input, output) = match self.rw_buf_size {
            Some(buf_size) => (
                io::BufReader::with_capacity(buf_size, input),
                io::BufWriter::with_capacity(buf_size, output),
            ),
            None => (io::BufReader::new(input), io::BufWriter::new(output)),
        };

        self.sort(input, output)
    }

    /// Sorts log lines read from the input and writes them to the output.
    ///
    /// Lines are written verbatim, separated by [`LINE_SEPARATOR`], without a separator after the last line.
    /// Temporary run files are removed before the method returns, whether the sort succeeded or not.
    ///
    /// # Arguments
    /// * `input` - Input stream lines to be fetched from
    /// * `output` - Output stream sorted lines to be written to
    pub fn sort<R, W>(&self, input: R, output: W) -> Result<SortStats, SortError>
    where
        R: BufRead,
        W: Write,
    {
        let tmp_dir = self.init_tmp_directory()?;
        let mut stats = SortStats::default();
        let mut phase = SortPhase::Ingesting;

        let runs = match self.ingest(input, tmp_dir.path(), &mut stats) {
            Ok(runs) => runs,
            Err(err) => return Err(Self::fail(&mut phase, err)),
        };
        Self::transition(&mut phase, SortPhase::Merging);

        if let Err(err) = self.merge(runs, output, &mut stats) {
            return Err(Self::fail(&mut phase, err));
        }
        Self::transition(&mut phase, SortPhase::Done);

        log::info!(
            "sorted {} records ({} lines read, {} skipped, {} runs)",
            stats.records_sorted,
            stats.lines_read,
            stats.lines_skipped,
            stats.runs_created
        );

        return Ok(stats);
    }

    fn ingest<R: BufRead>(&self, mut input: R, dir: &Path, stats: &mut SortStats) -> Result<Vec<Run>, SortError> {
        let mut chunk_writer = ChunkWriter::new(self.chunk_capacity, dir, self.rw_buf_size)?;

        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = input
                .read_until(b'\n', &mut buf)
                .map_err(|err| SortError::InputError(err))?;
            if read == 0 {
                break;
            }
            stats.lines_read += 1;

            let line = match String::from_utf8(trim_line_ending(&buf).to_vec()) {
                Ok(line) => line,
                Err(err) => {
                    log::warn!(
                        "skipping line {} due to invalid UTF-8 ({}): {}",
                        stats.lines_read,
                        err.utf8_error(),
                        String::from_utf8_lossy(err.as_bytes())
                    );
                    stats.lines_skipped += 1;
                    continue;
                }
            };

            match LogRecord::parse(line.as_str()) {
                Ok(record) => chunk_writer.add_record(record).map_err(|err| SortError::IO(err))?,
                Err(err) => {
                    log::warn!("skipping line {} due to parse error ({}): {}", stats.lines_read, err, line);
                    stats.lines_skipped += 1;
                }
            }
        }

        let runs = chunk_writer.close().map_err(|err| SortError::IO(err))?;
        stats.runs_created = runs.len();

        log::debug!("external sort preparation done");

        return Ok(runs);
    }

    fn merge<W: Write>(&self, runs: Vec<Run>, mut output: W, stats: &mut SortStats) -> Result<(), SortError> {
        let mut merger = RunMerger::new(runs)?;

        while merger.has_next() {
            let record = match merger.next() {
                Some(record) => record?,
                None => break,
            };

            if stats.records_sorted > 0 {
                output
                    .write_all(LINE_SEPARATOR.as_bytes())
                    .map_err(|err| SortError::OutputError(err))?;
            }
            output
                .write_all(record.line().as_bytes())
                .map_err(|err| SortError::OutputError(err))?;
            stats.records_sorted += 1;
        }

        output.flush().map_err(|err| SortError::OutputError(err))?;
        merger.close_all();

        return Ok(());
    }

    fn transition(phase: &mut SortPhase, to: SortPhase) {
        log::debug!("sort phase: {} -> {}", phase, to);
        *phase = to;
    }

    fn fail(phase: &mut SortPhase, err: SortError) -> SortError {
        log::error!("sort failed while {}: {}", phase, err);
        Self::transition(phase, SortPhase::Failed);
        err
    }
}

/// Strips a trailing `\n` or `\r\n` from a raw line.
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
