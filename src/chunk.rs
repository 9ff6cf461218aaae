//! Sorted runs stored on the file system.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::Path;

use tempfile;

use crate::record::{LogRecord, ParseError};
use crate::LINE_SEPARATOR;

/// Run reading error.
#[derive(Debug)]
pub enum RunError {
    /// Common I/O error.
    IO(io::Error),
    /// A line stored in a run could not be parsed back.
    Corrupted { run: usize, source: ParseError },
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(match &self {
            RunError::IO(err) => err,
            RunError::Corrupted { source, .. } => source,
        })
    }
}

impl Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            RunError::IO(err) => write!(f, "run I/O operation failed: {}", err),
            RunError::Corrupted { run, source } => write!(f, "run {} is corrupted: {}", run, source),
        }
    }
}

impl From<io::Error> for RunError {
    fn from(err: io::Error) -> Self {
        RunError::IO(err)
    }
}

/// A sorted run persisted in a temporary file.
///
/// The file is removed when the run (or the reader it was turned into) is dropped.
pub struct Run {
    id: usize,
    len: usize,
    file: tempfile::NamedTempFile,
    buf_size: Option<usize>,
}

impl Run {
    /// Writes already sorted records to a new file in `dir`, one raw line per line.
    ///
    /// # Arguments
    /// * `dir` - Directory the run file is created in
    /// * `id` - Run identifier, runs created later must get greater ids
    /// * `records` - Records in sorted order
    /// * `buf_size` - Run file read/write buffer size
    pub fn build(
        dir: &Path,
        id: usize,
        records: impl IntoIterator<Item = LogRecord>,
        buf_size: Option<usize>,
    ) -> io::Result<Self> {
        let tmp_file = tempfile::Builder::new()
            .prefix(&format!("run-{:06}-", id))
            .suffix(".log")
            .tempfile_in(dir)?;

        let mut run_writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, tmp_file.as_file().try_clone()?),
            None => io::BufWriter::new(tmp_file.as_file().try_clone()?),
        };

        let mut len = 0;
        for record in records.into_iter() {
            run_writer.write_all(record.line().as_bytes())?;
            run_writer.write_all(LINE_SEPARATOR.as_bytes())?;
            len += 1;
        }

        run_writer.flush()?;

        return Ok(Run {
            id,
            len,
            file: tmp_file,
            buf_size,
        });
    }

    /// Returns the run identifier.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the number of records stored in the run.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the run file path.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Opens the run for reading from its first record.
    pub fn open(self) -> io::Result<RunReader> {
        let mut file = self.file.as_file().try_clone()?;
        file.rewind()?;

        let reader = match self.buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        return Ok(RunReader {
            id: self.id,
            lines: reader.lines(),
            _file: self.file,
        });
    }
}

/// Run read cursor. Yields the run records in stored order.
pub struct RunReader {
    id: usize,
    lines: io::Lines<io::BufReader<fs::File>>,
    // dropping the handle removes the run file
    _file: tempfile::NamedTempFile,
}

impl RunReader {
    /// Returns the identifier of the run being read.
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Iterator for RunReader {
    type Item = Result<LogRecord, RunError>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(err) => return Some(Err(RunError::IO(err))),
        };

        Some(LogRecord::parse(line).map_err(|err| RunError::Corrupted {
            run: self.id,
            source: err,
        }))
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::prelude::*;

    use rstest::*;

    use super::{Run, RunError};
    use crate::record::LogRecord;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn records(lines: &[&str]) -> Vec<LogRecord> {
        lines.iter().map(|line| LogRecord::parse(*line).unwrap()).collect()
    }

    #[rstest]
    #[case(None)]
    #[case(Some(16))]
    fn test_run(tmp_dir: tempfile::TempDir, #[case] buf_size: Option<usize>) {
        let saved = records(&[
            "[2015-11-19 10:31:55.128+0000] [HOST2] [ERROR] [CLASS2] [MESSAGE2 random]",
            "[2015-11-19 10:31:55.128+0000] [HOST3] [INFO] [CLASS6] [MESSAGE5 from another host]",
            "[2015-11-19 10:37:55.246+0000] [HOST2] [WARN] [CLASS9] [MESSAGE9 again]",
        ]);

        let run = Run::build(tmp_dir.path(), 7, saved.clone(), buf_size).unwrap();
        assert_eq!(run.id(), 7);
        assert_eq!(run.len(), 3);

        let reader = run.open().unwrap();
        let restored: Result<Vec<LogRecord>, RunError> = reader.collect();
        let restored = restored.unwrap();

        assert_eq!(restored, saved);
    }

    #[rstest]
    fn test_run_removed_on_drop(tmp_dir: tempfile::TempDir) {
        let saved = records(&["[2015-11-19 10:31:55.128+0000] [HOST2] [ERROR] [CLASS2] [MESSAGE2 random]"]);

        let run = Run::build(tmp_dir.path(), 0, saved, None).unwrap();
        let path = run.path().to_path_buf();
        assert!(path.exists());

        let mut reader = run.open().unwrap();
        assert!(reader.next().is_some());
        assert!(reader.next().is_none());
        assert!(path.exists());

        drop(reader);
        assert!(!path.exists());
        assert_eq!(fs::read_dir(tmp_dir.path()).unwrap().count(), 0);
    }

    #[rstest]
    fn test_corrupted_run(tmp_dir: tempfile::TempDir) {
        let saved = records(&["[2015-11-19 10:31:55.128+0000] [HOST2] [ERROR] [CLASS2] [MESSAGE2 random]"]);

        let run = Run::build(tmp_dir.path(), 3, saved, None).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(run.path())
            .unwrap()
            .write_all(b"garbage\n")
            .unwrap();

        let mut reader = run.open().unwrap();
        assert!(matches!(reader.next(), Some(Ok(_))));
        assert!(matches!(reader.next(), Some(Err(RunError::Corrupted { run: 3, .. }))));
        assert!(reader.next().is_none());
    }
}
