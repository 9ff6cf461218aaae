//! `log-sort` is an external merge sort for log files too large to be sorted in memory.
//!
//! The input is read line by line and every line is parsed into a [`LogRecord`]. Records are collected into chunks
//! of a fixed number of records, each chunk is sorted and written to a temporary file (a *run*). Once the input is
//! exhausted all runs are merged with a k-way merge, so memory usage depends on the chunk capacity and the number of
//! runs, not on the input size. For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Log format
//!
//! ```text
//! [2015-11-19 10:33:54.934+0000] [HOST1] [INFO] [CLASS1] [MESSAGE1 something]
//! ```
//!
//! The first bracket group is the timestamp, the second one the host and the third one the severity
//! (`ERROR`, `WARN` or `INFO`). Records are sorted by timestamp, then by severity in that order.
//! Records with equal timestamp and severity keep their input order. Lines that don't match the format
//! are logged and skipped.
//!
//! # Example
//!
//! ```no_run
//! use std::path;
//!
//! use log;
//!
//! use log_sort::{ExternalSorter, ExternalSorterBuilder};
//!
//! fn main() {
//!     let sorter: ExternalSorter = ExternalSorterBuilder::new()
//!         .with_tmp_dir(path::Path::new("./"))
//!         .with_chunk_capacity(1_000_000)
//!         .build()
//!         .unwrap();
//!
//!     let stats = sorter
//!         .sort_files(path::Path::new("input.log"), path::Path::new("output.log"))
//!         .unwrap();
//!
//!     log::info!("{} lines skipped", stats.lines_skipped);
//! }
//! ```

pub mod buffer;
pub mod chunk;
pub mod merger;
pub mod record;
pub mod sort;
pub mod writer;

pub use buffer::{ConfigError, LimitedBuffer};
pub use chunk::{Run, RunError, RunReader};
pub use merger::RunMerger;
pub use record::{LogRecord, ParseError, Severity, SortKey};
pub use sort::{ExternalSorter, ExternalSorterBuilder, SortError, SortStats, DEFAULT_CHUNK_CAPACITY};
pub use writer::ChunkWriter;

/// Line separator used for run files and sorted output.
#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
/// Line separator used for run files and sorted output.
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";
