//! Binary heap run merger.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use log;

use crate::chunk::{Run, RunError, RunReader};
use crate::record::{LogRecord, SortKey};

/// Frontier entry: the current head record of a run.
///
/// Entries are ordered by `(key, run)` so heads of different runs never collide even when their records compare equal.
struct HeadEntry {
    key: SortKey,
    run: usize,
    slot: usize,
    record: LogRecord,
}

impl PartialEq for HeadEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeadEntry {}

impl PartialOrd for HeadEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeadEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then(self.run.cmp(&other.run))
    }
}

/// Binary heap merger implementation.
/// Merges multiple sorted runs into a single sorted stream.
/// Time complexity is *m* \* log(*n*) where *m* is the number of records, *n* is the number of runs.
/// Memory usage is proportional to the number of runs.
///
/// Records with equal keys are returned in run creation order.
pub struct RunMerger {
    // binary heap is max-heap by default so we reverse it to convert it to min-heap
    frontier: BinaryHeap<Reverse<HeadEntry>>,
    // a slot is emptied once its run is exhausted
    cursors: Vec<Option<RunReader>>,
}

impl RunMerger {
    /// Opens every run and reads its first record.
    /// Run records should be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `runs` - Runs to be merged in a single sorted stream
    pub fn new<I>(runs: I) -> Result<Self, RunError>
    where
        I: IntoIterator<Item = Run>,
    {
        let runs = Vec::from_iter(runs);

        let mut merger = RunMerger {
            frontier: BinaryHeap::with_capacity(runs.len()),
            cursors: Vec::with_capacity(runs.len()),
        };

        for run in runs {
            let slot = merger.cursors.len();
            merger.cursors.push(Some(run.open()?));
            merger.advance(slot)?;
        }

        log::debug!("merging {} runs", merger.frontier.len());

        return Ok(merger);
    }

    /// Checks if any run still has unread records.
    pub fn has_next(&self) -> bool {
        !self.frontier.is_empty()
    }

    /// Returns the number of runs with unread records.
    pub fn open_runs(&self) -> usize {
        self.frontier.len()
    }

    /// Closes every open run and clears the frontier. Used for early termination.
    pub fn close_all(&mut self) {
        if !self.frontier.is_empty() {
            log::debug!("closing {} unfinished runs", self.frontier.len());
        }

        self.frontier.clear();
        self.cursors.clear();
    }

    /// Reads the next record of a run into the frontier or releases the run if it is exhausted.
    fn advance(&mut self, slot: usize) -> Result<(), RunError> {
        let cursor = match self.cursors[slot].as_mut() {
            Some(cursor) => cursor,
            None => return Ok(()),
        };

        match cursor.next() {
            Some(Ok(record)) => {
                self.frontier.push(Reverse(HeadEntry {
                    key: record.key(),
                    run: cursor.id(),
                    slot,
                    record,
                }));
            }
            Some(Err(err)) => return Err(err),
            None => {
                log::trace!("run {} exhausted", cursor.id());
                self.cursors[slot] = None;
            }
        }

        return Ok(());
    }
}

impl Iterator for RunMerger {
    type Item = Result<LogRecord, RunError>;

    /// Returns the next record from the runs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        let Reverse(head) = self.frontier.pop()?;

        if let Err(err) = self.advance(head.slot) {
            return Some(Err(err));
        }

        return Some(Ok(head.record));
    }
}
