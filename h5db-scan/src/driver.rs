//! Slice hand-out and completion tracking.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ranges::RowRange;

/// A contiguous `[position, position + length)` row interval assigned to one
/// worker for one output chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slice {
    pub position: u64,
    pub length: u64,
}

/// Observable phase of a scan. `Planning` is implicit: a driver only exists
/// once initialization has produced the row-range list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanPhase {
    /// Slices remain to be handed out.
    Ready,
    /// Everything is handed out, some workers are still in flight.
    Draining,
    /// Every delivered row has been folded into the low-water mark.
    Done,
}

/// First range extending past `position`, if any.
pub(crate) fn next_range_from(ranges: &[RowRange], position: u64) -> Option<RowRange> {
    ranges.iter().find(|r| r.end_row > position).copied()
}

#[derive(Default)]
struct DriverInner {
    /// Rows before this index have been handed out (or skipped).
    position: u64,
    /// Low-water mark: rows in `[0, done)` are fully delivered.
    done: u64,
    /// Out-of-order completions parked by start position.
    completed: BTreeMap<u64, u64>,
}

/// Hands out ascending slices from the valid-range list and tracks the
/// monotone completion low-water mark the prefetch cache evicts against.
///
/// Skipped gaps between ranges are folded into the completion map as
/// zero-cost completions, so `position_done` walks through pruned intervals
/// the same way it walks through delivered ones.
pub struct ScanDriver {
    ranges: Vec<RowRange>,
    num_rows: u64,
    vector_size: u64,
    position: AtomicU64,
    position_done: AtomicU64,
    inner: Mutex<DriverInner>,
}

impl std::fmt::Debug for ScanDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanDriver")
            .field("num_rows", &self.num_rows)
            .field("vector_size", &self.vector_size)
            .finish()
    }
}

impl ScanDriver {
    pub fn new(ranges: Vec<RowRange>, num_rows: u64, vector_size: u64) -> ScanDriver {
        ScanDriver {
            ranges,
            num_rows,
            vector_size: vector_size.max(1),
            position: AtomicU64::new(0),
            position_done: AtomicU64::new(0),
            inner: Mutex::new(DriverInner::default()),
        }
    }

    #[inline]
    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    #[inline]
    pub fn valid_ranges(&self) -> &[RowRange] {
        &self.ranges
    }

    /// Rows before this index have been handed out. Lock-free read.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    /// Low-water mark of fully delivered rows. Lock-free read.
    #[inline]
    pub fn position_done(&self) -> u64 {
        self.position_done.load(Ordering::Acquire)
    }

    /// Claim the next slice, or `None` once every range is handed out.
    pub fn next_slice(&self) -> Option<Slice> {
        let mut inner = self.inner.lock();
        let pos = inner.position;
        let Some(range) = next_range_from(&self.ranges, pos) else {
            // End of the range list: fold the trailing gap so the low-water
            // mark reaches num_rows once in-flight work drains.
            if pos < self.num_rows {
                self.fold_completion(&mut inner, pos, self.num_rows);
                inner.position = self.num_rows;
                self.position.store(self.num_rows, Ordering::Release);
            }
            return None;
        };

        let start = pos.max(range.start_row);
        if start > pos {
            // The gap `[pos, start)` is pruned; it completes immediately.
            self.fold_completion(&mut inner, pos, start);
        }
        let length = self.vector_size.min(range.end_row - start);
        inner.position = start + length;
        self.position.store(inner.position, Ordering::Release);
        Some(Slice {
            position: start,
            length,
        })
    }

    /// Report a materialized slice. Contiguous completions advance the
    /// low-water mark directly; out-of-order ones are parked and folded in
    /// as it catches up.
    pub fn complete(&self, slice: Slice) {
        let mut inner = self.inner.lock();
        self.fold_completion(&mut inner, slice.position, slice.position + slice.length);
    }

    fn fold_completion(&self, inner: &mut DriverInner, start: u64, end: u64) {
        if start == inner.done {
            inner.done = end;
            while let Some(next_end) = inner.completed.remove(&inner.done) {
                inner.done = next_end;
            }
            self.position_done.store(inner.done, Ordering::Release);
        } else {
            inner.completed.insert(start, end);
        }
    }

    pub fn phase(&self) -> ScanPhase {
        let position = self.position();
        let done = self.position_done();
        if position >= self.num_rows && done >= self.num_rows {
            ScanPhase::Done
        } else if position >= self.num_rows {
            ScanPhase::Draining
        } else {
            ScanPhase::Ready
        }
    }
}
