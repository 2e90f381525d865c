//! Typed copy/fill of slices into output vectors.

use arrow::array::{ArrayRef, FixedSizeListArray, PrimitiveArray, StringArray, StringBuilder};
use arrow::datatypes::Field;
use h5db_result::{Error, Result};
use h5db_storage::{Dataset, Dataspace};
use std::sync::Arc;

use crate::cache::{BufferSlice, CacheChunk, ChunkCache};
use crate::column::{
    ColumnSpec, ColumnState, NumericElement, RegularColumnSpec, RegularColumnState,
    RseColumnSpec, RseColumnState, TypedSlice, TypedValues,
};
use crate::driver::Slice;
use crate::state::TableScanState;
use crate::vector::{DataChunk, Vector};

const WAIT_SPINS: u32 = 64;

/// Materialize one slice across every scanned column.
pub fn materialize_slice(
    specs: &[ColumnSpec],
    num_rows: u64,
    state: &TableScanState,
    slice: Slice,
) -> Result<DataChunk> {
    let mut columns = Vec::with_capacity(state.columns_to_scan().len());
    for (local, &global) in state.columns_to_scan().iter().enumerate() {
        let vector = match (&specs[global], state.column_state(local)) {
            (ColumnSpec::Rse(spec), ColumnState::Rse(col)) => {
                scan_rse_column(spec, col, slice, num_rows)?
            }
            (ColumnSpec::Regular(spec), ColumnState::Regular(col)) => {
                scan_regular_column(spec, col, specs, num_rows, state, slice)?
            }
            _ => {
                return Err(Error::Internal(
                    "column spec and state variants diverged".into(),
                ));
            }
        };
        columns.push(vector);
    }
    Ok(DataChunk {
        columns,
        num_rows: slice.length as usize,
    })
}

// ---------------------------------------------------------------------------
// RSE columns
// ---------------------------------------------------------------------------

/// Stateless RSE materialization: binary-search the starting run, emit a
/// constant vector when the whole slice sits inside it, otherwise fill runs
/// into a flat vector. Safe to call from any number of workers at once.
fn scan_rse_column(
    spec: &RseColumnSpec,
    col: &RseColumnState,
    slice: Slice,
    num_rows: u64,
) -> Result<Vector> {
    let pos = slice.position;
    let len = slice.length;
    let run = col.run_starts.partition_point(|&s| s <= pos) - 1;
    let next_start = col.run_starts.get(run + 1).copied().unwrap_or(num_rows);

    if next_start - pos >= len {
        let value: ArrayRef = match &col.values {
            TypedValues::Utf8(values) => Arc::new(StringArray::from(vec![values[run].as_str()])),
            _ => crate::dispatch_numeric!(spec.element_kind, constant_run_value(col, run))?,
        };
        return Ok(Vector::Constant {
            value,
            len: len as usize,
        });
    }

    match &col.values {
        TypedValues::Utf8(values) => {
            let mut builder = StringBuilder::new();
            let mut run = run;
            let mut next_start = next_start;
            let mut i = 0u64;
            while i < len {
                let rows_in_run = next_start - (pos + i);
                let fill = rows_in_run.min(len - i);
                for _ in 0..fill {
                    builder.append_value(&values[run]);
                }
                i += fill;
                if i < len {
                    run += 1;
                    next_start = col.run_starts.get(run + 1).copied().unwrap_or(num_rows);
                }
            }
            Ok(Vector::Flat(Arc::new(builder.finish())))
        }
        _ => crate::dispatch_numeric!(spec.element_kind, fill_runs(col, pos, len, num_rows)),
    }
}

fn constant_run_value<T: NumericElement + TypedSlice>(
    col: &RseColumnState,
    run: usize,
) -> Result<ArrayRef> {
    let values = T::slice(&col.values)
        .ok_or_else(|| Error::Internal("RSE value buffer does not match the column type".into()))?;
    Ok(Arc::new(PrimitiveArray::<T::ArrowType>::from_iter_values([
        values[run],
    ])))
}

fn fill_runs<T: NumericElement + TypedSlice>(
    col: &RseColumnState,
    pos: u64,
    len: u64,
    num_rows: u64,
) -> Result<Vector> {
    let values = T::slice(&col.values)
        .ok_or_else(|| Error::Internal("RSE value buffer does not match the column type".into()))?;
    let mut out = vec![T::default(); len as usize];
    let mut run = col.run_starts.partition_point(|&s| s <= pos) - 1;
    let mut next_start = col.run_starts.get(run + 1).copied().unwrap_or(num_rows);
    let mut i = 0u64;
    while i < len {
        let rows_in_run = next_start - (pos + i);
        let fill = rows_in_run.min(len - i);
        out[i as usize..(i + fill) as usize].fill(values[run]);
        i += fill;
        if i < len {
            run += 1;
            next_start = col.run_starts.get(run + 1).copied().unwrap_or(num_rows);
        }
    }
    Ok(Vector::Flat(Arc::new(
        PrimitiveArray::<T::ArrowType>::from_iter_values(out),
    )))
}

// ---------------------------------------------------------------------------
// Regular columns
// ---------------------------------------------------------------------------

fn scan_regular_column(
    spec: &RegularColumnSpec,
    col: &RegularColumnState,
    specs: &[ColumnSpec],
    num_rows: u64,
    state: &TableScanState,
    slice: Slice,
) -> Result<Vector> {
    if let Some(cache) = &col.cache {
        return crate::dispatch_numeric!(
            spec.element_kind,
            read_through_cache(cache, specs, num_rows, state, slice)
        );
    }
    read_direct(spec, col, slice)
}

/// True when `[pos, end)` lies inside the union of the two covered chunk
/// intervals; `(e1, cs1)` is the chunk with the lower `end_row`.
fn interval_covered(pos: u64, end: u64, lower: (u64, u64), upper: (u64, u64)) -> bool {
    let (e1, cs1) = lower;
    let (e2, cs2) = upper;
    if e2 == 0 {
        return false;
    }
    let s2 = e2.saturating_sub(cs2);
    if pos >= s2 {
        return end <= e2;
    }
    if e1 == 0 {
        return false;
    }
    let s1 = e1.saturating_sub(cs1);
    if pos < s1 {
        return false;
    }
    if end <= e1 {
        return true;
    }
    // Spans both chunks: they must be contiguous.
    s2 <= e1 && end <= e2
}

/// Briefly wait for the in-flight loader to publish progress on the slower
/// chunk. Stable Rust has no futex-style atomic wait, so this is a bounded
/// spin followed by a yield; the caller re-checks coverage either way.
fn wait_for_cache_progress(chunk: &CacheChunk, seen_end: u64, state: &TableScanState) {
    for _ in 0..WAIT_SPINS {
        if chunk.end_row() != seen_end || !state.is_fetching() {
            return;
        }
        std::hint::spin_loop();
    }
    std::thread::yield_now();
}

/// Reader protocol: wait (or load) until both bounds of the requested
/// interval are covered, then memcpy the overlapping pieces of each chunk
/// into the output buffer.
fn read_through_cache<T>(
    cache: &ChunkCache,
    specs: &[ColumnSpec],
    num_rows: u64,
    state: &TableScanState,
    slice: Slice,
) -> Result<Vector>
where
    T: NumericElement + BufferSlice,
{
    let pos = slice.position;
    let len = slice.length;
    let mut out = vec![T::default(); len as usize];

    let mut lower = &cache.chunks[0];
    let mut upper = &cache.chunks[1];
    let mut iteration = 0usize;
    loop {
        if iteration > 0 {
            state.try_refresh_cache(specs, num_rows)?;
        }
        let mut e1 = lower.end_row();
        let mut e2 = upper.end_row();
        if e1 > e2 {
            std::mem::swap(&mut lower, &mut upper);
            std::mem::swap(&mut e1, &mut e2);
        }
        if interval_covered(
            pos,
            pos + len,
            (e1, lower.chunk_size()),
            (e2, upper.chunk_size()),
        ) {
            break;
        }
        if state.is_fetching() {
            wait_for_cache_progress(lower, e1, state);
        } else if iteration > 0 {
            // Nothing to wait on and our refresh could not free a chunk:
            // earlier slices must complete first, so give their workers the
            // core.
            std::thread::yield_now();
        }
        iteration += 1;
    }

    // Coverage is stable from here: both chunks still overlap rows at or
    // past `pos >= position_done`, so the loader cannot recycle them until
    // this slice completes.
    for chunk in [lower, upper] {
        let end = chunk.end_row();
        if end == 0 {
            continue;
        }
        let start = end.saturating_sub(chunk.chunk_size());
        let copy_start = start.max(pos);
        let copy_end = end.min(pos + len);
        if copy_start < copy_end {
            let chunk_offset = (copy_start - start) as usize;
            let out_offset = (copy_start - pos) as usize;
            let count = (copy_end - copy_start) as usize;
            chunk.copy_out(chunk_offset, &mut out[out_offset..out_offset + count])?;
        }
    }

    Ok(Vector::Flat(Arc::new(
        PrimitiveArray::<T::ArrowType>::from_iter_values(out),
    )))
}

/// Direct path: strings, multi-dimensional datasets, and uncached numerics
/// read straight from storage under the storage lock. Hyperslab selection
/// and the read form a single critical section.
fn read_direct(
    spec: &RegularColumnSpec,
    col: &RegularColumnState,
    slice: Slice,
) -> Result<Vector> {
    let _storage = h5db_storage::lock();
    let mut space = col.file_space.lock();
    if spec.rank == 1 {
        space.select_hyperslab(&[slice.position], &[slice.length])?;
    } else {
        let mut start = vec![0u64; spec.rank];
        start[0] = slice.position;
        let mut count = spec.dims.clone();
        count[0] = slice.length;
        space.select_hyperslab(&start, &count)?;
    }

    if spec.is_string {
        let strings = col.dataset.read_strings(&space)?;
        let mut builder = StringBuilder::new();
        for s in &strings {
            if s.is_empty() {
                builder.append_null();
            } else {
                builder.append_value(s);
            }
        }
        return Ok(Vector::Flat(Arc::new(builder.finish())));
    }

    let values = crate::dispatch_numeric!(spec.element_kind, read_numeric(&col.dataset, &space))?;
    if spec.rank == 1 {
        return Ok(Vector::Flat(values));
    }
    // Multi-dimensional: the contiguous read already matches the layout of
    // the innermost child; wrap it in fixed-size list levels.
    Ok(Vector::Flat(wrap_fixed_lists(values, &spec.dims)?))
}

fn read_numeric<T: NumericElement>(dataset: &Dataset, space: &Dataspace) -> Result<ArrayRef> {
    let count = space.num_points() as usize;
    let mut out = vec![T::default(); count];
    dataset.read_into(space, &mut out)?;
    Ok(Arc::new(PrimitiveArray::<T::ArrowType>::from_iter_values(
        out,
    )))
}

fn wrap_fixed_lists(values: ArrayRef, dims: &[u64]) -> Result<ArrayRef> {
    let mut array = values;
    for &dim in dims[1..].iter().rev() {
        let field = Arc::new(Field::new("item", array.data_type().clone(), true));
        array = Arc::new(FixedSizeListArray::try_new(
            field,
            dim as i32,
            array,
            None,
        )?);
    }
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_accepts_single_chunk_hits() {
        // Upper chunk covers [100, 200).
        assert!(interval_covered(150, 180, (0, 100), (200, 100)));
        assert!(!interval_covered(150, 210, (0, 100), (200, 100)));
        // Lower chunk alone.
        assert!(interval_covered(10, 90, (100, 100), (300, 100)));
        // Empty cache covers nothing.
        assert!(!interval_covered(0, 1, (0, 100), (0, 100)));
    }

    #[test]
    fn coverage_requires_contiguity_across_chunks() {
        // [0,100) and [100,200): spanning read is covered.
        assert!(interval_covered(50, 150, (100, 100), (200, 100)));
        // [0,100) and [150,250): a hole, spanning read is not covered.
        assert!(!interval_covered(50, 160, (100, 100), (250, 100)));
        // Reads entirely before lower coverage fail.
        assert!(!interval_covered(0, 10, (200, 100), (300, 100)));
    }
}
