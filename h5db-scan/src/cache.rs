//! Double-buffered prefetch cache for regular 1-D numeric columns.
//!
//! Each cacheable column owns two chunks. A chunk holds a typed buffer of
//! `chunk_size` elements and an atomic `end_row`; the covered interval is
//! `[end_row - chunk_size, end_row)` and `end_row == 0` means empty. Buffer
//! bytes are published with a release store of `end_row` and consumed after
//! an acquire load, so a reader that observed a given `end_row` may read
//! every element of that chunk.
//!
//! Only one task loads at a time (the `someone_is_fetching` gate lives in
//! [`crate::state::TableScanState`]); the loader only rewrites a chunk whose
//! `end_row` is at or below the completion low-water mark, which no in-flight
//! slice can still need. The per-chunk `RwLock` encodes that exclusivity in
//! safe code; it is uncontended by protocol.

use h5db_result::{Error, Result};
use h5db_storage::{Dataset, Dataspace};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::column::{ElementKind, NumericElement};
use crate::constants::{DEFAULT_CHUNK_BYTES, MIN_CHUNK_ELEMENTS};
use crate::driver::next_range_from;
use crate::ranges::RowRange;

/// Typed chunk buffer; strings never enter the cache.
pub(crate) enum NumericBuffer {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl NumericBuffer {
    fn allocate(kind: ElementKind, len: usize) -> NumericBuffer {
        match kind {
            ElementKind::Int8 => NumericBuffer::Int8(vec![0; len]),
            ElementKind::Int16 => NumericBuffer::Int16(vec![0; len]),
            ElementKind::Int32 => NumericBuffer::Int32(vec![0; len]),
            ElementKind::Int64 => NumericBuffer::Int64(vec![0; len]),
            ElementKind::UInt8 => NumericBuffer::UInt8(vec![0; len]),
            ElementKind::UInt16 => NumericBuffer::UInt16(vec![0; len]),
            ElementKind::UInt32 => NumericBuffer::UInt32(vec![0; len]),
            ElementKind::UInt64 => NumericBuffer::UInt64(vec![0; len]),
            ElementKind::Float32 => NumericBuffer::Float32(vec![0.0; len]),
            ElementKind::Float64 => NumericBuffer::Float64(vec![0.0; len]),
            ElementKind::Utf8 => panic!("string columns are never cached"),
        }
    }
}

/// Typed access into a [`NumericBuffer`].
pub(crate) trait BufferSlice: Sized {
    fn slice(buf: &NumericBuffer) -> Option<&[Self]>;
    fn slice_mut(buf: &mut NumericBuffer) -> Option<&mut [Self]>;
}

macro_rules! impl_buffer_slice {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl BufferSlice for $ty {
                fn slice(buf: &NumericBuffer) -> Option<&[Self]> {
                    match buf {
                        NumericBuffer::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn slice_mut(buf: &mut NumericBuffer) -> Option<&mut [Self]> {
                    match buf {
                        NumericBuffer::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )+
    };
}

impl_buffer_slice!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
);

/// One prefetch buffer plus its published coverage.
pub struct CacheChunk {
    chunk_size: u64,
    end_row: AtomicU64,
    buf: RwLock<NumericBuffer>,
}

impl CacheChunk {
    fn new(kind: ElementKind, chunk_size: u64) -> CacheChunk {
        CacheChunk {
            chunk_size,
            end_row: AtomicU64::new(0),
            buf: RwLock::new(NumericBuffer::allocate(kind, chunk_size as usize)),
        }
    }

    /// One past the last covered row; `0` means the chunk is empty.
    #[inline]
    pub fn end_row(&self) -> u64 {
        self.end_row.load(Ordering::Acquire)
    }

    #[inline]
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Copy `dst.len()` elements starting at `offset` elements into the
    /// covered interval. The caller must have observed an `end_row` proving
    /// coverage of the copied region.
    pub(crate) fn copy_out<T: BufferSlice + Copy>(&self, offset: usize, dst: &mut [T]) -> Result<()> {
        let guard = self.buf.read();
        let src = T::slice(&guard)
            .ok_or_else(|| Error::Internal("cache buffer does not match the column type".into()))?;
        dst.copy_from_slice(&src[offset..offset + dst.len()]);
        Ok(())
    }
}

/// The fixed pair of chunks backing one cacheable column.
pub struct ChunkCache {
    pub(crate) chunks: [CacheChunk; 2],
}

impl ChunkCache {
    pub fn new(kind: ElementKind, chunk_size: u64) -> ChunkCache {
        ChunkCache {
            chunks: [
                CacheChunk::new(kind, chunk_size),
                CacheChunk::new(kind, chunk_size),
            ],
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunks[0].chunk_size
    }

    pub(crate) fn max_end_row(&self) -> u64 {
        self.chunks.iter().map(CacheChunk::end_row).max().unwrap_or(0)
    }
}

/// Pick the per-chunk element count: the dataset's declared chunk extent if
/// the file records one, otherwise about one MiB worth of elements. Either
/// way a single chunk must be able to cover one output vector, or readers
/// could wait on coverage that never arrives.
pub fn resolve_chunk_size(declared: Option<u64>, element_size: usize, vector_size: u64) -> u64 {
    let default = DEFAULT_CHUNK_BYTES / element_size.max(1) as u64;
    declared
        .unwrap_or(default)
        .max(MIN_CHUNK_ELEMENTS)
        .max(vector_size)
}

/// Loader protocol: refresh every consumed chunk of one column, extending
/// coverage past the current high-water mark along the valid-range list.
///
/// Runs with the single-loader gate held by the caller.
pub(crate) fn load_chunks<T>(
    cache: &ChunkCache,
    dataset: &Dataset,
    file_space: &Mutex<Dataspace>,
    ranges: &[RowRange],
    position_done: u64,
    num_rows: u64,
) -> Result<()>
where
    T: NumericElement + BufferSlice,
{
    let mut max_end = cache.max_end_row();
    for chunk in &cache.chunks {
        if chunk.end_row() > position_done {
            // Still covering undelivered rows; leave it alone.
            continue;
        }
        let Some(range) = next_range_from(ranges, max_end) else {
            continue;
        };
        let start = max_end.max(range.start_row);
        let rows = chunk.chunk_size.min(num_rows - start);
        {
            let mut buf = chunk.buf.write();
            let out = T::slice_mut(&mut buf).ok_or_else(|| {
                Error::Internal("cache buffer does not match the column type".into())
            })?;
            let _storage = h5db_storage::lock();
            let mut space = file_space.lock();
            space.select_hyperslab(&[start], &[rows])?;
            dataset.read_into(&space, &mut out[..rows as usize])?;
        }
        // Claimed coverage always spans a full chunk; the tail past num_rows
        // is never requested by any reader.
        let new_end = start + chunk.chunk_size;
        chunk.end_row.store(new_end, Ordering::Release);
        max_end = new_end;
    }
    Ok(())
}
