//! Scan-wide tuning constants.

/// Default number of rows per output vector chunk.
pub const VECTOR_SIZE: usize = 2048;

/// Default prefetch chunk footprint when the file records no chunk extent:
/// one MiB worth of elements.
pub const DEFAULT_CHUNK_BYTES: u64 = 1024 * 1024;

/// Lower bound on prefetch chunk element counts.
pub const MIN_CHUNK_ELEMENTS: u64 = 2048;
