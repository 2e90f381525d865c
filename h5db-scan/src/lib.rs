//! Columnar scan executor for h5db container files.
//!
//! This crate hosts the storage-facing scan machinery shared by the table
//! surface: the tagged column model (regular and run-start-encoded columns),
//! the row-range planner that turns claimed filters into prunable intervals,
//! the slice-granting scan driver, the double-buffered prefetch cache, and
//! the typed materializers that fill output vectors.
//!
//! The host-facing bind/init/scan callbacks live in `h5db-table`; everything
//! here is independent of how the scan was requested.

pub mod cache;
pub mod column;
pub mod constants;
pub mod driver;
pub mod materialize;
pub mod ranges;
pub mod state;
pub mod vector;

pub use cache::{ChunkCache, resolve_chunk_size};
pub use column::{
    ColumnSpec, ColumnState, ElementKind, LogicalType, NumericElement, RegularColumnSpec,
    RegularColumnState, RseColumnSpec, RseColumnState, TypedSlice, TypedValues,
};
pub use constants::VECTOR_SIZE;
pub use driver::{ScanDriver, ScanPhase, Slice};
pub use materialize::materialize_slice;
pub use ranges::{ClaimedFilter, RowRange, intersect_ranges, plan_valid_ranges, validate_rse};
pub use state::TableScanState;
pub use vector::{DataChunk, Vector};
