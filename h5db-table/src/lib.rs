//! Table functions exposing h5db container files as relations.
//!
//! - [`read`](crate::read): the main scan — bind a file plus column specs,
//!   optionally push down projections and complex filters, then stream
//!   vector-size chunks sequentially or across parallel workers.
//! - [`rse`](crate::rse::rse): helper constructing the run-start-encoded
//!   column-spec struct accepted by `read`.
//! - [`tree`](crate::tree::tree): one row per object in a file.
//! - [`attributes`](crate::attributes::attributes): single-row relation of
//!   one object's attributes.

#![forbid(unsafe_code)]

pub mod attributes;
pub mod pushdown;
pub mod read;
pub mod rse;
pub mod tree;

pub use attributes::{AttributesScan, attributes};
pub use pushdown::pushdown_complex_filter;
pub use read::{
    ColumnArg, ReadBindData, ReadOptions, ReadScan, bind, cardinality, init, scan_chunk, schema,
};
pub use rse::rse;
pub use tree::{TreeScan, tree};
