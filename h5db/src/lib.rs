//! h5db exposes HDF5-style scientific dataset files as relational tables.
//!
//! The umbrella crate re-exports the workspace surface:
//!
//! - [`table`]: the `read`, `tree`, and `attributes` table functions plus
//!   the `rse()` column-spec helper.
//! - [`scan`]: the columnar scan executor (column model, range planner,
//!   scan driver, prefetch cache, materializers).
//! - [`storage`]: the handle-based container-file library and its writer.
//! - [`expr`]: the bound expression tree consumed by filter pushdown.
//!
//! ```no_run
//! use h5db::table::{ReadScan, rse};
//!
//! # fn main() -> h5db::Result<()> {
//! let scan = ReadScan::open(
//!     "measurements.h5db",
//!     &["/x".into(), rse("/rs", "/vs")],
//! )?;
//! while let Some(chunk) = scan.next_chunk()? {
//!     println!("{} rows", chunk.num_rows);
//! }
//! # Ok(())
//! # }
//! ```

pub use h5db_expr as expr;
pub use h5db_result::{Error, Result};
pub use h5db_scan as scan;
pub use h5db_storage as storage;
pub use h5db_table as table;
