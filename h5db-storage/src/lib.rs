//! Handle-based storage library for h5db container files.
//!
//! The container format stores named N-dimensional datasets, groups, and
//! attributes in a single file, read through HDF5-shaped handles: open a
//! [`File`], open a [`Dataset`] inside it, select a [`Hyperslab`] on its
//! [`Dataspace`], and issue typed reads that convert stored elements to the
//! caller-requested native type.
//!
//! # Thread safety
//!
//! The library is treated as **not thread-safe**: callers must hold the
//! process-wide reentrant lock returned by [`lock()`] around every call into
//! it, mirroring how the underlying scientific-data libraries this format
//! models behave. The lock is reentrant because some operations (attribute
//! iteration, object visitation) nest further library calls.
//!
//! # Probes
//!
//! Failed opens emit `tracing` warnings. Speculative probes — opening a
//! dataset whose existence is uncertain — wrap the call in [`suppressed()`],
//! which silences the warning and restores the previous verbosity on every
//! exit path, including unwinding.

pub mod attribute;
pub mod dataset;
pub mod dataspace;
pub mod datatype;
pub mod file;
mod format;
mod lock;
pub mod writer;

pub use attribute::Attribute;
pub use dataset::Dataset;
pub use dataspace::{Dataspace, Hyperslab};
pub use datatype::{Datatype, Element, TypeClass};
pub use file::{File, Object, ObjectInfo, ObjectKind};
pub use lock::{ErrorSuppressor, StorageGuard, lock, suppressed};
pub use writer::FileBuilder;
