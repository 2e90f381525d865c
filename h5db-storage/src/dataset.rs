//! Dataset handles and typed reads.

use crate::dataspace::{Dataspace, for_each_contiguous_run};
use crate::datatype::{Datatype, Element, decode_elements};
use crate::file::FileCore;
use crate::format::DatasetMeta;
use h5db_result::{Error, Result};
use std::sync::Arc;

/// Handle to one dataset inside an open file.
pub struct Dataset {
    pub(crate) core: Arc<FileCore>,
    pub(crate) index: usize,
}

impl Dataset {
    fn meta(&self) -> &DatasetMeta {
        self.core.directory.objects[self.index]
            .dataset
            .as_ref()
            .expect("dataset handle always points at a dataset entry")
    }

    /// Path of this dataset.
    pub fn path(&self) -> &str {
        &self.core.directory.objects[self.index].path
    }

    /// Stored element type.
    pub fn dtype(&self) -> Datatype {
        self.meta().dtype.clone()
    }

    /// Fresh dataspace describing the dataset extent, with no selection.
    pub fn space(&self) -> Dataspace {
        Dataspace::new(self.meta().dims.clone())
    }

    /// Declared chunk extent along the first dimension, when the file records
    /// one.
    pub fn chunk_dims(&self) -> Option<u64> {
        self.meta().chunk_dim
    }

    /// Total number of stored elements.
    pub fn num_points(&self) -> u64 {
        self.meta().dims.iter().product()
    }

    fn raw_data(&self) -> Result<&[u8]> {
        let meta = self.meta();
        self.core.data_slice(meta.data_offset, meta.data_len)
    }

    /// Read the selection of `space` into `out`, converting stored elements
    /// to `T`.
    ///
    /// `out` must hold exactly `space.num_points()` elements.
    pub fn read_into<T: Element>(&self, space: &Dataspace, out: &mut [T]) -> Result<()> {
        let meta = self.meta();
        if meta.dtype.is_string() {
            return Err(Error::UnsupportedType(format!(
                "string dataset {} requires a string read",
                self.path()
            )));
        }
        if space.dims() != meta.dims.as_slice() {
            return Err(Error::StorageFailure(format!(
                "dataspace extent {:?} does not match dataset {} extent {:?}",
                space.dims(),
                self.path(),
                meta.dims
            )));
        }
        let expected = space.num_points() as usize;
        if out.len() != expected {
            return Err(Error::StorageFailure(format!(
                "read buffer holds {} elements but the selection covers {}",
                out.len(),
                expected
            )));
        }

        let data = self.raw_data()?;
        let width = meta.dtype.size();
        let slab = space.resolved_selection();
        let mut written = 0usize;
        for_each_contiguous_run(&meta.dims, &slab, |elem_offset, run_len| {
            let run_len = run_len as usize;
            let byte_start = elem_offset as usize * width;
            let byte_end = byte_start + run_len * width;
            if byte_end > data.len() {
                return Err(Error::StorageFailure(format!(
                    "dataset {} data region too short for selection",
                    self.path()
                )));
            }
            decode_elements(
                &meta.dtype,
                &data[byte_start..byte_end],
                &mut out[written..written + run_len],
            )?;
            written += run_len;
            Ok(())
        })
    }

    /// Read the full dataset into a freshly allocated vector.
    pub fn read_all<T: Element>(&self) -> Result<Vec<T>> {
        let space = self.space();
        let mut out = vec![T::default(); space.num_points() as usize];
        self.read_into(&space, &mut out)?;
        Ok(out)
    }

    /// Read the selected rows of a 1-D string dataset.
    ///
    /// Fixed-length entries are truncated at their first NUL; variable-length
    /// entries come back as owned strings (reclamation of the stored heap is
    /// handled by ownership).
    pub fn read_strings(&self, space: &Dataspace) -> Result<Vec<String>> {
        let meta = self.meta();
        if !meta.dtype.is_string() {
            return Err(Error::UnsupportedType(format!(
                "dataset {} is not a string dataset",
                self.path()
            )));
        }
        if meta.dims.len() != 1 {
            return Err(Error::UnsupportedType(format!(
                "string dataset {} must be one-dimensional",
                self.path()
            )));
        }
        let slab = space.resolved_selection();
        let start = slab.start[0] as usize;
        let count = slab.count[0] as usize;
        let data = self.raw_data()?;

        if meta.dtype.is_variable_str() {
            let n = meta.dims[0] as usize;
            let table_len = (n + 1) * 8;
            if data.len() < table_len {
                return Err(Error::StorageFailure(format!(
                    "dataset {} offset table truncated",
                    self.path()
                )));
            }
            let heap = &data[table_len..];
            let offset_at = |i: usize| -> usize {
                u64::from_le_bytes(data[i * 8..i * 8 + 8].try_into().expect("sized")) as usize
            };
            let mut out = Vec::with_capacity(count);
            for i in start..start + count {
                let (lo, hi) = (offset_at(i), offset_at(i + 1));
                if lo > hi || hi > heap.len() {
                    return Err(Error::StorageFailure(format!(
                        "dataset {} string heap corrupt at entry {}",
                        self.path(),
                        i
                    )));
                }
                out.push(String::from_utf8_lossy(&heap[lo..hi]).into_owned());
            }
            Ok(out)
        } else {
            let width = meta.dtype.size();
            let mut out = Vec::with_capacity(count);
            for i in start..start + count {
                let lo = i * width;
                let hi = lo + width;
                if hi > data.len() {
                    return Err(Error::StorageFailure(format!(
                        "dataset {} fixed-string region truncated",
                        self.path()
                    )));
                }
                let entry = &data[lo..hi];
                let len = entry.iter().position(|&b| b == 0).unwrap_or(width);
                out.push(String::from_utf8_lossy(&entry[..len]).into_owned());
            }
            Ok(out)
        }
    }

    /// Read every entry of a 1-D string dataset.
    pub fn read_strings_all(&self) -> Result<Vec<String>> {
        self.read_strings(&self.space())
    }
}
