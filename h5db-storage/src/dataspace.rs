//! Dataset shapes and rectangular selections.

use h5db_result::{Error, Result};

/// A rectangular sub-block of a dataspace: `start[k] ..= start[k]+count[k]-1`
/// along every dimension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hyperslab {
    pub start: Vec<u64>,
    pub count: Vec<u64>,
}

/// Shape and selection state for a dataset or in-memory buffer.
///
/// A dataspace is a detached value: selecting a hyperslab only affects this
/// instance, never the dataset it was derived from.
#[derive(Clone, Debug)]
pub struct Dataspace {
    dims: Vec<u64>,
    selection: Option<Hyperslab>,
}

impl Dataspace {
    pub fn new(dims: Vec<u64>) -> Dataspace {
        Dataspace {
            dims,
            selection: None,
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    /// Number of elements in the current selection (the full extent when no
    /// hyperslab is selected). A rank-0 scalar dataspace holds one element.
    pub fn num_points(&self) -> u64 {
        match &self.selection {
            Some(slab) => slab.count.iter().product(),
            None => self.dims.iter().product(),
        }
    }

    /// Restrict subsequent reads to the given rectangular block.
    pub fn select_hyperslab(&mut self, start: &[u64], count: &[u64]) -> Result<()> {
        if start.len() != self.rank() || count.len() != self.rank() {
            return Err(Error::StorageFailure(format!(
                "hyperslab rank {} does not match dataspace rank {}",
                start.len().max(count.len()),
                self.rank()
            )));
        }
        for k in 0..self.rank() {
            let end = start[k].checked_add(count[k]);
            if end.is_none() || end.unwrap() > self.dims[k] {
                return Err(Error::StorageFailure(format!(
                    "hyperslab selection [{}, {}) out of bounds for dimension {} of extent {}",
                    start[k],
                    start[k].saturating_add(count[k]),
                    k,
                    self.dims[k]
                )));
            }
        }
        self.selection = Some(Hyperslab {
            start: start.to_vec(),
            count: count.to_vec(),
        });
        Ok(())
    }

    /// Reset the selection to the full extent.
    pub fn select_all(&mut self) {
        self.selection = None;
    }

    /// The effective selection: the chosen hyperslab, or the full extent.
    pub(crate) fn resolved_selection(&self) -> Hyperslab {
        match &self.selection {
            Some(slab) => slab.clone(),
            None => Hyperslab {
                start: vec![0; self.rank()],
                count: self.dims.clone(),
            },
        }
    }
}

/// Walk the selected block in row-major order, invoking `f` once per
/// contiguous innermost run with `(element_offset, run_length)`.
pub(crate) fn for_each_contiguous_run(
    dims: &[u64],
    slab: &Hyperslab,
    mut f: impl FnMut(u64, u64) -> Result<()>,
) -> Result<()> {
    let rank = dims.len();
    if rank == 0 {
        return f(0, 1);
    }
    if slab.count.iter().any(|&c| c == 0) {
        return Ok(());
    }

    // Element strides, row-major: stride[k] = product of dims[k+1..].
    let mut strides = vec![1u64; rank];
    for k in (0..rank - 1).rev() {
        strides[k] = strides[k + 1] * dims[k + 1];
    }

    let inner = rank - 1;
    let run_len = slab.count[inner];
    let mut idx = vec![0u64; inner];
    loop {
        let mut offset = slab.start[inner];
        for k in 0..inner {
            offset += (slab.start[k] + idx[k]) * strides[k];
        }
        f(offset, run_len)?;

        // Advance the odometer over the outer dimensions.
        let mut k = inner;
        loop {
            if k == 0 {
                return Ok(());
            }
            k -= 1;
            idx[k] += 1;
            if idx[k] < slab.count[k] {
                break;
            }
            idx[k] = 0;
        }
    }
}
