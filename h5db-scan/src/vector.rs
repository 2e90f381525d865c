//! Output vector and chunk model.

use arrow::array::{ArrayRef, UInt32Array};
use h5db_result::{Error, Result};

/// One column's worth of output for a single slice.
///
/// A flat vector carries one entry per row. A constant vector carries a
/// single-element array standing for every row of the chunk, which is how
/// the RSE materializer reports a slice that falls entirely inside one run.
#[derive(Clone, Debug)]
pub enum Vector {
    Flat(ArrayRef),
    Constant { value: ArrayRef, len: usize },
}

impl Vector {
    pub fn len(&self) -> usize {
        match self {
            Vector::Flat(array) => array.len(),
            Vector::Constant { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Vector::Constant { .. })
    }

    /// Flatten to a plain array, expanding constants.
    pub fn to_array(&self) -> Result<ArrayRef> {
        match self {
            Vector::Flat(array) => Ok(array.clone()),
            Vector::Constant { value, len } => {
                if value.len() != 1 {
                    return Err(Error::Internal(format!(
                        "constant vector must hold exactly one value, found {}",
                        value.len()
                    )));
                }
                let indices = UInt32Array::from(vec![0u32; *len]);
                Ok(arrow::compute::take(value.as_ref(), &indices, None)?)
            }
        }
    }
}

/// A vector-size batch of output rows across all projected columns.
#[derive(Clone, Debug)]
pub struct DataChunk {
    pub columns: Vec<Vector>,
    pub num_rows: usize,
}

impl DataChunk {
    pub fn column(&self, index: usize) -> &Vector {
        &self.columns[index]
    }

    /// Flatten every column, expanding constant vectors.
    pub fn to_arrays(&self) -> Result<Vec<ArrayRef>> {
        self.columns.iter().map(Vector::to_array).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int32Array, StringArray};
    use std::sync::Arc;

    #[test]
    fn constant_vectors_expand_to_repeated_values() {
        let v = Vector::Constant {
            value: Arc::new(StringArray::from(vec!["b"])),
            len: 3,
        };
        assert_eq!(v.len(), 3);
        assert!(v.is_constant());
        let flat = v.to_array().unwrap();
        let flat = flat.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(flat.len(), 3);
        for i in 0..3 {
            assert_eq!(flat.value(i), "b");
        }
    }

    #[test]
    fn flat_vectors_pass_through() {
        let v = Vector::Flat(Arc::new(Int32Array::from(vec![1, 2, 3])));
        assert!(!v.is_constant());
        let arr = v.to_array().unwrap();
        assert_eq!(arr.len(), 3);
    }
}
