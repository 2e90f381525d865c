//! Attribute handles.

use crate::datatype::{Datatype, Element, decode_elements};
use crate::format::AttrMeta;
use h5db_result::{Error, Result};

/// A decoded attribute of a group or dataset.
#[derive(Clone, Debug)]
pub struct Attribute {
    name: String,
    dtype: Datatype,
    extent: Option<u64>,
    payload: Vec<u8>,
}

impl Attribute {
    pub(crate) fn from_meta(meta: &AttrMeta) -> Attribute {
        Attribute {
            name: meta.name.clone(),
            dtype: meta.dtype.clone(),
            extent: meta.extent,
            payload: meta.payload.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> &Datatype {
        &self.dtype
    }

    /// `None` for scalar attributes, `Some(n)` for 1-D arrays of `n` elements.
    pub fn extent(&self) -> Option<u64> {
        self.extent
    }

    /// Read a scalar numeric attribute, converting to `T`.
    pub fn read_scalar<T: Element>(&self) -> Result<T> {
        if self.dtype.is_string() || self.extent.is_some() {
            return Err(Error::UnsupportedType(format!(
                "attribute {} is not a scalar numeric value",
                self.name
            )));
        }
        let mut out = [T::default(); 1];
        decode_elements(&self.dtype, &self.payload, &mut out)?;
        Ok(out[0])
    }

    /// Read a 1-D numeric array attribute, converting to `T`.
    pub fn read_vec<T: Element>(&self) -> Result<Vec<T>> {
        if self.dtype.is_string() {
            return Err(Error::UnsupportedType(format!(
                "attribute {} holds strings, not numbers",
                self.name
            )));
        }
        let n = self.extent.ok_or_else(|| {
            Error::UnsupportedType(format!("attribute {} is scalar, not an array", self.name))
        })?;
        let mut out = vec![T::default(); n as usize];
        decode_elements(&self.dtype, &self.payload, &mut out)?;
        Ok(out)
    }

    /// Read a scalar string attribute; fixed-length payloads are truncated at
    /// the first NUL.
    pub fn read_string(&self) -> Result<String> {
        if !self.dtype.is_string() || self.extent.is_some() {
            return Err(Error::UnsupportedType(format!(
                "attribute {} is not a scalar string",
                self.name
            )));
        }
        let bytes = if self.dtype.is_variable_str() {
            &self.payload[..]
        } else {
            let len = self
                .payload
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(self.payload.len());
            &self.payload[..len]
        };
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
