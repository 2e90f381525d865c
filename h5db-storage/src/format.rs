//! On-disk layout of the container file.
//!
//! ```text
//! [magic "H5DB"][version u32][directory_offset u64][directory_len u64]
//! [data region: dataset payloads, back to back]
//! [directory: encoded object entries]
//! ```
//!
//! All integers are little-endian. Dataset payloads are raw element bytes in
//! row-major order; variable-length string payloads carry an `(n+1)`-entry
//! offset table followed by the string heap.

use crate::datatype::{Datatype, TypeClass};
use h5db_result::{Error, Result};

pub(crate) const MAGIC: [u8; 4] = *b"H5DB";
pub(crate) const VERSION: u32 = 1;
pub(crate) const HEADER_LEN: usize = 24;

#[derive(Clone, Debug)]
pub(crate) struct DatasetMeta {
    pub dtype: Datatype,
    pub dims: Vec<u64>,
    /// Declared chunk extent along the first dimension; `None` = contiguous.
    pub chunk_dim: Option<u64>,
    pub data_offset: u64,
    pub data_len: u64,
}

#[derive(Clone, Debug)]
pub(crate) struct AttrMeta {
    pub name: String,
    pub dtype: Datatype,
    /// `None` for scalar attributes, `Some(n)` for 1-D arrays of n elements.
    pub extent: Option<u64>,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug)]
pub(crate) struct ObjectEntry {
    pub path: String,
    /// `None` marks a group.
    pub dataset: Option<DatasetMeta>,
    pub attrs: Vec<AttrMeta>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Directory {
    /// Sorted by path.
    pub objects: Vec<ObjectEntry>,
}

impl Directory {
    pub fn find(&self, path: &str) -> Option<(usize, &ObjectEntry)> {
        self.objects
            .binary_search_by(|entry| entry.path.as_str().cmp(path))
            .ok()
            .map(|i| (i, &self.objects[i]))
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn put_dtype(out: &mut Vec<u8>, dtype: &Datatype) {
    let class = match dtype.class() {
        TypeClass::Integer => 0u8,
        TypeClass::Float => 1,
        TypeClass::String => 2,
    };
    out.push(class);
    out.extend_from_slice(&(dtype.size() as u32).to_le_bytes());
    out.push(dtype.flags());
}

impl Directory {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.objects.len() as u32).to_le_bytes());
        for obj in &self.objects {
            put_str(&mut out, &obj.path);
            match &obj.dataset {
                None => out.push(0),
                Some(ds) => {
                    out.push(1);
                    put_dtype(&mut out, &ds.dtype);
                    out.push(ds.dims.len() as u8);
                    for &d in &ds.dims {
                        out.extend_from_slice(&d.to_le_bytes());
                    }
                    out.extend_from_slice(&ds.chunk_dim.unwrap_or(0).to_le_bytes());
                    out.extend_from_slice(&ds.data_offset.to_le_bytes());
                    out.extend_from_slice(&ds.data_len.to_le_bytes());
                }
            }
            out.extend_from_slice(&(obj.attrs.len() as u16).to_le_bytes());
            for attr in &obj.attrs {
                put_str(&mut out, &attr.name);
                put_dtype(&mut out, &attr.dtype);
                match attr.extent {
                    None => out.push(0),
                    Some(n) => {
                        out.push(1);
                        out.extend_from_slice(&n.to_le_bytes());
                    }
                }
                out.extend_from_slice(&(attr.payload.len() as u64).to_le_bytes());
                out.extend_from_slice(&attr.payload);
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> ByteReader<'a> {
        ByteReader { buf, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::StorageFailure("corrupt directory: unexpected end".into()))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.bytes(2)?.try_into().expect("sized")))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.bytes(4)?.try_into().expect("sized")))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.bytes(8)?.try_into().expect("sized")))
    }

    fn str(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let raw = self.bytes(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| Error::StorageFailure("corrupt directory: invalid utf-8 path".into()))
    }

    fn dtype(&mut self) -> Result<Datatype> {
        let class = match self.u8()? {
            0 => TypeClass::Integer,
            1 => TypeClass::Float,
            2 => TypeClass::String,
            other => {
                return Err(Error::StorageFailure(format!(
                    "corrupt directory: unknown type class {}",
                    other
                )));
            }
        };
        let size = self.u32()? as usize;
        let flags = self.u8()?;
        Ok(Datatype::from_parts(class, size, flags))
    }
}

impl Directory {
    pub fn decode(bytes: &[u8]) -> Result<Directory> {
        let mut r = ByteReader::new(bytes);
        let count = r.u32()? as usize;
        let mut objects = Vec::with_capacity(count);
        for _ in 0..count {
            let path = r.str()?;
            let dataset = match r.u8()? {
                0 => None,
                1 => {
                    let dtype = r.dtype()?;
                    let rank = r.u8()? as usize;
                    let mut dims = Vec::with_capacity(rank);
                    for _ in 0..rank {
                        dims.push(r.u64()?);
                    }
                    let chunk = r.u64()?;
                    let data_offset = r.u64()?;
                    let data_len = r.u64()?;
                    Some(DatasetMeta {
                        dtype,
                        dims,
                        chunk_dim: (chunk != 0).then_some(chunk),
                        data_offset,
                        data_len,
                    })
                }
                other => {
                    return Err(Error::StorageFailure(format!(
                        "corrupt directory: unknown object kind {}",
                        other
                    )));
                }
            };
            let attr_count = r.u16()? as usize;
            let mut attrs = Vec::with_capacity(attr_count);
            for _ in 0..attr_count {
                let name = r.str()?;
                let dtype = r.dtype()?;
                let extent = match r.u8()? {
                    0 => None,
                    _ => Some(r.u64()?),
                };
                let payload_len = r.u64()? as usize;
                let payload = r.bytes(payload_len)?.to_vec();
                attrs.push(AttrMeta {
                    name,
                    dtype,
                    extent,
                    payload,
                });
            }
            objects.push(ObjectEntry {
                path,
                dataset,
                attrs,
            });
        }
        Ok(Directory { objects })
    }
}
