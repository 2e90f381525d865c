//! Container-file writer, used for fixtures and tooling.
//!
//! The scan path never writes; this builder exists so tests and data-prep
//! tools can produce files the reader understands.

use crate::datatype::{Datatype, Element};
use crate::file::normalize_path;
use crate::format::{
    AttrMeta, DatasetMeta, Directory, HEADER_LEN, MAGIC, ObjectEntry, VERSION,
};
use h5db_result::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;

struct PendingDataset {
    dtype: Datatype,
    dims: Vec<u64>,
    chunk_dim: Option<u64>,
    payload: Vec<u8>,
}

#[derive(Default)]
struct PendingObject {
    dataset: Option<PendingDataset>,
    attrs: Vec<AttrMeta>,
}

/// Assembles a container file in memory and writes it in one shot.
///
/// Intermediate groups are created automatically, so adding `/a/b/x` also
/// creates groups `/a` and `/a/b`.
#[derive(Default)]
pub struct FileBuilder {
    objects: BTreeMap<String, PendingObject>,
}

impl FileBuilder {
    pub fn new() -> FileBuilder {
        FileBuilder::default()
    }

    fn ensure_parents(&mut self, path: &str) {
        let mut end = 0;
        while let Some(next) = path[end + 1..].find('/') {
            end += next + 1;
            let parent = &path[..end];
            self.objects.entry(parent.to_string()).or_default();
        }
    }

    fn insert_object(&mut self, path: &str, dataset: Option<PendingDataset>) -> Result<&mut Self> {
        let path = normalize_path(path);
        if path == "/" || path.ends_with('/') {
            return Err(Error::DomainError(format!("invalid object path: {}", path)));
        }
        self.ensure_parents(&path);
        let entry = self.objects.entry(path.clone()).or_default();
        if dataset.is_some() {
            if entry.dataset.is_some() {
                return Err(Error::DomainError(format!("duplicate dataset: {}", path)));
            }
            entry.dataset = dataset;
        }
        Ok(self)
    }

    /// Add an (empty) group.
    pub fn group(&mut self, path: &str) -> Result<&mut Self> {
        self.insert_object(path, None)
    }

    /// Add a numeric dataset with the given extent; `values` must hold
    /// exactly the product of `dims` elements.
    pub fn dataset<T: Element>(&mut self, path: &str, dims: &[u64], values: &[T]) -> Result<&mut Self> {
        self.dataset_inner(path, dims, None, values)
    }

    /// Like [`FileBuilder::dataset`] but recording a chunked layout with the
    /// given first-dimension extent.
    pub fn chunked_dataset<T: Element>(
        &mut self,
        path: &str,
        dims: &[u64],
        chunk_dim: u64,
        values: &[T],
    ) -> Result<&mut Self> {
        if chunk_dim == 0 {
            return Err(Error::DomainError(format!(
                "chunk extent for {} must be non-zero",
                path
            )));
        }
        self.dataset_inner(path, dims, Some(chunk_dim), values)
    }

    fn dataset_inner<T: Element>(
        &mut self,
        path: &str,
        dims: &[u64],
        chunk_dim: Option<u64>,
        values: &[T],
    ) -> Result<&mut Self> {
        let expected: u64 = dims.iter().product();
        if values.len() as u64 != expected {
            return Err(Error::DomainError(format!(
                "dataset {} has {} values but dims {:?} require {}",
                path,
                values.len(),
                dims,
                expected
            )));
        }
        let mut payload = Vec::with_capacity(values.len() * T::DTYPE.size());
        for &v in values {
            v.write_le(&mut payload);
        }
        self.insert_object(
            path,
            Some(PendingDataset {
                dtype: T::DTYPE,
                dims: dims.to_vec(),
                chunk_dim,
                payload,
            }),
        )
    }

    /// Add a rank-0 (scalar) numeric dataset.
    pub fn scalar_dataset<T: Element>(&mut self, path: &str, value: T) -> Result<&mut Self> {
        self.dataset_inner(path, &[], None, &[value])
    }

    /// Add a 1-D variable-length string dataset.
    pub fn string_dataset(&mut self, path: &str, values: &[&str]) -> Result<&mut Self> {
        let mut payload = Vec::new();
        let mut offset = 0u64;
        offset.write_le(&mut payload);
        for v in values {
            offset += v.len() as u64;
            offset.write_le(&mut payload);
        }
        for v in values {
            payload.extend_from_slice(v.as_bytes());
        }
        self.insert_object(
            path,
            Some(PendingDataset {
                dtype: Datatype::var_str(),
                dims: vec![values.len() as u64],
                chunk_dim: None,
                payload,
            }),
        )
    }

    /// Add a 1-D fixed-length string dataset; entries longer than `width`
    /// are rejected, shorter ones are NUL padded.
    pub fn fixed_string_dataset(
        &mut self,
        path: &str,
        width: usize,
        values: &[&str],
    ) -> Result<&mut Self> {
        let mut payload = vec![0u8; values.len() * width];
        for (i, v) in values.iter().enumerate() {
            if v.len() > width {
                return Err(Error::DomainError(format!(
                    "string {:?} exceeds fixed width {} in dataset {}",
                    v, width, path
                )));
            }
            payload[i * width..i * width + v.len()].copy_from_slice(v.as_bytes());
        }
        self.insert_object(
            path,
            Some(PendingDataset {
                dtype: Datatype::fixed_str(width),
                dims: vec![values.len() as u64],
                chunk_dim: None,
                payload,
            }),
        )
    }

    fn attach_attr(&mut self, object: &str, attr: AttrMeta) -> Result<&mut Self> {
        let path = normalize_path(object);
        let entry = self.objects.get_mut(&path).ok_or_else(|| {
            Error::DomainError(format!("no such object for attribute: {}", object))
        })?;
        entry.attrs.push(attr);
        Ok(self)
    }

    /// Attach a scalar numeric attribute to an existing object.
    pub fn attr<T: Element>(&mut self, object: &str, name: &str, value: T) -> Result<&mut Self> {
        let mut payload = Vec::with_capacity(T::DTYPE.size());
        value.write_le(&mut payload);
        self.attach_attr(
            object,
            AttrMeta {
                name: name.to_string(),
                dtype: T::DTYPE,
                extent: None,
                payload,
            },
        )
    }

    /// Attach a 1-D numeric array attribute to an existing object.
    pub fn attr_array<T: Element>(
        &mut self,
        object: &str,
        name: &str,
        values: &[T],
    ) -> Result<&mut Self> {
        let mut payload = Vec::with_capacity(values.len() * T::DTYPE.size());
        for &v in values {
            v.write_le(&mut payload);
        }
        self.attach_attr(
            object,
            AttrMeta {
                name: name.to_string(),
                dtype: T::DTYPE,
                extent: Some(values.len() as u64),
                payload,
            },
        )
    }

    /// Attach a scalar string attribute to an existing object.
    pub fn attr_str(&mut self, object: &str, name: &str, value: &str) -> Result<&mut Self> {
        self.attach_attr(
            object,
            AttrMeta {
                name: name.to_string(),
                dtype: Datatype::var_str(),
                extent: None,
                payload: value.as_bytes().to_vec(),
            },
        )
    }

    /// Serialize and write the container file.
    pub fn write(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = vec![0u8; HEADER_LEN];
        let mut entries = Vec::with_capacity(self.objects.len());

        for (obj_path, pending) in &mut self.objects {
            // Attributes are reported in name order.
            pending.attrs.sort_by(|a, b| a.name.cmp(&b.name));
            let dataset = pending.dataset.as_ref().map(|ds| {
                let data_offset = out.len() as u64;
                out.extend_from_slice(&ds.payload);
                DatasetMeta {
                    dtype: ds.dtype.clone(),
                    dims: ds.dims.clone(),
                    chunk_dim: ds.chunk_dim,
                    data_offset,
                    data_len: ds.payload.len() as u64,
                }
            });
            entries.push(ObjectEntry {
                path: obj_path.clone(),
                dataset,
                attrs: pending.attrs.clone(),
            });
        }

        let directory = Directory { objects: entries };
        let dir_offset = out.len() as u64;
        let encoded = directory.encode();
        let dir_len = encoded.len() as u64;
        out.extend_from_slice(&encoded);

        out[0..4].copy_from_slice(&MAGIC);
        out[4..8].copy_from_slice(&VERSION.to_le_bytes());
        out[8..16].copy_from_slice(&dir_offset.to_le_bytes());
        out[16..24].copy_from_slice(&dir_len.to_le_bytes());

        std::fs::write(path, out)?;
        Ok(())
    }
}
