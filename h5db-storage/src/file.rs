//! File and object handles.

use crate::attribute::Attribute;
use crate::dataset::Dataset;
use crate::datatype::Datatype;
use crate::format::{Directory, HEADER_LEN, MAGIC, VERSION};
use crate::lock::probes_are_quiet;
use h5db_result::{Error, Result};
use memmap2::Mmap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

pub(crate) struct FileCore {
    pub(crate) map: Mmap,
    pub(crate) directory: Directory,
    pub(crate) path: PathBuf,
}

impl FileCore {
    pub(crate) fn data_slice(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let start = offset as usize;
        let end = start
            .checked_add(len as usize)
            .filter(|&end| end <= self.map.len())
            .ok_or_else(|| {
                Error::StorageFailure(format!(
                    "data region [{}, {}) out of bounds in {}",
                    offset,
                    offset + len,
                    self.path.display()
                ))
            })?;
        Ok(&self.map[start..end])
    }
}

/// Read-only handle to an open container file.
///
/// Cloning is cheap and refers to the same open file; the mapping is released
/// when the last handle drops.
#[derive(Clone)]
pub struct File {
    core: Arc<FileCore>,
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("path", &self.core.path)
            .finish()
    }
}

/// Kind of a stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Group,
    Dataset,
}

/// Summary of one object, as yielded by [`File::objects`].
#[derive(Clone, Debug)]
pub struct ObjectInfo {
    pub path: String,
    pub kind: ObjectKind,
    pub dtype: Option<Datatype>,
    pub shape: Vec<u64>,
}

/// Handle to a group or dataset, used for attribute access.
pub struct Object {
    pub(crate) core: Arc<FileCore>,
    pub(crate) index: usize,
}

pub(crate) fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

impl File {
    /// Open a container file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<File> {
        let path = path.as_ref();
        Self::try_open(path).inspect_err(|err| {
            if !probes_are_quiet() {
                warn!(path = %path.display(), %err, "file open failed");
            }
        })
    }

    fn try_open(path: &Path) -> Result<File> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::OpenFailure(format!("failed to open file: {}: {}", path.display(), e)))?;
        // SAFETY: the mapping is read-only and the format is only produced by
        // this library's writer; truncating or rewriting a mapped file while a
        // reader holds it open is outside the supported usage, the same
        // contract the modeled scientific-data libraries impose.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::OpenFailure(format!("failed to map file: {}: {}", path.display(), e)))?;

        if map.len() < HEADER_LEN || map[0..4] != MAGIC {
            return Err(Error::OpenFailure(format!(
                "not an h5db container file: {}",
                path.display()
            )));
        }
        let version = u32::from_le_bytes(map[4..8].try_into().expect("sized"));
        if version != VERSION {
            return Err(Error::OpenFailure(format!(
                "unsupported container version {} in {}",
                version,
                path.display()
            )));
        }
        let dir_offset = u64::from_le_bytes(map[8..16].try_into().expect("sized")) as usize;
        let dir_len = u64::from_le_bytes(map[16..24].try_into().expect("sized")) as usize;
        let dir_end = dir_offset
            .checked_add(dir_len)
            .filter(|&end| end <= map.len())
            .ok_or_else(|| {
                Error::StorageFailure(format!("corrupt directory bounds in {}", path.display()))
            })?;
        let directory = Directory::decode(&map[dir_offset..dir_end])?;

        Ok(File {
            core: Arc::new(FileCore {
                map,
                directory,
                path: path.to_path_buf(),
            }),
        })
    }

    /// Path this handle was opened from.
    pub fn path(&self) -> &Path {
        &self.core.path
    }

    /// Open a dataset by path.
    pub fn dataset(&self, path: &str) -> Result<Dataset> {
        let normalized = normalize_path(path);
        match self.core.directory.find(&normalized) {
            Some((index, entry)) if entry.dataset.is_some() => Ok(Dataset {
                core: Arc::clone(&self.core),
                index,
            }),
            _ => {
                let err = Error::OpenFailure(format!("failed to open dataset: {}", path));
                if !probes_are_quiet() {
                    warn!(path, file = %self.core.path.display(), "dataset open failed");
                }
                Err(err)
            }
        }
    }

    /// Open a group or dataset by path for attribute access.
    pub fn object(&self, path: &str) -> Result<Object> {
        let normalized = normalize_path(path);
        match self.core.directory.find(&normalized) {
            Some((index, _)) => Ok(Object {
                core: Arc::clone(&self.core),
                index,
            }),
            None => {
                let err = Error::OpenFailure(format!("failed to open object: {}", path));
                if !probes_are_quiet() {
                    warn!(path, file = %self.core.path.display(), "object open failed");
                }
                Err(err)
            }
        }
    }

    /// Visit every stored object in path order.
    pub fn objects(&self) -> Vec<ObjectInfo> {
        self.core
            .directory
            .objects
            .iter()
            .map(|entry| match &entry.dataset {
                Some(meta) => ObjectInfo {
                    path: entry.path.clone(),
                    kind: ObjectKind::Dataset,
                    dtype: Some(meta.dtype.clone()),
                    shape: meta.dims.clone(),
                },
                None => ObjectInfo {
                    path: entry.path.clone(),
                    kind: ObjectKind::Group,
                    dtype: None,
                    shape: Vec::new(),
                },
            })
            .collect()
    }
}

impl Object {
    /// Path of this object.
    pub fn path(&self) -> &str {
        &self.core.directory.objects[self.index].path
    }

    /// Attributes of this object in name order.
    pub fn attributes(&self) -> Vec<Attribute> {
        self.core.directory.objects[self.index]
            .attrs
            .iter()
            .map(Attribute::from_meta)
            .collect()
    }

    /// Open a single attribute by name.
    pub fn attribute(&self, name: &str) -> Result<Attribute> {
        self.core.directory.objects[self.index]
            .attrs
            .iter()
            .find(|a| a.name == name)
            .map(Attribute::from_meta)
            .ok_or_else(|| Error::OpenFailure(format!("failed to open attribute: {}", name)))
    }
}
