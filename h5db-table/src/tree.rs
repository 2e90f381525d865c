//! The `tree` table function: one row per object in a container file.

use arrow::array::{ListBuilder, StringBuilder, UInt64Builder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use h5db_result::Result;
use h5db_scan::{DataChunk, VECTOR_SIZE, Vector};
use h5db_storage::{File, ObjectInfo, ObjectKind};
use std::sync::Arc;

/// Bound `tree` invocation streaming object rows in vector-size chunks.
pub struct TreeScan {
    objects: Vec<ObjectInfo>,
    position: usize,
    vector_size: usize,
}

/// Open the file and collect its object listing.
pub fn tree(filename: &str) -> Result<TreeScan> {
    let _storage = h5db_storage::lock();
    let file = {
        let _quiet = h5db_storage::suppressed();
        File::open(filename)?
    };
    Ok(TreeScan {
        objects: file.objects(),
        position: 0,
        vector_size: VECTOR_SIZE,
    })
}

impl TreeScan {
    /// `path`, `kind`, `dtype`, `shape` (NULL shape for groups).
    pub fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("path", DataType::Utf8, false),
            Field::new("kind", DataType::Utf8, false),
            Field::new("dtype", DataType::Utf8, false),
            Field::new(
                "shape",
                DataType::List(Arc::new(Field::new("item", DataType::UInt64, true))),
                true,
            ),
        ]))
    }

    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }

    /// Produce the next chunk of object rows, or `None` when exhausted.
    pub fn next_chunk(&mut self) -> Option<DataChunk> {
        let remaining = self.objects.len() - self.position;
        let to_process = remaining.min(self.vector_size);
        if to_process == 0 {
            return None;
        }

        let mut paths = StringBuilder::new();
        let mut kinds = StringBuilder::new();
        let mut dtypes = StringBuilder::new();
        let mut shapes = ListBuilder::new(UInt64Builder::new());

        for obj in &self.objects[self.position..self.position + to_process] {
            paths.append_value(&obj.path);
            match obj.kind {
                ObjectKind::Group => {
                    kinds.append_value("group");
                    dtypes.append_value("");
                    shapes.append_null();
                }
                ObjectKind::Dataset => {
                    kinds.append_value("dataset");
                    dtypes.append_value(
                        obj.dtype
                            .as_ref()
                            .map(|d| d.type_name())
                            .unwrap_or_default(),
                    );
                    for &dim in &obj.shape {
                        shapes.values().append_value(dim);
                    }
                    shapes.append(true);
                }
            }
        }

        self.position += to_process;
        Some(DataChunk {
            columns: vec![
                Vector::Flat(Arc::new(paths.finish())),
                Vector::Flat(Arc::new(kinds.finish())),
                Vector::Flat(Arc::new(dtypes.finish())),
                Vector::Flat(Arc::new(shapes.finish())),
            ],
            num_rows: to_process,
        })
    }
}
