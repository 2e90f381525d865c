//! The `attributes` table function: a single-row relation of one object's
//! attributes, one column per attribute in iteration order.

use arrow::array::{ArrayRef, FixedSizeListArray, PrimitiveArray, StringArray};
use arrow::datatypes::{Field, Schema, SchemaRef};
use h5db_result::{Error, Result};
use h5db_scan::column::{ElementKind, LogicalType, NumericElement};
use h5db_scan::{DataChunk, Vector};
use h5db_storage::{Attribute, File};
use std::sync::Arc;

/// Bound `attributes` invocation. The single output row is materialized at
/// bind time; `next_chunk` hands it out once.
#[derive(Debug)]
pub struct AttributesScan {
    fields: Vec<Field>,
    columns: Vec<ArrayRef>,
    done: bool,
}

/// Open the object and decode every attribute into a one-row column.
///
/// Scalar numerics and strings map to primitives; 1-D array attributes map
/// to fixed-size lists. Objects without attributes and attribute shapes
/// outside that set are errors.
pub fn attributes(filename: &str, object_path: &str) -> Result<AttributesScan> {
    let _storage = h5db_storage::lock();
    let file = {
        let _quiet = h5db_storage::suppressed();
        File::open(filename)?
    };
    let object = file.object(object_path)?;
    let attrs = object.attributes();
    if attrs.is_empty() {
        return Err(Error::DomainError(format!(
            "object has no attributes: {}",
            object_path
        )));
    }

    let mut fields = Vec::with_capacity(attrs.len());
    let mut columns = Vec::with_capacity(attrs.len());
    for attr in &attrs {
        let kind = ElementKind::from_datatype(attr.dtype()).map_err(|_| {
            Error::UnsupportedType(format!(
                "attribute '{}' has an unsupported type",
                attr.name()
            ))
        })?;
        let (logical, array) = match (attr.extent(), kind) {
            (None, ElementKind::Utf8) => {
                let value = attr.read_string()?;
                (
                    LogicalType::Primitive(ElementKind::Utf8),
                    Arc::new(StringArray::from(vec![value])) as ArrayRef,
                )
            }
            (None, kind) => (
                LogicalType::Primitive(kind),
                h5db_scan::dispatch_numeric!(kind, scalar_attr_array(attr))?,
            ),
            (Some(_), ElementKind::Utf8) => {
                return Err(Error::UnsupportedType(format!(
                    "attribute '{}' has an unsupported string-array shape",
                    attr.name()
                )));
            }
            (Some(len), kind) => (
                LogicalType::FixedList {
                    child: Box::new(LogicalType::Primitive(kind)),
                    len: len as usize,
                },
                h5db_scan::dispatch_numeric!(kind, array_attr_array(attr, len))?,
            ),
        };
        fields.push(Field::new(attr.name(), logical.to_arrow(), true));
        columns.push(array);
    }

    Ok(AttributesScan {
        fields,
        columns,
        done: false,
    })
}

fn scalar_attr_array<T: NumericElement>(attr: &Attribute) -> Result<ArrayRef> {
    let value: T = attr.read_scalar()?;
    Ok(Arc::new(PrimitiveArray::<T::ArrowType>::from_iter_values([
        value,
    ])))
}

fn array_attr_array<T: NumericElement>(attr: &Attribute, len: u64) -> Result<ArrayRef> {
    let values: Vec<T> = attr.read_vec()?;
    let inner: ArrayRef = Arc::new(PrimitiveArray::<T::ArrowType>::from_iter_values(values));
    let field = Arc::new(Field::new("item", inner.data_type().clone(), true));
    Ok(Arc::new(FixedSizeListArray::try_new(
        field,
        len as i32,
        inner,
        None,
    )?))
}

impl AttributesScan {
    pub fn schema(&self) -> SchemaRef {
        Arc::new(Schema::new(self.fields.clone()))
    }

    /// Hand out the single row, then report exhaustion.
    pub fn next_chunk(&mut self) -> Option<DataChunk> {
        if self.done {
            return None;
        }
        self.done = true;
        Some(DataChunk {
            columns: self
                .columns
                .iter()
                .map(|array| Vector::Flat(array.clone()))
                .collect(),
            num_rows: 1,
        })
    }
}
