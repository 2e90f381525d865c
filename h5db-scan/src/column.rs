//! Column specifications and runtime state.
//!
//! Every table column is either *regular* (backed by one dataset, rank 1–4)
//! or *run-start encoded* (backed by a `run_starts`/`values` dataset pair).
//! The variant is decided once at bind time; scan-time code discriminates
//! once per chunk per column, then once more on the element kind, so all hot
//! loops run monomorphized.

use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Field, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type,
    Int64Type, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use h5db_expr::FromLiteral;
use h5db_result::{Error, Result};
use h5db_storage::{Dataset, Dataspace, Datatype, Element, TypeClass};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::cache::ChunkCache;

/// The eleven supported logical element kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
}

impl ElementKind {
    /// Map a stored datatype onto its logical element kind.
    pub fn from_datatype(dtype: &Datatype) -> Result<ElementKind> {
        match dtype.class() {
            TypeClass::Integer => match (dtype.size(), dtype.is_signed()) {
                (1, true) => Ok(ElementKind::Int8),
                (2, true) => Ok(ElementKind::Int16),
                (4, true) => Ok(ElementKind::Int32),
                (8, true) => Ok(ElementKind::Int64),
                (1, false) => Ok(ElementKind::UInt8),
                (2, false) => Ok(ElementKind::UInt16),
                (4, false) => Ok(ElementKind::UInt32),
                (8, false) => Ok(ElementKind::UInt64),
                (size, signed) => Err(Error::UnsupportedType(format!(
                    "unsupported {} integer size: {} bytes",
                    if signed { "signed" } else { "unsigned" },
                    size
                ))),
            },
            TypeClass::Float => match dtype.size() {
                4 => Ok(ElementKind::Float32),
                8 => Ok(ElementKind::Float64),
                size => Err(Error::UnsupportedType(format!(
                    "unsupported float size: {} bytes",
                    size
                ))),
            },
            TypeClass::String => Ok(ElementKind::Utf8),
        }
    }

    pub fn to_arrow(self) -> DataType {
        match self {
            ElementKind::Int8 => DataType::Int8,
            ElementKind::Int16 => DataType::Int16,
            ElementKind::Int32 => DataType::Int32,
            ElementKind::Int64 => DataType::Int64,
            ElementKind::UInt8 => DataType::UInt8,
            ElementKind::UInt16 => DataType::UInt16,
            ElementKind::UInt32 => DataType::UInt32,
            ElementKind::UInt64 => DataType::UInt64,
            ElementKind::Float32 => DataType::Float32,
            ElementKind::Float64 => DataType::Float64,
            ElementKind::Utf8 => DataType::Utf8,
        }
    }

    #[inline]
    pub fn is_string(self) -> bool {
        self == ElementKind::Utf8
    }
}

/// Logical output type of a column: a primitive, or nested fixed-size lists
/// for multi-dimensional regular datasets (outermost dimension is the row
/// axis).
#[derive(Clone, Debug, PartialEq)]
pub enum LogicalType {
    Primitive(ElementKind),
    FixedList { child: Box<LogicalType>, len: usize },
}

impl LogicalType {
    /// Build the nested array type for a dataset extent, innermost dimension
    /// first.
    pub fn from_dims(base: ElementKind, dims: &[u64]) -> LogicalType {
        let mut ty = LogicalType::Primitive(base);
        for &d in dims[1..].iter().rev() {
            ty = LogicalType::FixedList {
                child: Box::new(ty),
                len: d as usize,
            };
        }
        ty
    }

    pub fn to_arrow(&self) -> DataType {
        match self {
            LogicalType::Primitive(kind) => kind.to_arrow(),
            LogicalType::FixedList { child, len } => DataType::FixedSizeList(
                Arc::new(Field::new("item", child.to_arrow(), true)),
                *len as i32,
            ),
        }
    }

    pub fn base_kind(&self) -> ElementKind {
        match self {
            LogicalType::Primitive(kind) => *kind,
            LogicalType::FixedList { child, .. } => child.base_kind(),
        }
    }
}

/// Numeric element types with an Arrow counterpart.
///
/// Implementors are exactly the ten numeric [`ElementKind`]s; strings take
/// separate, non-generic paths.
pub trait NumericElement: Element + FromLiteral + PartialOrd + Send + Sync + 'static {
    const KIND: ElementKind;
    type ArrowType: ArrowPrimitiveType<Native = Self>;
}

macro_rules! impl_numeric_element {
    ($($ty:ty => $kind:ident, $arrow:ty),+ $(,)?) => {
        $(
            impl NumericElement for $ty {
                const KIND: ElementKind = ElementKind::$kind;
                type ArrowType = $arrow;
            }
        )+
    };
}

impl_numeric_element!(
    i8 => Int8, Int8Type,
    i16 => Int16, Int16Type,
    i32 => Int32, Int32Type,
    i64 => Int64, Int64Type,
    u8 => UInt8, UInt8Type,
    u16 => UInt16, UInt16Type,
    u32 => UInt32, UInt32Type,
    u64 => UInt64, UInt64Type,
    f32 => Float32, Float32Type,
    f64 => Float64, Float64Type,
);

/// Invoke `$func::<K>(args…)` with the concrete numeric type `K` selected by
/// an [`ElementKind`] value.
///
/// This is the single centralized element-type switch: every typed hot loop
/// is a generic function instantiated through it, so the compiler sees fully
/// monomorphic bodies. String columns must be dispatched before reaching it.
#[macro_export]
macro_rules! dispatch_numeric {
    ($kind:expr, $func:ident ( $($args:expr),* $(,)? )) => {{
        match $kind {
            $crate::column::ElementKind::Int8 => $func::<i8>($($args),*),
            $crate::column::ElementKind::Int16 => $func::<i16>($($args),*),
            $crate::column::ElementKind::Int32 => $func::<i32>($($args),*),
            $crate::column::ElementKind::Int64 => $func::<i64>($($args),*),
            $crate::column::ElementKind::UInt8 => $func::<u8>($($args),*),
            $crate::column::ElementKind::UInt16 => $func::<u16>($($args),*),
            $crate::column::ElementKind::UInt32 => $func::<u32>($($args),*),
            $crate::column::ElementKind::UInt64 => $func::<u64>($($args),*),
            $crate::column::ElementKind::Float32 => $func::<f32>($($args),*),
            $crate::column::ElementKind::Float64 => $func::<f64>($($args),*),
            $crate::column::ElementKind::Utf8 => {
                panic!("numeric dispatch invoked on a string column")
            }
        }
    }};
}

/// Typed storage for decoded run values.
#[derive(Clone, Debug)]
pub enum TypedValues {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Utf8(Vec<String>),
}

impl TypedValues {
    pub fn len(&self) -> usize {
        match self {
            TypedValues::Int8(v) => v.len(),
            TypedValues::Int16(v) => v.len(),
            TypedValues::Int32(v) => v.len(),
            TypedValues::Int64(v) => v.len(),
            TypedValues::UInt8(v) => v.len(),
            TypedValues::UInt16(v) => v.len(),
            TypedValues::UInt32(v) => v.len(),
            TypedValues::UInt64(v) => v.len(),
            TypedValues::Float32(v) => v.len(),
            TypedValues::Float64(v) => v.len(),
            TypedValues::Utf8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Access the typed slice held by a [`TypedValues`].
pub trait TypedSlice: Sized {
    fn from_vec(values: Vec<Self>) -> TypedValues;
    fn slice(values: &TypedValues) -> Option<&[Self]>;
}

macro_rules! impl_typed_slice {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl TypedSlice for $ty {
                fn from_vec(values: Vec<Self>) -> TypedValues {
                    TypedValues::$variant(values)
                }

                fn slice(values: &TypedValues) -> Option<&[Self]> {
                    match values {
                        TypedValues::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )+
    };
}

impl_typed_slice!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => Utf8,
);

/// Immutable description of a regular column, fixed at bind time.
#[derive(Clone, Debug)]
pub struct RegularColumnSpec {
    pub path: String,
    pub column_name: String,
    pub element_kind: ElementKind,
    pub logical_type: LogicalType,
    /// Owned storage-type handle captured at bind time.
    pub dtype: Datatype,
    pub rank: usize,
    pub dims: Vec<u64>,
    /// Bytes per logical row, inner dimensions included.
    pub element_size: usize,
    pub is_string: bool,
}

/// Immutable description of a run-start-encoded column, fixed at bind time.
#[derive(Clone, Debug)]
pub struct RseColumnSpec {
    pub run_starts_path: String,
    pub values_path: String,
    pub column_name: String,
    pub element_kind: ElementKind,
    pub logical_type: LogicalType,
    pub run_starts_dtype: Datatype,
    pub values_dtype: Datatype,
}

/// A bound column: regular or run-start encoded.
#[derive(Clone, Debug)]
pub enum ColumnSpec {
    Regular(RegularColumnSpec),
    Rse(RseColumnSpec),
}

impl ColumnSpec {
    pub fn name(&self) -> &str {
        match self {
            ColumnSpec::Regular(spec) => &spec.column_name,
            ColumnSpec::Rse(spec) => &spec.column_name,
        }
    }

    pub fn logical_type(&self) -> &LogicalType {
        match self {
            ColumnSpec::Regular(spec) => &spec.logical_type,
            ColumnSpec::Rse(spec) => &spec.logical_type,
        }
    }

    pub fn is_rse(&self) -> bool {
        matches!(self, ColumnSpec::Rse(_))
    }
}

/// Per-scan state of a regular column.
pub struct RegularColumnState {
    pub dataset: Dataset,
    /// Cached file dataspace, reused across chunks. Selections are mutated
    /// under the storage lock, which also serializes the enclosing read.
    pub file_space: Mutex<Dataspace>,
    pub cache: Option<ChunkCache>,
}

/// Per-scan state of an RSE column. There is no mutable cursor: lookups are
/// binary-searched per chunk, which keeps materialization callable from any
/// worker.
pub struct RseColumnState {
    pub run_starts: Vec<u64>,
    pub values: TypedValues,
}

/// Runtime state for a column, parallel to [`ColumnSpec`].
pub enum ColumnState {
    Regular(RegularColumnState),
    Rse(RseColumnState),
}

impl std::fmt::Debug for ColumnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnState::Regular(_) => f.write_str("ColumnState::Regular(..)"),
            ColumnState::Rse(_) => f.write_str("ColumnState::Rse(..)"),
        }
    }
}
