//! Element datatypes stored in container files.

use h5db_result::{Error, Result};

/// Broad class of a stored element type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeClass {
    Integer,
    Float,
    String,
}

/// Description of a stored element type.
///
/// For integers and floats `size` is the element width in bytes. For
/// fixed-length strings it is the per-entry byte width; variable-length
/// strings report the width of the stored heap reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Datatype {
    class: TypeClass,
    size: usize,
    signed: bool,
    variable: bool,
}

impl Datatype {
    pub const fn integer(size: usize, signed: bool) -> Datatype {
        Datatype {
            class: TypeClass::Integer,
            size,
            signed,
            variable: false,
        }
    }

    pub const fn float(size: usize) -> Datatype {
        Datatype {
            class: TypeClass::Float,
            size,
            signed: true,
            variable: false,
        }
    }

    pub const fn fixed_str(len: usize) -> Datatype {
        Datatype {
            class: TypeClass::String,
            size: len,
            signed: false,
            variable: false,
        }
    }

    pub const fn var_str() -> Datatype {
        Datatype {
            class: TypeClass::String,
            size: 8,
            signed: false,
            variable: true,
        }
    }

    #[inline]
    pub fn class(&self) -> TypeClass {
        self.class
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        self.class == TypeClass::String
    }

    #[inline]
    pub fn is_variable_str(&self) -> bool {
        self.class == TypeClass::String && self.variable
    }

    /// Human-readable type name (`int32`, `uint8`, `float64`, `string`).
    pub fn type_name(&self) -> String {
        match self.class {
            TypeClass::Integer => {
                let prefix = if self.signed { "int" } else { "uint" };
                format!("{}{}", prefix, self.size * 8)
            }
            TypeClass::Float => format!("float{}", self.size * 8),
            TypeClass::String => "string".to_string(),
        }
    }

    pub(crate) fn flags(&self) -> u8 {
        (self.signed as u8) | ((self.variable as u8) << 1)
    }

    pub(crate) fn from_parts(class: TypeClass, size: usize, flags: u8) -> Datatype {
        Datatype {
            class,
            size,
            signed: flags & 1 != 0,
            variable: flags & 2 != 0,
        }
    }
}

/// Native element types the library can read into and write from.
///
/// Reads convert stored values to the caller-requested implementation of this
/// trait through a widened intermediate, so e.g. `i32` run-start data can be
/// read directly as `u64`.
pub trait Element: Copy + Default + PartialOrd + Send + Sync + 'static {
    const DTYPE: Datatype;

    fn from_i128(v: i128) -> Self;
    fn from_f64(v: f64) -> Self;
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_element_int {
    ($($ty:ty => $size:expr, $signed:expr),+ $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: Datatype = Datatype::integer($size, $signed);

                #[inline]
                fn from_i128(v: i128) -> Self {
                    v as $ty
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    v as $ty
                }

                #[inline]
                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )+
    };
}

impl_element_int!(
    i8 => 1, true,
    i16 => 2, true,
    i32 => 4, true,
    i64 => 8, true,
    u8 => 1, false,
    u16 => 2, false,
    u32 => 4, false,
    u64 => 8, false,
);

macro_rules! impl_element_float {
    ($($ty:ty => $size:expr),+ $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: Datatype = Datatype::float($size);

                #[inline]
                fn from_i128(v: i128) -> Self {
                    v as $ty
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    v as $ty
                }

                #[inline]
                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )+
    };
}

impl_element_float!(f32 => 4, f64 => 8);

/// Decode `out.len()` stored elements of `dtype` from `bytes`, converting
/// each to the requested native type.
pub(crate) fn decode_elements<T: Element>(
    dtype: &Datatype,
    bytes: &[u8],
    out: &mut [T],
) -> Result<()> {
    let width = dtype.size();
    let needed = out.len() * width;
    if bytes.len() < needed {
        return Err(Error::StorageFailure(format!(
            "dataset data truncated: need {} bytes, have {}",
            needed,
            bytes.len()
        )));
    }

    macro_rules! decode_loop {
        ($src:ty, $via:ident) => {{
            const W: usize = std::mem::size_of::<$src>();
            for (i, slot) in out.iter_mut().enumerate() {
                let start = i * W;
                let raw: [u8; W] = bytes[start..start + W].try_into().expect("sized slice");
                *slot = T::$via(<$src>::from_le_bytes(raw) as _);
            }
        }};
    }

    match (dtype.class(), width, dtype.is_signed()) {
        (TypeClass::Integer, 1, true) => decode_loop!(i8, from_i128),
        (TypeClass::Integer, 2, true) => decode_loop!(i16, from_i128),
        (TypeClass::Integer, 4, true) => decode_loop!(i32, from_i128),
        (TypeClass::Integer, 8, true) => decode_loop!(i64, from_i128),
        (TypeClass::Integer, 1, false) => decode_loop!(u8, from_i128),
        (TypeClass::Integer, 2, false) => decode_loop!(u16, from_i128),
        (TypeClass::Integer, 4, false) => decode_loop!(u32, from_i128),
        (TypeClass::Integer, 8, false) => decode_loop!(u64, from_i128),
        (TypeClass::Float, 4, _) => decode_loop!(f32, from_f64),
        (TypeClass::Float, 8, _) => decode_loop!(f64, from_f64),
        (class, size, _) => {
            return Err(Error::UnsupportedType(format!(
                "unsupported element type: {:?} of {} bytes",
                class, size
            )));
        }
    }
    Ok(())
}
