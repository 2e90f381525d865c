//! Deferred-typed literal values.
//!
//! Constants arrive from the host engine before the column's element kind is
//! known, so they are held in a widened representation and narrowed with a
//! checked cast once the target column type is resolved.

use h5db_result::{Error, Result};

/// A literal value that has not yet been coerced into a specific native type.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i128),
    Float(f64),
    String(String),
}

impl Literal {
    fn kind_name(&self) -> &'static str {
        match self {
            Literal::Integer(_) => "integer",
            Literal::Float(_) => "float",
            Literal::String(_) => "string",
        }
    }
}

macro_rules! impl_from_for_literal {
    ($variant:ident, $($t:ty),*) => {
        $(
            impl From<$t> for Literal {
                fn from(v: $t) -> Self {
                    Literal::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for_literal!(Integer, i8, i16, i32, i64, i128, u8, u16, u32, u64);
impl_from_for_literal!(Float, f32, f64);

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::String(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::String(v)
    }
}

/// Native types that can be produced from a [`Literal`] with a checked cast.
pub trait FromLiteral: Sized {
    fn from_literal(lit: &Literal) -> Result<Self>;
}

macro_rules! impl_from_literal_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromLiteral for $ty {
                fn from_literal(lit: &Literal) -> Result<Self> {
                    match lit {
                        Literal::Integer(i) => <$ty>::try_from(*i).map_err(|_| {
                            Error::DomainError(format!(
                                "constant {} out of range for {} column",
                                i,
                                stringify!($ty)
                            ))
                        }),
                        other => Err(Error::DomainError(format!(
                            "cannot compare {} constant against {} column",
                            other.kind_name(),
                            stringify!($ty)
                        ))),
                    }
                }
            }
        )*
    };
}

impl_from_literal_int!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! impl_from_literal_float {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromLiteral for $ty {
                fn from_literal(lit: &Literal) -> Result<Self> {
                    match lit {
                        Literal::Integer(i) => Ok(*i as $ty),
                        Literal::Float(f) => Ok(*f as $ty),
                        Literal::String(_) => Err(Error::DomainError(format!(
                            "cannot compare string constant against {} column",
                            stringify!($ty)
                        ))),
                    }
                }
            }
        )*
    };
}

impl_from_literal_float!(f32, f64);

impl FromLiteral for String {
    fn from_literal(lit: &Literal) -> Result<Self> {
        match lit {
            Literal::String(s) => Ok(s.clone()),
            other => Err(Error::DomainError(format!(
                "cannot compare {} constant against string column",
                other.kind_name()
            ))),
        }
    }
}
