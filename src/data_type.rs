//! Element data types.
//!
//! Numeric elements of every [`DataType`] are held in `f64` blocks, so the data type records the
//! logical type of the elements: it governs casting, promotion in binary operations, the default
//! fill value and byte-size estimates used for chunking.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A data type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
#[rustfmt::skip]
pub enum DataType {
    /// `bool` Boolean.
    #[display("bool")]
    Bool,
    /// `int8` Integer in `[-2^7, 2^7-1]`.
    #[display("int8")]
    Int8,
    /// `int16` Integer in `[-2^15, 2^15-1]`.
    #[display("int16")]
    Int16,
    /// `int32` Integer in `[-2^31, 2^31-1]`.
    #[display("int32")]
    Int32,
    /// `int64` Integer in `[-2^63, 2^63-1]`.
    #[display("int64")]
    Int64,
    /// `uint8` Integer in `[0, 2^8-1]`.
    #[display("uint8")]
    UInt8,
    /// `uint16` Integer in `[0, 2^16-1]`.
    #[display("uint16")]
    UInt16,
    /// `uint32` Integer in `[0, 2^32-1]`.
    #[display("uint32")]
    UInt32,
    /// `uint64` Integer in `[0, 2^64-1]`.
    #[display("uint64")]
    UInt64,
    /// `float32` IEEE 754 single-precision floating point.
    #[display("float32")]
    Float32,
    /// `float64` IEEE 754 double-precision floating point.
    #[display("float64")]
    Float64,
    /// A UTF-8 encoded string.
    #[display("string")]
    String,
}

/// An unsupported data type error.
#[derive(Debug, Error, From)]
#[error("unsupported data type {_0}")]
pub struct UnsupportedDataTypeError(String);

impl DataType {
    /// Create a data type from its name, e.g. `"int32"`.
    ///
    /// # Errors
    /// Returns [`UnsupportedDataTypeError`] if `name` is not a known data type.
    pub fn from_name(name: &str) -> Result<Self, UnsupportedDataTypeError> {
        Ok(match name {
            "bool" => Self::Bool,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::UInt8,
            "uint16" => Self::UInt16,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "string" | "str" => Self::String,
            _ => return Err(UnsupportedDataTypeError(name.to_string())),
        })
    }

    /// Returns the size in bytes of an element.
    ///
    /// Strings are variable sized, for which a nominal 8 bytes is returned for chunk size estimates.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::String => 8,
        }
    }

    /// Returns true if the data type is boolean.
    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    /// Returns true if the data type is a signed or unsigned integer.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    /// Returns true if the data type is a floating point type.
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Returns true if elements are numbers (including booleans).
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        !matches!(self, Self::String)
    }

    const fn is_unsigned(&self) -> bool {
        matches!(
            self,
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64
        )
    }

    /// The smallest data type to which both `self` and `other` can be safely cast.
    ///
    /// Returns [`None`] if a string is combined with a numeric type.
    #[must_use]
    pub fn promote(&self, other: &Self) -> Option<Self> {
        use DataType as D;
        let (a, b) = (*self, *other);
        if a == b {
            return Some(a);
        }
        match (a, b) {
            (D::String, _) | (_, D::String) => None,
            (D::Bool, x) | (x, D::Bool) => Some(x),
            (D::Float64, _) | (_, D::Float64) => Some(D::Float64),
            (D::Float32, x) | (x, D::Float32) => {
                if x.size() <= 2 {
                    Some(D::Float32)
                } else {
                    Some(D::Float64)
                }
            }
            (x, y) if x.is_unsigned() == y.is_unsigned() => {
                Some(if x.size() >= y.size() { x } else { y })
            }
            (x, y) => {
                let (signed, unsigned) = if x.is_unsigned() { (y, x) } else { (x, y) };
                if signed.size() > unsigned.size() {
                    Some(signed)
                } else {
                    match unsigned.size() {
                        1 => Some(D::Int16),
                        2 => Some(D::Int32),
                        4 => Some(D::Int64),
                        _ => Some(D::Float64),
                    }
                }
            }
        }
    }

    /// Cast a numeric value to the range and precision of this data type.
    ///
    /// Integers truncate towards zero and saturate at their bounds, NaN casts to zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn cast(&self, value: f64) -> f64 {
        match self {
            Self::Bool => f64::from(u8::from(value != 0.0)),
            Self::Int8 => saturating_cast::<i8>(value),
            Self::Int16 => saturating_cast::<i16>(value),
            Self::Int32 => saturating_cast::<i32>(value),
            Self::Int64 => saturating_cast::<i64>(value),
            Self::UInt8 => saturating_cast::<u8>(value),
            Self::UInt16 => saturating_cast::<u16>(value),
            Self::UInt32 => saturating_cast::<u32>(value),
            Self::UInt64 => saturating_cast::<u64>(value),
            Self::Float32 => f64::from(value as f32),
            Self::Float64 | Self::String => value,
        }
    }
}

/// Truncate `value` towards zero and saturate at the bounds of `T`.
fn saturating_cast<T: num::Bounded + num::ToPrimitive>(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    let lower = T::min_value().to_f64().unwrap_or(f64::MIN);
    let upper = T::max_value().to_f64().unwrap_or(f64::MAX);
    value.trunc().clamp(lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_names() {
        for data_type in [
            DataType::Bool,
            DataType::Int8,
            DataType::UInt64,
            DataType::Float32,
            DataType::String,
        ] {
            assert_eq!(
                DataType::from_name(&data_type.to_string()).unwrap(),
                data_type
            );
        }
        assert!(DataType::from_name("complex64").is_err());
    }

    #[test]
    fn data_type_promotion() {
        use DataType as D;
        assert_eq!(D::Int8.promote(&D::Int32), Some(D::Int32));
        assert_eq!(D::UInt8.promote(&D::Int8), Some(D::Int16));
        assert_eq!(D::UInt32.promote(&D::Int64), Some(D::Int64));
        assert_eq!(D::UInt64.promote(&D::Int64), Some(D::Float64));
        assert_eq!(D::Float32.promote(&D::Int16), Some(D::Float32));
        assert_eq!(D::Float32.promote(&D::Int32), Some(D::Float64));
        assert_eq!(D::Bool.promote(&D::UInt8), Some(D::UInt8));
        assert_eq!(D::String.promote(&D::Float64), None);
    }

    #[test]
    fn data_type_cast() {
        assert_eq!(DataType::Int8.cast(300.7), 127.0);
        assert_eq!(DataType::Int32.cast(-2.9), -2.0);
        assert_eq!(DataType::UInt16.cast(-5.0), 0.0);
        assert_eq!(DataType::Bool.cast(0.5), 1.0);
        assert_eq!(DataType::Int64.cast(f64::NAN), 0.0);
        assert_eq!(DataType::Float64.cast(0.1), 0.1);
    }
}
