//! Fill values.
//!
//! A fill value replaces missing elements when a masked array is filled.

use serde::{Deserialize, Serialize};

use crate::{config::FillPolicy, data_type::DataType};

/// The fill value of an array.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    /// A numeric fill value.
    Numeric(f64),
    /// A text fill value.
    Text(String),
}

impl core::fmt::Display for FillValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Numeric(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for FillValue {
    fn from(value: bool) -> Self {
        Self::Numeric(f64::from(u8::from(value)))
    }
}

macro_rules! fill_value_from_lossless {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FillValue {
                fn from(value: $t) -> Self {
                    Self::Numeric(f64::from(value))
                }
            }
        )*
    };
}

fill_value_from_lossless!(u8, u16, u32, i8, i16, i32, f32, f64);

impl From<i64> for FillValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Numeric(value as f64)
    }
}

impl From<u64> for FillValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: u64) -> Self {
        Self::Numeric(value as f64)
    }
}

impl From<&str> for FillValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FillValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// The netCDF default fill value for `float` and `double` variables.
pub const NETCDF_FILL_FLOAT: f64 = 9.969_209_968_386_869e36;

impl FillValue {
    /// The netCDF default fill value of a data type.
    #[must_use]
    pub fn netcdf_default(data_type: DataType) -> Self {
        match data_type {
            DataType::Bool => Self::Numeric(0.0),
            DataType::Int8 => Self::Numeric(-127.0),
            DataType::Int16 => Self::Numeric(-32767.0),
            DataType::Int32 => Self::Numeric(-2_147_483_647.0),
            DataType::Int64 => Self::Numeric(-9.223_372_036_854_776e18),
            DataType::UInt8 => Self::Numeric(255.0),
            DataType::UInt16 => Self::Numeric(65535.0),
            DataType::UInt32 => Self::Numeric(4_294_967_295.0),
            DataType::UInt64 => Self::Numeric(1.844_674_407_370_955_2e19),
            DataType::Float32 | DataType::Float64 => Self::Numeric(NETCDF_FILL_FLOAT),
            DataType::String => Self::Text(String::new()),
        }
    }

    /// The default fill value of a data type under a [`FillPolicy`].
    #[must_use]
    pub fn default_for(data_type: DataType, policy: FillPolicy) -> Self {
        match policy {
            FillPolicy::Nan if data_type.is_float() => Self::Numeric(f64::NAN),
            FillPolicy::Nan | FillPolicy::NetcdfDefault => Self::netcdf_default(data_type),
        }
    }

    /// Returns the numeric fill value, if numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Returns the text fill value, if text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Numeric(_) => None,
            Self::Text(value) => Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_value_defaults() {
        assert_eq!(
            FillValue::netcdf_default(DataType::Int16),
            FillValue::from(-32767i16)
        );
        assert_eq!(
            FillValue::default_for(DataType::Int32, FillPolicy::Nan),
            FillValue::from(-2_147_483_647i32)
        );
        assert!(FillValue::default_for(DataType::Float32, FillPolicy::Nan)
            .as_f64()
            .unwrap()
            .is_nan());
        assert_eq!(FillValue::netcdf_default(DataType::String).as_str(), Some(""));
    }
}
