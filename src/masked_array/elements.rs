use derive_more::{Display, From};
use ndarray::ArrayD;

/// The element values of a [`MaskedArray`](super::MaskedArray).
#[derive(Clone, Debug, PartialEq, From)]
pub enum Elements {
    /// Numeric elements of any numeric [`DataType`](crate::data_type::DataType).
    Numeric(ArrayD<f64>),
    /// Text elements.
    Text(ArrayD<String>),
}

impl Elements {
    /// The shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Numeric(values) => values.shape(),
            Self::Text(values) => values.shape(),
        }
    }

    /// The number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    /// Returns true if there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the elements are numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }
}

/// A single element value.
#[derive(Clone, Debug, PartialEq, PartialOrd, Display, From)]
pub enum Scalar {
    /// A numeric element.
    Numeric(f64),
    /// A text element.
    #[display("{_0:?}")]
    Text(String),
}

impl Scalar {
    /// The numeric value, if numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}
