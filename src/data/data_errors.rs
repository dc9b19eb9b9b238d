use thiserror::Error;

use crate::{
    chunked::ChunkedArrayError, compressed::CompressedArrayError, data_type::UnsupportedDataTypeError,
    masked_array::MaskedArrayError, units::UnitsError,
};

/// A [`Data`](super::Data) error.
///
/// A method returning an error has not replaced any state of the array it was called on.
#[derive(Debug, Error)]
pub enum DataError {
    /// An invalid index or shape.
    #[error("index error: {_0}")]
    Index(String),
    /// Incompatible or invalid units.
    #[error(transparent)]
    Units(#[from] UnitsError),
    /// An invalid argument value.
    #[error("value error: {_0}")]
    Value(String),
    /// An operation which is not supported by the data type.
    #[error("data type error: {_0}")]
    DataType(String),
    /// An unsupported data type name.
    #[error(transparent)]
    UnsupportedDataType(#[from] UnsupportedDataTypeError),
    /// An operation which is not implemented.
    #[error("not implemented: {_0}")]
    NotImplemented(String),
    /// Implicit materialisation was refused by the compute policy.
    #[error("{_0} would compute a lazy graph which is not cheap, set the compute policy to always or enable debug to allow it")]
    Compute(&'static str),
    /// A chunked array error.
    #[error(transparent)]
    ChunkedArray(#[from] ChunkedArrayError),
    /// A compressed array error.
    #[error(transparent)]
    Compressed(#[from] CompressedArrayError),
    /// A masked array error.
    #[error(transparent)]
    MaskedArray(#[from] MaskedArrayError),
}
