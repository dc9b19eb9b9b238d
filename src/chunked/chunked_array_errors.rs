use thiserror::Error;

use crate::{
    array_subset::{ArraySubset, IncompatibleDimensionalityError},
    compressed::CompressedArrayError,
    masked_array::MaskedArrayError,
    ArrayShape,
};

use super::InvalidChunksError;

/// A chunked array error.
#[derive(Debug, Error)]
pub enum ChunkedArrayError {
    /// A masked array block error.
    #[error(transparent)]
    MaskedArray(#[from] MaskedArrayError),
    /// Invalid chunks.
    #[error(transparent)]
    InvalidChunks(#[from] InvalidChunksError),
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// A compressed source error.
    #[error(transparent)]
    Compressed(#[from] CompressedArrayError),
    /// An array subset is out of bounds.
    #[error("array subset {_0} is out of bounds of array shape {_1:?}")]
    InvalidArraySubset(ArraySubset, ArrayShape),
    /// An axis is out of bounds.
    #[error("axis {_0} is out of bounds for array of dimension {_1}")]
    InvalidAxis(usize, usize),
    /// Incompatible shapes.
    #[error("incompatible shapes {_0:?} and {_1:?}")]
    IncompatibleShapes(ArrayShape, ArrayShape),
    /// A block kernel failed.
    #[error("block kernel failed: {_0}")]
    Kernel(String),
}
