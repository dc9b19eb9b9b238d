//! Compressed arrays.
//!
//! A compressed array stores a logical array in a layout which saves space, for example discrete sampling geometries stored as ragged arrays, or land points gathered from a latitude-longitude grid.
//! The logical shape of a compressed array is its uncompressed shape.
//!
//! A compressed array implements [`CompressedArrayTraits`], whose single required capability is producing the uncompressed elements of an [`ArraySubset`].
//! [`ChunkedArray::from_compressed`] uses it to decompress lazily, one chunk at a time.

mod gathered;
mod ragged_contiguous;
mod ragged_indexed;
mod samples;

pub use gathered::GatheredArray;
pub use ragged_contiguous::RaggedContiguousArray;
pub use ragged_indexed::RaggedIndexedArray;
pub use samples::Samples;

use std::{path::Path, sync::Arc};

use derive_more::Display;
use ndarray::{ArrayD, IxDyn};
use thiserror::Error;

use crate::{
    array_subset::ArraySubset,
    chunked::ChunkedArray,
    data_type::DataType,
    masked_array::{Elements, MaskedArray, MaskedArrayError},
    ArrayShape,
};

/// A compressed array error.
#[derive(Debug, Error)]
pub enum CompressedArrayError {
    /// An invalid description of a compressed array.
    #[error("invalid compressed array: {_0}")]
    InvalidDescription(String),
    /// A subset is out of bounds of the uncompressed shape.
    #[error("subset {_0} is out of bounds of uncompressed shape {_1:?}")]
    InvalidSubset(ArraySubset, ArrayShape),
    /// An IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A masked array error.
    #[error(transparent)]
    MaskedArray(#[from] MaskedArrayError),
}

/// The type of compression of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CompressionType {
    /// Not compressed.
    #[display("")]
    None,
    /// A contiguous ragged array, with a count of the elements of each feature.
    #[display("ragged contiguous")]
    RaggedContiguous,
    /// An indexed ragged array, with the feature index of each element.
    #[display("ragged indexed")]
    RaggedIndexed,
    /// A gathered array, with the list of uncompressed positions of each element.
    #[display("gathered")]
    Gathered,
}

/// Compressed array traits.
pub trait CompressedArrayTraits: dyn_clone::DynClone + core::fmt::Debug + Send + Sync {
    /// The uncompressed shape.
    fn shape(&self) -> &[usize];

    /// The data type of the elements.
    fn data_type(&self) -> DataType;

    /// The type of compression.
    fn compression_type(&self) -> CompressionType;

    /// Return the uncompressed elements of `subset`.
    ///
    /// # Errors
    /// Returns a [`CompressedArrayError`] if `subset` is out of bounds or the samples cannot be read.
    fn subarray(&self, subset: &ArraySubset) -> Result<MaskedArray, CompressedArrayError>;

    /// The file holding the samples, if on disk.
    fn file(&self) -> Option<&Path>;

    /// Return an equivalent compressed array with the samples loaded into memory.
    ///
    /// # Errors
    /// Returns a [`CompressedArrayError`] if the samples cannot be read.
    fn to_memory(&self) -> Result<Arc<dyn CompressedArrayTraits>, CompressedArrayError>;

    /// Close any open file handle.
    fn close(&self);

    /// Return an equivalent lazy chunked array of the uncompressed elements, with chunks of at most `chunk_size` bytes.
    fn to_chunked_array(self: Arc<Self>, chunk_size: usize) -> ChunkedArray;

    /// The number of dimensions.
    fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// The number of elements.
    fn size(&self) -> usize {
        self.shape().iter().product()
    }

    /// Returns true if the samples are on disk.
    fn on_disk(&self) -> bool {
        self.file().is_some()
    }
}

dyn_clone::clone_trait_object!(CompressedArrayTraits);

/// Check that `subset` is within `shape`.
fn validate_subset(subset: &ArraySubset, shape: &[usize]) -> Result<(), CompressedArrayError> {
    if subset.dimensionality() == shape.len() && subset.inbounds(shape) {
        Ok(())
    } else {
        Err(CompressedArrayError::InvalidSubset(
            subset.clone(),
            shape.to_vec(),
        ))
    }
}

/// Build a block of `subset` from values and a mask in row-major order.
fn build_block(
    subset: &ArraySubset,
    values: Vec<f64>,
    mask: Vec<bool>,
    data_type: DataType,
) -> Result<MaskedArray, CompressedArrayError> {
    let shape = IxDyn(subset.shape());
    let shape_error = |_| {
        CompressedArrayError::InvalidSubset(subset.clone(), subset.shape().to_vec())
    };
    let values = ArrayD::from_shape_vec(shape.clone(), values).map_err(shape_error)?;
    let mask = ArrayD::from_shape_vec(shape, mask).map_err(shape_error)?;
    let values = values.mapv(|v| data_type.cast(v));
    Ok(MaskedArray::new(Elements::Numeric(values), Some(mask), data_type)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_type_names() {
        assert_eq!(CompressionType::None.to_string(), "");
        assert_eq!(
            CompressionType::RaggedContiguous.to_string(),
            "ragged contiguous"
        );
        assert_eq!(CompressionType::Gathered.to_string(), "gathered");
    }
}
