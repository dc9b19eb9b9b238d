use std::{path::Path, sync::Arc};

use crate::{
    array_subset::ArraySubset, chunked::ChunkedArray, data_type::DataType,
    masked_array::MaskedArray, ArrayShape,
};

use super::{
    build_block, validate_subset, CompressedArrayError, CompressedArrayTraits, CompressionType,
    Samples,
};

/// An indexed ragged array.
///
/// The elements of the features are interleaved in the samples, and the index variable gives the feature of each sample.
/// The uncompressed shape is `(number of features, maximum number of elements of a feature)`.
#[derive(Debug, Clone)]
pub struct RaggedIndexedArray {
    samples: Samples,
    positions: Arc<Vec<Vec<usize>>>,
    shape: ArrayShape,
    data_type: DataType,
}

impl RaggedIndexedArray {
    /// Create an indexed ragged array from samples and the feature index of each sample.
    ///
    /// The number of features is `num_features`, or one more than the largest index if [`None`].
    ///
    /// # Errors
    /// Returns [`CompressedArrayError::InvalidDescription`] if the index length differs from the number of samples or an index is not less than `num_features`.
    pub fn new(
        samples: Samples,
        index: &[usize],
        num_features: Option<usize>,
        data_type: DataType,
    ) -> Result<Self, CompressedArrayError> {
        if index.len() != samples.len() {
            return Err(CompressedArrayError::InvalidDescription(format!(
                "index has {} elements but there are {} samples",
                index.len(),
                samples.len()
            )));
        }
        let num_features =
            num_features.unwrap_or_else(|| index.iter().max().map_or(0, |max| max + 1));
        let mut positions = vec![Vec::new(); num_features];
        for (sample, &feature) in index.iter().enumerate() {
            positions
                .get_mut(feature)
                .ok_or_else(|| {
                    CompressedArrayError::InvalidDescription(format!(
                        "feature index {feature} is out of bounds for {num_features} features"
                    ))
                })?
                .push(sample);
        }
        let max_elements = positions.iter().map(Vec::len).max().unwrap_or(0);
        Ok(Self {
            samples,
            positions: Arc::new(positions),
            shape: vec![num_features, max_elements],
            data_type,
        })
    }
}

impl CompressedArrayTraits for RaggedIndexedArray {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn compression_type(&self) -> CompressionType {
        CompressionType::RaggedIndexed
    }

    fn subarray(&self, subset: &ArraySubset) -> Result<MaskedArray, CompressedArrayError> {
        validate_subset(subset, &self.shape)?;
        let ranges = subset.to_ranges();
        let positions: Vec<Option<usize>> = ranges[0]
            .clone()
            .flat_map(|feature| {
                let feature_positions = &self.positions[feature];
                ranges[1]
                    .clone()
                    .map(move |element| feature_positions.get(element).copied())
            })
            .collect();
        let (values, mask) = self.samples.gather(&positions)?;
        build_block(subset, values, mask, self.data_type)
    }

    fn file(&self) -> Option<&Path> {
        self.samples.file()
    }

    fn to_memory(&self) -> Result<Arc<dyn CompressedArrayTraits>, CompressedArrayError> {
        Ok(Arc::new(Self {
            samples: self.samples.to_memory()?,
            ..self.clone()
        }))
    }

    fn close(&self) {
        self.samples.close();
    }

    fn to_chunked_array(self: Arc<Self>, chunk_size: usize) -> ChunkedArray {
        ChunkedArray::from_compressed(self, chunk_size)
    }
}
