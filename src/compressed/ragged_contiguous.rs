use std::{path::Path, sync::Arc};

use crate::{
    array_subset::ArraySubset, chunked::ChunkedArray, data_type::DataType,
    masked_array::MaskedArray, ArrayShape,
};

use super::{
    build_block, validate_subset, CompressedArrayError, CompressedArrayTraits, CompressionType,
    Samples,
};

/// A contiguous ragged array.
///
/// The elements of each feature occupy a contiguous block of the samples, and the count variable gives the number of elements of each feature.
/// The uncompressed shape is `(number of features, maximum count)`, with the elements of each feature beyond its count masked.
#[derive(Debug, Clone)]
pub struct RaggedContiguousArray {
    samples: Samples,
    count: Arc<Vec<usize>>,
    offsets: Arc<Vec<usize>>,
    shape: ArrayShape,
    data_type: DataType,
}

impl RaggedContiguousArray {
    /// Create a contiguous ragged array from samples and the count of each feature.
    ///
    /// # Errors
    /// Returns [`CompressedArrayError::InvalidDescription`] if the counts do not sum to the number of samples.
    pub fn new(
        samples: Samples,
        count: Vec<usize>,
        data_type: DataType,
    ) -> Result<Self, CompressedArrayError> {
        let total: usize = count.iter().sum();
        if total != samples.len() {
            return Err(CompressedArrayError::InvalidDescription(format!(
                "counts sum to {total} but there are {} samples",
                samples.len()
            )));
        }
        let offsets = count
            .iter()
            .scan(0, |offset, c| {
                let start = *offset;
                *offset += c;
                Some(start)
            })
            .collect();
        let shape = vec![count.len(), count.iter().copied().max().unwrap_or(0)];
        Ok(Self {
            samples,
            count: Arc::new(count),
            offsets: Arc::new(offsets),
            shape,
            data_type,
        })
    }

    /// The count of each feature.
    #[must_use]
    pub fn count(&self) -> &[usize] {
        &self.count
    }
}

impl CompressedArrayTraits for RaggedContiguousArray {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn compression_type(&self) -> CompressionType {
        CompressionType::RaggedContiguous
    }

    fn subarray(&self, subset: &ArraySubset) -> Result<MaskedArray, CompressedArrayError> {
        validate_subset(subset, &self.shape)?;
        let features = subset.to_ranges()[0].clone();
        let elements = subset.to_ranges()[1].clone();
        let positions: Vec<Option<usize>> = features
            .flat_map(|feature| {
                let (offset, count) = (self.offsets[feature], self.count[feature]);
                elements
                    .clone()
                    .map(move |element| (element < count).then_some(offset + element))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_contiguous_subarray() {
        let samples = Samples::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let array = RaggedContiguousArray::new(samples, vec![3, 1, 2], DataType::Float64).unwrap();
        assert_eq!(array.shape(), &[3, 3]);
        let block = array
            .subarray(&ArraySubset::new_with_ranges(&[0..3, 0..3]))
            .unwrap();
        assert_eq!(
            block.to_numeric_options().unwrap(),
            vec![
                Some(1.0),
                Some(2.0),
                Some(3.0),
                Some(4.0),
                None,
                None,
                Some(5.0),
                Some(6.0),
                None
            ]
        );
        let block = array
            .subarray(&ArraySubset::new_with_ranges(&[2..3, 1..2]))
            .unwrap();
        assert_eq!(block.to_numeric_options().unwrap(), vec![Some(6.0)]);
        assert!(RaggedContiguousArray::new(Samples::new(vec![1.0]), vec![2], DataType::Float64)
            .is_err());
    }
}
