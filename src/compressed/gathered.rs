use std::{path::Path, sync::Arc};

use ndarray::{Dimension, IxDyn};

use crate::{
    array_subset::ArraySubset, chunked::ChunkedArray, data_type::DataType,
    masked_array::MaskedArray, ArrayShape,
};

use super::{
    build_block, validate_subset, CompressedArrayError, CompressedArrayTraits, CompressionType,
    Samples,
};

/// A gathered array.
///
/// One axis of the compressed array (the list axis) holds the elements of a subset of the positions of one or more uncompressed axes, for example the land points of a latitude-longitude grid.
/// The list variable gives the row-major position within the uncompressed axes of each element of the list axis.
/// Uncompressed positions which are not in the list are masked.
#[derive(Debug, Clone)]
pub struct GatheredArray {
    samples: Samples,
    compressed_shape: ArrayShape,
    compressed_axis: usize,
    uncompressed_axes: usize,
    lookup: Arc<Vec<Option<usize>>>,
    shape: ArrayShape,
    data_type: DataType,
}

impl GatheredArray {
    /// Create a gathered array.
    ///
    /// `samples` holds the compressed array of `compressed_shape` in row-major order.
    /// Axis `compressed_axis` of the compressed array is replaced by `uncompressed_shape` in the uncompressed array, and `list` gives the row-major position within `uncompressed_shape` of each element along the compressed axis.
    ///
    /// # Errors
    /// Returns [`CompressedArrayError::InvalidDescription`] if the description is inconsistent.
    pub fn new(
        samples: Samples,
        compressed_shape: ArrayShape,
        compressed_axis: usize,
        uncompressed_shape: &[usize],
        list: &[usize],
        data_type: DataType,
    ) -> Result<Self, CompressedArrayError> {
        let invalid = |message: String| Err(CompressedArrayError::InvalidDescription(message));
        if compressed_axis >= compressed_shape.len() {
            return invalid(format!(
                "compressed axis {compressed_axis} is out of bounds for shape {compressed_shape:?}"
            ));
        }
        if compressed_shape.iter().product::<usize>() != samples.len() {
            return invalid(format!(
                "compressed shape {compressed_shape:?} does not match {} samples",
                samples.len()
            ));
        }
        if list.len() != compressed_shape[compressed_axis] {
            return invalid(format!(
                "list has {} elements but the compressed axis has length {}",
                list.len(),
                compressed_shape[compressed_axis]
            ));
        }
        let num_positions: usize = uncompressed_shape.iter().product();
        let mut lookup = vec![None; num_positions];
        for (element, &position) in list.iter().enumerate() {
            let Some(slot) = lookup.get_mut(position) else {
                return invalid(format!(
                    "list position {position} is out of bounds for uncompressed shape {uncompressed_shape:?}"
                ));
            };
            if slot.is_some() {
                return invalid(format!("list position {position} is repeated"));
            }
            *slot = Some(element);
        }
        let mut shape = compressed_shape[..compressed_axis].to_vec();
        shape.extend_from_slice(uncompressed_shape);
        shape.extend_from_slice(&compressed_shape[compressed_axis + 1..]);
        Ok(Self {
            samples,
            compressed_shape,
            compressed_axis,
            uncompressed_axes: uncompressed_shape.len(),
            lookup: Arc::new(lookup),
            shape,
            data_type,
        })
    }

    fn sample_position(&self, index: &[usize]) -> Option<usize> {
        let axis = self.compressed_axis;
        let uncompressed = &index[axis..axis + self.uncompressed_axes];
        let uncompressed_shape = &self.shape[axis..axis + self.uncompressed_axes];
        let position = std::iter::zip(uncompressed, uncompressed_shape)
            .fold(0, |acc, (i, len)| acc * len + i);
        let element = self.lookup[position]?;
        let compressed_index = index[..axis]
            .iter()
            .copied()
            .chain(std::iter::once(element))
            .chain(index[axis + self.uncompressed_axes..].iter().copied());
        Some(
            std::iter::zip(compressed_index, &self.compressed_shape)
                .fold(0, |acc, (i, len)| acc * len + i),
        )
    }
}

impl CompressedArrayTraits for GatheredArray {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn compression_type(&self) -> CompressionType {
        CompressionType::Gathered
    }

    fn subarray(&self, subset: &ArraySubset) -> Result<MaskedArray, CompressedArrayError> {
        validate_subset(subset, &self.shape)?;
        let mut index = vec![0; self.shape.len()];
        let positions: Vec<Option<usize>> = ndarray::indices(IxDyn(subset.shape()))
            .into_iter()
            .map(|relative| {
                for (i, (r, s)) in
                    std::iter::zip(&mut index, std::iter::zip(relative.slice(), subset.start()))
                {
                    *i = r + s;
                }
                self.sample_position(&index)
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
    fn gathered_subarray() {
        // two times, three land points of a 2x3 grid
        let samples = Samples::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let array =
            GatheredArray::new(samples, vec![2, 3], 1, &[2, 3], &[1, 3, 5], DataType::Float32)
                .unwrap();
        assert_eq!(array.shape(), &[2, 2, 3]);
        let block = array
            .subarray(&ArraySubset::new_with_ranges(&[1..2, 0..2, 0..3]))
            .unwrap();
        assert_eq!(
            block.to_numeric_options().unwrap(),
            vec![None, Some(4.0), None, Some(5.0), None, Some(6.0)]
        );
        assert!(GatheredArray::new(
            Samples::new(vec![1.0]),
            vec![1],
            0,
            &[2],
            &[2],
            DataType::Float32
        )
        .is_err());
    }
}
