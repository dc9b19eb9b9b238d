//! Array subsets.
//!
//! An [`ArraySubset`] is a hyperrectangular region of an array, described by its start and shape.
//! It is used throughout this library to describe the extent of a block of a chunked array, the region read from a compressed source, and the region written by an assignment.

use derive_more::{Display, From};
use itertools::izip;
use thiserror::Error;

use crate::ArrayShape;

/// An array subset.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Default)]
#[display("start {start:?} shape {shape:?}")]
pub struct ArraySubset {
    /// The start of the array subset.
    start: Vec<usize>,
    /// The shape of the array subset.
    shape: ArrayShape,
}

impl ArraySubset {
    /// Create a new array subset with `shape` starting at the origin.
    #[must_use]
    pub fn new_with_shape(shape: ArrayShape) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new array subset.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleDimensionalityError`] if the size of `start` and `shape` do not match.
    pub fn new_with_start_shape(
        start: Vec<usize>,
        shape: ArrayShape,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError::new(
                start.len(),
                shape.len(),
            ))
        }
    }

    /// Create a new array subset from a list of [`Range`](std::ops::Range)s.
    #[must_use]
    pub fn new_with_ranges(ranges: &[std::ops::Range<usize>]) -> Self {
        let start = ranges.iter().map(|range| range.start).collect();
        let shape = ranges
            .iter()
            .map(|range| range.end.saturating_sub(range.start))
            .collect();
        Self { start, shape }
    }

    /// Return the start of the array subset.
    #[must_use]
    pub fn start(&self) -> &[usize] {
        &self.start
    }

    /// Return the shape of the array subset.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Return the dimensionality of the array subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the end (exclusive) of the array subset.
    #[must_use]
    pub fn end_exc(&self) -> Vec<usize> {
        std::iter::zip(&self.start, &self.shape)
            .map(|(start, size)| start + size)
            .collect()
    }

    /// Return the array subset as a list of ranges.
    #[must_use]
    pub fn to_ranges(&self) -> Vec<std::ops::Range<usize>> {
        std::iter::zip(&self.start, &self.shape)
            .map(|(&start, &size)| start..start + size)
            .collect()
    }

    /// Return the number of elements of the array subset.
    ///
    /// Equal to the product of the components of its shape.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Returns true if the array subset contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_elements() == 0
    }

    /// Returns true if the array subset is within the bounds of `array_shape`.
    #[must_use]
    pub fn inbounds(&self, array_shape: &[usize]) -> bool {
        self.dimensionality() == array_shape.len()
            && izip!(&self.start, &self.shape, array_shape)
                .all(|(start, size, bound)| start + size <= *bound)
    }
}

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, Error, From)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_subset() {
        assert!(ArraySubset::new_with_start_shape(vec![0, 0], vec![10, 10]).is_ok());
        assert!(ArraySubset::new_with_start_shape(vec![0, 0], vec![10]).is_err());
        let array_subset = ArraySubset::new_with_ranges(&[1..5, 2..4]);
        assert_eq!(array_subset.start(), &[1, 2]);
        assert_eq!(array_subset.shape(), &[4, 2]);
        assert_eq!(array_subset.end_exc(), vec![5, 4]);
        assert_eq!(array_subset.num_elements(), 8);
        assert!(array_subset.inbounds(&[5, 4]));
        assert!(!array_subset.inbounds(&[4, 4]));
        assert_eq!(array_subset.to_string(), "start [1, 2] shape [4, 2]");
    }
}
