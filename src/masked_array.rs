//! In-memory masked arrays.
//!
//! A [`MaskedArray`] is the materialised form of a block of a [`ChunkedArray`](crate::chunked::ChunkedArray): element values, an optional missing-data mask and a mask hardness flag.
//! The block kernels of the chunked backend are implemented on it.

mod elements;

pub use elements::{Elements, Scalar};

use itertools::{izip, Itertools};
use ndarray::{ArrayD, Axis, Dimension, IxDyn, Zip};
use thiserror::Error;

use crate::{array_subset::ArraySubset, data_type::DataType, fill_value::FillValue, ArrayShape};

/// Apply a shape operation generically to the values of [`Elements`].
macro_rules! map_elements {
    ($elements:expr, |$array:ident| $body:expr) => {
        match $elements {
            Elements::Numeric($array) => Elements::Numeric($body),
            Elements::Text($array) => Elements::Text($body),
        }
    };
}

/// A masked array error.
#[derive(Clone, Debug, Error)]
pub enum MaskedArrayError {
    /// Incompatible shapes.
    #[error("incompatible shapes {_0:?} and {_1:?}")]
    IncompatibleShapes(ArrayShape, ArrayShape),
    /// The mask shape does not match the values.
    #[error("mask shape {_0:?} does not match values shape {_1:?}")]
    MaskShape(ArrayShape, ArrayShape),
    /// An axis out of range.
    #[error("axis {_0} is out of bounds for array of dimension {_1}")]
    InvalidAxis(usize, usize),
    /// Index out of bounds.
    #[error("index {_0} is out of bounds for axis {_1} with size {_2}")]
    IndexOutOfBounds(usize, usize, usize),
    /// An operation requiring numeric elements was applied to text.
    #[error("operation {_0} requires numeric elements")]
    NotNumeric(&'static str),
    /// Elements of different kinds were combined.
    #[error("cannot combine text and numeric elements")]
    MixedElements,
}

/// A regular selection of elements along one axis.
///
/// Selects `len` elements at `start`, `start + step`, `start + 2 * step`, ...
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AxisRange {
    /// The first selected index.
    pub start: usize,
    /// The number of selected elements.
    pub len: usize,
    /// The step between selected elements, non-zero.
    pub step: isize,
}

impl AxisRange {
    /// Select a full axis of length `len`.
    #[must_use]
    pub const fn full(len: usize) -> Self {
        Self {
            start: 0,
            len,
            step: 1,
        }
    }

    /// Returns true if this selects every element of an axis of length `axis_len` in order.
    #[must_use]
    pub const fn is_full(&self, axis_len: usize) -> bool {
        self.len == axis_len && (self.step == 1 || self.len <= 1) && (self.start == 0 || self.len == 0)
    }

    /// The selected indices.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).map(|i| (self.start as isize + i as isize * self.step) as usize)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn to_ndarray_slice(self) -> ndarray::Slice {
        if self.len == 0 {
            return ndarray::Slice::new(0, Some(0), 1);
        }
        let start = self.start as isize;
        let last = start + (self.len as isize - 1) * self.step;
        if self.step > 0 {
            ndarray::Slice::new(start, Some(last + 1), self.step)
        } else {
            ndarray::Slice::new(last, Some(start + 1), self.step)
        }
    }
}

/// A masked array.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskedArray {
    elements: Elements,
    mask: Option<ArrayD<bool>>,
    data_type: DataType,
    hard_mask: bool,
}

/// Broadcast two shapes against each other.
#[must_use]
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Option<ArrayShape> {
    let ndim = a.len().max(b.len());
    let pad = |s: &[usize]| {
        let mut padded = vec![1; ndim - s.len()];
        padded.extend_from_slice(s);
        padded
    };
    std::iter::zip(pad(a), pad(b))
        .map(|(x, y)| match (x, y) {
            (x, y) if x == y => Some(x),
            (1, y) => Some(y),
            (x, 1) => Some(x),
            _ => None,
        })
        .collect()
}

impl MaskedArray {
    /// Create a new masked array.
    ///
    /// A mask with no masked elements is discarded.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::MaskShape`] if the mask shape does not match the elements.
    pub fn new(
        elements: Elements,
        mask: Option<ArrayD<bool>>,
        data_type: DataType,
    ) -> Result<Self, MaskedArrayError> {
        if let Some(mask) = &mask {
            if mask.shape() != elements.shape() {
                return Err(MaskedArrayError::MaskShape(
                    mask.shape().to_vec(),
                    elements.shape().to_vec(),
                ));
            }
        }
        Ok(Self {
            elements,
            mask: mask.filter(|mask| mask.iter().any(|m| *m)),
            data_type,
            hard_mask: true,
        })
    }

    /// Create an unmasked numeric array, casting values to `data_type`.
    #[must_use]
    pub fn from_numeric(values: ArrayD<f64>, data_type: DataType) -> Self {
        let values = if data_type == DataType::Float64 {
            values
        } else {
            values.mapv(|v| data_type.cast(v))
        };
        Self {
            elements: Elements::Numeric(values),
            mask: None,
            data_type,
            hard_mask: true,
        }
    }

    /// Create an unmasked text array.
    #[must_use]
    pub fn from_text(values: ArrayD<String>) -> Self {
        Self {
            elements: Elements::Text(values),
            mask: None,
            data_type: DataType::String,
            hard_mask: true,
        }
    }

    /// Create an array with every element masked.
    #[must_use]
    pub fn masked_all(shape: &[usize], data_type: DataType) -> Self {
        let elements = if data_type == DataType::String {
            Elements::Text(ArrayD::from_elem(IxDyn(shape), String::new()))
        } else {
            Elements::Numeric(ArrayD::zeros(IxDyn(shape)))
        };
        let mask = ArrayD::from_elem(IxDyn(shape), true);
        Self {
            elements,
            mask: (!mask.is_empty()).then_some(mask),
            data_type,
            hard_mask: true,
        }
    }

    /// Create a numeric array filled with `value`.
    #[must_use]
    pub fn full(shape: &[usize], value: f64, data_type: DataType) -> Self {
        Self::from_numeric(ArrayD::from_elem(IxDyn(shape), value), data_type)
    }

    /// The shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.elements.shape()
    }

    /// The number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// The number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The data type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The element values, including those underlying masked elements.
    #[must_use]
    pub fn elements(&self) -> &Elements {
        &self.elements
    }

    /// The numeric element values.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::NotNumeric`] if the elements are text.
    pub fn numeric(&self) -> Result<&ArrayD<f64>, MaskedArrayError> {
        match &self.elements {
            Elements::Numeric(values) => Ok(values),
            Elements::Text(_) => Err(MaskedArrayError::NotNumeric("numeric")),
        }
    }

    /// The mask, [`None`] if no element is masked.
    #[must_use]
    pub fn mask(&self) -> Option<&ArrayD<bool>> {
        self.mask.as_ref()
    }

    /// The mask, with `false` for every element if no element is masked.
    #[must_use]
    pub fn mask_or_false(&self) -> ArrayD<bool> {
        self.mask
            .clone()
            .unwrap_or_else(|| ArrayD::from_elem(IxDyn(self.shape()), false))
    }

    /// Returns true if any element is masked.
    #[must_use]
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// The number of non-missing elements.
    #[must_use]
    pub fn count(&self) -> usize {
        self.mask
            .as_ref()
            .map_or(self.len(), |mask| mask.iter().filter(|m| !**m).count())
    }

    /// Returns true if the mask is hard.
    #[must_use]
    pub fn hard_mask(&self) -> bool {
        self.hard_mask
    }

    /// Return the array with the given mask hardness.
    #[must_use]
    pub fn with_hard_mask(mut self, hard_mask: bool) -> Self {
        self.hard_mask = hard_mask;
        self
    }

    /// Return the array with a new data type, casting numeric values.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::MixedElements`] if converting between text and numbers.
    pub fn astype(&self, data_type: DataType) -> Result<Self, MaskedArrayError> {
        let elements = match (&self.elements, data_type) {
            (Elements::Text(values), DataType::String) => Elements::Text(values.clone()),
            (Elements::Numeric(values), data_type) if data_type.is_numeric() => {
                Elements::Numeric(values.mapv(|v| data_type.cast(v)))
            }
            _ => return Err(MaskedArrayError::MixedElements),
        };
        Ok(Self {
            elements,
            mask: self.mask.clone(),
            data_type,
            hard_mask: self.hard_mask,
        })
    }

    /// Return the element at `index`, or [`None`] if it is masked.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn get(&self, index: &[usize]) -> Option<Scalar> {
        if self.mask.as_ref().is_some_and(|mask| mask[index]) {
            return None;
        }
        Some(match &self.elements {
            Elements::Numeric(values) => Scalar::Numeric(values[index]),
            Elements::Text(values) => Scalar::Text(values[index].clone()),
        })
    }

    /// Return the array with masked numeric elements replaced by `fill_value`.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::NotNumeric`] if the elements are text.
    pub fn filled_numeric(&self, fill_value: f64) -> Result<ArrayD<f64>, MaskedArrayError> {
        let values = self.numeric()?;
        Ok(match &self.mask {
            Some(mask) => Zip::from(values)
                .and(mask)
                .map_collect(|v, m| if *m { fill_value } else { *v }),
            None => values.clone(),
        })
    }

    /// Return the elements with masked elements replaced by `fill_value`.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::MixedElements`] if the fill value kind does not match the elements.
    pub fn filled(&self, fill_value: &FillValue) -> Result<Elements, MaskedArrayError> {
        match (&self.elements, fill_value) {
            (Elements::Numeric(_), FillValue::Numeric(fill)) => {
                Ok(Elements::Numeric(self.filled_numeric(*fill)?))
            }
            (Elements::Text(values), FillValue::Text(fill)) => Ok(Elements::Text(match &self.mask
            {
                Some(mask) => Zip::from(values)
                    .and(mask)
                    .map_collect(|v, m| if *m { fill.clone() } else { v.clone() }),
                None => values.clone(),
            })),
            _ => Err(MaskedArrayError::MixedElements),
        }
    }

    /// Mask elements where `condition` is true, irrespective of mask hardness.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::IncompatibleShapes`] if `condition` does not broadcast to the array shape.
    pub fn masked_where(&self, condition: &ArrayD<bool>) -> Result<Self, MaskedArrayError> {
        let condition = condition.broadcast(IxDyn(self.shape())).ok_or_else(|| {
            MaskedArrayError::IncompatibleShapes(condition.shape().to_vec(), self.shape().to_vec())
        })?;
        let mask = Zip::from(&self.mask_or_false())
            .and(&condition)
            .map_collect(|a, b| *a || *b);
        let mut out = self.clone();
        out.mask = mask.iter().any(|m| *m).then_some(mask);
        Ok(out)
    }

    /// Return the array with the given mask, replacing the existing mask.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::MaskShape`] if the mask shape does not match.
    pub fn with_mask(&self, mask: Option<ArrayD<bool>>) -> Result<Self, MaskedArrayError> {
        let mut out = Self::new(self.elements.clone(), mask, self.data_type)?;
        out.hard_mask = self.hard_mask;
        Ok(out)
    }

    fn map_shape(
        &self,
        elements: impl FnOnce(&Elements) -> Elements,
        mask: impl FnOnce(&ArrayD<bool>) -> ArrayD<bool>,
    ) -> Self {
        Self {
            elements: elements(&self.elements),
            mask: self.mask.as_ref().map(mask),
            data_type: self.data_type,
            hard_mask: self.hard_mask,
        }
    }

    fn check_axis(&self, axis: usize) -> Result<(), MaskedArrayError> {
        if axis < self.ndim() {
            Ok(())
        } else {
            Err(MaskedArrayError::InvalidAxis(axis, self.ndim()))
        }
    }

    /// Extract the elements within `subset`.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::IncompatibleShapes`] if `subset` is out of bounds.
    pub fn subset(&self, subset: &ArraySubset) -> Result<Self, MaskedArrayError> {
        if !subset.inbounds(self.shape()) {
            return Err(MaskedArrayError::IncompatibleShapes(
                subset.end_exc(),
                self.shape().to_vec(),
            ));
        }
        let ranges: Vec<AxisRange> = std::iter::zip(subset.start(), subset.shape())
            .map(|(&start, &len)| AxisRange {
                start,
                len,
                step: 1,
            })
            .collect();
        self.slice(&ranges)
    }

    /// Select a regular range of elements along every axis.
    ///
    /// # Errors
    /// Returns an error if the number of ranges does not match the dimensionality or a range is out of bounds.
    pub fn slice(&self, ranges: &[AxisRange]) -> Result<Self, MaskedArrayError> {
        if ranges.len() != self.ndim() {
            return Err(MaskedArrayError::IncompatibleShapes(
                vec![ranges.len()],
                vec![self.ndim()],
            ));
        }
        for (axis, (range, &len)) in std::iter::zip(ranges, self.shape()).enumerate() {
            if let Some(index) = range.indices().find(|index| *index >= len) {
                return Err(MaskedArrayError::IndexOutOfBounds(index, axis, len));
            }
        }
        let slicer =
            |desc: ndarray::AxisDescription| ranges[desc.axis.index()].to_ndarray_slice();
        Ok(self.map_shape(
            |elements| map_elements!(elements, |a| a.slice_each_axis(slicer).to_owned()),
            |mask| mask.slice_each_axis(slicer).to_owned(),
        ))
    }

    /// Take elements at `indices` along `axis`.
    ///
    /// # Errors
    /// Returns an error if `axis` or any index is out of bounds.
    pub fn take(&self, axis: usize, indices: &[usize]) -> Result<Self, MaskedArrayError> {
        self.check_axis(axis)?;
        let len = self.shape()[axis];
        if let Some(index) = indices.iter().find(|index| **index >= len) {
            return Err(MaskedArrayError::IndexOutOfBounds(*index, axis, len));
        }
        Ok(self.map_shape(
            |elements| map_elements!(elements, |a| a.select(Axis(axis), indices)),
            |mask| mask.select(Axis(axis), indices),
        ))
    }

    /// Roll elements along `axis` by `shift` positions, so that element `i` moves to `i + shift`.
    ///
    /// # Errors
    /// Returns an error if `axis` is out of bounds.
    pub fn roll(&self, axis: usize, shift: isize) -> Result<Self, MaskedArrayError> {
        self.check_axis(axis)?;
        let len = self.shape()[axis];
        if len == 0 {
            return Ok(self.clone());
        }
        #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let shift = shift.rem_euclid(len as isize) as usize;
        if shift == 0 {
            return Ok(self.clone());
        }
        let indices: Vec<usize> = (0..len).map(|i| (i + len - shift) % len).collect();
        self.take(axis, &indices)
    }

    /// Concatenate arrays along `axis`.
    ///
    /// The data type of the result is the promotion of the input data types and the result has a hard mask if any input does.
    ///
    /// # Errors
    /// Returns an error if `arrays` is empty, the shapes are incompatible or text is mixed with numbers.
    pub fn concatenate(axis: usize, arrays: &[Self]) -> Result<Self, MaskedArrayError> {
        let first = arrays
            .first()
            .ok_or(MaskedArrayError::IncompatibleShapes(vec![], vec![]))?;
        first.check_axis(axis)?;
        let shape_error = |_| {
            MaskedArrayError::IncompatibleShapes(
                first.shape().to_vec(),
                arrays.last().map(|a| a.shape().to_vec()).unwrap_or_default(),
            )
        };
        let data_type = arrays
            .iter()
            .map(Self::data_type)
            .try_fold(first.data_type, |acc, dt| acc.promote(&dt))
            .ok_or(MaskedArrayError::MixedElements)?;
        let elements = if data_type == DataType::String {
            let views = arrays
                .iter()
                .map(|a| match &a.elements {
                    Elements::Text(values) => Ok(values.view()),
                    Elements::Numeric(_) => Err(MaskedArrayError::MixedElements),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Elements::Text(ndarray::concatenate(Axis(axis), &views).map_err(shape_error)?)
        } else {
            let views = arrays
                .iter()
                .map(MaskedArray::numeric)
                .map_ok(|values| values.view())
                .collect::<Result<Vec<_>, _>>()?;
            Elements::Numeric(ndarray::concatenate(Axis(axis), &views).map_err(shape_error)?)
        };
        let mask = if arrays.iter().any(Self::is_masked) {
            let masks: Vec<_> = arrays.iter().map(Self::mask_or_false).collect();
            let views: Vec<_> = masks.iter().map(|mask| mask.view()).collect();
            Some(ndarray::concatenate(Axis(axis), &views).map_err(shape_error)?)
        } else {
            None
        };
        Ok(Self {
            elements,
            mask,
            data_type,
            hard_mask: arrays.iter().any(Self::hard_mask),
        })
    }

    /// Permute the axes.
    ///
    /// # Errors
    /// Returns an error if `axes` is not a permutation of the array axes.
    pub fn permute(&self, axes: &[usize]) -> Result<Self, MaskedArrayError> {
        if axes.len() != self.ndim() || !axes.iter().sorted().copied().eq(0..self.ndim()) {
            return Err(MaskedArrayError::IncompatibleShapes(
                axes.to_vec(),
                self.shape().to_vec(),
            ));
        }
        Ok(self.map_shape(
            |elements| {
                map_elements!(elements, |a| a
                    .view()
                    .permuted_axes(IxDyn(axes))
                    .as_standard_layout()
                    .into_owned())
            },
            |mask| {
                mask.view()
                    .permuted_axes(IxDyn(axes))
                    .as_standard_layout()
                    .into_owned()
            },
        ))
    }

    /// Reshape in row-major order.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::IncompatibleShapes`] if the number of elements differs.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self, MaskedArrayError> {
        if shape.iter().product::<usize>() != self.len() {
            return Err(MaskedArrayError::IncompatibleShapes(
                self.shape().to_vec(),
                shape.to_vec(),
            ));
        }
        let elements = match &self.elements {
            Elements::Numeric(a) => Elements::Numeric(
                ArrayD::from_shape_vec(IxDyn(shape), a.iter().copied().collect()).map_err(
                    |_| MaskedArrayError::IncompatibleShapes(self.shape().to_vec(), shape.to_vec()),
                )?,
            ),
            Elements::Text(a) => Elements::Text(
                ArrayD::from_shape_vec(IxDyn(shape), a.iter().cloned().collect()).map_err(
                    |_| MaskedArrayError::IncompatibleShapes(self.shape().to_vec(), shape.to_vec()),
                )?,
            ),
        };
        let mask = match &self.mask {
            Some(mask) => Some(
                ArrayD::from_shape_vec(IxDyn(shape), mask.iter().copied().collect()).map_err(
                    |_| MaskedArrayError::IncompatibleShapes(self.shape().to_vec(), shape.to_vec()),
                )?,
            ),
            None => None,
        };
        Ok(Self {
            elements,
            mask,
            data_type: self.data_type,
            hard_mask: self.hard_mask,
        })
    }

    /// Insert a new axis of size one at position `axis`.
    ///
    /// # Errors
    /// Returns an error if `axis` is greater than the number of dimensions.
    pub fn insert_axis(&self, axis: usize) -> Result<Self, MaskedArrayError> {
        if axis > self.ndim() {
            return Err(MaskedArrayError::InvalidAxis(axis, self.ndim()));
        }
        Ok(self.map_shape(
            |elements| map_elements!(elements, |a| a.clone().insert_axis(Axis(axis))),
            |mask| mask.clone().insert_axis(Axis(axis)),
        ))
    }

    /// Remove an axis of size one.
    ///
    /// # Errors
    /// Returns an error if `axis` is out of bounds or not of size one.
    pub fn remove_axis(&self, axis: usize) -> Result<Self, MaskedArrayError> {
        self.check_axis(axis)?;
        if self.shape()[axis] != 1 {
            return Err(MaskedArrayError::IncompatibleShapes(
                self.shape().to_vec(),
                vec![1],
            ));
        }
        Ok(self.map_shape(
            |elements| map_elements!(elements, |a| a.clone().index_axis_move(Axis(axis), 0)),
            |mask| mask.clone().index_axis_move(Axis(axis), 0),
        ))
    }

    /// Reverse the order of elements along `axis`.
    ///
    /// # Errors
    /// Returns an error if `axis` is out of bounds.
    pub fn flip(&self, axis: usize) -> Result<Self, MaskedArrayError> {
        self.check_axis(axis)?;
        let len = self.shape()[axis];
        let indices: Vec<usize> = (0..len).rev().collect();
        self.take(axis, &indices)
    }

    /// Broadcast to `shape`.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::IncompatibleShapes`] if the array cannot be broadcast to `shape`.
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Self, MaskedArrayError> {
        if self.shape() == shape {
            return Ok(self.clone());
        }
        let error =
            || MaskedArrayError::IncompatibleShapes(self.shape().to_vec(), shape.to_vec());
        let elements = match &self.elements {
            Elements::Numeric(a) => {
                Elements::Numeric(a.broadcast(IxDyn(shape)).ok_or_else(error)?.to_owned())
            }
            Elements::Text(a) => {
                Elements::Text(a.broadcast(IxDyn(shape)).ok_or_else(error)?.to_owned())
            }
        };
        let mask = match &self.mask {
            Some(mask) => Some(mask.broadcast(IxDyn(shape)).ok_or_else(error)?.to_owned()),
            None => None,
        };
        Ok(Self {
            elements,
            mask,
            data_type: self.data_type,
            hard_mask: self.hard_mask,
        })
    }

    /// Apply a numeric function to each element.
    ///
    /// The mask is unchanged. Elements for which `f` returns a non-finite value where the input was finite are masked if `mask_invalid` is true.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::NotNumeric`] if the elements are text.
    pub fn map_numeric(
        &self,
        data_type: DataType,
        mask_invalid: bool,
        f: impl Fn(f64) -> f64,
    ) -> Result<Self, MaskedArrayError> {
        let values = self.numeric()?;
        let result = values.mapv(|v| data_type.cast(f(v)));
        let mask = if mask_invalid {
            let invalid = Zip::from(values)
                .and(&result)
                .map_collect(|v, r| v.is_finite() && !r.is_finite());
            Some(
                Zip::from(&self.mask_or_false())
                    .and(&invalid)
                    .map_collect(|a, b| *a || *b),
            )
        } else {
            self.mask.clone()
        };
        let mut out = Self::new(Elements::Numeric(result), mask, data_type)?;
        out.hard_mask = self.hard_mask;
        Ok(out)
    }

    /// Combine two numeric arrays elementwise with broadcasting.
    ///
    /// An output element is masked if either input element is masked.
    ///
    /// # Errors
    /// Returns an error if the shapes do not broadcast or either array is text.
    pub fn zip_numeric(
        &self,
        other: &Self,
        data_type: DataType,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Self, MaskedArrayError> {
        let shape = broadcast_shapes(self.shape(), other.shape()).ok_or_else(|| {
            MaskedArrayError::IncompatibleShapes(self.shape().to_vec(), other.shape().to_vec())
        })?;
        let a = self.broadcast_to(&shape)?;
        let b = other.broadcast_to(&shape)?;
        let values = Zip::from(a.numeric()?)
            .and(b.numeric()?)
            .map_collect(|x, y| data_type.cast(f(*x, *y)));
        let mask = match (a.mask, b.mask) {
            (Some(ma), Some(mb)) => Some(Zip::from(&ma).and(&mb).map_collect(|x, y| *x || *y)),
            (Some(m), None) | (None, Some(m)) => Some(m),
            (None, None) => None,
        };
        Ok(Self {
            elements: Elements::Numeric(values),
            mask,
            data_type,
            hard_mask: self.hard_mask,
        })
    }

    /// Combine two numeric arrays elementwise with broadcasting, masking the elements where `f` returns [`None`].
    ///
    /// # Errors
    /// Returns an error if the shapes do not broadcast or either array is text.
    pub fn zip_numeric_checked(
        &self,
        other: &Self,
        data_type: DataType,
        f: impl Fn(f64, f64) -> Option<f64>,
    ) -> Result<Self, MaskedArrayError> {
        let shape = broadcast_shapes(self.shape(), other.shape()).ok_or_else(|| {
            MaskedArrayError::IncompatibleShapes(self.shape().to_vec(), other.shape().to_vec())
        })?;
        let a = self.broadcast_to(&shape)?;
        let b = other.broadcast_to(&shape)?;
        let results = Zip::from(a.numeric()?)
            .and(b.numeric()?)
            .map_collect(|x, y| f(*x, *y));
        let values = results.mapv(|r| data_type.cast(r.unwrap_or(0.0)));
        let invalid = results.mapv(|r| r.is_none());
        let mask = [a.mask, b.mask]
            .into_iter()
            .flatten()
            .fold(invalid, |m, other| Zip::from(&m).and(&other).map_collect(|x, y| *x || *y));
        Ok(Self {
            elements: Elements::Numeric(values),
            mask: Some(mask),
            data_type,
            hard_mask: self.hard_mask,
        })
    }

    /// Combine two arrays of any element kind elementwise with broadcasting, producing booleans.
    ///
    /// # Errors
    /// Returns an error if the shapes do not broadcast or the element kinds differ.
    pub fn zip_compare(
        &self,
        other: &Self,
        numeric: impl Fn(f64, f64) -> bool,
        text: impl Fn(&str, &str) -> bool,
    ) -> Result<Self, MaskedArrayError> {
        let shape = broadcast_shapes(self.shape(), other.shape()).ok_or_else(|| {
            MaskedArrayError::IncompatibleShapes(self.shape().to_vec(), other.shape().to_vec())
        })?;
        let a = self.broadcast_to(&shape)?;
        let b = other.broadcast_to(&shape)?;
        let values = match (&a.elements, &b.elements) {
            (Elements::Numeric(x), Elements::Numeric(y)) => Zip::from(x)
                .and(y)
                .map_collect(|x, y| f64::from(u8::from(numeric(*x, *y)))),
            (Elements::Text(x), Elements::Text(y)) => Zip::from(x)
                .and(y)
                .map_collect(|x, y| f64::from(u8::from(text(x, y)))),
            _ => return Err(MaskedArrayError::MixedElements),
        };
        let mask = match (a.mask, b.mask) {
            (Some(ma), Some(mb)) => Some(Zip::from(&ma).and(&mb).map_collect(|x, y| *x || *y)),
            (Some(m), None) | (None, Some(m)) => Some(m),
            (None, None) => None,
        };
        Ok(Self {
            elements: Elements::Numeric(values),
            mask,
            data_type: DataType::Bool,
            hard_mask: self.hard_mask,
        })
    }

    /// Assign `value` to the orthogonal selection `selection` (one list of indices per axis).
    ///
    /// `value` is broadcast to the shape of the selection.
    /// Masked elements of `value` mask the target.
    /// Unmasked elements of `value` unmask the target, unless the target mask is hard.
    ///
    /// # Errors
    /// Returns an error if the selection is out of bounds, `value` does not broadcast, or the element kinds differ.
    pub fn assign(&mut self, selection: &[Vec<usize>], value: &Self) -> Result<(), MaskedArrayError> {
        if selection.len() != self.ndim() {
            return Err(MaskedArrayError::IncompatibleShapes(
                vec![selection.len()],
                vec![self.ndim()],
            ));
        }
        for (axis, (indices, &len)) in std::iter::zip(selection, self.shape()).enumerate() {
            if let Some(index) = indices.iter().find(|index| **index >= len) {
                return Err(MaskedArrayError::IndexOutOfBounds(*index, axis, len));
            }
        }
        let region_shape: Vec<usize> = selection.iter().map(Vec::len).collect();
        let value = value.broadcast_to(&region_shape)?;
        let data_type = self.data_type;
        let mut mask = self.mask_or_false();
        let hard_mask = self.hard_mask;
        let mut target_index = vec![0; self.ndim()];
        for region_index in ndarray::indices(IxDyn(&region_shape)) {
            let region_index = region_index.slice();
            for (t, indices, i) in izip!(&mut target_index, selection, region_index) {
                *t = indices[*i];
            }
            let target_index = target_index.as_slice();
            if hard_mask && mask[target_index] {
                continue;
            }
            let value_masked = value.mask.as_ref().is_some_and(|m| m[region_index]);
            if value_masked {
                mask[target_index] = true;
                continue;
            }
            match (&mut self.elements, &value.elements) {
                (Elements::Numeric(target), Elements::Numeric(source)) => {
                    target[target_index] = data_type.cast(source[region_index]);
                }
                (Elements::Text(target), Elements::Text(source)) => {
                    target[target_index].clone_from(&source[region_index]);
                }
                _ => return Err(MaskedArrayError::MixedElements),
            }
            mask[target_index] = false;
        }
        self.mask = mask.iter().any(|m| *m).then_some(mask);
        Ok(())
    }

    /// Write `block` into this array at `subset`.
    ///
    /// Block mask hardness is not consulted; the block replaces the region exactly.
    ///
    /// # Errors
    /// Returns an error if `subset` is out of bounds or the element kinds differ.
    pub fn store_subset(&mut self, subset: &ArraySubset, block: &Self) -> Result<(), MaskedArrayError> {
        if !subset.inbounds(self.shape()) || subset.shape() != block.shape() {
            return Err(MaskedArrayError::IncompatibleShapes(
                subset.shape().to_vec(),
                block.shape().to_vec(),
            ));
        }
        let slicer = |desc: ndarray::AxisDescription| {
            let i = desc.axis.index();
            #[allow(clippy::cast_possible_wrap)]
            ndarray::Slice::from(
                subset.start()[i] as isize..(subset.start()[i] + subset.shape()[i]) as isize,
            )
        };
        match (&mut self.elements, &block.elements) {
            (Elements::Numeric(target), Elements::Numeric(source)) => {
                target.slice_each_axis_mut(slicer).assign(source);
            }
            (Elements::Text(target), Elements::Text(source)) => {
                target.slice_each_axis_mut(slicer).assign(source);
            }
            _ => return Err(MaskedArrayError::MixedElements),
        }
        if block.is_masked() || self.is_masked() {
            let mut mask = self.mask_or_false();
            mask.slice_each_axis_mut(slicer).assign(&block.mask_or_false());
            self.mask = mask.iter().any(|m| *m).then_some(mask);
        }
        Ok(())
    }

    /// The non-missing numeric values in row-major order.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::NotNumeric`] if the elements are text.
    pub fn compressed_numeric(&self) -> Result<Vec<f64>, MaskedArrayError> {
        let values = self.numeric()?;
        Ok(match &self.mask {
            Some(mask) => std::iter::zip(values.iter(), mask.iter())
                .filter_map(|(v, m)| (!m).then_some(*v))
                .collect(),
            None => values.iter().copied().collect(),
        })
    }

    /// The elements as [`Option`]s in row-major order, [`None`] where masked.
    #[must_use]
    pub fn to_options(&self) -> Vec<Option<Scalar>> {
        ndarray::indices(IxDyn(self.shape()))
            .into_iter()
            .map(|index| self.get(index.slice()))
            .collect()
    }

    /// The numeric elements as [`Option`]s in row-major order, [`None`] where masked.
    ///
    /// # Errors
    /// Returns [`MaskedArrayError::NotNumeric`] if the elements are text.
    pub fn to_numeric_options(&self) -> Result<Vec<Option<f64>>, MaskedArrayError> {
        let values = self.numeric()?;
        Ok(match &self.mask {
            Some(mask) => std::iter::zip(values.iter(), mask.iter())
                .map(|(v, m)| (!m).then_some(*v))
                .collect(),
            None => values.iter().copied().map(Some).collect(),
        })
    }
}

impl From<ArrayD<f64>> for MaskedArray {
    fn from(values: ArrayD<f64>) -> Self {
        Self::from_numeric(values, DataType::Float64)
    }
}

impl From<ArrayD<String>> for MaskedArray {
    fn from(values: ArrayD<String>) -> Self {
        Self::from_text(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arange(shape: &[usize]) -> MaskedArray {
        let n = shape.iter().product::<usize>();
        #[allow(clippy::cast_precision_loss)]
        let values = (0..n).map(|i| i as f64).collect();
        MaskedArray::from_numeric(
            ArrayD::from_shape_vec(IxDyn(shape), values).unwrap(),
            DataType::Int64,
        )
    }

    #[test]
    fn masked_array_slice() {
        let a = arange(&[10]);
        let reversed = a
            .slice(&[AxisRange {
                start: 6,
                len: 5,
                step: -1,
            }])
            .unwrap();
        assert_eq!(
            reversed.compressed_numeric().unwrap(),
            vec![6.0, 5.0, 4.0, 3.0, 2.0]
        );
        let stepped = a
            .slice(&[AxisRange {
                start: 1,
                len: 3,
                step: 3,
            }])
            .unwrap();
        assert_eq!(stepped.compressed_numeric().unwrap(), vec![1.0, 4.0, 7.0]);
        assert!(a
            .slice(&[AxisRange {
                start: 8,
                len: 3,
                step: 1
            }])
            .is_err());
    }

    #[test]
    fn masked_array_roll_take_flip() {
        let a = arange(&[5]);
        assert_eq!(
            a.roll(0, 2).unwrap().compressed_numeric().unwrap(),
            vec![3.0, 4.0, 0.0, 1.0, 2.0]
        );
        assert_eq!(
            a.roll(0, -1).unwrap().compressed_numeric().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 0.0]
        );
        assert_eq!(
            a.take(0, &[4, 0]).unwrap().compressed_numeric().unwrap(),
            vec![4.0, 0.0]
        );
        assert_eq!(
            a.flip(0).unwrap().compressed_numeric().unwrap(),
            vec![4.0, 3.0, 2.0, 1.0, 0.0]
        );
        assert!(a.take(0, &[5]).is_err());
    }

    #[test]
    fn masked_array_assign_hardness() {
        let mut mask = ArrayD::from_elem(IxDyn(&[4]), false);
        mask[[1]] = true;
        let base = MaskedArray::new(
            Elements::Numeric(ArrayD::zeros(IxDyn(&[4]))),
            Some(mask),
            DataType::Float64,
        )
        .unwrap();
        let value = MaskedArray::full(&[], 9.0, DataType::Float64);

        let mut hard = base.clone().with_hard_mask(true);
        hard.assign(&[vec![0, 1, 2, 3]], &value).unwrap();
        assert_eq!(
            hard.to_numeric_options().unwrap(),
            vec![Some(9.0), None, Some(9.0), Some(9.0)]
        );

        let mut soft = base.with_hard_mask(false);
        soft.assign(&[vec![1]], &value).unwrap();
        assert_eq!(
            soft.to_numeric_options().unwrap(),
            vec![Some(0.0), Some(9.0), Some(0.0), Some(0.0)]
        );
        assert!(!soft.is_masked());
    }

    #[test]
    fn masked_array_concatenate_and_reshape() {
        let a = arange(&[2, 2]);
        let b = MaskedArray::masked_all(&[1, 2], DataType::Float32);
        let c = MaskedArray::concatenate(0, &[a.clone(), b]).unwrap();
        assert_eq!(c.shape(), &[3, 2]);
        assert_eq!(c.data_type(), DataType::Float64);
        assert_eq!(c.count(), 4);
        let r = c.reshape(&[2, 3]).unwrap();
        assert_eq!(
            r.to_numeric_options().unwrap(),
            vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0), None, None]
        );
        let t = a.permute(&[1, 0]).unwrap();
        assert_eq!(t.compressed_numeric().unwrap(), vec![0.0, 2.0, 1.0, 3.0]);
        assert!(a.permute(&[0, 0]).is_err());
    }

    #[test]
    fn masked_array_zip_broadcast() {
        let a = arange(&[2, 3]);
        let b = arange(&[3]);
        let c = a.zip_numeric(&b, DataType::Int64, |x, y| x + y).unwrap();
        assert_eq!(
            c.compressed_numeric().unwrap(),
            vec![0.0, 2.0, 4.0, 3.0, 5.0, 7.0]
        );
        assert!(a.zip_numeric(&arange(&[2]), DataType::Int64, |x, y| x + y).is_err());
        assert_eq!(broadcast_shapes(&[4, 1, 3], &[2, 1]), Some(vec![4, 2, 3]));
        assert_eq!(broadcast_shapes(&[4, 3], &[2]), None);
    }
}
