//! Indexing and assignment.
//!
//! An index expression has one [`Index`] per axis, with an optional [`Index::Ellipsis`] standing for as many full slices as needed.
//! Missing trailing indices are full slices.
//!
//! Indexing differs from conventional array indexing in three ways:
//!  - An integer index keeps its axis as an axis of length one, unless [keepdims indexing](Data::keepdims_indexing) is disabled.
//!  - List indices on two or more axes select independently on each axis (an outer product), rather than in lock-step.
//!  - A slice which runs off one end of a cyclic axis wraps around, by rolling the axis before slicing it.

use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use crate::{
    chunked::AxisIndex,
    masked_array::{broadcast_shapes, AxisRange},
};

use super::{Data, DataError, WhereValue};

/// A slice with Python semantics.
///
/// Negative `start` and `stop` count from the end of the axis, and out of range values are clipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slice {
    /// The first index, defaults to the start (or end, for a negative step) of the axis.
    pub start: Option<isize>,
    /// The exclusive stop index, defaults to beyond the end (or start, for a negative step) of the axis.
    pub stop: Option<isize>,
    /// The step, defaults to one.
    pub step: Option<isize>,
}

impl Slice {
    /// Create a new slice.
    #[must_use]
    pub const fn new(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> Self {
        Self { start, stop, step }
    }

    /// A slice of the whole axis.
    #[must_use]
    pub const fn full() -> Self {
        Self::new(None, None, None)
    }

    /// A slice from `start` up to `stop` with a step of one.
    #[must_use]
    pub const fn range(start: isize, stop: isize) -> Self {
        Self::new(Some(start), Some(stop), None)
    }

    /// Return the slice with a step.
    #[must_use]
    pub const fn with_step(mut self, step: isize) -> Self {
        self.step = Some(step);
        self
    }

    /// The elements selected by this slice on an axis of length `len`.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if the step is zero.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn axis_range(&self, len: usize) -> Result<AxisRange, DataError> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(DataError::Value("slice step cannot be zero".to_string()));
        }
        let n = len as isize;
        let (lower, upper) = if step > 0 { (0, n) } else { (-1, n - 1) };
        let clip = |index: isize| {
            let index = if index < 0 { index + n } else { index };
            index.clamp(lower, upper)
        };
        let start = self
            .start
            .map_or(if step > 0 { lower } else { upper }, clip);
        let stop = self
            .stop
            .map_or(if step > 0 { upper } else { lower }, clip);
        let count = if step > 0 {
            (stop - start + step - 1).div_euclid(step)
        } else {
            (start - stop - step - 1).div_euclid(-step)
        };
        let count = count.max(0) as usize;
        Ok(AxisRange {
            start: if count == 0 { 0 } else { start as usize },
            len: count,
            step,
        })
    }
}

impl From<Range<isize>> for Slice {
    fn from(range: Range<isize>) -> Self {
        Self::range(range.start, range.end)
    }
}

impl From<RangeFrom<isize>> for Slice {
    fn from(range: RangeFrom<isize>) -> Self {
        Self::new(Some(range.start), None, None)
    }
}

impl From<RangeTo<isize>> for Slice {
    fn from(range: RangeTo<isize>) -> Self {
        Self::new(None, Some(range.end), None)
    }
}

impl From<RangeFull> for Slice {
    fn from(_: RangeFull) -> Self {
        Self::full()
    }
}

/// The index of one axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Index {
    /// A single element. Negative values count from the end.
    Integer(isize),
    /// A slice.
    Slice(Slice),
    /// A list of elements. Negative values count from the end.
    List(Vec<isize>),
    /// A boolean selection with one entry per element of the axis.
    Bool(Vec<bool>),
    /// As many full slices as needed to index every axis.
    Ellipsis,
}

impl From<isize> for Index {
    fn from(index: isize) -> Self {
        Self::Integer(index)
    }
}

impl From<Slice> for Index {
    fn from(slice: Slice) -> Self {
        Self::Slice(slice)
    }
}

impl From<Range<isize>> for Index {
    fn from(range: Range<isize>) -> Self {
        Self::Slice(range.into())
    }
}

impl From<RangeFrom<isize>> for Index {
    fn from(range: RangeFrom<isize>) -> Self {
        Self::Slice(range.into())
    }
}

impl From<RangeTo<isize>> for Index {
    fn from(range: RangeTo<isize>) -> Self {
        Self::Slice(range.into())
    }
}

impl From<RangeFull> for Index {
    fn from(range: RangeFull) -> Self {
        Self::Slice(range.into())
    }
}

impl From<Vec<isize>> for Index {
    fn from(list: Vec<isize>) -> Self {
        Self::List(list)
    }
}

impl From<Vec<bool>> for Index {
    fn from(selection: Vec<bool>) -> Self {
        Self::Bool(selection)
    }
}

/// An index expression resolved against a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedIndices {
    /// One index per axis, applied after rolling.
    indices: Vec<AxisIndex>,
    /// Axes indexed by an integer which are removed, in increasing order.
    dropped: Vec<usize>,
    /// Rolls applied before indexing, as `(axis, shift)`.
    roll: Vec<(usize, isize)>,
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn normalize_integer(index: isize, axis: usize, len: usize) -> Result<usize, DataError> {
    let n = len as isize;
    let normalized = if index < 0 { index + n } else { index };
    if (0..n).contains(&normalized) {
        Ok(normalized as usize)
    } else {
        Err(DataError::Index(format!(
            "index {index} is out of bounds for axis {axis} with size {len}"
        )))
    }
}

/// Rewrite a slice which runs off one end of an axis of length `size` as a roll and an in-bounds slice.
///
/// The rolled axis indexed by the returned slice selects the same elements, in the same order, as the wrapped slice.
/// Returns [`None`] if the slice does not wrap.
#[allow(clippy::cast_possible_wrap)]
fn cyclic_slice(slice: &Slice, size: usize) -> Option<(Slice, isize)> {
    let (Some(mut start), Some(mut stop)) = (slice.start, slice.stop) else {
        return None;
    };
    let step = slice.step.unwrap_or(1);
    let size = size as isize;
    if step > 0 {
        if 0 < start && start < size && (0..=start).contains(&stop) {
            start -= size;
        } else if (-size..0).contains(&start) && (-size..=start).contains(&stop) {
            stop += size;
        }
    } else if step < 0 {
        if (-size..0).contains(&start) && (start..0).contains(&stop) {
            start += size;
        } else if (0..size).contains(&start) && start < stop && stop < size {
            stop -= size;
        }
    }

    if step > 0 && (-size..0).contains(&start) && (0..=size + start).contains(&stop) {
        Some((Slice::new(Some(0), Some(stop - start), Some(step)), -start))
    } else if step < 0 && (0..size).contains(&start) && (start - size..0).contains(&stop) {
        Some((Slice::new(Some(start - stop - 1), None, Some(step)), -1 - stop))
    } else {
        None
    }
}

/// Resolve `indices` against `shape`.
///
/// Only slices of the `cyclic` axes wrap around; elsewhere a slice selects as usual, possibly nothing.
fn parse_indices(
    shape: &[usize],
    indices: &[Index],
    keepdims: bool,
    cyclic: &[usize],
) -> Result<ParsedIndices, DataError> {
    let ndim = shape.len();
    let ellipses = indices
        .iter()
        .filter(|index| matches!(index, Index::Ellipsis))
        .count();
    if ellipses > 1 {
        return Err(DataError::Index(
            "an index can only have a single ellipsis".to_string(),
        ));
    }
    let explicit = indices.len() - ellipses;
    if ndim == 0 && explicit > 0 {
        return Err(DataError::Index(
            "a scalar array can only be indexed by () or an ellipsis".to_string(),
        ));
    }
    if explicit > ndim {
        return Err(DataError::Index(format!(
            "too many indices ({explicit}) for an array of dimension {ndim}"
        )));
    }

    let full = Index::Slice(Slice::full());
    let mut expanded = Vec::with_capacity(ndim);
    for index in indices {
        if matches!(index, Index::Ellipsis) {
            expanded.extend(std::iter::repeat(&full).take(ndim - explicit));
        } else {
            expanded.push(index);
        }
    }
    expanded.resize(ndim, &full);

    let mut parsed = ParsedIndices {
        indices: Vec::with_capacity(ndim),
        dropped: Vec::new(),
        roll: Vec::new(),
    };
    for (axis, (index, &len)) in std::iter::zip(expanded, shape).enumerate() {
        let axis_index = match index {
            Index::Integer(index) => {
                let start = normalize_integer(*index, axis, len)?;
                if !keepdims {
                    parsed.dropped.push(axis);
                }
                AxisIndex::Range(AxisRange {
                    start,
                    len: 1,
                    step: 1,
                })
            }
            Index::Slice(slice) => match cyclic
                .contains(&axis)
                .then(|| cyclic_slice(slice, len))
                .flatten()
            {
                Some((slice, shift)) => {
                    parsed.roll.push((axis, shift));
                    AxisIndex::Range(slice.axis_range(len)?)
                }
                None => AxisIndex::Range(slice.axis_range(len)?),
            },
            Index::List(list) => AxisIndex::List(
                list.iter()
                    .map(|index| normalize_integer(*index, axis, len))
                    .collect::<Result<_, _>>()?,
            ),
            Index::Bool(selection) => {
                if selection.len() != len {
                    return Err(DataError::Index(format!(
                        "boolean index of length {} does not match axis {axis} with size {len}",
                        selection.len()
                    )));
                }
                AxisIndex::List(
                    selection
                        .iter()
                        .enumerate()
                        .filter_map(|(index, selected)| selected.then_some(index))
                        .collect(),
                )
            }
            Index::Ellipsis => AxisIndex::Range(AxisRange::full(len)),
        };
        parsed.indices.push(axis_index);
    }
    Ok(parsed)
}

/// The range equivalent to a list of indices with a uniform non-zero step, if there is one.
#[allow(clippy::cast_possible_wrap)]
fn uniform_range(list: &[usize]) -> Option<AxisRange> {
    let (&first, rest) = list.split_first()?;
    let step = rest
        .first()
        .map_or(1, |&second| second as isize - first as isize);
    if step == 0 {
        return None;
    }
    list.windows(2)
        .all(|pair| pair[1] as isize - pair[0] as isize == step)
        .then_some(AxisRange {
            start: first,
            len: list.len(),
            step,
        })
}

impl Data {
    /// Index the array.
    ///
    /// A slice which wraps around a cyclic axis rolls the axis first.
    /// Axes whose length changes are no longer cyclic.
    ///
    /// For example, with a cyclic axis of length 10, `-2..3` selects the elements at `8, 9, 0, 1, 2`.
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if the index expression does not match the array, or [`DataError::NotImplemented`] for more than one list index with [orthogonal indexing](Data::orthogonal_indexing) disabled.
    pub fn getitem(&self, indices: &[Index]) -> Result<Self, DataError> {
        let shape = self.shape();
        let parsed = parse_indices(&shape, indices, self.keepdims_indexing, &self.cyclic())?;

        let mut array = self.array.clone();
        for &(axis, shift) in &parsed.roll {
            tracing::debug!(axis, shift, "rolling cyclic axis before slicing");
            array = array.roll(axis, shift)?;
        }

        let lists = parsed
            .indices
            .iter()
            .filter(|index| matches!(index, AxisIndex::List(_)))
            .count();
        if lists > 1 {
            if !self.orthogonal_indexing {
                return Err(DataError::NotImplemented(
                    "indexing with more than one list index requires orthogonal indexing"
                        .to_string(),
                ));
            }
            tracing::debug!(lists, "orthogonal indexing with take along each axis");
            for (axis, index) in parsed.indices.iter().enumerate() {
                if let AxisIndex::List(list) = index {
                    array = array.take(axis, list)?;
                }
            }
            let taken = array.shape();
            let ranges: Vec<AxisRange> = std::iter::zip(&parsed.indices, taken)
                .map(|(index, len)| match index {
                    AxisIndex::Range(range) => *range,
                    AxisIndex::List(_) => AxisRange::full(len),
                })
                .collect();
            array = array.slice(&ranges)?;
        } else {
            array = array.index(&parsed.indices)?;
        }

        let mut data = self.with_chunked_array(array);
        data.drop_resized_cyclic_axes(&shape);
        for &axis in parsed.dropped.iter().rev() {
            data = data.remove_axis(axis)?;
        }
        Ok(data)
    }

    /// Index the array, then mask the elements where any of `masks` is true.
    ///
    /// Each mask is applied to the indexed array and must broadcast to its shape.
    /// Masked elements of a mask do not mask.
    ///
    /// # Errors
    /// Returns a [`DataError`] if indexing fails or a mask does not broadcast to the indexed shape.
    pub fn getitem_masked(&self, masks: &[Self], indices: &[Index]) -> Result<Self, DataError> {
        let mut data = self.getitem(indices)?;
        for mask in masks {
            data = data.where_(mask, Some(WhereValue::Masked), None)?;
        }
        Ok(data)
    }

    /// Assign `value` to the elements selected by `indices`.
    ///
    /// The units of `value` are conformed to the units of the array, and `value` is broadcast to the shape of the selection.
    /// Integer indices never drop axes here.
    /// If the mask is [hard](Data::hardmask), masked elements are not changed.
    ///
    /// # Errors
    /// Returns a [`DataError`] if
    ///  - the index expression does not match the array,
    ///  - `value` does not broadcast to the selection,
    ///  - the units of `value` are not equivalent, or
    ///  - one of the arrays is text and the other is numeric.
    pub fn setitem(&mut self, indices: &[Index], value: &Self) -> Result<(), DataError> {
        let shape = self.shape();
        let mut parsed = parse_indices(&shape, indices, true, &self.cyclic())?;

        let lists = parsed
            .indices
            .iter()
            .filter(|index| matches!(index, AxisIndex::List(_)))
            .count();
        if lists > 1 {
            for index in &mut parsed.indices {
                if let AxisIndex::List(list) = index {
                    if let Some(range) = uniform_range(list) {
                        *index = AxisIndex::Range(range);
                    }
                }
            }
        }
        let selection: Vec<Vec<usize>> = parsed
            .indices
            .iter()
            .map(|index| match index {
                AxisIndex::Range(range) => range.indices().collect(),
                AxisIndex::List(list) => list.clone(),
            })
            .collect();

        let selection_shape: Vec<usize> = selection.iter().map(Vec::len).collect();
        if broadcast_shapes(&value.shape(), &selection_shape).as_deref()
            != Some(selection_shape.as_slice())
        {
            return Err(DataError::Index(format!(
                "cannot assign a value of shape {:?} to a selection of shape {selection_shape:?}",
                value.shape()
            )));
        }
        if value.data_type().is_numeric() != self.data_type().is_numeric() {
            return Err(DataError::DataType(format!(
                "cannot assign {} elements to a {} array",
                value.data_type(),
                self.data_type()
            )));
        }
        let value = value.conformed_to(&self.units)?;

        let mut array = self.enforce_mask_hardness()?;
        for &(axis, shift) in &parsed.roll {
            array = array.roll(axis, shift)?;
        }
        let mut array = array.assign(selection, value.chunked_array(), self.hardmask)?;
        for &(axis, shift) in parsed.roll.iter().rev() {
            array = array.roll(axis, -shift)?;
        }
        *self = self.with_chunked_array(array);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: usize, len: usize, step: isize) -> AxisIndex {
        AxisIndex::Range(AxisRange { start, len, step })
    }

    #[test]
    fn slice_axis_range() {
        assert_eq!(
            Slice::full().axis_range(5).unwrap(),
            AxisRange::full(5)
        );
        assert_eq!(
            Slice::range(-3, 100).axis_range(5).unwrap(),
            AxisRange { start: 2, len: 3, step: 1 }
        );
        assert_eq!(
            Slice::full().with_step(-2).axis_range(5).unwrap(),
            AxisRange { start: 4, len: 3, step: -2 }
        );
        assert_eq!(
            Slice::new(Some(3), Some(1), None).axis_range(5).unwrap().len,
            0
        );
        assert!(Slice::full().with_step(0).axis_range(5).is_err());
    }

    #[test]
    fn parse_indices_keepdims() {
        let parsed = parse_indices(
            &[4, 5, 6],
            &[Index::Integer(-1), Index::Ellipsis],
            true,
            &[],
        )
        .unwrap();
        assert_eq!(
            parsed.indices,
            vec![range(3, 1, 1), range(0, 5, 1), range(0, 6, 1)]
        );
        assert!(parsed.dropped.is_empty());

        let parsed = parse_indices(&[4, 5], &[Index::Ellipsis, Index::Integer(2)], false, &[]).unwrap();
        assert_eq!(parsed.dropped, vec![1]);
        assert_eq!(parsed.indices[1], range(2, 1, 1));
    }

    #[test]
    fn parse_indices_invalid() {
        assert!(parse_indices(&[], &[Index::Integer(0)], true, &[]).is_err());
        assert!(parse_indices(&[], &[Index::Ellipsis], true, &[]).is_ok());
        assert!(parse_indices(&[3], &[Index::Integer(3)], true, &[]).is_err());
        assert!(parse_indices(&[3], &[Index::Ellipsis, Index::Ellipsis], true, &[]).is_err());
        assert!(parse_indices(&[3], &[Index::Integer(0), Index::Integer(0)], true, &[]).is_err());
        assert!(parse_indices(&[3], &[Index::Bool(vec![true])], true, &[]).is_err());
        assert_eq!(
            parse_indices(&[3], &[Index::Bool(vec![true, false, true])], true, &[])
                .unwrap()
                .indices,
            vec![AxisIndex::List(vec![0, 2])]
        );
    }

    #[test]
    fn cyclic_slices() {
        // -2..3 on 10 elements selects 8 9 0 1 2
        assert_eq!(
            cyclic_slice(&Slice::range(-2, 3), 10),
            Some((Slice::new(Some(0), Some(5), Some(1)), 2))
        );
        // 6..0 selects 6 7 8 9
        assert_eq!(
            cyclic_slice(&Slice::range(6, 0), 10),
            Some((Slice::new(Some(0), Some(4), Some(1)), 4))
        );
        // 3..-3 with a step of -1 selects 3 2 1 0 9 8
        assert_eq!(
            cyclic_slice(&Slice::range(3, -3).with_step(-1), 10),
            Some((Slice::new(Some(5), None, Some(-1)), 2))
        );
        assert_eq!(cyclic_slice(&Slice::range(1, 3), 10), None);
        assert_eq!(cyclic_slice(&Slice::new(None, Some(3), None), 10), None);
    }

    #[test]
    fn parse_indices_wraps_cyclic_axes_only() {
        let parsed = parse_indices(&[5], &[Index::Slice(Slice::range(2, 2))], true, &[]).unwrap();
        assert_eq!(parsed.indices, vec![range(0, 0, 1)]);
        assert!(parsed.roll.is_empty());

        let parsed = parse_indices(&[5], &[Index::Slice(Slice::range(-2, 1))], true, &[]).unwrap();
        assert_eq!(parsed.indices, vec![range(0, 0, 1)]);
        assert!(parsed.roll.is_empty());

        let parsed = parse_indices(&[5], &[Index::Slice(Slice::range(-2, 1))], true, &[0]).unwrap();
        assert_eq!(parsed.indices, vec![range(0, 3, 1)]);
        assert_eq!(parsed.roll, vec![(0, 2)]);
    }

    #[test]
    fn uniform_ranges() {
        assert_eq!(
            uniform_range(&[1, 3, 5]),
            Some(AxisRange { start: 1, len: 3, step: 2 })
        );
        assert_eq!(
            uniform_range(&[5, 4]),
            Some(AxisRange { start: 5, len: 2, step: -1 })
        );
        assert_eq!(
            uniform_range(&[2]),
            Some(AxisRange { start: 2, len: 1, step: 1 })
        );
        assert_eq!(uniform_range(&[1, 2, 4]), None);
        assert_eq!(uniform_range(&[1, 1]), None);
        assert_eq!(uniform_range(&[]), None);
    }
}
