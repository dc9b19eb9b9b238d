//! Axis identifiers and cyclic axes.
//!
//! Every axis of a [`Data`] has an identifier which is independent of its position, and a cyclic axis is tracked by identifier.
//! The cyclic set is always a subset of the axis identifiers.

use crate::chunked::ChunkedArray;

use super::{Data, DataError};

/// An identifier of the form `dimN` which is not in `existing`.
pub(super) fn new_axis_identifier(existing: &[String]) -> String {
    (existing.len()..)
        .map(|n| format!("dim{n}"))
        .find(|identifier| !existing.contains(identifier))
        .unwrap_or_default()
}

impl Data {
    /// The axis identifiers, one per dimension.
    #[must_use]
    pub fn axes(&self) -> &[String] {
        &self.axes
    }

    /// The positions of the cyclic axes, in increasing order.
    #[must_use]
    pub fn cyclic(&self) -> Vec<usize> {
        self.axes
            .iter()
            .enumerate()
            .filter_map(|(position, axis)| self.cyclic.contains(axis).then_some(position))
            .collect()
    }

    /// Returns true if the axis at `position` is cyclic.
    #[must_use]
    pub fn is_cyclic(&self, position: usize) -> bool {
        self.axes
            .get(position)
            .is_some_and(|axis| self.cyclic.contains(axis))
    }

    /// Set (or unset, if `cyclic` is false) the cyclicity of the axes at `positions`.
    ///
    /// Returns the positions of the cyclic axes before the change.
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if a position is out of bounds.
    pub fn set_cyclic(&mut self, positions: &[usize], cyclic: bool) -> Result<Vec<usize>, DataError> {
        for &position in positions {
            self.check_axis(position)?;
        }
        let previous = self.cyclic();
        for &position in positions {
            let axis = &self.axes[position];
            if cyclic {
                self.cyclic.insert(axis.clone());
            } else {
                self.cyclic.remove(axis);
            }
        }
        Ok(previous)
    }

    pub(super) fn check_axis(&self, axis: usize) -> Result<(), DataError> {
        if axis < self.ndim() {
            Ok(())
        } else {
            Err(DataError::Index(format!(
                "axis {axis} is out of bounds for an array of dimension {}",
                self.ndim()
            )))
        }
    }

    /// Sorted, validated axis positions, or every axis if `axes` is [`None`].
    pub(super) fn normalize_axes(&self, axes: Option<&[usize]>) -> Result<Vec<usize>, DataError> {
        let Some(axes) = axes else {
            return Ok((0..self.ndim()).collect());
        };
        let mut normalized = Vec::with_capacity(axes.len());
        for &axis in axes {
            self.check_axis(axis)?;
            if normalized.contains(&axis) {
                return Err(DataError::Index(format!("axis {axis} is repeated")));
            }
            normalized.push(axis);
        }
        normalized.sort_unstable();
        Ok(normalized)
    }

    /// Replace the axis identifiers, dropping cyclic axes which no longer exist.
    pub(super) fn with_axes(mut self, axes: Vec<String>) -> Self {
        self.cyclic.retain(|axis| axes.contains(axis));
        self.axes = axes;
        self
    }

    /// Return a copy with `array` and the axis identifiers `axes`, for an array whose dimensionality may differ.
    ///
    /// Cyclic axes are kept if their identifier is in `axes`.
    pub(super) fn with_chunked_array_and_axes(&self, array: ChunkedArray, axes: Vec<String>) -> Self {
        let mut data = self.with_chunked_array(array);
        data.cyclic.clone_from(&self.cyclic);
        data.with_axes(axes)
    }

    /// Drop from the cyclic set every axis whose length differs from `old_shape`.
    pub(super) fn drop_resized_cyclic_axes(&mut self, old_shape: &[usize]) {
        let shape = self.shape();
        for (axis, (old, new)) in self.axes.iter().zip(std::iter::zip(old_shape, &shape)) {
            if old != new && self.cyclic.remove(axis) {
                tracing::debug!(axis, old, new, "axis is no longer cyclic after a change of length");
            }
        }
    }
}
