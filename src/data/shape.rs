//! Shape operations.
//!
//! Axis identifiers follow their axes through permutations, and new axes get new identifiers.
//! An axis which is removed, flattened or changes length is no longer cyclic.

use crate::chunked::ChunkedArray;

use super::{axes::new_axis_identifier, Data, DataError};

impl Data {
    /// Permute the axes, reversing them if `axes` is [`None`].
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if `axes` is not a permutation of the axes.
    pub fn transpose(&self, axes: Option<&[usize]>) -> Result<Self, DataError> {
        let axes: Vec<usize> = match axes {
            Some(axes) => axes.to_vec(),
            None => (0..self.ndim()).rev().collect(),
        };
        if axes.len() != self.ndim() {
            return Err(DataError::Index(format!(
                "axes {axes:?} do not match an array of dimension {}",
                self.ndim()
            )));
        }
        self.normalize_axes(Some(&axes))?;
        let array = self.array.transpose(&axes)?;
        let ids = axes.iter().map(|&axis| self.axes[axis].clone()).collect();
        Ok(self.with_chunked_array_and_axes(array, ids))
    }

    /// Interchange two axes.
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if either axis is out of bounds.
    pub fn swapaxes(&self, axis0: usize, axis1: usize) -> Result<Self, DataError> {
        self.check_axis(axis0)?;
        self.check_axis(axis1)?;
        let mut axes: Vec<usize> = (0..self.ndim()).collect();
        axes.swap(axis0, axis1);
        self.transpose(Some(&axes))
    }

    /// Remove the axis at position `axis`, which must have length one.
    pub(super) fn remove_axis(&self, axis: usize) -> Result<Self, DataError> {
        let array = self.array.squeeze(axis)?;
        let mut ids = self.axes.clone();
        ids.remove(axis);
        Ok(self.with_chunked_array_and_axes(array, ids))
    }

    /// Remove axes of length one, every such axis if `axes` is [`None`].
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if an axis is out of bounds, or [`DataError::Value`] if an axis does not have length one.
    pub fn squeeze(&self, axes: Option<&[usize]>) -> Result<Self, DataError> {
        let shape = self.shape();
        let axes = match axes {
            Some(axes) => {
                let axes = self.normalize_axes(Some(axes))?;
                if let Some(&axis) = axes.iter().find(|&&axis| shape[axis] != 1) {
                    return Err(DataError::Value(format!(
                        "cannot squeeze axis {axis} of length {}",
                        shape[axis]
                    )));
                }
                axes
            }
            None => (0..shape.len()).filter(|&axis| shape[axis] == 1).collect(),
        };
        axes.iter()
            .rev()
            .try_fold(self.clone(), |data, &axis| data.remove_axis(axis))
    }

    /// Insert a new axis of length one at `position`, with a new identifier.
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if `position` is greater than the number of dimensions.
    pub fn insert_dimension(&self, position: usize) -> Result<Self, DataError> {
        if position > self.ndim() {
            return Err(DataError::Index(format!(
                "cannot insert an axis at position {position} of an array of dimension {}",
                self.ndim()
            )));
        }
        let array = self.array.insert_axis(position)?;
        let mut ids = self.axes.clone();
        ids.insert(position, new_axis_identifier(&self.axes));
        Ok(self.with_chunked_array_and_axes(array, ids))
    }

    /// Reverse the order of elements along `axes`, every axis if [`None`].
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if an axis is out of bounds or repeated.
    pub fn flip(&self, axes: Option<&[usize]>) -> Result<Self, DataError> {
        let axes = self.normalize_axes(axes)?;
        let array = axes
            .iter()
            .try_fold(self.array.clone(), |array, &axis| array.flip(axis))?;
        Ok(self.with_chunked_array(array))
    }

    /// Roll the elements along `axis` by `shift` positions.
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if the axis is out of bounds.
    pub fn roll(&self, axis: usize, shift: isize) -> Result<Self, DataError> {
        self.check_axis(axis)?;
        let array = self.array.roll(axis, shift)?;
        Ok(self.with_chunked_array(array))
    }

    /// Flatten `axes` (every axis if [`None`]) into a single axis with a new identifier, at the position of the first of them.
    ///
    /// The flattened axes are taken in increasing order.
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if an axis is out of bounds or repeated.
    pub fn flatten(&self, axes: Option<&[usize]>) -> Result<Self, DataError> {
        let axes = self.normalize_axes(axes)?;
        let (Some(&first), true) = (axes.first(), axes.len() > 1) else {
            return Ok(self.clone());
        };
        let shape = self.shape();
        let before = (0..first).filter(|axis| !axes.contains(axis));
        let after = (first..shape.len()).filter(|axis| !axes.contains(axis));
        let permutation: Vec<usize> = before
            .clone()
            .chain(axes.iter().copied())
            .chain(after.clone())
            .collect();

        let mut new_shape: Vec<usize> = before.clone().map(|axis| shape[axis]).collect();
        new_shape.push(axes.iter().map(|&axis| shape[axis]).product());
        new_shape.extend(after.clone().map(|axis| shape[axis]));

        let mut ids: Vec<String> = before.map(|axis| self.axes[axis].clone()).collect();
        ids.push(new_axis_identifier(&self.axes));
        ids.extend(after.map(|axis| self.axes[axis].clone()));

        tracing::debug!(?axes, ?new_shape, "flattening axes");
        let array = self
            .array
            .transpose(&permutation)?
            .reshape(&new_shape, self.config.chunk_size())?;
        Ok(self.with_chunked_array_and_axes(array, ids))
    }

    /// Concatenate arrays along `axis`.
    ///
    /// The elements of every array are converted to the units of the first, and the result takes the axes, hardness and configuration of the first.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if `arrays` is empty, [`DataError::Units`] if the units are not equivalent, or another [`DataError`] if the shapes or data types are incompatible.
    pub fn concatenate(arrays: &[Self], axis: usize) -> Result<Self, DataError> {
        let first = arrays
            .first()
            .ok_or_else(|| DataError::Value("cannot concatenate zero arrays".to_string()))?;
        first.check_axis(axis)?;
        let conformed = arrays
            .iter()
            .map(|data| Ok(data.conformed_to(&first.units)?.array))
            .collect::<Result<Vec<ChunkedArray>, DataError>>()?;
        let array = ChunkedArray::concatenate(axis, &conformed)?;
        let mut data = first.with_chunked_array(array);
        if arrays.len() > 1 {
            data.cyclic.remove(&first.axes[axis]);
        }
        Ok(data)
    }

    /// Change the chunks, one list of chunk lengths per axis.
    ///
    /// Rechunking does not change the elements, so a compressed source is retained.
    ///
    /// # Errors
    /// Returns [`DataError::ChunkedArray`] if the chunks do not match the shape.
    pub fn rechunk(&self, chunks: Vec<Vec<usize>>) -> Result<Self, DataError> {
        let array = self.array.rechunk(chunks)?;
        Ok(self.with_chunked_array_retaining_source(array))
    }
}

#[cfg(test)]
mod tests {
    use crate::units::Units;

    use super::*;

    fn arange(shape: &[usize]) -> Data {
        let len = shape.iter().product::<usize>();
        #[allow(clippy::cast_precision_loss)]
        let values = (0..len).map(|v| v as f64).collect();
        Data::from_vec(values, shape, Units::new("m").unwrap()).unwrap()
    }

    fn values(data: &Data) -> Vec<f64> {
        data.compute()
            .unwrap()
            .to_numeric_options()
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    #[test]
    fn shape_transpose() {
        let mut data = arange(&[2, 3]);
        data.set_cyclic(&[1], true).unwrap();
        let transposed = data.transpose(None).unwrap();
        assert_eq!(transposed.shape(), vec![3, 2]);
        assert_eq!(transposed.axes(), &["dim1".to_string(), "dim0".to_string()]);
        assert_eq!(transposed.cyclic(), vec![0]);
        assert_eq!(values(&transposed), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
        assert_eq!(
            values(&data.swapaxes(0, 1).unwrap()),
            values(&transposed)
        );
        assert!(data.transpose(Some(&[0, 0])).is_err());
        assert!(data.transpose(Some(&[0])).is_err());
    }

    #[test]
    fn shape_squeeze_insert() {
        let data = arange(&[1, 3, 1]);
        let squeezed = data.squeeze(None).unwrap();
        assert_eq!(squeezed.shape(), vec![3]);
        assert_eq!(squeezed.axes(), &["dim1".to_string()]);
        assert_eq!(data.squeeze(Some(&[2])).unwrap().shape(), vec![1, 3]);
        assert!(matches!(
            data.squeeze(Some(&[1])),
            Err(DataError::Value(_))
        ));
        let inserted = squeezed.insert_dimension(1).unwrap();
        assert_eq!(inserted.shape(), vec![3, 1]);
        assert_eq!(inserted.axes(), &["dim1".to_string(), "dim2".to_string()]);
        assert!(squeezed.insert_dimension(3).is_err());
    }

    #[test]
    fn shape_flip_roll() {
        let data = arange(&[2, 2]);
        assert_eq!(values(&data.flip(None).unwrap()), vec![3.0, 2.0, 1.0, 0.0]);
        assert_eq!(
            values(&data.flip(Some(&[1])).unwrap()),
            vec![1.0, 0.0, 3.0, 2.0]
        );
        let data = arange(&[4]);
        assert_eq!(
            values(&data.roll(0, 1).unwrap()),
            vec![3.0, 0.0, 1.0, 2.0]
        );
    }

    #[test]
    fn shape_flatten() {
        let mut data = arange(&[2, 3, 2]);
        data.set_cyclic(&[1], true).unwrap();
        let flattened = data.flatten(Some(&[0, 2])).unwrap();
        assert_eq!(flattened.shape(), vec![4, 3]);
        assert_eq!(flattened.axes(), &["dim3".to_string(), "dim1".to_string()]);
        assert_eq!(flattened.cyclic(), vec![1]);
        assert_eq!(
            values(&flattened),
            vec![0.0, 2.0, 4.0, 1.0, 3.0, 5.0, 6.0, 8.0, 10.0, 7.0, 9.0, 11.0]
        );
        assert_eq!(data.flatten(None).unwrap().shape(), vec![12]);
        assert_eq!(data.flatten(Some(&[1])).unwrap().shape(), vec![2, 3, 2]);
    }

    #[test]
    fn shape_concatenate() {
        let mut a = arange(&[2]);
        a.set_cyclic(&[0], true).unwrap();
        let b = Data::from_vec(vec![100.0], &[1], Units::new("cm").unwrap()).unwrap();
        let joined = Data::concatenate(&[a.clone(), b], 0).unwrap();
        assert_eq!(joined.shape(), vec![3]);
        assert_eq!(joined.units().as_str(), "m");
        assert_eq!(values(&joined), vec![0.0, 1.0, 1.0]);
        assert!(joined.cyclic().is_empty());
        let kelvin = Data::from_vec(vec![1.0], &[1], Units::new("K").unwrap()).unwrap();
        assert!(Data::concatenate(&[a, kelvin], 0).is_err());
        assert!(Data::concatenate(&[], 0).is_err());
    }

    #[test]
    fn shape_rechunk() {
        let data = arange(&[4]);
        let rechunked = data.rechunk(vec![vec![1, 3]]).unwrap();
        assert_eq!(rechunked.chunks(), &[vec![1, 3]]);
        assert_eq!(values(&rechunked), values(&data));
        assert!(data.rechunk(vec![vec![3]]).is_err());
    }
}
