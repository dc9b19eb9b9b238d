//! Hierarchical reductions.

use std::sync::Arc;

use ndarray::{ArrayD, Dimension, IxDyn};
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use rayon_iter_concurrent_limit::iter_concurrent_limit;

use crate::{
    array_subset::ArraySubset,
    data_type::DataType,
    masked_array::{Elements, MaskedArray},
};

use super::{ChunkedArray, ChunkedArrayError, ComputeOptions};

/// A reduction over the elements of a group.
///
/// The state of a group is a fixed number of `f64` components.
/// A reduction is evaluated by accumulating the non-missing elements of each chunk into a state, combining states in a tree and finalising the root state.
pub trait Reduction: core::fmt::Debug + Send + Sync {
    /// The name of the reduction.
    fn name(&self) -> &'static str;

    /// The initial state of a group with no elements.
    fn identity(&self) -> Vec<f64>;

    /// Accumulate a non-missing `value` with `weight` into `state`.
    fn accumulate(&self, state: &mut [f64], value: f64, weight: f64);

    /// Combine `other` into `state`.
    fn combine(&self, state: &mut [f64], other: &[f64]);

    /// The reduced value of a group with `count` non-missing elements, or [`None`] if it is undefined.
    fn finalize(&self, state: &[f64], count: usize) -> Option<f64>;

    /// The data type of the reduced values for an input of `data_type`.
    fn data_type(&self, data_type: DataType) -> DataType;
}

/// The accumulated states of every output element of a block.
#[derive(Debug, Clone)]
struct Partial {
    counts: Vec<usize>,
    states: Vec<f64>,
}

impl Partial {
    fn new(reduction: &dyn Reduction, num_outputs: usize) -> Self {
        let identity = reduction.identity();
        Self {
            counts: vec![0; num_outputs],
            states: std::iter::repeat(identity)
                .take(num_outputs)
                .flatten()
                .collect(),
        }
    }

    fn from_block(
        reduction: &dyn Reduction,
        block: &MaskedArray,
        weights: Option<&MaskedArray>,
        axes: &[usize],
    ) -> Result<Self, ChunkedArrayError> {
        let values = block.numeric()?;
        let output_shape: Vec<usize> = block
            .shape()
            .iter()
            .enumerate()
            .map(|(axis, &len)| if axes.contains(&axis) { 1 } else { len })
            .collect();
        let num_outputs: usize = output_shape.iter().product();
        let mut strides = vec![0; output_shape.len()];
        let mut stride = 1;
        for axis in (0..output_shape.len()).rev() {
            if !axes.contains(&axis) {
                strides[axis] = stride;
            }
            stride *= output_shape[axis];
        }

        let num_components = reduction.identity().len();
        let mut partial = Self::new(reduction, num_outputs);
        let mask = block.mask();
        let weights = match weights {
            Some(weights) => Some((weights.numeric()?, weights.mask())),
            None => None,
        };
        for (index, value) in values.indexed_iter() {
            let index = index.slice();
            if mask.is_some_and(|mask| mask[index]) {
                continue;
            }
            let weight = match &weights {
                Some((_, Some(weights_mask))) if weights_mask[index] => continue,
                Some((weights, _)) => weights[index],
                None => 1.0,
            };
            let output: usize = std::iter::zip(index, &strides).map(|(i, s)| i * s).sum();
            partial.counts[output] += 1;
            reduction.accumulate(
                &mut partial.states[output * num_components..(output + 1) * num_components],
                *value,
                weight,
            );
        }
        Ok(partial)
    }

    fn combine(mut self, other: &Self, reduction: &dyn Reduction) -> Self {
        let num_components = reduction.identity().len();
        for (count, other_count) in std::iter::zip(&mut self.counts, &other.counts) {
            *count += other_count;
        }
        for (state, other_state) in std::iter::zip(
            self.states.chunks_exact_mut(num_components.max(1)),
            other.states.chunks_exact(num_components.max(1)),
        ) {
            reduction.combine(state, other_state);
        }
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ReductionNode {
    pub(crate) input: ChunkedArray,
    pub(crate) weights: Option<ChunkedArray>,
    pub(crate) reduction: Arc<dyn Reduction>,
    pub(crate) axes: Vec<usize>,
    pub(crate) mtol: f64,
    pub(crate) split_every: usize,
}

impl ReductionNode {
    /// Reduce the input over the group of each element of `output_subset`.
    pub(crate) fn retrieve(
        &self,
        output_subset: &ArraySubset,
        data_type: DataType,
        options: &ComputeOptions,
    ) -> Result<MaskedArray, ChunkedArrayError> {
        let input_shape = self.input.shape();
        let input_ranges: Vec<_> = output_subset
            .to_ranges()
            .into_iter()
            .enumerate()
            .map(|(axis, range)| {
                if self.axes.contains(&axis) {
                    0..input_shape[axis]
                } else {
                    range
                }
            })
            .collect();
        let input_subset = ArraySubset::new_with_ranges(&input_ranges);
        let group_size: usize = self.axes.iter().map(|axis| input_shape[*axis]).product();
        let num_outputs = output_subset.num_elements();
        let reduction = self.reduction.as_ref();

        let pieces = self
            .input
            .chunk_grid()
            .split_subset(&input_subset, &self.axes);
        let retrieve_partial = |piece: ArraySubset| {
            let block = self.input.retrieve_subset_opt(&piece, options)?;
            let weights = match &self.weights {
                Some(weights) => Some(weights.retrieve_subset_opt(&piece, options)?),
                None => None,
            };
            Partial::from_block(reduction, &block, weights.as_ref(), &self.axes)
        };
        let mut partials = if input_subset.is_empty() {
            vec![]
        } else {
            iter_concurrent_limit!(
                options.concurrent_limit(),
                pieces,
                map,
                retrieve_partial
            )
            .collect::<Result<Vec<_>, ChunkedArrayError>>()?
        };

        while partials.len() > 1 {
            partials = partials
                .into_par_iter()
                .chunks(self.split_every.max(2))
                .map(|group| {
                    let mut group = group.into_iter();
                    let first = group.next().unwrap_or_else(|| Partial::new(reduction, num_outputs));
                    group.fold(first, |acc, partial| acc.combine(&partial, reduction))
                })
                .collect();
        }
        let partial = partials
            .pop()
            .unwrap_or_else(|| Partial::new(reduction, num_outputs));

        let num_components = reduction.identity().len();
        let mut values = Vec::with_capacity(num_outputs);
        let mut mask = Vec::with_capacity(num_outputs);
        for (output, &count) in partial.counts.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let missing_fraction = if group_size == 0 {
                1.0
            } else {
                (group_size - count) as f64 / group_size as f64
            };
            let state = &partial.states[output * num_components..(output + 1) * num_components];
            let value = if count == 0 || missing_fraction > self.mtol {
                None
            } else {
                reduction.finalize(state, count)
            };
            values.push(value.map_or(0.0, |v| data_type.cast(v)));
            mask.push(value.is_none());
        }
        let shape = IxDyn(output_subset.shape());
        let values = ArrayD::from_shape_vec(shape.clone(), values).map_err(|_| {
            ChunkedArrayError::IncompatibleShapes(output_subset.shape().to_vec(), vec![num_outputs])
        })?;
        let mask = ArrayD::from_shape_vec(shape, mask).map_err(|_| {
            ChunkedArrayError::IncompatibleShapes(output_subset.shape().to_vec(), vec![num_outputs])
        })?;
        Ok(MaskedArray::new(
            Elements::Numeric(values),
            Some(mask),
            data_type,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunked::ChunkGrid;

    #[derive(Debug)]
    struct Sum;

    impl Reduction for Sum {
        fn name(&self) -> &'static str {
            "sum"
        }
        fn identity(&self) -> Vec<f64> {
            vec![0.0]
        }
        fn accumulate(&self, state: &mut [f64], value: f64, weight: f64) {
            state[0] += value * weight;
        }
        fn combine(&self, state: &mut [f64], other: &[f64]) {
            state[0] += other[0];
        }
        fn finalize(&self, state: &[f64], _count: usize) -> Option<f64> {
            Some(state[0])
        }
        fn data_type(&self, data_type: DataType) -> DataType {
            data_type
        }
    }

    #[test]
    fn reduction_tree() {
        let values = ArrayD::from_shape_vec(IxDyn(&[4, 3]), (0..12).map(f64::from).collect())
            .unwrap();
        let mut mask = ArrayD::from_elem(IxDyn(&[4, 3]), false);
        mask[[1, 1]] = true;
        let array = MaskedArray::new(Elements::Numeric(values), Some(mask), DataType::Float64)
            .unwrap();
        let chunked = ChunkedArray::from_masked_array(array, Some(ChunkGrid::regular(&[4, 3], &[1, 2])))
            .unwrap();
        for split_every in [2, 3, 8] {
            let sum = chunked
                .reduction(Arc::new(Sum), &[0, 1], None, 1.0, split_every)
                .unwrap()
                .compute()
                .unwrap();
            assert_eq!(sum.shape(), &[1, 1]);
            assert_eq!(sum.to_numeric_options().unwrap(), vec![Some(62.0)]);
        }
        let columns = chunked
            .reduction(Arc::new(Sum), &[0], None, 0.0, 4)
            .unwrap()
            .compute()
            .unwrap();
        assert_eq!(
            columns.to_numeric_options().unwrap(),
            vec![Some(18.0), None, Some(26.0)]
        );
    }
}
