use std::sync::Arc;

use crate::{
    array_subset::ArraySubset,
    compressed::CompressedArrayTraits,
    data_type::DataType,
    masked_array::{AxisRange, MaskedArray},
    ArrayShape,
};

use super::{
    blockwise::{BlockContext, BlockMapping, Kernel},
    reduction::ReductionNode,
    ChunkedArray, ChunkedArrayError, ComputeOptions,
};

/// A node of a lazy chunked array graph.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    Source(MaskedArray),
    Compressed(Arc<dyn CompressedArrayTraits>),
    Slice {
        input: ChunkedArray,
        ranges: Vec<AxisRange>,
    },
    Take {
        input: ChunkedArray,
        axis: usize,
        indices: Arc<Vec<usize>>,
    },
    Concatenate {
        inputs: Vec<ChunkedArray>,
        axis: usize,
    },
    Permute {
        input: ChunkedArray,
        axes: Vec<usize>,
    },
    Reshape {
        input: ChunkedArray,
    },
    InsertAxis {
        input: ChunkedArray,
        axis: usize,
    },
    RemoveAxis {
        input: ChunkedArray,
        axis: usize,
    },
    Blockwise {
        inputs: Vec<ChunkedArray>,
        mapping: BlockMapping,
        kernel: Kernel,
    },
    Reduction(ReductionNode),
    Assign {
        target: ChunkedArray,
        selection: Arc<Vec<Vec<usize>>>,
        value: ChunkedArray,
        hard_mask: bool,
    },
}

impl Node {
    /// Returns true if evaluating this node and its inputs only reads, slices and rearranges elements.
    pub(crate) fn is_cheap(&self) -> bool {
        match self {
            Self::Source(_) | Self::Compressed(_) => true,
            Self::Slice { input, .. }
            | Self::Take { input, .. }
            | Self::Permute { input, .. }
            | Self::Reshape { input }
            | Self::InsertAxis { input, .. }
            | Self::RemoveAxis { input, .. } => input.is_cheap(),
            Self::Concatenate { inputs, .. } => inputs.iter().all(ChunkedArray::is_cheap),
            Self::Blockwise { .. } | Self::Reduction(_) | Self::Assign { .. } => false,
        }
    }

    /// A short name of the node kind.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Source(_) => "source",
            Self::Compressed(_) => "decompress",
            Self::Slice { .. } => "slice",
            Self::Take { .. } => "take",
            Self::Concatenate { .. } => "concatenate",
            Self::Permute { .. } => "transpose",
            Self::Reshape { .. } => "reshape",
            Self::InsertAxis { .. } => "insert_axis",
            Self::RemoveAxis { .. } => "squeeze",
            Self::Blockwise { kernel, .. } => kernel.name,
            Self::Reduction(reduction) => reduction.reduction.name(),
            Self::Assign { .. } => "assign",
        }
    }

    /// Retrieve the elements of `subset` of the array of `shape` defined by this node.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn retrieve(
        &self,
        subset: &ArraySubset,
        shape: &[usize],
        data_type: DataType,
        options: &ComputeOptions,
    ) -> Result<MaskedArray, ChunkedArrayError> {
        match self {
            Self::Source(array) => Ok(array.subset(subset)?),
            Self::Compressed(source) => Ok(source.subarray(subset)?),
            Self::Slice { input, ranges } => {
                let mut input_ranges = Vec::with_capacity(ranges.len());
                let mut local_ranges = Vec::with_capacity(ranges.len());
                for (range, (&start, &len)) in
                    std::iter::zip(ranges, std::iter::zip(subset.start(), subset.shape()))
                {
                    let selected = AxisRange {
                        start: offset(range.start, start, range.step),
                        len,
                        step: range.step,
                    };
                    let (lo, hi) = bounds(selected.indices());
                    input_ranges.push(lo..hi);
                    local_ranges.push(AxisRange {
                        start: selected.start.saturating_sub(lo),
                        len,
                        step: range.step,
                    });
                }
                let block =
                    input.retrieve_subset_opt(&ArraySubset::new_with_ranges(&input_ranges), options)?;
                Ok(block.slice(&local_ranges)?)
            }
            Self::Take {
                input,
                axis,
                indices,
            } => {
                let axis = *axis;
                let selected = &indices[subset.start()[axis]..subset.start()[axis] + subset.shape()[axis]];
                let (lo, hi) = bounds(selected.iter().copied());
                let mut input_ranges = subset.to_ranges();
                input_ranges[axis] = lo..hi;
                let block =
                    input.retrieve_subset_opt(&ArraySubset::new_with_ranges(&input_ranges), options)?;
                let local: Vec<usize> = selected.iter().map(|i| i - lo).collect();
                if local.iter().copied().eq(0..block.shape()[axis]) {
                    Ok(block)
                } else {
                    Ok(block.take(axis, &local)?)
                }
            }
            Self::Concatenate { inputs, axis } => {
                let axis = *axis;
                let range = subset.to_ranges()[axis].clone();
                let mut offset = 0;
                let mut blocks = Vec::new();
                for input in inputs {
                    let len = input.shape()[axis];
                    let start = range.start.max(offset);
                    let end = range.end.min(offset + len);
                    if start < end {
                        let mut input_ranges = subset.to_ranges();
                        input_ranges[axis] = start - offset..end - offset;
                        let block = input.retrieve_subset_opt(
                            &ArraySubset::new_with_ranges(&input_ranges),
                            options,
                        )?;
                        blocks.push(if block.data_type() == data_type {
                            block
                        } else {
                            block.astype(data_type)?
                        });
                    }
                    offset += len;
                }
                match blocks.len() {
                    0 => Ok(MaskedArray::masked_all(subset.shape(), data_type)),
                    1 => Ok(blocks.remove(0)),
                    _ => Ok(MaskedArray::concatenate(axis, &blocks)?),
                }
            }
            Self::Permute { input, axes } => {
                let mut ranges = vec![0..0; axes.len()];
                for (range, &axis) in std::iter::zip(subset.to_ranges(), axes) {
                    ranges[axis] = range;
                }
                let block =
                    input.retrieve_subset_opt(&ArraySubset::new_with_ranges(&ranges), options)?;
                Ok(block.permute(axes)?)
            }
            Self::Reshape { input } => retrieve_reshape(input, subset, shape, data_type, options),
            Self::InsertAxis { input, axis } => {
                let mut ranges = subset.to_ranges();
                ranges.remove(*axis);
                let block =
                    input.retrieve_subset_opt(&ArraySubset::new_with_ranges(&ranges), options)?;
                Ok(block.insert_axis(*axis)?)
            }
            Self::RemoveAxis { input, axis } => {
                let mut ranges = subset.to_ranges();
                ranges.insert(*axis, 0..1);
                let block =
                    input.retrieve_subset_opt(&ArraySubset::new_with_ranges(&ranges), options)?;
                Ok(block.remove_axis(*axis)?)
            }
            Self::Blockwise {
                inputs,
                mapping,
                kernel,
            } => {
                let input_shapes: Vec<ArrayShape> = inputs.iter().map(ChunkedArray::shape).collect();
                let input_subsets: Vec<ArraySubset> = input_shapes
                    .iter()
                    .map(|input_shape| mapping.input_subset(subset, input_shape))
                    .collect();
                let blocks = std::iter::zip(inputs, &input_subsets)
                    .map(|(input, input_subset)| input.retrieve_subset_opt(input_subset, options))
                    .collect::<Result<Vec<_>, _>>()?;
                let context = BlockContext {
                    output_subset: subset,
                    output_shape: shape,
                    input_subsets: &input_subsets,
                    input_shapes: &input_shapes,
                };
                let block = (kernel.function)(&blocks, &context)?;
                if block.shape() == subset.shape() {
                    Ok(block)
                } else {
                    Err(ChunkedArrayError::IncompatibleShapes(
                        block.shape().to_vec(),
                        subset.shape().to_vec(),
                    ))
                }
            }
            Self::Reduction(reduction) => reduction.retrieve(subset, data_type, options),
            Self::Assign {
                target,
                selection,
                value,
                hard_mask,
            } => {
                let mut block = target
                    .retrieve_subset_opt(subset, options)?
                    .with_hard_mask(*hard_mask);
                let mut local = Vec::with_capacity(selection.len());
                let mut positions = Vec::with_capacity(selection.len());
                for (indices, range) in std::iter::zip(selection.iter(), subset.to_ranges()) {
                    let (axis_local, axis_positions): (Vec<usize>, Vec<usize>) = indices
                        .iter()
                        .enumerate()
                        .filter(|(_, index)| range.contains(index))
                        .map(|(position, index)| (index - range.start, position))
                        .unzip();
                    local.push(axis_local);
                    positions.push(axis_positions);
                }
                if positions.iter().any(Vec::is_empty) {
                    return Ok(block);
                }
                let value_ranges: Vec<_> = positions
                    .iter()
                    .map(|p| {
                        let (lo, hi) = bounds(p.iter().copied());
                        lo..hi
                    })
                    .collect();
                let mut value_block = value
                    .retrieve_subset_opt(&ArraySubset::new_with_ranges(&value_ranges), options)?;
                for (axis, (p, range)) in std::iter::zip(&positions, &value_ranges).enumerate() {
                    if !p.iter().copied().eq(range.clone()) {
                        let p: Vec<usize> = p.iter().map(|i| i - range.start).collect();
                        value_block = value_block.take(axis, &p)?;
                    }
                }
                block.assign(&local, &value_block)?;
                Ok(block)
            }
        }
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn offset(start: usize, steps: usize, step: isize) -> usize {
    (start as isize + steps as isize * step) as usize
}

/// The half-open bounding range of `indices`, `0..0` if empty.
fn bounds(indices: impl Iterator<Item = usize>) -> (usize, usize) {
    indices
        .fold(None, |acc: Option<(usize, usize)>, i| match acc {
            Some((lo, hi)) => Some((lo.min(i), hi.max(i + 1))),
            None => Some((i, i + 1)),
        })
        .unwrap_or((0, 0))
}

fn ravel(index: &[usize], shape: &[usize]) -> usize {
    std::iter::zip(index, shape).fold(0, |acc, (i, len)| acc * len + i)
}

fn retrieve_reshape(
    input: &ChunkedArray,
    subset: &ArraySubset,
    shape: &[usize],
    data_type: DataType,
    options: &ComputeOptions,
) -> Result<MaskedArray, ChunkedArrayError> {
    if subset.is_empty() {
        return Ok(MaskedArray::masked_all(subset.shape(), data_type));
    }
    let input_shape = input.shape();
    let flat: Vec<usize> = ndarray::indices(ndarray::IxDyn(subset.shape()))
        .into_iter()
        .map(|index| {
            let index: Vec<usize> = std::iter::zip(ndarray::Dimension::slice(&index), subset.start())
                .map(|(i, s)| i + s)
                .collect();
            ravel(&index, shape)
        })
        .collect();
    let (lo, hi) = bounds(flat.iter().copied());
    let mut input_ranges: Vec<_> = input_shape.iter().map(|len| 0..*len).collect();
    let base = if let Some(first) = input_ranges.first_mut() {
        let stride: usize = input_shape[1..].iter().product();
        let a0 = lo / stride;
        let a1 = (hi - 1) / stride + 1;
        *first = a0..a1;
        a0 * stride
    } else {
        0
    };
    let block = input.retrieve_subset_opt(&ArraySubset::new_with_ranges(&input_ranges), options)?;
    let len = block.len();
    let local: Vec<usize> = flat.iter().map(|f| f - base).collect();
    Ok(block
        .reshape(&[len])?
        .take(0, &local)?
        .reshape(subset.shape())?)
}
