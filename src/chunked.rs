//! Lazy chunked arrays.
//!
//! A [`ChunkedArray`] is an immutable handle to a node of a lazy computation graph, partitioned into blocks by a [`ChunkGrid`].
//! Operations never touch elements; they return a new handle to a new node which references its inputs.
//! Elements are only produced when a subset is retrieved or the whole array is computed.
//!
//! Every node can produce the elements of an arbitrary [`ArraySubset`], so the chunk grid of an array is an evaluation plan rather than a storage layout:
//!  - [`ChunkedArray::compute`] evaluates every chunk of the grid in parallel (with a concurrency limit), and
//!  - [`ChunkedArray::reduction`] evaluates partial reductions per input chunk and combines them in a tree with a configurable fan-in.

mod blockwise;
mod chunk_grid;
mod chunked_array_errors;
mod node;
mod reduction;

pub use blockwise::{BlockContext, BlockKernel, BlockMapping, Boundary};
pub use chunk_grid::{ChunkGrid, InvalidChunksError};
pub use chunked_array_errors::ChunkedArrayError;
pub use reduction::Reduction;

use std::sync::Arc;

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rayon_iter_concurrent_limit::iter_concurrent_limit;

use crate::{
    array_subset::ArraySubset,
    compressed::CompressedArrayTraits,
    config::global_config,
    data_type::DataType,
    masked_array::{broadcast_shapes, AxisRange, MaskedArray},
    ArrayShape,
};

use blockwise::Kernel;
use node::Node;
use reduction::ReductionNode;

/// Options for computing a [`ChunkedArray`].
#[derive(Debug, Clone, Copy)]
pub struct ComputeOptions {
    concurrent_limit: usize,
}

impl Default for ComputeOptions {
    /// The concurrent limit is the [chunk concurrent limit](crate::config::Config#chunk-concurrent-limit) of the global configuration.
    fn default() -> Self {
        Self {
            concurrent_limit: global_config().chunk_concurrent_limit(),
        }
    }
}

impl ComputeOptions {
    /// Create compute options with a concurrent limit.
    #[must_use]
    pub fn new(concurrent_limit: usize) -> Self {
        Self {
            concurrent_limit: concurrent_limit.max(1),
        }
    }

    /// The maximum number of blocks evaluated concurrently.
    #[must_use]
    pub fn concurrent_limit(&self) -> usize {
        self.concurrent_limit
    }
}

/// The index of one axis of [`ChunkedArray::index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisIndex {
    /// A regular range.
    Range(AxisRange),
    /// A list of indices.
    List(Vec<usize>),
}

/// A lazy chunked array.
#[derive(Debug, Clone)]
pub struct ChunkedArray {
    node: Arc<Node>,
    grid: ChunkGrid,
    data_type: DataType,
}

impl ChunkedArray {
    fn from_node(node: Node, grid: ChunkGrid, data_type: DataType) -> Self {
        Self {
            node: Arc::new(node),
            grid,
            data_type,
        }
    }

    /// Create a chunked array from an in-memory masked array.
    ///
    /// If `grid` is [`None`], the array is a single chunk.
    ///
    /// # Errors
    /// Returns [`ChunkedArrayError::InvalidChunks`] if `grid` does not match the array shape.
    pub fn from_masked_array(
        array: MaskedArray,
        grid: Option<ChunkGrid>,
    ) -> Result<Self, ChunkedArrayError> {
        let grid = match grid {
            Some(grid) => ChunkGrid::new(grid.chunks().to_vec(), array.shape())?,
            None => ChunkGrid::single(array.shape()),
        };
        let data_type = array.data_type();
        Ok(Self::from_node(Node::Source(array), grid, data_type))
    }

    /// Create a chunked array from an in-memory masked array with chunks of at most `chunk_size` bytes.
    #[must_use]
    pub fn from_masked_array_auto(array: MaskedArray, chunk_size: usize) -> Self {
        let grid = ChunkGrid::auto(array.shape(), array.data_type().size(), chunk_size);
        let data_type = array.data_type();
        Self::from_node(Node::Source(array), grid, data_type)
    }

    /// Create a chunked array which decompresses `source` one chunk at a time.
    #[must_use]
    pub fn from_compressed(source: Arc<dyn CompressedArrayTraits>, chunk_size: usize) -> Self {
        let shape = source.shape().to_vec();
        let data_type = source.data_type();
        let grid = ChunkGrid::auto(&shape, data_type.size(), chunk_size);
        Self::from_node(Node::Compressed(source), grid, data_type)
    }

    /// The shape.
    #[must_use]
    pub fn shape(&self) -> ArrayShape {
        self.grid.array_shape()
    }

    /// The number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.grid.dimensionality()
    }

    /// The number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shape().iter().product()
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

    /// The chunk grid.
    #[must_use]
    pub fn chunk_grid(&self) -> &ChunkGrid {
        &self.grid
    }

    /// The per-axis chunk lengths.
    #[must_use]
    pub fn chunks(&self) -> &[Vec<usize>] {
        self.grid.chunks()
    }

    /// Returns true if the graph consists only of sources, decompression, slicing, take, concatenation and layout operations.
    #[must_use]
    pub fn is_cheap(&self) -> bool {
        self.node.is_cheap()
    }

    /// The name of the operation which produces this array.
    #[must_use]
    pub fn operation_name(&self) -> &'static str {
        self.node.name()
    }

    fn check_axis(&self, axis: usize) -> Result<(), ChunkedArrayError> {
        if axis < self.ndim() {
            Ok(())
        } else {
            Err(ChunkedArrayError::InvalidAxis(axis, self.ndim()))
        }
    }

    /// Retrieve the elements of `subset`.
    ///
    /// # Errors
    /// Returns a [`ChunkedArrayError`] if `subset` is out of bounds or a node fails to evaluate.
    pub fn retrieve_subset(&self, subset: &ArraySubset) -> Result<MaskedArray, ChunkedArrayError> {
        self.retrieve_subset_opt(subset, &ComputeOptions::default())
    }

    /// Explicit options version of [`retrieve_subset`](ChunkedArray::retrieve_subset).
    #[allow(clippy::missing_errors_doc)]
    pub fn retrieve_subset_opt(
        &self,
        subset: &ArraySubset,
        options: &ComputeOptions,
    ) -> Result<MaskedArray, ChunkedArrayError> {
        let shape = self.shape();
        if subset.dimensionality() != shape.len() || !subset.inbounds(&shape) {
            return Err(ChunkedArrayError::InvalidArraySubset(subset.clone(), shape));
        }
        let block = self
            .node
            .retrieve(subset, &shape, self.data_type, options)?;
        if block.data_type() == self.data_type {
            Ok(block)
        } else {
            Ok(block.astype(self.data_type)?)
        }
    }

    /// Compute the whole array.
    ///
    /// # Errors
    /// Returns a [`ChunkedArrayError`] if a node fails to evaluate.
    pub fn compute(&self) -> Result<MaskedArray, ChunkedArrayError> {
        self.compute_opt(&ComputeOptions::default())
    }

    /// Explicit options version of [`compute`](ChunkedArray::compute).
    #[allow(clippy::missing_errors_doc)]
    pub fn compute_opt(&self, options: &ComputeOptions) -> Result<MaskedArray, ChunkedArrayError> {
        let shape = self.shape();
        let subsets = self.grid.chunk_subsets();
        tracing::debug!(
            operation = self.operation_name(),
            num_chunks = subsets.len(),
            "computing chunked array"
        );
        match subsets.len() {
            0 => Ok(MaskedArray::masked_all(&shape, self.data_type)),
            1 => self.retrieve_subset_opt(&subsets[0], options),
            _ => {
                let retrieve_chunk = |subset: ArraySubset| {
                    let block = self.retrieve_subset_opt(&subset, options)?;
                    Ok::<_, ChunkedArrayError>((subset, block))
                };
                let blocks = iter_concurrent_limit!(
                    options.concurrent_limit(),
                    subsets,
                    map,
                    retrieve_chunk
                )
                .collect::<Result<Vec<_>, _>>()?;
                let mut output = MaskedArray::masked_all(&shape, self.data_type);
                for (subset, block) in blocks {
                    output.store_subset(&subset, &block)?;
                }
                Ok(output)
            }
        }
    }

    /// Select a regular range of elements along every axis.
    ///
    /// # Errors
    /// Returns an error if the number of ranges does not match the dimensionality or a range is out of bounds.
    pub fn slice(&self, ranges: &[AxisRange]) -> Result<Self, ChunkedArrayError> {
        let shape = self.shape();
        if ranges.len() != shape.len() {
            return Err(ChunkedArrayError::IncompatibleShapes(
                vec![ranges.len()],
                vec![shape.len()],
            ));
        }
        for (range, &len) in std::iter::zip(ranges, &shape) {
            if range.indices().any(|index| index >= len) {
                return Err(ChunkedArrayError::IncompatibleShapes(
                    vec![range.start, range.len],
                    shape.clone(),
                ));
            }
        }
        if std::iter::zip(ranges, &shape).all(|(range, &len)| range.is_full(len)) {
            return Ok(self.clone());
        }
        let chunks = ranges
            .iter()
            .enumerate()
            .map(|(axis, range)| self.grid.select_axis(axis, range.indices()))
            .collect();
        let new_shape: Vec<usize> = ranges.iter().map(|range| range.len).collect();
        let grid = ChunkGrid::new(chunks, &new_shape)?;
        Ok(Self::from_node(
            Node::Slice {
                input: self.clone(),
                ranges: ranges.to_vec(),
            },
            grid,
            self.data_type,
        ))
    }

    /// Take elements at `indices` along `axis`.
    ///
    /// # Errors
    /// Returns an error if `axis` or an index is out of bounds.
    pub fn take(&self, axis: usize, indices: &[usize]) -> Result<Self, ChunkedArrayError> {
        self.check_axis(axis)?;
        let len = self.shape()[axis];
        if let Some(index) = indices.iter().find(|index| **index >= len) {
            return Err(ChunkedArrayError::IncompatibleShapes(
                vec![*index],
                vec![len],
            ));
        }
        if indices.iter().copied().eq(0..len) {
            return Ok(self.clone());
        }
        let grid = self
            .grid
            .with_axis(axis, self.grid.select_axis(axis, indices.iter().copied()));
        Ok(Self::from_node(
            Node::Take {
                input: self.clone(),
                axis,
                indices: Arc::new(indices.to_vec()),
            },
            grid,
            self.data_type,
        ))
    }

    /// Index with a range or list of indices per axis, where at most one axis has a list.
    ///
    /// # Errors
    /// Returns an error if more than one axis has a list, or an index is out of bounds.
    pub fn index(&self, indices: &[AxisIndex]) -> Result<Self, ChunkedArrayError> {
        let shape = self.shape();
        if indices.len() != shape.len() {
            return Err(ChunkedArrayError::IncompatibleShapes(
                vec![indices.len()],
                vec![shape.len()],
            ));
        }
        let lists: Vec<usize> = indices
            .iter()
            .enumerate()
            .filter_map(|(axis, index)| matches!(index, AxisIndex::List(_)).then_some(axis))
            .collect();
        if lists.len() > 1 {
            return Err(ChunkedArrayError::Kernel(format!(
                "native indexing supports at most one list index, got lists on axes {lists:?}"
            )));
        }
        let ranges: Vec<AxisRange> = std::iter::zip(indices, &shape)
            .map(|(index, &len)| match index {
                AxisIndex::Range(range) => *range,
                AxisIndex::List(_) => AxisRange::full(len),
            })
            .collect();
        let mut array = self.slice(&ranges)?;
        for (axis, index) in indices.iter().enumerate() {
            if let AxisIndex::List(list) = index {
                array = array.take(axis, list)?;
            }
        }
        Ok(array)
    }

    /// Roll elements along `axis` by `shift` positions.
    ///
    /// # Errors
    /// Returns an error if `axis` is out of bounds.
    pub fn roll(&self, axis: usize, shift: isize) -> Result<Self, ChunkedArrayError> {
        self.check_axis(axis)?;
        let shape = self.shape();
        let len = shape[axis];
        if len == 0 {
            return Ok(self.clone());
        }
        #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let shift = shift.rem_euclid(len as isize) as usize;
        if shift == 0 {
            return Ok(self.clone());
        }
        let part = |start: usize, end: usize| {
            let mut ranges: Vec<AxisRange> = shape.iter().map(|len| AxisRange::full(*len)).collect();
            ranges[axis] = AxisRange {
                start,
                len: end - start,
                step: 1,
            };
            self.slice(&ranges)
        };
        Self::concatenate(axis, &[part(len - shift, len)?, part(0, len - shift)?])
    }

    /// Concatenate arrays along `axis`.
    ///
    /// # Errors
    /// Returns an error if `arrays` is empty, the shapes are incompatible or the data types cannot be promoted.
    pub fn concatenate(axis: usize, arrays: &[Self]) -> Result<Self, ChunkedArrayError> {
        let first = arrays
            .first()
            .ok_or_else(|| ChunkedArrayError::IncompatibleShapes(vec![], vec![]))?;
        first.check_axis(axis)?;
        let first_shape = first.shape();
        let mut axis_chunks = Vec::new();
        let mut data_type = first.data_type;
        for array in arrays {
            let shape = array.shape();
            let compatible = shape.len() == first_shape.len()
                && std::iter::zip(&shape, &first_shape)
                    .enumerate()
                    .all(|(a, (x, y))| a == axis || x == y);
            if !compatible {
                return Err(ChunkedArrayError::IncompatibleShapes(
                    first_shape,
                    shape,
                ));
            }
            data_type = data_type
                .promote(&array.data_type)
                .ok_or(ChunkedArrayError::MaskedArray(
                    crate::masked_array::MaskedArrayError::MixedElements,
                ))?;
            axis_chunks.extend_from_slice(&array.chunks()[axis]);
        }
        if arrays.len() == 1 {
            return Ok(first.clone());
        }
        let grid = first.grid.with_axis(axis, axis_chunks);
        Ok(Self::from_node(
            Node::Concatenate {
                inputs: arrays.to_vec(),
                axis,
            },
            grid,
            data_type,
        ))
    }

    /// Permute the axes.
    ///
    /// # Errors
    /// Returns an error if `axes` is not a permutation of the axes.
    pub fn transpose(&self, axes: &[usize]) -> Result<Self, ChunkedArrayError> {
        let mut sorted = axes.to_vec();
        sorted.sort_unstable();
        if !sorted.iter().copied().eq(0..self.ndim()) {
            return Err(ChunkedArrayError::IncompatibleShapes(
                axes.to_vec(),
                self.shape(),
            ));
        }
        if axes.iter().copied().eq(0..self.ndim()) {
            return Ok(self.clone());
        }
        Ok(Self::from_node(
            Node::Permute {
                input: self.clone(),
                axes: axes.to_vec(),
            },
            self.grid.permute(axes),
            self.data_type,
        ))
    }

    /// Reshape in row-major order, with chunks of at most `chunk_size` bytes.
    ///
    /// # Errors
    /// Returns [`ChunkedArrayError::IncompatibleShapes`] if the number of elements differs.
    pub fn reshape(&self, shape: &[usize], chunk_size: usize) -> Result<Self, ChunkedArrayError> {
        let current = self.shape();
        if current == shape {
            return Ok(self.clone());
        }
        if shape.iter().product::<usize>() != self.len() {
            return Err(ChunkedArrayError::IncompatibleShapes(
                current,
                shape.to_vec(),
            ));
        }
        let grid = ChunkGrid::auto(shape, self.data_type.size(), chunk_size);
        Ok(Self::from_node(
            Node::Reshape {
                input: self.clone(),
            },
            grid,
            self.data_type,
        ))
    }

    /// Insert a new axis of length one at position `axis`.
    ///
    /// # Errors
    /// Returns an error if `axis` is greater than the number of dimensions.
    pub fn insert_axis(&self, axis: usize) -> Result<Self, ChunkedArrayError> {
        if axis > self.ndim() {
            return Err(ChunkedArrayError::InvalidAxis(axis, self.ndim()));
        }
        Ok(Self::from_node(
            Node::InsertAxis {
                input: self.clone(),
                axis,
            },
            self.grid.insert_axis(axis),
            self.data_type,
        ))
    }

    /// Remove an axis of length one.
    ///
    /// # Errors
    /// Returns an error if `axis` is out of bounds or does not have length one.
    pub fn squeeze(&self, axis: usize) -> Result<Self, ChunkedArrayError> {
        self.check_axis(axis)?;
        if self.shape()[axis] != 1 {
            return Err(ChunkedArrayError::IncompatibleShapes(
                self.shape(),
                vec![1],
            ));
        }
        Ok(Self::from_node(
            Node::RemoveAxis {
                input: self.clone(),
                axis,
            },
            self.grid.remove_axis(axis),
            self.data_type,
        ))
    }

    /// Reverse the order of elements along `axis`.
    ///
    /// # Errors
    /// Returns an error if `axis` is out of bounds.
    pub fn flip(&self, axis: usize) -> Result<Self, ChunkedArrayError> {
        self.check_axis(axis)?;
        let shape = self.shape();
        if shape[axis] <= 1 {
            return Ok(self.clone());
        }
        let mut ranges: Vec<AxisRange> = shape.iter().map(|len| AxisRange::full(*len)).collect();
        ranges[axis] = AxisRange {
            start: shape[axis] - 1,
            len: shape[axis],
            step: -1,
        };
        self.slice(&ranges)
    }

    /// Change the chunk grid.
    ///
    /// # Errors
    /// Returns [`ChunkedArrayError::InvalidChunks`] if `chunks` do not match the array shape.
    pub fn rechunk(&self, chunks: Vec<Vec<usize>>) -> Result<Self, ChunkedArrayError> {
        let grid = ChunkGrid::new(chunks, &self.shape())?;
        Ok(Self {
            node: self.node.clone(),
            grid,
            data_type: self.data_type,
        })
    }

    /// Cast to `data_type`.
    ///
    /// # Errors
    /// Returns an error if converting between text and numbers.
    pub fn astype(&self, data_type: DataType) -> Result<Self, ChunkedArrayError> {
        if data_type == self.data_type {
            return Ok(self.clone());
        }
        if data_type.is_numeric() != self.data_type.is_numeric() {
            return Err(crate::masked_array::MaskedArrayError::MixedElements.into());
        }
        self.map_blocks("astype", data_type, move |block| Ok(block.astype(data_type)?))
    }

    /// Broadcast to `shape`.
    ///
    /// # Errors
    /// Returns [`ChunkedArrayError::IncompatibleShapes`] if the array does not broadcast to `shape`.
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Self, ChunkedArrayError> {
        let current = self.shape();
        if current == shape {
            return Ok(self.clone());
        }
        if broadcast_shapes(&current, shape).as_deref() != Some(shape) {
            return Err(ChunkedArrayError::IncompatibleShapes(current, shape.to_vec()));
        }
        let grid = ChunkGrid::new(broadcast_chunks(&[self], shape), shape)?;
        let kernel = Kernel {
            name: "broadcast_to",
            function: Arc::new(|blocks: &[MaskedArray], context: &BlockContext<'_>| {
                Ok(blocks[0].broadcast_to(context.output_subset.shape())?)
            }),
        };
        Ok(Self::from_node(
            Node::Blockwise {
                inputs: vec![self.clone()],
                mapping: BlockMapping::Elementwise,
                kernel,
            },
            grid,
            self.data_type,
        ))
    }

    /// Apply a kernel to the blocks of one or more arrays broadcast against each other.
    ///
    /// Each input block passed to `kernel` covers the output block after broadcasting, so it may have length one where the output does not.
    ///
    /// # Errors
    /// Returns [`ChunkedArrayError::IncompatibleShapes`] if the input shapes do not broadcast.
    pub fn elementwise(
        name: &'static str,
        inputs: &[&Self],
        data_type: DataType,
        kernel: impl Fn(&[MaskedArray], &BlockContext<'_>) -> Result<MaskedArray, ChunkedArrayError>
            + Send
            + Sync
            + 'static,
    ) -> Result<Self, ChunkedArrayError> {
        let shape = inputs
            .iter()
            .try_fold(Vec::new(), |acc: ArrayShape, input| {
                broadcast_shapes(&acc, &input.shape())
                    .ok_or_else(|| ChunkedArrayError::IncompatibleShapes(acc, input.shape()))
            })?;
        let grid = ChunkGrid::new(broadcast_chunks(inputs, &shape), &shape)?;
        Ok(Self::from_node(
            Node::Blockwise {
                inputs: inputs.iter().map(|input| (*input).clone()).collect(),
                mapping: BlockMapping::Elementwise,
                kernel: Kernel {
                    name,
                    function: Arc::new(kernel),
                },
            },
            grid,
            data_type,
        ))
    }

    /// Apply a kernel to each block.
    ///
    /// The kernel must preserve the block shape.
    ///
    /// # Errors
    /// Never fails for a single input; the signature matches [`elementwise`](ChunkedArray::elementwise).
    pub fn map_blocks(
        &self,
        name: &'static str,
        data_type: DataType,
        kernel: impl Fn(&MaskedArray) -> Result<MaskedArray, ChunkedArrayError> + Send + Sync + 'static,
    ) -> Result<Self, ChunkedArrayError> {
        Self::elementwise(name, &[self], data_type, move |blocks, _| kernel(&blocks[0]))
    }

    /// Apply a kernel to whole lanes along `axes`.
    ///
    /// The output has new leading axes of shape `prefix`, followed by the axes of the input with each of `axes` reduced to length one.
    /// The kernel receives the input block with `axes` whole and must return a block with the shape of the output subset.
    ///
    /// # Errors
    /// Returns an error if an axis is out of bounds.
    pub fn map_lanes(
        &self,
        name: &'static str,
        prefix: &[usize],
        axes: &[usize],
        data_type: DataType,
        kernel: impl Fn(&MaskedArray, &BlockContext<'_>) -> Result<MaskedArray, ChunkedArrayError>
            + Send
            + Sync
            + 'static,
    ) -> Result<Self, ChunkedArrayError> {
        for axis in axes {
            self.check_axis(*axis)?;
        }
        let mut chunks: Vec<Vec<usize>> = prefix.iter().map(|len| vec![*len]).collect();
        chunks.extend(self.chunks().iter().enumerate().map(|(axis, axis_chunks)| {
            if axes.contains(&axis) {
                vec![1]
            } else {
                axis_chunks.clone()
            }
        }));
        let mut shape = prefix.to_vec();
        shape.extend(
            self.shape()
                .iter()
                .enumerate()
                .map(|(axis, len)| if axes.contains(&axis) { 1 } else { *len }),
        );
        let chunks = chunks
            .into_iter()
            .map(|c| c.into_iter().filter(|c| *c > 0).collect())
            .collect();
        let grid = ChunkGrid::new(chunks, &shape)?;
        Ok(Self::from_node(
            Node::Blockwise {
                inputs: vec![self.clone()],
                mapping: BlockMapping::Lanes {
                    prefix: prefix.len(),
                    axes: axes.to_vec(),
                },
                kernel: Kernel {
                    name,
                    function: Arc::new(move |blocks: &[MaskedArray], context: &BlockContext<'_>| {
                        kernel(&blocks[0], context)
                    }),
                },
            },
            grid,
            data_type,
        ))
    }

    /// Apply a kernel to each block extended by a halo of `depth` elements per axis.
    ///
    /// Beyond the array bounds the halo is filled by the `boundary` rule.
    /// The kernel receives the extended block and must return a block with the shape of the output subset.
    /// The position of the output subset within the extended block is `output_subset.start - input_subsets[0].start`.
    ///
    /// # Errors
    /// Returns an error if `depth` does not match the dimensionality.
    pub fn map_overlap(
        &self,
        name: &'static str,
        depth: &[usize],
        boundary: Boundary,
        data_type: DataType,
        kernel: impl Fn(&MaskedArray, &BlockContext<'_>) -> Result<MaskedArray, ChunkedArrayError>
            + Send
            + Sync
            + 'static,
    ) -> Result<Self, ChunkedArrayError> {
        let shape = self.shape();
        if depth.len() != shape.len() {
            return Err(ChunkedArrayError::IncompatibleShapes(
                depth.to_vec(),
                shape,
            ));
        }
        let padded = self.pad(depth, boundary)?;
        let grid = padded.grid.clone();
        let mapped = Self::from_node(
            Node::Blockwise {
                inputs: vec![padded],
                mapping: BlockMapping::Overlap {
                    depth: depth.to_vec(),
                },
                kernel: Kernel {
                    name,
                    function: Arc::new(move |blocks: &[MaskedArray], context: &BlockContext<'_>| {
                        kernel(&blocks[0], context)
                    }),
                },
            },
            grid,
            data_type,
        );
        if matches!(boundary, Boundary::None) {
            return Ok(mapped);
        }
        let ranges: Vec<AxisRange> = std::iter::zip(depth, &shape)
            .map(|(&depth, &len)| AxisRange {
                start: depth,
                len,
                step: 1,
            })
            .collect();
        mapped.slice(&ranges)
    }

    fn pad(&self, depth: &[usize], boundary: Boundary) -> Result<Self, ChunkedArrayError> {
        let mut padded = self.clone();
        for (axis, &depth) in depth.iter().enumerate() {
            let len = padded.shape()[axis];
            if depth == 0 || len == 0 {
                continue;
            }
            padded = match boundary {
                Boundary::None => return Ok(self.clone()),
                Boundary::Constant(value) => {
                    let mut pad_shape = padded.shape();
                    pad_shape[axis] = depth;
                    let pad = Self::from_masked_array(
                        MaskedArray::full(&pad_shape, value, padded.data_type),
                        None,
                    )?;
                    Self::concatenate(axis, &[pad.clone(), padded, pad])?
                }
                Boundary::Periodic | Boundary::Reflect | Boundary::Mirror | Boundary::Nearest => {
                    #[allow(clippy::cast_possible_wrap)]
                    let indices = (-(depth as isize)..(len + depth) as isize)
                        .map(|position| boundary.source_index(position, len).unwrap_or(0))
                        .collect::<Vec<_>>();
                    padded.take(axis, &indices)?
                }
            };
        }
        Ok(padded)
    }

    /// Reduce over `axes`, keeping them as axes of length one.
    ///
    /// `weights`, if given, must have the shape of the array; masked weights exclude the corresponding element.
    /// An output element is masked if its group has no non-missing elements, or if the fraction of missing elements exceeds `mtol`.
    ///
    /// # Errors
    /// Returns an error if an axis is out of bounds or the weights have a different shape.
    pub fn reduction(
        &self,
        reduction: Arc<dyn Reduction>,
        axes: &[usize],
        weights: Option<&Self>,
        mtol: f64,
        split_every: usize,
    ) -> Result<Self, ChunkedArrayError> {
        for axis in axes {
            self.check_axis(*axis)?;
        }
        if let Some(weights) = weights {
            if weights.shape() != self.shape() {
                return Err(ChunkedArrayError::IncompatibleShapes(
                    weights.shape(),
                    self.shape(),
                ));
            }
        }
        let mut grid = self.grid.clone();
        let mut shape = self.shape();
        for &axis in axes {
            grid = grid.with_axis(axis, vec![1]);
            shape[axis] = 1;
        }
        let grid = ChunkGrid::new(grid.chunks().to_vec(), &shape)?;
        let data_type = reduction.data_type(self.data_type);
        tracing::debug!(
            reduction = reduction.name(),
            ?axes,
            mtol,
            split_every,
            "building reduction"
        );
        Ok(Self::from_node(
            Node::Reduction(ReductionNode {
                input: self.clone(),
                weights: weights.cloned(),
                reduction,
                axes: axes.to_vec(),
                mtol,
                split_every,
            }),
            grid,
            data_type,
        ))
    }

    /// Assign `value` to the orthogonal selection `selection` (one list of indices per axis).
    ///
    /// `value` is broadcast to the shape of the selection.
    /// If `hard_mask` is true, masked elements of the array are not changed.
    ///
    /// # Errors
    /// Returns an error if the selection is out of bounds or `value` does not broadcast to it.
    pub fn assign(
        &self,
        selection: Vec<Vec<usize>>,
        value: &Self,
        hard_mask: bool,
    ) -> Result<Self, ChunkedArrayError> {
        let shape = self.shape();
        if selection.len() != shape.len()
            || std::iter::zip(&selection, &shape)
                .any(|(indices, len)| indices.iter().any(|index| index >= len))
        {
            return Err(ChunkedArrayError::IncompatibleShapes(
                selection.iter().map(Vec::len).collect(),
                shape,
            ));
        }
        if value.data_type.is_numeric() != self.data_type.is_numeric() {
            return Err(crate::masked_array::MaskedArrayError::MixedElements.into());
        }
        let selection_shape: Vec<usize> = selection.iter().map(Vec::len).collect();
        let value = value.broadcast_to(&selection_shape)?;
        Ok(Self::from_node(
            Node::Assign {
                target: self.clone(),
                selection: Arc::new(selection),
                value,
                hard_mask,
            },
            self.grid.clone(),
            self.data_type,
        ))
    }
}

/// The chunks of an output of `shape` from inputs broadcast to it.
fn broadcast_chunks(inputs: &[&ChunkedArray], shape: &[usize]) -> Vec<Vec<usize>> {
    shape
        .iter()
        .enumerate()
        .map(|(axis, &len)| {
            inputs
                .iter()
                .find_map(|input| {
                    let offset = shape.len() - input.ndim();
                    (axis >= offset && input.shape()[axis - offset] == len)
                        .then(|| input.chunks()[axis - offset].clone())
                })
                .unwrap_or_else(|| if len == 0 { vec![] } else { vec![len] })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    fn arange(shape: &[usize], chunk_shape: &[usize]) -> ChunkedArray {
        let n = shape.iter().product::<usize>();
        #[allow(clippy::cast_precision_loss)]
        let values = ArrayD::from_shape_vec(IxDyn(shape), (0..n).map(|i| i as f64).collect())
            .unwrap();
        ChunkedArray::from_masked_array(
            MaskedArray::from_numeric(values, DataType::Int32),
            Some(ChunkGrid::regular(shape, chunk_shape)),
        )
        .unwrap()
    }

    fn values(array: &ChunkedArray) -> Vec<f64> {
        array.compute().unwrap().compressed_numeric().unwrap()
    }

    #[test]
    fn chunked_array_slice_and_take() {
        let a = arange(&[10], &[3]);
        let s = a
            .slice(&[AxisRange {
                start: 8,
                len: 4,
                step: -2,
            }])
            .unwrap();
        assert_eq!(values(&s), vec![8.0, 6.0, 4.0, 2.0]);
        assert!(s.is_cheap());
        let t = a.take(0, &[9, 0, 5]).unwrap();
        assert_eq!(values(&t), vec![9.0, 0.0, 5.0]);
        assert_eq!(values(&a.roll(0, 3).unwrap())[..4], [7.0, 8.0, 9.0, 0.0]);
        assert_eq!(values(&a.flip(0).unwrap())[0], 9.0);
    }

    #[test]
    fn chunked_array_index_orthogonal_lists() {
        let a = arange(&[3, 4], &[2, 2]);
        let i = a
            .index(&[AxisIndex::List(vec![2, 0]), AxisIndex::Range(AxisRange::full(4))])
            .unwrap();
        assert_eq!(i.shape(), vec![2, 4]);
        assert_eq!(values(&i)[..2], [8.0, 9.0]);
        assert!(a
            .index(&[AxisIndex::List(vec![0]), AxisIndex::List(vec![0])])
            .is_err());
    }

    #[test]
    fn chunked_array_layout() {
        let a = arange(&[2, 3], &[1, 2]);
        let t = a.transpose(&[1, 0]).unwrap();
        assert_eq!(t.shape(), vec![3, 2]);
        assert_eq!(values(&t), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
        let r = t.reshape(&[6], 16).unwrap();
        assert_eq!(r.chunks(), &[vec![4, 2]]);
        assert_eq!(values(&r), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
        let e = a.insert_axis(0).unwrap();
        assert_eq!(e.shape(), vec![1, 2, 3]);
        assert_eq!(e.squeeze(0).unwrap().shape(), vec![2, 3]);
        let c = ChunkedArray::concatenate(1, &[a.clone(), a.clone()]).unwrap();
        assert_eq!(c.shape(), vec![2, 6]);
        assert_eq!(values(&c)[..6], [0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
        let rechunked = c.rechunk(vec![vec![2], vec![6]]).unwrap();
        assert_eq!(values(&rechunked), values(&c));
    }

    #[test]
    fn chunked_array_elementwise_and_assign() {
        let a = arange(&[2, 3], &[1, 3]);
        let b = arange(&[3], &[3]);
        let sum = ChunkedArray::elementwise("add", &[&a, &b], DataType::Int32, |blocks, _| {
            Ok(blocks[0].zip_numeric(&blocks[1], DataType::Int32, |x, y| x + y)?)
        })
        .unwrap();
        assert!(!sum.is_cheap());
        assert_eq!(values(&sum), vec![0.0, 2.0, 4.0, 3.0, 5.0, 7.0]);

        let value = ChunkedArray::from_masked_array(
            MaskedArray::full(&[], -1.0, DataType::Int32),
            None,
        )
        .unwrap();
        let assigned = a.assign(vec![vec![1], vec![0, 2]], &value, true).unwrap();
        assert_eq!(values(&assigned), vec![0.0, 1.0, 2.0, -1.0, 4.0, -1.0]);
    }

    #[test]
    fn chunked_array_map_overlap() {
        let a = arange(&[6], &[2]);
        let sum3 = |boundary| {
            a.map_overlap("sum3", &[1], boundary, DataType::Float64, |block, context| {
                let offset = context.output_subset.start()[0] - context.input_subsets[0].start()[0];
                let values = block.numeric()?;
                let n = context.output_subset.shape()[0];
                let out: Vec<f64> = (0..n)
                    .map(|i| {
                        let centre = offset + i;
                        let lo = centre.saturating_sub(1);
                        let hi = (centre + 2).min(values.len());
                        (lo..hi).map(|j| values[[j]]).sum()
                    })
                    .collect();
                Ok(MaskedArray::from(
                    ArrayD::from_shape_vec(IxDyn(&[n]), out).unwrap(),
                ))
            })
            .unwrap()
        };
        assert_eq!(
            values(&sum3(Boundary::Periodic)),
            vec![6.0, 3.0, 6.0, 9.0, 12.0, 9.0]
        );
        assert_eq!(
            values(&sum3(Boundary::Constant(0.0))),
            vec![1.0, 3.0, 6.0, 9.0, 12.0, 9.0]
        );
    }
}
