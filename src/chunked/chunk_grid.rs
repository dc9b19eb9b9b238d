//! Rectilinear chunk grids.

use derive_more::Display;
use itertools::Itertools;
use thiserror::Error;

use crate::{array_subset::ArraySubset, ArrayShape};

/// A rectilinear chunk grid.
///
/// Each axis of an array is partitioned into a sequence of non-empty chunk lengths summing to the axis length.
/// An axis of length zero has no chunks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
#[display("{chunks:?}")]
pub struct ChunkGrid {
    chunks: Vec<Vec<usize>>,
}

/// An invalid chunk grid error.
#[derive(Clone, Debug, Error)]
#[error("chunks {_0:?} are invalid for array shape {_1:?}")]
pub struct InvalidChunksError(Vec<Vec<usize>>, ArrayShape);

impl ChunkGrid {
    /// Create a chunk grid from per-axis chunk lengths.
    ///
    /// # Errors
    /// Returns [`InvalidChunksError`] if the chunk lengths of an axis do not sum to the axis length or a chunk is empty.
    pub fn new(chunks: Vec<Vec<usize>>, shape: &[usize]) -> Result<Self, InvalidChunksError> {
        let valid = chunks.len() == shape.len()
            && std::iter::zip(&chunks, shape).all(|(axis_chunks, &len)| {
                axis_chunks.iter().all(|c| *c > 0) && axis_chunks.iter().sum::<usize>() == len
            });
        if valid {
            Ok(Self { chunks })
        } else {
            Err(InvalidChunksError(chunks, shape.to_vec()))
        }
    }

    /// Create a regular chunk grid, with a final partial chunk where the chunk shape does not divide the array shape.
    #[must_use]
    pub fn regular(shape: &[usize], chunk_shape: &[usize]) -> Self {
        let chunks = std::iter::zip(shape, chunk_shape)
            .map(|(&len, &chunk)| regular_axis(len, chunk))
            .collect();
        Self { chunks }
    }

    /// Create a chunk grid with a single chunk.
    #[must_use]
    pub fn single(shape: &[usize]) -> Self {
        Self::regular(shape, shape)
    }

    /// Create a regular chunk grid where each chunk holds at most `chunk_size` bytes.
    ///
    /// Trailing axes are kept whole where possible; leading axes are divided first.
    #[must_use]
    pub fn auto(shape: &[usize], element_size: usize, chunk_size: usize) -> Self {
        let mut remaining = (chunk_size / element_size.max(1)).max(1);
        let mut chunk_shape = vec![1; shape.len()];
        for (chunk, &len) in chunk_shape.iter_mut().zip(shape).rev() {
            let len = len.max(1);
            if len <= remaining {
                *chunk = len;
                remaining /= len;
            } else {
                *chunk = remaining;
                remaining = 1;
            }
        }
        Self::regular(shape, &chunk_shape)
    }

    /// The per-axis chunk lengths.
    #[must_use]
    pub fn chunks(&self) -> &[Vec<usize>] {
        &self.chunks
    }

    /// The array shape.
    #[must_use]
    pub fn array_shape(&self) -> ArrayShape {
        self.chunks.iter().map(|c| c.iter().sum()).collect()
    }

    /// The dimensionality of the grid.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.chunks.len()
    }

    /// The number of chunks along each axis.
    #[must_use]
    pub fn grid_shape(&self) -> ArrayShape {
        self.chunks.iter().map(Vec::len).collect()
    }

    /// The total number of chunks.
    #[must_use]
    pub fn num_chunks(&self) -> usize {
        self.grid_shape().iter().product()
    }

    /// The largest chunk size in elements.
    #[must_use]
    pub fn max_chunk_elements(&self) -> usize {
        self.chunks
            .iter()
            .map(|c| c.iter().copied().max().unwrap_or(0))
            .product()
    }

    /// The subset of the array covered by the chunk at `chunk_indices`.
    ///
    /// # Panics
    /// Panics if `chunk_indices` is out of bounds of the grid.
    #[must_use]
    pub fn chunk_subset(&self, chunk_indices: &[usize]) -> ArraySubset {
        let ranges: Vec<_> = std::iter::zip(chunk_indices, &self.chunks)
            .map(|(&index, axis_chunks)| {
                let start: usize = axis_chunks[..index].iter().sum();
                start..start + axis_chunks[index]
            })
            .collect();
        ArraySubset::new_with_ranges(&ranges)
    }

    /// The subsets of every chunk in row-major order.
    #[must_use]
    pub fn chunk_subsets(&self) -> Vec<ArraySubset> {
        if self.chunks.is_empty() {
            return vec![ArraySubset::new_with_shape(vec![])];
        }
        let offsets: Vec<Vec<std::ops::Range<usize>>> =
            self.chunks.iter().map(|c| axis_ranges(c)).collect();
        offsets
            .iter()
            .multi_cartesian_product()
            .map(|ranges| {
                let ranges: Vec<_> = ranges.into_iter().cloned().collect();
                ArraySubset::new_with_ranges(&ranges)
            })
            .collect()
    }

    /// The subsets of `subset` split along `axes` by chunk boundaries, in row-major order.
    ///
    /// Axes other than `axes` are not split.
    #[must_use]
    pub fn split_subset(&self, subset: &ArraySubset, axes: &[usize]) -> Vec<ArraySubset> {
        let per_axis: Vec<Vec<std::ops::Range<usize>>> = subset
            .to_ranges()
            .into_iter()
            .enumerate()
            .map(|(axis, range)| {
                if axes.contains(&axis) {
                    axis_ranges(&self.chunks[axis])
                        .into_iter()
                        .filter_map(|chunk| {
                            let start = chunk.start.max(range.start);
                            let end = chunk.end.min(range.end);
                            (start < end).then_some(start..end)
                        })
                        .collect()
                } else {
                    vec![range]
                }
            })
            .collect();
        if per_axis.is_empty() {
            return vec![subset.clone()];
        }
        per_axis
            .iter()
            .multi_cartesian_product()
            .map(|ranges| {
                let ranges: Vec<_> = ranges.into_iter().cloned().collect();
                ArraySubset::new_with_ranges(&ranges)
            })
            .collect()
    }

    /// The grid with the chunks of `axis` replaced.
    #[must_use]
    pub fn with_axis(&self, axis: usize, axis_chunks: Vec<usize>) -> Self {
        let mut chunks = self.chunks.clone();
        chunks[axis] = axis_chunks.into_iter().filter(|c| *c > 0).collect();
        Self { chunks }
    }

    /// The grid with a new axis of length one inserted at `axis`.
    #[must_use]
    pub fn insert_axis(&self, axis: usize) -> Self {
        let mut chunks = self.chunks.clone();
        chunks.insert(axis, vec![1]);
        Self { chunks }
    }

    /// The grid with `axis` removed.
    #[must_use]
    pub fn remove_axis(&self, axis: usize) -> Self {
        let mut chunks = self.chunks.clone();
        chunks.remove(axis);
        Self { chunks }
    }

    /// The grid with axes permuted.
    #[must_use]
    pub fn permute(&self, axes: &[usize]) -> Self {
        Self {
            chunks: axes.iter().map(|a| self.chunks[*a].clone()).collect(),
        }
    }

    /// The chunking of an axis after selecting `indices` from `axis`.
    ///
    /// Consecutive selected indices from the same input chunk form one output chunk.
    #[must_use]
    pub fn select_axis(&self, axis: usize, indices: impl IntoIterator<Item = usize>) -> Vec<usize> {
        let ends: Vec<usize> = self.chunks[axis]
            .iter()
            .scan(0, |offset, c| {
                *offset += c;
                Some(*offset)
            })
            .collect();
        let mut out: Vec<usize> = Vec::new();
        let mut previous = None;
        for index in indices {
            let chunk = ends.partition_point(|end| *end <= index);
            if previous == Some(chunk) {
                if let Some(last) = out.last_mut() {
                    *last += 1;
                }
            } else {
                out.push(1);
                previous = Some(chunk);
            }
        }
        out
    }
}

fn regular_axis(len: usize, chunk: usize) -> Vec<usize> {
    let chunk = chunk.max(1);
    let mut out = vec![chunk; len / chunk];
    if len % chunk != 0 {
        out.push(len % chunk);
    }
    out
}

fn axis_ranges(axis_chunks: &[usize]) -> Vec<std::ops::Range<usize>> {
    axis_chunks
        .iter()
        .scan(0, |offset, c| {
            let start = *offset;
            *offset += c;
            Some(start..*offset)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_grid_regular() {
        let grid = ChunkGrid::regular(&[5, 4], &[2, 4]);
        assert_eq!(grid.chunks(), &[vec![2, 2, 1], vec![4]]);
        assert_eq!(grid.grid_shape(), vec![3, 1]);
        assert_eq!(grid.array_shape(), vec![5, 4]);
        assert_eq!(
            grid.chunk_subset(&[2, 0]),
            ArraySubset::new_with_ranges(&[4..5, 0..4])
        );
        assert_eq!(grid.chunk_subsets().len(), 3);
        assert!(ChunkGrid::new(vec![vec![2, 2]], &[5]).is_err());
        assert!(ChunkGrid::new(vec![vec![0, 5]], &[5]).is_err());
    }

    #[test]
    fn chunk_grid_auto() {
        let grid = ChunkGrid::auto(&[100, 10, 10], 8, 8 * 250);
        assert_eq!(grid.chunks()[2], vec![10]);
        assert_eq!(grid.chunks()[1], vec![10]);
        assert_eq!(grid.chunks()[0].len(), 50);
        let scalar = ChunkGrid::auto(&[], 8, 1024);
        assert_eq!(scalar.num_chunks(), 1);
        assert_eq!(scalar.chunk_subsets().len(), 1);
    }

    #[test]
    fn chunk_grid_select_and_split() {
        let grid = ChunkGrid::regular(&[6], &[2]);
        assert_eq!(grid.select_axis(0, [5, 4, 3, 2, 1, 0]), vec![2, 2, 2]);
        assert_eq!(grid.select_axis(0, [0, 3, 1]), vec![1, 1, 1]);
        let subsets = grid.split_subset(&ArraySubset::new_with_ranges(&[1..5]), &[0]);
        assert_eq!(
            subsets,
            vec![
                ArraySubset::new_with_ranges(&[1..2]),
                ArraySubset::new_with_ranges(&[2..4]),
                ArraySubset::new_with_ranges(&[4..5]),
            ]
        );
    }
}
