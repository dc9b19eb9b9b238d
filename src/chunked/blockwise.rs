//! Block kernels.

use std::sync::Arc;

use crate::{array_subset::ArraySubset, masked_array::MaskedArray, ArrayShape};

use super::ChunkedArrayError;

/// The extents of a block passed to a [`BlockKernel`].
#[derive(Debug, Clone, Copy)]
pub struct BlockContext<'a> {
    /// The subset of the output array being computed.
    pub output_subset: &'a ArraySubset,
    /// The shape of the output array.
    pub output_shape: &'a [usize],
    /// The subset of each input array passed to the kernel.
    pub input_subsets: &'a [ArraySubset],
    /// The shape of each input array.
    pub input_shapes: &'a [ArrayShape],
}

/// A block kernel.
///
/// A kernel receives one block per input and must return a block with the shape of [`BlockContext::output_subset`].
pub type BlockKernel = dyn Fn(&[MaskedArray], &BlockContext<'_>) -> Result<MaskedArray, ChunkedArrayError>
    + Send
    + Sync;

/// How the subset of an output block maps to the subsets of the input blocks of a kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockMapping {
    /// Inputs broadcast against the output.
    Elementwise,
    /// The output has `prefix` new leading axes, and each of `axes` of the single input is read whole and reduced to length one.
    Lanes {
        /// The number of new leading output axes.
        prefix: usize,
        /// The input axes which are read whole.
        axes: Vec<usize>,
    },
    /// Each input block is extended by `depth` elements on both sides of each axis, clipped at the array bounds.
    Overlap {
        /// The halo depth of each axis.
        depth: Vec<usize>,
    },
}

impl BlockMapping {
    /// The input subset required to compute `output_subset`.
    #[must_use]
    pub fn input_subset(&self, output_subset: &ArraySubset, input_shape: &[usize]) -> ArraySubset {
        let ranges = output_subset.to_ranges();
        let ranges: Vec<_> = match self {
            Self::Elementwise => {
                let offset = ranges.len() - input_shape.len();
                input_shape
                    .iter()
                    .enumerate()
                    .map(|(axis, &len)| {
                        let range = ranges[axis + offset].clone();
                        if len == 1 {
                            0..range.len().min(1)
                        } else {
                            range
                        }
                    })
                    .collect()
            }
            Self::Lanes { prefix, axes } => input_shape
                .iter()
                .enumerate()
                .map(|(axis, &len)| {
                    if axes.contains(&axis) {
                        0..len
                    } else {
                        ranges[axis + prefix].clone()
                    }
                })
                .collect(),
            Self::Overlap { depth } => std::iter::zip(ranges, input_shape)
                .enumerate()
                .map(|(axis, (range, &len))| {
                    let depth = depth.get(axis).copied().unwrap_or(0);
                    range.start.saturating_sub(depth)..(range.end + depth).min(len)
                })
                .collect(),
        };
        ArraySubset::new_with_ranges(&ranges)
    }
}

/// The boundary rule of [`ChunkedArray::map_overlap`](super::ChunkedArray::map_overlap).
///
/// With the array `a b c d`, a depth of two pads as follows:
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boundary {
    /// No padding, halos are clipped at the array bounds.
    None,
    /// `c d | a b c d | a b`
    Periodic,
    /// `b a | a b c d | d c`
    Reflect,
    /// `c b | a b c d | c b`
    Mirror,
    /// `a a | a b c d | d d`
    Nearest,
    /// `k k | a b c d | k k`
    Constant(f64),
}

impl Boundary {
    /// The source index of position `position` of an axis of length `len` padded by this boundary rule.
    ///
    /// Returns [`None`] for [`Boundary::None`] and [`Boundary::Constant`] outside of the axis.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn source_index(&self, position: isize, len: usize) -> Option<usize> {
        let n = len as isize;
        if (0..n).contains(&position) {
            return Some(position as usize);
        }
        if len == 0 {
            return None;
        }
        let index = match self {
            Self::None | Self::Constant(_) => return None,
            Self::Periodic => position.rem_euclid(n),
            Self::Reflect => {
                let q = position.rem_euclid(2 * n);
                if q < n {
                    q
                } else {
                    2 * n - 1 - q
                }
            }
            Self::Mirror => {
                if n == 1 {
                    0
                } else {
                    let q = position.rem_euclid(2 * n - 2);
                    if q < n {
                        q
                    } else {
                        2 * n - 2 - q
                    }
                }
            }
            Self::Nearest => position.clamp(0, n - 1),
        };
        Some(index as usize)
    }
}

#[derive(Clone)]
pub(crate) struct Kernel {
    pub(crate) name: &'static str,
    pub(crate) function: Arc<BlockKernel>,
}

impl core::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Kernel({})", self.name)
    }
}
