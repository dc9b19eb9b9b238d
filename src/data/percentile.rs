//! Order statistics: percentiles, the median and unique values.

use derive_more::Display;
use ndarray::{ArrayD, IxDyn};

use crate::{
    chunked::{BlockContext, ChunkGrid, ChunkedArray, ChunkedArrayError},
    data_type::DataType,
    masked_array::{Elements, MaskedArray},
};

use super::{axes::new_axis_identifier, CollapseOptions, Data, DataError};

/// The interpolation of a percentile which lies between two elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Interpolation {
    /// `i + (j - i) * fraction`.
    #[default]
    #[display("linear")]
    Linear,
    /// `i`.
    #[display("lower")]
    Lower,
    /// `j`.
    #[display("higher")]
    Higher,
    /// `i` or `j`, whichever is nearest, rounding half to even.
    #[display("nearest")]
    Nearest,
    /// `(i + j) / 2`.
    #[display("midpoint")]
    Midpoint,
}

impl Interpolation {
    /// The percentile `rank` of the sorted, non-empty `values`.
    #[allow(
        clippy::float_cmp,
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn percentile(self, values: &[f64], rank: f64) -> f64 {
        let position = rank / 100.0 * (values.len() - 1) as f64;
        let lower = position.floor();
        let fraction = position - lower;
        let i = lower as usize;
        let j = (i + 1).min(values.len() - 1);
        match self {
            Self::Linear => values[i] + (values[j] - values[i]) * fraction,
            Self::Lower => values[i],
            Self::Higher => {
                if fraction > 0.0 {
                    values[j]
                } else {
                    values[i]
                }
            }
            Self::Nearest => {
                if fraction > 0.5 || (fraction == 0.5 && i % 2 == 1) {
                    values[j]
                } else {
                    values[i]
                }
            }
            Self::Midpoint => {
                if fraction > 0.0 {
                    (values[i] + values[j]) / 2.0
                } else {
                    values[i]
                }
            }
        }
    }

    const fn preserves_data_type(self) -> bool {
        matches!(self, Self::Lower | Self::Higher | Self::Nearest)
    }
}

/// The percentiles of every lane of a block whose lane axes are whole.
///
/// The output is rank-major, with the lane axes reduced to length one.
#[allow(clippy::cast_precision_loss)]
fn lane_percentiles(
    block: &MaskedArray,
    context: &BlockContext<'_>,
    lane_axes: &[usize],
    ranks: &[f64],
    interpolation: Interpolation,
    mtol: f64,
    data_type: DataType,
) -> Result<MaskedArray, ChunkedArrayError> {
    let shape = block.shape();
    let kept: Vec<usize> = (0..shape.len()).filter(|axis| !lane_axes.contains(axis)).collect();
    let lane_len: usize = lane_axes.iter().map(|&axis| shape[axis]).product();
    let num_lanes: usize = kept.iter().map(|&axis| shape[axis]).product();
    let permutation: Vec<usize> = kept.iter().chain(lane_axes).copied().collect();
    let permuted = block.permute(&permutation)?;
    let values: Vec<f64> = permuted.numeric()?.iter().copied().collect();
    let mask: Vec<bool> = permuted.mask_or_false().iter().copied().collect();

    let mut out_values = vec![0.0; ranks.len() * num_lanes];
    let mut out_mask = vec![false; ranks.len() * num_lanes];
    for lane in 0..num_lanes {
        let lane_range = lane * lane_len..(lane + 1) * lane_len;
        let mut valid: Vec<f64> = std::iter::zip(&values[lane_range.clone()], &mask[lane_range])
            .filter_map(|(value, masked)| (!masked).then_some(*value))
            .collect();
        let missing = (lane_len - valid.len()) as f64 / lane_len.max(1) as f64;
        let masked = valid.is_empty() || missing > mtol;
        valid.sort_by(f64::total_cmp);
        for (r, &rank) in ranks.iter().enumerate() {
            let index = r * num_lanes + lane;
            if masked {
                out_mask[index] = true;
            } else {
                out_values[index] = data_type.cast(interpolation.percentile(&valid, rank));
            }
        }
    }

    let out_shape = IxDyn(context.output_subset.shape());
    let out_values = ArrayD::from_shape_vec(out_shape.clone(), out_values)
        .map_err(|err| ChunkedArrayError::Kernel(err.to_string()))?;
    let out_mask = ArrayD::from_shape_vec(out_shape, out_mask)
        .map_err(|err| ChunkedArrayError::Kernel(err.to_string()))?;
    Ok(MaskedArray::new(
        Elements::Numeric(out_values),
        Some(out_mask),
        data_type,
    )?)
}

impl Data {
    /// Rechunk so that each of `axes` is a single chunk.
    ///
    /// The other axes are divided until a chunk is no larger than the largest existing chunk.
    fn rechunk_whole_axes(&self, axes: &[usize]) -> Result<ChunkedArray, DataError> {
        let shape = self.shape();
        let ceiling = self.array.chunk_grid().max_chunk_elements().max(1);
        let mut chunk_shape: Vec<usize> = self
            .chunks()
            .iter()
            .map(|axis_chunks| axis_chunks.iter().copied().max().unwrap_or(0).max(1))
            .collect();
        for &axis in axes {
            chunk_shape[axis] = shape[axis].max(1);
        }
        while chunk_shape.iter().product::<usize>() > ceiling {
            let Some(axis) = (0..shape.len())
                .filter(|axis| !axes.contains(axis) && chunk_shape[*axis] > 1)
                .max_by_key(|axis| chunk_shape[*axis])
            else {
                break;
            };
            chunk_shape[axis] = chunk_shape[axis].div_ceil(2);
        }
        tracing::debug!(
            ?axes,
            ?chunk_shape,
            max_chunk_bytes = ceiling * self.data_type().size(),
            "rechunking for whole-axis percentiles"
        );
        Ok(self
            .array
            .rechunk(ChunkGrid::regular(&shape, &chunk_shape).chunks().to_vec())?)
    }

    /// The percentiles `ranks` (between 0 and 100) over the [axes](CollapseOptions::axes) of `options`.
    ///
    /// If there is more than one rank, the result has a new leading axis with one element per rank.
    /// The [missing data tolerance](CollapseOptions::mtol) and [`squeeze`](CollapseOptions::squeeze) of `options` apply, and weights are ignored.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if there are no ranks, a rank is out of range or the options are invalid, or [`DataError::DataType`] if the elements are text.
    pub fn percentile(
        &self,
        ranks: &[f64],
        options: &CollapseOptions,
        interpolation: Interpolation,
    ) -> Result<Self, DataError> {
        options.validate_mtol()?;
        self.require_numeric("percentile")?;
        if ranks.is_empty() || ranks.iter().any(|rank| !(0.0..=100.0).contains(rank)) {
            return Err(DataError::Value(format!(
                "percentile ranks must be between 0 and 100, got {ranks:?}"
            )));
        }
        let axes = self.normalize_axes(options.axes.as_deref())?;
        let data_type = if interpolation.preserves_data_type() {
            self.data_type()
        } else {
            self.float_data_type()?
        };
        let prefix = if ranks.len() > 1 {
            vec![ranks.len()]
        } else {
            Vec::new()
        };

        let lane_axes = axes.clone();
        let lane_ranks = ranks.to_vec();
        let mtol = options.mtol;
        let array = self.rechunk_whole_axes(&axes)?.map_lanes(
            "percentile",
            &prefix,
            &axes,
            data_type,
            move |block, context| {
                lane_percentiles(
                    block,
                    context,
                    &lane_axes,
                    &lane_ranks,
                    interpolation,
                    mtol,
                    data_type,
                )
            },
        )?;

        let mut ids = Vec::with_capacity(prefix.len() + self.ndim());
        if !prefix.is_empty() {
            ids.push(new_axis_identifier(&self.axes));
        }
        ids.extend(self.axes.iter().cloned());
        let mut data = self.with_chunked_array_and_axes(array, ids);
        for &axis in &axes {
            data.cyclic.remove(&self.axes[axis]);
        }
        if options.squeeze {
            for &axis in axes.iter().rev() {
                data = data.remove_axis(axis + prefix.len())?;
            }
        }
        Ok(data)
    }

    /// The median over the [axes](CollapseOptions::axes) of `options`, the linearly interpolated 50th percentile.
    ///
    /// # Errors
    /// See [`percentile`](Data::percentile).
    pub fn median(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        self.percentile(&[50.0], options, Interpolation::Linear)
    }

    /// The sorted unique non-missing values, followed by a single missing element if any element is missing.
    ///
    /// The mask is softened before computing, so the missing elements of all blocks collapse to one entry.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if the elements are text, or another [`DataError`] if the lazy graph fails to evaluate.
    pub fn unique(&self) -> Result<Self, DataError> {
        self.require_numeric("unique")?;
        let mut soft = self.clone();
        soft.soften_mask();
        let array = soft.enforce_mask_hardness()?;
        let computed = array.compute_opt(&self.compute_options())?;

        let mut values = computed.compressed_numeric()?;
        values.sort_by(f64::total_cmp);
        values.dedup_by(|a, b| a.total_cmp(b).is_eq());
        let mut mask = vec![false; values.len()];
        if computed.is_masked() {
            values.push(0.0);
            mask.push(true);
        }
        let len = values.len();
        let unique = MaskedArray::new(
            Elements::Numeric(ArrayD::from_shape_vec(IxDyn(&[len]), values).map_err(
                |err| DataError::Value(err.to_string()),
            )?),
            Some(
                ArrayD::from_shape_vec(IxDyn(&[len]), mask)
                    .map_err(|err| DataError::Value(err.to_string()))?,
            ),
            self.data_type(),
        )?;
        let array = ChunkedArray::from_masked_array_auto(unique, self.config.chunk_size());
        Ok(self.with_chunked_array_and_axes(array, vec![new_axis_identifier(&[])]))
    }
}

#[cfg(test)]
mod tests {
    use crate::units::Units;

    use super::*;

    fn values(data: &Data) -> Vec<Option<f64>> {
        data.compute().unwrap().to_numeric_options().unwrap()
    }

    #[test]
    fn percentile_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(Interpolation::Linear.percentile(&values, 50.0), 2.5);
        assert_eq!(Interpolation::Lower.percentile(&values, 50.0), 2.0);
        assert_eq!(Interpolation::Higher.percentile(&values, 50.0), 3.0);
        assert_eq!(Interpolation::Midpoint.percentile(&values, 50.0), 2.5);
        // Position 1.5 rounds to the even index 2
        assert_eq!(Interpolation::Nearest.percentile(&values, 50.0), 3.0);
        assert_eq!(Interpolation::Linear.percentile(&values, 100.0), 4.0);
        assert_eq!(Interpolation::Linear.percentile(&[7.0], 30.0), 7.0);
    }

    #[test]
    fn percentile_ranks() {
        let data = Data::masked(
            (0..12).map(f64::from).collect(),
            (0..12).map(|i| i == 4).collect(),
            &[4, 3],
            Units::new("K").unwrap(),
        )
        .unwrap();
        let median = data
            .median(&CollapseOptions::default().axes(vec![0]))
            .unwrap();
        assert_eq!(median.shape(), vec![1, 3]);
        assert_eq!(values(&median), vec![Some(4.5), Some(7.0), Some(6.5)]);
        assert_eq!(median.units().as_str(), "K");

        let ranks = data
            .percentile(
                &[0.0, 100.0],
                &CollapseOptions::default().squeeze(true),
                Interpolation::Linear,
            )
            .unwrap();
        assert_eq!(ranks.shape(), vec![2]);
        assert_eq!(values(&ranks), vec![Some(0.0), Some(11.0)]);
        assert_eq!(ranks.axes()[0], "dim2");

        assert!(data
            .percentile(&[101.0], &CollapseOptions::default(), Interpolation::Linear)
            .is_err());
        assert!(data
            .percentile(&[], &CollapseOptions::default(), Interpolation::Linear)
            .is_err());
    }

    #[test]
    fn percentile_mtol() {
        let data = Data::masked(
            vec![1.0, 2.0, 3.0, 4.0],
            vec![true, false, false, false],
            &[4],
            Units::undefined(),
        )
        .unwrap();
        let median = |mtol: f64| values(&data.median(&CollapseOptions::default().mtol(mtol)).unwrap());
        assert_eq!(median(1.0), vec![Some(3.0)]);
        assert_eq!(median(0.1), vec![None]);
    }

    #[test]
    fn unique_values() {
        let data = Data::masked(
            vec![3.0, 1.0, 3.0, 2.0, 9.0, 1.0],
            vec![false, false, false, false, true, false],
            &[2, 3],
            Units::new("m").unwrap(),
        )
        .unwrap();
        let unique = data.unique().unwrap();
        assert_eq!(unique.shape(), vec![4]);
        assert_eq!(values(&unique), vec![Some(1.0), Some(2.0), Some(3.0), None]);
        assert_eq!(unique.units().as_str(), "m");
        assert!(data.hardmask());
    }
}
