//! Collapses: statistics over axes.
//!
//! Every statistic reduces the array over a set of axes (all axes by default) with one hierarchical reduction of the chunked array, optionally weighted.
//! The collapsed axes are kept with length one unless [squeezed](CollapseOptions::squeeze).
//!
//! An element of the result is missing if its group has no non-missing elements, or if the fraction of missing elements of its group exceeds the missing data tolerance [`mtol`](CollapseOptions::mtol).
//! With the default tolerance of one, only fully missing groups are missing.

use std::sync::Arc;

use crate::{
    chunked::{ChunkedArray, ChunkedArrayError, Reduction},
    data_type::DataType,
    masked_array::broadcast_shapes,
    units::Units,
};

use super::{Data, DataError};

/// The weights of a collapse.
#[derive(Debug, Clone)]
pub enum Weights {
    /// Weights which broadcast to the shape of the array.
    Array(Data),
    /// Partial weights, each spanning the axes of its key.
    ///
    /// The partial weights are combined by an outer product, and axes without a partial weight have a weight of one.
    /// The collapse is unweighted if no key contains a collapsed axis.
    Axes(Vec<(Vec<usize>, Data)>),
}

/// Options of a collapse.
#[derive(Debug, Clone)]
pub struct CollapseOptions {
    pub(super) axes: Option<Vec<usize>>,
    weights: Option<Weights>,
    pub(super) mtol: f64,
    ddof: f64,
    pub(super) squeeze: bool,
    split_every: Option<usize>,
}

impl Default for CollapseOptions {
    fn default() -> Self {
        Self {
            axes: None,
            weights: None,
            mtol: 1.0,
            ddof: 0.0,
            squeeze: false,
            split_every: None,
        }
    }
}

impl CollapseOptions {
    /// Collapse over `axes` rather than all axes.
    #[must_use]
    pub fn axes(mut self, axes: Vec<usize>) -> Self {
        self.axes = Some(axes);
        self
    }

    /// Weight the elements.
    ///
    /// Weights are ignored by statistics which do not depend on them, such as [`max`](Data::max).
    /// Masked weights exclude the corresponding elements.
    #[must_use]
    pub fn weights(mut self, weights: Weights) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Set the missing data tolerance, the largest fraction of missing elements of a group for which the result is not missing.
    ///
    /// Must be between zero and one, the default is one.
    #[must_use]
    pub fn mtol(mut self, mtol: f64) -> Self {
        self.mtol = mtol;
        self
    }

    /// Set the delta degrees of freedom of [`var`](Data::var) and [`std`](Data::std), the default is zero.
    #[must_use]
    pub fn ddof(mut self, ddof: f64) -> Self {
        self.ddof = ddof;
        self
    }

    /// Remove the collapsed axes, rather than keeping them with length one.
    #[must_use]
    pub fn squeeze(mut self, squeeze: bool) -> Self {
        self.squeeze = squeeze;
        self
    }

    pub(super) fn validate_mtol(&self) -> Result<(), DataError> {
        if (0.0..=1.0).contains(&self.mtol) {
            Ok(())
        } else {
            Err(DataError::Value(format!(
                "mtol must be between 0 and 1, got {}",
                self.mtol
            )))
        }
    }

    /// Set the fan-in of the reduction tree, instead of the [configured](crate::config::Config#split-every) default.
    #[must_use]
    pub fn split_every(mut self, split_every: usize) -> Self {
        self.split_every = Some(split_every);
        self
    }
}

pub(super) fn sum_data_type(data_type: DataType) -> DataType {
    match data_type {
        data_type if data_type.is_float() => data_type,
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            DataType::UInt64
        }
        _ => DataType::Int64,
    }
}

fn mean_data_type(data_type: DataType) -> DataType {
    if data_type == DataType::Float32 {
        data_type
    } else {
        DataType::Float64
    }
}

#[derive(Debug)]
struct Extreme {
    maximum: bool,
}

impl Reduction for Extreme {
    fn name(&self) -> &'static str {
        if self.maximum {
            "max"
        } else {
            "min"
        }
    }

    fn identity(&self) -> Vec<f64> {
        vec![if self.maximum {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }]
    }

    fn accumulate(&self, state: &mut [f64], value: f64, _weight: f64) {
        self.combine(state, &[value]);
    }

    fn combine(&self, state: &mut [f64], other: &[f64]) {
        state[0] = if self.maximum {
            state[0].max(other[0])
        } else {
            state[0].min(other[0])
        };
    }

    fn finalize(&self, state: &[f64], _count: usize) -> Option<f64> {
        Some(state[0])
    }

    fn data_type(&self, data_type: DataType) -> DataType {
        data_type
    }
}

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
        sum_data_type(data_type)
    }
}

/// The state is `[sum of weighted values, sum of weights]`.
#[derive(Debug)]
struct Mean;

impl Reduction for Mean {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn identity(&self) -> Vec<f64> {
        vec![0.0, 0.0]
    }

    fn accumulate(&self, state: &mut [f64], value: f64, weight: f64) {
        state[0] += value * weight;
        state[1] += weight;
    }

    fn combine(&self, state: &mut [f64], other: &[f64]) {
        state[0] += other[0];
        state[1] += other[1];
    }

    fn finalize(&self, state: &[f64], _count: usize) -> Option<f64> {
        (state[1] != 0.0).then(|| state[0] / state[1])
    }

    fn data_type(&self, data_type: DataType) -> DataType {
        mean_data_type(data_type)
    }
}

/// Weighted variance by West's algorithm, with the state `[V1, mean, M2, V2]`.
///
/// `V1` and `V2` are the sums of the weights and of the squared weights, and `M2` is the weighted sum of squared deviations from the mean.
#[derive(Debug)]
struct Variance {
    ddof: f64,
    weighted: bool,
}

impl Reduction for Variance {
    fn name(&self) -> &'static str {
        "var"
    }

    fn identity(&self) -> Vec<f64> {
        vec![0.0; 4]
    }

    fn accumulate(&self, state: &mut [f64], value: f64, weight: f64) {
        if weight == 0.0 {
            return;
        }
        state[0] += weight;
        let delta = value - state[1];
        state[1] += delta * weight / state[0];
        state[2] += weight * delta * (value - state[1]);
        state[3] += weight * weight;
    }

    fn combine(&self, state: &mut [f64], other: &[f64]) {
        if other[0] == 0.0 {
            return;
        }
        if state[0] == 0.0 {
            state.copy_from_slice(other);
            return;
        }
        let total = state[0] + other[0];
        let delta = other[1] - state[1];
        state[1] += delta * other[0] / total;
        state[2] += other[2] + delta * delta * state[0] * other[0] / total;
        state[0] = total;
        state[3] += other[3];
    }

    #[allow(clippy::float_cmp)]
    fn finalize(&self, state: &[f64], _count: usize) -> Option<f64> {
        let (v1, m2, v2) = (state[0], state[2], state[3]);
        if v1 == 0.0 {
            return None;
        }
        let denominator = if self.weighted && self.ddof == 1.0 {
            v1 - v2 / v1
        } else if self.weighted {
            v1
        } else {
            v1 - self.ddof
        };
        (denominator > 0.0).then(|| m2 / denominator)
    }

    fn data_type(&self, data_type: DataType) -> DataType {
        mean_data_type(data_type)
    }
}

#[derive(Debug)]
struct SampleSize;

impl Reduction for SampleSize {
    fn name(&self) -> &'static str {
        "sample_size"
    }

    fn identity(&self) -> Vec<f64> {
        vec![0.0]
    }

    fn accumulate(&self, state: &mut [f64], _value: f64, _weight: f64) {
        state[0] += 1.0;
    }

    fn combine(&self, state: &mut [f64], other: &[f64]) {
        state[0] += other[0];
    }

    fn finalize(&self, state: &[f64], _count: usize) -> Option<f64> {
        Some(state[0])
    }

    fn data_type(&self, _data_type: DataType) -> DataType {
        DataType::Int64
    }
}

#[derive(Debug)]
struct SumOfWeights {
    power: i32,
    weighted: bool,
}

impl Reduction for SumOfWeights {
    fn name(&self) -> &'static str {
        if self.power == 2 {
            "sum_of_weights2"
        } else {
            "sum_of_weights"
        }
    }

    fn identity(&self) -> Vec<f64> {
        vec![0.0]
    }

    fn accumulate(&self, state: &mut [f64], _value: f64, weight: f64) {
        state[0] += weight.powi(self.power);
    }

    fn combine(&self, state: &mut [f64], other: &[f64]) {
        state[0] += other[0];
    }

    fn finalize(&self, state: &[f64], _count: usize) -> Option<f64> {
        Some(state[0])
    }

    fn data_type(&self, _data_type: DataType) -> DataType {
        if self.weighted {
            DataType::Float64
        } else {
            DataType::Int64
        }
    }
}

/// Logical all (or any) of the non-missing elements.
#[derive(Debug)]
struct Truth {
    all: bool,
}

impl Reduction for Truth {
    fn name(&self) -> &'static str {
        if self.all {
            "all"
        } else {
            "any"
        }
    }

    fn identity(&self) -> Vec<f64> {
        vec![f64::from(u8::from(self.all))]
    }

    fn accumulate(&self, state: &mut [f64], value: f64, _weight: f64) {
        self.combine(state, &[f64::from(u8::from(value != 0.0))]);
    }

    fn combine(&self, state: &mut [f64], other: &[f64]) {
        state[0] = if self.all {
            state[0].min(other[0])
        } else {
            state[0].max(other[0])
        };
    }

    fn finalize(&self, state: &[f64], _count: usize) -> Option<f64> {
        Some(state[0])
    }

    fn data_type(&self, _data_type: DataType) -> DataType {
        DataType::Bool
    }
}

impl Data {
    /// Combine weights into one array of the shape of this array, or [`None`] if the collapse over `axes` is unweighted.
    fn parse_weights(
        &self,
        weights: Option<&Weights>,
        axes: &[usize],
    ) -> Result<Option<ChunkedArray>, DataError> {
        let shape = self.shape();
        let weights = match weights {
            None => return Ok(None),
            Some(Weights::Array(weights)) => {
                if broadcast_shapes(&weights.shape(), &shape).as_deref() != Some(shape.as_slice())
                {
                    return Err(DataError::Value(format!(
                        "weights of shape {:?} do not broadcast to shape {shape:?}",
                        weights.shape()
                    )));
                }
                weights.array.astype(DataType::Float64)?
            }
            Some(Weights::Axes(partial_weights)) => {
                let mut covered: Vec<usize> = Vec::new();
                let mut factors = Vec::with_capacity(partial_weights.len());
                for (key, weights) in partial_weights {
                    for &axis in key {
                        self.check_axis(axis)?;
                        if covered.contains(&axis) {
                            return Err(DataError::Value(format!(
                                "axis {axis} is spanned by more than one weights key"
                            )));
                        }
                        covered.push(axis);
                    }
                    factors.push(self.expanded_weights(key, weights)?);
                }
                if !covered.iter().any(|axis| axes.contains(axis)) {
                    return Ok(None);
                }
                let factors: Vec<&ChunkedArray> = factors.iter().collect();
                ChunkedArray::elementwise("outer_weights", &factors, DataType::Float64, |blocks, _| {
                    let mut blocks = blocks.iter();
                    let mut product = blocks.next().cloned().ok_or_else(|| {
                        ChunkedArrayError::Kernel("no partial weights".to_string())
                    })?;
                    for block in blocks {
                        product = product.zip_numeric(block, DataType::Float64, |a, b| a * b)?;
                    }
                    Ok(product)
                })?
            }
        };
        tracing::debug!(?axes, weights_shape = ?weights.shape(), "weighted collapse");
        Ok(Some(weights.broadcast_to(&shape)?))
    }

    /// Partial weights spanning `key`, with length one axes inserted for the other axes.
    fn expanded_weights(&self, key: &[usize], weights: &Self) -> Result<ChunkedArray, DataError> {
        let shape = self.shape();
        if weights.ndim() != key.len()
            || std::iter::zip(weights.shape(), key).any(|(len, &axis)| len != 1 && len != shape[axis])
        {
            return Err(DataError::Value(format!(
                "weights of shape {:?} do not match axes {key:?} of shape {shape:?}",
                weights.shape()
            )));
        }
        let mut sorted = key.to_vec();
        sorted.sort_unstable();
        let permutation: Vec<usize> = sorted
            .iter()
            .filter_map(|axis| key.iter().position(|k| k == axis))
            .collect();
        let mut array = weights
            .array
            .astype(DataType::Float64)?
            .transpose(&permutation)?;
        for axis in (0..shape.len()).filter(|axis| !sorted.contains(axis)) {
            array = array.insert_axis(axis)?;
        }
        Ok(array)
    }

    fn weights_units(weights: &Weights) -> Result<Units, DataError> {
        match weights {
            Weights::Array(weights) => Ok(weights.units.clone()),
            Weights::Axes(partial_weights) => partial_weights
                .iter()
                .try_fold(Units::undefined(), |units, (_, weights)| {
                    Ok(units.mul(&weights.units)?)
                }),
        }
    }

    /// Collapse with `reduction`, using the weights of `options` if `weighted`.
    fn collapse(
        &self,
        reduction: Arc<dyn Reduction>,
        options: &CollapseOptions,
        weighted: bool,
    ) -> Result<Self, DataError> {
        options.validate_mtol()?;
        self.require_numeric(reduction.name())?;
        let axes = self.normalize_axes(options.axes.as_deref())?;
        let weights = if weighted {
            self.parse_weights(options.weights.as_ref(), &axes)?
        } else {
            None
        };
        let input = if weights.is_some() {
            self.array.astype(DataType::Float64)?
        } else {
            self.array.clone()
        };
        let split_every = options.split_every.unwrap_or(self.config.split_every());
        let array = input.reduction(reduction, &axes, weights.as_ref(), options.mtol, split_every)?;

        let mut data = self.with_chunked_array(array);
        for &axis in &axes {
            data.cyclic.remove(&self.axes[axis]);
        }
        if options.squeeze {
            for &axis in axes.iter().rev() {
                data = data.remove_axis(axis)?;
            }
        }
        Ok(data)
    }

    fn is_weighted(&self, options: &CollapseOptions) -> Result<bool, DataError> {
        let axes = self.normalize_axes(options.axes.as_deref())?;
        Ok(self.parse_weights(options.weights.as_ref(), &axes)?.is_some())
    }

    /// Combine two collapses of this array elementwise.
    fn combine_collapses(
        name: &'static str,
        a: &Self,
        b: &Self,
        data_type: DataType,
        f: fn(f64, f64) -> f64,
    ) -> Result<Self, DataError> {
        let array = ChunkedArray::elementwise(name, &[&a.array, &b.array], data_type, move |blocks, _| {
            Ok(blocks[0].zip_numeric(&blocks[1], data_type, f)?)
        })?;
        Ok(a.with_chunked_array(array))
    }

    /// The maximum.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn max(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        self.collapse(Arc::new(Extreme { maximum: true }), options, false)
    }

    /// The minimum.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn min(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        self.collapse(Arc::new(Extreme { maximum: false }), options, false)
    }

    /// The maximum absolute value.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn max_abs(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        self.abs()?.max(options)
    }

    /// The minimum absolute value.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn min_abs(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        self.abs()?.min(options)
    }

    /// The (weighted) sum.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn sum(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        self.collapse(Arc::new(Sum), options, true)
    }

    /// The (weighted) sum of squares, in the square of the units.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid, the elements are text or the units cannot be squared.
    pub fn sum_of_squares(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        self.pow(&Self::scalar(2.0, Units::undefined()))?.sum(options)
    }

    /// The (weighted) mean.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn mean(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        self.collapse(Arc::new(Mean), options, true)
    }

    /// The (weighted) mean of the absolute values.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn mean_absolute_value(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        self.abs()?.mean(options)
    }

    /// The mean of the maximum and minimum.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn mid_range(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        let data_type = self.float_data_type()?;
        Self::combine_collapses(
            "mid_range",
            &self.max(options)?,
            &self.min(options)?,
            data_type,
            |max, min| (max + min) / 2.0,
        )
    }

    /// The difference between the maximum and minimum.
    ///
    /// The range of reference times is a duration.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn range(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        let range = Self::combine_collapses(
            "range",
            &self.max(options)?,
            &self.min(options)?,
            self.data_type(),
            |max, min| max - min,
        )?;
        if self.units.is_reftime() {
            let units = self.units.duration()?;
            Ok(range.with_units(units))
        } else {
            Ok(range)
        }
    }

    /// The square root of the (weighted) mean of the squares.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn root_mean_square(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        let data_type = self.float_data_type()?;
        let squares = self.array.map_blocks("square", data_type, move |block| {
            Ok(block.map_numeric(data_type, false, |v| v * v)?)
        })?;
        let mean = self.with_chunked_array(squares).mean(options)?;
        let array = mean.array.map_blocks("sqrt", data_type, move |block| {
            Ok(block.map_numeric(data_type, false, f64::sqrt)?)
        })?;
        Ok(mean.with_chunked_array(array))
    }

    fn variance(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        let weighted = self.is_weighted(options)?;
        #[allow(clippy::float_cmp)]
        if weighted && options.ddof != 0.0 && options.ddof != 1.0 {
            return Err(DataError::Value(format!(
                "weighted variance requires a ddof of 0 or 1, got {}",
                options.ddof
            )));
        }
        self.collapse(
            Arc::new(Variance {
                ddof: options.ddof,
                weighted,
            }),
            options,
            true,
        )
    }

    /// The units of the variance or standard deviation, before squaring.
    fn deviation_units(&self) -> Result<Units, DataError> {
        if self.units.is_reftime() {
            Ok(self.units.duration()?)
        } else {
            Ok(self.units.clone())
        }
    }

    /// The (weighted) variance, in the square of the units.
    ///
    /// An unweighted variance divides by the number of non-missing elements minus [`ddof`](CollapseOptions::ddof).
    /// A weighted variance divides by the sum of weights `V1` if `ddof` is 0, or by `V1 - V2 / V1` (where `V2` is the sum of squared weights) if `ddof` is 1.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if the variance is weighted and `ddof` is not 0 or 1, or another [`DataError`] if the options are invalid or the elements are text.
    pub fn var(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        let units = self.deviation_units()?.powf(2.0)?;
        Ok(self.variance(options)?.with_units(units))
    }

    /// The (weighted) standard deviation, the square root of [`var`](Data::var).
    ///
    /// # Errors
    /// See [`var`](Data::var).
    pub fn std(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        let units = self.deviation_units()?;
        let variance = self.variance(options)?;
        let data_type = variance.data_type();
        let array = variance.array.map_blocks("sqrt", data_type, move |block| {
            Ok(block.map_numeric(data_type, false, f64::sqrt)?)
        })?;
        Ok(variance.with_chunked_array(array).with_units(units))
    }

    /// The number of non-missing elements, which is dimensionless.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn sample_size(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        Ok(self
            .collapse(Arc::new(SampleSize), options, false)?
            .with_units(Units::dimensionless()))
    }

    fn sum_of_weights_power(&self, options: &CollapseOptions, power: i32) -> Result<Self, DataError> {
        let weighted = self.is_weighted(options)?;
        let units = if weighted {
            Units::undefined()
        } else {
            Units::dimensionless()
        };
        Ok(self
            .collapse(Arc::new(SumOfWeights { power, weighted }), options, true)?
            .with_units(units))
    }

    /// The sum of the weights of the non-missing elements.
    ///
    /// This is the sample size if the collapse is unweighted.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn sum_of_weights(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        self.sum_of_weights_power(options, 1)
    }

    /// The sum of the squared weights of the non-missing elements.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the options are invalid or the elements are text.
    pub fn sum_of_weights2(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        self.sum_of_weights_power(options, 2)
    }

    /// The integral, the sum of the elements weighted by cell measures, in the product of the units and the units of the weights.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if there are no weights, or another [`DataError`] if the options are invalid or the elements are text.
    pub fn integral(&self, options: &CollapseOptions) -> Result<Self, DataError> {
        let weights = options
            .weights
            .as_ref()
            .ok_or_else(|| DataError::Value("an integral requires weights".to_string()))?;
        let units = self.units.mul(&Self::weights_units(weights)?)?;
        Ok(self.sum(options)?.with_units(units))
    }

    /// Returns true if every non-missing element is true, or if every element is missing.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the elements are text or the lazy graph fails to evaluate.
    pub fn all(&self) -> Result<bool, DataError> {
        let all = self.collapse(Arc::new(Truth { all: true }), &CollapseOptions::default(), false)?;
        Ok(all.size() == 0 || all.to_bool()? || all.item()?.is_none())
    }

    /// Returns true if any non-missing element is true.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the elements are text or the lazy graph fails to evaluate.
    pub fn any(&self) -> Result<bool, DataError> {
        let any = self.collapse(Arc::new(Truth { all: false }), &CollapseOptions::default(), false)?;
        Ok(any.size() != 0 && any.to_bool()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> Data {
        Data::masked(
            (0..12).map(f64::from).collect(),
            (0..12).map(|i| i == 4).collect(),
            &[4, 3],
            Units::new("K").unwrap(),
        )
        .unwrap()
    }

    fn values(data: &Data) -> Vec<Option<f64>> {
        data.compute().unwrap().to_numeric_options().unwrap()
    }

    #[test]
    fn collapse_statistics() {
        let data = example();
        let options = CollapseOptions::default();
        assert_eq!(values(&data.max(&options).unwrap()), vec![Some(11.0)]);
        assert_eq!(values(&data.min(&options).unwrap()), vec![Some(0.0)]);
        let mean = values(&data.mean(&options).unwrap())[0].unwrap();
        assert!((mean - 5.636_363_636_363_637).abs() < 1e-12);
        assert_eq!(values(&data.sum(&options).unwrap()), vec![Some(62.0)]);
        assert_eq!(values(&data.range(&options).unwrap()), vec![Some(11.0)]);
        assert_eq!(values(&data.mid_range(&options).unwrap()), vec![Some(5.5)]);
        assert_eq!(values(&data.sample_size(&options).unwrap()), vec![Some(11.0)]);
        assert_eq!(data.sample_size(&options).unwrap().units().as_str(), "1");
        assert_eq!(data.max(&options).unwrap().shape(), vec![1, 1]);
    }

    #[test]
    fn collapse_axes() {
        let data = example();
        let columns = data
            .sum(&CollapseOptions::default().axes(vec![0]).squeeze(true))
            .unwrap();
        assert_eq!(columns.shape(), vec![3]);
        assert_eq!(values(&columns), vec![Some(18.0), Some(18.0), Some(26.0)]);
        assert!(data.sum(&CollapseOptions::default().axes(vec![2])).is_err());
        assert!(data.sum(&CollapseOptions::default().mtol(1.5)).is_err());
    }

    #[test]
    fn collapse_variance() {
        let data = Data::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[4], Units::new("m").unwrap()).unwrap();
        let var = data.var(&CollapseOptions::default()).unwrap();
        assert!((values(&var)[0].unwrap() - 1.25).abs() < 1e-12);
        assert_eq!(var.units().as_str(), "m^2");
        let var = data.var(&CollapseOptions::default().ddof(1.0)).unwrap();
        assert!((values(&var)[0].unwrap() - 5.0 / 3.0).abs() < 1e-12);
        let std = data.std(&CollapseOptions::default().ddof(1.0)).unwrap();
        assert!((values(&std)[0].unwrap() - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(std.units().as_str(), "m");

        let weights = Data::from_vec(vec![1.0, 1.0, 1.0, 1.0], &[4], Units::undefined()).unwrap();
        let weighted = CollapseOptions::default().weights(Weights::Array(weights));
        let var = data.var(&weighted.clone()).unwrap();
        assert!((values(&var)[0].unwrap() - 1.25).abs() < 1e-12);
        let var = data.var(&weighted.clone().ddof(1.0)).unwrap();
        assert!((values(&var)[0].unwrap() - 5.0 / 3.0).abs() < 1e-12);
        assert!(matches!(
            data.var(&weighted.ddof(2.0)),
            Err(DataError::Value(_))
        ));
    }

    #[test]
    fn collapse_weights() {
        let data = example();
        let rows = Data::from_vec(vec![1.0, 2.0, 1.0, 0.0], &[4], Units::undefined()).unwrap();
        let columns = Data::from_vec(vec![1.0, 1.0, 2.0], &[3], Units::new("m").unwrap()).unwrap();
        let options = CollapseOptions::default()
            .axes(vec![0])
            .weights(Weights::Axes(vec![(vec![0], rows), (vec![1], columns)]));
        // Column sums of w_row * w_column * x, the masked element excluded
        assert_eq!(
            values(&data.sum(&options).unwrap()),
            vec![Some(12.0), Some(8.0), Some(40.0)]
        );
        let integral = data.integral(&options).unwrap();
        assert!(integral.units().equivalent(&Units::new("K m").unwrap()));

        let unweighted = CollapseOptions::default()
            .axes(vec![0])
            .weights(Weights::Axes(vec![(
                vec![1],
                Data::from_vec(vec![2.0; 3], &[3], Units::undefined()).unwrap(),
            )]));
        assert_eq!(
            values(&data.sum(&unweighted).unwrap()),
            vec![Some(18.0), Some(18.0), Some(26.0)]
        );
        assert_eq!(
            values(&data.sum_of_weights(&CollapseOptions::default().axes(vec![0])).unwrap()),
            vec![Some(4.0), Some(3.0), Some(4.0)]
        );
        let overlapping = CollapseOptions::default().weights(Weights::Axes(vec![
            (vec![0], Data::from_vec(vec![1.0; 4], &[4], Units::undefined()).unwrap()),
            (vec![0, 1], Data::from_vec(vec![1.0; 12], &[4, 3], Units::undefined()).unwrap()),
        ]));
        assert!(matches!(data.sum(&overlapping), Err(DataError::Value(_))));
    }

    #[test]
    fn collapse_mtol() {
        let data = Data::masked(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            vec![true, false, false, false, true, true, true, true],
            &[2, 4],
            Units::undefined(),
        )
        .unwrap();
        let sum = |mtol: f64| {
            values(
                &data
                    .sum(&CollapseOptions::default().axes(vec![1]).mtol(mtol))
                    .unwrap(),
            )
        };
        assert_eq!(sum(1.0), vec![Some(9.0), None]);
        assert_eq!(sum(0.25), vec![Some(9.0), None]);
        assert_eq!(sum(0.2), vec![None, None]);
        assert_eq!(sum(0.0), vec![None, None]);
    }

    #[test]
    fn collapse_truth() {
        let data = Data::masked(
            vec![1.0, 0.0, 2.0],
            vec![false, true, false],
            &[3],
            Units::undefined(),
        )
        .unwrap();
        assert!(data.all().unwrap());
        assert!(data.any().unwrap());
        let zeros = Data::zeros(&[2], DataType::Int32).unwrap();
        assert!(!zeros.any().unwrap());
        assert!(!zeros.all().unwrap());
    }
}
