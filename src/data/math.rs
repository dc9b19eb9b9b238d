//! Elementwise mathematical functions, cumulative operations, binning and filtering.
//!
//! Functions of angles convert the elements to radians first, and functions which require dimensionless elements convert them to `"1"`.
//! Either conversion fails if the units are not equivalent.
//!
//! Domain-restricted functions (the inverse trigonometric and hyperbolic functions, [`log`](Data::log) and [`sqrt`](Data::sqrt)) never fail for elements outside of their domain.
//! The invalid results are masked, or kept as NaN if `preserve_invalid` is set, and a warning is logged.

use ndarray::{ArrayD, Axis, Dimension, IxDyn, Zip};

use crate::{
    chunked::{Boundary, ChunkedArray},
    data_type::DataType,
    masked_array::{AxisRange, Elements, MaskedArray},
    units::Units,
};

use super::{collapse::sum_data_type, Data, DataError};

/// Round half to even.
#[allow(clippy::float_cmp)]
fn round_half_even(value: f64) -> f64 {
    if (value - value.trunc()).abs() == 0.5 {
        2.0 * (value / 2.0).round()
    } else {
        value.round()
    }
}

#[derive(Debug, Clone)]
enum Bins {
    /// Monotonic bin boundaries.
    Boundaries { edges: Vec<f64>, increasing: bool },
    /// Explicit, non-overlapping `[lower, upper)` bins.
    Explicit(Vec<(f64, f64)>),
}

impl Bins {
    fn new(bins: &ArrayD<f64>) -> Result<Self, DataError> {
        match bins.shape() {
            [_] => {
                let edges: Vec<f64> = bins.iter().copied().collect();
                let increasing = edges.windows(2).all(|w| w[0] <= w[1]);
                let decreasing = edges.windows(2).all(|w| w[0] >= w[1]);
                if edges.iter().any(|edge| edge.is_nan()) || !(increasing || decreasing) {
                    return Err(DataError::Value(format!(
                        "bin boundaries must be monotonic, got {edges:?}"
                    )));
                }
                Ok(Self::Boundaries { edges, increasing })
            }
            [_, 2] => {
                let explicit: Vec<(f64, f64)> = bins
                    .outer_iter()
                    .map(|bin| (bin[0].min(bin[1]), bin[0].max(bin[1])))
                    .collect();
                let mut sorted = explicit.clone();
                sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
                if let Some(overlap) = sorted.windows(2).find(|w| w[0].1 > w[1].0) {
                    return Err(DataError::Value(format!(
                        "bins {:?} and {:?} overlap",
                        overlap[0], overlap[1]
                    )));
                }
                Ok(Self::Explicit(explicit))
            }
            shape => Err(DataError::Value(format!(
                "bins must be one-dimensional boundaries or an array of shape (N, 2), got shape {shape:?}"
            ))),
        }
    }

    /// The bin index of `value`, right-closed if `upper`.
    fn index(&self, value: f64, upper: bool) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        match self {
            Self::Boundaries { edges, increasing } => Some(
                edges
                    .iter()
                    .filter(|&&edge| match (increasing, upper) {
                        (true, false) => edge <= value,
                        (true, true) => edge < value,
                        (false, false) => edge > value,
                        (false, true) => edge >= value,
                    })
                    .count(),
            ),
            Self::Explicit(bins) => bins.iter().position(|&(lower, upper_bound)| {
                if upper {
                    lower < value && value <= upper_bound
                } else {
                    lower <= value && value < upper_bound
                }
            }),
        }
    }
}

impl Data {
    fn map_elements(
        &self,
        name: &'static str,
        data_type: DataType,
        mask_invalid: bool,
        f: impl Fn(f64) -> f64 + Copy + Send + Sync + 'static,
    ) -> Result<ChunkedArray, DataError> {
        self.require_numeric(name)?;
        Ok(self.array.map_blocks(name, data_type, move |block| {
            Ok(block.map_numeric(data_type, mask_invalid, f)?)
        })?)
    }

    /// Apply a function with a restricted domain, masking invalid results unless `preserve_invalid`.
    fn domain_restricted(
        &self,
        name: &'static str,
        preserve_invalid: bool,
        f: fn(f64) -> f64,
    ) -> Result<ChunkedArray, DataError> {
        self.require_numeric(name)?;
        let data_type = self.float_data_type()?;
        Ok(self.array.map_blocks(name, data_type, move |block| {
            let out = block.map_numeric(data_type, !preserve_invalid, f)?;
            let invalid = Zip::from(block.numeric()?)
                .and(out.numeric()?)
                .and(&block.mask_or_false())
                .fold(0usize, |count, value, result, masked| {
                    count + usize::from(!masked && value.is_finite() && !result.is_finite())
                });
            if invalid > 0 {
                tracing::warn!(
                    function = name,
                    invalid,
                    preserve_invalid,
                    "elements outside of the domain"
                );
            }
            Ok(out)
        })?)
    }

    /// `units` if these units are defined, otherwise undefined units.
    fn result_units(&self, units: Units) -> Units {
        if self.units.is_defined() {
            units
        } else {
            Units::undefined()
        }
    }

    fn radians() -> Result<Units, DataError> {
        Ok(Units::new("radians")?)
    }

    /// Convert to radians if the units are angular, otherwise to dimensionless units.
    fn conformed_to_angle_or_dimensionless(&self) -> Result<Self, DataError> {
        let radians = Self::radians()?;
        if self.units.equivalent(&radians) {
            self.conformed_to(&radians)
        } else {
            self.conformed_to(&Units::dimensionless())
        }
    }

    /// The absolute values.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if the elements are text.
    pub fn abs(&self) -> Result<Self, DataError> {
        let array = self.map_elements("abs", self.data_type(), false, f64::abs)?;
        Ok(self.with_chunked_array(array))
    }

    /// The negated values.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if the elements are text or boolean.
    pub fn negative(&self) -> Result<Self, DataError> {
        if self.data_type().is_bool() {
            return Err(DataError::DataType(
                "negative is not supported for bool elements, use invert".to_string(),
            ));
        }
        let array = self.map_elements("negative", self.data_type(), false, |v| -v)?;
        Ok(self.with_chunked_array(array))
    }

    /// The logical negation of booleans, or the bitwise negation of integers.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if the elements are floating point or text.
    pub fn invert(&self) -> Result<Self, DataError> {
        let data_type = self.data_type();
        let array = match data_type {
            DataType::Bool => self.map_elements("invert", data_type, false, |v| {
                f64::from(u8::from(v == 0.0))
            })?,
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                let max = 2.0_f64.powi((data_type.size() * 8) as i32) - 1.0;
                self.map_elements("invert", data_type, false, move |v| max - v)?
            }
            _ if data_type.is_integer() => {
                self.map_elements("invert", data_type, false, |v| -v - 1.0)?
            }
            _ => {
                return Err(DataError::DataType(format!(
                    "invert is not supported for {data_type} elements"
                )))
            }
        };
        Ok(self.with_chunked_array(array))
    }

    /// The exponential, of dimensionless elements.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not dimensionless, or [`DataError::DataType`] if the elements are text.
    pub fn exp(&self) -> Result<Self, DataError> {
        let data = self.conformed_to(&Units::dimensionless())?;
        let array = data.map_elements("exp", data.float_data_type()?, false, f64::exp)?;
        Ok(data
            .with_chunked_array(array)
            .with_units(self.result_units(Units::dimensionless())))
    }

    /// The logarithm to `base` (natural if [`None`]), of dimensionless elements.
    ///
    /// Logarithms of zero and negative elements are masked.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not dimensionless, [`DataError::Value`] if the base is not positive, or [`DataError::DataType`] if the elements are text.
    #[allow(clippy::float_cmp)]
    pub fn log(&self, base: Option<f64>) -> Result<Self, DataError> {
        let data = self.conformed_to(&Units::dimensionless())?;
        let array = match base {
            None => data.domain_restricted("log", false, f64::ln)?,
            Some(base) if base > 0.0 && base != 1.0 => {
                let ln_base = base.ln();
                let data_type = data.float_data_type()?;
                data.map_elements("log", data_type, true, move |v| v.ln() / ln_base)?
            }
            Some(base) => {
                return Err(DataError::Value(format!(
                    "the base of a logarithm must be positive and not one, got {base}"
                )))
            }
        };
        Ok(data
            .with_chunked_array(array)
            .with_units(self.result_units(Units::dimensionless())))
    }

    /// The square root, in the square root of the units.
    ///
    /// Square roots of negative elements are masked.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units have no square root, or [`DataError::DataType`] if the elements are text.
    pub fn sqrt(&self) -> Result<Self, DataError> {
        let units = self.units.powf(0.5)?;
        let array = self.domain_restricted("sqrt", false, f64::sqrt)?;
        Ok(self.with_chunked_array(array).with_units(units))
    }

    fn trigonometric(&self, name: &'static str, f: fn(f64) -> f64) -> Result<Self, DataError> {
        let data = self.conformed_to(&Self::radians()?)?;
        let array = data.map_elements(name, data.float_data_type()?, false, f)?;
        Ok(data
            .with_chunked_array(array)
            .with_units(self.result_units(Units::dimensionless())))
    }

    /// The sine of angles, which are converted to radians.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not angular, or [`DataError::DataType`] if the elements are text.
    pub fn sin(&self) -> Result<Self, DataError> {
        self.trigonometric("sin", f64::sin)
    }

    /// The cosine of angles, which are converted to radians.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not angular, or [`DataError::DataType`] if the elements are text.
    pub fn cos(&self) -> Result<Self, DataError> {
        self.trigonometric("cos", f64::cos)
    }

    /// The tangent of angles, which are converted to radians.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not angular, or [`DataError::DataType`] if the elements are text.
    pub fn tan(&self) -> Result<Self, DataError> {
        self.trigonometric("tan", f64::tan)
    }

    fn hyperbolic(&self, name: &'static str, f: fn(f64) -> f64) -> Result<Self, DataError> {
        let data = self.conformed_to_angle_or_dimensionless()?;
        let array = data.map_elements(name, data.float_data_type()?, false, f)?;
        Ok(data
            .with_chunked_array(array)
            .with_units(self.result_units(Units::dimensionless())))
    }

    /// The hyperbolic sine.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are neither angular nor dimensionless, or [`DataError::DataType`] if the elements are text.
    pub fn sinh(&self) -> Result<Self, DataError> {
        self.hyperbolic("sinh", f64::sinh)
    }

    /// The hyperbolic cosine.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are neither angular nor dimensionless, or [`DataError::DataType`] if the elements are text.
    pub fn cosh(&self) -> Result<Self, DataError> {
        self.hyperbolic("cosh", f64::cosh)
    }

    /// The hyperbolic tangent.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are neither angular nor dimensionless, or [`DataError::DataType`] if the elements are text.
    pub fn tanh(&self) -> Result<Self, DataError> {
        self.hyperbolic("tanh", f64::tanh)
    }

    /// An inverse function of dimensionless elements, in radians.
    fn inverse(
        &self,
        name: &'static str,
        preserve_invalid: bool,
        f: fn(f64) -> f64,
    ) -> Result<Self, DataError> {
        let data = self.conformed_to(&Units::dimensionless())?;
        let array = data.domain_restricted(name, preserve_invalid, f)?;
        Ok(data
            .with_chunked_array(array)
            .with_units(self.result_units(Self::radians()?)))
    }

    /// The inverse sine, in radians.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not dimensionless, or [`DataError::DataType`] if the elements are text.
    pub fn arcsin(&self, preserve_invalid: bool) -> Result<Self, DataError> {
        self.inverse("arcsin", preserve_invalid, f64::asin)
    }

    /// The inverse cosine, in radians.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not dimensionless, or [`DataError::DataType`] if the elements are text.
    pub fn arccos(&self, preserve_invalid: bool) -> Result<Self, DataError> {
        self.inverse("arccos", preserve_invalid, f64::acos)
    }

    /// The inverse tangent, in radians.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not dimensionless, or [`DataError::DataType`] if the elements are text.
    pub fn arctan(&self) -> Result<Self, DataError> {
        self.inverse("arctan", false, f64::atan)
    }

    /// The inverse hyperbolic sine, in radians.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not dimensionless, or [`DataError::DataType`] if the elements are text.
    pub fn arcsinh(&self) -> Result<Self, DataError> {
        self.inverse("arcsinh", false, f64::asinh)
    }

    /// The inverse hyperbolic cosine, in radians.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not dimensionless, or [`DataError::DataType`] if the elements are text.
    pub fn arccosh(&self, preserve_invalid: bool) -> Result<Self, DataError> {
        self.inverse("arccosh", preserve_invalid, f64::acosh)
    }

    /// The inverse hyperbolic tangent, in radians.
    ///
    /// # Errors
    /// Returns [`DataError::Units`] if the units are not dimensionless, or [`DataError::DataType`] if the elements are text.
    pub fn arctanh(&self, preserve_invalid: bool) -> Result<Self, DataError> {
        self.inverse("arctanh", preserve_invalid, f64::atanh)
    }

    fn rounding(&self, name: &'static str, f: fn(f64) -> f64) -> Result<Self, DataError> {
        let array = self.map_elements(name, self.float_data_type()?, false, f)?;
        Ok(self.with_chunked_array(array))
    }

    /// The smallest integers not less than the elements.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if the elements are text.
    pub fn ceil(&self) -> Result<Self, DataError> {
        self.rounding("ceil", f64::ceil)
    }

    /// The largest integers not greater than the elements.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if the elements are text.
    pub fn floor(&self) -> Result<Self, DataError> {
        self.rounding("floor", f64::floor)
    }

    /// The nearest integers, rounding half to even.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if the elements are text.
    pub fn rint(&self) -> Result<Self, DataError> {
        self.rounding("rint", round_half_even)
    }

    /// The elements truncated towards zero.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if the elements are text.
    pub fn trunc(&self) -> Result<Self, DataError> {
        self.rounding("trunc", f64::trunc)
    }

    /// The elements rounded half to even to `decimals` decimal places, which may be negative.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if the elements are text.
    pub fn round(&self, decimals: i32) -> Result<Self, DataError> {
        let scale = 10.0_f64.powi(decimals);
        let array = self.map_elements("round", self.data_type(), false, move |v| {
            round_half_even(v * scale) / scale
        })?;
        Ok(self.with_chunked_array(array))
    }

    /// Limit the elements to the interval `[min, max]`.
    ///
    /// The bounds are in `units` if given, and converted to the units of the array.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if neither bound is given, [`DataError::Units`] if `units` are not equivalent, or [`DataError::DataType`] if the elements are text.
    pub fn clip(
        &self,
        min: Option<f64>,
        max: Option<f64>,
        units: Option<&Units>,
    ) -> Result<Self, DataError> {
        if min.is_none() && max.is_none() {
            return Err(DataError::Value(
                "clip requires a lower or upper bound".to_string(),
            ));
        }
        let convert = |value: f64| -> Result<f64, DataError> {
            match units {
                Some(units) if units.is_defined() && self.units.is_defined() => {
                    Ok(units.convert(value, &self.units)?)
                }
                _ => Ok(value),
            }
        };
        let min = min.map(convert).transpose()?;
        let max = max.map(convert).transpose()?;
        let array = self.map_elements("clip", self.data_type(), false, move |v| {
            let v = min.map_or(v, |min| v.max(min));
            max.map_or(v, |max| v.min(max))
        })?;
        Ok(self.with_chunked_array(array))
    }

    /// The cumulative sum along `axis`.
    ///
    /// Missing elements count as zero and remain missing.
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if the axis is out of bounds, or [`DataError::DataType`] if the elements are text.
    pub fn cumsum(&self, axis: usize) -> Result<Self, DataError> {
        self.check_axis(axis)?;
        self.require_numeric("cumsum")?;
        let data_type = sum_data_type(self.data_type());
        let len = self.shape()[axis];
        let mut chunks = self.chunks().to_vec();
        chunks[axis] = if len == 0 { Vec::new() } else { vec![len] };
        let array = self
            .array
            .rechunk(chunks)?
            .map_blocks("cumsum", data_type, move |block| {
                let mut values = block.filled_numeric(0.0)?;
                values.accumulate_axis_inplace(Axis(axis), |previous, current| {
                    *current += *previous;
                });
                values.mapv_inplace(|v| data_type.cast(v));
                Ok(MaskedArray::new(
                    Elements::Numeric(values),
                    block.mask().cloned(),
                    data_type,
                )?
                .with_hard_mask(block.hard_mask()))
            })?;
        Ok(self.with_chunked_array(array))
    }

    /// The `n`-th discrete difference along `axis`, which is shortened by `n`.
    ///
    /// Differences of reference times are durations.
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if the axis is out of bounds, or [`DataError::DataType`] if the elements are text.
    pub fn diff(&self, axis: usize, n: usize) -> Result<Self, DataError> {
        self.check_axis(axis)?;
        self.require_numeric("diff")?;
        let data_type = if self.data_type().is_float() {
            self.data_type()
        } else {
            DataType::Int64
        };
        let mut array = self.array.clone();
        for _ in 0..n {
            let shape = array.shape();
            let Some(len) = shape[axis].checked_sub(1) else {
                break;
            };
            let mut upper: Vec<AxisRange> = shape.iter().map(|&len| AxisRange::full(len)).collect();
            let mut lower = upper.clone();
            upper[axis] = AxisRange {
                start: 1,
                len,
                step: 1,
            };
            lower[axis] = AxisRange {
                start: 0,
                len,
                step: 1,
            };
            let (upper, lower) = (array.slice(&upper)?, array.slice(&lower)?);
            array = ChunkedArray::elementwise("diff", &[&upper, &lower], data_type, move |blocks, _| {
                Ok(blocks[0].zip_numeric(&blocks[1], data_type, |a, b| a - b)?)
            })?;
        }
        let mut data = self.with_chunked_array(array);
        data.drop_resized_cyclic_axes(&self.shape());
        if self.units.is_reftime() {
            data.units = self.units.duration()?;
        }
        Ok(data)
    }

    /// The indices of the bins which the elements fall into.
    ///
    /// `bins` is either
    ///  - a one-dimensional array of monotonic boundaries `b`, defining the bins `(-inf, b[0])`, `[b[0], b[1])`, ..., `[b[N-1], inf)`, or
    ///  - an array of shape `(N, 2)` of explicit bins `[lower, upper)`, where elements outside of every bin are masked.
    ///
    /// The bins are right-closed rather than left-closed if `upper` is true.
    /// The result is `int64` without units, and missing or NaN elements are masked.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if the boundaries are not monotonic, the explicit bins overlap or the bins have another shape, or [`DataError::DataType`] if the elements are text.
    pub fn digitize(&self, bins: &ArrayD<f64>, upper: bool) -> Result<Self, DataError> {
        self.require_numeric("digitize")?;
        let bins = Bins::new(bins)?;
        let array = self
            .array
            .map_blocks("digitize", DataType::Int64, move |block| {
                let index = block.numeric()?.mapv(|value| bins.index(value, upper));
                let mask = Zip::from(&index)
                    .and(&block.mask_or_false())
                    .map_collect(|index, masked| *masked || index.is_none());
                #[allow(clippy::cast_precision_loss)]
                let values = index.mapv(|index| index.map_or(0.0, |index| index as f64));
                Ok(MaskedArray::new(Elements::Numeric(values), Some(mask), DataType::Int64)?
                    .with_hard_mask(block.hard_mask()))
            })?;
        let mut data = self.with_chunked_array(array).with_units(Units::undefined());
        data.fill_value = None;
        Ok(data)
    }

    /// Filter along `axis` by convolution with `window`.
    ///
    /// `out[i] = sum(window[j] * in[i + window.len() / 2 - j])`, where `in` is extended beyond the axis by the `boundary` rule.
    /// An output element is masked if any contributing element is masked or lies outside of the array with [`Boundary::None`].
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if the window is empty, [`DataError::Index`] if the axis is out of bounds, or [`DataError::DataType`] if the elements are text.
    pub fn convolution_filter(
        &self,
        window: &[f64],
        axis: usize,
        boundary: Boundary,
    ) -> Result<Self, DataError> {
        if window.is_empty() {
            return Err(DataError::Value(
                "a convolution filter requires a non-empty window".to_string(),
            ));
        }
        self.check_axis(axis)?;
        self.require_numeric("convolution_filter")?;
        let data_type = self.float_data_type()?;
        let origin = window.len() / 2;
        let mut depth = vec![0; self.ndim()];
        depth[axis] = origin.max(window.len() - 1 - origin);
        let window = window.to_vec();
        tracing::debug!(axis, ?depth, ?boundary, "convolution filter");

        let array = self.array.map_overlap(
            "convolution_filter",
            &depth,
            boundary,
            data_type,
            move |block, context| {
                let offset: Vec<usize> = std::iter::zip(
                    context.output_subset.start(),
                    context.input_subsets[0].start(),
                )
                .map(|(output, input)| output - input)
                .collect();
                let values = block.numeric()?;
                let mask = block.mask_or_false();
                let axis_len = block.shape()[axis];
                let filtered = ArrayD::from_shape_fn(IxDyn(context.output_subset.shape()), |index| {
                    let mut position: Vec<usize> = std::iter::zip(index.slice(), &offset)
                        .map(|(index, offset)| index + offset)
                        .collect();
                    let centre = position[axis] + origin;
                    let mut sum = 0.0;
                    for (j, weight) in window.iter().enumerate() {
                        let source = centre.checked_sub(j).filter(|source| *source < axis_len)?;
                        position[axis] = source;
                        if mask[position.as_slice()] {
                            return None;
                        }
                        sum += weight * values[position.as_slice()];
                    }
                    Some(data_type.cast(sum))
                });
                let out_mask = filtered.mapv(|value| value.is_none());
                let out_values = filtered.mapv(|value| value.unwrap_or(0.0));
                Ok(MaskedArray::new(Elements::Numeric(out_values), Some(out_mask), data_type)?
                    .with_hard_mask(block.hard_mask()))
            },
        )?;
        Ok(self.with_chunked_array(array))
    }

    /// Convert the elements to `data_type`.
    ///
    /// The fill value is reset if the data type changes.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the elements cannot be converted.
    pub fn astype(&self, data_type: DataType) -> Result<Self, DataError> {
        if data_type == self.data_type() {
            return Ok(self.clone());
        }
        let mut data = self.with_chunked_array(self.array.astype(data_type)?);
        data.fill_value = None;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use ndarray::{array, Array1};

    use super::*;

    fn values(data: &Data) -> Vec<Option<f64>> {
        data.compute().unwrap().to_numeric_options().unwrap()
    }

    fn data(values: &[f64], units: &str) -> Data {
        Data::from_vec(values.to_vec(), &[values.len()], Units::new(units).unwrap()).unwrap()
    }

    #[test]
    fn math_rounding() {
        assert_eq!(round_half_even(2.5), 2.0);
        assert_eq!(round_half_even(3.5), 4.0);
        assert_eq!(round_half_even(-2.5), -2.0);
        assert_eq!(round_half_even(2.6), 3.0);
        let d = data(&[-1.5, 0.5, 1.25, 2.7], "m");
        assert_eq!(
            values(&d.rint().unwrap()),
            vec![Some(-2.0), Some(0.0), Some(1.0), Some(3.0)]
        );
        assert_eq!(
            values(&d.floor().unwrap()),
            vec![Some(-2.0), Some(0.0), Some(1.0), Some(2.0)]
        );
        assert_eq!(
            values(&d.round(1).unwrap()),
            vec![Some(-1.5), Some(0.5), Some(1.2), Some(2.7)]
        );
        assert_eq!(
            values(&d.abs().unwrap()),
            vec![Some(1.5), Some(0.5), Some(1.25), Some(2.7)]
        );
        assert_eq!(d.abs().unwrap().units().as_str(), "m");
    }

    #[test]
    fn math_invert() {
        let booleans = Data::ones(&[2], DataType::Bool).unwrap();
        assert_eq!(values(&booleans.invert().unwrap()), vec![Some(0.0), Some(0.0)]);
        let integers = Data::full(&[1], 5.0, DataType::Int32, Units::undefined()).unwrap();
        assert_eq!(values(&integers.invert().unwrap()), vec![Some(-6.0)]);
        let unsigned = Data::full(&[1], 5.0, DataType::UInt8, Units::undefined()).unwrap();
        assert_eq!(values(&unsigned.invert().unwrap()), vec![Some(250.0)]);
        assert!(data(&[1.0], "").invert().is_err());
    }

    #[test]
    fn math_units() {
        let angles = data(&[0.0, 90.0], "degrees");
        let sin = angles.sin().unwrap();
        assert_eq!(sin.units().as_str(), "1");
        let sin = values(&sin);
        assert!(sin[0].unwrap().abs() < 1e-12);
        assert!((sin[1].unwrap() - 1.0).abs() < 1e-12);
        assert!(data(&[1.0], "m").sin().is_err());
        assert!(data(&[1.0], "m").exp().is_err());
        assert_eq!(
            values(&data(&[100.0], "percent").exp().unwrap()),
            vec![Some(1.0_f64.exp())]
        );
        let arcsin = data(&[1.0], "1").arcsin(false).unwrap();
        assert!(arcsin.units().equivalent(&Units::new("radians").unwrap()));
        assert!((values(&arcsin)[0].unwrap() - PI / 2.0).abs() < 1e-12);
        let sqrt = data(&[4.0], "m2").sqrt().unwrap();
        assert!(sqrt.units().equivalent(&Units::new("m").unwrap()));
        assert_eq!(values(&sqrt), vec![Some(2.0)]);
    }

    #[test]
    fn math_domain() {
        let d = data(&[0.5, 2.0], "");
        let masked = d.arcsin(false).unwrap();
        assert_eq!(values(&masked)[1], None);
        let preserved = d.arcsin(true).unwrap().compute().unwrap();
        assert!(!preserved.is_masked());
        assert!(preserved.numeric().unwrap().iter().any(|v| v.is_nan()));
        assert_eq!(values(&data(&[-1.0, 1.0], "").log(None).unwrap()), vec![None, Some(0.0)]);
        assert_eq!(values(&data(&[100.0], "").log(Some(10.0)).unwrap()), vec![Some(2.0)]);
    }

    #[test]
    fn math_clip() {
        let d = data(&[-5.0, 50.0, 500.0], "cm");
        let clipped = d
            .clip(Some(0.0), Some(1.0), Some(&Units::new("m").unwrap()))
            .unwrap();
        assert_eq!(values(&clipped), vec![Some(0.0), Some(50.0), Some(100.0)]);
        assert!(d.clip(None, None, None).is_err());
    }

    #[test]
    fn math_cumsum_diff() {
        let d = Data::masked(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![false, true, false, false, false, false],
            &[2, 3],
            Units::new("m").unwrap(),
        )
        .unwrap();
        assert_eq!(
            values(&d.cumsum(1).unwrap()),
            vec![Some(1.0), None, Some(4.0), Some(4.0), Some(9.0), Some(15.0)]
        );
        let diff = d.diff(1, 1).unwrap();
        assert_eq!(diff.shape(), vec![2, 2]);
        assert_eq!(values(&diff), vec![None, None, Some(1.0), Some(1.0)]);
        assert_eq!(values(&d.diff(1, 2).unwrap()), vec![None, Some(0.0)]);
        assert!(d.cumsum(2).is_err());
    }

    #[test]
    fn math_digitize() {
        let d = Data::from_vec((0..12).map(f64::from).collect(), &[3, 4], Units::undefined()).unwrap();
        let digitized = d.digitize(&array![2.0, 6.0, 10.0].into_dyn(), false).unwrap();
        assert_eq!(digitized.data_type(), DataType::Int64);
        let expected = [0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3]
            .into_iter()
            .map(|v| Some(f64::from(v)))
            .collect::<Vec<_>>();
        assert_eq!(values(&digitized), expected);

        let upper = d.digitize(&array![2.0, 6.0, 10.0].into_dyn(), true).unwrap();
        assert_eq!(values(&upper)[2], Some(0.0));

        let explicit = array![[0.0, 4.0], [8.0, 10.0]].into_dyn();
        let explicit = values(&d.digitize(&explicit, false).unwrap());
        assert_eq!(explicit[3], Some(0.0));
        assert_eq!(explicit[4], None);
        assert_eq!(explicit[9], Some(1.0));

        let overlapping = array![[0.0, 4.0], [3.0, 10.0]].into_dyn();
        assert!(matches!(d.digitize(&overlapping, false), Err(DataError::Value(_))));
        let unsorted = Array1::from(vec![2.0, 1.0, 3.0]).into_dyn();
        assert!(matches!(d.digitize(&unsorted, false), Err(DataError::Value(_))));
    }

    #[test]
    fn math_convolution_filter() {
        let d = data(&[1.0, 2.0, 3.0, 4.0], "K");
        let smoothed = d
            .convolution_filter(&[1.0, 1.0, 1.0], 0, Boundary::None)
            .unwrap();
        assert_eq!(values(&smoothed), vec![None, Some(6.0), Some(9.0), None]);
        let periodic = d
            .convolution_filter(&[1.0, 1.0, 1.0], 0, Boundary::Periodic)
            .unwrap();
        assert_eq!(
            values(&periodic),
            vec![Some(7.0), Some(6.0), Some(9.0), Some(8.0)]
        );
        let shifted = d
            .convolution_filter(&[0.0, 0.0, 1.0], 0, Boundary::Constant(0.0))
            .unwrap();
        assert_eq!(
            values(&shifted),
            vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0)]
        );
    }
}
