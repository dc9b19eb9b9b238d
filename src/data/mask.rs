//! Masks and mask hardness.
//!
//! The mask hardness of a [`Data`] is a declared intent.
//! It is only applied to the blocks of the chunked array immediately before an operation which depends on it, such as [`setitem`](Data::setitem) and [`where_`](Data::where_).

use ndarray::{ArrayD, Zip};

use crate::{
    chunked::{ChunkedArray, ChunkedArrayError},
    data_type::DataType,
    fill_value::FillValue,
    masked_array::{broadcast_shapes, Elements, MaskedArray},
    units::Units,
};

use super::{CollapseOptions, Data, DataError};

/// A value of [`Data::where_`].
#[derive(Debug, Clone)]
pub enum WhereValue {
    /// Values broadcast to the array.
    Data(Data),
    /// The masked constant, which masks the selected elements.
    Masked,
}

impl From<Data> for WhereValue {
    fn from(data: Data) -> Self {
        Self::Data(data)
    }
}

/// A replacement in the kernel of [`Data::where_`].
#[derive(Debug, Clone, Copy)]
enum Replacement {
    Masked,
    Input(usize),
}

/// Replace the elements of `target` where `selected` is true.
///
/// Masked elements of `target` are not replaced if `hard_mask` is true, but may always be masked.
fn replace_where(
    target: &MaskedArray,
    selected: &ArrayD<bool>,
    replacement: Option<&MaskedArray>,
    hard_mask: bool,
) -> Result<MaskedArray, ChunkedArrayError> {
    let shape = target.shape();
    let mut mask = target.mask_or_false();
    let Some(value) = replacement else {
        Zip::from(&mut mask).and(selected).for_each(|m, s| *m |= *s);
        return Ok(target.with_mask(Some(mask))?);
    };
    let value = value.broadcast_to(shape)?;
    let value_mask = value.mask_or_false();
    let data_type = target.data_type();
    let elements = match (target.elements(), value.elements()) {
        (Elements::Numeric(values), Elements::Numeric(replacements)) => {
            let mut values = values.clone();
            Zip::from(&mut values)
                .and(&mut mask)
                .and(selected)
                .and(replacements)
                .and(&value_mask)
                .for_each(|v, m, s, r, rm| {
                    if *s && !(hard_mask && *m) {
                        *v = data_type.cast(*r);
                        *m = *rm;
                    }
                });
            Elements::Numeric(values)
        }
        (Elements::Text(values), Elements::Text(replacements)) => {
            let mut values = values.clone();
            Zip::from(&mut values)
                .and(&mut mask)
                .and(selected)
                .and(replacements)
                .and(&value_mask)
                .for_each(|v, m, s, r, rm| {
                    if *s && !(hard_mask && *m) {
                        v.clone_from(r);
                        *m = *rm;
                    }
                });
            Elements::Text(values)
        }
        _ => return Err(crate::masked_array::MaskedArrayError::MixedElements.into()),
    };
    Ok(MaskedArray::new(elements, Some(mask), data_type)?.with_hard_mask(hard_mask))
}

impl Data {
    /// Returns true if the mask is hard.
    ///
    /// Masked elements of an array with a hard mask cannot be unmasked by assignment.
    #[must_use]
    pub fn hardmask(&self) -> bool {
        self.hardmask
    }

    /// Set the mask hardness.
    pub fn set_hardmask(&mut self, hardmask: bool) {
        self.hardmask = hardmask;
    }

    /// Harden the mask.
    pub fn harden_mask(&mut self) {
        self.set_hardmask(true);
    }

    /// Soften the mask.
    pub fn soften_mask(&mut self) {
        self.set_hardmask(false);
    }

    /// The chunked array with the mask hardness applied to every block.
    pub(super) fn enforce_mask_hardness(&self) -> Result<ChunkedArray, DataError> {
        let hardmask = self.hardmask;
        tracing::debug!(hardmask, "enforcing mask hardness");
        let name = if hardmask { "harden_mask" } else { "soften_mask" };
        Ok(self
            .array
            .map_blocks(name, self.data_type(), move |block| {
                Ok(block.clone().with_hard_mask(hardmask))
            })?)
    }

    /// The mask, as a boolean array which is true where elements are missing.
    ///
    /// # Errors
    /// Never fails for a valid array.
    pub fn mask(&self) -> Result<Self, DataError> {
        let array = self.array.map_blocks("mask", DataType::Bool, |block| {
            let mask = block.mask_or_false().mapv(|m| f64::from(u8::from(m)));
            Ok(MaskedArray::from_numeric(mask, DataType::Bool))
        })?;
        Ok(self.with_chunked_array(array).with_units(Units::undefined()))
    }

    /// Count the non-missing elements over `axes`, or all axes if [`None`].
    ///
    /// The counted axes are kept with length one.
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if an axis is out of bounds.
    pub fn count(&self, axes: Option<&[usize]>) -> Result<Self, DataError> {
        let present = self.array.map_blocks("count", DataType::Int64, |block| {
            let present = block.mask_or_false().mapv(|m| if m { 0.0 } else { 1.0 });
            Ok(MaskedArray::from_numeric(present, DataType::Int64))
        })?;
        let mut options = CollapseOptions::default();
        if let Some(axes) = axes {
            options = options.axes(axes.to_vec());
        }
        self.with_chunked_array(present)
            .with_units(Units::undefined())
            .sum(&options)
    }

    /// The number of missing elements.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the lazy graph fails to evaluate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn count_masked(&self) -> Result<usize, DataError> {
        let count = self
            .count(None)?
            .item()?
            .and_then(|count| count.as_f64())
            .unwrap_or(0.0);
        Ok(self.size() - count as usize)
    }

    /// Returns true if any element is missing.
    ///
    /// # Errors
    /// Returns a [`DataError`] if the lazy graph fails to evaluate.
    pub fn is_masked(&self) -> Result<bool, DataError> {
        Ok(self.count_masked()? > 0)
    }

    /// Replace missing elements with `fill_value`, or the [fill value](Data::fill_value) of the array if [`None`].
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if the fill value does not match the data type.
    pub fn filled(&self, fill_value: Option<FillValue>) -> Result<Self, DataError> {
        let fill_value = fill_value.unwrap_or_else(|| self.effective_fill_value());
        if fill_value.as_f64().is_some() != self.data_type().is_numeric() {
            return Err(DataError::DataType(format!(
                "fill value {fill_value} does not match data type {}",
                self.data_type()
            )));
        }
        let data_type = self.data_type();
        let array = self.array.map_blocks("filled", data_type, move |block| {
            let elements = block.filled(&fill_value)?;
            Ok(MaskedArray::new(elements, None, data_type)?)
        })?;
        Ok(self.with_chunked_array(array))
    }

    /// Mask NaN and infinite elements.
    ///
    /// # Errors
    /// Returns [`DataError::DataType`] if the elements are text.
    pub fn masked_invalid(&self) -> Result<Self, DataError> {
        self.require_numeric("masked_invalid")?;
        if !self.data_type().is_float() {
            return Ok(self.clone());
        }
        let array = self
            .array
            .map_blocks("masked_invalid", self.data_type(), |block| {
                let invalid = block.numeric()?.mapv(|v| !v.is_finite());
                Ok(block.masked_where(&invalid)?)
            })?;
        Ok(self.with_chunked_array(array))
    }

    /// Mask elements equal to any of `fill_values`, or outside of the valid range.
    ///
    /// The valid range is given by `valid_min` and `valid_max`, or by `valid_range` as `[min, max]`.
    ///
    /// # Errors
    /// Returns [`DataError::Value`] if `valid_range` is given with `valid_min` or `valid_max`, or [`DataError::DataType`] if the elements are text.
    pub fn apply_masking(
        &self,
        fill_values: &[f64],
        valid_min: Option<f64>,
        valid_max: Option<f64>,
        valid_range: Option<[f64; 2]>,
    ) -> Result<Self, DataError> {
        let (valid_min, valid_max) = match valid_range {
            Some(_) if valid_min.is_some() || valid_max.is_some() => {
                return Err(DataError::Value(
                    "cannot set valid_range together with valid_min or valid_max".to_string(),
                ))
            }
            Some([min, max]) => (Some(min), Some(max)),
            None => (valid_min, valid_max),
        };
        self.require_numeric("apply_masking")?;
        if fill_values.is_empty() && valid_min.is_none() && valid_max.is_none() {
            return Ok(self.clone());
        }
        let fill_values = fill_values.to_vec();
        let array = self
            .array
            .map_blocks("apply_masking", self.data_type(), move |block| {
                let invalid = block.numeric()?.mapv(|v| {
                    fill_values.contains(&v)
                        || valid_min.is_some_and(|min| v < min)
                        || valid_max.is_some_and(|max| v > max)
                });
                Ok(block.masked_where(&invalid)?)
            })?;
        Ok(self.with_chunked_array(array))
    }

    /// Assign `x` where `condition` is true and `y` where it is false.
    ///
    /// A [`None`] value leaves the corresponding elements unchanged.
    /// Missing elements of `condition` are false.
    /// If the mask is [hard](Data::hardmask), missing elements are not unmasked, though they can be replaced by [`WhereValue::Masked`].
    /// The units of `x` and `y` are conformed to the units of the array.
    ///
    /// # Errors
    /// Returns [`DataError::Index`] if `condition`, `x` or `y` does not broadcast to the shape of the array without changing it, [`DataError::Units`] if the units of `x` or `y` are not equivalent, or [`DataError::DataType`] if text and numeric elements are mixed.
    pub fn where_(
        &self,
        condition: &Self,
        x: Option<WhereValue>,
        y: Option<WhereValue>,
    ) -> Result<Self, DataError> {
        let shape = self.shape();
        let check_shape = |what: &str, other: &Self| {
            if broadcast_shapes(&other.shape(), &shape).as_deref() == Some(shape.as_slice()) {
                Ok(())
            } else {
                Err(DataError::Index(format!(
                    "{what} of shape {:?} does not broadcast to shape {shape:?}",
                    other.shape()
                )))
            }
        };
        check_shape("condition", condition)?;
        condition.require_numeric("where condition")?;

        let target = self.enforce_mask_hardness()?;
        let mut inputs = vec![target, condition.array.clone()];
        let mut replacement = |value: Option<WhereValue>, what: &str| {
            Ok::<_, DataError>(match value {
                None => None,
                Some(WhereValue::Masked) => Some(Replacement::Masked),
                Some(WhereValue::Data(value)) => {
                    check_shape(what, &value)?;
                    if value.data_type().is_numeric() != self.data_type().is_numeric() {
                        return Err(DataError::DataType(format!(
                            "cannot assign {} elements to a {} array",
                            value.data_type(),
                            self.data_type()
                        )));
                    }
                    let value = value.conformed_to(&self.units)?;
                    inputs.push(value.array);
                    Some(Replacement::Input(inputs.len() - 1))
                }
            })
        };
        let x = replacement(x, "x")?;
        let y = replacement(y, "y")?;
        if x.is_none() && y.is_none() {
            return Ok(self.clone());
        }

        let hard_mask = self.hardmask;
        let inputs: Vec<&ChunkedArray> = inputs.iter().collect();
        let array = ChunkedArray::elementwise("where", &inputs, self.data_type(), move |blocks, context| {
            let shape = context.output_subset.shape();
            let condition = blocks[1].broadcast_to(shape)?;
            let condition_mask = condition.mask_or_false();
            let true_where = Zip::from(condition.numeric()?)
                .and(&condition_mask)
                .map_collect(|c, m| *c != 0.0 && !m);
            let mut block = blocks[0].clone();
            for (value, selected) in [(x, true_where.clone()), (y, true_where.mapv(|t| !t))] {
                block = match value {
                    None => continue,
                    Some(Replacement::Masked) => replace_where(&block, &selected, None, hard_mask)?,
                    Some(Replacement::Input(input)) => {
                        replace_where(&block, &selected, Some(&blocks[input]), hard_mask)?
                    }
                };
            }
            Ok(block)
        })?;
        Ok(self.with_chunked_array(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Index;

    fn masked() -> Data {
        Data::masked(
            vec![1.0, 2.0, 3.0, 4.0],
            vec![false, true, false, false],
            &[4],
            Units::new("m").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn mask_counts() {
        let data = masked();
        assert_eq!(data.count_masked().unwrap(), 1);
        assert!(data.is_masked().unwrap());
        assert_eq!(
            data.mask().unwrap().array().unwrap().iter().copied().collect::<Vec<_>>(),
            vec![0.0, 1.0, 0.0, 0.0]
        );
        assert_eq!(
            data.filled(Some(FillValue::from(-1.0)))
                .unwrap()
                .array()
                .unwrap()
                .iter()
                .copied()
                .collect::<Vec<_>>(),
            vec![1.0, -1.0, 3.0, 4.0]
        );
    }

    #[test]
    fn mask_hardness() {
        let mut data = masked();
        assert!(data.hardmask());
        data.setitem(&[Index::Ellipsis], &Data::scalar(0.0, Units::undefined()))
            .unwrap();
        assert_eq!(data.count_masked().unwrap(), 1);

        let mut data = masked();
        data.soften_mask();
        data.setitem(&[Index::Ellipsis], &Data::scalar(0.0, Units::undefined()))
            .unwrap();
        assert_eq!(data.count_masked().unwrap(), 0);
    }

    #[test]
    fn mask_apply_masking() {
        let data = Data::from_vec(vec![-5.0, 1.0, 99.0, 200.0], &[4], Units::undefined()).unwrap();
        let masked = data
            .apply_masking(&[99.0], None, Some(100.0), None)
            .unwrap();
        assert_eq!(
            masked.compute().unwrap().to_numeric_options().unwrap(),
            vec![Some(-5.0), Some(1.0), None, None]
        );
        let masked = data.apply_masking(&[], None, None, Some([0.0, 150.0])).unwrap();
        assert_eq!(masked.count_masked().unwrap(), 2);
        assert!(matches!(
            data.apply_masking(&[], Some(0.0), None, Some([0.0, 1.0])),
            Err(DataError::Value(_))
        ));
    }

    #[test]
    fn mask_where() {
        let data = masked();
        let condition = Data::from_vec(vec![1.0, 1.0, 0.0, 0.0], &[4], Units::undefined()).unwrap();
        let result = data
            .where_(
                &condition,
                Some(Data::scalar(100.0, Units::new("cm").unwrap()).into()),
                Some(WhereValue::Masked),
            )
            .unwrap();
        assert_eq!(
            result.compute().unwrap().to_numeric_options().unwrap(),
            vec![Some(1.0), None, None, None]
        );

        let mut soft = masked();
        soft.soften_mask();
        let result = soft
            .where_(&condition, Some(Data::scalar(7.0, Units::undefined()).into()), None)
            .unwrap();
        assert_eq!(
            result.compute().unwrap().to_numeric_options().unwrap(),
            vec![Some(7.0), Some(7.0), Some(3.0), Some(4.0)]
        );

        let wide = Data::from_vec(vec![1.0; 8], &[2, 4], Units::undefined()).unwrap();
        assert!(matches!(
            data.where_(&wide, Some(WhereValue::Masked), None),
            Err(DataError::Index(_))
        ));
        assert!(data
            .where_(
                &condition,
                Some(Data::scalar(1.0, Units::new("s").unwrap()).into()),
                None
            )
            .is_err());
    }
}
