//! Binary operations and the units of their results.
//!
//! The elements of a binary operation are combined without regard to units, so the units of the result are derived separately from the category of the operator:
//!  - A comparison requires equivalent (or undefined) units, conforms the right operand to the left, and has undefined units.
//!  - A bitwise operation has the same requirement but keeps the units.
//!  - A power requires a dimensionless exponent, which must be a single value if the base has units.
//!  - Arithmetic multiplies and divides units, or conforms the operands of addition, subtraction and modulo.
//!
//! Reference time units have their own arithmetic, in which the difference of two reference times is a duration.

use derive_more::Display;

use crate::{
    chunked::ChunkedArray,
    data_type::DataType,
    units::{Units, UnitsError},
};

use super::{axes::new_axis_identifier, Data, DataError};

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BinaryOperator {
    /// Addition.
    #[display("+")]
    Add,
    /// Subtraction.
    #[display("-")]
    Sub,
    /// Multiplication.
    #[display("*")]
    Mul,
    /// True division.
    #[display("/")]
    Div,
    /// Floor division.
    #[display("//")]
    FloorDiv,
    /// Modulo, with the sign of the divisor.
    #[display("%")]
    Mod,
    /// Exponentiation.
    #[display("**")]
    Pow,
    /// Exponentiation with the operands swapped, raising the right operand to the power of the left.
    #[display("rpow")]
    RPow,
    /// Equality within tolerance.
    #[display("==")]
    Eq,
    /// Inequality within tolerance.
    #[display("!=")]
    Ne,
    /// Less than.
    #[display("<")]
    Lt,
    /// Less than or equal.
    #[display("<=")]
    Le,
    /// Greater than.
    #[display(">")]
    Gt,
    /// Greater than or equal.
    #[display(">=")]
    Ge,
    /// Bitwise (or logical, for booleans) and.
    #[display("&")]
    And,
    /// Bitwise (or logical, for booleans) or.
    #[display("|")]
    Or,
    /// Bitwise (or logical, for booleans) exclusive or.
    #[display("^")]
    Xor,
    /// Left shift.
    #[display("<<")]
    LeftShift,
    /// Right shift.
    #[display(">>")]
    RightShift,
}

/// The category of a [`BinaryOperator`], which determines the units of the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorCategory {
    /// `==`, `!=`, `<`, `<=`, `>`, `>=`.
    Comparison,
    /// `&`, `|`, `^`, `<<`, `>>`.
    Bitwise,
    /// `**` and its reflection.
    Power,
    /// `+`, `-`, `*`, `/`, `//`, `%`.
    Arithmetic,
}

impl BinaryOperator {
    /// The category of the operator.
    #[must_use]
    pub const fn category(&self) -> OperatorCategory {
        match self {
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => {
                OperatorCategory::Comparison
            }
            Self::And | Self::Or | Self::Xor | Self::LeftShift | Self::RightShift => {
                OperatorCategory::Bitwise
            }
            Self::Pow | Self::RPow => OperatorCategory::Power,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::FloorDiv | Self::Mod => {
                OperatorCategory::Arithmetic
            }
        }
    }

    /// The name of the operator.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "subtract",
            Self::Mul => "multiply",
            Self::Div => "divide",
            Self::FloorDiv => "floor_divide",
            Self::Mod => "modulo",
            Self::Pow => "power",
            Self::RPow => "reflected_power",
            Self::Eq => "equal",
            Self::Ne => "not_equal",
            Self::Lt => "less",
            Self::Le => "less_equal",
            Self::Gt => "greater",
            Self::Ge => "greater_equal",
            Self::And => "bitwise_and",
            Self::Or => "bitwise_or",
            Self::Xor => "bitwise_xor",
            Self::LeftShift => "left_shift",
            Self::RightShift => "right_shift",
        }
    }

    fn compare(self, a: f64, b: f64, atol: f64, rtol: f64) -> bool {
        match self {
            Self::Eq => isclose(a, b, atol, rtol),
            Self::Ne => !isclose(a, b, atol, rtol),
            Self::Lt => a < b,
            Self::Le => a <= b,
            Self::Gt => a > b,
            _ => a >= b,
        }
    }

    fn compare_text(self, a: &str, b: &str) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Lt => a < b,
            Self::Le => a <= b,
            Self::Gt => a > b,
            _ => a >= b,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn apply(self, a: f64, b: f64) -> f64 {
        let shift = |b: f64| u32::try_from(b as i64).unwrap_or(u32::MAX);
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
            Self::FloorDiv => (a / b).floor(),
            Self::Mod => {
                let r = a % b;
                if r != 0.0 && (r < 0.0) != (b < 0.0) {
                    r + b
                } else {
                    r
                }
            }
            Self::Pow => a.powf(b),
            Self::RPow => b.powf(a),
            Self::And => ((a as i64) & (b as i64)) as f64,
            Self::Or => ((a as i64) | (b as i64)) as f64,
            Self::Xor => ((a as i64) ^ (b as i64)) as f64,
            Self::LeftShift => (a as i64).checked_shl(shift(b)).unwrap_or(0) as f64,
            Self::RightShift => {
                let a = a as i64;
                a.checked_shr(shift(b)).unwrap_or(if a < 0 { -1 } else { 0 }) as f64
            }
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => {
                f64::from(u8::from(self.compare(a, b, 0.0, 0.0)))
            }
        }
    }
}

/// Returns true if `|a - b| <= atol + rtol * |b|`.
pub(super) fn isclose(a: f64, b: f64, atol: f64, rtol: f64) -> bool {
    #[allow(clippy::float_cmp)]
    let equal = a == b;
    equal || (a - b).abs() <= atol + rtol * b.abs()
}

fn units_error(operator: BinaryOperator, left: &Units, right: &Units) -> DataError {
    UnitsError::Algebra(
        operator.name(),
        left.as_str().to_string(),
        right.as_str().to_string(),
    )
    .into()
}

/// The operands of a binary operation with conformed units, and the units of the result.
struct Combined {
    left: Data,
    right: Data,
    units: Units,
}

impl Combined {
    fn new(left: Data, right: Data, units: Units) -> Self {
        Self { left, right, units }
    }
}

impl Data {
    /// Reinterpret reference times as dates in their own calendar, and encode the dates in `units`.
    ///
    /// Dates which do not exist in the calendar of `units` are masked.
    fn redated(&self, units: &Units) -> Result<Self, DataError> {
        tracing::debug!(
            from = %self.units,
            from_calendar = %self.units.reference_calendar(),
            to = %units,
            to_calendar = %units.reference_calendar(),
            "reconciling reference time calendars"
        );
        let from = self.units.clone();
        let to = units.clone();
        let data_type = self.float_data_type()?;
        let array = self.array.map_blocks("redate", data_type, move |block| {
            Ok(block.map_numeric(data_type, true, |value| {
                from.num_to_date(value)
                    .and_then(|date| to.date_to_num(&date))
                    .unwrap_or(f64::NAN)
            })?)
        })?;
        Ok(self.with_chunked_array(array).with_units(units.clone()))
    }

    /// Reconcile reference times with non-equivalent calendars where exactly one calendar is canonical.
    fn reconcile_calendars(&self, other: &Self) -> Result<(Self, Self), DataError> {
        let (left, right) = (&self.units, &other.units);
        if left.is_reftime() && right.is_reftime() && !left.equivalent(right) {
            match (left.has_canonical_calendar(), right.has_canonical_calendar()) {
                (true, false) => return Ok((self.clone(), other.redated(left)?)),
                (false, true) => return Ok((self.redated(right)?, other.clone())),
                _ => {}
            }
        }
        Ok((self.clone(), other.clone()))
    }

    /// Conform equivalent units, where undefined units are compatible with any units.
    ///
    /// The units of the result are the defined units, if any.
    fn conform_equivalent(
        operator: BinaryOperator,
        left: Self,
        right: Self,
    ) -> Result<Combined, DataError> {
        match (left.units.is_defined(), right.units.is_defined()) {
            (true, true) => {
                if !left.units.equivalent(&right.units) {
                    return Err(units_error(operator, &left.units, &right.units));
                }
                let right = right.conformed_to(&left.units)?;
                let units = left.units.clone();
                Ok(Combined::new(left, right, units))
            }
            (false, true) => {
                let units = right.units.clone();
                Ok(Combined::new(left, right, units))
            }
            _ => {
                let units = left.units.clone();
                Ok(Combined::new(left, right, units))
            }
        }
    }

    /// The units of arithmetic with reference times.
    fn reftime_arithmetic(
        operator: BinaryOperator,
        left: Self,
        right: Self,
    ) -> Result<Combined, DataError> {
        let (lu, ru) = (left.units.clone(), right.units.clone());
        if !lu.is_defined() {
            return Ok(Combined::new(left, right, ru));
        }
        if !ru.is_defined() {
            return Ok(Combined::new(left, right, lu));
        }
        match operator {
            BinaryOperator::Sub if lu.is_reftime() && ru.is_reftime() => {
                if !lu.equivalent(&ru) {
                    return Err(units_error(operator, &lu, &ru));
                }
                let right = right.conformed_to(&lu)?;
                Ok(Combined::new(left, right, lu.duration()?))
            }
            BinaryOperator::Add | BinaryOperator::Sub if lu.is_reftime() && ru.is_duration() => {
                let right = right.conformed_to(&lu.duration()?)?;
                Ok(Combined::new(left, right, lu))
            }
            BinaryOperator::Add if lu.is_duration() && ru.is_reftime() => {
                let left = left.conformed_to(&ru.duration()?)?;
                Ok(Combined::new(left, right, ru))
            }
            _ => Err(units_error(operator, &lu, &ru)),
        }
    }

    /// The units of `base` raised to the power of `exponent`.
    #[allow(clippy::float_cmp)]
    fn power_units(
        operator: BinaryOperator,
        base: &Self,
        exponent: &Self,
    ) -> Result<Units, DataError> {
        if exponent.units.is_defined() && !exponent.units.is_dimensionless() {
            return Err(units_error(operator, &base.units, &exponent.units));
        }
        if !base.units.is_defined() || base.units.is_dimensionless() {
            return Ok(base.units.clone());
        }
        if exponent.size() != 1 {
            return Err(DataError::Value(format!(
                "can only raise units {:?} to a single power, got an exponent of shape {:?}",
                base.units.as_str(),
                exponent.shape()
            )));
        }
        let power = exponent
            .item()?
            .and_then(|power| power.as_f64())
            .ok_or_else(|| DataError::Value("the exponent is missing".to_string()))?;
        let units = base.units.powf(power)?;
        if base.units.is_shifted()
            && power != 1.0
            && !units.powf(1.0 / power).is_ok_and(|root| root.equals(&base.units))
        {
            return Err(UnitsError::ShiftedPower(base.units.as_str().to_string(), power).into());
        }
        Ok(units)
    }

    fn combine_units(
        &self,
        other: &Self,
        operator: BinaryOperator,
    ) -> Result<Combined, DataError> {
        let (left, right) = self.reconcile_calendars(other)?;
        match operator.category() {
            OperatorCategory::Comparison => {
                let combined = Self::conform_equivalent(operator, left, right)?;
                Ok(Combined::new(combined.left, combined.right, Units::undefined()))
            }
            OperatorCategory::Bitwise => Self::conform_equivalent(operator, left, right),
            OperatorCategory::Power => {
                let units = if operator == BinaryOperator::RPow {
                    Self::power_units(operator, &right, &left)?
                } else {
                    Self::power_units(operator, &left, &right)?
                };
                Ok(Combined::new(left, right, units))
            }
            OperatorCategory::Arithmetic if left.units.is_reftime() || right.units.is_reftime() => {
                if matches!(
                    operator,
                    BinaryOperator::Add | BinaryOperator::Sub
                ) || !left.units.is_defined()
                    || !right.units.is_defined()
                {
                    Self::reftime_arithmetic(operator, left, right)
                } else {
                    Err(units_error(operator, &left.units, &right.units))
                }
            }
            OperatorCategory::Arithmetic => match operator {
                BinaryOperator::Mul => {
                    let units = left.units.mul(&right.units)?;
                    Ok(Combined::new(left, right, units))
                }
                BinaryOperator::Div | BinaryOperator::FloorDiv => {
                    let units = left.units.div(&right.units)?;
                    Ok(Combined::new(left, right, units))
                }
                _ => Self::conform_equivalent(operator, left, right),
            },
        }
    }

    fn result_data_type(
        &self,
        other: &Self,
        operator: BinaryOperator,
    ) -> Result<DataType, DataError> {
        let (a, b) = (self.data_type(), other.data_type());
        let incompatible = || {
            DataError::DataType(format!(
                "operator {operator} is not supported for {a} and {b} elements"
            ))
        };
        if operator.category() == OperatorCategory::Comparison {
            return if a.is_numeric() == b.is_numeric() {
                Ok(DataType::Bool)
            } else {
                Err(incompatible())
            };
        }
        let promoted = a.promote(&b).ok_or_else(incompatible)?;
        if !promoted.is_numeric() {
            return Err(incompatible());
        }
        match operator.category() {
            OperatorCategory::Bitwise => {
                if promoted.is_float()
                    || (promoted.is_bool()
                        && matches!(
                            operator,
                            BinaryOperator::LeftShift | BinaryOperator::RightShift
                        ))
                {
                    Err(incompatible())
                } else {
                    Ok(promoted)
                }
            }
            OperatorCategory::Arithmetic | OperatorCategory::Power => Ok(match operator {
                BinaryOperator::Div if !promoted.is_float() => DataType::Float64,
                _ if promoted.is_bool() => DataType::Int8,
                _ => promoted,
            }),
            OperatorCategory::Comparison => Ok(DataType::Bool),
        }
    }

    /// Combine the array with `other` elementwise with broadcasting.
    ///
    /// The units of `other` are conformed to the units of the array where required, and the units of the result are derived from the category of the operator.
    /// Equality and inequality compare numbers within the [tolerances](crate::config::Config#atol) of the configuration.
    /// An element of the result is missing if either operand is missing.
    ///
    /// The axis identifiers are those of the operand with the shape of the result, or new if neither has it.
    ///
    /// # Errors
    /// Returns
    ///  - [`DataError::Units`] if the units cannot be combined by the operator,
    ///  - [`DataError::Value`] if raising units to a power which is not a single value,
    ///  - [`DataError::DataType`] if the data types are not supported by the operator, or
    ///  - [`DataError::ChunkedArray`] if the shapes do not broadcast.
    pub fn binary_operation(
        &self,
        other: &Self,
        operator: BinaryOperator,
    ) -> Result<Self, DataError> {
        let data_type = self.result_data_type(other, operator)?;
        let Combined { left, right, units } = self.combine_units(other, operator)?;
        let (atol, rtol) = (self.config.atol(), self.config.rtol());
        let array = ChunkedArray::elementwise(
            operator.name(),
            &[&left.array, &right.array],
            data_type,
            move |blocks, _| {
                let (a, b) = (&blocks[0], &blocks[1]);
                Ok(match operator.category() {
                    OperatorCategory::Comparison => a.zip_compare(
                        b,
                        |x, y| operator.compare(x, y, atol, rtol),
                        |x, y| operator.compare_text(x, y),
                    )?,
                    OperatorCategory::Bitwise if data_type.is_bool() => {
                        a.zip_numeric(b, data_type, |x, y| {
                            let (x, y) = (x != 0.0, y != 0.0);
                            f64::from(u8::from(match operator {
                                BinaryOperator::And => x && y,
                                BinaryOperator::Or => x || y,
                                _ => x ^ y,
                            }))
                        })?
                    }
                    OperatorCategory::Arithmetic
                        if !data_type.is_float()
                            && matches!(
                                operator,
                                BinaryOperator::Div | BinaryOperator::FloorDiv | BinaryOperator::Mod
                            ) =>
                    {
                        // an integer division by zero has no representable result
                        a.zip_numeric_checked(b, data_type, |x, y| {
                            (y != 0.0).then(|| operator.apply(x, y))
                        })?
                    }
                    _ => a.zip_numeric(b, data_type, |x, y| operator.apply(x, y))?,
                })
            },
        )?;

        let shape = array.shape();
        let mut data = if left.shape() == shape {
            left.with_chunked_array(array)
        } else if right.shape() == shape {
            let mut data = right.with_chunked_array(array);
            data.hardmask = self.hardmask;
            data
        } else {
            let mut axes = left.axes.clone();
            while axes.len() < shape.len() {
                axes.insert(0, new_axis_identifier(&axes));
            }
            left.with_chunked_array_and_axes(array, axes)
        };
        if data_type != self.data_type() {
            data.fill_value = None;
        }
        tracing::trace!(%operator, units = %units, shape = ?data.shape(), "binary operation");
        Ok(data.with_units(units))
    }

    /// Add `other` elementwise.
    ///
    /// # Errors
    /// See [`binary_operation`](Data::binary_operation).
    pub fn add(&self, other: &Self) -> Result<Self, DataError> {
        self.binary_operation(other, BinaryOperator::Add)
    }

    /// Subtract `other` elementwise.
    ///
    /// # Errors
    /// See [`binary_operation`](Data::binary_operation).
    pub fn sub(&self, other: &Self) -> Result<Self, DataError> {
        self.binary_operation(other, BinaryOperator::Sub)
    }

    /// Multiply by `other` elementwise.
    ///
    /// # Errors
    /// See [`binary_operation`](Data::binary_operation).
    pub fn mul(&self, other: &Self) -> Result<Self, DataError> {
        self.binary_operation(other, BinaryOperator::Mul)
    }

    /// Divide by `other` elementwise.
    ///
    /// # Errors
    /// See [`binary_operation`](Data::binary_operation).
    pub fn div(&self, other: &Self) -> Result<Self, DataError> {
        self.binary_operation(other, BinaryOperator::Div)
    }

    /// Raise to the power `other` elementwise.
    ///
    /// # Errors
    /// See [`binary_operation`](Data::binary_operation).
    pub fn pow(&self, other: &Self) -> Result<Self, DataError> {
        self.binary_operation(other, BinaryOperator::Pow)
    }

    /// Raise `other` to the power of the array elementwise.
    ///
    /// # Errors
    /// See [`binary_operation`](Data::binary_operation).
    pub fn rpow(&self, other: &Self) -> Result<Self, DataError> {
        self.binary_operation(other, BinaryOperator::RPow)
    }

    /// Compare with `other` for equality within tolerance, elementwise.
    ///
    /// # Errors
    /// See [`binary_operation`](Data::binary_operation).
    pub fn eq(&self, other: &Self) -> Result<Self, DataError> {
        self.binary_operation(other, BinaryOperator::Eq)
    }

    /// Compare with `other` for inequality within tolerance, elementwise.
    ///
    /// # Errors
    /// See [`binary_operation`](Data::binary_operation).
    pub fn ne(&self, other: &Self) -> Result<Self, DataError> {
        self.binary_operation(other, BinaryOperator::Ne)
    }

    /// Returns elementwise `self < other`.
    ///
    /// # Errors
    /// See [`binary_operation`](Data::binary_operation).
    pub fn lt(&self, other: &Self) -> Result<Self, DataError> {
        self.binary_operation(other, BinaryOperator::Lt)
    }

    /// Returns elementwise `self > other`.
    ///
    /// # Errors
    /// See [`binary_operation`](Data::binary_operation).
    pub fn gt(&self, other: &Self) -> Result<Self, DataError> {
        self.binary_operation(other, BinaryOperator::Gt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Calendar;

    fn values(data: &Data) -> Vec<Option<f64>> {
        data.compute().unwrap().to_numeric_options().unwrap()
    }

    fn data(values: &[f64], units: &str) -> Data {
        Data::from_vec(values.to_vec(), &[values.len()], Units::new(units).unwrap()).unwrap()
    }

    #[test]
    fn operator_categories() {
        assert_eq!(BinaryOperator::Le.category(), OperatorCategory::Comparison);
        assert_eq!(BinaryOperator::Xor.category(), OperatorCategory::Bitwise);
        assert_eq!(BinaryOperator::Pow.category(), OperatorCategory::Power);
        assert_eq!(BinaryOperator::Mod.category(), OperatorCategory::Arithmetic);
        assert_eq!(BinaryOperator::FloorDiv.to_string(), "//");
        assert!((BinaryOperator::Mod.apply(-7.0, 3.0) - 2.0).abs() < 1e-12);
        assert!((BinaryOperator::Mod.apply(7.0, -3.0) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn arithmetic_units() {
        let km = data(&[1.0, 2.0], "km");
        let m = data(&[500.0, 500.0], "m");
        let sum = km.add(&m).unwrap();
        assert_eq!(sum.units().as_str(), "km");
        assert_eq!(values(&sum), vec![Some(1.5), Some(2.5)]);

        let product = km.mul(&data(&[2.0, 2.0], "s")).unwrap();
        assert!(product.units().equivalent(&Units::new("m s").unwrap()));

        let quotient = km.div(&data(&[2.0, 4.0], "")).unwrap();
        assert_eq!(quotient.units().as_str(), "km");
        assert_eq!(values(&quotient), vec![Some(0.5), Some(0.5)]);

        assert!(matches!(
            km.add(&data(&[1.0, 1.0], "s")),
            Err(DataError::Units(_))
        ));
    }

    #[test]
    fn comparison_units() {
        let km = data(&[1.0, 2.0], "km");
        let m = data(&[1000.0, 1000.0], "m");
        let equal = km.eq(&m).unwrap();
        assert!(!equal.units().is_defined());
        assert_eq!(equal.data_type(), DataType::Bool);
        assert_eq!(values(&equal), vec![Some(1.0), Some(0.0)]);
        assert_eq!(values(&km.gt(&m).unwrap()), vec![Some(0.0), Some(1.0)]);
        assert!(km.lt(&data(&[1.0, 1.0], "K")).is_err());
    }

    #[test]
    fn bitwise_units() {
        let a = Data::new(
            crate::masked_array::MaskedArray::full(&[2], 6.0, DataType::Int32),
            Units::new("1").unwrap(),
        );
        let b = Data::new(
            crate::masked_array::MaskedArray::full(&[2], 3.0, DataType::Int32),
            Units::undefined(),
        );
        let and = a.binary_operation(&b, BinaryOperator::And).unwrap();
        assert_eq!(and.units().as_str(), "1");
        assert_eq!(values(&and), vec![Some(2.0), Some(2.0)]);
        assert!(data(&[1.0], "1")
            .binary_operation(&data(&[1.0], "1"), BinaryOperator::Or)
            .is_err());
    }

    #[test]
    fn integer_division_by_zero() {
        let sevens = data(&[7.0, 7.0], "").astype(DataType::Int32).unwrap();
        let zeros = data(&[0.0, 0.0], "").astype(DataType::Int32).unwrap();
        for operator in [BinaryOperator::FloorDiv, BinaryOperator::Mod] {
            let result = sevens.binary_operation(&zeros, operator).unwrap();
            assert_eq!(result.data_type(), DataType::Int32);
            assert_eq!(values(&result), vec![None, None]);
        }

        let divisors = data(&[0.0, 2.0], "").astype(DataType::Int32).unwrap();
        let quotient = sevens
            .binary_operation(&divisors, BinaryOperator::FloorDiv)
            .unwrap();
        assert_eq!(values(&quotient), vec![None, Some(3.0)]);

        let float = sevens.div(&zeros).unwrap();
        assert_eq!(float.data_type(), DataType::Float64);
        assert_eq!(values(&float), vec![Some(f64::INFINITY), Some(f64::INFINITY)]);
    }

    #[test]
    fn reftime_units() {
        let t0 = data(&[10.0], "days since 2000-01-01");
        let t1 = data(&[24.0], "hours since 2000-01-02");
        let difference = t0.sub(&t1).unwrap();
        assert_eq!(difference.units().as_str(), "days");
        assert_eq!(values(&difference), vec![Some(8.0)]);

        let later = t0.add(&data(&[12.0], "hours")).unwrap();
        assert_eq!(later.units().as_str(), "days since 2000-01-01");
        assert_eq!(values(&later), vec![Some(10.5)]);

        assert!(t0.mul(&data(&[2.0], "1")).is_err());
        assert!(t0.add(&t1).is_err());
        assert_eq!(
            t0.mul(&data(&[2.0], "")).unwrap().units().as_str(),
            "days since 2000-01-01"
        );
    }

    #[test]
    fn reftime_calendars() {
        let mut noleap = data(&[59.0], "days since 2000-01-01");
        noleap.override_calendar(Calendar::NoLeap).unwrap();
        // Day 59 of a standard year is 2000-02-29, which does not exist without leap years
        let standard = data(&[59.0, 60.0], "days since 2000-01-01");
        let difference = noleap.sub(&standard).unwrap();
        assert_eq!(difference.units().as_str(), "days");
        assert_eq!(values(&difference), vec![None, Some(0.0)]);
    }

    #[test]
    fn power_units() {
        let m = data(&[2.0, 3.0], "m");
        let squared = m.pow(&Data::scalar(2.0, Units::undefined())).unwrap();
        assert_eq!(squared.units().as_str(), "m^2");
        assert_eq!(values(&squared), vec![Some(4.0), Some(9.0)]);
        assert!(matches!(
            m.pow(&data(&[2.0, 2.0], "")),
            Err(DataError::Value(_))
        ));
        assert!(m.pow(&Data::scalar(2.0, Units::new("m").unwrap())).is_err());
        assert!(matches!(
            data(&[2.0], "degC").pow(&Data::scalar(2.0, Units::undefined())),
            Err(DataError::Units(UnitsError::ShiftedPower(..)))
        ));
        let dimensionless = data(&[2.0, 3.0], "1")
            .pow(&data(&[2.0, 3.0], ""))
            .unwrap();
        assert_eq!(values(&dimensionless), vec![Some(4.0), Some(27.0)]);
    }

    #[test]
    fn reflected_power_units() {
        let exponents = data(&[1.0, 3.0], "1");
        let powers = exponents.rpow(&Data::scalar(2.0, Units::undefined())).unwrap();
        assert_eq!(powers.shape(), vec![2]);
        assert_eq!(values(&powers), vec![Some(2.0), Some(8.0)]);
        assert_eq!(BinaryOperator::RPow.category(), OperatorCategory::Power);

        let squared = Data::scalar(2.0, Units::undefined())
            .rpow(&data(&[2.0, 3.0], "m"))
            .unwrap();
        assert_eq!(squared.units().as_str(), "m^2");
        assert_eq!(values(&squared), vec![Some(4.0), Some(9.0)]);

        assert!(matches!(
            data(&[2.0, 2.0], "").rpow(&data(&[2.0, 3.0], "m")),
            Err(DataError::Value(_))
        ));
        assert!(data(&[2.0], "m").rpow(&Data::scalar(2.0, Units::undefined())).is_err());
    }

    #[test]
    fn binary_axes() {
        let mut column = Data::from_vec(vec![1.0, 2.0], &[2, 1], Units::undefined()).unwrap();
        column.set_cyclic(&[0], true).unwrap();
        let row = Data::from_vec(vec![1.0, 2.0, 3.0], &[3], Units::undefined()).unwrap();
        let sum = column.add(&row).unwrap();
        assert_eq!(sum.shape(), vec![2, 3]);
        assert_eq!(sum.axes(), &["dim0".to_string(), "dim1".to_string()]);
        assert_eq!(sum.cyclic(), vec![0]);
    }
}
